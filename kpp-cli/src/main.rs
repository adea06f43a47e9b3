use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail, ensure};
use clap::{ArgAction, CommandFactory, Parser};
use kpp_core::{Options, preprocess_file};
use log::warn;

/// Kernel directive preprocessor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, disable_help_flag = true)]
struct Cli {
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue, help = "Print usage and exit")]
    help: bool,

    #[arg(short, long, value_name = "OUTPUT", help = "Output file (defaults to stdout)")]
    output: Option<PathBuf>,

    #[arg(long, help = "Bind kernel arguments through the memory manager")]
    mm: bool,

    #[arg(long, help = "Generate runtime-compilation code for __jit kernels")]
    jit: bool,

    #[arg(
        long,
        value_name = "CXX",
        default_value = "c++",
        help = "Compiler invoked by the generated jit code"
    )]
    cxx: String,

    #[arg(
        long,
        value_name = "FLAGS",
        default_value = "",
        allow_hyphen_values = true,
        help = "Extra flags for the jit compiler"
    )]
    build_flags: String,

    #[arg(
        long,
        value_name = "DIR",
        default_value = ".",
        help = "Source directory passed as -I to the jit compiler"
    )]
    src_dir: String,

    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            memory_manager: self.mm,
            jit: self.jit,
            compiler: self.cxx.clone(),
            build_flags: self.build_flags.clone(),
            source_dir: self.src_dir.clone(),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    if cli.help {
        Cli::command().print_help()?;
        println!();
        return Ok(ExitCode::FAILURE);
    }
    let Some(input) = cli.input.as_deref() else {
        bail!("no INPUT file given (see -h)");
    };
    ensure!(
        input.extension().is_some(),
        "input file {} has no extension",
        input.display()
    );

    match preprocess_file(input, &cli.options()) {
        Ok(bytes) => write_output(cli.output.as_deref(), &bytes)?,
        Err(err) => {
            if let Some(path) = &cli.output {
                discard_output(path);
            }
            return Err(err.into());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    let Some(path) = path else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(bytes).context("failed to write to stdout")?;
        stdout.flush()?;
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

/// A failed run leaves no output file behind, not even a stale one.
fn discard_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("failed to remove output file {}: {err}", path.display()),
    }
}
