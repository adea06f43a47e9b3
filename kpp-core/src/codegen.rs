//! Code generation for kernels.
//!
//! A jit kernel's body is written twice: once as C++ source embedded in
//! a raw string literal (compiled at run time by the `okrtc` runtime),
//! and once as host code that hashes the static arguments, compiles the
//! embedded source on a cache miss and calls the compiled kernel.
//!
//! The embedded source is a printf-style template: the runtime fills
//! `%016lx` with the argument hash and the static format specifiers with
//! the static argument values before compiling it.

use std::io::Write;

use log::debug;

use crate::error::CoreError;
use crate::scanner::Context;

/// Runtime compilation support, included once per output file.
const RUNTIME_HEADER: &str = "#include \"../../general/okrtc.hpp\"\n";
/// Header included by every embedded kernel source.
const KERNEL_HEADER: &str = "general/okina.hpp";
/// Memory-manager function mapping a handle to an address.
const ADDRESS_FN: &str = "mfem::mm::adrs";

pub fn jit_header<W: Write>(ctx: &mut Context<'_, W>) -> Result<(), CoreError> {
    if ctx.options().jit {
        ctx.emit(RUNTIME_HEADER)?;
    }
    Ok(())
}

/// Opens the embedded source right after a jit kernel's `{` and starts
/// tracking the body's braces.
pub fn jit_prefix<W: Write>(ctx: &mut Context<'_, W>) -> Result<(), CoreError> {
    if !ctx.kernel.deferred {
        return Ok(());
    }
    let kernel = &ctx.kernel;
    let strings = &kernel.strings;
    let mut text = String::new();
    text.push_str("\n\tconst char *src=R\"_(\n");
    text.push_str("#include <cstdint>");
    text.push_str("\n#include <cstring>");
    text.push_str("\n#include <stdbool.h>");
    text.push_str(&format!("\n#include \"{KERNEL_HEADER}\""));
    text.push_str("\ntypedef union {double d; uint64_t u;} union_du;");
    text.push_str(&format!("\ntemplate<{}>", strings.static_template));
    text.push_str(&format!(
        "\nvoid jit_{}({}){{",
        kernel.name, strings.pointer_params
    ));
    if !strings.unpack_doubles.is_empty() {
        text.push_str(&format!("\n\t{}", strings.unpack_doubles));
    }
    ctx.emit(&text)?;
    ctx.body_depth = Some(0);
    Ok(())
}

/// Called before the driver copies a byte. Follows the braces of an
/// open jit kernel body and emits the dispatch code in front of the
/// body's closing brace.
pub fn jit_postfix<W: Write>(ctx: &mut Context<'_, W>) -> Result<(), CoreError> {
    let Some(depth) = ctx.body_depth else {
        return Ok(());
    };
    match ctx.peek() {
        Some(b'{') => ctx.body_depth = Some(depth + 1),
        Some(b'}') if depth > 0 => ctx.body_depth = Some(depth - 1),
        Some(b'}') => {
            let dispatch = dispatch_code(ctx);
            ctx.emit(&dispatch)?;
            debug!("{}:{}: jit dispatch for `{}`", ctx.file(), ctx.line(), ctx.kernel.name);
            ctx.body_depth = None;
            ctx.kernel.deferred = false;
        }
        _ => {}
    }
    Ok(())
}

/// Closes the embedded source and builds the host-side cache lookup and
/// launch. The cache is a function-local static, so each kernel keeps its
/// own compiled instances, one per distinct static argument combination.
/// Concurrent first calls with the same arguments are not synchronized.
fn dispatch_code<W: Write>(ctx: &Context<'_, W>) -> String {
    let options = ctx.options();
    let kernel = ctx.kernel();
    let strings = &kernel.strings;
    let static_args = if strings.static_args.is_empty() {
        String::new()
    } else {
        format!(",{}", strings.static_args)
    };

    let mut text = String::new();
    text.push('}');
    text.push_str(&format!(
        "\nextern \"C\" void k%016lx({}){{",
        strings.pointer_params
    ));
    text.push_str(&format!(
        "jit_{}<{}>({});",
        kernel.name, strings.static_format, strings.pointer_args
    ));
    text.push_str("})_\";");

    text.push_str(&format!(
        "\n\ttypedef void (*kernel_t)({});",
        strings.pointer_params
    ));
    text.push_str("\n\tstatic std::unordered_map<size_t,ok::okrtc<kernel_t>*> __kernels;");
    if !strings.pack_doubles.is_empty() {
        text.push_str(&format!("\n\t{}", strings.pack_doubles));
    }
    text.push_str(&format!(
        "\n\tconst char *xcc = \"{}\";",
        options.compile_command()
    ));
    text.push_str("\n\tconst size_t args_seed = std::hash<size_t>()(0);");
    text.push_str(&format!(
        "\n\tconst size_t args_hash = ok::hash_args(args_seed{static_args});"
    ));
    text.push_str("\n\tif (!__kernels[args_hash]){");
    text.push_str(&format!(
        "\n\t\t__kernels[args_hash] = new ok::okrtc<kernel_t>(xcc,src,\"-I{}\"{static_args});",
        options.source_dir
    ));
    text.push_str(&format!(
        "}}\n\t(__kernels[args_hash]->operator_void({}));\n",
        strings.pointer_args
    ));
    text
}

/// Binds each handle argument to a typed local through the memory
/// manager. Scalars of jit kernels are template parameters instead.
pub fn address_bindings<W: Write>(ctx: &mut Context<'_, W>) -> Result<(), CoreError> {
    let kernel = ctx.kernel();
    let mut text = String::new();
    for arg in &kernel.arguments {
        let ty = arg.type_name();
        let name = &arg.name;
        let qualifier = if arg.is_const { "const " } else { "" };
        if arg.pointer {
            text.push_str(&format!(
                "\n\t{qualifier}{ty}* {name} = ({qualifier}{ty}*) {ADDRESS_FN}(_{name});"
            ));
        } else if !kernel.deferred {
            text.push_str(&format!(
                "\n\t{qualifier}{ty} {name} = ({qualifier}{ty}) (_{name});"
            ));
        }
    }
    ctx.emit(&text)
}
