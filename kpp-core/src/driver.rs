use std::fs;
use std::io::Write;
use std::path::Path;

use log::info;

use crate::codegen;
use crate::error::CoreError;
use crate::options::Options;
use crate::parser;
use crate::scanner::{Context, is_ident_byte};

/// Preprocesses `source` into `out`, returning the sink on success.
///
/// `file` only labels diagnostics. On error the sink may hold partial
/// output; callers must discard it.
pub fn preprocess<W: Write>(
    source: &[u8],
    file: &str,
    options: &Options,
    out: W,
) -> Result<W, CoreError> {
    let mut ctx = Context::new(source, file, options, out);
    codegen::jit_header(&mut ctx)?;
    while let Some(byte) = ctx.peek() {
        if ctx.at_comment() {
            ctx.skip_comment()?;
        } else if is_ident_byte(byte) {
            directive(&mut ctx)?;
        } else {
            codegen::jit_postfix(&mut ctx)?;
            ctx.advance()?;
        }
    }
    if ctx.body_depth.is_some() {
        return Err(ctx.fail("No end of jit kernel body"));
    }
    ctx.flush()?;
    info!("{}: {} lines preprocessed", ctx.file(), ctx.line());
    Ok(ctx.into_output())
}

/// Reads and preprocesses the file at `path`.
pub fn preprocess_file(path: impl AsRef<Path>, options: &Options) -> Result<Vec<u8>, CoreError> {
    let path = path.as_ref();
    let source = fs::read(path).map_err(|source| CoreError::ReadSource {
        path: path.to_path_buf(),
        source,
    })?;
    preprocess(&source, &path.display().to_string(), options, Vec::new())
}

/// Convenience wrapper for in-memory text.
pub fn preprocess_str(source: &str, options: &Options) -> Result<String, CoreError> {
    let out = preprocess(source.as_bytes(), "<input>", options, Vec::new())?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Reads the identifier at the read position and routes directives.
/// Any other identifier is copied whole.
fn directive<W: Write>(ctx: &mut Context<'_, W>) -> Result<(), CoreError> {
    let id = ctx.ident()?;
    match id.as_str() {
        "__jit" => parser::jit_kernel(ctx),
        "__kernel" => parser::kernel_declaration(ctx, false),
        _ => ctx.emit(&id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jit_options() -> Options {
        Options {
            jit: true,
            ..Options::default()
        }
    }

    #[test]
    fn passes_plain_code_through() {
        let source = "#include <stdio.h>\n// a {comment}\nint main(void) {\n  /* __kernel */ return my__kernel + _x;\n}\n";
        let out = preprocess_str(source, &Options::default()).expect("preprocess");
        assert_eq!(out, source);
    }

    #[test]
    fn passes_non_utf8_bytes_through() {
        let source = b"char c = '\xe9';\n";
        let out = preprocess(source, "t.c", &Options::default(), Vec::new()).expect("preprocess");
        assert_eq!(out, source);
    }

    #[test]
    fn rewrites_plain_kernel() {
        let out = preprocess_str(
            "__kernel void f(const int n, double *y) { y[0] = n; }\n",
            &Options::default(),
        )
        .expect("preprocess");
        assert_eq!(out, "         void f(const int n, double *y) { y[0] = n; }\n");
    }

    #[test]
    fn rewrites_jit_kernel_once() {
        let out = preprocess_str(
            "// header\n__jit __kernel void f(const int n, double *y) {\n  if (n) { y[0] = n; }\n}\nvoid g() {}\n",
            &jit_options(),
        )
        .expect("preprocess");
        assert!(out.starts_with("#include \"../../general/okrtc.hpp\"\n// header\n    "));
        assert_eq!(out.matches("const char *src=R\"_(").count(), 1);
        assert_eq!(out.matches("operator_void(y)").count(), 1);
        assert!(out.ends_with("operator_void(y));\n}\nvoid g() {}\n"));
    }

    #[test]
    fn kernel_after_block_comment_is_recognized() {
        let out = preprocess_str("/* doc */ __kernel void f(void) {}", &Options::default())
            .expect("preprocess");
        assert_eq!(out, "/* doc */          void f() {}");
    }

    #[test]
    fn jit_without_kernel_keyword_fails() {
        let err = preprocess_str("__jit void f() {}", &jit_options()).unwrap_err();
        assert_eq!(
            err.message(),
            Some("No 'kernel' keyword after 'jit' qualifier")
        );
    }

    #[test]
    fn reports_physical_line_of_error() {
        let source = "/* one\n two */\n// three\n__kernel void f(int a,\n  int b c) {}\n";
        let err = preprocess_str(source, &Options::default()).unwrap_err();
        assert_eq!(err.line(), Some(5));
        assert_eq!(err.message(), Some("No coma while in args"));
        assert_eq!(
            err.to_string(),
            "<input>:5: kpp error: No coma while in args"
        );
    }

    #[test]
    fn template_range_error_propagates() {
        let err = preprocess_str(
            "__kernel void f(__template(1-) const int p) {}",
            &Options::default(),
        )
        .unwrap_err();
        assert_eq!(err.message(), Some("Unknown __template range"));
    }

    #[test]
    fn unterminated_jit_body_fails() {
        let err = preprocess_str("__jit __kernel void f(double *y) { y[0] = 1;", &jit_options())
            .unwrap_err();
        assert_eq!(err.message(), Some("No end of jit kernel body"));
    }

    #[test]
    fn nested_kernel_in_jit_body_fails() {
        let err = preprocess_str(
            "__jit __kernel void f() { __kernel void g() {} }",
            &jit_options(),
        )
        .unwrap_err();
        assert_eq!(err.message(), Some("Kernel declared inside a jit kernel body"));
    }

    #[test]
    fn preprocesses_file_with_path_in_diagnostics() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.cpp");
        fs::write(&path, "\n__kernel void f(int a int b) {}\n").expect("write input");
        let err = preprocess_file(&path, &Options::default()).unwrap_err();
        assert!(err.to_string().starts_with(&format!("{}:2:", path.display())));

        let good = dir.path().join("good.cpp");
        fs::write(&good, "int x;\n").expect("write input");
        let out = preprocess_file(&good, &Options::default()).expect("preprocess");
        assert_eq!(out, b"int x;\n");
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = preprocess_file("does/not/exist.cpp", &Options::default()).unwrap_err();
        assert!(matches!(err, CoreError::ReadSource { .. }));
    }
}
