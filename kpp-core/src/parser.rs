//! Kernel declaration and argument list parsing.
//!
//! There is no grammar here beyond what the directives need: the parser
//! walks a kernel signature token by token, copying every recognized
//! token to the output, and records the argument list on the current
//! kernel for the code generator.

use std::io::Write;

use log::{debug, trace};

use crate::codegen;
use crate::error::CoreError;
use crate::kernel::{Argument, BaseType};
use crate::scanner::Context;

/// Written in place of the `__kernel` keyword.
const KERNEL_PADDING: &str = "        ";
/// Written in place of the `__jit` keyword.
const JIT_PADDING: &str = "   ";
/// Prefix of argument names that carry memory-manager handles.
pub const HANDLE_MARKER: &str = "_";
/// Most values a single `__template` directive may expand to.
pub const MAX_TEMPLATE_VALUES: usize = 4096;

/// `__jit` has been consumed; a `__kernel` declaration must follow.
pub fn jit_kernel<W: Write>(ctx: &mut Context<'_, W>) -> Result<(), CoreError> {
    ctx.emit(JIT_PADDING)?;
    ctx.skip_whitespace()?;
    let keyword = ctx.ident()?;
    ctx.check(
        keyword == "__kernel",
        "No 'kernel' keyword after 'jit' qualifier",
    )?;
    kernel_declaration(ctx, true)
}

/// `__kernel` has been consumed: parse `[static] void NAME(ARGS) {`.
pub fn kernel_declaration<W: Write>(ctx: &mut Context<'_, W>, jit: bool) -> Result<(), CoreError> {
    ctx.check(
        ctx.body_depth.is_none(),
        "Kernel declared inside a jit kernel body",
    )?;
    ctx.emit(KERNEL_PADDING)?;
    ctx.skip_whitespace()?;
    ctx.begin_kernel(jit);

    let head = ctx.peek_ident();
    ctx.check(head == "void" || head == "static", "Kernel w/o void or static")?;
    if head == "static" {
        let qualifier = ctx.ident()?;
        ctx.emit(&qualifier)?;
        ctx.skip_whitespace()?;
    }
    let return_type = ctx.ident()?;
    ctx.emit(&return_type)?;
    ctx.skip_whitespace()?;

    let name = ctx.ident()?;
    ctx.emit(&name)?;
    ctx.kernel.name = name;
    ctx.skip_whitespace()?;
    debug!(
        "{}:{}: kernel `{}`{}",
        ctx.file(),
        ctx.line(),
        ctx.kernel.name,
        if ctx.kernel.deferred { " (jit)" } else { "" }
    );

    ctx.check(ctx.peek() == Some(b'('), "No 1st '(' in kernel")?;
    ctx.advance()?;
    parse_arguments(ctx)?;
    ctx.check(ctx.peek() == Some(b')'), "No last ')' in kernel")?;
    ctx.advance()?;
    ctx.skip_whitespace()?;
    ctx.check(ctx.peek() == Some(b'{'), "No statement block found")?;
    ctx.advance()?;

    codegen::jit_prefix(ctx)?;
    if ctx.options().memory_manager {
        codegen::address_bindings(ctx)?;
    }
    Ok(())
}

/// Parses the argument list up to, not including, its closing `)`.
pub fn parse_arguments<W: Write>(ctx: &mut Context<'_, W>) -> Result<(), CoreError> {
    ctx.kernel.arguments.clear();
    ctx.skip_whitespace()?;
    if ctx.peek_ident() == "void" {
        ctx.take_ident();
        ctx.skip_whitespace()?;
    } else {
        argument_list(ctx)?;
    }

    let marker = if ctx.options().memory_manager {
        HANDLE_MARKER
    } else {
        ""
    };
    ctx.kernel.strings = ctx.kernel.jit_strings(marker);
    Ok(())
}

fn argument_list<W: Write>(ctx: &mut Context<'_, W>) -> Result<(), CoreError> {
    let mut pending = Argument::default();
    let mut depth: i32 = 0;
    loop {
        ctx.skip_whitespace()?;
        match ctx.expect_peek()? {
            b'*' => {
                pending.pointer = true;
                ctx.advance()?;
                continue;
            }
            b',' => {
                ctx.advance()?;
                continue;
            }
            _ => {}
        }

        let id = ctx.take_ident();
        if id.is_empty() {
            // `()` or a trailing comma
            if depth == 0 && ctx.peek() == Some(b')') {
                return Ok(());
            }
            return Err(ctx.fail("Name w/o alnum 1st letter"));
        }
        match id.as_str() {
            "__template" => {
                let range = template_range(ctx)?;
                debug!("{}:{}: __template range {:?}", ctx.file(), ctx.line(), range);
                ctx.kernel.template_range.extend(range);
                continue;
            }
            "const" => {
                ctx.emit(&id)?;
                pending.is_const = true;
                continue;
            }
            "__restrict" => {
                ctx.emit(&id)?;
                pending.restrict = true;
                continue;
            }
            _ => {}
        }
        if let Some(ty) = BaseType::from_ident(&id) {
            ctx.emit(&id)?;
            pending.ty = Some(ty);
            continue;
        }

        if ctx.options().memory_manager && !ctx.kernel.deferred {
            ctx.emit(HANDLE_MARKER)?;
        }
        ctx.emit(&id)?;
        pending.name = id;
        trace!("argument {:?}", pending);
        ctx.kernel.arguments.push(std::mem::take(&mut pending));

        ctx.skip_whitespace()?;
        match ctx.expect_peek()? {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Ok(());
        }
        ctx.check(ctx.peek() == Some(b','), "No coma while in args")?;
        ctx.advance()?;
    }
}

/// `__template` has been consumed: parse `(n,lo-hi,...)` into the listed
/// values, ranges expanded. Nothing is copied to the output.
pub fn template_range<W: Write>(ctx: &mut Context<'_, W>) -> Result<Vec<u32>, CoreError> {
    let open = ctx.take() == Some(b'(');
    ctx.check(open, "__template should declare its range")?;
    let mut range: Vec<u32> = Vec::new();
    let mut dash = false;
    loop {
        let value = ctx.number()?;
        if dash {
            if let Some(&low) = range.last() {
                let span = value.saturating_sub(low) as usize;
                ctx.check(
                    range.len().saturating_add(span) <= MAX_TEMPLATE_VALUES,
                    "Unknown __template range",
                )?;
                range.extend(low.saturating_add(1)..value);
            }
        }
        range.push(value);

        match ctx.take().ok_or_else(|| ctx.exhausted())? {
            b')' => return Ok(range),
            b',' => dash = false,
            b'-' => {
                ctx.check(
                    ctx.peek().is_some_and(|byte| byte.is_ascii_digit()),
                    "Unknown __template range",
                )?;
                dash = true;
            }
            _ => return Err(ctx.fail("Unknown __template range")),
        }
    }
}
