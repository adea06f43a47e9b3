//! Byte-level scanner for the kpp preprocessor.
//!
//! The scanner owns the whole scanning state of a run: the input bytes,
//! the read position, the physical line counter and the output sink.
//! Bytes are copied to the sink as they are consumed unless a caller
//! intercepts them, so ordinary code flows through untouched while the
//! directive handlers rewrite what they recognize.

use std::io::Write;

use crate::error::CoreError;
use crate::kernel::Kernel;
use crate::options::Options;

/// Longest identifier `peek_ident` looks at.
pub const MAX_PEEK_IDENT: usize = 64;

/// Scanning state of a single run.
pub struct Context<'a, W: Write> {
    source: &'a [u8],
    index: usize,
    line: usize,
    file: String,
    out: W,
    options: &'a Options,
    pub(crate) kernel: Kernel,
    /// Depth inside an open jit kernel body. `None` when not tracking.
    pub(crate) body_depth: Option<usize>,
}

impl<'a, W: Write> Context<'a, W> {
    pub fn new(source: &'a [u8], file: impl Into<String>, options: &'a Options, out: W) -> Self {
        Self {
            source,
            index: 0,
            line: 1,
            file: file.into(),
            out,
            options,
            kernel: Kernel::default(),
            body_depth: None,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn options(&self) -> &'a Options {
        self.options
    }

    /// Kernel currently (or most recently) processed.
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn flush(&mut self) -> Result<(), CoreError> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Replaces the current kernel with a fresh one.
    pub(crate) fn begin_kernel(&mut self, jit: bool) {
        self.kernel = Kernel::new(jit && self.options.jit);
    }

    pub fn peek(&self) -> Option<u8> {
        self.source.get(self.index).copied()
    }

    /// Up to `n` unread bytes; shorter near the end of input.
    pub fn peek_n(&self, n: usize) -> &'a [u8] {
        let source = self.source;
        let end = self.index.saturating_add(n).min(source.len());
        &source[self.index..end]
    }

    /// Like `peek`, but end of input is an error.
    pub fn expect_peek(&self) -> Result<u8, CoreError> {
        self.peek().ok_or_else(|| self.exhausted())
    }

    /// Consumes one byte without copying it.
    pub fn take(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.index += 1;
        Some(byte)
    }

    /// Consumes one byte and copies it to the output.
    pub fn advance(&mut self) -> Result<Option<u8>, CoreError> {
        let Some(byte) = self.take() else {
            return Ok(None);
        };
        if byte == b'\n' {
            self.line += 1;
        }
        self.out.write_all(&[byte])?;
        Ok(Some(byte))
    }

    /// Writes generated text. Does not move the line counter.
    pub fn emit(&mut self, text: &str) -> Result<(), CoreError> {
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn skip_whitespace(&mut self) -> Result<(), CoreError> {
        while self.peek().is_some_and(is_space) {
            self.advance()?;
        }
        Ok(())
    }

    /// Consumes a non-empty identifier without copying it.
    pub fn ident(&mut self) -> Result<String, CoreError> {
        self.check(
            self.peek().is_some_and(is_ident_byte),
            "Name w/o alnum 1st letter",
        )?;
        Ok(self.take_ident())
    }

    /// Consumes a possibly empty identifier without copying it.
    pub fn take_ident(&mut self) -> String {
        let start = self.index;
        while self.peek().is_some_and(is_ident_byte) {
            self.index += 1;
        }
        String::from_utf8_lossy(&self.source[start..self.index]).into_owned()
    }

    /// The identifier starting at the read position, capped at
    /// [`MAX_PEEK_IDENT`] bytes. Nothing is consumed.
    pub fn peek_ident(&self) -> &'a str {
        let source = self.source;
        let rest = &source[self.index..];
        let len = rest
            .iter()
            .take(MAX_PEEK_IDENT)
            .take_while(|byte| is_ident_byte(**byte))
            .count();
        std::str::from_utf8(&rest[..len]).unwrap_or_default()
    }

    /// Consumes a decimal number without copying it.
    pub fn number(&mut self) -> Result<u32, CoreError> {
        let start = self.index;
        while self.peek().is_some_and(|byte| byte.is_ascii_digit()) {
            self.index += 1;
        }
        std::str::from_utf8(&self.source[start..self.index])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| self.fail("Unknown number"))
    }

    pub fn at_comment(&self) -> bool {
        matches!(self.peek_n(2), b"//" | b"/*")
    }

    /// Copies the comment at the read position verbatim.
    pub fn skip_comment(&mut self) -> Result<(), CoreError> {
        self.advance()?;
        if self.advance()? == Some(b'/') {
            self.line_comment()
        } else {
            self.block_comment()
        }
    }

    fn line_comment(&mut self) -> Result<(), CoreError> {
        while self.peek().is_some_and(|byte| byte != b'\n') {
            self.advance()?;
        }
        Ok(())
    }

    fn block_comment(&mut self) -> Result<(), CoreError> {
        while let Some(byte) = self.advance()? {
            if byte == b'*' && self.peek() == Some(b'/') {
                self.advance()?;
                return self.skip_whitespace();
            }
        }
        Ok(())
    }

    pub fn fail(&self, message: impl Into<String>) -> CoreError {
        CoreError::Parse {
            line: self.line,
            file: self.file.clone(),
            message: message.into(),
        }
    }

    pub fn exhausted(&self) -> CoreError {
        CoreError::ScanExhausted {
            line: self.line,
            file: self.file.clone(),
        }
    }

    pub fn check(&self, condition: bool, message: &str) -> Result<(), CoreError> {
        if condition {
            Ok(())
        } else {
            Err(self.fail(message))
        }
    }
}

/// Whitespace as classified by C `isspace`.
pub fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

pub fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
