//! Preprocessor configuration.

/// Switches and build parameters that shape the generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Kernel arguments are symbolic handles resolved through the
    /// memory manager's address function.
    pub memory_manager: bool,
    /// `__jit` kernels are wrapped in the runtime-compilation shim.
    /// When off, `__jit` is accepted and ignored.
    pub jit: bool,
    /// Compiler invoked by the generated code at run time.
    pub compiler: String,
    pub build_flags: String,
    /// Passed as `-I` to the runtime compiler.
    pub source_dir: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            memory_manager: false,
            jit: false,
            compiler: "c++".to_string(),
            build_flags: String::new(),
            source_dir: ".".to_string(),
        }
    }
}

impl Options {
    /// Full command line embedded in the jit dispatch code.
    pub fn compile_command(&self) -> String {
        format!("{} {} -O3 -std=c++11 -Wall", self.compiler, self.build_flags)
    }
}
