//! Core of the kpp kernel preprocessor.
//!
//! kpp rewrites C++ sources annotated with kernel directives:
//!
//!   `__kernel void f(ARGS) { ... }`       kernel, optionally bound to
//!                                         memory-manager handles
//!   `__jit __kernel void f(ARGS) { ... }` kernel compiled at run time,
//!                                         specialized on its const scalars
//!   `__template(1,3-5)`                   range annotation in ARGS
//!
//! The pipeline is a single pass:
//!
//!   source bytes
//!     -> scanner  (byte cursor, comments, identifiers, line counting)
//!     -> driver   (directive dispatch, passthrough of everything else)
//!     -> parser   (kernel signature and argument analysis)
//!     -> codegen  (jit prefix/postfix, address bindings)
//!
//! The CLI crate only handles paths and process exit codes and should
//! stay a thin layer over [`preprocess`].

// ---------------------------------------------------------------------
// Error handling and configuration
// ---------------------------------------------------------------------

pub mod error;
pub mod options;

// ---------------------------------------------------------------------
// Front-end: scanning and parsing
// ---------------------------------------------------------------------

pub mod scanner;
pub mod kernel;
pub mod parser;

// ---------------------------------------------------------------------
// Back-end: code generation and driver
// ---------------------------------------------------------------------

pub mod codegen;
pub mod driver;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use driver::{preprocess, preprocess_file, preprocess_str};
pub use error::CoreError;
pub use kernel::{Argument, BaseType, Kernel};
pub use options::Options;
