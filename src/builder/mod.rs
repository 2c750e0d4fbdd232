//! Compiler integration.
//!
//! This module drives the external incremental compiler and defines the
//! machine-readable build event schema.

pub mod compiler;
pub mod events;

pub use compiler::{CompileOutput, CompileRequest, Compiler, TscCompiler};
pub use events::BuildEvent;
