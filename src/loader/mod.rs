//! Runtime module resolution.
//!
//! The host runtime's loader hooks call into this module (through
//! `moorage resolve` / `moorage load`) for every import of the running
//! process:
//! - `resolve`: alias rewriting and index/extension probing
//! - `load`: redirection of `.tsx` sources to the compiled-artifact cache

pub mod load;
pub mod resolve;

pub use load::{LoadError, LoadResult, ModuleLoader};
pub use resolve::{find_file, is_builtin, ModuleResolver, Resolution, ResolutionError};
