//! Command implementations.

pub mod build;
pub mod completions;
pub mod deps;
pub mod load;
pub mod resolve;
pub mod run;
pub mod sync;
pub mod tree;
pub mod watch;
