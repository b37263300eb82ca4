//! Side-effecting adapters: the production execution primitive and the git
//! wrapper built on it.

pub mod git;
pub mod process;
