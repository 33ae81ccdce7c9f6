//! Ambient helpers shared by the shelter binaries: logging setup.

pub mod utils;
