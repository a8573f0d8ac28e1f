//! Data models for Costwatch

mod status;

pub use status::*;
