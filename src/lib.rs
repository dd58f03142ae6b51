// stdio-bench - Library root for testing

pub mod bench;
pub mod config;
pub mod error;
