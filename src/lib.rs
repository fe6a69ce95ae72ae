pub mod buffer;
pub mod catalog;
pub mod common;
pub mod config;
pub mod error;
pub mod printer;
pub mod storage;
pub mod tuple;
