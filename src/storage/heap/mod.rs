pub mod file;
pub mod page;
pub mod scan;
