pub mod config;
pub mod format;
pub mod pidof;
pub mod proc;
pub mod report;
