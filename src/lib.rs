pub mod config;
pub mod inventory;
pub mod report;
pub mod session;
pub mod shell;
