pub mod cli;
pub mod init;
pub mod logging;
pub mod report;
