pub mod command;
pub mod config;

pub use command::{execute, CliCommand};
pub use config::CliConfig;
