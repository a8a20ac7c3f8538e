//! CLI command implementations

mod config;
mod connect;
mod ports;
mod start;

pub use config::{config_file_path, config_init, config_path, config_show, load_launcher_config};
pub use connect::connect_command;
pub use ports::ports_command;
pub use start::{start_command, StartArgs};
