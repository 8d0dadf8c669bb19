pub mod config;
pub mod logger;

pub use config::{get_data_dir, load_app_config, save_app_config};
pub use logger::{bootstrap_logger, init_logger};
