pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Gateway service module
pub mod utils;
