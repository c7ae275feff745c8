pub mod config;
pub mod error;
pub mod logging;
pub mod matching;
pub mod models;
pub mod ui_dump;
