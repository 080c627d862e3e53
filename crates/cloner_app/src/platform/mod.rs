mod app;
mod cli;
mod config;
mod render;

pub use app::run_app;
