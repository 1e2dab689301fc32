pub mod app;
pub mod cli;
pub mod config;
pub mod interactive;
pub mod logging;
pub mod state;
pub mod utils;
pub mod vtop;
pub mod web;
