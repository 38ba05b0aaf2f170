pub mod cli;
pub mod config;
pub mod core;
pub mod tui;
pub mod web;
