//! mediarec: capture audio/video clips behind a single session controller.

pub mod api;
pub mod app;
pub mod capture;
pub mod cli;
pub mod config;
pub mod global;
pub mod session;
