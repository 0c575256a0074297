#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod cli;
pub mod comments;
pub mod config;
pub mod data;
pub mod events;
pub mod favorites;
pub mod gallery;
pub mod ordering;
pub mod search;
pub mod storage;
pub mod unsplash;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
