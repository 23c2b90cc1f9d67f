// Mediax library - on-demand media transformation cache

pub mod config;
pub mod constants;
pub mod directives;
pub mod edge;
pub mod engine;
pub mod error;
pub mod formats;
pub mod logging;
pub mod resolver;
pub mod server;
pub mod storage;
