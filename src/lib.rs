pub mod api;
pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod pipeline;
pub mod policy;
pub mod types;
