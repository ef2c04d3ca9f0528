pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod invoker;
pub mod pipeline;
pub mod server;
