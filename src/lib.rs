pub mod cli;
pub mod resolver;
pub mod server;
pub mod staging;
