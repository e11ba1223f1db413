pub mod cli;
pub mod client;
pub mod generate;
pub mod provision;
pub mod rest;
pub mod session;

pub use cli::{run, Cli, Commands};
