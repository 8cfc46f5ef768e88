pub mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod report;
pub mod resources;
pub mod session;
mod utils;

#[cfg(test)]
mod test;

pub use api::{ApiClient, Mode};
pub use config::Config;
pub use error::{ClientError, Error, Res, Result};
