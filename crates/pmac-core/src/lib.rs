pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod paths;
pub mod schema;
pub mod sync;
pub mod tracker;
pub mod validate;

#[cfg(test)]
mod fixtures;

pub use error::{PmacError, Result, TrackerError};
