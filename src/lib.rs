pub mod api;
pub mod args;
pub mod backup;
pub mod cache;
pub mod carry;
pub mod commands;
mod config;
mod error;
pub mod ledger;
pub mod model;
pub mod server;
pub mod summary;
pub mod sync;
mod utils;


pub use api::Mode;
pub use config::Config;
pub use error::Error;
pub use error::ErrorType;
pub use error::Result;
pub use ledger::{Ledger, Saved};
