//! OTSrv Core - Fundamental types and utilities

mod error;
mod types;
mod time;

pub use error::*;
pub use types::*;
pub use time::*;
