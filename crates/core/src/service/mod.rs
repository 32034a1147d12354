//! Job Service abstraction.
//!
//! This module provides a `JobService` trait for the remote endpoint set that
//! accepts submissions and reports job status, plus an HTTP implementation.

mod http;
mod types;

pub use http::HttpJobService;
pub(crate) use types::number_value;
pub use types::*;
