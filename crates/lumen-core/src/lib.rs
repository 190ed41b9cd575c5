//! Types shared by every Lumen feature crate

#![allow(clippy::must_use_candidate)]

mod context;
mod error;

pub use context::{PROVIDER_API_KEY_HEADER, RequestContext};
pub use error::{ErrorBody, ErrorEnvelope, HttpError};
