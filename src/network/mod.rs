//! HTTP fetch client
//!
//! A [`Request`] describes a call relative to a base URL; [`NetworkClient`]
//! executes it with `reqwest` and either returns the body or streams it into a
//! temporary file that is then moved into place.

mod client;
mod request;

pub use client::{FileFetcher, NetworkClient};
pub use request::{HttpMethod, ParameterEncoding, Request};
