//! Request middleware.
//!
//! - [`rate_limit::rate_limit`] -- per-client, per-endpoint admission.

pub mod rate_limit;
