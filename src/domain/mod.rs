//! Domain layer types and invariants.

pub mod error;
pub mod request;
pub mod template_url;
