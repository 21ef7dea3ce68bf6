//! cookiepress: render cookiecutter templates on demand and hand the project back as a zip.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
