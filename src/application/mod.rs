//! Application services: the generation pipeline and its rendering engines.

pub mod error;
pub mod generate;
pub mod render;
