//! Adapters for the two external collaborators: language-model backends and
//! the diagram renderer process.

pub mod model;
pub mod render;
