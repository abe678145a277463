//! MaskFE core: paint a highlight over a photo, compile it into a binary
//! edit mask, and hand photo, mask, references and prompt to an image
//! generator.

pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
