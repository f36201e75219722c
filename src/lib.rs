//! someimage: image downloader bootstrap.
//!
//! Reads the YAML/JSON config file and builds the logger it describes.

pub mod cli;
pub mod config;
pub mod utils;
