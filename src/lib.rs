//! vcsdeps - version-control dependency resolution
//!
//! Resolves dependencies that live in source repositories to local working
//! directories, reusing checkouts across builds and supporting fully offline
//! builds from previously recorded checkouts.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod repository;
pub mod resolver;
pub mod ui;
pub mod vcs;
pub mod version;

pub use error::{VcsError, VcsResult};
