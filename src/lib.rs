// SPDX-License-Identifier: GPL-3.0-only

//! Curio - a personal collection inventory
//!
//! Users sign in, group their things into collections, and give each item
//! a photo taken with the camera or imported from a file.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera enumeration, streams and the capture session
//! - [`pipelines`]: Turning frames and image files into storable images
//! - [`store`]: Document store abstraction with memory and JSON file backends
//! - [`auth`]: Identity provider and the signed-in guard
//! - [`inventory`]: Collections, items and the inventory check
//! - [`forms`]: Draft state for editing items and collections
//! - [`config`]: User configuration handling
//! - [`terminal`]: Live preview and capture in the terminal

pub mod auth;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod forms;
pub mod inventory;
pub mod pipelines;
pub mod store;
pub mod terminal;

// Re-export commonly used types
pub use backends::camera::CaptureSessionManager;
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use inventory::Inventory;
pub use pipelines::photo::{ImageNormalizer, NormalizedImage};
