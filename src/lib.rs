//! bookshelf-rs: a book catalog and reading-tracker backend.
//!
//! This crate provides a JSON HTTP API for browsing a book catalog,
//! recording reading sessions and keeping a personal shelf, with
//! per-book and per-category reading statistics.
//!
//! # Features
//!
//! - Catalog search, recent, upcoming and best-seller listings
//! - Completion rate and expected reading time per book and category
//! - Reviews and review likes
//! - Personal libraries with lazy creation
//! - Phone number sign-up, Kakao sign-in and SMS verification codes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Shelves, book views and catalog import.
pub mod library;
/// Third-party sign-in.
pub mod oauth;
/// HTTP server.
pub mod server;
/// SMS verification codes.
pub mod sms;
/// Reading statistics.
pub mod stats;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
