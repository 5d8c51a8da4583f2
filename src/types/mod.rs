//! Types
//!
//! Core type definitions for credentials, configuration, and authorization.

pub mod auth;
pub mod config;
pub mod token;

pub use auth::*;
pub use config::*;
pub use token::*;
