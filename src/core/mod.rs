//! Core Components
//!
//! Core infrastructure: HTTP transport and PKCE primitives.

pub mod pkce;
pub mod transport;

pub use pkce::*;
pub use transport::*;
