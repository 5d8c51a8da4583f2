//! Authorization Flows
//!
//! Interactive flows that obtain an initial credential. Non-interactive
//! refresh lives in [`crate::token`].

pub mod authorization;

pub use authorization::AuthCodeFlow;
