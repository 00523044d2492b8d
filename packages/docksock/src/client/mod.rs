//! Client module
//!
//! The versioned client built on top of the transport, together with
//! version negotiation and registry authentication.

pub mod auth;
pub mod socket;
pub mod version;
