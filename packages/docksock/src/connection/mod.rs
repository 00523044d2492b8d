//! Connection module
//!
//! Socket discovery, wire requests and response handling for a single
//! exchange with the daemon.

pub mod locator;
pub mod request;
pub mod response;
pub mod stream;
pub mod transport;
