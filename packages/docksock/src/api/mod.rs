//! Endpoint wrappers
//!
//! Parameter marshalling for the container and image endpoints on top of
//! [`DockerSocket`](crate::client::socket::DockerSocket).

pub mod containers;
pub mod images;
pub mod models;
