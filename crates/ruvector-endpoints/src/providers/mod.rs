//! Provider abstractions for the managed model-serving platform
//!
//! The control plane manages endpoint lifecycle (describe / create); the data
//! plane invokes a running endpoint. `HttpControlPlane` implements both over a
//! JSON/REST API.

pub mod control_plane;
pub mod data_plane;
pub mod http;

pub use control_plane::{ControlPlane, EndpointDescription};
pub use data_plane::DataPlane;
pub use http::HttpControlPlane;
