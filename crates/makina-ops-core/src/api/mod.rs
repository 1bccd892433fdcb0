//! REST API layer for the MAKINA OPS backend.
//!
//! - `Transport` / `HttpTransport`: one raw HTTP call
//! - `AuthInterceptor`: bearer token attachment and single-flight refresh
//! - `ApiClient`: login, logout, and access to the resource clients
//! - `ResourceApi`: list/get/create/update/remove for each `Resource`
//!
//! The API uses bearer token authentication; access tokens are refreshed
//! transparently through `POST /auth/refresh`.

pub mod client;
pub mod error;
pub mod interceptor;
pub mod request;
pub mod resources;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ApiClient;
pub use error::ApiError;
pub use interceptor::AuthInterceptor;
pub use request::ApiRequest;
pub use resources::{Resource, ResourceApi};
pub use transport::{HttpTransport, Transport};
