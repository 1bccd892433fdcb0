//! Core library for the MAKINA OPS console.
//!
//! - `auth`: the session store (current user + token pair) and its
//!   durable storage backends
//! - `api`: the authenticated transport with silent token refresh, login,
//!   and CRUD clients for the console's resources
//! - `config`: on-disk configuration with environment overrides
//! - `models`: identity and auth payload types

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest, AuthInterceptor, Resource};
pub use auth::{Session, SessionEvent, SessionStore};
pub use config::Config;
pub use models::{Role, TokenPair, User, UserId};
