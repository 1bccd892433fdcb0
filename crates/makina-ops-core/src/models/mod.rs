//! Data models shared by the session store and the API clients.
//!
//! - `User`, `Role`, `UserId`: identity carried by a session
//! - `TokenPair`, `LoginResponse`: auth endpoint payloads

pub mod auth;
pub mod user;

pub use auth::{unwrap_envelope, LoginResponse, TokenPair};
pub use user::{Role, User, UserId};
