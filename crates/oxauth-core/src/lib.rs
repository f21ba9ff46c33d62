//! Domain entity model for the OxAuth persistence layer.
//!
//! This crate defines the four core entity kinds persisted by an OAuth 2.0 /
//! OpenID Connect authorization server:
//!
//! - [`Application`] - a registered client
//! - [`Authorization`] - a recorded consent/grant for a subject and client
//! - [`Scope`] - a named permission/resource-access unit
//! - [`Token`] - an issued credential
//!
//! The types here are pure data: serde-serializable, with no storage or I/O
//! concerns. Storage engines (see `oxauth-stores`) own key construction,
//! indexing, and concurrency control on top of these models.

pub mod application;
pub mod authorization;
pub mod constants;
pub mod scope;
pub mod token;

pub use application::Application;
pub use authorization::Authorization;
pub use scope::Scope;
pub use token::Token;
