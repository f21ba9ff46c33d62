//! Entity stores and the persistence engine behind them.
//!
//! The four public stores ([`ApplicationStore`], [`AuthorizationStore`],
//! [`ScopeStore`], [`TokenStore`]) are thin façades over a shared engine:
//!
//! - optimistic concurrency control for every create/update,
//! - derived index projections kept in lockstep with their source lists,
//! - a closed, index-backed lookup surface,
//! - forward-only cursor paging with `(count, offset)` semantics,
//! - retention sweeps for authorizations and tokens.
//!
//! Stores are constructed over any [`oxauth_storage::KeyValueTable`] backend
//! and hold no mutable state of their own, so one instance can serve
//! concurrent callers.

mod artifact;
mod cas;
mod codec;
mod pager;
mod projection;
mod pruner;
mod query;

mod application;
mod authorization;
mod scope;
mod token;

pub use application::ApplicationStore;
pub use authorization::{AuthorizationFilter, AuthorizationStore};
pub use scope::ScopeStore;
pub use token::{TokenFilter, TokenStore};
