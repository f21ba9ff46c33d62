//! Well-known attribute values.
//!
//! Statuses, authorization kinds, and client metadata values are open
//! string-typed: a deployment may introduce its own values, so the model
//! stores plain strings and this module only names the values the engine
//! itself gives meaning to (the retention pruner compares against
//! [`statuses::VALID`]; everything else is pass-through).

/// Entity status values.
pub mod statuses {
    /// The entity is inactive (e.g. a consent that was withdrawn).
    pub const INACTIVE: &str = "inactive";
    /// The token has been redeemed (single-use tokens).
    pub const REDEEMED: &str = "redeemed";
    /// The entity has been rejected.
    pub const REJECTED: &str = "rejected";
    /// The entity has been revoked.
    pub const REVOKED: &str = "revoked";
    /// The entity is valid and usable.
    pub const VALID: &str = "valid";
}

/// Authorization kinds.
pub mod authorization_kinds {
    /// An ad-hoc authorization, meaningful only while live tokens reference it.
    pub const AD_HOC: &str = "ad-hoc";
    /// An ordinary, explicitly granted authorization.
    pub const PERMANENT: &str = "permanent";
}

/// Client types.
pub mod client_types {
    /// A confidential client able to keep a secret.
    pub const CONFIDENTIAL: &str = "confidential";
    /// A public client (native/SPA) without a secret.
    pub const PUBLIC: &str = "public";
}

/// Consent types.
pub mod consent_types {
    /// Consent is requested from the subject on first use.
    pub const EXPLICIT: &str = "explicit";
    /// Consent is implied and never shown.
    pub const IMPLICIT: &str = "implicit";
    /// Consent is always re-requested.
    pub const SYSTEMATIC: &str = "systematic";
}

/// Token kinds.
pub mod token_kinds {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const DEVICE_CODE: &str = "device_code";
    pub const ID_TOKEN: &str = "id_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const USER_CODE: &str = "user_code";
}
