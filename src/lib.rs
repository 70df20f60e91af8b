//! # USEF Validator
//!
//! `usef-validator` answers a single question for a front-end form: does this
//! USEF membership ID belong to a member with this last name?
//!
//! Every request is stateless. The inbound `POST /api/validate-usef` payload is
//! checked and trimmed, one outbound call is made to the configured membership
//! registry, and whatever comes back is normalized into
//! `{ "valid": bool, ... }`.
//!
//! ## Upstreams
//!
//! The registry is reached through the [`upstream::Upstream`] trait:
//!
//! - [`upstream::registry::Registry`]: the USEF member API, optionally with an
//!   HMAC-SHA256 signed `Authorization` header.
//! - [`upstream::placeholder::Placeholder`]: a public JSON test API used to
//!   exercise the flow without registry access (responses carry `testMode`).
//!
//! Upstream outages degrade to `valid: false` with an explanatory message and
//! status `200`, so the calling UI only has to look at `valid`.

pub mod api;
pub mod cli;
pub mod upstream;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
