pub mod interpret;
pub mod placeholder;
pub mod registry;
pub mod signature;

pub use self::interpret::interpret;
pub use self::signature::{Credentials, build_signature};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::Serialize;
use serde_json::Value;
use std::{str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

/// Fixed `User-Agent` announced to the registry.
pub const APP_USER_AGENT: &str = "USEF-Validator/1.0";

pub type SharedUpstream = Arc<dyn Upstream>;

/// Tri-state outcome of a verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamResult {
    /// The registry gave a verdict. `member` is set when it answered with a
    /// member object instead of a plain boolean.
    Verified {
        valid: bool,
        member: Option<MemberRecord>,
    },
    /// Success status but a body that carries no verdict.
    Malformed(String),
    /// Non-success status, or `None` when the call ran past its deadline.
    Unreachable(Option<StatusCode>),
}

impl UpstreamResult {
    #[must_use]
    pub fn verified(valid: bool) -> Self {
        Self::Verified {
            valid,
            member: None,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Verified { valid: true, .. })
    }
}

/// Member fields echoed back to the caller when the upstream returns an object.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl MemberRecord {
    /// Case-insensitive substring match of `last_name` against the member name.
    #[must_use]
    pub fn matches(&self, last_name: &str) -> bool {
        self.name
            .to_lowercase()
            .contains(&last_name.to_lowercase())
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream base URL cannot carry path segments: {0}")]
    BaseUrl(String),
    #[error("path segment {0:?} cannot be sent literally")]
    DotSegment(String),
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A membership registry that can answer "is this member valid?".
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Short name used in logs and `/health`.
    fn name(&self) -> &'static str;

    /// Responses produced through this upstream are flagged with `testMode`.
    fn test_mode(&self) -> bool {
        false
    }

    /// Issue exactly one outbound call and interpret its response.
    ///
    /// # Errors
    /// Returns [`UpstreamError`] on transport failures other than the
    /// deadline, which maps to [`UpstreamResult::Unreachable`].
    async fn verify(
        &self,
        membership_id: &str,
        last_name: &str,
    ) -> Result<UpstreamResult, UpstreamError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Registry,
    Placeholder,
}

impl UpstreamKind {
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Registry => "https://www.usef.org",
            Self::Placeholder => "https://jsonplaceholder.typicode.com",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Placeholder => "placeholder",
        }
    }
}

impl FromStr for UpstreamKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "registry" => Ok(Self::Registry),
            "placeholder" => Ok(Self::Placeholder),
            _ => Err(anyhow!("unknown upstream: {s}")),
        }
    }
}

/// HTTP client shared by every upstream call.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Error creating reqwest client")
}

/// Parse a base URL and make sure path segments can be appended to it.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url).with_context(|| format!("invalid base URL: {base_url}"))?;

    if url.cannot_be_a_base() {
        return Err(anyhow!("base URL cannot carry path segments: {base_url}"));
    }

    Ok(url)
}

/// `.` and `..` are resolved away by URL normalization, even percent-encoded.
#[must_use]
pub fn is_dot_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

/// Append percent-encoded `segments` to `base`.
///
/// Dot segments are refused instead of being silently dropped, which would
/// shift every following segment into the wrong position.
pub(crate) fn join_segments<'a, I>(base: &Url, segments: I) -> Result<Url, UpstreamError>
where
    I: IntoIterator<Item = &'a str>,
{
    let segments: Vec<&str> = segments.into_iter().collect();

    if let Some(segment) = segments.iter().find(|segment| is_dot_segment(segment)) {
        return Err(UpstreamError::DotSegment((*segment).to_string()));
    }

    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| UpstreamError::BaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send a `GET` to `url` and feed the response to [`interpret`].
#[instrument(skip_all, fields(url = %url))]
pub(crate) async fn fetch(
    client: &Client,
    url: Url,
    authorization: Option<&str>,
    last_name: &str,
) -> Result<UpstreamResult, UpstreamError> {
    let mut request = client.get(url).header(ACCEPT, "application/json");

    if let Some(authorization) = authorization {
        request = request.header(AUTHORIZATION, authorization);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            warn!("Upstream deadline exceeded: {e}");
            return Ok(UpstreamResult::Unreachable(None));
        }
        Err(e) => return Err(e.into()),
    };

    let status = response.status();

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) if e.is_timeout() => {
            warn!("Upstream deadline exceeded while reading body: {e}");
            return Ok(UpstreamResult::Unreachable(None));
        }
        Err(e) => return Err(e.into()),
    };

    debug!("Upstream response: {} {:?}", status, body);

    Ok(interpret(status, &body, last_name))
}
