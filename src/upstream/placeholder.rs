use crate::upstream::{Upstream, UpstreamError, UpstreamResult, fetch, join_segments, parse_base_url};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;
use url::Url;

/// Public JSON test API standing in for the registry.
///
/// Looks the membership ID up as `GET {base_url}/users/{membership_id}` and
/// validates by matching the returned `name` against the last name.
pub struct Placeholder {
    client: Client,
    base_url: Url,
}

impl Placeholder {
    /// # Errors
    /// Returns an error if `base_url` is not a usable base URL.
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// # Errors
    /// Returns an error if the base URL cannot carry path segments.
    pub fn endpoint(&self, membership_id: &str) -> Result<Url, UpstreamError> {
        join_segments(&self.base_url, ["users", membership_id])
    }
}

#[async_trait]
impl Upstream for Placeholder {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn test_mode(&self) -> bool {
        true
    }

    #[instrument(skip(self, last_name), fields(upstream = self.name()))]
    async fn verify(
        &self,
        membership_id: &str,
        last_name: &str,
    ) -> Result<UpstreamResult, UpstreamError> {
        let url = self.endpoint(membership_id)?;

        fetch(&self.client, url, None, last_name).await
    }
}
