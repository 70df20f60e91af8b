use crate::upstream::{
    Credentials, Upstream, UpstreamError, UpstreamResult, fetch, is_dot_segment, join_segments,
    parse_base_url,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;
use url::Url;

pub const DEFAULT_PATH_TEMPLATE: &str = "api/member/individual";

/// USEF member registry.
///
/// Queries `GET {base_url}/{path_template}/{membership_id}/{last_name}` and,
/// when credentials are configured, attaches the signed `Authorization` header.
pub struct Registry {
    client: Client,
    base_url: Url,
    path: Vec<String>,
    authorization: Option<String>,
}

impl Registry {
    /// # Errors
    /// Returns an error if `base_url` is not a usable base URL, the path
    /// template has dot segments or the signature cannot be built from
    /// `credentials`.
    pub fn new(
        client: Client,
        base_url: &str,
        path_template: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;

        let path: Vec<String> = path_template
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        if path.iter().any(|segment| is_dot_segment(segment)) {
            return Err(anyhow!(
                "path template cannot contain '.' or '..' segments: {path_template}"
            ));
        }

        // the signature only depends on static configuration
        let authorization = credentials.map(Credentials::signature).transpose()?;

        Ok(Self {
            client,
            base_url,
            path,
            authorization,
        })
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.authorization.is_some()
    }

    /// # Errors
    /// Returns an error if the base URL cannot carry path segments or either
    /// value is a dot segment.
    pub fn endpoint(&self, membership_id: &str, last_name: &str) -> Result<Url, UpstreamError> {
        join_segments(
            &self.base_url,
            self.path
                .iter()
                .map(String::as_str)
                .chain([membership_id, last_name]),
        )
    }
}

#[async_trait]
impl Upstream for Registry {
    fn name(&self) -> &'static str {
        if self.is_signed() {
            "registry (signed)"
        } else {
            "registry"
        }
    }

    #[instrument(skip(self, last_name), fields(upstream = self.name()))]
    async fn verify(
        &self,
        membership_id: &str,
        last_name: &str,
    ) -> Result<UpstreamResult, UpstreamError> {
        let url = self.endpoint(membership_id, last_name)?;

        fetch(&self.client, url, self.authorization.as_deref(), last_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{APP_USER_AGENT, build_signature, client, testing::serve};
    use axum::{
        Router,
        extract::Path,
        http::{
            HeaderMap, StatusCode,
            header::{ACCEPT, AUTHORIZATION, USER_AGENT},
        },
        routing::get,
    };
    use secrecy::SecretString;
    use std::time::Duration;

    const ROUTE: &str = "/api/member/individual/:id/:last";

    fn registry(base_url: &Url, credentials: Option<&Credentials>) -> Result<Registry> {
        Registry::new(
            client(Duration::from_secs(5))?,
            base_url.as_str(),
            DEFAULT_PATH_TEMPLATE,
            credentials,
        )
    }

    async fn lookup(Path((id, last)): Path<(String, String)>, headers: HeaderMap) -> String {
        let accepts_json = headers
            .get(ACCEPT)
            .is_some_and(|value| value == "application/json");
        let user_agent = headers
            .get(USER_AGENT)
            .is_some_and(|value| value == APP_USER_AGENT);

        (accepts_json && user_agent && id == "12/34" && last == "O'Brien Smith").to_string()
    }

    #[test]
    fn endpoint_encodes_segments() -> Result<()> {
        let base = Url::parse("https://www.usef.org")?;
        let registry = registry(&base, None)?;

        assert_eq!(
            registry.endpoint("123 45", "D'Arcy")?.as_str(),
            "https://www.usef.org/api/member/individual/123%2045/D'Arcy"
        );
        Ok(())
    }

    #[test]
    fn endpoint_refuses_dot_segments() -> Result<()> {
        let base = Url::parse("https://www.usef.org")?;
        let registry = registry(&base, None)?;

        assert!(matches!(
            registry.endpoint(".", "Doe"),
            Err(UpstreamError::DotSegment(_))
        ));
        assert!(matches!(
            registry.endpoint("..", "12345"),
            Err(UpstreamError::DotSegment(_))
        ));
        assert!(matches!(
            registry.endpoint("12345", ".."),
            Err(UpstreamError::DotSegment(_))
        ));
        Ok(())
    }

    #[test]
    fn path_template_with_dot_segments_is_rejected() -> Result<()> {
        let result = Registry::new(
            client(Duration::from_secs(1))?,
            "https://www.usef.org",
            "api/../member",
            None,
        );
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn custom_path_template() -> Result<()> {
        let registry = Registry::new(
            client(Duration::from_secs(1))?,
            "https://api.usef.org/v2/",
            "/members/verify/",
            None,
        )?;

        assert_eq!(
            registry.endpoint("1", "Doe")?.as_str(),
            "https://api.usef.org/v2/members/verify/1/Doe"
        );
        assert_eq!(registry.name(), "registry");
        Ok(())
    }

    #[tokio::test]
    async fn verify_sends_encoded_path_and_headers() -> Result<()> {
        let base = serve(Router::new().route(ROUTE, get(lookup))).await?;
        let registry = registry(&base, None)?;

        assert_eq!(
            registry.verify("12/34", "O'Brien Smith").await?,
            UpstreamResult::verified(true)
        );
        assert_eq!(
            registry.verify("12/34", "Smith").await?,
            UpstreamResult::verified(false)
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_attaches_signature() -> Result<()> {
        let expected = build_signature("client-1", "s3cr3t")?;
        let app = Router::new().route(
            ROUTE,
            get(move |headers: HeaderMap| {
                let expected = expected.clone();
                async move {
                    match headers.get(AUTHORIZATION) {
                        Some(value) if value == expected.as_str() => (StatusCode::OK, "true"),
                        _ => (StatusCode::UNAUTHORIZED, ""),
                    }
                }
            }),
        );
        let base = serve(app).await?;

        let credentials =
            Credentials::new("client-1".to_string(), SecretString::from("s3cr3t".to_string()));
        let signed = registry(&base, Some(&credentials))?;
        assert!(signed.is_signed());
        assert_eq!(signed.name(), "registry (signed)");
        assert_eq!(signed.verify("1", "Doe").await?, UpstreamResult::verified(true));

        let unsigned = registry(&base, None)?;
        assert_eq!(
            unsigned.verify("1", "Doe").await?,
            UpstreamResult::Unreachable(Some(StatusCode::UNAUTHORIZED))
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_not_found_is_unreachable() -> Result<()> {
        let base = serve(Router::new()).await?;
        let registry = registry(&base, None)?;

        assert_eq!(
            registry.verify("1", "Doe").await?,
            UpstreamResult::Unreachable(Some(StatusCode::NOT_FOUND))
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_deadline_is_unreachable() -> Result<()> {
        let app = Router::new().route(
            ROUTE,
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "true"
            }),
        );
        let base = serve(app).await?;
        let registry = Registry::new(
            client(Duration::from_millis(200))?,
            base.as_str(),
            DEFAULT_PATH_TEMPLATE,
            None,
        )?;

        assert_eq!(
            registry.verify("1", "Doe").await?,
            UpstreamResult::Unreachable(None)
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_connection_refused_is_transport_error() -> Result<()> {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let base = Url::parse(&format!("http://{addr}"))?;
        let registry = registry(&base, None)?;

        let result = registry.verify("1", "Doe").await;
        assert!(matches!(result, Err(UpstreamError::Transport(_))));
        Ok(())
    }
}
