use crate::{GIT_COMMIT_HASH, upstream::SharedUpstream};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    upstream: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Service is running", body = Health),
    ),
    tag = "health",
)]
/// Report build metadata and the configured upstream.
///
/// `OPTIONS` gets the same headers with an empty body. The registry is not
/// called, so an upstream outage never fails the probe.
pub async fn health(
    method: Method,
    Extension(upstream): Extension<SharedUpstream>,
) -> impl IntoResponse {
    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream: upstream.name().to_string(),
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new());

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    (StatusCode::OK, headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{Upstream, UpstreamError, UpstreamResult};
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use serde_json::Value;
    use std::sync::Arc;

    struct Offline;

    #[async_trait]
    impl Upstream for Offline {
        fn name(&self) -> &'static str {
            "offline"
        }

        async fn verify(&self, _: &str, _: &str) -> Result<UpstreamResult, UpstreamError> {
            Ok(UpstreamResult::Unreachable(None))
        }
    }

    #[tokio::test]
    async fn health_get_reports_upstream() -> Result<()> {
        let response = health(Method::GET, Extension(Arc::new(Offline) as SharedUpstream))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let x_app = response
            .headers()
            .get("X-App")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        assert!(
            x_app.is_some_and(|value| value.starts_with(&format!(
                "{}:{}:",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            )))
        );

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: Value = serde_json::from_slice(&body)?;
        assert_eq!(json["upstream"], "offline");
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
        Ok(())
    }

    #[tokio::test]
    async fn health_options_returns_empty_body() -> Result<()> {
        let response = health(
            Method::OPTIONS,
            Extension(Arc::new(Offline) as SharedUpstream),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(body.is_empty());
        Ok(())
    }
}
