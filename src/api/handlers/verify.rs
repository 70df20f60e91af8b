use crate::upstream::{MemberRecord, SharedUpstream, UpstreamResult, is_dot_segment};
use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

pub const MISSING_FIELDS: &str = "Membership ID and Last Name are required";
pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const UNABLE_TO_VERIFY: &str =
    "Unable to verify membership. Please check your information and try again.";
pub const TEST_USER_NOT_FOUND: &str = "User not found in test database";
pub const MALFORMED_RESPONSE: &str = "Unexpected response from membership registry.";
pub const UNEXPECTED_FAILURE: &str = "An error occurred during validation. Please try again later.";
pub const TEST_UNEXPECTED_FAILURE: &str = "An error occurred during test validation";

/// Inbound body as sent by the form. Fields are loosely typed on purpose:
/// numeric membership IDs are accepted and converted to text.
#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[schema(value_type = String)]
    membership_id: Option<Value>,
    #[schema(value_type = String)]
    last_name: Option<Value>,
}

/// Sanitized verification request, both fields trimmed and non-empty.
///
/// Both values become URL path segments, so `.` and `..` count as missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub membership_id: String,
    pub last_name: String,
}

impl VerificationRequest {
    #[must_use]
    pub fn parse(payload: Payload) -> Option<Self> {
        Some(Self {
            membership_id: field(payload.membership_id)?,
            last_name: field(payload.last_name)?,
        })
    }
}

fn field(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };

    if text.is_empty() || is_dot_segment(&text) {
        None
    } else {
        Some(text)
    }
}

#[derive(ToSchema, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    message: String,
}

#[derive(ToSchema, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub user_data: Option<MemberRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl VerificationResponse {
    #[must_use]
    pub fn rejected(error: &str) -> Self {
        Self {
            valid: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    /// Map an upstream outcome to the body returned with status `200`.
    #[must_use]
    pub fn from_outcome(
        request: &VerificationRequest,
        outcome: UpstreamResult,
        test_mode: bool,
    ) -> Self {
        let response = match outcome {
            UpstreamResult::Verified {
                valid,
                member: None,
            } => Self {
                valid,
                membership_id: Some(request.membership_id.clone()),
                ..Self::default()
            },

            UpstreamResult::Verified {
                valid,
                member: Some(member),
            } => {
                let message = if valid {
                    format!("✓ Verified! Found user: {}", member.name)
                } else {
                    format!(
                        "✗ Name \"{}\" doesn't match user: {}",
                        request.last_name, member.name
                    )
                };

                Self {
                    valid,
                    membership_id: Some(request.membership_id.clone()),
                    message: Some(message),
                    user_data: Some(member),
                    ..Self::default()
                }
            }

            UpstreamResult::Unreachable(status) => {
                warn!("Membership registry unavailable: {:?}", status);

                Self::rejected(if test_mode {
                    TEST_USER_NOT_FOUND
                } else {
                    UNABLE_TO_VERIFY
                })
            }

            UpstreamResult::Malformed(body) => {
                warn!("Unrecognized registry response: {:?}", body);

                Self::rejected(MALFORMED_RESPONSE)
            }
        };

        Self {
            test_mode: test_mode.then_some(true),
            ..response
        }
    }
}

#[utoipa::path(
    post,
    path= "/api/validate-usef",
    request_body = Payload,
    responses (
        (status = 200, description = "Verification result, `valid` is false when the member could not be verified", body = VerificationResponse, content_type = "application/json"),
        (status = 400, description = "Membership ID or last name missing", body = VerificationResponse),
        (status = 405, description = "Method not allowed", body = VerificationResponse),
        (status = 500, description = "Unexpected failure calling the registry", body = VerificationResponse),
    ),
    tag = "verify",
)]
// axum handler for verify
#[instrument(skip_all, fields(upstream = upstream.name()))]
pub async fn verify(
    Extension(upstream): Extension<SharedUpstream>,
    payload: Option<Json<Payload>>,
) -> impl IntoResponse {
    let Some(request) = payload.and_then(|Json(payload)| VerificationRequest::parse(payload))
    else {
        debug!("Rejecting request with missing fields");
        return (
            StatusCode::BAD_REQUEST,
            Json(VerificationResponse::rejected(MISSING_FIELDS)),
        );
    };

    match upstream
        .verify(&request.membership_id, &request.last_name)
        .await
    {
        Ok(outcome) => {
            info!(
                membership_id = %request.membership_id,
                valid = outcome.is_valid(),
                "Membership verified"
            );

            (
                StatusCode::OK,
                Json(VerificationResponse::from_outcome(
                    &request,
                    outcome,
                    upstream.test_mode(),
                )),
            )
        }

        Err(e) => {
            error!("Error calling membership registry: {}", e);

            let test_mode = upstream.test_mode();
            let response = VerificationResponse {
                debug: Some(DebugInfo {
                    message: e.to_string(),
                }),
                test_mode: test_mode.then_some(true),
                ..VerificationResponse::rejected(if test_mode {
                    TEST_UNEXPECTED_FAILURE
                } else {
                    UNEXPECTED_FAILURE
                })
            };

            (StatusCode::INTERNAL_SERVER_ERROR, Json(response))
        }
    }
}

/// CORS preflight, answered with an empty body.
pub async fn preflight() -> impl IntoResponse {
    StatusCode::OK
}

/// Any method other than `POST` or `OPTIONS`.
pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(VerificationResponse::rejected(METHOD_NOT_ALLOWED)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        serde_json::from_value(value).unwrap_or_default()
    }

    fn request() -> VerificationRequest {
        VerificationRequest {
            membership_id: "123".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    #[test]
    fn parse_trims_fields() {
        let parsed = VerificationRequest::parse(payload(
            json!({"membershipId": "  123 ", "lastName": "\tDoe\n"}),
        ));
        assert_eq!(parsed, Some(request()));
    }

    #[test]
    fn parse_accepts_numeric_membership_id() {
        let parsed =
            VerificationRequest::parse(payload(json!({"membershipId": 123, "lastName": "Doe"})));
        assert_eq!(parsed, Some(request()));
    }

    #[test]
    fn parse_rejects_missing_or_empty() {
        for body in [
            json!({}),
            json!({"membershipId": "123"}),
            json!({"lastName": "Doe"}),
            json!({"membershipId": "", "lastName": "Doe"}),
            json!({"membershipId": "123", "lastName": "   "}),
            json!({"membershipId": null, "lastName": "Doe"}),
            json!({"membershipId": true, "lastName": "Doe"}),
            json!({"membershipId": ["123"], "lastName": "Doe"}),
            json!({"membershipId": ".", "lastName": "Doe"}),
            json!({"membershipId": " .. ", "lastName": "12345"}),
            json!({"membershipId": "123", "lastName": ".."}),
        ] {
            assert_eq!(
                VerificationRequest::parse(payload(body.clone())),
                None,
                "{body}"
            );
        }
    }

    #[test]
    fn boolean_verdict() -> anyhow::Result<()> {
        let response =
            VerificationResponse::from_outcome(&request(), UpstreamResult::verified(true), false);
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({"valid": true, "membershipId": "123"})
        );

        let response =
            VerificationResponse::from_outcome(&request(), UpstreamResult::verified(false), false);
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({"valid": false, "membershipId": "123"})
        );
        Ok(())
    }

    #[test]
    fn member_verdict_carries_message_and_user_data() -> anyhow::Result<()> {
        let member = MemberRecord {
            id: Some(json!(1)),
            name: "Jane Doe".to_string(),
            email: Some("jane@example.com".to_string()),
        };

        let response = VerificationResponse::from_outcome(
            &request(),
            UpstreamResult::Verified {
                valid: true,
                member: Some(member.clone()),
            },
            true,
        );
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({
                "valid": true,
                "membershipId": "123",
                "message": "✓ Verified! Found user: Jane Doe",
                "testMode": true,
                "userData": {"id": 1, "name": "Jane Doe", "email": "jane@example.com"},
            })
        );

        let response = VerificationResponse::from_outcome(
            &request(),
            UpstreamResult::Verified {
                valid: false,
                member: Some(member),
            },
            true,
        );
        assert_eq!(
            response.message.as_deref(),
            Some("✗ Name \"Doe\" doesn't match user: Jane Doe")
        );
        assert!(!response.valid);
        Ok(())
    }

    #[test]
    fn unreachable_degrades_to_not_verified() -> anyhow::Result<()> {
        let response = VerificationResponse::from_outcome(
            &request(),
            UpstreamResult::Unreachable(Some(StatusCode::NOT_FOUND)),
            false,
        );
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({"valid": false, "error": UNABLE_TO_VERIFY})
        );

        let response =
            VerificationResponse::from_outcome(&request(), UpstreamResult::Unreachable(None), true);
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({"valid": false, "error": TEST_USER_NOT_FOUND, "testMode": true})
        );
        Ok(())
    }

    #[test]
    fn malformed_degrades_to_not_verified() {
        let response = VerificationResponse::from_outcome(
            &request(),
            UpstreamResult::Malformed("<html>".to_string()),
            false,
        );
        assert!(!response.valid);
        assert_eq!(response.error.as_deref(), Some(MALFORMED_RESPONSE));
        assert!(response.test_mode.is_none());
    }
}
