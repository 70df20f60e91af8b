use crate::upstream::{MemberRecord, UpstreamResult};
use reqwest::StatusCode;
use serde_json::{Map, Value};

/// Normalize an upstream response into an [`UpstreamResult`].
///
/// The registry has been seen answering with a JSON boolean, a bare
/// `true`/`false` text body and, for the test API, a member object whose
/// `name` is matched against `last_name`. Anything else is `Malformed`.
#[must_use]
pub fn interpret(status: StatusCode, body: &str, last_name: &str) -> UpstreamResult {
    if !status.is_success() {
        return UpstreamResult::Unreachable(Some(status));
    }

    let text = body.trim();

    let outcome = match serde_json::from_str::<Value>(text) {
        Ok(Value::Bool(valid)) => Some(UpstreamResult::verified(valid)),
        Ok(Value::String(literal)) => literal_bool(&literal).map(UpstreamResult::verified),
        Ok(Value::Object(fields)) => member_record(&fields).map(|member| {
            let valid = member.matches(last_name);
            UpstreamResult::Verified {
                valid,
                member: Some(member),
            }
        }),
        Ok(_) => None,
        Err(_) => literal_bool(text).map(UpstreamResult::verified),
    };

    outcome.unwrap_or_else(|| UpstreamResult::Malformed(body.to_string()))
}

fn literal_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn member_record(fields: &Map<String, Value>) -> Option<MemberRecord> {
    let name = fields.get("name")?.as_str()?.to_string();

    Some(MemberRecord {
        id: fields.get("id").cloned(),
        name,
        email: fields
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}
