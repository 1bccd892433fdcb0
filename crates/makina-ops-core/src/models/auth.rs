use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::User;

/// Access/refresh pair returned by `POST /auth/refresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Payload of `POST /auth/login`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Unwrap the `{ "data": ... }` envelope the API puts around results.
/// Bodies without a (non-null) `data` field are returned as-is.
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("data").is_some_and(|d| !d.is_null()) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope() {
        assert_eq!(
            unwrap_envelope(json!({"data": {"items": [], "total": 0}})),
            json!({"items": [], "total": 0})
        );
        assert_eq!(unwrap_envelope(json!([1, 2])), json!([1, 2]));
        assert_eq!(unwrap_envelope(json!({"id": 4})), json!({"id": 4}));
        assert_eq!(
            unwrap_envelope(json!({"data": null, "message": "ok"})),
            json!({"data": null, "message": "ok"})
        );
    }

    #[test]
    fn test_parse_login_response() {
        let body = json!({
            "data": {
                "accessToken": "AT1",
                "refreshToken": "RT1",
                "user": {"id": 1, "role": "ADMIN"}
            }
        });
        let login: LoginResponse = serde_json::from_value(unwrap_envelope(body)).unwrap();
        assert_eq!(login.access_token, "AT1");
        assert_eq!(login.refresh_token, "RT1");
        assert_eq!(login.user.id.to_string(), "1");
    }
}
