use reqwest::Method;
use serde_json::Value;

/// One outbound API call.
///
/// `retried` records whether this request is already the replay that
/// follows a token refresh. It is only ever set by `into_retry`, which
/// consumes the original, so a request is replayed at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// The replay of this request after a refresh
    pub fn into_retry(self) -> Self {
        Self {
            retried: true,
            ..self
        }
    }

    pub fn is_retry(&self) -> bool {
        self.retried
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_retry_keeps_request() {
        let request = ApiRequest::put("/sites/3", json!({"name": "North"}))
            .with_query([("expand", "zones")]);
        assert!(!request.is_retry());

        let retry = request.clone().into_retry();
        assert!(retry.is_retry());
        assert_eq!(retry.method(), &Method::PUT);
        assert_eq!(retry.path(), "/sites/3");
        assert_eq!(retry.query(), request.query());
        assert_eq!(retry.body(), request.body());
    }
}
