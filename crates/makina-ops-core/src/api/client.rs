//! API client for the MAKINA OPS backend.
//!
//! `ApiClient` ties the pieces together: a raw `Transport`, the shared
//! `SessionStore`, and the `AuthInterceptor` every resource call goes
//! through. Login talks to the transport directly.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use super::interceptor::AuthInterceptor;
use super::resources::{Resource, ResourceApi};
use super::transport::{HttpTransport, Transport};
use super::{ApiError, ApiRequest};
use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::auth::LoginRequest;
use crate::models::{unwrap_envelope, LoginResponse, User};

/// Login endpoint, relative to the API base
pub const LOGIN_PATH: &str = "/auth/login";

/// Shown when the server gives no reason for a rejected login
const DEFAULT_LOGIN_ERROR: &str = "Login failed. Please check your email and password.";

/// Clone is cheap - the interceptor and session are shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    interceptor: Arc<AuthInterceptor>,
}

impl ApiClient {
    /// Create a client for the configured API, sharing `session`
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(
            &config.api_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let interceptor = AuthInterceptor::new(Arc::new(transport.clone()), session)
            .with_refresh_timeout(Duration::from_secs(config.refresh_timeout_secs));
        Ok(Self {
            transport: Arc::new(transport),
            interceptor: Arc::new(interceptor),
        })
    }

    pub fn with_transport(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        let interceptor = Arc::new(AuthInterceptor::new(transport.clone(), session));
        Self {
            transport,
            interceptor,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.interceptor.session()
    }

    pub fn interceptor(&self) -> &AuthInterceptor {
        &self.interceptor
    }

    /// Authenticate and install the returned session
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let body = serde_json::to_value(LoginRequest { email, password })
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let request = ApiRequest::post(LOGIN_PATH, body);

        let response = match self.transport.send(&request, None).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Login rejected");
                let message = err
                    .server_message()
                    .unwrap_or(DEFAULT_LOGIN_ERROR)
                    .to_string();
                return Err(match err {
                    ApiError::Network(_) => err,
                    _ => ApiError::LoginFailed(message),
                });
            }
        };

        let login: LoginResponse = serde_json::from_value(unwrap_envelope(response))
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))?;

        info!(user = %login.user.id, role = %login.user.role, "Logged in");
        self.session()
            .set_auth(login.user.clone(), login.access_token, login.refresh_token);
        Ok(login.user)
    }

    pub fn logout(&self) {
        self.session().logout();
    }

    /// Send an arbitrary request through the auth layer, returning the raw body
    pub async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.interceptor.execute(request).await
    }

    /// CRUD client for one resource
    pub fn resource(&self, resource: Resource) -> ResourceApi<'_> {
        ResourceApi::new(self, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeTransport;
    use crate::auth::MemoryStorage;
    use crate::models::Role;
    use futures::future::BoxFuture;
    use serde_json::json;

    /// Answers the login endpoint only
    struct LoginServer;

    impl Transport for LoginServer {
        fn send<'a>(
            &'a self,
            request: &'a ApiRequest,
            _bearer: Option<&'a str>,
        ) -> BoxFuture<'a, Result<Value, ApiError>> {
            Box::pin(async move {
                let body = request.body().cloned().unwrap_or_default();
                match (body["email"].as_str(), body["password"].as_str()) {
                    (Some("admin@makina.local"), Some("ChangeMe123!")) => Ok(json!({
                        "data": {
                            "accessToken": "AT1",
                            "refreshToken": "RT1",
                            "user": {"id": 1, "role": "ADMIN", "email": "admin@makina.local"}
                        }
                    })),
                    (Some("locked@makina.local"), _) => Err(ApiError::AccessDenied(String::new())),
                    _ => Err(ApiError::Unauthorized("Invalid credentials".into())),
                }
            })
        }
    }

    fn client(transport: Arc<dyn Transport>) -> ApiClient {
        ApiClient::with_transport(transport, Arc::new(SessionStore::open(MemoryStorage::new())))
    }

    #[tokio::test]
    async fn test_login_installs_session() {
        let api = client(Arc::new(LoginServer));

        let user = api.login("admin@makina.local", "ChangeMe123!").await.unwrap();

        assert_eq!(user.role, Role::Admin);
        let session = api.session().state();
        assert_eq!(session.user, Some(user));
        assert_eq!(session.access_token.as_deref(), Some("AT1"));
        assert_eq!(session.refresh_token.as_deref(), Some("RT1"));
    }

    #[tokio::test]
    async fn test_login_failure_uses_server_message() {
        let api = client(Arc::new(LoginServer));

        let err = api.login("admin@makina.local", "wrong").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(api.session().state().is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_default_message() {
        let api = client(Arc::new(LoginServer));

        let err = api.login("locked@makina.local", "x").await.unwrap_err();

        assert_eq!(err.to_string(), DEFAULT_LOGIN_ERROR);
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let api = client(Arc::new(FakeTransport::new("AT1")));
        api.session()
            .set_auth(User::new(1, Role::Admin), "AT1".into(), "RT1".into());

        api.logout();

        assert!(api.session().state().is_empty());
    }
}
