use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{CodepadError, Result};
use crate::remote::FileStore;

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// A signed-in user. Tokens never leave the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub id_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
}

impl AuthUser {
    /// Build a user from an Identity Toolkit sign-in response.
    fn from_response(body: &Value) -> Option<Self> {
        Some(Self {
            uid: body["localId"].as_str()?.to_string(),
            email: body["email"].as_str().map(str::to_string),
            id_token: body["idToken"].as_str()?.to_string(),
            refresh_token: body["refreshToken"].as_str().unwrap_or_default().to_string(),
        })
    }
}

/// Email/password and identity-provider sign-in against Firebase Auth.
pub struct FirebaseAuth {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    current: RwLock<Option<AuthUser>>,
}

impl FirebaseAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: IDENTITY_TOOLKIT_URL.to_string(),
            current: RwLock::new(None),
        }
    }

    /// Point the client at another endpoint, e.g. the Auth emulator.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create an account, sign it in and set up its file collection.
    pub async fn sign_up(&self, email: &str, password: &str, store: &dyn FileStore) -> Result<AuthUser> {
        check_credentials(email, password)?;
        let user = self
            .call(
                "accounts:signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        tracing::info!(uid = %user.uid, "account created");

        // The account exists either way; files are created lazily.
        if let Err(err) = store.init_user(&user.uid).await {
            tracing::warn!(uid = %user.uid, error = %err, "could not initialize user document");
        }
        Ok(user)
    }

    pub async fn log_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        check_credentials(email, password)?;
        self.call(
            "accounts:signInWithPassword",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
        )
        .await
    }

    /// Exchange an identity provider's ID token (e.g. `google.com`) for a
    /// Firebase session.
    pub async fn log_in_with_provider(&self, provider_id: &str, provider_token: &str) -> Result<AuthUser> {
        self.call(
            "accounts:signInWithIdp",
            json!({
                "postBody": format!("id_token={provider_token}&providerId={provider_id}"),
                "requestUri": "http://localhost",
                "returnSecureToken": true,
                "returnIdpCredential": true,
            }),
        )
        .await
    }

    pub fn log_out(&self) {
        if let Some(user) = self.current.write().take() {
            tracing::info!(uid = %user.uid, "logged out");
        }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.current.read().clone()
    }

    async fn call(&self, endpoint: &str, body: Value) -> Result<AuthUser> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let code = body["error"]["message"].as_str().unwrap_or("UNKNOWN");
            return Err(CodepadError::Auth(describe_auth_error(code)));
        }

        let user = AuthUser::from_response(&body)
            .ok_or_else(|| CodepadError::Auth("Malformed sign-in response".into()))?;
        *self.current.write() = Some(user.clone());
        Ok(user)
    }
}

fn check_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(CodepadError::Auth("Email and password are required".into()));
    }
    Ok(())
}

/// Turn an Identity Toolkit error code into a message for the user. Codes
/// may carry a detail suffix, as in `WEAK_PASSWORD : Password should be...`.
fn describe_auth_error(code: &str) -> String {
    let key = code.split(':').next().unwrap_or(code).trim();
    match key {
        "EMAIL_EXISTS" => "An account with this email already exists".into(),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password".into()
        }
        "INVALID_EMAIL" => "Invalid email address".into(),
        "WEAK_PASSWORD" => "Password should be at least 6 characters".into(),
        "USER_DISABLED" => "This account has been disabled".into(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryFileStore;

    #[test]
    fn test_describe_auth_error() {
        assert_eq!(
            describe_auth_error("EMAIL_EXISTS"),
            "An account with this email already exists"
        );
        assert_eq!(
            describe_auth_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            "Password should be at least 6 characters"
        );
        assert_eq!(describe_auth_error("INVALID_LOGIN_CREDENTIALS"), "Invalid email or password");
        assert_eq!(describe_auth_error("SOMETHING_NEW"), "SOMETHING_NEW");
    }

    #[test]
    fn test_user_from_response() {
        let body = json!({
            "localId": "uid123",
            "email": "a@b.c",
            "idToken": "tok",
            "refreshToken": "ref",
            "expiresIn": "3600"
        });
        let user = AuthUser::from_response(&body).unwrap();
        assert_eq!(user.uid, "uid123");
        assert_eq!(user.email.as_deref(), Some("a@b.c"));

        assert!(AuthUser::from_response(&json!({ "email": "a@b.c" })).is_none());
    }

    #[test]
    fn test_serialized_user_hides_tokens() {
        let user = AuthUser {
            uid: "u".into(),
            email: None,
            id_token: "secret".into(),
            refresh_token: "secret".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }

    #[tokio::test]
    async fn test_blank_credentials_rejected_before_any_request() {
        let auth = FirebaseAuth::new("key").with_base_url("http://127.0.0.1:1");
        let store = MemoryFileStore::new();
        assert!(matches!(
            auth.sign_up("  ", "pw", &store).await,
            Err(CodepadError::Auth(_))
        ));
        assert!(matches!(auth.log_in("a@b.c", "").await, Err(CodepadError::Auth(_))));
        assert!(auth.current_user().is_none());
    }
}
