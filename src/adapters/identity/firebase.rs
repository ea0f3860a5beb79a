//! Firebase Authentication adapter over the Identity Toolkit REST API.
//!
//! This adapter implements the `IdentityProvider` port against
//! `identitytoolkit.googleapis.com`. It:
//!
//! 1. Calls the `accounts:*` endpoints with the project API key
//! 2. Maps Firebase error codes (`EMAIL_NOT_FOUND`, `EMAIL_EXISTS`, ...)
//!    into the domain [`AuthError`] taxonomy
//! 3. Holds the current session's id token internally - token material
//!    never crosses the port boundary
//! 4. Emits an [`IdentityEvent`] on every session transition it causes
//!
//! # Example
//!
//! ```ignore
//! use gatewarden::adapters::identity::{FirebaseConfig, FirebaseIdentityProvider};
//!
//! let config = FirebaseConfig::new("AIza...".to_string());
//! let provider = FirebaseIdentityProvider::new(config);
//! let identity = provider.sign_in("alice@example.com", "hunter22").await?;
//! ```

use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::foundation::{AuthError, UserId};
use crate::domain::session::{IdentityEvent, OAuthCredential, ProviderIdentity};
use crate::ports::IdentityProvider;

const DEFAULT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

/// Configuration for the Firebase Authentication adapter.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Web API key of the Firebase project.
    pub api_key: SecretString,

    /// Identity Toolkit endpoint. Override to point at the local
    /// emulator (`http://localhost:9099/identitytoolkit.googleapis.com/v1`).
    pub endpoint: String,
}

impl FirebaseConfig {
    /// Creates a configuration against the production endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Overrides the Identity Toolkit endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.endpoint.trim_end_matches('/'),
            method,
            self.api_key.expose_secret()
        )
    }
}

/// Maps a raw Identity Toolkit error code to the domain taxonomy.
///
/// Firebase sometimes suffixes codes with detail (`"WEAK_PASSWORD :
/// Password should be at least 6 characters"`); classification matches on
/// the code alone.
pub fn classify_error_code(raw: &str) -> AuthError {
    let code = raw.split(" : ").next().unwrap_or(raw).trim();
    match code {
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" | "USER_DISABLED" => AuthError::AccountNotFound,
        "INVALID_PASSWORD" => AuthError::WrongPassword,
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_IDP_RESPONSE" | "INVALID_ID_TOKEN"
        | "TOKEN_EXPIRED" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => AuthError::InvalidCredential,
        "EMAIL_EXISTS" => AuthError::EmailAlreadyInUse,
        "WEAK_PASSWORD" => AuthError::WeakPassword,
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthError::InvalidEmail,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
        "USER_CANCELLED" => AuthError::PopupClosedByUser,
        _ => AuthError::Unknown(raw.to_string()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: &'static str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

/// Shape shared by `signInWithPassword`, `signUp`, `signInWithIdp`, and
/// `accounts:update` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Live session material held inside the adapter.
struct FirebaseSession {
    id_token: SecretString,
    identity: ProviderIdentity,
}

/// Identity provider backed by the Firebase Identity Toolkit REST API.
pub struct FirebaseIdentityProvider {
    config: FirebaseConfig,
    http: reqwest::Client,
    current: RwLock<Option<FirebaseSession>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<IdentityEvent>>>,
}

impl FirebaseIdentityProvider {
    /// Creates a provider with a fresh HTTP client.
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            current: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R, AuthError> {
        tracing::debug!(method, "POST accounts endpoint");
        let response = self
            .http
            .post(self.config.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Identity Toolkit request failed: {}", e);
                AuthError::ProviderUnreachable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body: ApiErrorBody = response.json().await.map_err(|e| {
                tracing::warn!("Unparseable error body from Identity Toolkit: {}", e);
                AuthError::Unknown(format!("HTTP {}", status))
            })?;
            let err = classify_error_code(&body.error.message);
            tracing::debug!(code = %body.error.message, "Identity Toolkit rejected {}", method);
            return Err(err);
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Unknown(format!("malformed response: {}", e)))
    }

    /// Fetches the authoritative account record for a session token.
    ///
    /// `signInWithPassword` does not report `emailVerified`, so the live
    /// flag comes from `accounts:lookup`.
    async fn lookup_identity(&self, id_token: &str) -> Result<ProviderIdentity, AuthError> {
        let response: LookupResponse = self.post("lookup", &LookupRequest { id_token }).await?;
        let info = response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::Unknown("lookup returned no account".to_string()))?;

        Ok(ProviderIdentity {
            uid: UserId::new(info.local_id)
                .map_err(|e| AuthError::Unknown(e.to_string()))?,
            email: info.email,
            email_verified: info.email_verified,
            display_name: info.display_name,
            photo_url: info.photo_url,
        })
    }

    fn adopt_session(&self, id_token: SecretString, identity: ProviderIdentity) {
        let mut current = self
            .current
            .write()
            .expect("FirebaseIdentityProvider: session lock poisoned");
        *current = Some(FirebaseSession {
            id_token,
            identity: identity.clone(),
        });
        drop(current);
        self.emit(IdentityEvent::SignedIn(identity));
    }

    fn current_token(&self) -> Option<SecretString> {
        self.current
            .read()
            .expect("FirebaseIdentityProvider: session lock poisoned")
            .as_ref()
            .map(|s| s.id_token.clone())
    }

    fn emit(&self, event: IdentityEvent) {
        let mut listeners = self
            .listeners
            .lock()
            .expect("FirebaseIdentityProvider: listener lock poisoned");
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    async fn open_session(&self, method: &str, body: impl Serialize) -> Result<ProviderIdentity, AuthError> {
        let session: SessionResponse = self.post(method, &body).await?;
        let id_token = SecretString::new(session.id_token);

        // The sign-in response omits the verified flag; fetch the full
        // account record before advertising the identity.
        let identity = match self.lookup_identity(id_token.expose_secret()).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!(%err, "account lookup after sign-in failed; using response fields");
                ProviderIdentity {
                    uid: UserId::new(session.local_id)
                        .map_err(|e| AuthError::Unknown(e.to_string()))?,
                    email: session.email,
                    email_verified: session.email_verified.unwrap_or(false),
                    display_name: session.display_name,
                    photo_url: session.photo_url,
                }
            }
        };

        self.adopt_session(id_token, identity.clone());
        Ok(identity)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderIdentity, AuthError> {
        self.open_session(
            "signInWithPassword",
            PasswordRequest {
                email,
                password,
                return_secure_token: true,
            },
        )
        .await
    }

    async fn sign_in_with_oauth(
        &self,
        credential: OAuthCredential,
    ) -> Result<ProviderIdentity, AuthError> {
        let post_body = format!(
            "{}={}&providerId={}",
            credential.provider.token_param(),
            credential.token.expose_secret(),
            credential.provider.provider_id()
        );
        self.open_session(
            "signInWithIdp",
            IdpRequest {
                post_body,
                request_uri: "http://localhost",
                return_secure_token: true,
                return_idp_credential: true,
            },
        )
        .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderIdentity, AuthError> {
        self.open_session(
            "signUp",
            PasswordRequest {
                email,
                password,
                return_secure_token: true,
            },
        )
        .await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Identity Toolkit sessions are stateless on the server side;
        // discarding the token ends the session.
        let mut current = self
            .current
            .write()
            .expect("FirebaseIdentityProvider: session lock poisoned");
        *current = None;
        drop(current);
        self.emit(IdentityEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<IdentityEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let seed = {
            let current = self
                .current
                .read()
                .expect("FirebaseIdentityProvider: session lock poisoned");
            match current.as_ref() {
                Some(session) => IdentityEvent::SignedIn(session.identity.clone()),
                None => IdentityEvent::SignedOut,
            }
        };
        let _ = tx.send(seed);
        self.listeners
            .lock()
            .expect("FirebaseIdentityProvider: listener lock poisoned")
            .push(tx);
        rx
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .post(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "PASSWORD_RESET",
                    email: Some(email),
                    id_token: None,
                },
            )
            .await?;
        Ok(())
    }

    async fn send_verification(&self, _identity: &ProviderIdentity) -> Result<(), AuthError> {
        let token = self.current_token().ok_or(AuthError::NoActiveSession)?;
        let _: serde_json::Value = self
            .post(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "VERIFY_EMAIL",
                    email: None,
                    id_token: Some(token.expose_secret()),
                },
            )
            .await?;
        Ok(())
    }

    async fn update_display_name(
        &self,
        identity: &ProviderIdentity,
        name: &str,
    ) -> Result<ProviderIdentity, AuthError> {
        let token = self.current_token().ok_or(AuthError::NoActiveSession)?;
        let _: SessionResponse = self
            .post(
                "update",
                &UpdateRequest {
                    id_token: token.expose_secret(),
                    display_name: name,
                    return_secure_token: true,
                },
            )
            .await?;

        let updated = ProviderIdentity {
            display_name: Some(name.to_string()),
            ..identity.clone()
        };
        let mut current = self
            .current
            .write()
            .expect("FirebaseIdentityProvider: session lock poisoned");
        if let Some(session) = current.as_mut() {
            session.identity = updated.clone();
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_known_codes_into_the_taxonomy() {
        assert_eq!(classify_error_code("EMAIL_NOT_FOUND"), AuthError::AccountNotFound);
        assert_eq!(classify_error_code("INVALID_PASSWORD"), AuthError::WrongPassword);
        assert_eq!(
            classify_error_code("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredential
        );
        assert_eq!(classify_error_code("EMAIL_EXISTS"), AuthError::EmailAlreadyInUse);
        assert_eq!(classify_error_code("INVALID_EMAIL"), AuthError::InvalidEmail);
        assert_eq!(
            classify_error_code("TOO_MANY_ATTEMPTS_TRY_LATER"),
            AuthError::TooManyAttempts
        );
        assert_eq!(classify_error_code("USER_CANCELLED"), AuthError::PopupClosedByUser);
    }

    #[test]
    fn classify_strips_detail_suffix() {
        assert_eq!(
            classify_error_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword
        );
        assert_eq!(
            classify_error_code("TOO_MANY_ATTEMPTS_TRY_LATER : Try again later"),
            AuthError::TooManyAttempts
        );
    }

    #[test]
    fn classify_keeps_unknown_codes_with_raw_message() {
        let err = classify_error_code("QUOTA_EXCEEDED : too many requests");
        assert_eq!(
            err,
            AuthError::Unknown("QUOTA_EXCEEDED : too many requests".to_string())
        );
    }

    #[test]
    fn method_url_includes_endpoint_method_and_key() {
        let config = FirebaseConfig::new("test-key");
        let url = config.method_url("signInWithPassword");
        assert_eq!(
            url,
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key=test-key"
        );
    }

    #[test]
    fn method_url_respects_emulator_endpoint() {
        let config = FirebaseConfig::new("k")
            .with_endpoint("http://localhost:9099/identitytoolkit.googleapis.com/v1/");
        let url = config.method_url("signUp");
        assert!(url.starts_with("http://localhost:9099/"));
        assert!(url.contains("accounts:signUp?key=k"));
    }

    #[test]
    fn password_request_serializes_camel_case() {
        let body = PasswordRequest {
            email: "a@b.c",
            password: "pw",
            return_secure_token: true,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"returnSecureToken\":true"));
        assert!(json.contains("\"email\":\"a@b.c\""));
    }

    #[test]
    fn oob_request_omits_absent_fields() {
        let body = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email: Some("a@b.c"),
            id_token: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"requestType\":\"PASSWORD_RESET\""));
        assert!(!json.contains("idToken"));
    }

    #[test]
    fn error_body_parses_firebase_shape() {
        let json = r#"{"error":{"code":400,"message":"EMAIL_NOT_FOUND","errors":[]}}"#;
        let body: ApiErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.error.message, "EMAIL_NOT_FOUND");
    }

    #[test]
    fn session_response_parses_sign_in_shape() {
        let json = r#"{
            "localId": "uid-1",
            "email": "a@b.c",
            "idToken": "tok",
            "refreshToken": "rtok",
            "expiresIn": "3600",
            "registered": true
        }"#;
        let session: SessionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(session.local_id, "uid-1");
        assert_eq!(session.id_token, "tok");
        assert_eq!(session.refresh_token.as_deref(), Some("rtok"));
        assert!(session.email_verified.is_none());
    }

    #[test]
    fn lookup_response_parses_account_info() {
        let json = r#"{"users":[{"localId":"uid-2","email":"b@c.d","emailVerified":true}]}"#;
        let lookup: LookupResponse = serde_json::from_str(json).unwrap();
        assert_eq!(lookup.users.len(), 1);
        assert!(lookup.users[0].email_verified);
    }

    #[tokio::test]
    async fn subscribe_seeds_with_signed_out_when_no_session() {
        let provider = FirebaseIdentityProvider::new(FirebaseConfig::new("k"));
        let mut rx = provider.subscribe();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, IdentityEvent::SignedOut));
    }

    #[tokio::test]
    async fn sign_out_emits_signed_out_event() {
        let provider = FirebaseIdentityProvider::new(FirebaseConfig::new("k"));
        let mut rx = provider.subscribe();
        let _ = rx.recv().await; // drain seed

        provider.sign_out().await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, IdentityEvent::SignedOut));
    }
}
