use actix_web::{dev::Payload, http::header, web, Error, FromRequest, HttpMessage, HttpRequest};
use actix_web_httpauth::extractors::AuthenticationError;
use actix_web_httpauth::headers::www_authenticate::basic::Basic;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::future::{ready, Ready};
use tracing::warn;

use crate::error::ApiError;
use crate::routes::AppState;

pub const REALM: &str = "Admin Area";

/// Label used in password-only mode when the client sends no username.
pub const UNKNOWN_USER: &str = "unknown";

/// Username/password pair as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub user: String,
    pub pass: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("authorization header missing")]
    Missing,
    #[error("malformed basic credentials")]
    Malformed,
    #[error("credentials rejected for user {user:?}")]
    Rejected { user: String },
}

/// Parse an `Authorization` header value of the form `Basic <base64>`.
///
/// The decoded payload is split on the first colon only, so passwords may
/// contain colons. A payload without any colon yields empty user and pass.
pub fn parse_basic(value: &str) -> Option<BasicCredentials> {
    let token = value.strip_prefix("Basic ")?.trim();
    if token.is_empty() {
        return None;
    }
    let bytes = STANDARD.decode(token).ok()?;
    let decoded = String::from_utf8_lossy(&bytes);
    let (user, pass) = decoded.split_once(':').unwrap_or(("", ""));
    Some(BasicCredentials { user: user.to_string(), pass: pass.to_string() })
}

/// Expected credentials for the protected routes.
#[derive(Debug, Clone)]
pub enum CredentialGate {
    /// Any username is accepted as long as the password matches.
    PasswordOnly { password: String },
    /// Username and password must both match.
    UserAndPassword { username: String, password: String },
}

impl CredentialGate {
    pub fn password_only(password: impl Into<String>) -> Self {
        Self::PasswordOnly { password: password.into() }
    }

    pub fn user_and_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserAndPassword { username: username.into(), password: password.into() }
    }

    /// Pick the mode from configured values: a non-empty username turns on username checks.
    pub fn from_settings(username: Option<&str>, password: &str) -> Self {
        match username.map(str::trim).filter(|u| !u.is_empty()) {
            Some(u) => Self::user_and_password(u, password),
            None => Self::password_only(password),
        }
    }

    /// Check supplied credentials, returning the name to attribute the request to.
    pub fn check(&self, creds: &BasicCredentials) -> Result<String, AuthFailure> {
        let accepted = match self {
            Self::PasswordOnly { password } => secret_eq(&creds.pass, password),
            Self::UserAndPassword { username, password } => {
                // both comparisons always run
                let user_ok = secret_eq(&creds.user, username);
                let pass_ok = secret_eq(&creds.pass, password);
                user_ok && pass_ok
            }
        };
        if !accepted {
            return Err(AuthFailure::Rejected { user: creds.user.clone() });
        }
        if creds.user.is_empty() {
            Ok(UNKNOWN_USER.to_string())
        } else {
            Ok(creds.user.clone())
        }
    }

    /// Validate a raw `Authorization` header value.
    pub fn verify(&self, header_value: Option<&str>) -> Result<String, AuthFailure> {
        let value = header_value.ok_or(AuthFailure::Missing)?;
        let creds = parse_basic(value).ok_or(AuthFailure::Malformed)?;
        self.check(&creds)
    }
}

/// An empty expected value never matches, whatever was supplied.
fn secret_eq(supplied: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    Sha256::digest(supplied.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Username that passed the gate; stored in request extensions for the access log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Extractor guarding admin-only handlers with HTTP Basic Auth.
#[derive(Debug)]
pub struct AdminUser(pub String);

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return ready(Err(ApiError::Internal.into()));
        };
        let value = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        match state.gate.verify(value) {
            Ok(user) => {
                req.extensions_mut().insert(AuthenticatedUser(user.clone()));
                ready(Ok(AdminUser(user)))
            }
            Err(failure) => {
                match &failure {
                    AuthFailure::Rejected { user } => warn!(user = %user, "basic auth failed"),
                    other => warn!("basic auth failed: {other}"),
                }
                ready(Err(AuthenticationError::new(Basic::with_realm(REALM)).into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn header(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn splits_on_first_colon_only() {
        let c = parse_basic(&header("admin:pa:ss")).unwrap();
        assert_eq!(c.user, "admin");
        assert_eq!(c.pass, "pa:ss");
    }

    #[test]
    fn no_colon_gives_empty_pair() {
        let c = parse_basic(&header("justuser")).unwrap();
        assert_eq!(c, BasicCredentials { user: String::new(), pass: String::new() });
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(parse_basic("Bearer abc").is_none());
        assert!(parse_basic("Basic ").is_none());
        assert!(parse_basic("Basic    ").is_none());
        assert!(parse_basic("Basic !!!not-base64!!!").is_none());
        assert!(parse_basic("basic YTpi").is_none());
    }

    #[test]
    fn empty_expected_password_never_matches() {
        let gate = CredentialGate::password_only("");
        assert_eq!(
            gate.verify(Some(&header(":"))),
            Err(AuthFailure::Rejected { user: String::new() })
        );
        assert!(gate.verify(Some(&header("anyone:"))).is_err());
    }
}
