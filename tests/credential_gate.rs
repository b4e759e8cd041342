use actix_web::{dev::Payload, test as actix_test, web, FromRequest, HttpMessage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use guestbook::auth::{AdminUser, AuthFailure, AuthenticatedUser, CredentialGate};
use guestbook::store::file::FileMessageStore;
use guestbook::AppState;
use std::sync::Arc;

fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

#[test]
fn user_and_password_mode_requires_both() {
    let gate = CredentialGate::user_and_password("admin", "s3cret");
    assert_eq!(gate.verify(Some(&basic("admin", "s3cret"))), Ok("admin".to_string()));
    assert_eq!(
        gate.verify(Some(&basic("admin", "wrong"))),
        Err(AuthFailure::Rejected { user: "admin".into() })
    );
    assert!(gate.verify(Some(&basic("root", "s3cret"))).is_err());
}

#[test]
fn password_only_mode_accepts_any_user() {
    let gate = CredentialGate::password_only("s3cret");
    assert_eq!(gate.verify(Some(&basic("alice", "s3cret"))), Ok("alice".to_string()));
    assert_eq!(gate.verify(Some(&basic("", "s3cret"))), Ok("unknown".to_string()));
    assert!(gate.verify(Some(&basic("alice", "nope"))).is_err());
}

#[test]
fn empty_configured_password_never_accepts_empty_password() {
    for gate in [
        CredentialGate::password_only(""),
        CredentialGate::user_and_password("admin", ""),
        CredentialGate::from_settings(None, ""),
    ] {
        assert!(gate.verify(Some(&basic("", ""))).is_err());
        assert!(gate.verify(Some(&basic("admin", ""))).is_err());
    }
}

#[test]
fn password_may_contain_colons() {
    let gate = CredentialGate::user_and_password("admin", "a:b:c");
    assert!(gate.verify(Some(&basic("admin", "a:b:c"))).is_ok());
}

#[test]
fn malformed_headers_are_rejected_not_panicking() {
    let gate = CredentialGate::user_and_password("admin", "s3cret");
    assert_eq!(gate.verify(None), Err(AuthFailure::Missing));
    for bad in ["Bearer token", "Basic", "Basic ", "Basic %%%%", "Digest abc", ""] {
        assert_eq!(gate.verify(Some(bad)), Err(AuthFailure::Malformed), "header {bad:?}");
    }
    // valid base64 but not UTF-8, and no colon
    let junk = format!("Basic {}", STANDARD.encode([0xff, 0xfe, 0xfd]));
    assert!(gate.verify(Some(&junk)).is_err());
}

#[test]
fn from_settings_picks_mode_by_username() {
    assert!(matches!(
        CredentialGate::from_settings(Some("admin"), "pw"),
        CredentialGate::UserAndPassword { .. }
    ));
    assert!(matches!(
        CredentialGate::from_settings(Some("  "), "pw"),
        CredentialGate::PasswordOnly { .. }
    ));
    assert!(matches!(CredentialGate::from_settings(None, "pw"), CredentialGate::PasswordOnly { .. }));
}

fn state(gate: CredentialGate) -> web::Data<AppState> {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMessageStore::new(dir.path().join("messages.ndjson"));
    web::Data::new(AppState::new(Arc::new(store), gate, 50))
}

#[actix_web::test]
async fn extractor_records_authenticated_user() {
    let req = actix_test::TestRequest::default()
        .app_data(state(CredentialGate::user_and_password("admin", "pw")))
        .insert_header(("Authorization", basic("admin", "pw")))
        .to_http_request();
    let mut pl = Payload::None;
    let admin = AdminUser::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(admin.0, "admin");
    assert_eq!(
        req.extensions().get::<AuthenticatedUser>(),
        Some(&AuthenticatedUser("admin".into()))
    );
}

#[actix_web::test]
async fn extractor_rejects_with_basic_challenge() {
    let req = actix_test::TestRequest::default()
        .app_data(state(CredentialGate::user_and_password("admin", "pw")))
        .insert_header(("Authorization", basic("admin", "bad")))
        .to_http_request();
    let mut pl = Payload::None;
    let err = AdminUser::from_request(&req, &mut pl).await.unwrap_err();
    let resp = err.error_response();
    assert_eq!(resp.status(), 401);
    let challenge = resp.headers().get("www-authenticate").unwrap().to_str().unwrap();
    assert!(challenge.starts_with("Basic"), "got {challenge}");
    assert!(challenge.contains("realm=\"Admin Area\""), "got {challenge}");
    assert!(req.extensions().get::<AuthenticatedUser>().is_none());
}
