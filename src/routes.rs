use std::sync::Arc;

use actix_web::http::header;
use actix_web::{web, Either, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::error;

use crate::auth::{AdminUser, CredentialGate};
use crate::error::ApiError;
use crate::models::*;
use crate::render;
use crate::store::MessageStore;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(landing)))
        .service(
            web::resource("/messages")
                .route(web::post().to(create_message))
                .route(web::get().to(list_messages)),
        )
        .service(
            web::resource("/api/messages")
                .route(web::post().to(create_message))
                .route(web::get().to(list_messages)),
        )
        .service(web::resource("/messages-public").route(web::get().to(list_public_messages)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/healthz").route(web::get().to(health)))
        .service(web::resource("/dbcheck").route(web::get().to(db_check)))
        .default_service(web::to(not_found));
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub gate: Arc<CredentialGate>,
    pub list_limit: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn MessageStore>, gate: CredentialGate, list_limit: usize) -> Self {
        Self { store, gate: Arc::new(gate), list_limit: list_limit.max(1) }
    }

    fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.list_limit).clamp(1, self.list_limit)
    }
}

/// Best-effort client address: first `X-Forwarded-For` entry, else the peer address.
pub fn client_ip(req: &HttpRequest) -> Option<String> {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
    let first = forwarded
        .as_deref()
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    match first {
        Some(ip) => Some(ip.to_string()),
        None => req.peer_addr().map(|a| a.ip().to_string()),
    }
}

pub fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

fn wants_html(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false)
}

/// Trim and validate a raw submission; blank author becomes `None`.
pub fn normalize_input(input: MessageInput) -> Result<(String, Option<String>), ApiError> {
    let text = input.text.as_deref().unwrap_or("").trim().to_string();
    if text.is_empty() {
        return Err(ApiError::Validation("text is required"));
    }
    let author = input
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    Ok((text, author))
}

#[derive(Debug, Deserialize)]
pub struct LandingQuery {
    ok: Option<String>,
}

pub async fn landing(query: web::Query<LandingQuery>) -> HttpResponse {
    let submitted = query.ok.as_deref() == Some("1");
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(render::landing_page(submitted))
}

#[utoipa::path(
    post,
    path = "/messages",
    request_body = MessageInput,
    responses(
        (status = 201, description = "Message stored", body = Message),
        (status = 303, description = "Stored; redirect for browser clients"),
        (status = 400, description = "Text empty or missing"),
        (status = 500, description = "Could not save")
    )
)]
pub async fn create_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: Either<web::Json<MessageInput>, web::Form<MessageInput>>,
) -> Result<HttpResponse, ApiError> {
    let input = match payload {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };
    let (text, author) = normalize_input(input)?;
    let new = NewMessage {
        text,
        author,
        source_ip: client_ip(&req),
        user_agent: user_agent(&req),
    };
    let message = data.store.append(new).await.map_err(|e| {
        error!("message save failed: {e}");
        ApiError::SaveFailed
    })?;

    if wants_html(&req) {
        return Ok(HttpResponse::SeeOther()
            .insert_header((header::LOCATION, "/?ok=1"))
            .finish());
    }
    Ok(HttpResponse::Created().json(message))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<usize>,
}

async fn load_recent(data: &AppState, requested: Option<usize>) -> Result<Vec<Message>, ApiError> {
    data.store
        .read_recent(data.clamp_limit(requested))
        .await
        .map_err(|e| {
            error!("message read failed: {e}");
            ApiError::ReadFailed
        })
}

#[utoipa::path(
    get,
    path = "/messages",
    params(("limit" = Option<usize>, Query, description = "At most this many, capped by LIST_LIMIT")),
    responses(
        (status = 200, description = "Recent messages, newest first", body = [Message]),
        (status = 401, description = "Missing or wrong Basic credentials"),
        (status = 500, description = "Read error")
    )
)]
pub async fn list_messages(
    _admin: AdminUser,
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let messages = load_recent(&data, query.limit).await?;
    if wants_html(&req) {
        return Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(render::messages_table(&messages)));
    }
    Ok(HttpResponse::Ok().json(messages))
}

#[utoipa::path(
    get,
    path = "/messages-public",
    params(("limit" = Option<usize>, Query, description = "At most this many, capped by LIST_LIMIT")),
    responses(
        (status = 200, description = "Recent messages without IP or user agent", body = [PublicMessage]),
        (status = 500, description = "Read error")
    )
)]
pub async fn list_public_messages(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let messages: Vec<PublicMessage> = load_recent(&data, query.limit)
        .await?
        .into_iter()
        .map(PublicMessage::from)
        .collect();
    if wants_html(&req) {
        return Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(render::public_list(&messages)));
    }
    Ok(HttpResponse::Ok().json(messages))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is up"))
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}

pub async fn db_check(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    data.store.ping().await.map_err(|e| {
        error!("storage check failed: {e}");
        ApiError::Internal
    })?;
    Ok(HttpResponse::Ok().content_type("text/plain").body("db ok"))
}

pub async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn forwarded_for_takes_first_entry() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", " 203.0.113.7 , 10.0.0.1"))
            .peer_addr("127.0.0.1:9000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn falls_back_to_peer_then_none() {
        let req = TestRequest::default()
            .peer_addr("192.0.2.1:1234".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req).as_deref(), Some("192.0.2.1"));
        let req = TestRequest::default().to_http_request();
        assert_eq!(client_ip(&req), None);
    }

    #[test]
    fn non_ascii_user_agent_is_kept() {
        let value = actix_web::http::header::HeaderValue::from_bytes("Navegador/1.0 (café)".as_bytes()).unwrap();
        let req = TestRequest::default()
            .insert_header((header::USER_AGENT, value))
            .to_http_request();
        assert_eq!(user_agent(&req).as_deref(), Some("Navegador/1.0 (café)"));
        assert_eq!(user_agent(&TestRequest::default().to_http_request()), None);
    }

    #[test]
    fn normalize_trims_and_defaults_author() {
        let (text, author) = normalize_input(MessageInput {
            text: Some("  hi  ".into()),
            author: Some("   ".into()),
        })
        .unwrap();
        assert_eq!(text, "hi");
        assert_eq!(author, None);
        assert!(normalize_input(MessageInput { text: Some(" \n\t".into()), author: None }).is_err());
        assert!(normalize_input(MessageInput::default()).is_err());
    }
}
