use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use futures_util::FutureExt as _;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{error, warn};

use crate::access_log::AccessLogSink;
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::NewAccessLogEntry;
use crate::routes::{client_ip, user_agent};

/// Records one access log entry per completed request without holding up the response.
#[derive(Clone)]
pub struct AccessLog {
    sink: Option<Arc<dyn AccessLogSink>>,
}

impl AccessLog {
    pub fn new(sink: Arc<dyn AccessLogSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Pass-through variant used when no sink is configured.
    pub fn disabled() -> Self {
        Self { sink: None }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessLogMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AccessLogMiddleware {
            service: Rc::new(service),
            sink: self.sink.clone(),
        }))
    }
}

pub struct AccessLogMiddleware<S> {
    service: Rc<S>,
    sink: Option<Arc<dyn AccessLogSink>>,
}

impl<S, B> Service<ServiceRequest> for AccessLogMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let Some(sink) = self.sink.clone() else {
            return Box::pin(svc.call(req));
        };
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.path().to_string());
        let remote_ip = client_ip(req.request()).unwrap_or_default();
        let ua = user_agent(req.request()).unwrap_or_default();

        Box::pin(async move {
            let result = svc.call(req).await;
            // handler and extractor errors arrive as Ok responses; Err only comes from outer layers
            let (status, auth_user) = match &result {
                Ok(res) => (
                    res.status(),
                    res.request()
                        .extensions()
                        .get::<AuthenticatedUser>()
                        .map(|u| u.0.clone()),
                ),
                Err(e) => (e.as_response_error().status_code(), None),
            };
            let entry = NewAccessLogEntry {
                path,
                remote_ip,
                user_agent: ua,
                auth_user,
                status: status.as_u16(),
            };
            actix_web::rt::spawn(async move {
                if let Err(e) = sink.record(entry).await {
                    warn!("access log write failed: {e}");
                }
            });
            result
        })
    }
}

/// Turns a panicking handler into a logged 500 instead of losing the worker.
#[derive(Clone, Default)]
pub struct CatchPanic;

impl<S, B> Transform<S, ServiceRequest> for CatchPanic
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = CatchPanicMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CatchPanicMiddleware { service: Rc::new(service) }))
    }
}

pub struct CatchPanicMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for CatchPanicMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let path = req.path().to_string();
        Box::pin(async move {
            match AssertUnwindSafe(svc.call(req)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    error!(%path, "handler panicked");
                    Err(ApiError::Internal.into())
                }
            }
        })
    }
}
