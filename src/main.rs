use actix_web::{middleware::Compress, web, App, HttpServer};
use guestbook::access_log::{spawn_retention_task, AccessLogSink, PgAccessLog};
use guestbook::config::{AppConfig, StorageConfig};
use guestbook::openapi::ApiDoc;
use guestbook::store::{file::FileMessageStore, pg::PgMessageStore, MessageStore};
use guestbook::{config, AccessLog, AppState, CatchPanic};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping guestbook server");

    let cfg = AppConfig::from_env()?;
    cfg.log_summary();

    let store: Arc<dyn MessageStore>;
    let mut access_log: Option<Arc<dyn AccessLogSink>> = None;
    match &cfg.storage {
        StorageConfig::File { path } => {
            store = Arc::new(FileMessageStore::new(path.clone()));
        }
        StorageConfig::Postgres { url } => {
            let pool = PgPoolOptions::new().max_connections(5).connect_lazy(url)?;
            store = Arc::new(PgMessageStore::new(pool.clone()));
            access_log = Some(Arc::new(PgAccessLog::new(pool)) as Arc<dyn AccessLogSink>);
        }
    }

    if let Some(sink) = &access_log {
        spawn_retention_task(sink.clone(), cfg.access_log_retention, cfg.access_log_purge_every);
        info!(
            "Access log enabled (retention {} days)",
            cfg.access_log_retention.as_secs() / 86_400
        );
    }

    let state = AppState::new(store, cfg.credential_gate(), cfg.list_limit);
    let openapi = ApiDoc::openapi();

    let server = HttpServer::new(move || {
        let access = match &access_log {
            Some(sink) => AccessLog::new(sink.clone()),
            None => AccessLog::disabled(),
        };
        App::new()
            .wrap(CatchPanic)
            .wrap(access)
            .wrap(Compress::default())
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
            .configure(config)
    })
    .bind((cfg.bind_addr.as_str(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.bind_addr, cfg.port);

    server.run().await?;
    Ok(())
}
