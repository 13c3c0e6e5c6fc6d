use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use boorumesh::config::AppConfig;
use boorumesh::openapi::ApiDoc;
use boorumesh::repo::SourceRepo;
use boorumesh::upstream::HttpUpstream;
use boorumesh::{config, telemetry, AppState, SourceFetcher};

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable the `inmem-store` or `postgres-store` feature");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env();
    info!("Bootstrapping boorumesh");

    let repo = build_repo(&cfg).await?;
    let upstream = HttpUpstream::with_connect_timeout(cfg.upstream_connect_timeout)?;
    let fetcher = SourceFetcher::new(repo.clone(), Arc::new(upstream));

    let metrics = if cfg.metrics_enabled {
        match telemetry::install_prometheus() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("metrics disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let state = AppState { repo, fetcher, metrics };
    let openapi = ApiDoc::openapi();
    let origins = cfg.allowed_origins.clone();

    let server = HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(Cors::default(), |c, origin| c.allowed_origin(origin))
            .allowed_methods(["GET", "POST", "OPTIONS"])
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.host.as_str(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.host, cfg.port);
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn SourceRepo>> {
    use boorumesh::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let db_url = cfg
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for postgres-store"))?;
    let pool = PgPoolOptions::new().max_connections(5).connect_lazy(db_url)?;
    let repo = PgRepo::new(pool);
    repo.migrate().await?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn SourceRepo>> {
    use boorumesh::repo::inmem::InMemRepo;

    let repo = match &cfg.data_dir {
        Some(dir) => InMemRepo::with_snapshot_dir(dir),
        None => InMemRepo::new(),
    };
    info!("Using in-memory repository backend");
    Ok(Arc::new(repo))
}
