use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use body_note::config::AppConfig;
use body_note::error::set_expose_internal_errors;
use body_note::openapi::ApiDoc;
use body_note::rate_limit::RateLimit;
use body_note::repo::Repo;
use body_note::routes::{config_with_limit, AppState};
use body_note::security::cors;
use body_note::SecurityHeaders;

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable the `inmem-store` or `postgres-store` feature");

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use anyhow::Context;
    use body_note::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let db_url = cfg.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("failed to connect to Postgres")?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.context("failed to run migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use body_note::repo::inmem::InMemRepo;

    let repo = match &cfg.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Using in-memory repository with snapshot persistence");
            InMemRepo::with_snapshot_dir(dir)
        }
        None => {
            info!("Using in-memory repository backend (not persisted)");
            InMemRepo::new()
        }
    };
    Ok(Arc::new(repo))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Bootstrapping Body Note server");

    let cfg = AppConfig::from_env();
    set_expose_internal_errors(!cfg.production);
    info!(production = cfg.production, json_limit = cfg.json_limit, "configuration loaded");

    let state = AppState { repo: build_repo(&cfg).await?, public_url: cfg.public_url.clone() };

    let rate_limit = RateLimit::new(cfg.rate_limit.clone());
    {
        // keep the limiter map bounded by forgetting idle clients
        let limiter = rate_limit.limiter();
        let window = cfg.rate_limit.window;
        actix_web::rt::spawn(async move {
            let mut tick = tokio::time::interval(window);
            loop {
                tick.tick().await;
                limiter.sweep(window);
            }
        });
    }

    let openapi = ApiDoc::openapi();
    let json_limit = cfg.json_limit;
    let enable_hsts = cfg.enable_hsts;

    let server = HttpServer::new(move || {
        App::new()
            .wrap(rate_limit.clone())
            .wrap(SecurityHeaders::new(enable_hsts))
            .wrap(cors())
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(config_with_limit(json_limit))
            .service(SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.host.as_str(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.host, cfg.port);

    server.run().await?;
    Ok(())
}
