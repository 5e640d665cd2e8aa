use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use natter::config::Config;
use natter::core::db;
use natter::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("natter=info,actix_web=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::connect(&config.database_url, config.db_max_connections).await?;
    db::migrate(&pool).await?;

    let state = AppState::new(pool, &config);
    if config.seed_demo_data {
        db::seed_demo_data(&state.pool, &state.credentials).await?;
    }

    tracing::info!(addr = %config.bind_addr, "starting natter server");

    let data = web::Data::new(state);
    let origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(natter::cors(&origins))
            .wrap(TracingLogger::default())
            .app_data(data.clone())
            .configure(natter::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
