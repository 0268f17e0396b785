mod app;
mod auth;
mod catalog;
mod clock;
mod config;
mod error;
mod mail;
mod mirror;
mod state;
mod users;

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` picks the filter; `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pokedex=debug,tower_http=info,axum=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().with_current_span(true).init(),
        _ => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let app_state = state::AppState::init().await?;
    auth::services::seed_admin(&app_state).await?;

    let addr = app_state.config.listen_addr;
    let mirror = app_state.mirror.clone();
    app::serve(app::build_app(app_state), addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown requested");
    })
    .await?;

    // Queued mirror writes land before the process exits.
    mirror.flush().await;
    tracing::info!("stopped");
    Ok(())
}
