use shopdesk_api::app::{self, AppState};
use shopdesk_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shopdesk_observability::init();

    let config = AppConfig::from_env()?;
    let state = AppState::from_config(&config).await?;
    let app = app::build_app(state, config.jwt_secret.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!(
        persistent = config.database_url.is_some(),
        "listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;
    Ok(())
}
