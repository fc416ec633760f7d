use std::net::SocketAddr;

use leadrelay_server::{api::app_router, build_state, config::Config, init_tracing, scheduler};
use tower_http::services::ServeDir;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let state = build_state(&config)?;

    scheduler::start_rate_limit_sweeper(state.clone());

    let mut router = app_router(state, &config);
    if let Some(static_dir) = &config.static_dir {
        tracing::info!("Serving static site from {}", static_dir);
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
