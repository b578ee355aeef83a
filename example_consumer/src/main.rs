//! Server binary: settings from env (and `.env`), one pool, common routes plus the table API
//! under `/api/db`.
//!
//! Run from repo root: `cargo run -p example-consumer`

use axum::Router;
use dyndb_sdk::{common_routes_with_ready, table_routes, AppState, Settings};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dyndb_sdk=info,example_consumer=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let pool = settings.connect().await?;
    let state = AppState { pool };

    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api/db", table_routes(state))
        .layer(RequestBodyLimitLayer::new(settings.max_body_bytes));

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
