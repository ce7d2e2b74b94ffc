use std::sync::Arc;

use syncboard::services::auth::HttpVerifier;
use syncboard::services::persistence;
use syncboard::state::AppState;
use syncboard::store::PgStore;
use syncboard::{db, routes};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");

    let verifier = HttpVerifier::from_env().expect("identity verifier config");
    let debounce = persistence::debounce_from_env();

    let state = AppState::new(Arc::new(PgStore::new(pool)), Arc::new(verifier), debounce);

    // Re-arms flushes for boards stranded dirty by a failed write.
    let _sweep = persistence::spawn_retry_sweep(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "syncboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
