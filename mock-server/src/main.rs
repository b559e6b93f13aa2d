use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8200".to_string());
    let root_token = std::env::var("VAULT_DEV_ROOT_TOKEN_ID")
        .unwrap_or_else(|_| mock_vault::DEFAULT_ROOT_TOKEN.to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mock vault listening");
    mock_vault::run_with_root_token(listener, &root_token).await
}
