//! Run a tiny Axum server that exposes a unified webhook endpoint for every configured provider.
use sms_web_axum::{router, AppState};
use smsgate::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    smsgate::logging::init(&config.logging);

    let bind = config.server.bind_address();
    let public_url = config.server.public_url.clone();
    let manager = DriverManager::from_config(config)?;
    let registry = manager.registry()?;
    let providers: Vec<_> = registry.providers().collect();

    let app = router(AppState::new(registry, public_url));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    println!("Listening on http://{} for {:?}", bind, providers);
    axum::serve(listener, app).await?;
    Ok(())
}
