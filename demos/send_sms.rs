//! Send an SMS through whichever driver the configuration selects.
//!
//! Provider credentials come from `config/*.toml` or the environment, e.g.
//! `SMSGATE__PROVIDERS__TWILIO__ACCOUNT_SID=... SMSGATE__PROVIDERS__TWILIO__AUTH_TOKEN=...`.
use smsgate::prelude::*;

use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    smsgate::logging::init(&config.logging);

    let to = arg_or_env("--to", "SMS_TO");
    let text = arg_or_env("--text", "SMS_TEXT");
    let mut builder = OutgoingMessage::builder().to(to).text(text);
    if let Ok(from) = env::var("SMS_FROM") {
        builder = builder.from(from);
    }
    let message = builder.build()?;

    let manager = DriverManager::from_config(config)?;
    if let Ok(driver) = env::var("SMS_DRIVER") {
        manager.set_default_driver(&driver);
    }

    let report = manager.default()?.send(message).await?;
    for receipt in &report.receipts {
        println!("Sent via {} to {} with id {}", report.provider, receipt.to, receipt.id);
    }
    Ok(())
}

fn arg_or_env(flag: &str, env_key: &str) -> String {
    let args: Vec<String> = std::env::args().collect();
    if let Some(idx) = args.iter().position(|a| a == flag) {
        if idx + 1 < args.len() {
            return args[idx + 1].clone();
        }
    }
    env::var(env_key)
        .unwrap_or_else(|_| panic!("missing {} (arg {} or env {})", flag, flag, env_key))
}
