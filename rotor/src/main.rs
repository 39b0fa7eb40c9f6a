use std::sync::Arc;

use clap::Parser;
use lambda_runtime::{service_fn, LambdaEvent};
use rotor::{
    config::{LogFormat, RotorConfig},
    TokenRotation,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_current_span(false)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    dotenvy::dotenv().ok();

    let config = RotorConfig::parse();
    init_tracing(config.log_format);

    let client = reqwest::Client::builder()
        .user_agent(concat!("rotor/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let rotation = TokenRotation::new(
        config.secret_store().await,
        client,
        config.source_secret_name.clone(),
        config.target_secret_name.clone(),
    )
    .with_retry_config(config.retry_config())
    .with_request_timeout(config.request_timeout());

    tracing::debug!(?rotation, "configured token rotation");

    if config.once {
        let response = rotation.handle().await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return if response.is_success() {
            Ok(())
        } else {
            Err("token rotation failed".into())
        };
    }

    let rotation = Arc::new(rotation);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<serde_json::Value>| {
        let rotation = Arc::clone(&rotation);
        async move {
            tracing::info!(request_id = %event.context.request_id, "rotation invoked");
            Ok::<_, lambda_runtime::Error>(rotation.handle().await)
        }
    }))
    .await
}
