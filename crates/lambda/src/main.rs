use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use cloudfacts::{ApiResponse, Config, FactService};
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value as JsonValue;
use tracing::{info, Instrument};
use tracing_subscriber::EnvFilter;

mod aws;

use aws::{BedrockModelRuntime, BedrockProfileDiscovery, DynamoFactStore};

type Service = FactService<DynamoFactStore, BedrockProfileDiscovery, BedrockModelRuntime>;

#[tokio::main]
async fn main() -> Result<()> {
    // The Lambda log sink timestamps every line already.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .compact()
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let service = build_service(&config).await;
    info!(
        table = %config.table_name,
        region = %config.region,
        model_override = config.model_id_override.is_some(),
        "cloudfacts ready"
    );

    let service = &service;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<JsonValue>| async move {
        Ok::<ApiResponse, lambda_runtime::Error>(handle(service, event).await)
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
    .context("lambda runtime exited")?;
    Ok(())
}

/// Clients are created once and shared by every invocation in this process.
async fn build_service(config: &Config) -> Service {
    let sdk = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;

    let store = DynamoFactStore::new(aws_sdk_dynamodb::Client::new(&sdk), &config.table_name);
    let discovery = BedrockProfileDiscovery::new(aws_sdk_bedrock::Client::new(&sdk));
    let runtime = BedrockModelRuntime::new(aws_sdk_bedrockruntime::Client::from_conf(
        aws::runtime_config(&sdk, config),
    ));
    FactService::new(config, store, discovery, runtime)
}

/// The event payload is not read; every request gets a fact.
async fn handle(service: &Service, event: LambdaEvent<JsonValue>) -> ApiResponse {
    service.handle().instrument(invocation_span(&event)).await
}

/// Span carrying the Lambda request id (and HTTP method when present).
fn invocation_span(event: &LambdaEvent<JsonValue>) -> tracing::Span {
    let method = event
        .payload
        .get("httpMethod")
        .and_then(JsonValue::as_str)
        .unwrap_or("-");
    tracing::info_span!(
        "invocation",
        request_id = %event.context.request_id,
        method = %method
    )
}
