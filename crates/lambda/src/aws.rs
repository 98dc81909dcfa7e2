//! AWS-backed collaborators: DynamoDB for facts, the Bedrock control plane
//! for profile discovery, and Bedrock runtime for inference.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::SdkConfig;
use aws_sdk_bedrock::types::InferenceProfileSummary;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use cloudfacts::{
    Config, FactRecord, FactStore, InvocationError, ModelRuntime, ProfileDiscovery, ProfilePage,
    ProfileSummary, ResolveError, StoreError,
};
use tracing::debug;

const FACT_TEXT_ATTRIBUTE: &str = "FactText";

/// Scans the whole fact table in one call. Pagination is not followed.
pub struct DynamoFactStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
}

impl DynamoFactStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl FactStore for DynamoFactStore {
    async fn scan_facts(&self) -> Result<Vec<FactRecord>, StoreError> {
        let out = self
            .client
            .scan()
            .table_name(&self.table)
            .send()
            .await
            .map_err(|e| StoreError::Scan {
                table: self.table.clone(),
                message: aws_sdk_dynamodb::error::DisplayErrorContext(&e).to_string(),
            })?;
        if out.last_evaluated_key().is_some() {
            debug!(table = %self.table, "scan truncated, later pages are ignored");
        }
        Ok(out.items().iter().map(record_from_item).collect())
    }
}

/// Non-string `FactText` attributes are treated as missing.
fn record_from_item(item: &HashMap<String, AttributeValue>) -> FactRecord {
    FactRecord {
        fact_text: item
            .get(FACT_TEXT_ATTRIBUTE)
            .and_then(|v| v.as_s().ok())
            .cloned(),
    }
}

pub struct BedrockProfileDiscovery {
    client: aws_sdk_bedrock::Client,
}

impl BedrockProfileDiscovery {
    pub fn new(client: aws_sdk_bedrock::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileDiscovery for BedrockProfileDiscovery {
    async fn list_profiles(
        &self,
        page_size: i32,
        next_token: Option<String>,
    ) -> Result<ProfilePage, ResolveError> {
        let out = self
            .client
            .list_inference_profiles()
            .max_results(page_size)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| {
                ResolveError::Discovery(aws_sdk_bedrock::error::DisplayErrorContext(&e).to_string())
            })?;
        Ok(ProfilePage {
            summaries: out
                .inference_profile_summaries()
                .iter()
                .map(summary_from_sdk)
                .collect(),
            next_token: out.next_token().map(str::to_string),
        })
    }
}

fn summary_from_sdk(s: &InferenceProfileSummary) -> ProfileSummary {
    let non_empty = |v: &str| Some(v.to_string()).filter(|v| !v.is_empty());
    ProfileSummary {
        name: non_empty(s.inference_profile_name()),
        id: non_empty(s.inference_profile_id()),
        arn: non_empty(s.inference_profile_arn()),
    }
}

pub struct BedrockModelRuntime {
    client: aws_sdk_bedrockruntime::Client,
}

impl BedrockModelRuntime {
    pub fn new(client: aws_sdk_bedrockruntime::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModelRuntime for BedrockModelRuntime {
    async fn invoke_model(
        &self,
        model_id: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, InvocationError> {
        let out = self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                InvocationError::Transport(
                    aws_sdk_bedrockruntime::error::DisplayErrorContext(&e).to_string(),
                )
            })?;
        Ok(out.body.into_inner())
    }
}

/// Runtime client settings: bounded read timeout and standard retries.
pub fn runtime_config(sdk: &SdkConfig, config: &Config) -> aws_sdk_bedrockruntime::Config {
    aws_sdk_bedrockruntime::config::Builder::from(sdk)
        .timeout_config(
            TimeoutConfig::builder()
                .read_timeout(config.read_timeout)
                .build(),
        )
        .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts))
        .build()
}
