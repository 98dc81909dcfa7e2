//! cloudfacts — serve a random stored fact, optionally rewritten by a
//! hosted language model.
//!
//! One invocation runs a short linear pipeline:
//!
//! 1. [`FactStore`] scans every fact record and one is picked uniformly at
//!    random.
//! 2. [`ModelResolver`] picks the model identifier, either from an operator
//!    override or by paging through a discovery listing.
//! 3. [`Rewriter`] asks the model for a short, witty rephrasing and
//!    validates what comes back.
//! 4. [`response::ok_fact`] wraps the final text in a fixed HTTP-style
//!    envelope.
//!
//! Steps 2 and 3 are a best-effort enhancement. Any failure there degrades
//! to the original fact; the caller always receives status 200 and a
//! non-empty `fact`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # async fn demo<S, D, R>(store: S, discovery: D, runtime: R)
//! # where
//! #     S: cloudfacts::FactStore,
//! #     D: cloudfacts::ProfileDiscovery,
//! #     R: cloudfacts::ModelRuntime,
//! # {
//! use cloudfacts::{Config, FactService};
//!
//! let config = Config::from_env().unwrap();
//! let service = FactService::new(&config, store, discovery, runtime);
//! let response = service.handle().await;
//! assert_eq!(response.status_code, 200);
//! # }
//! ```

mod config;
mod invoker;
mod resolver;
pub mod response;
mod service;
mod store;

pub use config::Config;
pub use invoker::{
    build_prompt, extract_rewrite, ChatMessage, ContentBlock, ModelResponse, RewriteRequest,
    Rewriter, ANTHROPIC_VERSION, MAX_REWRITE_CHARS,
};
pub use resolver::{ModelResolver, ProfilePage, ProfileSummary};
pub use response::ApiResponse;
pub use service::{FactService, Fallback, Outcome};
pub use store::{pick_fact, random_index, FactRecord, NO_FACTS_SENTINEL};

use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure reading the fact table.
///
/// An empty table is not an error; it is reported as an empty scan.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("scan of {table} failed: {message}")]
    Scan { table: String, message: String },
}

/// Failure picking a model identifier.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The listing call itself failed (authorization or transport).
    #[error("failed to list inference profiles: {0}")]
    Discovery(String),
    /// Listing succeeded but nothing matched the name marker.
    #[error("no inference profile name contains {marker:?}")]
    NoMatch { marker: String },
}

/// Failure turning a fact into a usable rewrite.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("failed to encode model request: {0}")]
    EncodeRequest(serde_json::Error),
    #[error("model invocation failed: {0}")]
    Transport(String),
    #[error("malformed model response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("model response carried no text block")]
    NoText,
    #[error("rewrite is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Read-only access to the fact table.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Return every record a single scan yields. No pagination is followed.
    async fn scan_facts(&self) -> Result<Vec<FactRecord>, StoreError>;
}

/// Control-plane listing of hosted model deployments.
#[async_trait]
pub trait ProfileDiscovery: Send + Sync {
    /// Fetch one page of profile summaries.
    async fn list_profiles(
        &self,
        page_size: i32,
        next_token: Option<String>,
    ) -> Result<ProfilePage, ResolveError>;
}

/// Synchronous model inference.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Invoke `model_id` with a JSON request body, returning the raw JSON
    /// response body.
    async fn invoke_model(
        &self,
        model_id: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, InvocationError>;
}
