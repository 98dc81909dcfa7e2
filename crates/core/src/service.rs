use tracing::{info, warn};

use crate::response::{ok_fact, ApiResponse};
use crate::store::{pick_fact, random_index, NO_FACTS_SENTINEL};
use crate::{
    Config, FactStore, InvocationError, ModelResolver, ModelRuntime, ProfileDiscovery,
    ResolveError, Rewriter, StoreError,
};

/// How one invocation ended.
#[derive(Debug)]
pub enum Outcome {
    /// The store had no usable fact (or could not be read).
    Empty { cause: Option<StoreError> },
    /// A fact was picked but the rewrite step was skipped or rejected.
    Original { fact: String, reason: Fallback },
    /// The model's rewrite passed validation.
    Rewritten { fact: String, original: String },
}

/// Why the original fact was served instead of a rewrite.
#[derive(Debug)]
pub enum Fallback {
    Resolve(ResolveError),
    Invoke(InvocationError),
}

impl Outcome {
    /// The text returned to the caller.
    pub fn fact(&self) -> &str {
        match self {
            Outcome::Empty { .. } => NO_FACTS_SENTINEL,
            Outcome::Original { fact, .. } | Outcome::Rewritten { fact, .. } => fact,
        }
    }
}

/// Long-lived handler: clients are built once per process and reused by
/// every invocation.
pub struct FactService<S, D, R> {
    store: S,
    resolver: ModelResolver<D>,
    rewriter: Rewriter<R>,
    table: String,
    pick: fn(usize) -> usize,
}

impl<S, D, R> FactService<S, D, R>
where
    S: FactStore,
    D: ProfileDiscovery,
    R: ModelRuntime,
{
    pub fn new(config: &Config, store: S, discovery: D, runtime: R) -> Self {
        Self {
            store,
            resolver: ModelResolver::new(config, discovery),
            rewriter: Rewriter::new(runtime),
            table: config.table_name.clone(),
            pick: random_index,
        }
    }

    /// Replace the uniform random picker, e.g. for deterministic tests.
    pub fn with_picker(mut self, pick: fn(usize) -> usize) -> Self {
        self.pick = pick;
        self
    }

    /// Run one invocation. Always a 200 response.
    pub async fn handle(&self) -> ApiResponse {
        let outcome = self.next_fact().await;
        match &outcome {
            Outcome::Empty { cause: None } => info!(table = %self.table, "no facts available"),
            Outcome::Empty { cause: Some(e) } => {
                warn!(table = %self.table, error = %e, "fact scan failed, serving sentinel")
            }
            Outcome::Original {
                reason: Fallback::Resolve(e),
                ..
            } => warn!(error = %e, "model resolution failed, serving original fact"),
            Outcome::Original {
                reason: Fallback::Invoke(e),
                ..
            } => warn!(error = %e, "rewrite failed, serving original fact"),
            Outcome::Rewritten { fact, original } => info!(
                original_len = original.chars().count(),
                rewrite_len = fact.chars().count(),
                "serving rewritten fact"
            ),
        }
        ok_fact(outcome.fact())
    }

    /// Walk the pipeline and report where it stopped.
    pub async fn next_fact(&self) -> Outcome {
        let records = match self.store.scan_facts().await {
            Ok(records) => records,
            Err(e) => return Outcome::Empty { cause: Some(e) },
        };
        let Some(fact) = pick_fact(&records, self.pick).map(str::to_string) else {
            return Outcome::Empty { cause: None };
        };

        let model_id = match self.resolver.resolve().await {
            Ok(id) => id,
            Err(e) => {
                return Outcome::Original {
                    fact,
                    reason: Fallback::Resolve(e),
                }
            }
        };

        match self.rewriter.rewrite(&model_id, &fact).await {
            Ok(rewrite) => Outcome::Rewritten {
                fact: rewrite,
                original: fact,
            },
            Err(e) => Outcome::Original {
                fact,
                reason: Fallback::Invoke(e),
            },
        }
    }
}
