//! Model endpoint resolution.
//!
//! The override identifier always wins. Without one, the discovery listing
//! is paged to exhaustion and the first summary whose name contains the
//! marker is used. First-seen wins; there is no ranking by recency or
//! capability.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{Config, ProfileDiscovery, ResolveError};

/// One entry of a discovery listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSummary {
    /// Human-readable profile name, matched against the marker.
    pub name: Option<String>,
    /// Short identifier, e.g. `us.anthropic.claude-3-7-sonnet-20250219-v1:0`.
    pub id: Option<String>,
    /// Fully-qualified resource name.
    pub arn: Option<String>,
}

impl ProfileSummary {
    /// Short id if present, otherwise the ARN.
    pub fn identifier(&self) -> Option<&str> {
        self.id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.arn.as_deref().filter(|s| !s.is_empty()))
    }

    fn matches(&self, marker: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(marker))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePage {
    pub summaries: Vec<ProfileSummary>,
    pub next_token: Option<String>,
}

struct CachedModel {
    model_id: String,
    resolved_at: Instant,
}

/// Picks the model identifier for one invocation.
pub struct ModelResolver<D> {
    discovery: D,
    override_id: Option<String>,
    marker: String,
    page_size: i32,
    cache_ttl: Option<Duration>,
    cache: Mutex<Option<CachedModel>>,
}

impl<D: ProfileDiscovery> ModelResolver<D> {
    pub fn new(config: &Config, discovery: D) -> Self {
        Self {
            discovery,
            override_id: config.model_id_override.clone(),
            marker: config.model_name_marker.to_lowercase(),
            page_size: config.discovery_page_size,
            cache_ttl: config.model_cache_ttl,
            cache: Mutex::new(None),
        }
    }

    /// Return the override, a fresh cached id, or the first discovered match.
    pub async fn resolve(&self) -> Result<String, ResolveError> {
        if let Some(id) = &self.override_id {
            debug!(model_id = %id, "using configured model id");
            return Ok(id.clone());
        }

        if let Some(id) = self.cached() {
            debug!(model_id = %id, "using cached model id");
            return Ok(id);
        }

        let model_id = self.discover().await?;
        info!(model_id = %model_id, "discovered inference profile");
        if self.cache_ttl.is_some() {
            if let Ok(mut slot) = self.cache.lock() {
                *slot = Some(CachedModel {
                    model_id: model_id.clone(),
                    resolved_at: Instant::now(),
                });
            }
        }
        Ok(model_id)
    }

    async fn discover(&self) -> Result<String, ResolveError> {
        let mut matches = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0_usize;

        loop {
            let page = self
                .discovery
                .list_profiles(self.page_size, next_token.take())
                .await?;
            pages += 1;
            matches.extend(
                page.summaries
                    .iter()
                    .filter(|s| s.matches(&self.marker))
                    .filter_map(|s| s.identifier().map(str::to_string)),
            );
            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(pages, matches = matches.len(), "profile discovery finished");
        matches
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NoMatch {
                marker: self.marker.clone(),
            })
    }

    fn cached(&self) -> Option<String> {
        let ttl = self.cache_ttl?;
        let slot = self.cache.lock().ok()?;
        slot.as_ref()
            .filter(|c| c.resolved_at.elapsed() < ttl)
            .map(|c| c.model_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves scripted pages in order and records the tokens it was given.
    struct ScriptedDiscovery {
        pages: Mutex<VecDeque<Result<ProfilePage, ResolveError>>>,
        tokens: Mutex<Vec<Option<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedDiscovery {
        fn new(pages: Vec<Result<ProfilePage, ResolveError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                tokens: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProfileDiscovery for &ScriptedDiscovery {
        async fn list_profiles(
            &self,
            _page_size: i32,
            next_token: Option<String>,
        ) -> Result<ProfilePage, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tokens.lock().unwrap().push(next_token);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ProfilePage::default()))
        }
    }

    fn summary(name: &str, id: &str) -> ProfileSummary {
        ProfileSummary {
            name: Some(name.to_string()),
            id: Some(id.to_string()),
            arn: Some(format!("arn:aws:bedrock:eu-north-1:aws:inference-profile/{id}")),
        }
    }

    fn page(summaries: Vec<ProfileSummary>, next: Option<&str>) -> ProfilePage {
        ProfilePage {
            summaries,
            next_token: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn override_skips_discovery() {
        let discovery = ScriptedDiscovery::new(vec![]);
        let config = Config {
            model_id_override: Some("pinned-model".to_string()),
            ..Config::default()
        };
        let resolver = ModelResolver::new(&config, &discovery);
        assert_eq!(resolver.resolve().await.unwrap(), "pinned-model");
        assert_eq!(discovery.calls(), 0);
    }

    #[tokio::test]
    async fn first_match_across_pages_wins() {
        let discovery = ScriptedDiscovery::new(vec![
            Ok(page(vec![summary("US Claude 3 Haiku", "haiku")], Some("t1"))),
            Ok(page(
                vec![
                    summary("EU Claude-3-7-Sonnet", "eu.sonnet"),
                    summary("US Claude 3-7-sonnet", "us.sonnet"),
                ],
                Some("t2"),
            )),
            Ok(page(vec![summary("claude-3-7-sonnet later", "late")], None)),
        ]);
        let resolver = ModelResolver::new(&Config::default(), &discovery);
        assert_eq!(resolver.resolve().await.unwrap(), "eu.sonnet");
        assert_eq!(discovery.calls(), 3, "listing is paged to exhaustion");
        assert_eq!(
            *discovery.tokens.lock().unwrap(),
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[tokio::test]
    async fn falls_back_to_arn_when_id_missing() {
        let discovery = ScriptedDiscovery::new(vec![Ok(page(
            vec![
                ProfileSummary {
                    name: Some("claude-3-7-sonnet".to_string()),
                    id: None,
                    arn: None,
                },
                ProfileSummary {
                    name: Some("claude-3-7-sonnet".to_string()),
                    id: Some(String::new()),
                    arn: Some("arn:aws:bedrock:x".to_string()),
                },
            ],
            None,
        ))]);
        let resolver = ModelResolver::new(&Config::default(), &discovery);
        assert_eq!(resolver.resolve().await.unwrap(), "arn:aws:bedrock:x");
    }

    #[tokio::test]
    async fn no_match_is_reported() {
        let discovery = ScriptedDiscovery::new(vec![Ok(page(
            vec![summary("Claude 3.5 Sonnet", "s35"), ProfileSummary::default()],
            None,
        ))]);
        let resolver = ModelResolver::new(&Config::default(), &discovery);
        let err = resolver.resolve().await.expect_err("nothing matches");
        assert!(matches!(err, ResolveError::NoMatch { .. }));
    }

    #[tokio::test]
    async fn listing_failure_is_reported() {
        let discovery = ScriptedDiscovery::new(vec![
            Ok(page(vec![], Some("t1"))),
            Err(ResolveError::Discovery("AccessDeniedException".to_string())),
        ]);
        let resolver = ModelResolver::new(&Config::default(), &discovery);
        let err = resolver.resolve().await.expect_err("listing failed");
        assert!(err.to_string().contains("AccessDeniedException"));
    }

    #[tokio::test]
    async fn blank_token_ends_paging() {
        let discovery = ScriptedDiscovery::new(vec![
            Ok(page(vec![summary("claude-3-7-sonnet", "a")], Some(""))),
            Ok(page(vec![summary("claude-3-7-sonnet", "b")], None)),
        ]);
        let resolver = ModelResolver::new(&Config::default(), &discovery);
        assert_eq!(resolver.resolve().await.unwrap(), "a");
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test]
    async fn without_ttl_every_resolve_rediscovers() {
        let discovery = ScriptedDiscovery::new(vec![
            Ok(page(vec![summary("claude-3-7-sonnet", "a")], None)),
            Ok(page(vec![summary("claude-3-7-sonnet", "b")], None)),
        ]);
        let resolver = ModelResolver::new(&Config::default(), &discovery);
        assert_eq!(resolver.resolve().await.unwrap(), "a");
        assert_eq!(resolver.resolve().await.unwrap(), "b");
        assert_eq!(discovery.calls(), 2);
    }

    #[tokio::test]
    async fn ttl_cache_reuses_discovered_id() {
        let discovery = ScriptedDiscovery::new(vec![
            Ok(page(vec![summary("claude-3-7-sonnet", "a")], None)),
            Ok(page(vec![summary("claude-3-7-sonnet", "b")], None)),
        ]);
        let config = Config {
            model_cache_ttl: Some(Duration::from_secs(600)),
            ..Config::default()
        };
        let resolver = ModelResolver::new(&config, &discovery);
        assert_eq!(resolver.resolve().await.unwrap(), "a");
        assert_eq!(resolver.resolve().await.unwrap(), "a");
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test]
    async fn expired_cache_triggers_rediscovery() {
        let discovery = ScriptedDiscovery::new(vec![
            Ok(page(vec![summary("claude-3-7-sonnet", "a")], None)),
            Ok(page(vec![summary("claude-3-7-sonnet", "b")], None)),
        ]);
        let config = Config {
            model_cache_ttl: Some(Duration::from_millis(5)),
            ..Config::default()
        };
        let resolver = ModelResolver::new(&config, &discovery);
        assert_eq!(resolver.resolve().await.unwrap(), "a");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(resolver.resolve().await.unwrap(), "b");
        assert_eq!(discovery.calls(), 2);
    }

    #[tokio::test]
    async fn failed_discovery_is_not_cached() {
        let discovery = ScriptedDiscovery::new(vec![
            Err(ResolveError::Discovery("timeout".to_string())),
            Ok(page(vec![summary("claude-3-7-sonnet", "a")], None)),
        ]);
        let config = Config {
            model_cache_ttl: Some(Duration::from_secs(600)),
            ..Config::default()
        };
        let resolver = ModelResolver::new(&config, &discovery);
        assert!(resolver.resolve().await.is_err());
        assert_eq!(resolver.resolve().await.unwrap(), "a");
    }
}
