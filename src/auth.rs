//! Credential resolution for auth templates.
//!
//! Template values may embed `{NAME}` placeholders. Each placeholder is
//! resolved in order: session cache, process environment, interactive prompt
//! (bounded by a timeout). Successful interactive answers are cached for the
//! session so the user is never asked twice. A placeholder that cannot be
//! resolved stays literal in the substituted value and is reported to the
//! caller, which decides whether that is fatal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::session::CredentialCache;

/// Interactive credential prompt capability (external collaborator).
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Ask the user for the named credential. `None` means no answer.
    async fn ask(&self, name: &str) -> Option<String>;
}

/// A prompt that never answers; used when no interactive channel exists.
pub struct NoPrompt;

#[async_trait]
impl CredentialPrompt for NoPrompt {
    async fn ask(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Result of resolving one template.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Template with placeholders substituted where resolution succeeded.
    pub values: HashMap<String, String>,
    /// Placeholder names that could not be resolved, in first-seen order.
    pub unresolved: Vec<String>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Resolves `{NAME}` placeholders in auth templates.
pub struct AuthResolver {
    prompt: Arc<dyn CredentialPrompt>,
    prompt_timeout: Duration,
    placeholder: Regex,
}

impl AuthResolver {
    pub fn new(prompt: Arc<dyn CredentialPrompt>, prompt_timeout: Duration) -> Self {
        Self {
            prompt,
            prompt_timeout,
            // Names are conventional environment-variable identifiers.
            placeholder: Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}")
                .expect("placeholder regex is valid"),
        }
    }

    /// Resolve every placeholder in `template` against the session cache, the
    /// environment, and finally the interactive prompt.
    ///
    /// Safe to call concurrently for the same session: a per-(session, name)
    /// flight guard ensures each placeholder is prompted for at most once at
    /// a time, and cache hits never re-prompt.
    pub async fn resolve(
        &self,
        cache: &CredentialCache,
        template: &HashMap<String, String>,
    ) -> Resolution {
        let mut resolution = Resolution::default();

        for (key, raw) in template {
            let mut value = raw.clone();
            for name in self.placeholder_names(raw) {
                match self.resolve_placeholder(cache, &name).await {
                    Some(secret) => {
                        value = value.replace(&format!("{{{name}}}"), &secret);
                    }
                    None => {
                        warn!("Credential {} could not be resolved", name);
                        if !resolution.unresolved.contains(&name) {
                            resolution.unresolved.push(name);
                        }
                    }
                }
            }
            resolution.values.insert(key.clone(), value);
        }

        resolution
    }

    fn placeholder_names(&self, value: &str) -> Vec<String> {
        self.placeholder
            .captures_iter(value)
            .map(|c| c[1].to_string())
            .collect()
    }

    async fn resolve_placeholder(&self, cache: &CredentialCache, name: &str) -> Option<String> {
        if let Some(value) = cache.get(name).await {
            debug!("Credential {} resolved from session cache", name);
            return Some(value);
        }

        if let Ok(value) = std::env::var(name) {
            if !value.is_empty() {
                debug!("Credential {} resolved from environment", name);
                return Some(value);
            }
        }

        // Single flight per (session, name): whoever holds the guard prompts;
        // everyone queued behind it re-reads the cache first.
        let flight = cache.flight(name).await;
        let _guard = flight.lock().await;

        if let Some(value) = cache.get(name).await {
            return Some(value);
        }

        let answer = tokio::time::timeout(self.prompt_timeout, self.prompt.ask(name)).await;
        match answer {
            Ok(Some(value)) if !value.trim().is_empty() => {
                let value = value.trim().to_string();
                cache.insert(name, value.clone()).await;
                Some(value)
            }
            Ok(_) => None,
            Err(_) => {
                warn!("Prompt for credential {} timed out", name);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPrompt {
        answer: Option<String>,
        asks: AtomicUsize,
    }

    impl CountingPrompt {
        fn new(answer: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(String::from),
                asks: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CredentialPrompt for CountingPrompt {
        async fn ask(&self, _name: &str) -> Option<String> {
            self.asks.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    fn template(key: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(key.to_string(), value.to_string())])
    }

    #[tokio::test]
    async fn test_env_fallback_without_prompt() {
        std::env::set_var("APILOT_TEST_API_KEY", "secret123");
        let prompt = CountingPrompt::new(Some("from-prompt"));
        let resolver = AuthResolver::new(prompt.clone(), Duration::from_secs(1));
        let cache = CredentialCache::default();

        let resolution = resolver
            .resolve(
                &cache,
                &template("Authorization", "Bearer {APILOT_TEST_API_KEY}"),
            )
            .await;

        assert_eq!(resolution.values["Authorization"], "Bearer secret123");
        assert!(resolution.is_complete());
        assert_eq!(prompt.asks.load(Ordering::SeqCst), 0);
        std::env::remove_var("APILOT_TEST_API_KEY");
    }

    #[tokio::test]
    async fn test_prompt_answer_cached_for_session() {
        let prompt = CountingPrompt::new(Some("prompted-value"));
        let resolver = AuthResolver::new(prompt.clone(), Duration::from_secs(1));
        let cache = CredentialCache::default();
        let tmpl = template("X-Token", "{APILOT_TEST_PROMPTED}");

        let first = resolver.resolve(&cache, &tmpl).await;
        assert_eq!(first.values["X-Token"], "prompted-value");

        let second = resolver.resolve(&cache, &tmpl).await;
        assert_eq!(second.values["X-Token"], "prompted-value");
        // Cache hit on the second resolve: exactly one prompt total.
        assert_eq!(prompt.asks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unanswered_placeholder_stays_literal() {
        let resolver = AuthResolver::new(Arc::new(NoPrompt), Duration::from_millis(50));
        let cache = CredentialCache::default();

        let resolution = resolver
            .resolve(&cache, &template("Authorization", "Bearer {APILOT_TEST_MISSING}"))
            .await;

        assert_eq!(
            resolution.values["Authorization"],
            "Bearer {APILOT_TEST_MISSING}"
        );
        assert_eq!(resolution.unresolved, vec!["APILOT_TEST_MISSING"]);
        // Failure is not cached; nothing unresolved ever enters the cache.
        assert!(cache.get("APILOT_TEST_MISSING").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_resolution_prompts_once() {
        struct SlowPrompt {
            asks: AtomicUsize,
        }

        #[async_trait]
        impl CredentialPrompt for SlowPrompt {
            async fn ask(&self, _name: &str) -> Option<String> {
                self.asks.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Some("shared".to_string())
            }
        }

        let prompt = Arc::new(SlowPrompt {
            asks: AtomicUsize::new(0),
        });
        let resolver = Arc::new(AuthResolver::new(prompt.clone(), Duration::from_secs(5)));
        let cache = Arc::new(CredentialCache::default());
        let tmpl = template("X-Token", "{APILOT_TEST_SHARED}");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let resolver = resolver.clone();
            let cache = cache.clone();
            let tmpl = tmpl.clone();
            handles.push(tokio::spawn(async move {
                resolver.resolve(&cache, &tmpl).await
            }));
        }

        for handle in handles {
            let resolution = handle.await.unwrap();
            assert_eq!(resolution.values["X-Token"], "shared");
        }
        assert_eq!(prompt.asks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_multiple_placeholders_in_one_value() {
        std::env::set_var("APILOT_TEST_USER", "alice");
        std::env::set_var("APILOT_TEST_PASS", "pw");
        let resolver = AuthResolver::new(Arc::new(NoPrompt), Duration::from_millis(50));
        let cache = CredentialCache::default();

        let resolution = resolver
            .resolve(
                &cache,
                &template("auth", "{APILOT_TEST_USER}:{APILOT_TEST_PASS}"),
            )
            .await;

        assert_eq!(resolution.values["auth"], "alice:pw");
        std::env::remove_var("APILOT_TEST_USER");
        std::env::remove_var("APILOT_TEST_PASS");
    }
}
