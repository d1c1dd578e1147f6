//! Ordered strategy chain with member normalization.

use tracing::{debug, info, instrument, warn};

use crate::collection::{MemberRef, normalize_members};

use super::{DiscoveryContext, DiscoveryError, DiscoveryStep, DiscoveryStrategy};

/// Tries strategies in registration order until one yields members.
pub struct DiscoveryResolver {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl DiscoveryResolver {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Appends a strategy at the lowest priority.
    #[tracing::instrument(skip(self, strategy), fields(strategy_name))]
    pub fn register(&mut self, strategy: Box<dyn DiscoveryStrategy>) {
        tracing::Span::current().record("strategy_name", strategy.name());
        debug!(name = strategy.name(), position = self.strategies.len(), "Registering strategy");
        self.strategies.push(strategy);
    }

    /// Number of registered strategies.
    #[must_use]
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if no strategies are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy names in priority order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolves the ordered, de-duplicated member list of a collection.
    ///
    /// A strategy's result is accepted only when it is non-empty after
    /// normalization; errors and empty results fall through to the next
    /// strategy.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Exhausted`] when no strategy produced members.
    #[instrument(skip(self, ctx), fields(strategies = self.strategies.len()))]
    pub async fn resolve(&self, url: &str, ctx: &DiscoveryContext) -> Result<Vec<MemberRef>, DiscoveryError> {
        for strategy in &self.strategies {
            debug!(strategy = strategy.name(), "Trying strategy");
            match strategy.discover(url, ctx).await {
                Ok(DiscoveryStep::Members(discovered)) => {
                    let found = discovered.len();
                    let members = normalize_members(discovered);
                    if members.is_empty() {
                        debug!(strategy = strategy.name(), "Strategy returned only unusable members");
                        continue;
                    }
                    info!(
                        strategy = strategy.name(),
                        found,
                        members = members.len(),
                        "Members resolved"
                    );
                    return Ok(members);
                }
                Ok(DiscoveryStep::Empty) => {
                    debug!(strategy = strategy.name(), "Strategy found nothing, trying next");
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), error = %err, "Strategy failed, trying next");
                }
            }
        }
        Err(DiscoveryError::exhausted(url, self.strategies.len()))
    }
}

impl std::fmt::Debug for DiscoveryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryResolver")
            .field("strategy_count", &self.strategies.len())
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

impl Default for DiscoveryResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::collection::DiscoveredMember;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockStrategy {
        mock_name: &'static str,
        outcome: Result<DiscoveryStep, DiscoveryError>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DiscoveryStrategy for MockStrategy {
        fn name(&self) -> &str {
            self.mock_name
        }

        async fn discover(&self, _url: &str, _ctx: &DiscoveryContext) -> Result<DiscoveryStep, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn mock(name: &'static str, outcome: Result<DiscoveryStep, DiscoveryError>) -> (MockStrategy, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            MockStrategy {
                mock_name: name,
                outcome,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    fn member(id: &str) -> DiscoveredMember {
        DiscoveredMember::new(Some(id.to_string()), format!("Chapter {id}"), format!("https://s.test/c/{id}"))
    }

    #[tokio::test]
    async fn test_empty_registry_is_exhausted() {
        let resolver = DiscoveryResolver::new();
        assert!(resolver.is_empty());
        let err = resolver.resolve("https://s.test/c", &DiscoveryContext::new()).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Exhausted { tried: 0, .. }));
    }

    #[tokio::test]
    async fn test_first_non_empty_strategy_wins() {
        let (first, first_calls) = mock("first", Ok(DiscoveryStep::Empty));
        let (second, second_calls) = mock(
            "second",
            Ok(DiscoveryStep::Members(vec![member("3"), member("1"), member("2")])),
        );
        let (third, third_calls) = mock("third", Ok(DiscoveryStep::Members(vec![member("9")])));

        let mut resolver = DiscoveryResolver::new();
        resolver.register(Box::new(first));
        resolver.register(Box::new(second));
        resolver.register(Box::new(third));

        let members = resolver.resolve("https://s.test/c", &DiscoveryContext::new()).await.unwrap();
        let ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_fall_through() {
        let (failing, _) = mock(
            "failing",
            Err(DiscoveryError::strategy_failed("failing", "https://s.test/c", "HTTP 500")),
        );
        let (working, _) = mock("working", Ok(DiscoveryStep::Members(vec![member("1")])));
        let mut resolver = DiscoveryResolver::new();
        resolver.register(Box::new(failing));
        resolver.register(Box::new(working));

        let members = resolver.resolve("https://s.test/c", &DiscoveryContext::new()).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].ordinal, 1);
    }

    #[tokio::test]
    async fn test_all_empty_is_exhausted_with_count() {
        let (a, _) = mock("a", Ok(DiscoveryStep::Empty));
        let (b, _) = mock("b", Ok(DiscoveryStep::Members(Vec::new())));
        let mut resolver = DiscoveryResolver::new();
        resolver.register(Box::new(a));
        resolver.register(Box::new(b));
        let err = resolver.resolve("https://s.test/c", &DiscoveryContext::new()).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Exhausted { tried: 2, .. }));
    }

    #[test]
    fn test_debug_lists_strategy_names() {
        let (a, _) = mock("alpha", Ok(DiscoveryStep::Empty));
        let mut resolver = DiscoveryResolver::default();
        resolver.register(Box::new(a));
        let debug = format!("{resolver:?}");
        assert!(debug.contains("alpha"));
        assert!(debug.contains("strategy_count: 1"));
    }
}
