//! Per-scope graph payloads with in-flight request sharing.

use crate::error::{GraphError, Result};
use async_trait::async_trait;
use gitreader_protocol::{GraphPayload, FULL_SCOPE};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex as TokioMutex, OnceCell};

/// Anything that can produce the raw node/edge payload for a scope.
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn fetch_graph(&self, scope: &str) -> Result<GraphPayload>;
}

#[async_trait]
impl<S: GraphSource + ?Sized> GraphSource for Arc<S> {
    async fn fetch_graph(&self, scope: &str) -> Result<GraphPayload> {
        (**self).fetch_graph(scope).await
    }
}

/// Reads `graph.json` for the full scope and `<scope>.json` otherwise.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for_scope(&self, scope: &str) -> PathBuf {
        if scope == FULL_SCOPE {
            return self.root.join("graph.json");
        }
        let file = scope.replace([':', '/'], "_");
        self.root.join(format!("{file}.json"))
    }
}

#[async_trait]
impl GraphSource for DirectorySource {
    async fn fetch_graph(&self, scope: &str) -> Result<GraphPayload> {
        let path = self.path_for_scope(scope);
        let bytes = tokio::fs::read(&path).await.map_err(|err| {
            GraphError::source_failure(scope, format!("{}: {err}", path.display()))
        })?;
        let payload: GraphPayload = serde_json::from_slice(&bytes)?;
        Ok(payload)
    }
}

type InFlight = Arc<OnceCell<Arc<GraphPayload>>>;

/// Session-scoped cache in front of a [`GraphSource`].
pub struct GraphStore<S> {
    source: S,
    cache: TokioMutex<HashMap<String, Arc<GraphPayload>>>,
    in_flight: TokioMutex<HashMap<String, InFlight>>,
}

impl<S: GraphSource> GraphStore<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: TokioMutex::new(HashMap::new()),
            in_flight: TokioMutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the cached payload or fetches it; concurrent callers for one scope share a fetch.
    pub async fn load(&self, scope: &str) -> Result<Arc<GraphPayload>> {
        if let Some(hit) = self.cache.lock().await.get(scope) {
            return Ok(Arc::clone(hit));
        }

        let cell = {
            let mut table = self.in_flight.lock().await;
            Arc::clone(table.entry(scope.to_string()).or_default())
        };
        let result = cell
            .get_or_try_init(|| async {
                log::info!("Fetching graph for scope {scope}");
                self.source.fetch_graph(scope).await.map(Arc::new)
            })
            .await
            .map(Arc::clone);

        if let Ok(payload) = &result {
            self.cache
                .lock()
                .await
                .insert(scope.to_string(), Arc::clone(payload));
        }
        {
            let mut table = self.in_flight.lock().await;
            if table.get(scope).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
                table.remove(scope);
            }
        }
        if let Err(err) = &result {
            log::warn!("Graph load failed for scope {scope}: {err}");
        }
        result
    }

    pub async fn cached(&self, scope: &str) -> Option<Arc<GraphPayload>> {
        self.cache.lock().await.get(scope).cloned()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
        self.in_flight.lock().await.clear();
    }
}

/// Monotonic counter used to discard responses that lost a race.
#[derive(Debug, Default)]
pub struct RequestTokens {
    current: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

impl RequestTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> RequestTicket {
        self.current += 1;
        RequestTicket(self.current)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitreader_protocol::{NodeKind, SymbolNode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl GraphSource for CountingSource {
        async fn fetch_graph(&self, scope: &str) -> Result<GraphPayload> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_first && call == 0 {
                return Err(GraphError::source_failure(scope, "connection reset"));
            }
            let mut payload = GraphPayload::new(
                vec![SymbolNode::new("a", "a", NodeKind::Function)],
                Vec::new(),
            );
            payload.scope = Some(scope.to_string());
            Ok(payload)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_loads_share_one_fetch() {
        let store = GraphStore::new(CountingSource::default());
        let (first, second) = tokio::join!(store.load("full"), store.load("full"));
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(store.source().calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.in_flight_len().await, 0);

        store.load("full").await.unwrap();
        assert_eq!(store.source().calls.load(Ordering::SeqCst), 1);

        store.load("group:app").await.unwrap();
        assert_eq!(store.source().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_is_retried() {
        let store = GraphStore::new(CountingSource {
            fail_first: true,
            ..CountingSource::default()
        });
        let err = store.load("full").await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(store.in_flight_len().await, 0);
        assert!(store.cached("full").await.is_none());

        let payload = store.load("full").await.unwrap();
        assert_eq!(payload.nodes.len(), 1);
        assert_eq!(store.source().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_forgets_cached_payloads() {
        let store = GraphStore::new(CountingSource::default());
        store.load("full").await.unwrap();
        store.clear().await;
        assert!(store.cached("full").await.is_none());
        store.load("full").await.unwrap();
        assert_eq!(store.source().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn directory_source_maps_scopes_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let payload = r#"{"nodes":[{"id":"f","name":"a.py","kind":"file","summary":""}],"edges":[]}"#;
        std::fs::write(dir.path().join("graph.json"), payload).unwrap();
        std::fs::write(dir.path().join("group_app.json"), payload).unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(
            source.path_for_scope("story:intro/part"),
            dir.path().join("story_intro_part.json")
        );
        assert_eq!(source.fetch_graph("full").await.unwrap().nodes.len(), 1);
        assert_eq!(source.fetch_graph("group:app").await.unwrap().nodes.len(), 1);

        let err = source.fetch_graph("group:missing").await.unwrap_err();
        assert!(matches!(err, GraphError::Source { .. }));
    }

    #[test]
    fn only_the_latest_ticket_is_current() {
        let mut tokens = RequestTokens::new();
        let first = tokens.begin();
        assert!(tokens.is_current(first));
        let second = tokens.begin();
        assert!(!tokens.is_current(first));
        assert!(tokens.is_current(second));
    }
}
