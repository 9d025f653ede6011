//! Per-endpoint connection cache.
//!
//! # Responsibilities
//! - Hold at most one connection per endpoint key
//! - Create connections lazily, bounded by the connect timeout
//! - Probe liveness before every reuse; recreate dead connections
//! - Close and evict on release (ephemeral schemes, timeouts, shutdown)
//!
//! # Synchronization
//! The map holds one async mutex "slot" per key. A caller keeps its slot
//! locked from acquire until the send finishes, so concurrent calls to the
//! same key serialize through the single handle while different keys run in
//! parallel. After locking, the caller re-checks that its slot is still the
//! one in the map; a slot evicted meanwhile is abandoned and the lookup
//! retried, so an evicted slot never gets a fresh connection.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::TransportError;
use crate::http::{OutboundRequest, Response};
use crate::net::connection::{Connection, ConnectionId, Connector};
use crate::net::endpoint::{Endpoint, EndpointKey};
use crate::observability::metrics::{self, ConnectionEvent};

type Slot = Arc<Mutex<Option<Box<dyn Connection>>>>;

/// Shared cache of live connections keyed by endpoint.
pub struct ConnectionCache {
    connector: Arc<dyn Connector>,
    slots: Arc<DashMap<EndpointKey, Slot>>,
    connect_timeout: Duration,
}

impl ConnectionCache {
    pub fn new(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            slots: Arc::new(DashMap::new()),
            connect_timeout,
        }
    }

    /// Lock the connection for `endpoint`, creating or replacing it as needed.
    pub async fn acquire(&self, endpoint: &Endpoint) -> Result<CachedConnection, TransportError> {
        let key = endpoint.key();
        let mut guard = self.lock_slot(&key).await;

        match (*guard).as_ref().map(|conn| (conn.id(), conn.is_alive())) {
            Some((id, true)) => {
                tracing::trace!(connection_id = %id, endpoint = %key, "Reusing connection");
                metrics::record_connection(ConnectionEvent::Reused);
            }
            Some((id, false)) => {
                tracing::debug!(connection_id = %id, endpoint = %key, "Liveness probe failed, reconnecting");
                if let Some(mut dead) = guard.take() {
                    dead.close().await;
                }
                metrics::record_connection(ConnectionEvent::Evicted);
            }
            None => {}
        }

        let id = match (*guard).as_ref().map(|conn| conn.id()) {
            Some(id) => id,
            None => {
                let connected = tokio::time::timeout(self.connect_timeout, self.connector.connect(endpoint))
                    .await
                    .unwrap_or(Err(TransportError::Timeout(self.connect_timeout)));
                let conn = match connected {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::debug!(endpoint = %key, error = %e, "Connection failed");
                        let slot = OwnedMutexGuard::mutex(&guard);
                        self.slots.remove_if(&key, |_, current| Arc::ptr_eq(current, slot));
                        return Err(e);
                    }
                };
                let id = conn.id();
                tracing::debug!(connection_id = %id, endpoint = %key, "Connection created");
                metrics::record_connection(ConnectionEvent::Created);
                *guard = Some(conn);
                id
            }
        };

        Ok(CachedConnection {
            key,
            id,
            slots: Arc::clone(&self.slots),
            guard,
        })
    }

    /// Close and evict the connection for `key`, if any.
    ///
    /// Waits for an in-flight call on that key to finish first.
    pub async fn release(&self, key: &EndpointKey) {
        if let Some((_, slot)) = self.slots.remove(key) {
            let mut guard = slot.lock().await;
            if let Some(mut conn) = guard.take() {
                tracing::debug!(connection_id = %conn.id(), endpoint = %key, "Connection released");
                conn.close().await;
                metrics::record_connection(ConnectionEvent::Released);
            }
        }
    }

    /// Close every cached connection.
    pub async fn close_all(&self) {
        let keys: Vec<EndpointKey> = self.slots.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.release(&key).await;
        }
    }

    pub fn contains(&self, key: &EndpointKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    async fn lock_slot(&self, key: &EndpointKey) -> OwnedMutexGuard<Option<Box<dyn Connection>>> {
        loop {
            let slot = Arc::clone(self.slots.entry(key.clone()).or_default().value());
            let guard = Arc::clone(&slot).lock_owned().await;
            let current = self
                .slots
                .get(key)
                .map_or(false, |entry| Arc::ptr_eq(entry.value(), &slot));
            if current {
                return guard;
            }
        }
    }
}

impl std::fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("endpoints", &self.slots.len())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Exclusive access to a cached connection for the duration of one call.
pub struct CachedConnection {
    key: EndpointKey,
    id: ConnectionId,
    slots: Arc<DashMap<EndpointKey, Slot>>,
    guard: OwnedMutexGuard<Option<Box<dyn Connection>>>,
}

impl CachedConnection {
    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    /// Close the connection and remove it from the cache.
    pub async fn release(mut self) {
        let slot = OwnedMutexGuard::mutex(&self.guard);
        self.slots.remove_if(&self.key, |_, current| Arc::ptr_eq(current, slot));
        if let Some(mut conn) = self.guard.take() {
            tracing::debug!(connection_id = %conn.id(), endpoint = %self.key, "Connection released");
            conn.close().await;
            metrics::record_connection(ConnectionEvent::Released);
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Send one request over the locked connection.
    pub async fn send(&mut self, request: OutboundRequest) -> Result<Response, TransportError> {
        match self.guard.as_deref_mut() {
            Some(conn) => conn.send(request).await,
            None => Err(TransportError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubConnection {
        id: ConnectionId,
        alive: Arc<AtomicBool>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connection for StubConnection {
        fn id(&self) -> ConnectionId {
            self.id
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn send(&mut self, _request: OutboundRequest) -> Result<Response, TransportError> {
            Err(TransportError::Closed)
        }

        async fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct StubConnector {
        connects: AtomicUsize,
        alive: Arc<AtomicBool>,
        closed: Arc<AtomicUsize>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Connector for StubConnector {
        async fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.alive.store(true, Ordering::SeqCst);
            Ok(Box::new(StubConnection {
                id: ConnectionId::new(),
                alive: Arc::clone(&self.alive),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint {
            scheme: "tcp".into(),
            host: "svc".into(),
            port: 9080,
        }
    }

    fn cache(connector: &Arc<StubConnector>) -> ConnectionCache {
        ConnectionCache::new(connector.clone(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn reuses_live_connection() {
        let connector = Arc::new(StubConnector::default());
        let cache = cache(&connector);

        let first = cache.acquire(&endpoint()).await.unwrap().id();
        let second = cache.acquire(&endpoint()).await.unwrap().id();

        assert_eq!(first, second);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&endpoint().key()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn recreates_dead_connection() {
        let connector = Arc::new(StubConnector::default());
        let cache = cache(&connector);

        let first = cache.acquire(&endpoint()).await.unwrap().id();
        connector.alive.store(false, Ordering::SeqCst);
        let second = cache.acquire(&endpoint()).await.unwrap().id();

        assert_ne!(first, second);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn release_evicts_and_closes() {
        let connector = Arc::new(StubConnector::default());
        let cache = cache(&connector);

        let conn = cache.acquire(&endpoint()).await.unwrap();
        conn.release().await;
        assert!(!cache.contains(&endpoint().key()));
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);

        cache.acquire(&endpoint()).await.unwrap();
        cache.release(&endpoint().key()).await;
        assert!(cache.is_empty());
        assert_eq!(connector.closed.load(Ordering::SeqCst), 2);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn connect_failure_leaves_nothing_usable() {
        let connector = Arc::new(StubConnector::default());
        connector.fail.store(true, Ordering::SeqCst);
        let cache = cache(&connector);

        assert!(matches!(cache.acquire(&endpoint()).await, Err(TransportError::Io(_))));
        assert!(!cache.contains(&endpoint().key()));

        connector.fail.store(false, Ordering::SeqCst);
        cache.acquire(&endpoint()).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_connection() {
        let connector = Arc::new(StubConnector::default());
        let cache = Arc::new(cache(&connector));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.acquire(&endpoint()).await.unwrap().id() })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_all_empties_cache() {
        let connector = Arc::new(StubConnector::default());
        let cache = cache(&connector);
        for port in [1, 2, 3] {
            let ep = Endpoint { port, ..endpoint() };
            cache.acquire(&ep).await.unwrap();
        }
        assert_eq!(cache.len(), 3);

        cache.close_all().await;
        assert!(cache.is_empty());
        assert_eq!(connector.closed.load(Ordering::SeqCst), 3);
    }
}
