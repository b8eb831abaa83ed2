use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::error::{AppError, AppResult};

/// Opaque, content-derived key identifying a logical request
///
/// Equality is byte-exact; the cache never interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// Wraps raw bytes as a fingerprint
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Hashes the given parts into a fingerprint
    ///
    /// Parts are length-prefixed before hashing so `("ab", "c")` and
    /// `("a", "bc")` produce different fingerprints.
    pub fn digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        Self(hasher.finalize().to_vec())
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// State of one fingerprint in the cache
enum Slot<V> {
    /// A computed value, shared with every hit until it expires
    Ready { value: V, expires_at: Instant },
    /// A computation in progress; waiters park here for the fan-out
    InFlight {
        waiters: Vec<oneshot::Sender<Result<V, String>>>,
    },
}

/// What a caller turned out to be once the slot map was consulted
enum Role<V> {
    Hit(V),
    Waiter(oneshot::Receiver<Result<V, String>>),
    Leader,
}

/// Fingerprint-keyed single-flight cache with per-entry TTL
///
/// For any set of concurrent callers sharing a fingerprint, the computation
/// runs at most once; everyone else waits on the in-flight slot and receives
/// the same outcome. Failed computations are never cached, so the next call
/// after a failure retries from scratch. Distinct fingerprints only ever
/// contend on the short slot-map lock, never on each other's computations.
pub struct DedupCache<V> {
    slots: Arc<Mutex<HashMap<Fingerprint, Slot<V>>>>,
    compute_timeout: Duration,
}

impl<V> Clone for DedupCache<V> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            compute_timeout: self.compute_timeout,
        }
    }
}

impl<V: Clone + Send + 'static> DedupCache<V> {
    /// Creates an empty cache
    ///
    /// `compute_timeout` bounds every computation run through the cache;
    /// exceeding it counts as a compute failure and is not cached.
    pub fn new(compute_timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            compute_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Slot<V>>> {
        self.slots.lock().expect("dedup slot map lock poisoned")
    }

    /// Returns the cached value for `fingerprint`, or computes it
    ///
    /// Exactly one of any set of concurrent callers for the same fingerprint
    /// invokes `compute`; the rest suspend until it settles and observe the
    /// same result. Errors propagate to every waiter as
    /// [`AppError::ComputeFailed`] and leave the slot empty.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        ttl: Duration,
        compute: F,
    ) -> AppResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<V>>,
    {
        let role = {
            let mut slots = self.lock();
            match slots.get_mut(fingerprint) {
                Some(Slot::Ready { value, expires_at }) if *expires_at > Instant::now() => {
                    Role::Hit(value.clone())
                }
                Some(Slot::InFlight { waiters }) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Role::Waiter(rx)
                }
                // Vacant, or expired and due for recomputation
                _ => {
                    slots.insert(
                        fingerprint.clone(),
                        Slot::InFlight {
                            waiters: Vec::new(),
                        },
                    );
                    Role::Leader
                }
            }
        };

        match role {
            Role::Hit(value) => {
                tracing::debug!(fingerprint = %fingerprint, "cache hit");
                Ok(value)
            }
            Role::Waiter(rx) => {
                tracing::debug!(fingerprint = %fingerprint, "joining in-flight computation");
                match rx.await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(message)) => Err(AppError::ComputeFailed {
                        fingerprint: fingerprint.to_string(),
                        message,
                    }),
                    // The leader was cancelled before settling; a fresh call
                    // will claim the slot and recompute.
                    Err(_) => Err(AppError::ComputeFailed {
                        fingerprint: fingerprint.to_string(),
                        message: "computation abandoned before completion".to_string(),
                    }),
                }
            }
            Role::Leader => self.lead(fingerprint, ttl, compute()).await,
        }
    }

    /// Runs the computation as the flight leader and settles the slot
    async fn lead<Fut>(&self, fingerprint: &Fingerprint, ttl: Duration, fut: Fut) -> AppResult<V>
    where
        Fut: Future<Output = AppResult<V>>,
    {
        tracing::debug!(fingerprint = %fingerprint, "cache miss, computing");

        // If this task is cancelled mid-compute, the guard tears the
        // in-flight slot down so waiters fail fast instead of hanging.
        let mut guard = FlightGuard {
            slots: Arc::clone(&self.slots),
            fingerprint: fingerprint.clone(),
            armed: true,
        };

        let result = match tokio::time::timeout(self.compute_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Upstream(format!(
                "computation for fingerprint {} timed out after {:?}",
                fingerprint, self.compute_timeout
            ))),
        };

        guard.armed = false;
        let mut slots = self.lock();
        let waiters = match slots.remove(fingerprint) {
            Some(Slot::InFlight { waiters }) => waiters,
            _ => Vec::new(),
        };

        match &result {
            Ok(value) => {
                for tx in waiters {
                    let _ = tx.send(Ok(value.clone()));
                }
                slots.insert(
                    fingerprint.clone(),
                    Slot::Ready {
                        value: value.clone(),
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
            Err(err) => {
                // Negative results are never cached; the slot stays empty so
                // the next caller retries immediately.
                let message = err.to_string();
                tracing::warn!(fingerprint = %fingerprint, error = %message, "computation failed");
                for tx in waiters {
                    let _ = tx.send(Err(message.clone()));
                }
            }
        }

        result
    }

    /// Number of occupied slots, in-flight included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no slots are occupied
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every expired entry now
    ///
    /// Also the seam where a bounded variant would evict non-expired entries.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Ready { expires_at, .. } => *expires_at > now,
            Slot::InFlight { .. } => true,
        });
        before - slots.len()
    }

    /// Spawns a background task that periodically drops expired entries
    ///
    /// The task runs until the returned handle signals shutdown.
    pub fn spawn_sweeper(&self, every: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let cache = self.clone();

        tokio::spawn(async move {
            tracing::debug!("cache sweeper started");
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await; // first tick fires immediately

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = cache.purge_expired();
                        if evicted > 0 {
                            tracing::debug!(evicted, "swept expired cache entries");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("cache sweeper stopped");
                        break;
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx }
    }
}

/// Handle for stopping a cache sweeper task
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    /// Signals the sweeper task to stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache sweeper shutdown signal sent");
    }
}

/// Removes an in-flight slot if its leader never settled it
struct FlightGuard<V> {
    slots: Arc<Mutex<HashMap<Fingerprint, Slot<V>>>>,
    fingerprint: Fingerprint,
    armed: bool,
}

impl<V> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.slots.lock().expect("dedup slot map lock poisoned");
        if let Some(Slot::InFlight { .. }) = slots.get(&self.fingerprint) {
            // Dropping the slot closes every waiter's channel.
            slots.remove(&self.fingerprint);
        }
    }
}
