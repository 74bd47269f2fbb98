use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error};

use crate::error::{CatalogError, CatalogResult};

type SharedResult<T> = Shared<BoxFuture<'static, CatalogResult<T>>>;
type InflightMap<T> = Arc<Mutex<HashMap<String, (u64, SharedResult<T>)>>>;

/// Coalesces concurrent computations of the same key.
///
/// The first caller for a key starts the work on a spawned task; callers that
/// arrive while it runs await the same shared result. The work runs to
/// completion even if every caller goes away, and the key is released as soon
/// as it finishes, success or failure.
pub struct SingleFlight<T> {
    inflight: InflightMap<T>,
    generation: AtomicU64,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key` unless a run for the same key is already in flight
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> CatalogResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<T>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());

            if let Some((_, shared)) = inflight.get(key) {
                debug!("Joining in-flight computation for {}", key);
                shared.clone()
            } else {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let registry = Arc::clone(&self.inflight);
                let owned_key = key.to_string();
                let fut = work();

                // Release needs the lock we hold, so it cannot run before the insert below.
                let handle = tokio::spawn(async move {
                    let result = fut.await;
                    release(&registry, &owned_key, generation);
                    result
                });

                let registry = Arc::clone(&self.inflight);
                let owned_key = key.to_string();
                let shared = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => {
                            release(&registry, &owned_key, generation);
                            error!("Coalesced computation failed to complete: {}", e);
                            Err(CatalogError::Internal(format!("background task failed: {}", e)))
                        }
                    }
                }
                .boxed()
                .shared();

                inflight.insert(key.to_string(), (generation, shared.clone()));
                shared
            }
        };

        shared.await
    }

    /// Number of keys currently being computed
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn release<T>(registry: &InflightMap<T>, key: &str, generation: u64) {
    let mut inflight = registry.lock().unwrap_or_else(|e| e.into_inner());
    if matches!(inflight.get(key), Some((g, _)) if *g == generation) {
        inflight.remove(key);
    }
}
