//! Isolated worker pool for saga runs.
//!
//! Coordinators spend most of their time suspended on the response broker;
//! running them on a dedicated pool keeps those long awaits off whatever
//! runtime serves inbound requests. A semaphore bounds how many runs are in
//! flight at once; excess runs queue until a permit frees up.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Bounded multi-thread runtime dedicated to saga execution.
///
/// Dropping the pool shuts its runtime down, which blocks; drop it outside
/// async contexts.
pub struct SagaPool {
    runtime: tokio::runtime::Runtime,
    permits: Arc<Semaphore>,
}

impl SagaPool {
    /// Creates a pool with `worker_threads` OS threads and at most
    /// `max_in_flight` concurrently running sagas.
    pub fn new(worker_threads: usize, max_in_flight: usize) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("saga-worker")
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            permits: Arc::new(Semaphore::new(max_in_flight)),
        })
    }

    /// Spawns a saga run on the pool.
    ///
    /// The run waits for an in-flight permit before executing and holds it
    /// until completion. The returned handle can be awaited from any runtime.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.runtime.spawn(async move {
            let _permit = permits
                .acquire()
                .await
                .expect("saga pool semaphore is never closed");
            future.await
        })
    }

    /// Returns how many in-flight permits are currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
