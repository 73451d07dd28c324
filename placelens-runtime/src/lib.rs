use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod rate;

pub use rate::RateLimiter;

#[derive(Clone)]
pub struct PlacelensHandle {
    inner: Handle,
    cancel: Arc<CancellationToken>,
}

pub struct PlacelensRuntime {
    runtime: Runtime,
    cancel: Arc<CancellationToken>,
}

impl PlacelensRuntime {
    /// Build a Tokio runtime configured for the placelens binary.
    ///
    /// ```
    /// use placelens_runtime::PlacelensRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PlacelensRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        let cancel = Arc::new(CancellationToken::new());
        Ok(Self { runtime, cancel })
    }

    /// Obtain a cloned handle for spawning tasks and sharing cancellation.
    ///
    /// ```
    /// use placelens_runtime::PlacelensRuntime;
    ///
    /// let runtime = PlacelensRuntime::build("handle-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// assert_eq!(handle.cancellation().is_cancelled(), false);
    /// ```
    pub fn handle(&self) -> PlacelensHandle {
        PlacelensHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Run a future to completion on the runtime.
    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and shut the runtime down gracefully.
    ///
    /// ```
    /// use placelens_runtime::PlacelensRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PlacelensRuntime::build("shutdown-example", Some(1)).unwrap();
    /// runtime.shutdown(Duration::from_millis(5));
    /// ```
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl PlacelensHandle {
    /// Spawn a future onto the shared runtime handle.
    ///
    /// ```
    /// use placelens_runtime::PlacelensRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PlacelensRuntime::build("handle-doctest", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// let task = handle.spawn(async { 21 * 2 });
    /// let result = runtime.block_on(async move { task.await.unwrap() });
    /// assert_eq!(result, 42);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// Clone the shared cancellation token to coordinate shutdown.
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Cancel the shared token on the first Ctrl-C.
    ///
    /// In-flight requests finish; loops observe the token at their next
    /// checkpoint.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.inner.spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    match res {
                        Ok(()) => tracing::warn!("runtime.ctrl_c: finishing in-flight work, then stopping"),
                        Err(err) => {
                            tracing::warn!(error=%err, "runtime.ctrl_c.listen_failed");
                            return;
                        }
                    }
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        })
    }
}

/// The wait was cut short by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Sleep for `dur` unless `cancel` fires first.
///
/// ```
/// use placelens_runtime::{sleep_or_cancel, Interrupted};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let token = CancellationToken::new();
/// assert_eq!(sleep_or_cancel(&token, Duration::from_millis(1)).await, Ok(()));
/// token.cancel();
/// assert_eq!(sleep_or_cancel(&token, Duration::from_secs(60)).await, Err(Interrupted));
/// # });
/// ```
pub async fn sleep_or_cancel(cancel: &CancellationToken, dur: Duration) -> Result<(), Interrupted> {
    if cancel.is_cancelled() {
        return Err(Interrupted);
    }
    if dur.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(dur) => Ok(()),
        _ = cancel.cancelled() => Err(Interrupted),
    }
}
