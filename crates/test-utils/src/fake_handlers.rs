// crates/test-utils/src/fake_handlers.rs

//! Controllable job handlers for engine tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use gatedag::errors::{GatedagError, Result};
use gatedag::handlers::{JobContext, JobHandler};
use serde_json::{Value, json};
use tokio::sync::Notify;

/// Records every invocation and returns `{"ok": true, "job": <id>}`.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    invocations: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Job ids in invocation order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

impl JobHandler for RecordingHandler {
    fn execute(&self, _config: Value, ctx: JobContext) -> BoxFuture<'static, Result<Value>> {
        self.invocations.lock().unwrap().push(ctx.job_id.clone());
        Box::pin(async move { Ok(json!({"ok": true, "job": ctx.job_id})) })
    }
}

/// Fails the first `failures` invocations, then succeeds.
#[derive(Debug)]
pub struct FlakyHandler {
    remaining_failures: AtomicU32,
    calls: AtomicU32,
}

impl FlakyHandler {
    pub fn failing_times(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl JobHandler for FlakyHandler {
    fn execute(&self, _config: Value, _ctx: JobContext) -> BoxFuture<'static, Result<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Box::pin(async move {
            if fail {
                Err(GatedagError::HandlerExecution("transient failure".into()))
            } else {
                Ok(json!({"ok": true}))
            }
        })
    }
}

/// Always fails with the given message.
#[derive(Debug)]
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    pub fn with_message(message: &str) -> Arc<Self> {
        Arc::new(Self {
            message: message.to_string(),
        })
    }
}

impl JobHandler for FailingHandler {
    fn execute(&self, _config: Value, _ctx: JobContext) -> BoxFuture<'static, Result<Value>> {
        let message = self.message.clone();
        Box::pin(async move { Err(GatedagError::HandlerExecution(message)) })
    }
}

/// Blocks until released (or cancelled), for exercising concurrency
/// limits and cancellation paths.
#[derive(Debug, Default)]
pub struct BlockingHandler {
    release: Arc<Notify>,
    started: Arc<Notify>,
    running: Arc<AtomicU32>,
    peak: Arc<AtomicU32>,
}

impl BlockingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let every currently blocked invocation finish.
    pub fn release_all(&self) {
        self.release.notify_waiters();
    }

    /// Resolves once at least one invocation is blocked inside the
    /// handler.
    pub async fn wait_for_start(&self) {
        self.started.notified().await;
    }

    /// Number of invocations currently blocked.
    pub fn running(&self) -> u32 {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of invocations that were ever blocked at once.
    pub fn peak_concurrency(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

impl JobHandler for BlockingHandler {
    fn execute(&self, _config: Value, ctx: JobContext) -> BoxFuture<'static, Result<Value>> {
        let release = Arc::clone(&self.release);
        let started = Arc::clone(&self.started);
        let running = Arc::clone(&self.running);
        let peak = Arc::clone(&self.peak);

        Box::pin(async move {
            let now_running = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now_running, Ordering::SeqCst);

            // Register interest before signalling start so a release
            // fired right after `wait_for_start` resolves is not missed.
            let released = release.notified();
            tokio::pin!(released);
            started.notify_waiters();

            let result = tokio::select! {
                _ = &mut released => Ok(json!({"ok": true})),
                _ = ctx.cancel.cancelled() => Err(GatedagError::JobCancelled(
                    "execution cancelled".into(),
                )),
            };
            running.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}
