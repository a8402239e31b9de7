//! The handle step handlers use to reach per-attempt state.

use std::{future::Future, sync::Arc};

use futures_util::{FutureExt, future::BoxFuture};
use stepwise_types::{Context, Store, World};
use tracing::{debug, info, warn};

use crate::{interpolate::InterpolationScope, reporter::Reporter};

type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Per-attempt view handed to step handlers.
///
/// Owns the attempt's store and cleanup stack; both are discarded when the
/// attempt ends.
pub struct RunnerHandle<'run> {
    store: Store,
    world: &'run World,
    context: &'run Context,
    reporters: &'run [Arc<dyn Reporter>],
    cleanups: Vec<CleanupFn>,
    reporter_error: Option<anyhow::Error>,
}

impl<'run> RunnerHandle<'run> {
    pub(crate) fn new(store: Store, world: &'run World, context: &'run Context, reporters: &'run [Arc<dyn Reporter>]) -> Self {
        Self {
            store,
            world,
            context,
            reporters,
            cleanups: Vec::new(),
            reporter_error: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn world(&self) -> &World {
        self.world
    }

    /// Context row of the feature instance being executed.
    pub fn context(&self) -> &Context {
        self.context
    }

    pub fn scope(&self) -> InterpolationScope<'_> {
        InterpolationScope::new(self.context, &self.store, self.world)
    }

    /// Forwards a progress event to every reporter.
    ///
    /// A reporter failure is kept and turned into a run error once the attempt
    /// finishes; it does not fail the step that emitted the event.
    pub fn progress(&mut self, label: &str, detail: impl AsRef<str>) {
        let detail = detail.as_ref();
        info!(label = %label, detail = %detail, "progress");
        if self.reporter_error.is_some() {
            return;
        }
        for reporter in self.reporters {
            if let Err(error) = reporter.progress(label, detail) {
                warn!(label = %label, error = %error, "reporter failed on progress event");
                self.reporter_error = Some(error);
                break;
            }
        }
    }

    /// Pushes a teardown callback. Callbacks run in reverse order of
    /// registration once the attempt ends, whether it passed or not.
    pub fn cleanup<F, Fut>(&mut self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.cleanups.push(Box::new(move || callback().boxed()));
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }

    /// Runs every registered cleanup, newest first, and returns the first error.
    pub(crate) async fn run_cleanups(&mut self) -> Option<anyhow::Error> {
        let mut first_error = None;
        while let Some(cleanup) = self.cleanups.pop() {
            if let Err(error) = cleanup().await {
                warn!(error = %error, "cleanup callback failed");
                first_error.get_or_insert(error);
            }
        }
        debug!(failed = first_error.is_some(), "cleanups finished");
        first_error
    }

    pub(crate) fn take_reporter_error(&mut self) -> Option<anyhow::Error> {
        self.reporter_error.take()
    }
}
