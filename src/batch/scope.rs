use crate::batch::dispatcher::BatchDispatcher;
use crate::types::Outcome;
use crate::Result;
use std::ops::Deref;

/// A batch in progress. Dereferences to the dispatcher for enqueueing.
///
/// Dropping the scope blocks until every enqueued request has resolved;
/// callback failures seen on drop are only logged, use
/// [`BatchScope::finish`] to observe them.
pub struct BatchScope<'a> {
    dispatcher: &'a BatchDispatcher,
    finished: bool,
}

impl<'a> BatchScope<'a> {
    pub(crate) fn new(dispatcher: &'a BatchDispatcher) -> Self {
        Self {
            dispatcher,
            finished: false,
        }
    }

    /// Wait for the batch and return its outcomes in completion order.
    pub fn finish(mut self) -> Result<Vec<Outcome>> {
        self.finished = true;
        self.dispatcher.await_all()?;
        Ok(self.dispatcher.results())
    }
}

impl Deref for BatchScope<'_> {
    type Target = BatchDispatcher;

    fn deref(&self) -> &BatchDispatcher {
        self.dispatcher
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.dispatcher.await_all() {
            tracing::warn!(error = %e, "batch scope closed with callback failures");
        }
    }
}
