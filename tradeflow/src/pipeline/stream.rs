//! Pull-based run execution.

use super::driver::RunDriver;
use crate::errors::{EngineInvariantViolation, TradeflowError};
use crate::events::{RunEvent, RunEventKind};
use crate::state::{RunState, StateHandle};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A lazy, finite sequence of run events.
///
/// Each poll performs exactly one transition of the run, so nothing is
/// computed ahead of the consumer. Dropping the stream cancels in-flight
/// capability calls; whatever was already written stays readable through
/// [`state`](Self::state). A stream cannot be restarted.
pub struct RunStream {
    handle: StateHandle,
    events: BoxStream<'static, RunEvent>,
}

impl std::fmt::Debug for RunStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStream")
            .field("step", &self.handle.step())
            .field("sealed", &self.handle.is_sealed())
            .finish_non_exhaustive()
    }
}

impl RunStream {
    pub(crate) fn new(driver: RunDriver) -> Self {
        let handle = driver.handle().clone();
        let events = stream::unfold(driver, |mut driver| async move {
            let event = driver.next_event().await?;
            Some((event, driver))
        })
        .fuse()
        .boxed();
        Self { handle, events }
    }

    /// Returns the handle to the state this stream is driving.
    #[must_use]
    pub fn state(&self) -> &StateHandle {
        &self.handle
    }

    /// Returns a deep copy of the state as of the last event.
    #[must_use]
    pub fn snapshot(&self) -> RunState {
        self.handle.snapshot()
    }

    /// Drives the remaining events and returns the final state.
    ///
    /// A run that failed on an engine invariant violation returns
    /// [`TradeflowError::Aborted`] carrying the unsealed state.
    pub async fn finish(mut self) -> Result<RunState, TradeflowError> {
        let mut failure = None;
        while let Some(event) = self.events.next().await {
            if let RunEventKind::RunFailed { reason } = event.kind {
                failure = Some(reason);
            }
        }

        let state = self.handle.snapshot();
        match failure {
            Some(reason) => Err(TradeflowError::Aborted {
                source: EngineInvariantViolation::new(reason),
                state: Box::new(state),
            }),
            None => Ok(state),
        }
    }
}

impl Stream for RunStream {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}
