//! Timer scheduling for the role state machines.
//!
//! A role never sends itself messages to wake up later. It asks its
//! [`Scheduler`] to deliver an event after a delay and keeps the returned
//! [`TimerHandle`]; the event arrives on the role's own channel and is handled
//! to completion like any other input.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("timer '{0}' already has a pending expiry")]
    AlreadyArmed(&'static str),

    #[error("scheduler is shut down")]
    ShutDown,
}

/// Delivers events of type `E` into a channel after a delay.
///
/// Cancelling the scheduler's root token (or dropping the receiver) silently
/// discards every pending expiry.
#[derive(Clone)]
pub struct Scheduler<E> {
    events: mpsc::UnboundedSender<E>,
    root: CancellationToken,
}

impl<E: Send + 'static> Scheduler<E> {
    /// Create a scheduler and the receiver its events arrive on.
    pub fn new(root: CancellationToken) -> (Self, mpsc::UnboundedReceiver<E>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events, root }, rx)
    }

    /// Deliver `event` once `delay` has elapsed unless the handle is cancelled
    /// first.
    pub fn schedule_after(&self, delay: Duration, event: E) -> Result<TimerHandle, SchedulerError> {
        if self.root.is_cancelled() || self.events.is_closed() {
            return Err(SchedulerError::ShutDown);
        }

        let token = self.root.child_token();
        let events = self.events.clone();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(event);
                }
            }
        });

        Ok(TimerHandle { token, task })
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

/// Handle to one pending expiry. Dropping it cancels the expiry.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the expiry was delivered or cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Holds at most one outstanding handle for a single logical timer.
///
/// The owning role calls [`fired`](TimerSlot::fired) when the timer's event is
/// handled, which frees the slot for the next [`arm`](TimerSlot::arm).
#[derive(Debug)]
pub struct TimerSlot {
    name: &'static str,
    handle: Option<TimerHandle>,
}

impl TimerSlot {
    pub fn new(name: &'static str) -> Self {
        Self { name, handle: None }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Schedule `event` after `delay` into this slot.
    pub fn arm<E: Send + 'static>(
        &mut self,
        scheduler: &Scheduler<E>,
        delay: Duration,
        event: E,
    ) -> Result<(), SchedulerError> {
        if self.handle.is_some() {
            return Err(SchedulerError::AlreadyArmed(self.name));
        }
        self.handle = Some(scheduler.schedule_after(delay, event)?);
        Ok(())
    }

    /// Mark the pending expiry as delivered.
    pub fn fired(&mut self) {
        self.handle = None;
    }

    /// Cancel the pending expiry, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}
