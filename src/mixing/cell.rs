//! Single-use completion cell
//!
//! One producer (the worker) and one consumer (the waiting handler). The cell
//! carries an explicit state tag; `complete` and `abandon` are both
//! compare-and-swap transitions out of `Pending`, so at most one of them ever
//! takes effect and the loser is a silent no-op.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

use super::types::VerifyOutcome;
use crate::error::VerifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellState {
    Pending = 0,
    Completed = 1,
    Abandoned = 2,
}

impl CellState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Completed,
            _ => Self::Abandoned,
        }
    }
}

/// Producer side of a request's result slot
#[derive(Debug)]
pub struct CompletionCell {
    state: AtomicU8,
    sender: Mutex<Option<oneshot::Sender<VerifyOutcome>>>,
}

impl CompletionCell {
    /// Create a cell and the waiter that reads it
    #[must_use]
    pub fn new() -> (Arc<Self>, CompletionWaiter) {
        let (tx, rx) = oneshot::channel();
        let cell = Arc::new(Self {
            state: AtomicU8::new(CellState::Pending as u8),
            sender: Mutex::new(Some(tx)),
        });
        (cell, CompletionWaiter { rx })
    }

    pub fn state(&self) -> CellState {
        CellState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, to: CellState) -> bool {
        self.state
            .compare_exchange(
                CellState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Write the outcome; returns `false` if the cell already left `Pending`
    pub fn complete(&self, outcome: VerifyOutcome) -> bool {
        if !self.transition(CellState::Completed) {
            return false;
        }
        if let Some(tx) = self.sender.lock().take() {
            // Waiter may be gone (client disconnected); the result is dropped
            let _ = tx.send(outcome);
        }
        true
    }

    /// Mark the cell abandoned; returns `false` if it already left `Pending`
    pub fn abandon(&self) -> bool {
        if !self.transition(CellState::Abandoned) {
            return false;
        }
        self.sender.lock().take();
        true
    }
}

/// Consumer side of a completion cell
#[derive(Debug)]
pub struct CompletionWaiter {
    rx: oneshot::Receiver<VerifyOutcome>,
}

impl CompletionWaiter {
    /// Wait up to `deadline` for the outcome; `None` means the deadline passed
    pub async fn wait(&mut self, deadline: Duration) -> Option<VerifyOutcome> {
        match tokio::time::timeout(deadline, &mut self.rx).await {
            Ok(received) => Some(received.unwrap_or_else(|_| Err(dropped()))),
            Err(_) => None,
        }
    }

    /// Read an outcome that has already been written
    ///
    /// Used after losing the timeout race: the winner wrote before releasing
    /// the pending table, so this resolves immediately.
    pub async fn recv(self) -> VerifyOutcome {
        self.rx.await.unwrap_or_else(|_| Err(dropped()))
    }
}

fn dropped() -> VerifyError {
    VerifyError::Processing("completion cell dropped without a result".to_string())
}
