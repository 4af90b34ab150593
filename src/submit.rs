//! Submission hand-off and completion signaling.
//!
//! Flushed primary buffers are queued in FIFO order, each paired with its
//! serial and a fence. When the embedding layer learns that the GPU passed
//! a serial, [`SubmitQueue::retire_up_to`] signals the fences and drops the
//! retired buffers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::PrimaryCommands;
use crate::serial::Serial;

/// Status of a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The submission has completed.
    Signaled,
    /// The submission is still pending.
    Unsignaled,
}

/// CPU-side fence signaled when a submission retires.
#[derive(Debug, Clone)]
pub struct Fence {
    signaled: Arc<AtomicBool>,
}

impl Fence {
    /// Create an unsignaled fence.
    pub fn new() -> Self {
        Self {
            signaled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the current status.
    pub fn status(&self) -> FenceStatus {
        if self.signaled.load(Ordering::Acquire) {
            FenceStatus::Signaled
        } else {
            FenceStatus::Unsignaled
        }
    }

    /// Whether the fence is signaled.
    pub fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }

    /// Signal the fence.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    /// Spin until the fence is signaled.
    pub fn wait(&self) {
        while !self.is_signaled() {
            std::hint::spin_loop();
        }
    }

    /// Spin until the fence is signaled or the timeout elapses.
    ///
    /// Returns `true` if the fence was signaled within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.is_signaled() {
            if start.elapsed() >= timeout {
                return false;
            }
            std::hint::spin_loop();
        }
        true
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary semaphore for ordering submissions against presentation.
#[derive(Debug, Clone)]
pub struct Semaphore {
    signaled: Arc<AtomicBool>,
}

impl Semaphore {
    /// Create an unsignaled semaphore.
    pub fn new() -> Self {
        Self {
            signaled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal the semaphore.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    /// Consume the signal if present.
    ///
    /// Returns `true` if the semaphore was signaled.
    pub fn take(&self) -> bool {
        self.signaled.swap(false, Ordering::AcqRel)
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

struct PendingSubmission {
    serial: Serial,
    #[allow(dead_code)]
    primary: PrimaryCommands,
    fence: Fence,
}

/// FIFO queue of flushed primary buffers awaiting GPU completion.
#[derive(Default)]
pub struct SubmitQueue {
    pending: VecDeque<PendingSubmission>,
    last_completed: Serial,
}

impl SubmitQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a flushed primary buffer under its serial.
    ///
    /// Returns a fence that signals when the submission retires.
    pub fn enqueue(&mut self, serial: Serial, primary: PrimaryCommands) -> Fence {
        debug_assert!(self
            .pending
            .back()
            .map_or(true, |submission| submission.serial < serial));
        let fence = Fence::new();
        log::trace!("Enqueued submission for serial {serial}");
        self.pending.push_back(PendingSubmission {
            serial,
            primary,
            fence: fence.clone(),
        });
        fence
    }

    /// Number of submissions not yet retired.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Serial of the newest retired submission.
    pub fn last_completed(&self) -> Serial {
        self.last_completed
    }

    /// Retire every submission up to and including `serial`.
    ///
    /// Signals the retired fences and drops their primary buffers.
    pub fn retire_up_to(&mut self, serial: Serial) {
        while let Some(submission) = self.pending.front() {
            if submission.serial > serial {
                break;
            }
            let submission = match self.pending.pop_front() {
                Some(submission) => submission,
                None => break,
            };
            log::trace!("Retired submission for serial {}", submission.serial);
            submission.fence.signal();
            self.last_completed = submission.serial;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CommandBackend, DummyBackend};

    fn flushed_primary() -> PrimaryCommands {
        let backend = DummyBackend::new();
        let mut primary = backend.begin_primary().unwrap();
        backend.end_primary(&mut primary).unwrap();
        primary
    }

    #[test]
    fn test_retire_signals_fences_in_order() {
        let mut queue = SubmitQueue::new();
        let first = Serial::zero().next();
        let second = first.next();

        let first_fence = queue.enqueue(first, flushed_primary());
        let second_fence = queue.enqueue(second, flushed_primary());
        assert_eq!(queue.pending_count(), 2);

        queue.retire_up_to(first);
        assert!(first_fence.is_signaled());
        assert!(!second_fence.is_signaled());
        assert_eq!(queue.pending_count(), 1);
        assert_eq!(queue.last_completed(), first);

        queue.retire_up_to(second);
        assert!(second_fence.is_signaled());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_fence_wait_timeout() {
        let fence = Fence::new();
        assert!(!fence.wait_timeout(Duration::from_millis(1)));

        fence.signal();
        assert!(fence.wait_timeout(Duration::from_millis(1)));
        fence.wait();
    }

    #[test]
    fn test_semaphore_take_consumes_signal() {
        let semaphore = Semaphore::new();
        assert!(!semaphore.take());

        semaphore.signal();
        assert!(semaphore.take());
        assert!(!semaphore.take());
    }
}
