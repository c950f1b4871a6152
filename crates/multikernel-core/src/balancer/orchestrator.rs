//! FIFO staging queue for raw task payloads.
//!
//! A [`TaskOrchestrator`] buffers opaque payloads before they are shaped
//! into descriptors and balanced; the policy names which strategy the
//! eventual dispatch should use.

use crate::balancer::BalancingStrategy;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Bounded-order FIFO of raw payloads plus the dispatch policy.
pub struct TaskOrchestrator {
    queue: Mutex<VecDeque<Vec<u8>>>,
    policy: Mutex<BalancingStrategy>,
}

impl Default for TaskOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskOrchestrator {
    /// Create an empty orchestrator with the hybrid adaptive policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            policy: Mutex::new(BalancingStrategy::HybridAdaptive),
        }
    }

    /// Append a payload.
    pub fn enqueue_task(&self, data: Vec<u8>) {
        self.queue.lock().unwrap().push_back(data);
    }

    /// Pop the oldest payload, if any.
    #[must_use]
    pub fn dequeue_task(&self) -> Option<Vec<u8>> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Payloads waiting in the queue.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Set the dispatch policy by external strategy name; unknown names map
    /// to `priority_adaptive`.
    pub fn set_orchestration_policy(&self, policy: &str) {
        let strategy = BalancingStrategy::from_name(policy);
        *self.policy.lock().unwrap() = strategy;
        debug!(policy = %strategy, "Orchestration policy set");
    }

    /// Current dispatch policy name.
    #[must_use]
    pub fn orchestration_policy(&self) -> &'static str {
        self.policy.lock().unwrap().as_str()
    }
}
