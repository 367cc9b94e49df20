//! Scripted transfer primitive for tests
//!
//! Replays a queue of outcomes, one per attempt, then falls back to a fixed
//! outcome. Successful attempts emit a canned server response and synthetic
//! progress in quarter steps of the file size.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::primitive::{PrimitiveError, TransferHooks, TransferPrimitive, TransferRequest};

/// Outcome of one scripted attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubOutcome {
    Succeed,
    Fail(String),
    InitFail(String),
}

#[derive(Debug, Clone)]
pub struct StubTransfer {
    script: Arc<Mutex<VecDeque<StubOutcome>>>,
    fallback: StubOutcome,
    response: Vec<u8>,
    calls: Arc<Mutex<Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StubTransfer {
    /// Every attempt succeeds
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new(), StubOutcome::Succeed)
    }

    /// Every attempt fails with `detail`
    pub fn failing(detail: impl Into<String>) -> Self {
        Self::scripted(Vec::new(), StubOutcome::Fail(detail.into()))
    }

    /// Play `outcomes` in order, then repeat `fallback`
    pub fn scripted(outcomes: Vec<StubOutcome>, fallback: StubOutcome) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into())),
            fallback,
            response: b"226 Transfer complete\r\n".to_vec(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Server text emitted on success
    pub fn with_response(mut self, response: impl Into<Vec<u8>>) -> Self {
        self.response = response.into();
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// URLs of every attempt, in order
    pub fn urls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn next_outcome(&self) -> StubOutcome {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl TransferPrimitive for StubTransfer {
    fn transfer(
        &self,
        request: &TransferRequest,
        hooks: &mut TransferHooks<'_>,
    ) -> Result<(), PrimitiveError> {
        lock(&self.calls).push(request.url.clone());

        match self.next_outcome() {
            StubOutcome::Succeed => {
                let total = request.file_size;
                for quarter in 1..=4 {
                    (hooks.progress)(total * quarter / 4, total);
                }
                // Deliver in two chunks so line splitting is exercised
                let (head, tail) = self.response.split_at(self.response.len() / 2);
                (hooks.response)(head);
                (hooks.response)(tail);
                Ok(())
            }
            StubOutcome::Fail(detail) => Err(PrimitiveError::Transfer { detail }),
            StubOutcome::InitFail(detail) => Err(PrimitiveError::Init { detail }),
        }
    }
}
