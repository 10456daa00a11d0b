use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Orchestrator-wide interrupt state; it only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CancellationState {
    Running,
    SoftInterruptRequested,
    HardTerminated,
}

impl CancellationState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => CancellationState::Running,
            1 => CancellationState::SoftInterruptRequested,
            _ => CancellationState::HardTerminated,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CancellationState::Running => "running",
            CancellationState::SoftInterruptRequested => "soft_interrupt_requested",
            CancellationState::HardTerminated => "hard_terminated",
        }
    }
}

#[derive(Debug, Default)]
struct TokenInner {
    state: AtomicU8,
    observed: AtomicU8,
}

/// Cloneable handle shared between the run loop and the signal path.
///
/// `interrupt` only touches atomics, so it may be called from a signal
/// handler. The run loop polls `state` / `observe` at its safe points.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CancellationState {
        CancellationState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// True once any interrupt has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.state() != CancellationState::Running
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == CancellationState::HardTerminated
    }

    /// Escalates one stage and returns the state before the escalation.
    pub fn interrupt(&self) -> CancellationState {
        let prev = self
            .inner
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
                Some(raw.saturating_add(1).min(2))
            })
            .unwrap_or_else(|raw| raw);
        CancellationState::from_u8(prev)
    }

    /// Returns the current state if the caller has not seen it yet.
    pub fn observe(&self) -> Option<CancellationState> {
        let current = self.inner.state.load(Ordering::SeqCst);
        let seen = self.inner.observed.swap(current, Ordering::SeqCst);
        if seen == current {
            None
        } else {
            Some(CancellationState::from_u8(current))
        }
    }
}
