//! Fail-soft outcome marker.

/// Result of a cache operation that never fails from the caller's view.
///
/// `Degraded` means the underlying store failed and the operation was
/// dropped after logging. Callers may ignore it; it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BestEffort<T = ()> {
    /// The operation reached the store; carries its result
    Done(T),
    /// The store failed and the operation was skipped
    Degraded,
}

impl<T> BestEffort<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, BestEffort::Done(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BestEffort::Degraded)
    }

    /// The carried value, or `None` when degraded.
    pub fn done(self) -> Option<T> {
        match self {
            BestEffort::Done(value) => Some(value),
            BestEffort::Degraded => None,
        }
    }
}
