//! Boundary search over block heights.
//!
//! Heights at or above the boundary are available, heights below it are not. The search walks
//! back from the head with doubling steps until it finds an unavailable height, then bisects the
//! last gap.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Expanding { step: u64, available: u64 },
    Narrowing { unavailable: u64, available: u64 },
    Done(u64),
}

/// Resumable state of one boundary search.
///
/// ```
/// use relay_core::upstream::lower_bound::LowerBoundSearch;
///
/// let boundary = 700;
/// let mut search = LowerBoundSearch::new(1_000);
/// while let Some(height) = search.next_probe() {
///     search.record(height, height >= boundary);
/// }
/// assert_eq!(search.result(), Some(boundary));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerBoundSearch {
    head: u64,
    phase: Phase,
}

impl LowerBoundSearch {
    /// Starts a search below `head`, which is assumed to be available.
    #[must_use]
    pub fn new(head: u64) -> Self {
        let phase = if head == 0 {
            Phase::Done(0)
        } else {
            Phase::Expanding { step: 1, available: head }
        };
        Self { head, phase }
    }

    #[must_use]
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Lowest height known to be available so far.
    #[must_use]
    pub fn available(&self) -> u64 {
        match self.phase {
            Phase::Expanding { available, .. } | Phase::Narrowing { available, .. } => available,
            Phase::Done(bound) => bound,
        }
    }

    /// Next height to probe, `None` once the boundary is known.
    #[must_use]
    pub fn next_probe(&self) -> Option<u64> {
        match self.phase {
            Phase::Expanding { step, .. } => Some(self.head.saturating_sub(step)),
            Phase::Narrowing { unavailable, available } => {
                Some(unavailable + (available - unavailable) / 2)
            }
            Phase::Done(_) => None,
        }
    }

    /// Records whether `height` is available.
    ///
    /// `height` is normally the one returned by [`next_probe`](Self::next_probe). An available
    /// height between that probe and [`available`](Self::available) is accepted too.
    pub fn record(&mut self, height: u64, is_available: bool) {
        self.phase = match (self.phase, is_available) {
            (Phase::Expanding { .. }, true) if height == 0 => Phase::Done(0),
            (Phase::Expanding { step, .. }, true) => {
                Phase::Expanding { step: step.saturating_mul(2), available: height }
            }
            (Phase::Expanding { available, .. }, false) => Self::narrow(height, available),
            (Phase::Narrowing { unavailable, .. }, true) => Self::narrow(unavailable, height),
            (Phase::Narrowing { available, .. }, false) => Self::narrow(height, available),
            (done @ Phase::Done(_), _) => done,
        };
    }

    fn narrow(unavailable: u64, available: u64) -> Phase {
        if available.saturating_sub(unavailable) <= 1 {
            Phase::Done(available)
        } else {
            Phase::Narrowing { unavailable, available }
        }
    }

    /// Lowest available height, once found.
    #[must_use]
    pub fn result(&self) -> Option<u64> {
        match self.phase {
            Phase::Done(bound) => Some(bound),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done(_))
    }
}
