//! Per-account cursor: last fully processed history position.

/// Monotonic cursor. `None` until the account is first observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    position: Option<u64>,
}

impl Cursor {
    pub fn at(position: u64) -> Self {
        Self {
            position: Some(position),
        }
    }

    pub fn get(&self) -> Option<u64> {
        self.position
    }

    /// Move forward to `to`. Never moves backwards; returns whether it moved.
    pub fn advance(&mut self, to: u64) -> bool {
        match self.position {
            Some(p) if p >= to => false,
            _ => {
                self.position = Some(to);
                true
            }
        }
    }

    /// Apply a watch baseline. Same monotonic rule as `advance`; returns the
    /// resulting position.
    pub fn rebase(&mut self, baseline: u64) -> u64 {
        self.advance(baseline);
        self.position.unwrap_or(baseline)
    }
}
