//! Per-window tick counter

/// Ticks accepted in the current telemetry window
#[derive(Debug, Default, Clone)]
pub struct TickCounter {
    count: u64,
}

impl TickCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self) {
        self.count += 1;
    }

    /// Current window's count, without closing the window
    pub fn current(&self) -> u64 {
        self.count
    }

    /// Close the window: return its count and start again from zero
    pub fn take(&mut self) -> u64 {
        std::mem::take(&mut self.count)
    }
}
