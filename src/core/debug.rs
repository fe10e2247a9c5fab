//! Cycle statistics

use std::collections::VecDeque;

use crate::assets::CycleReport;

/// Rolling statistics over recent [`CycleReport`]s
#[derive(Debug)]
pub struct CycleStats {
    /// Recent reports for averaging
    history: VecDeque<CycleReport>,
    /// Maximum samples to keep
    max_samples: usize,
    /// Total cycles recorded
    total_cycles: u64,
    /// Total elements evicted over all cycles
    total_evicted: u64,
    /// Highest live population seen
    peak_live: usize,
}

impl CycleStats {
    /// Create a tracker keeping the last 120 cycles
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(120)
    }

    /// Create a tracker keeping the last `max_samples` cycles
    #[must_use]
    pub fn with_window(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            history: VecDeque::with_capacity(max_samples),
            max_samples,
            total_cycles: 0,
            total_evicted: 0,
            peak_live: 0,
        }
    }

    /// Record the outcome of one cycle
    pub fn record(&mut self, report: CycleReport) {
        self.total_cycles += 1;
        self.total_evicted += report.evicted as u64;
        self.peak_live = self.peak_live.max(report.live);

        if self.history.len() >= self.max_samples {
            self.history.pop_front();
        }
        self.history.push_back(report);
    }

    /// The most recent report
    #[must_use]
    pub fn last(&self) -> Option<&CycleReport> {
        self.history.back()
    }

    /// Get total cycles recorded
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Get total elements evicted
    #[must_use]
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted
    }

    /// Get the highest live population seen
    #[must_use]
    pub fn peak_live(&self) -> usize {
        self.peak_live
    }

    /// Average number of materialized assets over the window
    #[must_use]
    pub fn avg_active(&self) -> f32 {
        self.average(|report| report.active)
    }

    /// Average evictions per cycle over the window
    #[must_use]
    pub fn avg_evicted(&self) -> f32 {
        self.average(|report| report.evicted)
    }

    fn average(&self, field: impl Fn(&CycleReport) -> usize) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        let total: usize = self.history.iter().map(field).sum();
        total as f32 / self.history.len() as f32
    }

    /// Get a formatted stats string
    #[must_use]
    pub fn format_stats(&self) -> String {
        let last = self.last().copied().unwrap_or_default();
        format!(
            "Cycle {} | Live: {} (peak {}) | Active: {} (avg {:.1}) | Evicted: {} (total {})",
            self.total_cycles,
            last.live,
            self.peak_live,
            last.active,
            self.avg_active(),
            last.evicted,
            self.total_evicted
        )
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}
