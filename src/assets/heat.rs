//! Heat tracking
//!
//! Heat is a decaying usage counter. Every cycle, an asset that was used since
//! the previous cycle gains `heat_increment` (up to `max_heat`), and an unused
//! one loses 1 (down to 0). Assets at heat 0 are cold and may be evicted.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::core::CacheConfig;

/// Compute the heat after one cycle.
#[must_use]
pub fn next_heat(heat: u32, used: bool, config: &CacheConfig) -> u32 {
    if used {
        heat.saturating_add(config.heat_increment).min(config.max_heat)
    } else {
        heat.saturating_sub(1)
    }
}

/// Per-asset heat state.
///
/// `mark_used` may be called from any thread. `update` is crate-private and
/// only called by the registry cycle, which is serialized.
#[derive(Debug, Default)]
pub(crate) struct Heat {
    value: AtomicU32,
    used: AtomicBool,
}

impl Heat {
    pub(crate) fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }

    /// Whether the asset was used since the last `update`
    pub(crate) fn was_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }

    pub(crate) fn value(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    /// Age by one cycle and clear the used flag. Returns the new heat.
    pub(crate) fn update(&self, config: &CacheConfig) -> u32 {
        let used = self.used.swap(false, Ordering::AcqRel);
        let heat = next_heat(self.value(), used, config);
        self.value.store(heat, Ordering::Release);
        heat
    }
}
