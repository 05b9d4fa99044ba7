use std::sync::Arc;

use parking_lot::Mutex;

use crate::governor::Tunables;

/// Attribute names exposed to user space, one per tunable.
pub const TUNABLE_NAMES: [&str; 5] = [
    "load_threshold",
    "counter_threshold",
    "work_delay",
    "high_load_threshold",
    "up_timer_threshold",
];

/// Shared tunable store, written from arbitrary user-facing threads and
/// read by the evaluator. The evaluator takes one snapshot per decision,
/// so a write landing mid-decision is visible on the next cycle.
#[derive(Clone)]
pub struct TunableStore {
    inner: Arc<Mutex<Tunables>>,
}

impl TunableStore {
    pub fn new(defaults: Tunables) -> Self {
        Self {
            inner: Arc::new(Mutex::new(defaults)),
        }
    }

    pub fn snapshot(&self) -> Tunables {
        *self.inner.lock()
    }

    /// Current value of a tunable as decimal text, `None` for unknown names.
    pub fn show(&self, name: &str) -> Option<String> {
        let t = self.inner.lock();
        let value = match name {
            "load_threshold" => t.load_threshold,
            "counter_threshold" => t.counter_threshold,
            "work_delay" => t.work_delay,
            "high_load_threshold" => t.high_load_threshold,
            "up_timer_threshold" => t.up_timer_threshold,
            _ => return None,
        };
        Some(value.to_string())
    }

    /// Write a tunable from decimal text.
    ///
    /// A value is accepted only if it parses, lies in 0..=100 and differs
    /// from the current value. Anything else leaves the tunable unchanged
    /// and reports nothing to the writer. This silent-clamp policy is
    /// deliberate: callers get no feedback either way.
    pub fn store(&self, name: &str, text: &str) {
        let Ok(value) = text.trim().parse::<u32>() else {
            return;
        };
        if value > 100 {
            return;
        }
        let mut t = self.inner.lock();
        let slot = match name {
            "load_threshold" => &mut t.load_threshold,
            "counter_threshold" => &mut t.counter_threshold,
            "work_delay" => &mut t.work_delay,
            "high_load_threshold" => &mut t.high_load_threshold,
            "up_timer_threshold" => &mut t.up_timer_threshold,
            _ => return,
        };
        if value != *slot {
            *slot = value;
        }
    }
}
