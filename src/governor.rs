use std::time::{Duration, Instant};

use crate::constants::*;

/// Runtime-adjustable parameters of the hotplug policy.
///
/// All values are plain integers so they can round-trip through the
/// decimal-text attribute files. Percentages are 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    /// Load percentage above which an online action is requested.
    pub load_threshold: u32,
    /// Load percentage that brings a core online immediately,
    /// bypassing the streak counters.
    pub high_load_threshold: u32,
    /// Consecutive low-load cycles required before a core goes offline.
    pub counter_threshold: u32,
    /// Consecutive high-load cycles required before a core comes online.
    pub up_timer_threshold: u32,
    /// Evaluation period multiplier applied to the base period.
    pub work_delay: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            load_threshold: DEFAULT_LOAD_THRESHOLD,
            high_load_threshold: DEFAULT_HIGH_LOAD_THRESHOLD,
            counter_threshold: DEFAULT_COUNTER_THRESHOLD,
            up_timer_threshold: DEFAULT_UP_TIMER_THRESHOLD,
            work_delay: DEFAULT_WORK_DELAY,
        }
    }
}

impl Tunables {
    /// Effective evaluation period: base period scaled by `work_delay`.
    pub fn poll_period(&self, base_period: Duration) -> Duration {
        base_period * self.work_delay.max(1)
    }
}

/// Fixed timing parameters of the evaluator, set once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub base_period: Duration,
    /// Warm-up delay before the first evaluation, deliberately longer
    /// than the steady-state period.
    pub init_delay: Duration,
    pub resume_delay: Duration,
    /// Minimum dwell between two hotplug actions with one core online.
    /// The effective dwell is divided by the online count.
    pub min_action_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            base_period: Duration::from_millis(DEFAULT_BASE_PERIOD_MS),
            init_delay: Duration::from_millis(DEFAULT_INIT_DELAY_MS),
            resume_delay: Duration::from_millis(DEFAULT_RESUME_DELAY_MS),
            min_action_interval: Duration::from_micros(DEFAULT_MIN_ACTION_INTERVAL_US),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuAction {
    BringOnline(usize),
    TakeOffline(usize),
    None,
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub action: CpuAction,
    pub next_poll: Duration,
}

/// Mutable state of the control loop.
///
/// `online_cpus` is a cache of the actual online count, never a source
/// of truth: the evaluator resynchronizes it on entry and right after
/// every hotplug action.
#[derive(Debug, Clone)]
pub struct GovernorState {
    pub online_cpus: usize,
    pub last_action: Option<Instant>,
    pub low_load_streak: u32,
    pub high_load_streak: u32,
}

impl GovernorState {
    pub fn new(online_cpus: usize) -> Self {
        Self {
            online_cpus: online_cpus.max(1),
            last_action: None,
            low_load_streak: 0,
            high_load_streak: 0,
        }
    }

    pub fn reset_streaks(&mut self) {
        self.low_load_streak = 0;
        self.high_load_streak = 0;
    }

    /// Bookkeeping after a hotplug transition: resync the online count
    /// from ground truth, stamp the action time, zero both streaks.
    pub fn record_action(&mut self, now: Instant, online_cpus: usize) {
        self.online_cpus = online_cpus.max(1);
        self.last_action = Some(now);
        self.reset_streaks();
    }

    /// One evaluation cycle of the hotplug policy.
    ///
    /// The caller is expected to have refreshed `online_cpus` from the
    /// actual online count beforehand, and to call `record_action`
    /// after applying a returned action.
    pub fn evaluate(
        &mut self,
        load: u32,
        now: Instant,
        tunables: &Tunables,
        max_cpus: usize,
        timing: &Timing,
    ) -> Decision {
        let next_poll = tunables.poll_period(timing.base_period);

        // With fewer cores online the load signal is noisier, so the
        // required dwell shrinks as cores come online.
        let min_dwell = timing.min_action_interval / self.online_cpus.max(1) as u32;
        if let Some(last) = self.last_action {
            if now.duration_since(last) < min_dwell {
                return Decision {
                    action: CpuAction::None,
                    next_poll,
                };
            }
        }

        if load >= tunables.high_load_threshold && self.online_cpus < max_cpus {
            // Emergency path: act now, streak counters do not apply.
            self.reset_streaks();
            return Decision {
                action: CpuAction::BringOnline(self.online_cpus),
                next_poll,
            };
        }

        if load >= tunables.load_threshold {
            self.low_load_streak = 0;
            self.high_load_streak += 1;
            if self.high_load_streak >= tunables.up_timer_threshold && self.online_cpus < max_cpus {
                self.reset_streaks();
                return Decision {
                    action: CpuAction::BringOnline(self.online_cpus),
                    next_poll,
                };
            }
        } else {
            self.high_load_streak = 0;
            self.low_load_streak += 1;
            // cpu0 stays online no matter what.
            if self.low_load_streak >= tunables.counter_threshold && self.online_cpus > 1 {
                self.reset_streaks();
                return Decision {
                    action: CpuAction::TakeOffline(self.online_cpus - 1),
                    next_poll,
                };
            }
        }

        Decision {
            action: CpuAction::None,
            next_poll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing_no_dwell() -> Timing {
        Timing {
            min_action_interval: Duration::ZERO,
            ..Timing::default()
        }
    }

    #[test]
    fn offline_fires_exactly_on_tenth_cycle() {
        let tunables = Tunables {
            load_threshold: 50,
            counter_threshold: 10,
            ..Tunables::default()
        };
        let timing = timing_no_dwell();
        let mut state = GovernorState::new(2);

        for cycle in 1..=9 {
            let d = state.evaluate(30, Instant::now(), &tunables, 2, &timing);
            assert_eq!(d.action, CpuAction::None, "acted early on cycle {cycle}");
            assert_eq!(state.low_load_streak, cycle);
        }
        let d = state.evaluate(30, Instant::now(), &tunables, 2, &timing);
        assert_eq!(d.action, CpuAction::TakeOffline(1));
        assert_eq!(state.low_load_streak, 0);
        assert_eq!(state.high_load_streak, 0);
    }

    #[test]
    fn high_load_bypasses_streak_counters() {
        let tunables = Tunables {
            high_load_threshold: 95,
            up_timer_threshold: 50,
            ..Tunables::default()
        };
        let timing = timing_no_dwell();
        let mut state = GovernorState::new(1);

        let d = state.evaluate(99, Instant::now(), &tunables, 2, &timing);
        assert_eq!(d.action, CpuAction::BringOnline(1));
    }

    #[test]
    fn online_waits_for_up_timer_threshold() {
        let tunables = Tunables {
            load_threshold: 50,
            high_load_threshold: 100,
            up_timer_threshold: 3,
            ..Tunables::default()
        };
        let timing = timing_no_dwell();
        let mut state = GovernorState::new(1);

        for _ in 0..2 {
            let d = state.evaluate(70, Instant::now(), &tunables, 2, &timing);
            assert_eq!(d.action, CpuAction::None);
        }
        let d = state.evaluate(70, Instant::now(), &tunables, 2, &timing);
        assert_eq!(d.action, CpuAction::BringOnline(1));
    }

    #[test]
    fn dwell_interval_blocks_actions() {
        let tunables = Tunables::default();
        let timing = Timing {
            min_action_interval: Duration::from_secs(2),
            ..Timing::default()
        };
        let now = Instant::now();
        let mut state = GovernorState::new(1);
        state.last_action = Some(now);

        let d = state.evaluate(99, now + Duration::from_millis(100), &tunables, 2, &timing);
        assert_eq!(d.action, CpuAction::None);
        // Streaks are untouched while dwelling.
        assert_eq!(state.high_load_streak, 0);
    }

    #[test]
    fn dwell_interval_shrinks_with_more_cores_online() {
        let tunables = Tunables {
            counter_threshold: 1,
            ..Tunables::default()
        };
        let timing = Timing {
            min_action_interval: Duration::from_secs(2),
            ..Timing::default()
        };
        let now = Instant::now();

        // Two cores online: effective dwell is one second.
        let mut state = GovernorState::new(2);
        state.last_action = Some(now);
        let d = state.evaluate(10, now + Duration::from_millis(1500), &tunables, 2, &timing);
        assert_eq!(d.action, CpuAction::TakeOffline(1));

        // One core online: the same elapsed time is still dwelling.
        let mut state = GovernorState::new(1);
        state.last_action = Some(now);
        let d = state.evaluate(99, now + Duration::from_millis(1500), &tunables, 2, &timing);
        assert_eq!(d.action, CpuAction::None);
    }

    #[test]
    fn never_offlines_the_boot_cpu() {
        let tunables = Tunables {
            counter_threshold: 1,
            ..Tunables::default()
        };
        let timing = timing_no_dwell();
        let mut state = GovernorState::new(1);

        for _ in 0..20 {
            let d = state.evaluate(0, Instant::now(), &tunables, 2, &timing);
            assert_eq!(d.action, CpuAction::None);
        }
    }

    #[test]
    fn never_exceeds_max_cpus() {
        let tunables = Tunables::default();
        let timing = timing_no_dwell();
        let mut state = GovernorState::new(2);

        for _ in 0..20 {
            let d = state.evaluate(99, Instant::now(), &tunables, 2, &timing);
            assert_eq!(d.action, CpuAction::None);
        }
    }

    #[test]
    fn opposite_side_observation_resets_streak() {
        let tunables = Tunables {
            load_threshold: 50,
            high_load_threshold: 100,
            counter_threshold: 3,
            up_timer_threshold: 100,
            ..Tunables::default()
        };
        let timing = timing_no_dwell();
        let mut state = GovernorState::new(2);

        state.evaluate(10, Instant::now(), &tunables, 2, &timing);
        state.evaluate(10, Instant::now(), &tunables, 2, &timing);
        assert_eq!(state.low_load_streak, 2);
        state.evaluate(70, Instant::now(), &tunables, 2, &timing);
        assert_eq!(state.low_load_streak, 0);
        assert_eq!(state.high_load_streak, 1);
    }

    #[test]
    fn next_poll_scales_with_work_delay() {
        let timing = timing_no_dwell();
        let mut state = GovernorState::new(1);

        let tunables = Tunables {
            work_delay: 5,
            ..Tunables::default()
        };
        let d = state.evaluate(0, Instant::now(), &tunables, 2, &timing);
        assert_eq!(d.next_poll, timing.base_period * 5);

        // work_delay of zero is clamped, the schedule never stalls.
        let tunables = Tunables {
            work_delay: 0,
            ..Tunables::default()
        };
        let d = state.evaluate(0, Instant::now(), &tunables, 2, &timing);
        assert_eq!(d.next_poll, timing.base_period);
    }

    #[test]
    fn record_action_resyncs_and_zeroes() {
        let mut state = GovernorState::new(1);
        state.low_load_streak = 7;
        state.high_load_streak = 3;

        let now = Instant::now();
        state.record_action(now, 2);
        assert_eq!(state.online_cpus, 2);
        assert_eq!(state.last_action, Some(now));
        assert_eq!(state.low_load_streak, 0);
        assert_eq!(state.high_load_streak, 0);

        // A zero ground-truth count is impossible, clamp to the boot cpu.
        state.record_action(now, 0);
        assert_eq!(state.online_cpus, 1);
    }
}
