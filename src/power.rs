use std::time::Instant;

use crate::cpu_control::CpuControl;
use crate::governor::GovernorState;

/// Sleep/wake transitions delivered to the evaluator worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Suspend,
    Resume,
}

/// Force every non-primary core offline ahead of system suspend.
///
/// Runs on the evaluator worker after its schedule has been cancelled,
/// so no concurrent online action can fight the forced transition.
/// Idempotent: cores already offline are skipped.
pub fn force_secondary_offline(cpu: &dyn CpuControl, state: &mut GovernorState) {
    for index in 1..cpu.max_possible() {
        if !cpu.is_online(index) {
            continue;
        }
        if let Err(e) = cpu.take_offline(index) {
            log::warn!("suspend: cpu{index} offline failed: {e}");
        }
    }
    state.record_action(Instant::now(), cpu.online_count());
    log::info!("suspend: {} core(s) online", state.online_cpus);
}

/// Bring every core back online on resume. Idempotent.
pub fn restore_all_online(cpu: &dyn CpuControl, state: &mut GovernorState) {
    for index in 1..cpu.max_possible() {
        if cpu.is_online(index) {
            continue;
        }
        if let Err(e) = cpu.bring_online(index) {
            log::warn!("resume: cpu{index} online failed: {e}");
        }
    }
    state.record_action(Instant::now(), cpu.online_count());
    log::info!("resume: {} core(s) online", state.online_cpus);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_control::CpuControlError;
    use parking_lot::Mutex;

    struct FakeCpu {
        online: Mutex<Vec<bool>>,
    }

    impl FakeCpu {
        fn new(online: &[bool]) -> Self {
            Self {
                online: Mutex::new(online.to_vec()),
            }
        }
    }

    impl CpuControl for FakeCpu {
        fn online_count(&self) -> usize {
            self.online.lock().iter().filter(|&&o| o).count()
        }
        fn max_possible(&self) -> usize {
            self.online.lock().len()
        }
        fn is_online(&self, cpu: usize) -> bool {
            self.online.lock().get(cpu).copied().unwrap_or(false)
        }
        fn bring_online(&self, cpu: usize) -> Result<(), CpuControlError> {
            self.online.lock()[cpu] = true;
            Ok(())
        }
        fn take_offline(&self, cpu: usize) -> Result<(), CpuControlError> {
            if cpu == 0 {
                return Err(CpuControlError::BootCpu);
            }
            self.online.lock()[cpu] = false;
            Ok(())
        }
    }

    #[test]
    fn suspend_forces_secondaries_offline() {
        let cpu = FakeCpu::new(&[true, true]);
        let mut state = GovernorState::new(2);
        state.low_load_streak = 5;

        force_secondary_offline(&cpu, &mut state);
        assert!(!cpu.is_online(1));
        assert!(cpu.is_online(0));
        assert_eq!(state.online_cpus, 1);
        assert_eq!(state.low_load_streak, 0);
        assert!(state.last_action.is_some());
    }

    #[test]
    fn suspend_is_idempotent() {
        let cpu = FakeCpu::new(&[true, false]);
        let mut state = GovernorState::new(1);
        force_secondary_offline(&cpu, &mut state);
        force_secondary_offline(&cpu, &mut state);
        assert_eq!(state.online_cpus, 1);
    }

    #[test]
    fn resume_restores_every_core() {
        let cpu = FakeCpu::new(&[true, false]);
        let mut state = GovernorState::new(1);
        state.high_load_streak = 3;

        restore_all_online(&cpu, &mut state);
        assert!(cpu.is_online(1));
        assert_eq!(state.online_cpus, 2);
        assert_eq!(state.high_load_streak, 0);
    }
}
