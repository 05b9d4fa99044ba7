use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use watch::WatchSender;

use crate::cpu_control::CpuControl;
use crate::governor::{CpuAction, GovernorState, Timing};
use crate::load_monitor::LoadSampler;
use crate::power;
use crate::status::GovernorStatus;
use crate::tunables::TunableStore;

/// Events that preempt the evaluator's schedule. Suspend and resume
/// carry an ack channel: the sender blocks until the worker has fully
/// processed the transition (cancel-and-join semantics).
pub enum WorkerEvent {
    Suspend(Sender<()>),
    Resume(Sender<()>),
    Shutdown,
}

/// Schedule of the recurring evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleState {
    Idle,
    Scheduled,
    Running,
    Cancelled,
}

/// The recurring evaluation loop, one instance per worker thread.
///
/// The schedule is the channel itself: a `recv_timeout` expiring is the
/// delayed work firing, a received message is an event preempting it.
/// That construction serializes evaluation, suspend and resume on one
/// thread; tunable writers stay unsynchronized and go through the store.
pub struct Evaluator {
    cpu: Box<dyn CpuControl>,
    sampler: Box<dyn LoadSampler>,
    state: Arc<Mutex<GovernorState>>,
    tunables: TunableStore,
    timing: Timing,
    events: Receiver<WorkerEvent>,
    status: WatchSender<GovernorStatus>,
    schedule: ScheduleState,
    last_load: u32,
}

impl Evaluator {
    pub fn new(
        cpu: Box<dyn CpuControl>,
        sampler: Box<dyn LoadSampler>,
        state: Arc<Mutex<GovernorState>>,
        tunables: TunableStore,
        timing: Timing,
        events: Receiver<WorkerEvent>,
        status: WatchSender<GovernorStatus>,
    ) -> Self {
        Self {
            cpu,
            sampler,
            state,
            tunables,
            timing,
            events,
            status,
            schedule: ScheduleState::Idle,
            last_load: 0,
        }
    }

    pub fn run(mut self) {
        self.schedule = ScheduleState::Scheduled;
        // None = cancelled, nothing pending until the next event.
        let mut delay = Some(self.timing.init_delay);
        loop {
            let event = match delay {
                Some(d) => match self.events.recv_timeout(d) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.events.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                },
            };

            match event {
                None => {
                    delay = Some(self.evaluate_once());
                }
                Some(WorkerEvent::Suspend(ack)) => {
                    self.schedule = ScheduleState::Cancelled;
                    delay = None;
                    self.suspend();
                    let _ = ack.send(());
                }
                Some(WorkerEvent::Resume(ack)) => {
                    self.resume();
                    let _ = ack.send(());
                    self.schedule = ScheduleState::Scheduled;
                    delay = Some(self.timing.resume_delay);
                    self.publish(true);
                }
                Some(WorkerEvent::Shutdown) => break,
            }
        }
        self.schedule = ScheduleState::Idle;
        self.publish(false);
    }

    /// One firing of the delayed work: resync, sample, decide, apply,
    /// resync again. Returns the delay until the next firing.
    fn evaluate_once(&mut self) -> Duration {
        self.schedule = ScheduleState::Running;
        let max_cpus = self.cpu.max_possible();
        let tunables = self.tunables.snapshot();

        {
            let mut state = self.state.lock();
            state.online_cpus = self.cpu.online_count().max(1);
        }

        let decision = match self.sampler.sample() {
            Ok(load) => {
                self.last_load = load;
                let mut state = self.state.lock();
                state.evaluate(load, Instant::now(), &tunables, max_cpus, &self.timing)
            }
            Err(e) => {
                // The next periodic evaluation is the only retry.
                log::warn!("load sample failed: {e}");
                crate::governor::Decision {
                    action: CpuAction::None,
                    next_poll: tunables.poll_period(self.timing.base_period),
                }
            }
        };

        match decision.action {
            CpuAction::None => {}
            CpuAction::BringOnline(index) => {
                match self.cpu.bring_online(index) {
                    Ok(()) => log::info!("high load - cpu{index} brought online"),
                    Err(e) => log::warn!("cpu{index} online failed: {e}"),
                }
                // Never trust the action outcome, re-read ground truth.
                let mut state = self.state.lock();
                state.record_action(Instant::now(), self.cpu.online_count());
            }
            CpuAction::TakeOffline(index) => {
                match self.cpu.take_offline(index) {
                    Ok(()) => log::info!("low load - cpu{index} taken offline"),
                    Err(e) => log::warn!("cpu{index} offline failed: {e}"),
                }
                let mut state = self.state.lock();
                state.record_action(Instant::now(), self.cpu.online_count());
            }
        }

        self.schedule = ScheduleState::Scheduled;
        self.publish(true);
        decision.next_poll
    }

    fn suspend(&mut self) {
        let mut state = self.state.lock();
        power::force_secondary_offline(self.cpu.as_ref(), &mut state);
        drop(state);
        self.publish(true);
    }

    fn resume(&mut self) {
        let mut state = self.state.lock();
        power::restore_all_online(self.cpu.as_ref(), &mut state);
    }

    fn publish(&self, running: bool) {
        let state = self.state.lock();
        self.status.send(GovernorStatus {
            running,
            schedule: self.schedule,
            online_cpus: state.online_cpus,
            last_load: self.last_load,
            low_load_streak: state.low_load_streak,
            high_load_streak: state.high_load_streak,
        });
    }
}
