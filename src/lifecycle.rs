use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Sender, bounded, unbounded};
use parking_lot::Mutex;
use thiserror::Error;
use watch::WatchReceiver;

use crate::cpu_control::CpuControl;
use crate::evaluator::{Evaluator, WorkerEvent};
use crate::governor::{GovernorState, Timing, Tunables};
use crate::load_monitor::LoadSampler;
use crate::power::PowerEvent;
use crate::status::GovernorStatus;
use crate::tunables::TunableStore;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("out of resources spawning the governor worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Owning handle of the governor subsystem.
///
/// `start` spawns the evaluator worker; dropping the handle (or calling
/// `shutdown`) stops the schedule and joins the worker. Suspend/resume
/// notifications block until the worker has processed them, so the core
/// can be powered down right after `notify_suspend` returns.
pub struct HotplugGovernor {
    events: Sender<WorkerEvent>,
    worker: Option<JoinHandle<()>>,
    tunables: TunableStore,
    state: Arc<Mutex<GovernorState>>,
}

impl HotplugGovernor {
    pub fn start(
        cpu: Box<dyn CpuControl>,
        sampler: Box<dyn LoadSampler>,
        timing: Timing,
        defaults: Tunables,
    ) -> Result<(Self, WatchReceiver<GovernorStatus>), StartError> {
        let tunables = TunableStore::new(defaults);
        let online = cpu.online_count().max(1);
        let state = Arc::new(Mutex::new(GovernorState::new(online)));

        let (event_tx, event_rx) = unbounded();
        let (status_tx, status_rx) = watch::channel(GovernorStatus::idle(online));

        let evaluator = Evaluator::new(
            cpu,
            sampler,
            state.clone(),
            tunables.clone(),
            timing,
            event_rx,
            status_tx,
        );
        let worker = thread::Builder::new()
            .name("hotplug-governor".into())
            .spawn(move || evaluator.run())
            .map_err(StartError::Spawn)?;

        let governor = Self {
            events: event_tx,
            worker: Some(worker),
            tunables,
            state,
        };
        Ok((governor, status_rx))
    }

    pub fn tunables(&self) -> &TunableStore {
        &self.tunables
    }

    pub fn state_snapshot(&self) -> GovernorState {
        self.state.lock().clone()
    }

    pub fn notify_suspend(&self) {
        self.notify_power(PowerEvent::Suspend);
    }

    pub fn notify_resume(&self) {
        self.notify_power(PowerEvent::Resume);
    }

    /// Deliver a power transition and wait for the worker's ack. Any
    /// in-flight evaluation finishes first since the worker handles one
    /// message at a time.
    fn notify_power(&self, event: PowerEvent) {
        let (ack_tx, ack_rx) = bounded(1);
        let event = match event {
            PowerEvent::Suspend => WorkerEvent::Suspend(ack_tx),
            PowerEvent::Resume => WorkerEvent::Resume(ack_tx),
        };
        if self.events.send(event).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.events.send(WorkerEvent::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for HotplugGovernor {
    fn drop(&mut self) {
        self.stop();
    }
}
