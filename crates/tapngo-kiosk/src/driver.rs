//! Main loop: peripherals, mailbox and state machine on a fixed tick.
//!
//! The driver owns everything the tick loop touches. Each cycle it polls the
//! peripherals, takes the mailbox, advances the [`KioskMachine`], applies the
//! returned [`SideEffects`] and then lets the [`ClassificationChannel`]
//! schedule a reconnect if one is due. Nothing in a cycle blocks.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use tapngo_core::Timestamp;
use tapngo_core::constants::DEFAULT_TICK_INTERVAL_MS;
use tapngo_hardware::{CameraTrigger, PeripheralManager};
use tapngo_network::{
    ClassificationChannel, MonotonicClock, NetworkLink, PubSubConnector, bring_up_with_timeout,
};

use crate::state_machine::{KioskMachine, KioskState, SideEffects};

/// Counters kept by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub ticks: u64,
    pub transitions: u64,
    pub labels_taken: u64,
    pub camera_commands: u64,
    pub faults: u64,
    pub failed_frames: u64,
}

/// Runs the kiosk.
pub struct KioskDriver<C: PubSubConnector> {
    machine: KioskMachine,
    peripherals: PeripheralManager,
    camera: Box<dyn CameraTrigger>,
    channel: ClassificationChannel<C>,
    clock: MonotonicClock,
    tick_interval: Duration,
    stats: DriverStats,
}

impl<C: PubSubConnector> KioskDriver<C> {
    /// Create a driver with a fresh clock and the default tick period.
    pub fn new(
        machine: KioskMachine,
        peripherals: PeripheralManager,
        camera: Box<dyn CameraTrigger>,
        channel: ClassificationChannel<C>,
    ) -> Self {
        Self {
            machine,
            peripherals,
            camera,
            channel,
            clock: MonotonicClock::start(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            stats: DriverStats::default(),
        }
    }

    /// Override the tick period. Zero is raised to one millisecond.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_clock(mut self, clock: MonotonicClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn machine(&self) -> &KioskMachine {
        &self.machine
    }

    pub fn state(&self) -> KioskState {
        self.machine.state()
    }

    pub fn peripherals(&self) -> &PeripheralManager {
        &self.peripherals
    }

    pub fn channel(&self) -> &ClassificationChannel<C> {
        &self.channel
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Bring up the network, draw the current screen and start the first
    /// channel attempt.
    ///
    /// Returns whether the link came up. A failed or stalled link is logged
    /// and the kiosk starts offline; the channel keeps retrying on its own.
    pub async fn startup<L: NetworkLink>(&mut self, link: &mut L, timeout: Duration) -> bool {
        let online = bring_up_with_timeout(link, timeout).await;
        info!(online, state = %self.machine.state(), "kiosk starting");

        let frame = self.machine.render();
        if !self.peripherals.show(frame.lines()) {
            self.stats.failed_frames += 1;
        }

        self.channel.maintain(self.clock.now());
        online
    }

    /// Run one cycle at the clock's current reading.
    pub fn step(&mut self) -> SideEffects {
        let now = self.clock.now();
        self.step_at(now)
    }

    /// Run one cycle at `now`.
    pub fn step_at(&mut self, now: Timestamp) -> SideEffects {
        self.stats.ticks += 1;

        let inputs = self.peripherals.poll();
        let update = self.channel.try_take();
        if update.is_some() {
            self.stats.labels_taken += 1;
        }

        let effects = self.machine.tick(inputs, update, now);
        self.apply(&effects);

        self.channel.maintain(now);
        effects
    }

    fn apply(&mut self, effects: &SideEffects) {
        if effects.transition.is_some() {
            self.stats.transitions += 1;
        }

        if let Some(frame) = &effects.frame
            && !self.peripherals.show(frame.lines())
        {
            self.stats.failed_frames += 1;
        }

        if let Some(command) = effects.camera {
            debug!(%command, "camera command");
            self.camera.send(command);
            self.stats.camera_commands += 1;
        }

        if let Some(fault) = &effects.fault {
            warn!(%fault, state = %self.machine.state(), "kiosk fault");
            self.stats.faults += 1;
        }
    }

    /// Tick until `shutdown` resolves, then stop the channel.
    ///
    /// Late ticks are skipped rather than bunched up.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(tick_ms = self.tick_interval.as_millis() as u64, "kiosk loop running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(
                        ticks = self.stats.ticks,
                        transactions = self.machine.context().transactions(),
                        "shutdown requested"
                    );
                    break;
                }
                _ = interval.tick() => {
                    self.step();
                }
            }
        }

        self.channel.shutdown();
    }
}

impl<C: PubSubConnector> std::fmt::Debug for KioskDriver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KioskDriver")
            .field("state", &self.machine.state())
            .field("channel", &self.channel.state())
            .field("tick_interval", &self.tick_interval)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
