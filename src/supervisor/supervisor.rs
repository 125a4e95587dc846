use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::RecvTimeoutError;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::event::channel::{pub_sub, EventConsumer, EventPublisher};
use crate::event::supervisor_event::StateReport;
use crate::probe::ConnectivityProber;
use crate::supervisor::failure::FailureTracker;
use crate::supervisor::state::{StateCell, SupervisorState};
use crate::worker::{WorkerChannel, WorkerChannelFactory};

/// Inbound signals, consumed by the loop at the next tick boundary. The
/// callers never block on the loop's work.
#[derive(Debug, Clone, Copy)]
enum SupervisorCommand {
    Start,
    Stop,
    Reset,
}

/// A supervisor that has not been started yet. `start` moves it onto its own
/// thread and hands back the control handle.
pub struct Supervisor<P, F>
where
    P: ConnectivityProber,
    F: WorkerChannelFactory,
{
    config: SupervisorConfig,
    prober: P,
    factory: F,
    publisher: EventPublisher<StateReport>,
}

impl<P, F> Supervisor<P, F>
where
    P: ConnectivityProber + 'static,
    F: WorkerChannelFactory + 'static,
    F::Channel: 'static,
{
    pub fn new(
        config: SupervisorConfig,
        prober: P,
        factory: F,
        publisher: EventPublisher<StateReport>,
    ) -> Self {
        Self {
            config,
            prober,
            factory,
            publisher,
        }
    }

    /// Spawns the supervisor loop on a dedicated thread. The loop starts out
    /// `Idle` and does nothing until a start is requested.
    pub fn start(self) -> StartedSupervisor {
        let (command_publisher, command_consumer) = pub_sub();
        let state = StateCell::default();

        let tracker = FailureTracker::from(&self.config.restart);
        let supervisor_loop = SupervisorLoop {
            config: self.config,
            prober: self.prober,
            factory: self.factory,
            publisher: self.publisher,
            commands: command_consumer,
            shared: state.clone(),
            state: SupervisorState::Idle,
            tracker,
            channel: None,
            reachable: true,
        };

        let join_handle = thread::spawn(move || supervisor_loop.run());

        StartedSupervisor {
            commands: command_publisher,
            state,
            join_handle,
        }
    }
}

/// Control handle for a running supervisor loop. Dropping it makes the loop
/// tear down any live worker and exit.
pub struct StartedSupervisor {
    commands: EventPublisher<SupervisorCommand>,
    state: StateCell,
    join_handle: JoinHandle<()>,
}

impl StartedSupervisor {
    pub fn request_start(&self) {
        self.send(SupervisorCommand::Start);
    }

    /// Idempotent; honored within one poll interval even while the loop is
    /// probing or backing off.
    pub fn request_stop(&self) {
        self.send(SupervisorCommand::Stop);
    }

    /// Stop followed by a fresh start.
    pub fn request_reset(&self) {
        self.send(SupervisorCommand::Reset);
    }

    /// Snapshot of the loop's current state.
    pub fn state(&self) -> SupervisorState {
        self.state.get()
    }

    /// Stops the worker and terminates the loop thread, waiting for it.
    pub fn shutdown(self) {
        let _ = self.commands.publish(SupervisorCommand::Stop);
        drop(self.commands);
        if self.join_handle.join().is_err() {
            error!("the supervisor loop panicked");
        }
    }

    fn send(&self, command: SupervisorCommand) {
        if self.commands.publish(command).is_err() {
            error!(?command, "the supervisor loop is no longer running");
        }
    }
}

enum LoopTurn {
    Command(SupervisorCommand),
    Tick,
    HandleGone,
}

struct SupervisorLoop<P, F>
where
    P: ConnectivityProber,
    F: WorkerChannelFactory,
{
    config: SupervisorConfig,
    prober: P,
    factory: F,
    publisher: EventPublisher<StateReport>,
    commands: EventConsumer<SupervisorCommand>,
    shared: StateCell,
    state: SupervisorState,
    tracker: FailureTracker,
    channel: Option<F::Channel>,
    reachable: bool,
}

impl<P, F> SupervisorLoop<P, F>
where
    P: ConnectivityProber,
    F: WorkerChannelFactory,
{
    fn run(mut self) {
        debug!("supervisor loop started");
        loop {
            match self.next_turn() {
                LoopTurn::Command(command) => self.apply_command(command),
                LoopTurn::Tick => self.tick(Instant::now()),
                LoopTurn::HandleGone => break,
            }
        }
        // Handle dropped without a stop: the worker must not outlive us.
        self.stop();
        debug!("supervisor loop finished");
    }

    /// The command wait doubles as the tick timer: a quiet poll interval is a
    /// tick, a command is applied right away.
    fn next_turn(&self) -> LoopTurn {
        match self.commands.as_ref().recv_timeout(self.config.poll_interval) {
            Ok(command) => LoopTurn::Command(command),
            Err(RecvTimeoutError::Timeout) => LoopTurn::Tick,
            Err(RecvTimeoutError::Disconnected) => LoopTurn::HandleGone,
        }
    }

    fn apply_command(&mut self, command: SupervisorCommand) {
        match command {
            SupervisorCommand::Start => self.start(),
            SupervisorCommand::Stop => self.stop(),
            SupervisorCommand::Reset => {
                self.stop();
                self.start();
            }
        }
    }

    fn start(&mut self) {
        if self.state.is_active() {
            debug!(state = %self.state, "start requested but the supervisor is already active");
            return;
        }
        info!("starting the action server supervisor");
        self.tracker.reset();
        self.reachable = true;
        self.transition(SupervisorState::ProbingConnectivity);
    }

    fn stop(&mut self) {
        if !self.state.is_active() {
            debug!(state = %self.state, "stop requested but the supervisor is not active");
            return;
        }
        info!("stopping the action server supervisor");
        self.transition(SupervisorState::Stopping);
        self.teardown_channel();
        self.transition(SupervisorState::Stopped);
    }

    fn tick(&mut self, now: Instant) {
        match self.state {
            SupervisorState::Idle | SupervisorState::Stopped => {}
            SupervisorState::ProbingConnectivity => self.tick_probing(),
            SupervisorState::Starting => self.tick_starting(now),
            SupervisorState::Running => self.tick_running(now),
            SupervisorState::ChannelDown => self.tick_channel_down(now),
            SupervisorState::Backoff => self.tick_backoff(now),
            // Stopping never outlives the stop that produced it.
            SupervisorState::Stopping => {}
        }
    }

    fn tick_probing(&mut self) {
        let reachable = self.prober.probe(&self.config.backend_endpoint);
        self.set_reachable(reachable);
        if reachable {
            self.transition(SupervisorState::Starting);
        }
    }

    fn tick_starting(&mut self, now: Instant) {
        match self.factory.start() {
            Ok(mut channel) => {
                if channel.is_alive() {
                    self.channel = Some(channel);
                    self.tracker.reset();
                    self.transition(SupervisorState::Running);
                } else {
                    warn!(worker = %self.config.channel_name, "worker channel died right after start");
                    self.channel = Some(channel);
                    self.fail(now);
                }
            }
            Err(err) => {
                warn!(worker = %self.config.channel_name, "could not start the worker channel: {err}");
                self.fail(now);
            }
        }
    }

    fn tick_running(&mut self, now: Instant) {
        let alive = self
            .channel
            .as_mut()
            .map(|channel| channel.is_alive())
            .unwrap_or(false);
        if !alive {
            warn!(worker = %self.config.channel_name, "worker channel is down");
            self.fail(now);
            return;
        }

        let reachable = self.prober.probe(&self.config.backend_endpoint);
        self.set_reachable(reachable);
        if !reachable {
            self.teardown_channel();
            self.transition(SupervisorState::ProbingConnectivity);
        }
    }

    fn tick_channel_down(&mut self, now: Instant) {
        if self.tracker.should_enter_backoff() {
            warn!(
                failures = self.tracker.consecutive_failures(),
                "worker channel keeps failing, waiting {:?} before the next restart",
                self.tracker.backoff_wait()
            );
            self.transition(SupervisorState::Backoff);
            return;
        }

        let reachable = self.prober.probe(&self.config.backend_endpoint);
        self.set_reachable(reachable);
        if reachable {
            self.transition(SupervisorState::Starting);
        } else {
            self.transition(SupervisorState::ProbingConnectivity);
        }
    }

    fn tick_backoff(&mut self, now: Instant) {
        if self.tracker.backoff_elapsed(now) {
            self.tracker.reset();
            self.transition(SupervisorState::Starting);
        }
    }

    /// A crashed or never-started worker: reap it, count the failure.
    fn fail(&mut self, now: Instant) {
        self.teardown_channel();
        self.tracker.record_failure(now);
        self.transition(SupervisorState::ChannelDown);
    }

    /// Stop + join, always paired. A teardown error is logged, the handle is
    /// discarded regardless.
    fn teardown_channel(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        if let Err(err) = channel.stop() {
            warn!(worker = %self.config.channel_name, "could not stop the worker channel: {err}");
        }
        if let Err(err) = channel.join() {
            error!(worker = %self.config.channel_name, "could not join the worker channel: {err}");
        }
    }

    /// Reachability flips are reported once per episode, not on every probe.
    fn set_reachable(&mut self, reachable: bool) {
        if self.reachable == reachable {
            return;
        }
        self.reachable = reachable;
        if reachable {
            info!(endpoint = %self.config.backend_endpoint, "backend is reachable again");
        } else {
            warn!(endpoint = %self.config.backend_endpoint, "cannot reach the backend, the worker stays down until it is back");
        }
        self.report();
    }

    fn transition(&mut self, next: SupervisorState) {
        debug!(from = %self.state, to = %next, "supervisor state changed");
        self.state = next;
        self.shared.set(next);
        self.report();
    }

    fn report(&self) {
        let report = StateReport {
            state: self.state,
            failure_count: self.tracker.consecutive_failures(),
            reachable: self.reachable,
        };
        if self.publisher.publish(report).is_err() {
            debug!("no observer is listening for state reports");
        }
    }
}
