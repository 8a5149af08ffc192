use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Result type for one scheduled cycle.
pub type CycleResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Seam between the scheduler and the update pipeline.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Run one full update cycle. Errors are logged by the scheduler; they
    /// never stop the schedule.
    async fn execute(&self) -> CycleResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
}

enum SchedulerMessage {
    Start { interval: Duration, repeat: bool },
    Stop,
    TriggerNow,
    TimerFired,
    CycleFinished { success: bool },
    State { reply: oneshot::Sender<SchedulerState> },
}

/// Handle to the scheduler actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerMessage>,
}

impl SchedulerHandle {
    /// Cancel any pending timer and arm a new one. With `repeat`, the timer
    /// re-arms for the same interval after each cycle completes, whether or
    /// not the cycle succeeded.
    pub async fn start(&self, interval: Duration, repeat: bool) {
        let _ = self.tx.send(SchedulerMessage::Start { interval, repeat }).await;
    }

    /// Cancel the timer and clear the repeat state. A cycle already in
    /// flight is allowed to finish.
    pub async fn stop(&self) {
        let _ = self.tx.send(SchedulerMessage::Stop).await;
    }

    /// Fire the timer immediately. Interval and repeat state are untouched.
    pub async fn trigger_now(&self) {
        let _ = self.tx.send(SchedulerMessage::TriggerNow).await;
    }

    pub async fn state(&self) -> SchedulerState {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SchedulerMessage::State { reply }).await.is_err() {
            return SchedulerState::Idle;
        }
        rx.await.unwrap_or(SchedulerState::Idle)
    }
}

/// The scheduler actor: one logical timer driving recurring update cycles.
///
/// A cycle runs in its own task so the actor stays responsive to stop and
/// trigger messages while one is in flight; overlapping triggers are
/// coalesced by skipping while `Running`.
pub struct UpdateScheduler {
    runner: Arc<dyn CycleRunner>,
    rx: mpsc::Receiver<SchedulerMessage>,
    self_tx: mpsc::Sender<SchedulerMessage>,
    state: SchedulerState,
    timer: Option<JoinHandle<()>>,
    interval: Option<Duration>,
    repeat: bool,
}

impl UpdateScheduler {
    /// Spawn the actor and return its handle.
    pub fn spawn(runner: Arc<dyn CycleRunner>) -> SchedulerHandle {
        let (tx, rx) = mpsc::channel(16);
        let actor = UpdateScheduler {
            runner,
            rx,
            self_tx: tx.clone(),
            state: SchedulerState::Idle,
            timer: None,
            interval: None,
            repeat: false,
        };
        tokio::spawn(actor.run());
        SchedulerHandle { tx }
    }

    async fn run(mut self) {
        tracing::info!("Update scheduler started");
        while let Some(msg) = self.rx.recv().await {
            self.handle_message(msg);
        }
        self.cancel_timer();
        tracing::info!("Update scheduler stopped");
    }

    fn handle_message(&mut self, msg: SchedulerMessage) {
        match msg {
            SchedulerMessage::Start { interval, repeat } => {
                tracing::info!(
                    "Scheduling update cycle every {:?} (repeat: {})",
                    interval,
                    repeat
                );
                self.cancel_timer();
                self.interval = Some(interval);
                self.repeat = repeat;
                self.arm_timer(interval);
            }
            SchedulerMessage::Stop => {
                tracing::info!("Stopping scheduled updates");
                self.cancel_timer();
                self.repeat = false;
                if self.state == SchedulerState::Scheduled {
                    self.state = SchedulerState::Idle;
                }
            }
            SchedulerMessage::TriggerNow | SchedulerMessage::TimerFired => {
                self.start_cycle();
            }
            SchedulerMessage::CycleFinished { success } => {
                self.state = SchedulerState::Idle;
                if success {
                    tracing::debug!("Update cycle completed");
                } else {
                    tracing::error!("Update cycle failed");
                }
                // Re-arm regardless of the cycle's outcome.
                if self.repeat {
                    if let Some(interval) = self.interval {
                        self.arm_timer(interval);
                    }
                }
            }
            SchedulerMessage::State { reply } => {
                let _ = reply.send(self.state);
            }
        }
    }

    fn start_cycle(&mut self) {
        if self.state == SchedulerState::Running {
            tracing::debug!("Update cycle already running, skipping trigger");
            return;
        }
        // The single timer never fires into a running cycle; the next one is
        // armed when this cycle finishes.
        self.cancel_timer();
        self.state = SchedulerState::Running;

        let runner = Arc::clone(&self.runner);
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let result = runner.execute().await;
            if let Err(e) = &result {
                tracing::error!("Update cycle error: {}", e);
            }
            let _ = tx
                .send(SchedulerMessage::CycleFinished {
                    success: result.is_ok(),
                })
                .await;
        });
    }

    fn arm_timer(&mut self, interval: Duration) {
        let tx = self.self_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = tx.send(SchedulerMessage::TimerFired).await;
        }));
        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::Scheduled;
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
