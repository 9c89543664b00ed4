//! ExpiryCountdown: explicit start/stop ticker for a verification challenge.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::clock::SharedClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    pub remaining_secs: u64,
    pub expired: bool,
}

impl CountdownTick {
    pub fn at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining_secs = u64::try_from((expires_at - now).num_seconds()).unwrap_or(0);
        Self {
            remaining_secs,
            expired: now >= expires_at,
        }
    }

    /// `MM:SS`, as shown next to the code field.
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }
}

/// Publishes a [`CountdownTick`] on every tick until the deadline passes or
/// the countdown is stopped. Dropping the countdown stops it.
#[derive(Debug)]
pub struct ExpiryCountdown {
    expires_at: DateTime<Utc>,
    clock: SharedClock,
    ticks: watch::Receiver<CountdownTick>,
    task: Option<JoinHandle<()>>,
}

impl ExpiryCountdown {
    /// Spawns the ticker on the current tokio runtime. Outside a runtime no
    /// task is spawned and [`Self::tick_now`] still reports expiry on demand.
    pub fn start(expires_at: DateTime<Utc>, clock: SharedClock, period: Duration) -> Self {
        let (tx, ticks) = watch::channel(CountdownTick::at(expires_at, clock.now()));
        let task = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let clock = clock.clone();
                Some(handle.spawn(async move {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        interval.tick().await;
                        let tick = CountdownTick::at(expires_at, clock.now());
                        if tx.send(tick).is_err() || tick.expired {
                            break;
                        }
                    }
                }))
            }
            Err(_) => {
                debug!("no tokio runtime; countdown computed on demand only");
                None
            }
        };
        Self {
            expires_at,
            clock,
            ticks,
            task,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn tick_now(&self) -> CountdownTick {
        CountdownTick::at(self.expires_at, self.clock.now())
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownTick> {
        self.ticks.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ExpiryCountdown {
    fn drop(&mut self) {
        self.stop();
    }
}
