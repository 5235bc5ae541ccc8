//! Periodic flush of a context's pending changes.
//!
//! # Responsibility
//! - Save the context every interval when it has uncommitted changes.
//! - Stay cancellable by the session that owns it.
//!
//! # Invariants
//! - Non-positive, non-finite or unrepresentable intervals never schedule
//!   anything.
//! - Save failures are logged and left for the next tick to retry.
//! - Dropping the handle stops the loop.

use crate::store::ObjectContext;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: f64 = 30.0;

/// Owner of a running autosave loop.
pub struct AutosaveHandle {
    interval: Duration,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl AutosaveHandle {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns whether the loop task is still alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signals the loop to stop after its current tick.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stops the loop and waits for it to finish.
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("event=autosave module=autosave status=error error_code=join_failed error={err}");
            }
        }
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts saving `context` every `interval_secs` seconds.
///
/// Returns `None` without scheduling anything when the interval is not a
/// positive finite number that fits a `Duration`, or when called outside a
/// tokio runtime.
pub fn start_autosave(context: ObjectContext, interval_secs: f64) -> Option<AutosaveHandle> {
    if !(interval_secs.is_finite() && interval_secs > 0.0) {
        info!(
            "event=autosave_start module=autosave status=skipped interval_secs={interval_secs} reason=non_positive_interval"
        );
        return None;
    }
    let interval = match Duration::try_from_secs_f64(interval_secs) {
        Ok(interval) => interval,
        Err(err) => {
            warn!(
                "event=autosave_start module=autosave status=skipped interval_secs={interval_secs} reason=interval_out_of_range error={err}"
            );
            return None;
        }
    };
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(runtime) => runtime,
        Err(err) => {
            warn!(
                "event=autosave_start module=autosave status=skipped reason=no_runtime error={err}"
            );
            return None;
        }
    };

    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = runtime.spawn(run_autosave(context, interval, shutdown_rx));
    info!(
        "event=autosave_start module=autosave status=ok interval_ms={}",
        interval.as_millis()
    );

    Some(AutosaveHandle {
        interval,
        shutdown,
        task: Some(task),
    })
}

async fn run_autosave(
    context: ObjectContext,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // A first deadline past the clock's range never fires.
    let mut ticker = Instant::now().checked_add(interval).map(|start| {
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    if ticker.is_none() {
        debug!("event=autosave_start module=autosave status=idle reason=deadline_overflow");
    }

    loop {
        tokio::select! {
            _ = next_tick(&mut ticker) => autosave_tick(&context).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("event=autosave_stop module=autosave status=ok");
                    break;
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn autosave_tick(context: &ObjectContext) {
    if !context.has_changes() {
        return;
    }

    let context = context.clone();
    match tokio::task::spawn_blocking(move || context.save()).await {
        Ok(Ok(changes)) => {
            debug!(
                "event=autosave module=autosave status=ok changes={}",
                changes.len()
            );
        }
        Ok(Err(err)) => {
            warn!("event=autosave module=autosave status=error error={err}");
        }
        Err(err) => {
            warn!("event=autosave module=autosave status=error error_code=join_failed error={err}");
        }
    }
}
