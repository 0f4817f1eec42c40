//! Wall-clock sleeping with early cancellation.
//!
//! Deadlines are wall-clock instants but the wait itself is measured against
//! the tokio monotonic clock, so a backward wall-clock jump never extends a
//! sleep beyond the delta computed at call time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::sleep;

/// How a [`sleep_until`] or [`sleep_for`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The deadline was reached.
    Reached,
    /// The deadline was already in the past at call time; no sleeping happened.
    PastDeadline,
    /// The shutdown signal fired before the deadline.
    Cancelled,
}

/// Sleep until the wall-clock instant `target`, or until `shutdown` flips.
pub async fn sleep_until(
    target: DateTime<Utc>,
    shutdown: &mut watch::Receiver<bool>,
) -> SleepOutcome {
    let now = Utc::now();
    let Ok(delta) = (target - now).to_std() else {
        // Negative or zero delta: the boundary has already passed.
        return SleepOutcome::PastDeadline;
    };
    if delta.is_zero() {
        return SleepOutcome::PastDeadline;
    }

    wait(delta, shutdown).await
}

/// Sleep for a fixed duration, or until `shutdown` flips.
pub async fn sleep_for(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> SleepOutcome {
    if duration.is_zero() {
        return SleepOutcome::PastDeadline;
    }
    wait(duration, shutdown).await
}

async fn wait(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> SleepOutcome {
    if *shutdown.borrow() {
        return SleepOutcome::Cancelled;
    }

    tokio::select! {
        _ = sleep(duration) => SleepOutcome::Reached,
        // A closed sender also counts as shutdown.
        _ = shutdown.changed() => SleepOutcome::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    #[tokio::test]
    async fn past_deadline_returns_immediately() {
        let (_tx, mut rx) = watch::channel(false);
        let target = Utc::now() - ChronoDuration::seconds(5);
        assert_eq!(sleep_until(target, &mut rx).await, SleepOutcome::PastDeadline);
    }

    #[tokio::test]
    async fn short_deadline_is_reached() {
        let (_tx, mut rx) = watch::channel(false);
        let target = Utc::now() + ChronoDuration::milliseconds(20);
        assert_eq!(sleep_until(target, &mut rx).await, SleepOutcome::Reached);
    }

    #[tokio::test]
    async fn shutdown_cancels_sleep() {
        let (tx, mut rx) = watch::channel(false);
        let target = Utc::now() + ChronoDuration::seconds(30);

        let handle = tokio::spawn(async move { sleep_until(target, &mut rx).await });
        tx.send(true).expect("send shutdown");

        assert_eq!(handle.await.expect("join"), SleepOutcome::Cancelled);
    }

    #[tokio::test]
    async fn already_shut_down_short_circuits() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).expect("send shutdown");
        // Mark the initial value as seen so only the pre-checked flag can cancel.
        rx.borrow_and_update();

        let target = Utc::now() + ChronoDuration::seconds(30);
        assert_eq!(sleep_until(target, &mut rx).await, SleepOutcome::Cancelled);
    }

    #[tokio::test]
    async fn sleep_for_zero_is_past_deadline() {
        let (_tx, mut rx) = watch::channel(false);
        assert_eq!(
            sleep_for(Duration::ZERO, &mut rx).await,
            SleepOutcome::PastDeadline
        );
    }
}
