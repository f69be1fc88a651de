//! Rotation groups and their timers.
//!
//! Each group (weather cities, headlines) has a pure [`RotationState`] held
//! by the dashboard, and two independent timers spawned by [`start`]:
//!
//! * an advance timer, firing every [`Group::interval`];
//! * a cosmetic 1-second countdown timer.
//!
//! The two are not synchronized by a shared tick and may drift apart by a
//! scheduler delay; the countdown is reset on every advance anyway.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::poll::PollMsg;

pub const WEATHER_ROTATION: Duration = Duration::from_secs(30);
pub const HEADLINE_ROTATION: Duration = Duration::from_secs(8);
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Weather,
    Headlines,
}

impl Group {
    pub fn interval(self) -> Duration {
        match self {
            Self::Weather => WEATHER_ROTATION,
            Self::Headlines => HEADLINE_ROTATION,
        }
    }
}

/// Which member of a group is active, and the seconds left until the next
/// advance (display only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationState {
    pub active_index: usize,
    pub countdown_secs: u64,
    len: usize,
    interval_secs: u64,
}

impl RotationState {
    pub fn new(group: Group, len: usize) -> Self {
        let interval_secs = group.interval().as_secs();
        Self {
            active_index: 0,
            countdown_secs: interval_secs,
            len,
            interval_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// The active index, or `None` for an empty group.
    pub fn active(&self) -> Option<usize> {
        (self.len > 0).then_some(self.active_index)
    }

    pub fn advance(&mut self) {
        if self.len > 0 {
            self.active_index = (self.active_index + 1) % self.len;
        }
        self.countdown_secs = self.interval_secs;
    }

    /// Countdown tick, floored at zero.
    pub fn tick(&mut self) {
        self.countdown_secs = self.countdown_secs.saturating_sub(1);
    }

    /// Membership changed: back to the first member with a full countdown.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.active_index = 0;
        self.countdown_secs = self.interval_secs;
    }
}

/// Running timers for one group; cancelled on [`stop`](Self::stop) or drop.
pub struct RotationHandle {
    group: Group,
    token: CancellationToken,
}

impl RotationHandle {
    pub fn group(&self) -> Group {
        self.group
    }

    pub fn stop(self) {}
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawn the advance and countdown timers for `group`.
pub fn start(
    group: Group,
    tx: UnboundedSender<PollMsg>,
    parent: &CancellationToken,
) -> RotationHandle {
    start_with(group, group.interval(), tx, parent)
}

fn start_with(
    group: Group,
    period: Duration,
    tx: UnboundedSender<PollMsg>,
    parent: &CancellationToken,
) -> RotationHandle {
    let token = parent.child_token();
    tracing::debug!(?group, ?period, "rotation timers started");

    spawn_timer(period, PollMsg::Advance(group), tx.clone(), token.clone());
    spawn_timer(COUNTDOWN_TICK, PollMsg::Countdown(group), tx, token.clone());

    RotationHandle { group, token }
}

fn spawn_timer(
    period: Duration,
    msg: PollMsg,
    tx: UnboundedSender<PollMsg>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {
                    if tx.send(msg.clone()).is_err() {
                        return;
                    }
                }
            }
        }
    });
}

/// Owns one [`RotationHandle`] per group.
pub struct Scheduler {
    tx: UnboundedSender<PollMsg>,
    shutdown: CancellationToken,
    handles: HashMap<Group, RotationHandle>,
}

impl Scheduler {
    pub fn new(tx: UnboundedSender<PollMsg>, shutdown: CancellationToken) -> Self {
        Self {
            tx,
            shutdown,
            handles: HashMap::new(),
        }
    }

    /// (Re)start a group's timers; any previous timers for it are cancelled.
    pub fn restart(&mut self, group: Group) {
        let handle = start(group, self.tx.clone(), &self.shutdown);
        if let Some(previous) = self.handles.insert(group, handle) {
            tracing::debug!(group = ?previous.group(), "rotation timers replaced");
            previous.stop();
        }
    }

    pub fn stop_all(&mut self) {
        self.handles.clear();
    }

    #[cfg(test)]
    pub fn is_running(&self, group: Group) -> bool {
        self.handles.contains_key(&group)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<PollMsg>) -> (usize, usize) {
        let (mut advances, mut countdowns) = (0, 0);
        while let Ok(msg) = rx.try_recv() {
            match msg {
                PollMsg::Advance(_) => advances += 1,
                PollMsg::Countdown(_) => countdowns += 1,
                _ => {}
            }
        }
        (advances, countdowns)
    }

    // -- state ---------------------------------------------------------------

    #[test]
    fn n_advances_wrap_to_start() {
        let mut state = RotationState::new(Group::Weather, 4);
        for _ in 0..4 {
            state.advance();
        }
        assert_eq!(state.active_index, 0);
    }

    #[test]
    fn advance_is_monotonic_modulo_len() {
        let mut state = RotationState::new(Group::Headlines, 3);
        let seen: Vec<_> = (0..5)
            .map(|_| {
                state.advance();
                state.active_index
            })
            .collect();
        assert_eq!(seen, [1, 2, 0, 1, 2]);
    }

    #[test]
    fn advance_resets_countdown() {
        let mut state = RotationState::new(Group::Weather, 2);
        state.tick();
        state.tick();
        assert_eq!(state.countdown_secs, 28);

        state.advance();
        assert_eq!(state.countdown_secs, 30);
    }

    #[test]
    fn countdown_floors_at_zero() {
        let mut state = RotationState::new(Group::Headlines, 1);
        for _ in 0..20 {
            state.tick();
        }
        assert_eq!(state.countdown_secs, 0);
    }

    #[test]
    fn empty_group_has_no_active_member() {
        let mut state = RotationState::new(Group::Headlines, 0);
        state.advance();
        assert_eq!(state.active(), None);
        assert_eq!(state.active_index, 0);
    }

    #[test]
    fn reset_returns_to_start() {
        let mut state = RotationState::new(Group::Weather, 4);
        state.advance();
        state.advance();
        state.tick();

        state.reset(5);
        assert_eq!(state.active(), Some(0));
        assert_eq!(state.len(), 5);
        assert_eq!(state.countdown_secs, 30);
    }

    // -- timers --------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn timers_fire_independently() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let _handle = start_with(Group::Headlines, Duration::from_secs(3), tx, &shutdown);

        tokio::time::sleep(Duration::from_millis(7_500)).await;

        assert_eq!(drain(&mut rx), (2, 7));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_both_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let handle = start_with(Group::Weather, Duration::from_secs(2), tx, &shutdown);

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(drain(&mut rx), (2, 4));

        handle.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(drain(&mut rx), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_scheduler_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let mut scheduler = Scheduler::new(tx, shutdown.clone());
        scheduler.restart(Group::Headlines);
        assert!(scheduler.is_running(Group::Headlines));

        tokio::time::sleep(Duration::from_millis(8_500)).await;
        assert_eq!(drain(&mut rx), (1, 8));

        shutdown.cancel();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(drain(&mut rx), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx, CancellationToken::new());
        scheduler.restart(Group::Headlines);
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        drain(&mut rx);

        scheduler.restart(Group::Headlines);
        tokio::time::sleep(Duration::from_millis(7_500)).await;

        // A fresh 8s period: no advance yet, and one countdown stream only.
        assert_eq!(drain(&mut rx), (0, 7));
    }
}
