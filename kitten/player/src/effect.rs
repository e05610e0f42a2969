use std::time::Duration;

use kitten_types::{PlaybackTarget, TimerSlot, TimerToken};

use crate::settings::StreamingSettings;

/**
    Which of the controller's timers an effect refers to.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// No load signal within the allowed window
    LoadTimeout,
    /// End of the back-navigation guard
    HistoryGuard,
    /// End of the cosmetic "switching source" indicator
    SwitchingIndicator,
    /// Remount after a retry tore the embed down
    Remount,
}

/**
    Side effect requested by the controller.

    The controller never touches the host environment itself; an executor
    applies these in order.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEffect {
    /// Show the embedded player with this source, replacing any current one
    MountEmbed { url: String },
    /// Remove the embedded player
    UnmountEmbed,
    /// Open the source in a new top-level browsing context
    OpenExternal { url: String },
    /// Schedule `on_timer(kind, token)` after `after`
    ArmTimer {
        kind: TimerKind,
        token: TimerToken,
        after: Duration,
    },
    /// Drop a previously scheduled timer
    CancelTimer { kind: TimerKind, token: TimerToken },
    /// Push a sentinel history entry and bounce back-navigation forward
    InstallHistoryGuard,
    /// Remove the back-navigation interception
    RemoveHistoryGuard,
    /// Write the streaming settings to persistent storage
    PersistSettings(StreamingSettings),
    /// Seed continue-watching history for the target
    RecordWatch(PlaybackTarget),
}

/**
    Arm `slot`, emitting a cancel for any arming it supersedes.
*/
pub(crate) fn arm_timer(
    slot: &mut TimerSlot,
    kind: TimerKind,
    after: Duration,
    effects: &mut Vec<PlayerEffect>,
) {
    let (token, previous) = slot.arm(after);
    if let Some(previous) = previous {
        effects.push(PlayerEffect::CancelTimer {
            kind,
            token: previous,
        });
    }
    effects.push(PlayerEffect::ArmTimer { kind, token, after });
}

/**
    Disarm `slot`, emitting a cancel if it was armed.
*/
pub(crate) fn cancel_timer(slot: &mut TimerSlot, kind: TimerKind, effects: &mut Vec<PlayerEffect>) {
    if let Some(token) = slot.cancel() {
        effects.push(PlayerEffect::CancelTimer { kind, token });
    }
}
