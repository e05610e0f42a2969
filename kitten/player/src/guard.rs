use std::time::Duration;

use kitten_types::{TimerSlot, TimerToken};

use crate::effect::{PlayerEffect, TimerKind, arm_timer, cancel_timer};

/**
    Temporary interception of back-navigation while a third-party player
    starts up.

    At most one guard is ever installed. Installing again tears the previous
    one down first, and every guard expires on its own timer.
*/
#[derive(Debug, Default)]
pub struct HistoryGuard {
    expiry: TimerSlot,
}

impl HistoryGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.expiry.is_armed()
    }

    /**
        Install a guard that lasts `duration`, superseding any current one.
    */
    pub fn install(&mut self, duration: Duration, effects: &mut Vec<PlayerEffect>) {
        if self.is_active() {
            effects.push(PlayerEffect::RemoveHistoryGuard);
        }
        effects.push(PlayerEffect::InstallHistoryGuard);
        arm_timer(&mut self.expiry, TimerKind::HistoryGuard, duration, effects);
    }

    /**
        Handle the expiry timer. Stale tokens are ignored.
    */
    pub fn expire(&mut self, token: TimerToken, effects: &mut Vec<PlayerEffect>) {
        if self.expiry.fire(token) {
            effects.push(PlayerEffect::RemoveHistoryGuard);
        }
    }

    /**
        Remove the guard early. Does nothing when no guard is installed.
    */
    pub fn remove(&mut self, effects: &mut Vec<PlayerEffect>) {
        if self.is_active() {
            cancel_timer(&mut self.expiry, TimerKind::HistoryGuard, effects);
            effects.push(PlayerEffect::RemoveHistoryGuard);
        }
    }
}
