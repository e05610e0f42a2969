/*!
    Single-slot timer bookkeeping.
*/

use std::time::Duration;

/**
    Identity of one arming of a [`TimerSlot`].

    Whoever actually waits (a tokio task, a browser `setTimeout`, a test)
    reports expiry by handing the token back. Tokens from superseded or
    cancelled armings no longer match and are ignored.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/**
    At most one outstanding scheduled callback.

    Arming always supersedes the previous arming, so two live timeouts for the
    same slot cannot exist. The slot only keeps bookkeeping; it never sleeps.
*/
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    armed: Option<(TimerToken, Duration)>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Arm the slot for `after`, returning the new token and the token of
        the arming it replaced, if any.
    */
    pub fn arm(&mut self, after: Duration) -> (TimerToken, Option<TimerToken>) {
        let previous = self.cancel();
        self.generation += 1;
        let token = TimerToken(self.generation);
        self.armed = Some((token, after));
        (token, previous)
    }

    /**
        Disarm the slot, returning the token that was live.
    */
    pub fn cancel(&mut self) -> Option<TimerToken> {
        self.armed.take().map(|(token, _)| token)
    }

    /**
        Report that the timer behind `token` expired.

        Returns true, and disarms the slot, only if `token` is the live arming.
    */
    pub fn fire(&mut self, token: TimerToken) -> bool {
        if self.armed.is_some_and(|(live, _)| live == token) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /**
        Token of the live arming, if any.
    */
    pub fn token(&self) -> Option<TimerToken> {
        self.armed.map(|(token, _)| token)
    }

    /**
        Duration the live arming was scheduled for, if any.
    */
    pub fn duration(&self) -> Option<Duration> {
        self.armed.map(|(_, after)| after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_supersedes_previous() {
        let mut slot = TimerSlot::new();
        let (first, replaced) = slot.arm(Duration::from_secs(20));
        assert_eq!(replaced, None);

        let (second, replaced) = slot.arm(Duration::from_secs(8));
        assert_eq!(replaced, Some(first));
        assert_ne!(first, second);
        assert_eq!(slot.token(), Some(second));
        assert_eq!(slot.duration(), Some(Duration::from_secs(8)));
    }

    #[test]
    fn stale_tokens_do_not_fire() {
        let mut slot = TimerSlot::new();
        let (first, _) = slot.arm(Duration::from_secs(1));
        let (second, _) = slot.arm(Duration::from_secs(1));

        assert!(!slot.fire(first));
        assert!(slot.is_armed());
        assert!(slot.fire(second));
        assert!(!slot.is_armed());
        assert!(!slot.fire(second));
    }

    #[test]
    fn cancel_disarms() {
        let mut slot = TimerSlot::new();
        assert_eq!(slot.cancel(), None);

        let (token, _) = slot.arm(Duration::from_millis(5));
        assert_eq!(slot.cancel(), Some(token));
        assert!(!slot.fire(token));
    }
}
