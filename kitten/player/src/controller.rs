/*!
    Player resilience state machine.

    The controller decides, the executor acts. Every operation mutates the
    controller and returns the [`PlayerEffect`]s the host must apply in order.
*/

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kitten_types::{PlaybackTarget, TimerSlot, TimerToken};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capability::Capabilities;
use crate::domains::{DomainId, DomainProvider};
use crate::effect::{PlayerEffect, TimerKind, arm_timer, cancel_timer};
use crate::guard::HistoryGuard;
use crate::settings::StreamingSettings;

/// Load timeout for the first attempt of a session.
pub const INITIAL_LOAD_TIMEOUT: Duration = Duration::from_secs(20);
/// Load timeout for every later attempt.
pub const RETRY_LOAD_TIMEOUT: Duration = Duration::from_secs(8);
/// How long back-navigation stays intercepted after a mount.
pub const HISTORY_GUARD_DURATION: Duration = Duration::from_secs(6);
/// How long the cosmetic "switching source" indicator stays up.
pub const SWITCHING_INDICATOR_DURATION: Duration = Duration::from_millis(400);
/// Delay between tearing the embed down and mounting it again on retry.
pub const REMOUNT_DELAY: Duration = Duration::from_millis(100);
/// Consecutive counted failures that escalate to a hard error.
pub const HARD_ERROR_THRESHOLD: u32 = 2;

/**
    Where a player session currently is.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Playing,
    /// Non-blocking "player seems slow" banner
    SoftWarning,
    /// Full recovery UI, embed removed
    HardError,
    /**
        Embed torn down by [`PlayerController::retry`], remount pending.

        Auto-switching never enters this phase. Its cosmetic indicator
        is reported by [`PlayerController::is_switching`] instead.
    */
    Switching,
}

impl Phase {
    /**
        Actions the UI must offer in this phase.

        Phases that show an error always offer at least one action.
    */
    pub fn recovery_actions(self) -> &'static [RecoveryAction] {
        match self {
            Self::Idle | Self::Playing | Self::Switching => &[],
            Self::SoftWarning => &[RecoveryAction::SwitchDomain, RecoveryAction::OpenExternally],
            Self::HardError => &[
                RecoveryAction::Retry,
                RecoveryAction::SwitchDomain,
                RecoveryAction::OpenExternally,
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryAction {
    Retry,
    SwitchDomain,
    OpenExternally,
}

/**
    Why a load attempt is considered failed.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureCause {
    /// No load signal before the timeout expired
    Timeout,
    /// The embed reported an error
    EmbedError,
}

/**
    Per-session player controller.

    Holds the current embed URL, the phase, the failure counter and the
    timer slots. Timers are bookkeeping only; expiry is reported back
    through [`PlayerController::on_timer`] with the token that was armed.
*/
pub struct PlayerController {
    provider: Arc<dyn DomainProvider>,
    settings: StreamingSettings,
    capabilities: Capabilities,
    target: Option<PlaybackTarget>,
    embed_url: Option<String>,
    phase: Phase,
    fail_attempts: u32,
    mounted: bool,
    external: bool,
    tried: HashSet<DomainId>,
    load_timeout: TimerSlot,
    switching: TimerSlot,
    remount: TimerSlot,
    guard: HistoryGuard,
}

impl PlayerController {
    pub fn new(
        provider: Arc<dyn DomainProvider>,
        settings: StreamingSettings,
        capabilities: Capabilities,
    ) -> Self {
        let settings = StreamingSettings {
            selected_domain: provider.resolve(&settings.selected_domain),
            auto_switch: settings.auto_switch,
        };
        Self {
            provider,
            settings,
            capabilities,
            target: None,
            embed_url: None,
            phase: Phase::Idle,
            fail_attempts: 0,
            mounted: false,
            external: false,
            tried: HashSet::new(),
            load_timeout: TimerSlot::new(),
            switching: TimerSlot::new(),
            remount: TimerSlot::new(),
            guard: HistoryGuard::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn embed_url(&self) -> Option<&str> {
        self.embed_url.as_deref()
    }

    pub fn fail_attempts(&self) -> u32 {
        self.fail_attempts
    }

    pub fn settings(&self) -> &StreamingSettings {
        &self.settings
    }

    pub fn target(&self) -> Option<&PlaybackTarget> {
        self.target.as_ref()
    }

    /**
        Whether the session plays in a new top-level context instead of
        a framed embed.
    */
    pub fn is_external(&self) -> bool {
        self.external
    }

    /**
        Whether the cosmetic "switching source" indicator is up.
    */
    pub fn is_switching(&self) -> bool {
        self.switching.is_armed()
    }

    pub fn has_pending_timeout(&self) -> bool {
        self.load_timeout.is_armed()
    }

    pub fn history_guard_active(&self) -> bool {
        self.guard.is_active()
    }

    pub fn recovery_actions(&self) -> &'static [RecoveryAction] {
        self.phase.recovery_actions()
    }

    /**
        Begin playing `target` on the selected domain.
    */
    pub fn start(&mut self, target: PlaybackTarget) -> Vec<PlayerEffect> {
        let mut effects = Vec::new();
        cancel_timer(&mut self.remount, TimerKind::Remount, &mut effects);
        cancel_timer(
            &mut self.switching,
            TimerKind::SwitchingIndicator,
            &mut effects,
        );

        self.target = Some(target.clone());
        self.fail_attempts = 0;
        self.reset_tried();
        self.external = !self.capabilities.framed_embeds_reliable;

        info!(
            "[player] starting {} {} on {}",
            target.media_type, target.external_id, self.settings.selected_domain
        );
        self.mount(INITIAL_LOAD_TIMEOUT, &mut effects);
        effects.push(PlayerEffect::RecordWatch(target));
        effects
    }

    /**
        The embed signalled that it loaded.

        Only meaningful while a load timeout is pending.
    */
    pub fn on_load_succeeded(&mut self) -> Vec<PlayerEffect> {
        let mut effects = Vec::new();
        if !self.load_timeout.is_armed() {
            debug!("[player] ignoring load signal with no pending timeout");
            return effects;
        }
        cancel_timer(&mut self.load_timeout, TimerKind::LoadTimeout, &mut effects);
        self.fail_attempts = 0;
        self.phase = Phase::Playing;
        debug!("[player] loaded on {}", self.settings.selected_domain);
        effects
    }

    /**
        A load attempt failed.
    */
    pub fn on_load_failed(&mut self, cause: FailureCause) -> Vec<PlayerEffect> {
        let mut effects = Vec::new();
        self.handle_failure(cause, &mut effects);
        effects
    }

    /**
        A timer armed by an earlier effect expired.

        Tokens of superseded or cancelled armings are ignored.
    */
    pub fn on_timer(&mut self, kind: TimerKind, token: TimerToken) -> Vec<PlayerEffect> {
        let mut effects = Vec::new();
        match kind {
            TimerKind::LoadTimeout => {
                if self.load_timeout.fire(token) {
                    self.handle_failure(FailureCause::Timeout, &mut effects);
                }
            }
            TimerKind::HistoryGuard => self.guard.expire(token, &mut effects),
            TimerKind::SwitchingIndicator => {
                self.switching.fire(token);
            }
            TimerKind::Remount => {
                if self.remount.fire(token) {
                    self.mount(INITIAL_LOAD_TIMEOUT, &mut effects);
                }
            }
        }
        effects
    }

    /**
        Tear the embed down and start over on the same domain.
    */
    pub fn retry(&mut self) -> Vec<PlayerEffect> {
        let mut effects = Vec::new();
        if self.target.is_none() {
            return effects;
        }
        cancel_timer(&mut self.load_timeout, TimerKind::LoadTimeout, &mut effects);
        cancel_timer(
            &mut self.switching,
            TimerKind::SwitchingIndicator,
            &mut effects,
        );
        self.fail_attempts = 0;
        self.reset_tried();
        self.unmount(&mut effects);

        info!("[player] retrying on {}", self.settings.selected_domain);
        if self.external {
            self.mount(INITIAL_LOAD_TIMEOUT, &mut effects);
        } else {
            arm_timer(
                &mut self.remount,
                TimerKind::Remount,
                REMOUNT_DELAY,
                &mut effects,
            );
            self.phase = Phase::Switching;
        }
        effects
    }

    /**
        Advance to the next domain and persist the choice.

        Without an active target only the settings change.
    */
    pub fn switch_domain(&mut self) -> Vec<PlayerEffect> {
        let mut effects = Vec::new();
        self.settings = self.settings.with_next_domain(self.provider.as_ref());
        effects.push(PlayerEffect::PersistSettings(self.settings.clone()));
        info!("[player] switched to {}", self.settings.selected_domain);

        if self.target.is_none() {
            return effects;
        }
        cancel_timer(&mut self.remount, TimerKind::Remount, &mut effects);
        self.reset_tried();
        self.mount(RETRY_LOAD_TIMEOUT, &mut effects);
        effects
    }

    /**
        Open the current source in a new top-level context.
    */
    pub fn open_externally(&mut self) -> Vec<PlayerEffect> {
        match self.current_url() {
            Some(url) => vec![PlayerEffect::OpenExternal { url }],
            None => Vec::new(),
        }
    }

    /**
        End the session. Safe to call any number of times.
    */
    pub fn stop(&mut self) -> Vec<PlayerEffect> {
        let mut effects = Vec::new();
        cancel_timer(&mut self.load_timeout, TimerKind::LoadTimeout, &mut effects);
        cancel_timer(
            &mut self.switching,
            TimerKind::SwitchingIndicator,
            &mut effects,
        );
        cancel_timer(&mut self.remount, TimerKind::Remount, &mut effects);
        self.guard.remove(&mut effects);
        self.unmount(&mut effects);

        if self.target.take().is_some() {
            debug!("[player] stopped");
        }
        self.embed_url = None;
        self.phase = Phase::Idle;
        self.fail_attempts = 0;
        self.external = false;
        self.tried.clear();
        effects
    }

    fn handle_failure(&mut self, cause: FailureCause, effects: &mut Vec<PlayerEffect>) {
        if !matches!(self.phase, Phase::Playing | Phase::SoftWarning) || self.external {
            debug!("[player] ignoring {cause:?} in {:?}", self.phase);
            return;
        }
        cancel_timer(&mut self.load_timeout, TimerKind::LoadTimeout, effects);

        let next = self.provider.next_after(&self.settings.selected_domain);
        if self.settings.auto_switch && !self.tried.contains(&next) {
            warn!(
                "[player] {cause:?} on {}, switching to {next}",
                self.settings.selected_domain
            );
            self.settings.selected_domain = next.clone();
            self.tried.insert(next);
            effects.push(PlayerEffect::PersistSettings(self.settings.clone()));
            arm_timer(
                &mut self.switching,
                TimerKind::SwitchingIndicator,
                SWITCHING_INDICATOR_DURATION,
                effects,
            );
            self.mount(RETRY_LOAD_TIMEOUT, effects);
            self.phase = Phase::SoftWarning;
            return;
        }

        self.fail_attempts += 1;
        if self.fail_attempts < HARD_ERROR_THRESHOLD {
            warn!(
                "[player] {cause:?} on {} (attempt {})",
                self.settings.selected_domain, self.fail_attempts
            );
            arm_timer(
                &mut self.load_timeout,
                TimerKind::LoadTimeout,
                RETRY_LOAD_TIMEOUT,
                effects,
            );
            self.phase = Phase::SoftWarning;
        } else {
            warn!(
                "[player] giving up on {} after {} failures",
                self.settings.selected_domain, self.fail_attempts
            );
            self.unmount(effects);
            self.phase = Phase::HardError;
        }
    }

    fn mount(&mut self, timeout: Duration, effects: &mut Vec<PlayerEffect>) {
        let Some(url) = self.current_url() else {
            return;
        };
        self.embed_url = Some(url.clone());

        if self.external {
            cancel_timer(&mut self.load_timeout, TimerKind::LoadTimeout, effects);
            effects.push(PlayerEffect::OpenExternal { url });
        } else {
            effects.push(PlayerEffect::MountEmbed { url });
            self.mounted = true;
            arm_timer(
                &mut self.load_timeout,
                TimerKind::LoadTimeout,
                timeout,
                effects,
            );
        }
        self.guard.install(HISTORY_GUARD_DURATION, effects);
        self.phase = Phase::Playing;
    }

    fn unmount(&mut self, effects: &mut Vec<PlayerEffect>) {
        if self.mounted {
            effects.push(PlayerEffect::UnmountEmbed);
            self.mounted = false;
        }
    }

    fn current_url(&self) -> Option<String> {
        self.target
            .as_ref()
            .map(|target| self.provider.embed_url(target, &self.settings.selected_domain))
    }

    fn reset_tried(&mut self) {
        self.tried.clear();
        self.tried.insert(self.settings.selected_domain.clone());
    }
}
