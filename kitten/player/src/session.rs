/*!
    Tokio executor for [`PlayerController`] effects.
*/

use std::collections::HashMap;
use std::sync::Arc;

use kitten_types::{KeyValueStore, PlaybackTarget, TimerToken};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::capability::Capabilities;
use crate::controller::{FailureCause, Phase, PlayerController};
use crate::domains::DomainProvider;
use crate::effect::{PlayerEffect, TimerKind};
use crate::library::WatchHistory;
use crate::settings::StreamingSettings;

/**
    The environment a player session drives.
*/
pub trait PlayerHost: Send {
    fn mount_embed(&mut self, url: &str);
    fn unmount_embed(&mut self);
    fn open_external(&mut self, url: &str);
    fn install_history_guard(&mut self);
    fn remove_history_guard(&mut self);
}

/**
    A player controller bound to a host, a store and real timers.

    Each armed timer is a spawned sleep. Its expiry comes back through
    [`PlayerSession::next_expiry`], which feeds it to the controller.
    Dropping the session aborts every pending timer.
*/
pub struct PlayerSession<H: PlayerHost> {
    controller: PlayerController,
    host: H,
    store: Arc<dyn KeyValueStore>,
    timers: HashMap<TimerKind, (TimerToken, AbortHandle)>,
    expiry_tx: mpsc::UnboundedSender<(TimerKind, TimerToken)>,
    expiry_rx: mpsc::UnboundedReceiver<(TimerKind, TimerToken)>,
}

impl<H: PlayerHost> PlayerSession<H> {
    /**
        Create a session, reading streaming settings from `store`.
    */
    pub fn new(
        provider: Arc<dyn DomainProvider>,
        store: Arc<dyn KeyValueStore>,
        capabilities: Capabilities,
        host: H,
    ) -> Self {
        let settings = StreamingSettings::load(store.as_ref(), provider.as_ref());
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Self {
            controller: PlayerController::new(provider, settings, capabilities),
            host,
            store,
            timers: HashMap::new(),
            expiry_tx,
            expiry_rx,
        }
    }

    pub fn controller(&self) -> &PlayerController {
        &self.controller
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn start(&mut self, target: PlaybackTarget) {
        let effects = self.controller.start(target);
        self.apply(effects);
    }

    pub fn on_load_succeeded(&mut self) {
        let effects = self.controller.on_load_succeeded();
        self.apply(effects);
    }

    pub fn on_load_failed(&mut self, cause: FailureCause) {
        let effects = self.controller.on_load_failed(cause);
        self.apply(effects);
    }

    pub fn retry(&mut self) {
        let effects = self.controller.retry();
        self.apply(effects);
    }

    pub fn switch_domain(&mut self) {
        let effects = self.controller.switch_domain();
        self.apply(effects);
    }

    pub fn open_externally(&mut self) {
        let effects = self.controller.open_externally();
        self.apply(effects);
    }

    pub fn stop(&mut self) {
        let effects = self.controller.stop();
        self.apply(effects);
    }

    /**
        Wait for the next pending timer to expire and process it.

        Returns false immediately when no timer is pending.
    */
    pub async fn next_expiry(&mut self) -> bool {
        if self.timers.is_empty() {
            return false;
        }
        let Some((kind, token)) = self.expiry_rx.recv().await else {
            return false;
        };
        if self.timers.get(&kind).is_some_and(|(live, _)| *live == token) {
            self.timers.remove(&kind);
        }
        let effects = self.controller.on_timer(kind, token);
        self.apply(effects);
        true
    }

    fn apply(&mut self, effects: Vec<PlayerEffect>) {
        for effect in effects {
            match effect {
                PlayerEffect::MountEmbed { url } => self.host.mount_embed(&url),
                PlayerEffect::UnmountEmbed => self.host.unmount_embed(),
                PlayerEffect::OpenExternal { url } => self.host.open_external(&url),
                PlayerEffect::InstallHistoryGuard => self.host.install_history_guard(),
                PlayerEffect::RemoveHistoryGuard => self.host.remove_history_guard(),
                PlayerEffect::ArmTimer { kind, token, after } => {
                    let tx = self.expiry_tx.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = tx.send((kind, token));
                    })
                    .abort_handle();
                    if let Some((_, previous)) = self.timers.insert(kind, (token, handle)) {
                        previous.abort();
                    }
                }
                PlayerEffect::CancelTimer { kind, token } => {
                    if self.timers.get(&kind).is_some_and(|(live, _)| *live == token)
                        && let Some((_, handle)) = self.timers.remove(&kind)
                    {
                        handle.abort();
                    }
                }
                PlayerEffect::PersistSettings(settings) => {
                    if let Err(e) = settings.save(self.store.as_ref()) {
                        warn!("[player] failed to persist streaming settings: {e}");
                    }
                }
                PlayerEffect::RecordWatch(target) => {
                    if let Err(e) = WatchHistory::new(self.store.as_ref()).record_started(&target)
                    {
                        warn!("[player] failed to record watch history: {e}");
                    }
                }
            }
        }
        debug!("[player] {} timer(s) pending", self.timers.len());
    }
}

impl<H: PlayerHost> Drop for PlayerSession<H> {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.timers.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kitten_types::{MediaType, MemoryStore};
    use tokio::time::Instant;

    use super::*;
    use crate::controller::{HISTORY_GUARD_DURATION, INITIAL_LOAD_TIMEOUT};
    use crate::domains::tests::greek;
    use crate::library::{MediaRef, WatchHistory};
    use crate::settings::STREAMING_SETTINGS_KEY;

    #[derive(Default)]
    struct RecordingHost {
        mounted: Option<String>,
        opened: Vec<String>,
        guard: bool,
    }

    impl PlayerHost for RecordingHost {
        fn mount_embed(&mut self, url: &str) {
            self.mounted = Some(url.to_string());
        }
        fn unmount_embed(&mut self) {
            self.mounted = None;
        }
        fn open_external(&mut self, url: &str) {
            self.opened.push(url.to_string());
        }
        fn install_history_guard(&mut self) {
            self.guard = true;
        }
        fn remove_history_guard(&mut self) {
            self.guard = false;
        }
    }

    fn session(store: Arc<MemoryStore>) -> PlayerSession<RecordingHost> {
        PlayerSession::new(
            Arc::new(greek()),
            store,
            Capabilities::full(),
            RecordingHost::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rotates_to_next_mirror() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone());
        let began = Instant::now();

        session.start(PlaybackTarget::movie("550"));
        assert_eq!(
            session.host().mounted.as_deref(),
            Some("https://alpha.test/movie/550")
        );
        assert!(session.host().guard);

        assert!(session.next_expiry().await);
        assert!(began.elapsed() >= HISTORY_GUARD_DURATION);
        assert!(began.elapsed() < INITIAL_LOAD_TIMEOUT);
        assert!(!session.host().guard);

        assert!(session.next_expiry().await);
        assert!(began.elapsed() >= INITIAL_LOAD_TIMEOUT);
        assert_eq!(session.phase(), Phase::SoftWarning);
        assert_eq!(
            session.host().mounted.as_deref(),
            Some("https://beta.test/movie/550")
        );
        assert!(session.host().guard);
        assert!(
            store
                .get(STREAMING_SETTINGS_KEY)
                .is_some_and(|raw| raw.contains("beta"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn success_beats_pending_timeout() {
        let mut session = session(Arc::new(MemoryStore::new()));
        session.start(PlaybackTarget::movie("550"));
        tokio::time::sleep(Duration::from_secs(3)).await;
        session.on_load_succeeded();

        // Only the history guard is left
        assert!(session.next_expiry().await);
        assert!(!session.next_expiry().await);
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.controller().fail_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_aborts_timers() {
        let mut session = session(Arc::new(MemoryStore::new()));
        session.start(PlaybackTarget::movie("550"));
        session.stop();

        assert!(!session.next_expiry().await);
        assert_eq!(session.host().mounted, None);
        assert!(!session.host().guard);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn start_records_history_and_reads_settings() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                STREAMING_SETTINGS_KEY,
                r#"{"selectedDomain":"gamma","autoSwitch":false}"#,
            )
            .unwrap();

        let mut session = session(store.clone());
        session.start(PlaybackTarget::episode("1399", 1, 2));
        assert_eq!(
            session.host().mounted.as_deref(),
            Some("https://gamma.test/tv/1399/1/2")
        );

        let history = WatchHistory::new(store.as_ref());
        assert!(history.get(MediaRef::new(1399, MediaType::Tv)).is_some());
        assert!(history.get(MediaRef::new(1399, MediaType::Movie)).is_none());

        session.open_externally();
        assert_eq!(session.host().opened, vec!["https://gamma.test/tv/1399/1/2"]);
    }
}
