use kitten_types::{TabContext, read_json};
use tracing::{debug, info, warn};

use crate::document::TabDocument;
use crate::settings::{CLOAK_SETTINGS_KEY, CloakSettings, CloakSettingsPatch, OriginalTabState};
use crate::state::{CloakEffect, CloakState};
use crate::transport::{BroadcastTransport, CloakMessage, CloakTransport, StorageTransport};

/**
    Per-tab cloak service.

    Constructed once when a tab mounts. Owns the tab's document, the cloak
    state and both transports. Settings forms call
    [`CloakService::update_settings`] directly, and the host calls
    [`CloakService::pump`] whenever inbound messages may be waiting.
*/
pub struct CloakService<D: TabDocument> {
    tab: TabContext,
    document: D,
    state: CloakState,
    transports: Vec<Box<dyn CloakTransport>>,
}

impl<D: TabDocument> CloakService<D> {
    /**
        Snapshot the tab's own look, load settings and apply them.
    */
    pub fn mount(tab: TabContext, document: D) -> Self {
        let settings = CloakSettings::load(&tab);
        let original = OriginalTabState::resolve(&document, &tab, &settings);
        if let Err(e) = original.save(&tab) {
            warn!("[cloak] Failed to store original tab state: {e}");
        }

        let mut transports: Vec<Box<dyn CloakTransport>> = Vec::new();
        match BroadcastTransport::open(&tab) {
            Some(transport) => transports.push(Box::new(transport)),
            None => info!("[cloak] No broadcast channel in {}, using storage events only", tab.id()),
        }
        transports.push(Box::new(StorageTransport::open(&tab)));

        let mut service = Self {
            tab,
            document,
            state: CloakState::new(settings, original),
            transports,
        };
        let effects = service.state.mount();
        service.apply(effects);
        service
    }

    pub fn get_settings(&self) -> &CloakSettings {
        self.state.settings()
    }

    pub fn original(&self) -> &OriginalTabState {
        self.state.original()
    }

    pub fn overlay_visible(&self) -> bool {
        self.state.overlay_visible()
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /**
        Names of the transports in use, broadcast first when present.
    */
    pub fn transport_names(&self) -> Vec<&'static str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    pub fn update_settings(&mut self, patch: CloakSettingsPatch) {
        let effects = self.state.update_settings(patch);
        self.apply(effects);
    }

    pub fn apply_to_current_tab(&mut self, settings: CloakSettings) {
        let effects = self.state.apply_settings(settings);
        self.apply(effects);
    }

    pub fn restore_current_tab(&mut self) {
        let effects = self.state.restore();
        self.apply(effects);
    }

    pub fn pointer_left_window(&mut self, has_related_target: bool) {
        let effects = self.state.pointer_left_window(has_related_target);
        self.apply(effects);
    }

    pub fn click(&mut self) {
        let effects = self.state.click();
        self.apply(effects);
    }

    /**
        Apply every message waiting on any transport.

        Returns how many messages were received.
    */
    pub fn pump(&mut self) -> usize {
        let mut received = 0;
        for index in 0..self.transports.len() {
            while let Some(message) = self.transports[index].poll() {
                received += 1;
                debug!(
                    "[cloak] {} received {message:?} via {}",
                    self.tab.id(),
                    self.transports[index].name()
                );
                let message = self.settle(message);
                let effects = self.state.on_message(message);
                self.apply(effects);
            }
        }
        received
    }

    /**
        Remove listeners and close the transports.
    */
    pub fn teardown(&mut self) {
        let effects = self.state.teardown();
        self.apply(effects);
        for transport in &mut self.transports {
            transport.close();
        }
    }

    /**
        Replace an update's payload with the stored settings, which are
        never older than any message still in flight.
    */
    fn settle(&self, message: CloakMessage) -> CloakMessage {
        match message {
            CloakMessage::CloakUpdate { settings } => CloakMessage::CloakUpdate {
                settings: read_json(&self.tab, CLOAK_SETTINGS_KEY).unwrap_or(settings),
            },
            other => other,
        }
    }

    fn apply(&mut self, effects: Vec<CloakEffect>) {
        for effect in effects {
            match effect {
                CloakEffect::SetTitle(title) => self.document.set_title(&title),
                CloakEffect::SetFavicon(href) => self.document.set_favicon(&href),
                CloakEffect::ShowOverlay(overlay) => self.document.show_overlay(&overlay),
                CloakEffect::HideOverlay => self.document.hide_overlay(),
                CloakEffect::InstallPointerListeners => self.document.set_pointer_listeners(true),
                CloakEffect::RemovePointerListeners => self.document.set_pointer_listeners(false),
                CloakEffect::Persist(settings) => {
                    if let Err(e) = settings.save(&self.tab) {
                        warn!("[cloak] Failed to persist cloak settings: {e}");
                    }
                }
                CloakEffect::Broadcast(message) => {
                    for transport in &mut self.transports {
                        if let Err(e) = transport.publish(&message) {
                            warn!("[cloak] {} transport failed to publish: {e}", transport.name());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kitten_types::{KeyValueStore, MemoryStore, Origin};

    use super::*;
    use crate::document::HeadlessDocument;
    use crate::settings::{ORIGINAL_FAVICON_KEY, ORIGINAL_TITLE_KEY};

    static_assertions::assert_impl_all!(CloakService<HeadlessDocument>: Send);

    fn document() -> HeadlessDocument {
        HeadlessDocument::new("KittenMovies", Some("/kitten.ico"))
    }

    fn tabs(origin: &Arc<Origin>) -> (CloakService<HeadlessDocument>, CloakService<HeadlessDocument>) {
        (
            CloakService::mount(origin.open_tab(), document()),
            CloakService::mount(origin.open_tab(), document()),
        )
    }

    fn classroom() -> CloakSettingsPatch {
        CloakSettingsPatch {
            tab_name: Some("Classes".into()),
            tab_icon: Some("https://classroom.test/favicon.png".into()),
            preset_name: Some("Google Classroom".into()),
            ..Default::default()
        }
    }

    #[test]
    fn update_then_get_round_trips() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let mut tab = CloakService::mount(origin.open_tab(), document());
        let before = tab.get_settings().clone();

        tab.update_settings(classroom());
        assert_eq!(tab.get_settings(), &before.merged(classroom()));
        assert_eq!(tab.document().title(), "Classes");
        assert_eq!(
            CloakSettings::load(&origin.open_tab()),
            tab.get_settings().clone()
        );
    }

    #[test]
    fn tabs_converge_over_broadcast() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let (mut a, mut b) = tabs(&origin);
        assert_eq!(a.transport_names(), vec!["broadcast", "storage"]);

        a.update_settings(classroom());
        assert!(b.pump() >= 2);
        assert_eq!(b.get_settings(), a.get_settings());
        assert_eq!(b.document().title(), "Classes");
        assert_eq!(a.pump(), 0);
    }

    #[test]
    fn tabs_converge_over_storage_events_alone() {
        let origin = Origin::without_broadcast(Arc::new(MemoryStore::new()));
        let (mut a, mut b) = tabs(&origin);
        assert_eq!(b.transport_names(), vec!["storage"]);

        a.update_settings(classroom());
        b.pump();
        assert_eq!(b.get_settings(), a.get_settings());
        assert_eq!(b.document().favicon_href().as_deref(), Some("https://classroom.test/favicon.png"));
    }

    #[test]
    fn last_write_wins() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let (mut a, mut b) = tabs(&origin);

        a.update_settings(classroom());
        b.update_settings(CloakSettingsPatch {
            tab_name: Some("Inbox".into()),
            ..Default::default()
        });
        a.pump();
        b.pump();

        assert_eq!(a.get_settings().tab_name, "Inbox");
        assert_eq!(a.get_settings(), b.get_settings());
        assert_eq!(
            CloakSettings::load(&origin.open_tab()).tab_name,
            "Inbox"
        );
    }

    #[test]
    fn overlay_visibility_moves_in_lockstep() {
        for origin in [
            Origin::new(Arc::new(MemoryStore::new())),
            Origin::without_broadcast(Arc::new(MemoryStore::new())),
        ] {
            let (mut a, mut b) = tabs(&origin);
            a.update_settings(CloakSettingsPatch {
                enabled: Some(true),
                ..classroom()
            });
            b.pump();
            assert!(b.document().has_pointer_listeners());

            a.pointer_left_window(false);
            b.pump();
            assert!(a.overlay_visible() && b.overlay_visible());
            assert!(b.document().overlay().is_some());
            assert_eq!(b.document().title(), "Classes");

            a.click();
            b.pump();
            assert!(!a.overlay_visible() && !b.overlay_visible());
            assert_eq!(b.document().title(), "KittenMovies");
            // Mirrored changes are not echoed back
            assert_eq!(a.pump(), 0);
        }
    }

    #[test]
    fn restore_returns_to_mount_snapshot() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let tab = origin.open_tab();
        let mut service = CloakService::mount(tab.clone(), document());
        service.update_settings(classroom());
        assert_eq!(service.document().title(), "Classes");

        service.restore_current_tab();
        service.restore_current_tab();
        assert_eq!(service.document().title(), "KittenMovies");
        assert_eq!(service.document().favicon_href().as_deref(), Some("/kitten.ico"));
        assert_eq!(tab.get(ORIGINAL_TITLE_KEY).as_deref(), Some("KittenMovies"));
    }

    #[test]
    fn remount_while_disguised_recovers_real_look() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let mut first = CloakService::mount(origin.open_tab(), document());
        first.update_settings(classroom());
        assert_eq!(first.document().title(), "Classes");

        let still_disguised =
            HeadlessDocument::new("Classes", Some("https://classroom.test/favicon.png"));
        let mut second = CloakService::mount(origin.open_tab(), still_disguised);
        assert_eq!(second.original().title, "KittenMovies");
        assert_eq!(second.original().favicon_href, "/kitten.ico");

        second.restore_current_tab();
        assert_eq!(second.document().title(), "KittenMovies");
        assert_eq!(second.document().favicon_href().as_deref(), Some("/kitten.ico"));
    }

    #[test]
    fn remount_with_same_look_sends_no_storage_events() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let _first = CloakService::mount(origin.open_tab(), document());
        let watcher = origin.open_tab();
        let mut events = watcher.storage_events();

        let _second = CloakService::mount(origin.open_tab(), document());
        while let Some(event) = events.try_recv() {
            assert_ne!(event.key, ORIGINAL_TITLE_KEY);
            assert_ne!(event.key, ORIGINAL_FAVICON_KEY);
        }
    }

    #[test]
    fn missing_icon_link_uses_persisted_icon() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let _first = CloakService::mount(origin.open_tab(), document());
        let bare = HeadlessDocument::new("KittenMovies", None);
        let service = CloakService::mount(origin.open_tab(), bare);
        assert_eq!(service.original().favicon_href, "/kitten.ico");
    }

    #[test]
    fn missing_icon_link_snapshots_default_icon() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let service = CloakService::mount(origin.open_tab(), HeadlessDocument::new("Home", None));
        assert_eq!(service.original().favicon_href, "/favicon.ico");
    }

    #[test]
    fn malformed_stored_settings_mount_with_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.set(CLOAK_SETTINGS_KEY, "[1, 2").unwrap();
        let origin = Origin::new(store);

        let service = CloakService::mount(origin.open_tab(), document());
        assert_eq!(service.get_settings(), &CloakSettings::default());
        assert_eq!(service.document().title(), "KittenGames");
    }

    #[test]
    fn teardown_stops_delivery() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let (mut a, mut b) = tabs(&origin);
        a.update_settings(CloakSettingsPatch {
            enabled: Some(true),
            ..Default::default()
        });
        b.pump();

        b.teardown();
        assert!(!b.document().has_pointer_listeners());
        a.update_settings(classroom());
        assert_eq!(b.pump(), 0);
    }
}
