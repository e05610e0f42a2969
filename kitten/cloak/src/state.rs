/*!
    Cloak synchronization state machine.

    Decides what a tab should look like and what to tell the other tabs.
    Effects are only emitted for actual changes, which makes applying the
    same message any number of times equivalent to applying it once.
*/

use tracing::debug;

use crate::settings::{CloakSettings, CloakSettingsPatch, OriginalTabState, OverlayContent};
use crate::transport::CloakMessage;

/**
    Side effect requested by [`CloakState`].
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloakEffect {
    SetTitle(String),
    SetFavicon(String),
    ShowOverlay(OverlayContent),
    HideOverlay,
    InstallPointerListeners,
    RemovePointerListeners,
    /// Write settings to the origin store
    Persist(CloakSettings),
    /// Send a message to the other tabs
    Broadcast(CloakMessage),
}

/**
    One tab's cloak state.
*/
#[derive(Debug)]
pub struct CloakState {
    settings: CloakSettings,
    original: OriginalTabState,
    title: String,
    favicon: String,
    overlay_visible: bool,
    listeners: bool,
}

impl CloakState {
    /**
        State for a tab currently showing `original`.

        Nothing is applied until [`CloakState::mount`].
    */
    pub fn new(settings: CloakSettings, original: OriginalTabState) -> Self {
        Self {
            title: original.title.clone(),
            favicon: original.favicon_href.clone(),
            settings,
            original,
            overlay_visible: false,
            listeners: false,
        }
    }

    pub fn settings(&self) -> &CloakSettings {
        &self.settings
    }

    pub fn original(&self) -> &OriginalTabState {
        &self.original
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn listeners_installed(&self) -> bool {
        self.listeners
    }

    /// Title the tab currently shows.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Icon the tab currently shows.
    pub fn favicon(&self) -> &str {
        &self.favicon
    }

    /**
        Apply the loaded settings to the freshly mounted tab.
    */
    pub fn mount(&mut self) -> Vec<CloakEffect> {
        let settings = self.settings.clone();
        self.apply_settings(settings)
    }

    /**
        Merge `patch` into the settings, persist, apply and tell other tabs.
    */
    pub fn update_settings(&mut self, patch: CloakSettingsPatch) -> Vec<CloakEffect> {
        let merged = self.settings.merged(patch);
        let mut effects = vec![CloakEffect::Persist(merged.clone())];
        effects.extend(self.apply_settings(merged.clone()));
        effects.push(CloakEffect::Broadcast(CloakMessage::CloakUpdate {
            settings: merged,
        }));
        effects
    }

    /**
        Make this tab reflect `settings`.

        Disabled overlay mode shows the disguise directly. Enabled overlay
        mode keeps the original look and arms the pointer listeners, unless
        the overlay is up, in which case it is refreshed.
    */
    pub fn apply_settings(&mut self, settings: CloakSettings) -> Vec<CloakEffect> {
        self.settings = settings;
        let mut effects = Vec::new();

        if self.settings.enabled {
            self.set_listeners(true, &mut effects);
            if self.overlay_visible {
                effects.push(CloakEffect::ShowOverlay(self.settings.overlay.clone()));
                self.disguise(&mut effects);
            } else {
                self.restore_into(&mut effects);
            }
        } else {
            self.set_listeners(false, &mut effects);
            if self.overlay_visible {
                self.overlay_visible = false;
                effects.push(CloakEffect::HideOverlay);
            }
            self.disguise(&mut effects);
        }
        effects
    }

    /**
        Put the original title and icon back.
    */
    pub fn restore(&mut self) -> Vec<CloakEffect> {
        let mut effects = Vec::new();
        self.restore_into(&mut effects);
        effects
    }

    /**
        The pointer left the document. Only leaving the window itself, with
        no related target, triggers the overlay.
    */
    pub fn pointer_left_window(&mut self, has_related_target: bool) -> Vec<CloakEffect> {
        if !self.listeners || has_related_target || self.overlay_visible {
            return Vec::new();
        }
        let mut effects = self.set_overlay(true);
        effects.push(CloakEffect::Broadcast(CloakMessage::OverlayVisibility {
            visible: true,
        }));
        effects
    }

    /**
        A click anywhere hides a visible overlay.
    */
    pub fn click(&mut self) -> Vec<CloakEffect> {
        if !self.listeners || !self.overlay_visible {
            return Vec::new();
        }
        let mut effects = self.set_overlay(false);
        effects.push(CloakEffect::Broadcast(CloakMessage::OverlayVisibility {
            visible: false,
        }));
        effects
    }

    /**
        Apply a message from another tab without echoing it back.
    */
    pub fn on_message(&mut self, message: CloakMessage) -> Vec<CloakEffect> {
        match message {
            CloakMessage::CloakUpdate { settings } => {
                if settings == self.settings {
                    return Vec::new();
                }
                debug!("[cloak] Applying remote settings");
                self.apply_settings(settings)
            }
            CloakMessage::OverlayVisibility { visible } => {
                if !self.settings.enabled || visible == self.overlay_visible {
                    return Vec::new();
                }
                debug!("[cloak] Mirroring remote overlay visibility: {visible}");
                self.set_overlay(visible)
            }
        }
    }

    /**
        Remove listeners before the tab goes away.
    */
    pub fn teardown(&mut self) -> Vec<CloakEffect> {
        let mut effects = Vec::new();
        self.set_listeners(false, &mut effects);
        effects
    }

    fn set_overlay(&mut self, visible: bool) -> Vec<CloakEffect> {
        let mut effects = Vec::new();
        self.overlay_visible = visible;
        if visible {
            effects.push(CloakEffect::ShowOverlay(self.settings.overlay.clone()));
            self.disguise(&mut effects);
        } else {
            effects.push(CloakEffect::HideOverlay);
            self.restore_into(&mut effects);
        }
        effects
    }

    fn set_listeners(&mut self, installed: bool, effects: &mut Vec<CloakEffect>) {
        if self.listeners == installed {
            return;
        }
        self.listeners = installed;
        effects.push(if installed {
            CloakEffect::InstallPointerListeners
        } else {
            CloakEffect::RemovePointerListeners
        });
    }

    fn disguise(&mut self, effects: &mut Vec<CloakEffect>) {
        let title = non_empty_or(&self.settings.tab_name, &self.original.title);
        let favicon = non_empty_or(&self.settings.tab_icon, &self.original.favicon_href);
        self.show(title, favicon, effects);
    }

    fn restore_into(&mut self, effects: &mut Vec<CloakEffect>) {
        let title = self.original.title.clone();
        let favicon = self.original.favicon_href.clone();
        self.show(title, favicon, effects);
    }

    fn show(&mut self, title: String, favicon: String, effects: &mut Vec<CloakEffect>) {
        if self.title != title {
            self.title = title.clone();
            effects.push(CloakEffect::SetTitle(title));
        }
        if self.favicon != favicon {
            self.favicon = favicon.clone();
            effects.push(CloakEffect::SetFavicon(favicon));
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
