use kitten_types::{KeyValueStore, Result, read_json, write_json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::TabDocument;

pub const CLOAK_SETTINGS_KEY: &str = "cloakSettings";

pub const LEGACY_PRESET_NAME_KEY: &str = "cloakedPresetName";
pub const LEGACY_TAB_NAME_KEY: &str = "cloakedTabName";
pub const LEGACY_TAB_ICON_KEY: &str = "cloakedTabIcon";
pub const LEGACY_OVERLAY_ENABLED_KEY: &str = "cloakOverlayEnabled";

pub const ORIGINAL_TITLE_KEY: &str = "originalTabTitle";
pub const ORIGINAL_FAVICON_KEY: &str = "originalTabFavicon";

pub const DEFAULT_TAB_NAME: &str = "KittenGames";
pub const DEFAULT_TAB_ICON: &str = "/favicon.ico";
pub const DEFAULT_OVERLAY_HTML: &str = "📘 Study Notes";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";
pub const DEFAULT_TEXT_COLOR: &str = "#333333";

fn default_tab_name() -> String {
    DEFAULT_TAB_NAME.to_string()
}

fn default_tab_icon() -> String {
    DEFAULT_TAB_ICON.to_string()
}

fn default_background_color() -> String {
    DEFAULT_BACKGROUND_COLOR.to_string()
}

fn default_text_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

/**
    How an image overlay fits the window.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillMode {
    #[default]
    Contain,
    Cover,
    Fill,
    ScaleDown,
    None,
}

/**
    What the overlay shows. The `type` field selects the variant.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverlayBody {
    Html { html: String },
    Image { image: String },
}

/**
    Page shown over the tab while the overlay is triggered.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayContent {
    #[serde(flatten)]
    pub body: OverlayBody,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_text_color")]
    pub text_color: String,
    #[serde(default)]
    pub fill_mode: FillMode,
}

impl Default for OverlayContent {
    fn default() -> Self {
        Self {
            body: OverlayBody::Html {
                html: DEFAULT_OVERLAY_HTML.to_string(),
            },
            background_color: default_background_color(),
            text_color: default_text_color(),
            fill_mode: FillMode::default(),
        }
    }
}

/**
    Tab disguise preferences, shared by every tab of the origin.

    With `enabled` off the disguise is applied to the tab directly. With
    `enabled` on the tab keeps its own look and the disguise only appears
    together with the overlay.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloakSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_tab_name")]
    pub tab_name: String,
    #[serde(default = "default_tab_icon")]
    pub tab_icon: String,
    #[serde(default)]
    pub preset_name: String,
    #[serde(default)]
    pub overlay: OverlayContent,
}

impl Default for CloakSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            tab_name: default_tab_name(),
            tab_icon: default_tab_icon(),
            preset_name: String::new(),
            overlay: OverlayContent::default(),
        }
    }
}

impl CloakSettings {
    /**
        Load settings from `store`.

        Falls back to the individual legacy keys when the settings object is
        missing or unreadable, and to defaults for anything they lack.
    */
    pub fn load(store: &dyn KeyValueStore) -> Self {
        if let Some(settings) = read_json(store, CLOAK_SETTINGS_KEY) {
            return settings;
        }

        let non_empty = |key: &str| store.get(key).filter(|value| !value.is_empty());
        Self {
            enabled: store.get(LEGACY_OVERLAY_ENABLED_KEY).as_deref() == Some("true"),
            tab_name: non_empty(LEGACY_TAB_NAME_KEY).unwrap_or_else(default_tab_name),
            tab_icon: non_empty(LEGACY_TAB_ICON_KEY).unwrap_or_else(default_tab_icon),
            preset_name: store.get(LEGACY_PRESET_NAME_KEY).unwrap_or_default(),
            overlay: OverlayContent::default(),
        }
    }

    /**
        Write the settings object and the legacy keys.
    */
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        write_json(store, CLOAK_SETTINGS_KEY, self)?;
        store.set(LEGACY_PRESET_NAME_KEY, &self.preset_name)?;
        store.set(LEGACY_TAB_NAME_KEY, &self.tab_name)?;
        store.set(LEGACY_TAB_ICON_KEY, &self.tab_icon)?;
        store.set(
            LEGACY_OVERLAY_ENABLED_KEY,
            if self.enabled { "true" } else { "false" },
        )
    }

    /**
        Parse a raw stored value, as seen in a storage event.
    */
    pub fn from_stored(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("[cloak] Ignoring unreadable cloak settings: {e}");
                None
            }
        }
    }

    /**
        Shallow merge: every field set in `patch` replaces ours.
    */
    pub fn merged(&self, patch: CloakSettingsPatch) -> Self {
        Self {
            enabled: patch.enabled.unwrap_or(self.enabled),
            tab_name: patch.tab_name.unwrap_or_else(|| self.tab_name.clone()),
            tab_icon: patch.tab_icon.unwrap_or_else(|| self.tab_icon.clone()),
            preset_name: patch.preset_name.unwrap_or_else(|| self.preset_name.clone()),
            overlay: patch.overlay.unwrap_or_else(|| self.overlay.clone()),
        }
    }
}

/**
    Partial update for [`CloakSettings`].
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloakSettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayContent>,
}

impl From<CloakSettings> for CloakSettingsPatch {
    fn from(settings: CloakSettings) -> Self {
        Self {
            enabled: Some(settings.enabled),
            tab_name: Some(settings.tab_name),
            tab_icon: Some(settings.tab_icon),
            preset_name: Some(settings.preset_name),
            overlay: Some(settings.overlay),
        }
    }
}

/**
    The tab's own title and icon, captured once when the tab mounts.

    Also persisted, so a mount that finds the tab already disguised can
    still recover the real look.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginalTabState {
    pub title: String,
    pub favicon_href: String,
}

impl OriginalTabState {
    /**
        Load the snapshot an earlier mount persisted, if any.
    */
    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        let title = store.get(ORIGINAL_TITLE_KEY).filter(|t| !t.is_empty())?;
        let favicon_href = store
            .get(ORIGINAL_FAVICON_KEY)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_TAB_ICON.to_string());
        Some(Self {
            title,
            favicon_href,
        })
    }

    /**
        Snapshot the document, falling back to the persisted snapshot for
        anything the document cannot vouch for.

        A title or icon equal to the current disguise belongs to the
        disguise, not the tab. A missing icon link falls back to the
        persisted icon, then to the default one.
    */
    pub fn resolve(
        document: &dyn TabDocument,
        store: &dyn KeyValueStore,
        disguise: &CloakSettings,
    ) -> Self {
        let persisted = Self::load(store);
        let disguised = |value: &str, shown: &str| !shown.is_empty() && value == shown;

        let title = document.title();
        let title = match &persisted {
            Some(p) if title.is_empty() || disguised(&title, &disguise.tab_name) => p.title.clone(),
            _ => title,
        };
        let favicon_href = document
            .favicon_href()
            .filter(|href| !(persisted.is_some() && disguised(href, &disguise.tab_icon)))
            .or_else(|| persisted.map(|p| p.favicon_href))
            .unwrap_or_else(|| DEFAULT_TAB_ICON.to_string());

        Self {
            title,
            favicon_href,
        }
    }

    /**
        Persist the snapshot. Keys already holding the same value are left
        alone so other tabs see no storage events.
    */
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        for (key, value) in [
            (ORIGINAL_TITLE_KEY, &self.title),
            (ORIGINAL_FAVICON_KEY, &self.favicon_href),
        ] {
            if store.get(key).as_deref() != Some(value.as_str()) {
                store.set(key, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HeadlessDocument;
    use kitten_types::MemoryStore;

    #[test]
    fn defaults_match_stored_shape() {
        let json = serde_json::to_value(CloakSettings::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "enabled": false,
                "tabName": "KittenGames",
                "tabIcon": "/favicon.ico",
                "presetName": "",
                "overlay": {
                    "type": "html",
                    "html": "📘 Study Notes",
                    "backgroundColor": "#ffffff",
                    "textColor": "#333333",
                    "fillMode": "contain"
                }
            })
        );
    }

    #[test]
    fn image_overlay_parses() {
        let overlay: OverlayContent = serde_json::from_str(
            r#"{"type":"image","image":"/shot.png","fillMode":"scale-down"}"#,
        )
        .unwrap();
        assert_eq!(
            overlay.body,
            OverlayBody::Image {
                image: "/shot.png".into()
            }
        );
        assert_eq!(overlay.fill_mode, FillMode::ScaleDown);
        assert_eq!(overlay.background_color, DEFAULT_BACKGROUND_COLOR);
    }

    #[test]
    fn save_writes_legacy_keys() {
        let store = MemoryStore::new();
        let settings = CloakSettings {
            enabled: true,
            tab_name: "Classes".into(),
            tab_icon: "https://example.test/c.png".into(),
            preset_name: "Google Classroom".into(),
            ..CloakSettings::default()
        };
        settings.save(&store).unwrap();

        assert_eq!(store.get(LEGACY_OVERLAY_ENABLED_KEY).as_deref(), Some("true"));
        assert_eq!(store.get(LEGACY_TAB_NAME_KEY).as_deref(), Some("Classes"));
        assert_eq!(
            store.get(LEGACY_PRESET_NAME_KEY).as_deref(),
            Some("Google Classroom")
        );
        assert_eq!(CloakSettings::load(&store), settings);
    }

    #[test]
    fn malformed_settings_fall_back_to_legacy_keys() {
        let store = MemoryStore::new();
        store.set(CLOAK_SETTINGS_KEY, "{broken").unwrap();
        store.set(LEGACY_TAB_NAME_KEY, "Dashboard").unwrap();
        store.set(LEGACY_TAB_ICON_KEY, "").unwrap();
        store.set(LEGACY_OVERLAY_ENABLED_KEY, "true").unwrap();

        let settings = CloakSettings::load(&store);
        assert!(settings.enabled);
        assert_eq!(settings.tab_name, "Dashboard");
        assert_eq!(settings.tab_icon, DEFAULT_TAB_ICON);
        assert_eq!(settings.preset_name, "");
    }

    #[test]
    fn empty_store_loads_defaults() {
        assert_eq!(CloakSettings::load(&MemoryStore::new()), CloakSettings::default());
    }

    #[test]
    fn snapshot_prefers_persisted_look_over_disguise() {
        let store = MemoryStore::new();
        OriginalTabState {
            title: "KittenMovies".into(),
            favicon_href: "/kitten.ico".into(),
        }
        .save(&store)
        .unwrap();
        let disguise = CloakSettings {
            tab_name: "Classes".into(),
            tab_icon: "/classroom.png".into(),
            ..CloakSettings::default()
        };

        let disguised = HeadlessDocument::new("Classes", Some("/classroom.png"));
        assert_eq!(
            OriginalTabState::resolve(&disguised, &store, &disguise),
            OriginalTabState::load(&store).unwrap()
        );

        let own = HeadlessDocument::new("Trending", Some("/other.ico"));
        let snapshot = OriginalTabState::resolve(&own, &store, &disguise);
        assert_eq!(snapshot.title, "Trending");
        assert_eq!(snapshot.favicon_href, "/other.ico");
    }

    #[test]
    fn missing_icon_falls_back_to_persisted_then_default() {
        let store = MemoryStore::new();
        let bare = HeadlessDocument::new("Home", None);
        let settings = CloakSettings::default();
        assert_eq!(
            OriginalTabState::resolve(&bare, &store, &settings).favicon_href,
            DEFAULT_TAB_ICON
        );

        store.set(ORIGINAL_TITLE_KEY, "Home").unwrap();
        store.set(ORIGINAL_FAVICON_KEY, "/kitten.ico").unwrap();
        assert_eq!(
            OriginalTabState::resolve(&bare, &store, &settings).favicon_href,
            "/kitten.ico"
        );
    }

    #[test]
    fn empty_persisted_title_is_no_snapshot() {
        let store = MemoryStore::new();
        store.set(ORIGINAL_TITLE_KEY, "").unwrap();
        assert_eq!(OriginalTabState::load(&store), None);
    }

    #[test]
    fn merge_is_shallow() {
        let base = CloakSettings::default();
        let merged = base.merged(CloakSettingsPatch {
            tab_name: Some("Inbox".into()),
            ..Default::default()
        });
        assert_eq!(merged.tab_name, "Inbox");
        assert_eq!(merged.tab_icon, base.tab_icon);
        assert_eq!(merged.overlay, base.overlay);
    }
}
