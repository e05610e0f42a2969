/*!
    Disguise and overlay preset catalogs.
*/

use include_dir::{Dir, include_dir};
use kitten_types::{Error, KeyValueStore, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::settings::{
    CloakSettingsPatch, LEGACY_PRESET_NAME_KEY, LEGACY_TAB_ICON_KEY, LEGACY_TAB_NAME_KEY,
    OverlayBody, OverlayContent,
};

static DATA: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/data");

/// Name of the preset whose title and icon the user types in.
pub const CUSTOM_PRESET: &str = "Custom";

/**
    A named tab disguise.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloakPreset {
    pub name: String,
    pub tab_name: String,
    pub tab_icon: String,
}

impl CloakPreset {
    fn custom() -> Self {
        Self {
            name: CUSTOM_PRESET.to_string(),
            tab_name: String::new(),
            tab_icon: String::new(),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_PRESET
    }
}

/**
    A named overlay page.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPreset {
    pub name: String,
    #[serde(flatten)]
    pub content: OverlayContent,
}

#[derive(Deserialize)]
struct PresetFile {
    presets: Vec<CloakPreset>,
}

#[derive(Deserialize)]
struct OverlayFile {
    overlays: Vec<OverlayPreset>,
}

fn bundled(name: &str) -> Result<&'static str> {
    DATA.get_file(name)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| Error::config(format!("bundled {name} is missing")))
}

/**
    Tab disguise presets. Always contains the custom preset.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetCatalog {
    presets: Vec<CloakPreset>,
}

impl PresetCatalog {
    pub fn new(mut presets: Vec<CloakPreset>) -> Self {
        if !presets.iter().any(CloakPreset::is_custom) {
            presets.push(CloakPreset::custom());
        }
        Self { presets }
    }

    pub fn from_yaml(source: &str) -> Result<Self> {
        let file: PresetFile = serde_yaml::from_str(source)
            .map_err(|e| Error::config(format!("failed to parse presets: {e}")))?;
        Ok(Self::new(file.presets))
    }

    /**
        Catalog used when no other one can be loaded.
    */
    pub fn fallback() -> Self {
        Self::new(vec![CloakPreset {
            name: "Google Drive".to_string(),
            tab_name: "My Drive - Google Drive".to_string(),
            tab_icon: "https://ssl.gstatic.com/images/branding/product/1x/drive_2020q4_32dp.png"
                .to_string(),
        }])
    }

    /**
        The bundled catalog, or the fallback if it cannot be read.
    */
    pub fn builtin() -> Self {
        match bundled("presets.yaml").and_then(Self::from_yaml) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("[cloak] Using fallback presets: {e}");
                Self::fallback()
            }
        }
    }

    pub fn presets(&self) -> &[CloakPreset] {
        &self.presets
    }

    pub fn find(&self, name: &str) -> Option<&CloakPreset> {
        self.presets.iter().find(|preset| preset.name == name)
    }

    /**
        Work out which preset a settings form should show as selected,
        from the legacy keys the last save wrote.

        A saved preset name wins. Without one, a saved custom title and
        icon select the custom preset. Otherwise the first preset is used.
    */
    pub fn resolve_saved(&self, store: &dyn KeyValueStore) -> PresetSelection {
        let saved_name = store
            .get(LEGACY_PRESET_NAME_KEY)
            .filter(|name| !name.is_empty());
        let saved_title = store.get(LEGACY_TAB_NAME_KEY).filter(|v| !v.is_empty());
        let saved_icon = store.get(LEGACY_TAB_ICON_KEY).filter(|v| !v.is_empty());

        let custom = self.find(CUSTOM_PRESET);
        let preset = match &saved_name {
            Some(name) => self.find(name),
            None if saved_title.is_some() && saved_icon.is_some() => custom,
            None => None,
        }
        .or_else(|| self.presets.first())
        .cloned()
        .unwrap_or_else(CloakPreset::custom);

        if preset.is_custom() {
            PresetSelection {
                tab_name: saved_title.unwrap_or(preset.tab_name),
                tab_icon: saved_icon.unwrap_or(preset.tab_icon),
                preset_name: preset.name,
            }
        } else {
            PresetSelection {
                preset_name: preset.name,
                tab_name: preset.tab_name,
                tab_icon: preset.tab_icon,
            }
        }
    }
}

/**
    What a settings form submits for the chosen preset.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetSelection {
    pub preset_name: String,
    pub tab_name: String,
    pub tab_icon: String,
}

impl PresetSelection {
    /**
        Build the settings update for this selection.
    */
    pub fn into_patch(self, enabled: bool, overlay: Option<OverlayContent>) -> CloakSettingsPatch {
        CloakSettingsPatch {
            enabled: Some(enabled),
            tab_name: Some(self.tab_name),
            tab_icon: Some(self.tab_icon),
            preset_name: Some(self.preset_name),
            overlay,
        }
    }
}

/**
    Overlay page presets. Never empty.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayCatalog {
    overlays: Vec<OverlayPreset>,
}

impl OverlayCatalog {
    pub fn from_yaml(source: &str) -> Result<Self> {
        let file: OverlayFile = serde_yaml::from_str(source)
            .map_err(|e| Error::config(format!("failed to parse overlays: {e}")))?;
        if file.overlays.is_empty() {
            return Err(Error::config("overlay catalog is empty"));
        }
        Ok(Self {
            overlays: file.overlays,
        })
    }

    pub fn fallback() -> Self {
        Self {
            overlays: vec![OverlayPreset {
                name: "Study Notes (HTML)".to_string(),
                content: OverlayContent {
                    body: OverlayBody::Html {
                        html: r#"<div style="text-align:center"><h1>📘 Study Notes</h1><p>Welcome back!</p></div>"#
                            .to_string(),
                    },
                    ..OverlayContent::default()
                },
            }],
        }
    }

    pub fn builtin() -> Self {
        match bundled("overlays.yaml").and_then(Self::from_yaml) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("[cloak] Using fallback overlays: {e}");
                Self::fallback()
            }
        }
    }

    pub fn overlays(&self) -> &[OverlayPreset] {
        &self.overlays
    }

    /**
        Find an overlay by name, falling back to the first one.
    */
    pub fn find_or_first(&self, name: &str) -> &OverlayPreset {
        self.overlays
            .iter()
            .find(|overlay| overlay.name == name)
            .unwrap_or(&self.overlays[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::FillMode;
    use kitten_types::MemoryStore;

    #[test]
    fn bundled_catalogs_parse() {
        let presets = PresetCatalog::from_yaml(bundled("presets.yaml").unwrap()).unwrap();
        assert!(presets.find(CUSTOM_PRESET).is_some());
        assert_eq!(presets.presets()[0].name, "Google Drive");

        let overlays = OverlayCatalog::from_yaml(bundled("overlays.yaml").unwrap()).unwrap();
        let shot = overlays.find_or_first("Drive Screenshot");
        assert!(matches!(shot.content.body, OverlayBody::Image { .. }));
        assert_eq!(shot.content.fill_mode, FillMode::Cover);
    }

    #[test]
    fn custom_preset_is_always_present() {
        let catalog = PresetCatalog::from_yaml(
            "presets:\n  - { name: Docs, tabName: Docs, tabIcon: /d.ico }\n",
        )
        .unwrap();
        assert_eq!(catalog.presets().len(), 2);
        assert!(catalog.presets()[1].is_custom());

        assert!(PresetCatalog::fallback().find(CUSTOM_PRESET).is_some());
    }

    #[test]
    fn broken_overlays_fall_back() {
        assert!(OverlayCatalog::from_yaml("overlays: []").is_err());
        assert_eq!(
            OverlayCatalog::fallback().find_or_first("anything").name,
            "Study Notes (HTML)"
        );
    }

    #[test]
    fn saved_preset_name_wins() {
        let store = MemoryStore::new();
        store.set(LEGACY_PRESET_NAME_KEY, "Google Drive").unwrap();
        store.set(LEGACY_TAB_NAME_KEY, "Stale").unwrap();

        let selection = PresetCatalog::fallback().resolve_saved(&store);
        assert_eq!(selection.preset_name, "Google Drive");
        assert_eq!(selection.tab_name, "My Drive - Google Drive");
    }

    #[test]
    fn saved_custom_values_select_custom() {
        let store = MemoryStore::new();
        store.set(LEGACY_TAB_NAME_KEY, "Homework").unwrap();
        store.set(LEGACY_TAB_ICON_KEY, "/hw.png").unwrap();

        let selection = PresetCatalog::fallback().resolve_saved(&store);
        assert_eq!(
            selection,
            PresetSelection {
                preset_name: CUSTOM_PRESET.into(),
                tab_name: "Homework".into(),
                tab_icon: "/hw.png".into(),
            }
        );

        let patch = selection.into_patch(true, None);
        assert_eq!(patch.enabled, Some(true));
        assert_eq!(patch.preset_name.as_deref(), Some(CUSTOM_PRESET));
        assert_eq!(patch.overlay, None);
    }

    #[test]
    fn nothing_saved_selects_first_preset() {
        let selection = PresetCatalog::fallback().resolve_saved(&MemoryStore::new());
        assert_eq!(selection.preset_name, "Google Drive");
    }
}
