/*!
    Tab cloaking with cross-tab synchronization.

    A cloak disguises the tab's title and icon, either permanently or only
    while an overlay page covers the tab after the pointer leaves the window.
    Every tab of an origin converges on the last settings written.

    # Service

    - [`CloakService`] - Per-tab service driving a [`TabDocument`]
    - [`CloakState`] - Pure state machine returning [`CloakEffect`]s

    # Settings

    - [`CloakSettings`] and [`CloakSettingsPatch`] - Persisted preferences
    - [`OverlayContent`] - HTML or image overlay page
    - [`OriginalTabState`] - The tab's own look, captured at mount

    # Synchronization

    - [`CloakTransport`] - One way of reaching the other tabs
    - [`BroadcastTransport`] and [`StorageTransport`]
    - [`CloakMessage`] - What travels between tabs

    # Presets

    - [`PresetCatalog`] and [`OverlayCatalog`]
*/

mod document;
mod presets;
mod service;
mod settings;
mod state;
mod transport;

pub use document::{HeadlessDocument, TabDocument};
pub use presets::{
    CUSTOM_PRESET, CloakPreset, OverlayCatalog, OverlayPreset, PresetCatalog, PresetSelection,
};
pub use service::CloakService;
pub use settings::{
    CLOAK_SETTINGS_KEY, CloakSettings, CloakSettingsPatch, FillMode, OriginalTabState,
    OverlayBody, OverlayContent,
};
pub use state::{CloakEffect, CloakState};
pub use transport::{
    BroadcastTransport, CLOAK_CHANNEL, CloakMessage, CloakTransport, OVERLAY_VISIBLE_KEY,
    StorageTransport,
};
