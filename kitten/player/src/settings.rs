use kitten_types::{KeyValueStore, Result, read_json, write_json};
use serde::{Deserialize, Serialize};

use crate::domains::{DomainId, DomainProvider};

/// Storage key of the persisted streaming preferences.
pub const STREAMING_SETTINGS_KEY: &str = "streamingSettings";

fn default_auto_switch() -> bool {
    true
}

/**
    Persisted streaming preferences.

    `selected_domain` always names a configured domain once loaded through
    [`StreamingSettings::load`].
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingSettings {
    pub selected_domain: DomainId,
    #[serde(default = "default_auto_switch")]
    pub auto_switch: bool,
}

impl StreamingSettings {
    /**
        First configured domain, automatic switching on.
    */
    pub fn defaults(provider: &dyn DomainProvider) -> Self {
        Self {
            selected_domain: provider.resolve(&DomainId::new("")),
            auto_switch: default_auto_switch(),
        }
    }

    /**
        Load settings, falling back to defaults when nothing usable is stored.
    */
    pub fn load(store: &dyn KeyValueStore, provider: &dyn DomainProvider) -> Self {
        match read_json::<Self>(store, STREAMING_SETTINGS_KEY) {
            Some(stored) => Self {
                selected_domain: provider.resolve(&stored.selected_domain),
                auto_switch: stored.auto_switch,
            },
            None => Self::defaults(provider),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        write_json(store, STREAMING_SETTINGS_KEY, self)
    }

    /**
        Copy of these settings with the next domain in rotation selected.
    */
    pub fn with_next_domain(&self, provider: &dyn DomainProvider) -> Self {
        Self {
            selected_domain: provider.next_after(&self.selected_domain),
            auto_switch: self.auto_switch,
        }
    }
}
