/*!
    Cross-tab delivery of cloak messages.

    Two transports carry the same messages. The broadcast channel is fast but
    not available everywhere; storage-mutation events always are. Receivers
    see most messages twice and rely on applying them being idempotent.
*/

use kitten_types::{BroadcastChannel, KeyValueStore, Result, StorageEvents, TabContext};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::settings::{CLOAK_SETTINGS_KEY, CloakSettings};

/// Name of the same-origin broadcast channel.
pub const CLOAK_CHANNEL: &str = "cloak-sync";

/// Storage key mirroring overlay visibility for the storage transport.
pub const OVERLAY_VISIBLE_KEY: &str = "cloakOverlayVisible";

/**
    Message exchanged between tabs of the same origin.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CloakMessage {
    #[serde(rename = "CLOAK_UPDATE")]
    CloakUpdate { settings: CloakSettings },
    #[serde(rename = "OVERLAY_VISIBILITY")]
    OverlayVisibility { visible: bool },
}

/**
    One way of reaching the other tabs.
*/
pub trait CloakTransport: Send {
    fn name(&self) -> &'static str;

    /// Send a message to every other tab.
    fn publish(&mut self, message: &CloakMessage) -> Result<()>;

    /// Take the next inbound message, if any is waiting.
    fn poll(&mut self) -> Option<CloakMessage>;

    /// Stop delivering. Further polls return `None`.
    fn close(&mut self);
}

/**
    Transport over the named broadcast channel.
*/
pub struct BroadcastTransport {
    channel: Option<BroadcastChannel>,
}

impl BroadcastTransport {
    /**
        Open the channel, or `None` if the runtime has no broadcast support.
    */
    pub fn open(tab: &TabContext) -> Option<Self> {
        let channel = tab.broadcast_channel(CLOAK_CHANNEL)?;
        Some(Self {
            channel: Some(channel),
        })
    }
}

impl CloakTransport for BroadcastTransport {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn publish(&mut self, message: &CloakMessage) -> Result<()> {
        match &self.channel {
            Some(channel) => channel.post(message),
            None => Ok(()),
        }
    }

    fn poll(&mut self) -> Option<CloakMessage> {
        self.channel.as_mut()?.try_recv()
    }

    fn close(&mut self) {
        self.channel = None;
    }
}

/**
    Transport over storage-mutation events.

    Settings travel through the persisted settings key itself, so publishing
    an update writes nothing extra. Overlay visibility is mirrored under its
    own key.
*/
pub struct StorageTransport {
    tab: TabContext,
    events: Option<StorageEvents>,
}

impl StorageTransport {
    pub fn open(tab: &TabContext) -> Self {
        Self {
            tab: tab.clone(),
            events: Some(tab.storage_events()),
        }
    }
}

impl CloakTransport for StorageTransport {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn publish(&mut self, message: &CloakMessage) -> Result<()> {
        match message {
            CloakMessage::CloakUpdate { .. } => Ok(()),
            CloakMessage::OverlayVisibility { visible } => self.tab.set(
                OVERLAY_VISIBLE_KEY,
                if *visible { "true" } else { "false" },
            ),
        }
    }

    fn poll(&mut self) -> Option<CloakMessage> {
        let events = self.events.as_mut()?;
        while let Some(event) = events.try_recv() {
            let Some(value) = event.new_value else {
                continue;
            };
            match event.key.as_str() {
                CLOAK_SETTINGS_KEY => {
                    if let Some(settings) = CloakSettings::from_stored(&value) {
                        return Some(CloakMessage::CloakUpdate { settings });
                    }
                }
                OVERLAY_VISIBLE_KEY => {
                    return Some(CloakMessage::OverlayVisibility {
                        visible: value == "true",
                    });
                }
                other => debug!("[cloak] Ignoring storage event for {other}"),
            }
        }
        None
    }

    fn close(&mut self) {
        self.events = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kitten_types::{MemoryStore, Origin};

    use super::*;

    static_assertions::assert_impl_all!(BroadcastTransport: Send, CloakTransport);
    static_assertions::assert_impl_all!(StorageTransport: Send, CloakTransport);

    #[test]
    fn message_wire_format() {
        let message = CloakMessage::OverlayVisibility { visible: true };
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"type":"OVERLAY_VISIBILITY","visible":true}"#
        );

        let update: CloakMessage = serde_json::from_value(serde_json::json!({
            "type": "CLOAK_UPDATE",
            "settings": { "enabled": true, "tabName": "Classes" }
        }))
        .unwrap();
        let CloakMessage::CloakUpdate { settings } = update else {
            panic!("expected an update");
        };
        assert!(settings.enabled);
        assert_eq!(settings.tab_name, "Classes");
    }

    #[test]
    fn broadcast_reaches_other_tabs_only() {
        let origin = Origin::new(Arc::new(MemoryStore::new()));
        let mut a = BroadcastTransport::open(&origin.open_tab()).unwrap();
        let mut b = BroadcastTransport::open(&origin.open_tab()).unwrap();

        let message = CloakMessage::OverlayVisibility { visible: true };
        a.publish(&message).unwrap();
        assert_eq!(a.poll(), None);
        assert_eq!(b.poll(), Some(message));

        b.close();
        a.publish(&CloakMessage::OverlayVisibility { visible: false })
            .unwrap();
        assert_eq!(b.poll(), None);
    }

    #[test]
    fn broadcast_missing_without_support() {
        let origin = Origin::without_broadcast(Arc::new(MemoryStore::new()));
        assert!(BroadcastTransport::open(&origin.open_tab()).is_none());
    }

    #[test]
    fn storage_events_become_messages() {
        let origin = Origin::without_broadcast(Arc::new(MemoryStore::new()));
        let tab_a = origin.open_tab();
        let tab_b = origin.open_tab();
        let mut a = StorageTransport::open(&tab_a);
        let mut b = StorageTransport::open(&tab_b);

        tab_a.set("unrelated", "1").unwrap();
        tab_a.set(CLOAK_SETTINGS_KEY, "{oops").unwrap();
        let settings = CloakSettings {
            tab_name: "Inbox".into(),
            ..CloakSettings::default()
        };
        settings.save(&tab_a).unwrap();
        a.publish(&CloakMessage::OverlayVisibility { visible: true })
            .unwrap();

        assert_eq!(b.poll(), Some(CloakMessage::CloakUpdate { settings }));
        assert_eq!(
            b.poll(),
            Some(CloakMessage::OverlayVisibility { visible: true })
        );
        assert_eq!(b.poll(), None);
        assert_eq!(a.poll(), None);
    }
}
