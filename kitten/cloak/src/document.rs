use crate::settings::OverlayContent;

/**
    The parts of a tab's document the cloak touches.
*/
pub trait TabDocument: Send {
    fn title(&self) -> String;
    fn set_title(&mut self, title: &str);

    /// Current icon link target, `None` when the document has no icon link.
    fn favicon_href(&self) -> Option<String>;
    /// Point the icon link at `href`, creating the link if needed.
    fn set_favicon(&mut self, href: &str);

    fn show_overlay(&mut self, overlay: &OverlayContent);
    fn hide_overlay(&mut self);

    /// Install or remove the pointer-out and click listeners.
    fn set_pointer_listeners(&mut self, installed: bool);
}

/**
    In-memory document, for tests and non-browser hosts.
*/
#[derive(Clone, Debug, Default)]
pub struct HeadlessDocument {
    title: String,
    favicon: Option<String>,
    overlay: Option<OverlayContent>,
    listeners: bool,
}

impl HeadlessDocument {
    pub fn new(title: impl Into<String>, favicon: Option<&str>) -> Self {
        Self {
            title: title.into(),
            favicon: favicon.map(str::to_string),
            overlay: None,
            listeners: false,
        }
    }

    pub fn overlay(&self) -> Option<&OverlayContent> {
        self.overlay.as_ref()
    }

    pub fn has_pointer_listeners(&self) -> bool {
        self.listeners
    }
}

impl TabDocument for HeadlessDocument {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn favicon_href(&self) -> Option<String> {
        self.favicon.clone()
    }

    fn set_favicon(&mut self, href: &str) {
        self.favicon = Some(href.to_string());
    }

    fn show_overlay(&mut self, overlay: &OverlayContent) {
        self.overlay = Some(overlay.clone());
    }

    fn hide_overlay(&mut self) {
        self.overlay = None;
    }

    fn set_pointer_listeners(&mut self, installed: bool) {
        self.listeners = installed;
    }
}
