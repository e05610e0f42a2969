/**
    What the runtime environment can be trusted to do with embeds.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether framed third-party players load reliably. When false the
    /// player opens sources in a new top-level context instead.
    pub framed_embeds_reliable: bool,
}

impl Capabilities {
    /**
        Capabilities of a runtime with no known embed problems.
    */
    pub fn full() -> Self {
        Self {
            framed_embeds_reliable: true,
        }
    }

    /**
        Derive capabilities from a user agent string.

        WebKit-only Safari breaks framed players that navigate the top
        context, so it is detected by its signature: a Safari token without
        any Chromium or Android token.
    */
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let webkit_safari = ua.contains("safari")
            && !["chrome", "crios", "android"]
                .iter()
                .any(|token| ua.contains(token));
        Self {
            framed_embeds_reliable: !webkit_safari,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}
