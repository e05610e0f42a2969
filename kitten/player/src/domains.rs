/*!
    Streaming mirror configuration.
*/

use std::fmt;
use std::path::Path;

use include_dir::{Dir, include_dir};
use kitten_types::{Error, MediaType, PlaybackTarget, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static DATA: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/data");

const PLACEHOLDERS: &[&str] = &["id", "season", "episode"];

/**
    Identifier of one mirror provider.
*/
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/**
    Source of mirror ids and embed URLs.

    Implementations must expose at least one domain. The provided methods
    encode the fallback and rotation rules every caller relies on.
*/
pub trait DomainProvider: Send + Sync {
    /// All configured mirrors, in rotation order.
    fn domains(&self) -> Vec<DomainId>;

    /// Build the embed URL for `target` on `domain`.
    fn embed_url(&self, target: &PlaybackTarget, domain: &DomainId) -> String;

    /**
        Resolve `id` to a configured domain, falling back to the first one.
    */
    fn resolve(&self, id: &DomainId) -> DomainId {
        let domains = self.domains();
        if domains.contains(id) {
            return id.clone();
        }
        domains.into_iter().next().unwrap_or_else(|| id.clone())
    }

    /**
        Domain that follows `id` in rotation order, wrapping around.
        Unknown ids rotate as if they were the first domain.
    */
    fn next_after(&self, id: &DomainId) -> DomainId {
        let domains = self.domains();
        if domains.is_empty() {
            return id.clone();
        }
        let current = domains.iter().position(|d| d == id).unwrap_or(0);
        domains[(current + 1) % domains.len()].clone()
    }
}

/**
    One mirror and its URL templates.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingDomain {
    pub id: DomainId,
    pub name: String,
    /// Template for movies
    pub movie: String,
    /// Template for TV episodes
    pub tv: String,
}

#[derive(Deserialize)]
struct DomainFile {
    domains: Vec<StreamingDomain>,
}

/**
    Validated, non-empty list of mirrors.
*/
#[derive(Clone, Debug)]
pub struct DomainList {
    domains: Vec<StreamingDomain>,
    placeholder: Regex,
}

impl DomainList {
    /**
        Build a list, rejecting empty lists, duplicate ids and templates
        with unknown placeholders or without `{id}`.
    */
    pub fn new(domains: Vec<StreamingDomain>) -> Result<Self> {
        if domains.is_empty() {
            return Err(Error::config("no streaming domains configured"));
        }

        let placeholder = Regex::new(r"\{([^{}]*)\}")
            .map_err(|e| Error::config(format!("placeholder pattern: {e}")))?;

        for (index, domain) in domains.iter().enumerate() {
            if domains[..index].iter().any(|d| d.id == domain.id) {
                return Err(Error::config(format!("duplicate domain id '{}'", domain.id)));
            }
            for template in [&domain.movie, &domain.tv] {
                if !template.contains("{id}") {
                    return Err(Error::config(format!(
                        "template for '{}' is missing {{id}}: {template}",
                        domain.id
                    )));
                }
                for capture in placeholder.captures_iter(template) {
                    let name = &capture[1];
                    if !PLACEHOLDERS.contains(&name) {
                        return Err(Error::config(format!(
                            "unknown placeholder {{{name}}} in template for '{}'",
                            domain.id
                        )));
                    }
                }
            }
        }

        Ok(Self {
            domains,
            placeholder,
        })
    }

    /**
        Parse a YAML document with a top-level `domains` list.
    */
    pub fn from_yaml(source: &str) -> Result<Self> {
        let file: DomainFile = serde_yaml::from_str(source)
            .map_err(|e| Error::config(format!("failed to parse domain list: {e}")))?;
        Self::new(file.domains)
    }

    /**
        Load a YAML domain list from disk.
    */
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml(&source)
    }

    /**
        The mirror list bundled with the crate.
    */
    pub fn builtin() -> Result<Self> {
        let source = DATA
            .get_file("domains.yaml")
            .and_then(|file| file.contents_utf8())
            .ok_or_else(|| Error::config("bundled domains.yaml is missing"))?;
        Self::from_yaml(source)
    }

    pub fn entries(&self) -> &[StreamingDomain] {
        &self.domains
    }

    /**
        Get a domain by id, falling back to the first entry.
    */
    pub fn entry(&self, id: &DomainId) -> &StreamingDomain {
        self.domains
            .iter()
            .find(|d| &d.id == id)
            .unwrap_or(&self.domains[0])
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl DomainProvider for DomainList {
    fn domains(&self) -> Vec<DomainId> {
        self.domains.iter().map(|d| d.id.clone()).collect()
    }

    fn embed_url(&self, target: &PlaybackTarget, domain: &DomainId) -> String {
        let entry = self.entry(domain);
        let template = match target.media_type {
            MediaType::Movie => &entry.movie,
            MediaType::Tv => &entry.tv,
        };
        // Substituted text is never re-scanned for placeholders
        self.placeholder
            .replace_all(template, |caps: &Captures| match &caps[1] {
                "id" => urlencoding::encode(&target.external_id).into_owned(),
                "season" => target.season_or_first().to_string(),
                "episode" => target.episode_or_first().to_string(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}
