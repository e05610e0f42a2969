/*!
    Media identification types.
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/**
    Kind of media a metadata id refers to.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// A feature film
    Movie,
    /// A TV show, played per episode
    Tv,
}

impl MediaType {
    /**
        Get the lowercase name used in URLs and stored JSON.
    */
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }

    /**
        Parse a lowercase media type name.
    */
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "tv" => Some(Self::Tv),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/**
    What a player session should play.

    Derived from route parameters, never persisted. Season and episode only
    carry meaning for [`MediaType::Tv`].
*/
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackTarget {
    pub media_type: MediaType,
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

impl PlaybackTarget {
    /**
        Target a movie by its metadata id.
    */
    pub fn movie(external_id: impl Into<String>) -> Self {
        Self {
            media_type: MediaType::Movie,
            external_id: external_id.into(),
            season: None,
            episode: None,
        }
    }

    /**
        Target a single episode of a TV show.
    */
    pub fn episode(external_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            media_type: MediaType::Tv,
            external_id: external_id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    /**
        Season to play, defaulting to the first one for shows.
    */
    pub fn season_or_first(&self) -> u32 {
        self.season.unwrap_or(1)
    }

    /**
        Episode to play, defaulting to the first one for shows.
    */
    pub fn episode_or_first(&self) -> u32 {
        self.episode.unwrap_or(1)
    }
}
