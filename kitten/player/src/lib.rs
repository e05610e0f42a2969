/*!
    Streaming player resilience.

    Plays a [`PlaybackTarget`](kitten_types::PlaybackTarget) through
    third-party embed mirrors, rotating between them and escalating to
    recovery actions when loads fail.

    # Decision layer

    - [`PlayerController`] - Pure state machine returning [`PlayerEffect`]s
    - [`HistoryGuard`] - Single back-navigation guard with expiry

    # Execution

    - [`PlayerSession`] - Applies effects to a [`PlayerHost`] with tokio timers

    # Configuration

    - [`DomainList`] and [`DomainProvider`] - Mirror list and embed URLs
    - [`StreamingSettings`] - Persisted mirror choice and auto-switch flag
    - [`Capabilities`] - Whether framed embeds can be trusted

    # Library

    - [`Favorites`], [`WatchHistory`] and [`Watchlist`]
*/

mod capability;
mod controller;
mod domains;
mod effect;
mod guard;
mod library;
mod session;
mod settings;

pub use capability::Capabilities;
pub use controller::{
    FailureCause, HARD_ERROR_THRESHOLD, HISTORY_GUARD_DURATION, INITIAL_LOAD_TIMEOUT, Phase,
    PlayerController, REMOUNT_DELAY, RETRY_LOAD_TIMEOUT, RecoveryAction,
    SWITCHING_INDICATOR_DURATION,
};
pub use domains::{DomainId, DomainList, DomainProvider, StreamingDomain};
pub use effect::{PlayerEffect, TimerKind};
pub use guard::HistoryGuard;
pub use library::{
    FAVORITES_KEY, Favorites, MediaRef, ProgressUpdate, WATCH_HISTORY_KEY, WATCHLIST_KEY,
    WatchHistory, WatchProgress, Watchlist, WatchlistEntry,
};
pub use session::{PlayerHost, PlayerSession};
pub use settings::{STREAMING_SETTINGS_KEY, StreamingSettings};
