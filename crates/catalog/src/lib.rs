//! Playlist catalog, vibe tables, and the deterministic brief-to-playlist
//! machinery: daypart generation, playlist matching, and the designer brief.

pub mod dayparts;
pub mod designer;
pub mod matcher;
pub mod pipeline;
pub mod playlists;
pub mod vibes;

pub use playlists::{Catalog, Playlist};
