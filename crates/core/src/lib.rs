pub mod config;
pub mod model;
pub mod urls;

pub use config::{AppConfig, HttpConfig, NotificationConfig, PlaybackConfig};
pub use model::{filter_tracks, Playlist, QueueMode, Track, TrackId, User};
