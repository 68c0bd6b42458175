use echoplay_engine::{Command, CoordinatorClosed, CoordinatorHandle, Snapshot};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

mod art;
mod presenter;

pub use art::{ArtSource, HttpArtSource};
pub use presenter::{run_presenter, ConsolePresenter, Presenter};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlayPauseIcon {
    Play,
    Pause,
}

/// Buttons on the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationButton {
    PlayPause,
    Next,
    Previous,
}

impl NotificationButton {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "playpause" | "toggle" => Some(Self::PlayPause),
            "next" => Some(Self::Next),
            "prev" | "previous" => Some(Self::Previous),
            _ => None,
        }
    }

    /// Previous and next are dead outside playlist-like modes.
    pub fn command(self, snapshot: &Snapshot) -> Option<Command> {
        let transport = snapshot.mode.map(|m| m.is_multi_track()).unwrap_or(false);
        match self {
            Self::PlayPause => Some(Command::PlayPause),
            Self::Next if transport => Some(Command::Next),
            Self::Previous if transport => Some(Command::Previous),
            _ => None,
        }
    }
}

/// Forwards a button tap to the coordinator. Returns whether it was acted on.
pub async fn press(
    handle: &CoordinatorHandle,
    button: NotificationButton,
) -> Result<bool, CoordinatorClosed> {
    match button.command(&handle.snapshot()) {
        Some(command) => {
            handle.dispatch(command).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub title: String,
    pub subtitle: String,
    pub is_playing: bool,
    pub ongoing: bool,
    pub icon: PlayPauseIcon,
    /// Previous/next only act in playlist-like modes.
    pub transport_enabled: bool,
    pub art_url: Option<String>,
    #[serde(skip)]
    pub art: Option<Arc<Vec<u8>>>,
}

#[derive(Debug, Clone)]
pub enum NotifyAction {
    /// First time something plays: promote to a foreground notification.
    Start(NotificationView),
    Update(NotificationView),
    Dismiss,
    None,
}

#[derive(Debug, Clone)]
pub struct NotifyOutput {
    pub action: NotifyAction,
    /// Cover to fetch in the background; playback never waits on it.
    pub fetch_art: Option<String>,
}

/// Decides what the notification shows for each snapshot.
pub struct NotificationEngine {
    app_title: String,
    foreground_started: bool,
    last_snapshot: Option<Snapshot>,
    last_sent_hash: Option<u64>,
    cover_url: Option<String>,
    art: Option<Arc<Vec<u8>>>,
}

impl NotificationEngine {
    pub fn new(app_title: impl Into<String>) -> Self {
        Self {
            app_title: app_title.into(),
            foreground_started: false,
            last_snapshot: None,
            last_sent_hash: None,
            cover_url: None,
            art: None,
        }
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground_started
    }

    pub fn update(&mut self, snapshot: &Snapshot) -> NotifyOutput {
        self.last_snapshot = Some(snapshot.clone());

        let Some(track) = snapshot.track.as_ref() else {
            self.cover_url = None;
            self.art = None;
            let action = if self.foreground_started {
                self.foreground_started = false;
                self.last_sent_hash = None;
                NotifyAction::Dismiss
            } else {
                NotifyAction::None
            };
            return NotifyOutput {
                action,
                fetch_art: None,
            };
        };

        let mut fetch_art = None;
        if self.cover_url.as_deref() != Some(track.cover_url.as_str()) {
            self.art = None;
            self.cover_url = Some(track.cover_url.clone());
            if !track.cover_url.is_empty() {
                fetch_art = Some(track.cover_url.clone());
            }
        }

        let action = self.render_action(snapshot);
        NotifyOutput { action, fetch_art }
    }

    /// Stores fetched art when it still belongs to the current track.
    pub fn art_loaded(&mut self, url: &str, data: Vec<u8>) -> NotifyAction {
        if self.cover_url.as_deref() != Some(url) {
            return NotifyAction::None;
        }
        self.art = Some(Arc::new(data));
        match self.last_snapshot.clone() {
            Some(snapshot) => self.render_action(&snapshot),
            None => NotifyAction::None,
        }
    }

    pub fn art_failed(&mut self, url: &str) {
        if self.cover_url.as_deref() == Some(url) {
            self.art = None;
        }
    }

    fn render_action(&mut self, snapshot: &Snapshot) -> NotifyAction {
        if !snapshot.is_playing && !self.foreground_started {
            return NotifyAction::None;
        }
        let view = self.render(snapshot);
        let hash = hash_view(&view);
        if !self.foreground_started {
            self.foreground_started = true;
            self.last_sent_hash = Some(hash);
            return NotifyAction::Start(view);
        }
        if self.last_sent_hash == Some(hash) {
            return NotifyAction::None;
        }
        self.last_sent_hash = Some(hash);
        NotifyAction::Update(view)
    }

    fn render(&self, snapshot: &Snapshot) -> NotificationView {
        let track = snapshot.track.as_ref();
        let title = track
            .map(|t| t.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or(self.app_title.as_str())
            .to_string();
        let subtitle = match track.map(|t| t.artist.trim()).filter(|a| !a.is_empty()) {
            Some(artist) => artist.to_string(),
            None if snapshot.is_playing => "Playing...".to_string(),
            None => "Paused".to_string(),
        };

        NotificationView {
            title,
            subtitle,
            is_playing: snapshot.is_playing,
            ongoing: snapshot.is_playing,
            icon: if snapshot.is_playing {
                PlayPauseIcon::Pause
            } else {
                PlayPauseIcon::Play
            },
            transport_enabled: snapshot.mode.map(|m| m.is_multi_track()).unwrap_or(false),
            art_url: self.art.as_ref().and(self.cover_url.clone()),
            art: self.art.clone(),
        }
    }
}

fn hash_view(view: &NotificationView) -> u64 {
    let mut hasher = DefaultHasher::new();
    view.title.hash(&mut hasher);
    view.subtitle.hash(&mut hasher);
    view.is_playing.hash(&mut hasher);
    view.ongoing.hash(&mut hasher);
    view.icon.hash(&mut hasher);
    view.transport_enabled.hash(&mut hasher);
    view.art_url.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::{NotificationButton, NotificationEngine, NotifyAction, PlayPauseIcon};
    use echoplay_core::{QueueMode, Track};
    use echoplay_engine::{Command, PlayerState, Snapshot};

    fn snapshot(id: i64, playing: bool, mode: QueueMode) -> Snapshot {
        Snapshot {
            track: Some(Track {
                id,
                title: format!("Song {id}"),
                artist: "Artist".to_string(),
                cover_url: format!("https://cdn.example/{id}.jpg"),
                audio_url: format!("https://cdn.example/{id}.mp3"),
            }),
            state: if playing {
                PlayerState::Playing
            } else {
                PlayerState::Paused
            },
            is_playing: playing,
            mode: Some(mode),
            queue_len: 3,
            cursor: Some(0),
            ..Snapshot::idle()
        }
    }

    #[test]
    fn waits_for_playback_before_starting() {
        let mut engine = NotificationEngine::new("Echo Play");
        let out = engine.update(&snapshot(1, false, QueueMode::Single));
        assert!(matches!(out.action, NotifyAction::None));
        assert!(!engine.is_foreground());

        let out = engine.update(&snapshot(1, true, QueueMode::Single));
        match out.action {
            NotifyAction::Start(view) => {
                assert_eq!(view.title, "Song 1");
                assert_eq!(view.icon, PlayPauseIcon::Pause);
                assert!(view.ongoing);
                assert!(!view.transport_enabled);
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn updates_after_start_even_when_paused() {
        let mut engine = NotificationEngine::new("Echo Play");
        engine.update(&snapshot(1, true, QueueMode::LinearPlaylist));

        let out = engine.update(&snapshot(1, false, QueueMode::LinearPlaylist));
        match out.action {
            NotifyAction::Update(view) => {
                assert_eq!(view.icon, PlayPauseIcon::Play);
                assert!(!view.ongoing);
                assert!(view.transport_enabled);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn identical_view_is_not_resent() {
        let mut engine = NotificationEngine::new("Echo Play");
        engine.update(&snapshot(1, true, QueueMode::FusionMix));
        let mut moved = snapshot(1, true, QueueMode::FusionMix);
        moved.position_ms = 5_000;

        let out = engine.update(&moved);
        assert!(matches!(out.action, NotifyAction::None));
    }

    #[test]
    fn requests_art_once_per_cover_and_applies_it() {
        let mut engine = NotificationEngine::new("Echo Play");
        let out = engine.update(&snapshot(1, true, QueueMode::Single));
        assert_eq!(out.fetch_art.as_deref(), Some("https://cdn.example/1.jpg"));

        let out = engine.update(&snapshot(1, false, QueueMode::Single));
        assert!(out.fetch_art.is_none());

        match engine.art_loaded("https://cdn.example/1.jpg", vec![1, 2, 3]) {
            NotifyAction::Update(view) => {
                assert_eq!(view.art_url.as_deref(), Some("https://cdn.example/1.jpg"));
                assert_eq!(view.art.map(|a| a.len()), Some(3));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn late_art_for_previous_track_is_dropped() {
        let mut engine = NotificationEngine::new("Echo Play");
        engine.update(&snapshot(1, true, QueueMode::LinearPlaylist));
        engine.update(&snapshot(2, true, QueueMode::LinearPlaylist));

        let action = engine.art_loaded("https://cdn.example/1.jpg", vec![9]);
        assert!(matches!(action, NotifyAction::None));
    }

    #[test]
    fn blank_metadata_falls_back() {
        let mut engine = NotificationEngine::new("Echo Play");
        let mut snap = snapshot(1, true, QueueMode::Single);
        if let Some(track) = snap.track.as_mut() {
            track.title.clear();
            track.artist = "  ".to_string();
        }
        match engine.update(&snap).action {
            NotifyAction::Start(view) => {
                assert_eq!(view.title, "Echo Play");
                assert_eq!(view.subtitle, "Playing...");
            }
            other => panic!("expected start, got {other:?}"),
        }

        snap.is_playing = false;
        snap.state = PlayerState::Paused;
        match engine.update(&snap).action {
            NotifyAction::Update(view) => assert_eq!(view.subtitle, "Paused"),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn released_session_dismisses() {
        let mut engine = NotificationEngine::new("Echo Play");
        engine.update(&snapshot(1, true, QueueMode::Single));

        let out = engine.update(&Snapshot::idle());
        assert!(matches!(out.action, NotifyAction::Dismiss));
        assert!(!engine.is_foreground());

        let out = engine.update(&Snapshot::idle());
        assert!(matches!(out.action, NotifyAction::None));
    }

    #[test]
    fn transport_buttons_follow_queue_mode() {
        let single = snapshot(1, true, QueueMode::Single);
        assert_eq!(NotificationButton::Next.command(&single), None);
        assert_eq!(NotificationButton::Previous.command(&single), None);
        assert_eq!(
            NotificationButton::PlayPause.command(&single),
            Some(Command::PlayPause)
        );

        let shuffled = snapshot(1, true, QueueMode::ShuffledPlaylist);
        assert_eq!(
            NotificationButton::Next.command(&shuffled),
            Some(Command::Next)
        );
        assert_eq!(
            NotificationButton::Previous.command(&Snapshot::idle()),
            None
        );
        assert_eq!(NotificationButton::parse("PREV"), Some(NotificationButton::Previous));
        assert_eq!(NotificationButton::parse("shuffle"), None);
    }

    #[tokio::test]
    async fn press_drops_next_for_a_single_song() {
        use super::press;
        use echoplay_engine::{audio_event_channel, spawn, NullSink, Player, Queue};
        use std::time::Duration;
        use tokio::time::timeout;

        let (events_tx, events_rx) = audio_event_channel();
        let player = Player::new(NullSink::new(events_tx), Queue::with_seed(1));
        let (handle, _task) = spawn(player, events_rx);
        let single = snapshot(1, true, QueueMode::Single);
        handle
            .dispatch(Command::PlaySingle(single.track.clone().unwrap()))
            .await
            .unwrap();

        let mut rx = handle.subscribe();
        timeout(Duration::from_secs(2), rx.wait_for(|s| s.is_playing))
            .await
            .unwrap()
            .unwrap();

        assert!(!press(&handle, NotificationButton::Next).await.unwrap());
        assert!(press(&handle, NotificationButton::PlayPause).await.unwrap());
        let paused = timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.state == PlayerState::Paused),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(paused.track.map(|t| t.id), Some(1));
    }
}
