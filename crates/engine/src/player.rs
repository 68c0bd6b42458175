use crate::audio::{AudioEvent, AudioSink, Generation};
use crate::error::{MediaError, QueueError};
use crate::queue::Queue;
use echoplay_core::{QueueMode, Track};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
}

/// Everything an observer may read, captured after a completed transition.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Snapshot {
    pub track: Option<Track>,
    pub state: PlayerState,
    pub is_playing: bool,
    pub is_looping: bool,
    pub is_shuffled: bool,
    pub mode: Option<QueueMode>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub queue_len: usize,
    pub cursor: Option<usize>,
    pub last_fault: Option<String>,
}

impl Snapshot {
    pub fn idle() -> Self {
        Self {
            track: None,
            state: PlayerState::Idle,
            is_playing: false,
            is_looping: false,
            is_shuffled: false,
            mode: None,
            position_ms: 0,
            duration_ms: 0,
            queue_len: 0,
            cursor: None,
            last_fault: None,
        }
    }

    /// Slider position in percent; zero while the duration is unknown.
    pub fn progress_percent(&self) -> f32 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.position_ms as f32 / self.duration_ms as f32 * 100.0).clamp(0.0, 100.0)
    }
}

/// The playback session and its queue. Only the coordinator task touches it.
pub struct Player<S: AudioSink> {
    queue: Queue,
    sink: S,
    state: PlayerState,
    active: Option<Track>,
    generation: Generation,
    prepared: bool,
    looping: bool,
    position_ms: u64,
    duration_ms: u64,
    last_fault: Option<String>,
    released: bool,
}

impl<S: AudioSink> Player<S> {
    pub fn new(sink: S, queue: Queue) -> Self {
        Self {
            queue,
            sink,
            state: PlayerState::Idle,
            active: None,
            generation: 0,
            prepared: false,
            looping: false,
            position_ms: 0,
            duration_ms: 0,
            last_fault: None,
            released: false,
        }
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self.sink.set_looping(looping);
        self
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn active_track(&self) -> Option<&Track> {
        self.active.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn select_single(&mut self, track: Track) {
        self.queue.set_single(track);
        self.play_current();
    }

    /// Loads a playlist and plays from `start`, an index in play order. An
    /// out-of-range start is rejected before the queue is touched.
    pub fn select_playlist(
        &mut self,
        tracks: Vec<Track>,
        shuffle: bool,
        start: Option<usize>,
    ) -> Result<(), QueueError> {
        if let Some(index) = start {
            if index >= tracks.len() {
                return Err(QueueError::OutOfRange {
                    index,
                    len: tracks.len(),
                });
            }
        }
        self.queue.set_playlist(tracks, shuffle);
        if self.queue.is_empty() {
            self.stop();
            self.active = None;
            return Ok(());
        }
        if let Some(index) = start {
            self.queue.jump_to(index)?;
        }
        self.play_current();
        Ok(())
    }

    pub fn select_fusion_mix(&mut self, playlists: &[Vec<Track>]) -> Result<(), QueueError> {
        self.queue.set_fusion_mix(playlists)?;
        self.force_load_current();
        Ok(())
    }

    /// Resumes the prepared source when paused, wherever the queue cursor
    /// points. From `Idle` the queue's current track is loaded.
    pub fn play(&mut self) {
        if self.released {
            return;
        }
        let Some(active) = self.active.clone() else {
            self.play_current();
            return;
        };
        match self.state {
            PlayerState::Playing | PlayerState::Loading => {}
            PlayerState::Paused | PlayerState::Ready if self.prepared => self.resume(active),
            _ => self.play_current(),
        }
    }

    /// Plays the queue's current track, resuming in place when it is the
    /// paused, already prepared source.
    fn play_current(&mut self) {
        if self.released {
            return;
        }
        let Some(requested) = self.queue.current().cloned() else {
            debug!("play ignored: no active queue");
            return;
        };
        let same = self
            .active
            .as_ref()
            .map(|t| t.id == requested.id && t.audio_url == requested.audio_url)
            .unwrap_or(false);

        match self.state {
            PlayerState::Playing | PlayerState::Loading if same => {}
            PlayerState::Paused | PlayerState::Ready if same && self.prepared => {
                self.resume(requested)
            }
            _ => self.load(requested),
        }
    }

    fn resume(&mut self, track: Track) {
        match self.sink.start() {
            Ok(()) => {
                self.state = PlayerState::Playing;
                debug!(track_id = track.id, "playback resumed");
            }
            Err(err) => {
                warn!(error = %err, "resume failed; reloading source");
                self.load(track);
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        match self.sink.pause() {
            Ok(()) => {
                self.state = PlayerState::Paused;
                debug!("playback paused");
            }
            Err(err) => self.fail(err),
        }
    }

    /// Notification button semantics.
    pub fn play_pause(&mut self) {
        if self.state == PlayerState::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn seek(&mut self, percent: f32) {
        if !matches!(
            self.state,
            PlayerState::Playing | PlayerState::Paused | PlayerState::Ready
        ) {
            return;
        }
        if self.duration_ms == 0 {
            return;
        }
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        let target = ((percent / 100.0) as f64 * self.duration_ms as f64) as u64;
        let target = target.min(self.duration_ms);
        match self.sink.seek(target) {
            Ok(()) => self.position_ms = target,
            Err(err) => warn!(error = %err, "seek failed"),
        }
    }

    pub fn next(&mut self) {
        match self.queue.mode() {
            None => debug!("next ignored: no active queue"),
            Some(mode) if !mode.is_multi_track() => self.stop(),
            Some(_) => {
                if self.queue.advance().is_ok() {
                    self.force_load_current();
                }
            }
        }
    }

    /// Steps back in playlist modes; a single track restarts instead.
    pub fn previous(&mut self) {
        match self.queue.mode() {
            None => debug!("previous ignored: no active queue"),
            Some(mode) if !mode.is_multi_track() => self.force_load_current(),
            Some(_) => {
                if self.queue.retreat().is_ok() {
                    self.force_load_current();
                }
            }
        }
    }

    pub fn stop(&mut self) {
        if self.state == PlayerState::Idle {
            return;
        }
        self.sink.stop();
        self.generation += 1;
        self.state = PlayerState::Idle;
        self.prepared = false;
        self.position_ms = 0;
        debug!("playback stopped");
    }

    pub fn toggle_looping(&mut self) -> bool {
        self.looping = !self.looping;
        self.sink.set_looping(self.looping);
        self.looping
    }

    /// Playback of the active track continues; only the navigation order
    /// changes.
    pub fn set_shuffle(&mut self, enabled: bool) -> bool {
        self.queue.toggle_shuffle(enabled)
    }

    /// Applies an engine callback. Returns whether anything observable changed.
    pub fn handle(&mut self, event: AudioEvent) -> bool {
        if self.released || event.generation() != self.generation {
            debug!(
                event_generation = event.generation(),
                current = self.generation,
                "stale callback ignored"
            );
            return false;
        }

        match event {
            AudioEvent::Prepared { duration_ms, .. } => {
                if self.state != PlayerState::Loading {
                    return false;
                }
                self.prepared = true;
                self.duration_ms = duration_ms.unwrap_or(0);
                self.state = PlayerState::Ready;
                match self.sink.start() {
                    Ok(()) => {
                        self.state = PlayerState::Playing;
                        if let Some(track) = &self.active {
                            info!(track_id = track.id, title = %track.title, "playing");
                        }
                    }
                    Err(err) => self.fail(err),
                }
                true
            }
            AudioEvent::Position { position_ms, .. } => {
                let position = if self.duration_ms > 0 {
                    position_ms.min(self.duration_ms)
                } else {
                    position_ms
                };
                if position == self.position_ms {
                    return false;
                }
                self.position_ms = position;
                true
            }
            AudioEvent::Completed { .. } => {
                if self.state != PlayerState::Playing {
                    return false;
                }
                if self.looping {
                    self.restart_in_place();
                } else {
                    self.next();
                }
                true
            }
            AudioEvent::Failed { reason, .. } => {
                if !matches!(
                    self.state,
                    PlayerState::Loading
                        | PlayerState::Ready
                        | PlayerState::Playing
                        | PlayerState::Paused
                ) {
                    return false;
                }
                let url = self
                    .active
                    .as_ref()
                    .map(|t| t.audio_url.clone())
                    .unwrap_or_default();
                self.fail(MediaError::Load { url, reason });
                true
            }
        }
    }

    /// Tears the engine down. No callback acts on the player afterwards.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.generation += 1;
        self.sink.stop();
        self.sink.release();
        self.released = true;
        self.state = PlayerState::Idle;
        self.active = None;
        self.prepared = false;
        self.position_ms = 0;
        self.duration_ms = 0;
        info!("playback session released");
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            track: self.active.clone(),
            state: self.state,
            is_playing: self.is_playing(),
            is_looping: self.looping,
            is_shuffled: self.queue.is_shuffled(),
            mode: self.queue.mode(),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            queue_len: self.queue.len(),
            cursor: self.queue.cursor(),
            last_fault: self.last_fault.clone(),
        }
    }

    fn force_load_current(&mut self) {
        if self.released {
            return;
        }
        if let Some(track) = self.queue.current().cloned() {
            self.load(track);
        }
    }

    fn load(&mut self, track: Track) {
        self.generation += 1;
        self.sink.stop();
        self.state = PlayerState::Loading;
        self.prepared = false;
        self.position_ms = 0;
        self.duration_ms = 0;
        self.last_fault = None;
        self.sink.set_looping(self.looping);

        debug!(
            track_id = track.id,
            generation = self.generation,
            "loading source"
        );
        let result = self.sink.load(&track.audio_url, self.generation);
        self.active = Some(track);
        if let Err(err) = result {
            self.fail(err);
        }
    }

    fn restart_in_place(&mut self) {
        let restarted = self.sink.seek(0).and_then(|()| self.sink.start());
        match restarted {
            Ok(()) => self.position_ms = 0,
            Err(err) => self.fail(err),
        }
    }

    // A failed source resets the engine and leaves the session Idle with the
    // fault recorded for snapshots.
    fn fail(&mut self, err: MediaError) {
        warn!(error = %err, "media failure; resetting audio engine");
        self.sink.stop();
        self.generation += 1;
        self.prepared = false;
        self.position_ms = 0;
        self.state = PlayerState::Idle;
        self.last_fault = Some(err.to_string());
    }
}
