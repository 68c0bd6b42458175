use crate::error::MediaError;
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one source binding. Every load bumps it, so callbacks carrying
/// an older value belong to media that is no longer active.
pub type Generation = u64;

/// Callbacks from the audio engine, tagged with the generation they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    Prepared {
        generation: Generation,
        duration_ms: Option<u64>,
    },
    Position {
        generation: Generation,
        position_ms: u64,
    },
    Completed {
        generation: Generation,
    },
    Failed {
        generation: Generation,
        reason: String,
    },
}

impl AudioEvent {
    pub fn generation(&self) -> Generation {
        match self {
            AudioEvent::Prepared { generation, .. }
            | AudioEvent::Position { generation, .. }
            | AudioEvent::Completed { generation }
            | AudioEvent::Failed { generation, .. } => *generation,
        }
    }
}

pub type AudioEventSender = mpsc::UnboundedSender<AudioEvent>;
pub type AudioEventReceiver = mpsc::UnboundedReceiver<AudioEvent>;

pub fn audio_event_channel() -> (AudioEventSender, AudioEventReceiver) {
    mpsc::unbounded_channel()
}

/// The platform media primitive. `load` must not block: preparation finishes
/// later with an `AudioEvent::Prepared` or `AudioEvent::Failed`.
pub trait AudioSink: Send {
    fn name(&self) -> &'static str;
    fn load(&mut self, url: &str, generation: Generation) -> Result<(), MediaError>;
    fn start(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self) -> Result<(), MediaError>;
    fn stop(&mut self);
    fn seek(&mut self, position_ms: u64) -> Result<(), MediaError>;
    fn set_looping(&mut self, looping: bool);
    fn release(&mut self);
}

/// Prepares every source instantly with an unknown duration.
pub struct NullSink {
    events: AudioEventSender,
    released: bool,
}

impl NullSink {
    pub fn new(events: AudioEventSender) -> Self {
        Self {
            events,
            released: false,
        }
    }
}

impl AudioSink for NullSink {
    fn name(&self) -> &'static str {
        "null"
    }

    fn load(&mut self, url: &str, generation: Generation) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::Released);
        }
        debug!(url, generation, "null sink load");
        let _ = self.events.send(AudioEvent::Prepared {
            generation,
            duration_ms: None,
        });
        Ok(())
    }

    fn start(&mut self) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::Released);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn seek(&mut self, _position_ms: u64) -> Result<(), MediaError> {
        Ok(())
    }

    fn set_looping(&mut self, _looping: bool) {}

    fn release(&mut self) {
        self.released = true;
    }
}
