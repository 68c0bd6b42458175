pub mod audio;
pub mod coordinator;
pub mod error;
pub mod player;
pub mod queue;

pub use audio::{
    audio_event_channel, AudioEvent, AudioEventReceiver, AudioEventSender, AudioSink, Generation,
    NullSink,
};
pub use coordinator::{spawn, Command, CoordinatorClosed, CoordinatorHandle};
pub use error::{MediaError, QueueError};
pub use player::{Player, PlayerState, Snapshot};
pub use queue::Queue;
