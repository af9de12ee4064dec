//! Messages exchanged between the grain scheduler and the grain renderer.

use std::sync::Arc;

use basedrop::Owned;
use crossbeam_queue::ArrayQueue;

use crate::{grain::GrainEvent, sample::SourceBuffer, utils::time::SampleTime};

// -------------------------------------------------------------------------------------------------

/// Messages sent from the control-rate scheduler to the audio-rate renderer.
///
/// Heap allocated payloads are wrapped into [`Owned`] values, so the renderer never frees them
/// in the audio thread: dropped payloads get collected by the scheduler's collector instead.
pub enum RendererMessage {
    /// Replace the source buffer wholesale.
    SetBuffer(Owned<SourceBuffer>),
    /// Append a batch of grain events to the pending event queue.
    Schedule(Owned<Vec<GrainEvent>>),
    /// Enable periodic clock reports with the given interval in milliseconds.
    ClockStart { interval_ms: f32 },
    /// Disable clock reports.
    ClockStop,
    /// Drop all pending events and active voices. The clock keeps running.
    Clear,
    /// Limit the number of simultaneously active voices. Clamped to the voice pool's capacity.
    SetVoiceLimit(usize),
    /// Same as `Clear`, but also rewinds the renderer's clock to zero. Clock reports sent after
    /// the reset carry the given epoch, so the scheduler can tell them apart from stale ones.
    Reset { epoch: u32 },
}

impl std::fmt::Debug for RendererMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetBuffer(buffer) => f
                .debug_struct("SetBuffer")
                .field("frame_count", &buffer.frame_count())
                .field("channel_count", &buffer.channel_count())
                .finish(),
            Self::Schedule(events) => f
                .debug_struct("Schedule")
                .field("events", &events.len())
                .finish(),
            Self::ClockStart { interval_ms } => f
                .debug_struct("ClockStart")
                .field("interval_ms", interval_ms)
                .finish(),
            Self::ClockStop => write!(f, "ClockStop"),
            Self::Clear => write!(f, "Clear"),
            Self::SetVoiceLimit(limit) => f.debug_tuple("SetVoiceLimit").field(limit).finish(),
            Self::Reset { epoch } => f.debug_struct("Reset").field("epoch", epoch).finish(),
        }
    }
}

/// Lock free, bounded queue which carries [`RendererMessage`]s to the renderer.
pub type RendererMessageQueue = Arc<ArrayQueue<RendererMessage>>;

// -------------------------------------------------------------------------------------------------

/// Messages sent from the audio-rate renderer back to the control-rate scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMessage {
    /// The renderer's current absolute sample time, tagged with the epoch of the last reset.
    Clock { time: SampleTime, epoch: u32 },
}
