//! Audio-rate grain renderer: a fixed capacity voice pool fed by scheduled grain events.

use std::{collections::VecDeque, sync::Arc};

use basedrop::Owned;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use crossbeam_queue::ArrayQueue;

use crate::{
    grain::GrainEvent,
    message::{RendererMessage, RendererMessageQueue, SchedulerMessage},
    sample::SourceBuffer,
    utils::{
        buffer::clear_buffer,
        event::EventProcessor,
        time::{milliseconds_to_samples, SampleTime},
    },
};

// -------------------------------------------------------------------------------------------------

mod voice;

use voice::Voice;

// -------------------------------------------------------------------------------------------------

/// Snapshot of the renderer's runtime state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RendererStats {
    /// Absolute sample time of the next rendered frame.
    pub clock: SampleTime,
    /// Number of currently sounding voices.
    pub active_voices: usize,
    /// Number of grain events waiting for activation.
    pub pending_events: usize,
    /// Number of grains dropped because the voice pool or the voice limit was exhausted.
    pub dropped_events: u64,
    /// Number of grains dropped because they arrived after their start time.
    pub late_events: u64,
}

// -------------------------------------------------------------------------------------------------

/// Mixes up to `max_voices` concurrent grains from a source buffer into a continuous output.
///
/// The renderer is driven by the host's audio callback via [`GrainRenderer::process`]. It
/// never blocks, waits or allocates while processing: grain events arrive through a lock free
/// message queue, get sorted into a preallocated pending queue and are activated sample
/// accurately into free voice slots. When no free slot is left, new grains are silently
/// dropped.
///
/// The renderer owns the authoritative sample clock. When clock reports are enabled, it
/// periodically sends its absolute sample position back to the scheduler.
pub struct GrainRenderer {
    sample_rate: u32,
    channel_count: usize,
    /// Voice pool: never grows or shrinks.
    voices: Vec<Voice>,
    /// Indices of currently active voices.
    active_voice_indices: Vec<usize>,
    /// Max number of active voices: never exceeds the pool size.
    voice_limit: usize,
    /// Grain events which are not yet due, sorted by start time.
    pending_events: VecDeque<GrainEvent>,
    source: Option<Owned<SourceBuffer>>,
    message_queue: RendererMessageQueue,
    clock_sender: Sender<SchedulerMessage>,
    clock_receiver: Receiver<SchedulerMessage>,
    clock: SampleTime,
    /// Epoch of the last reset, echoed in clock reports.
    clock_epoch: u32,
    block_start_time: SampleTime,
    clock_report_interval: Option<SampleTime>,
    samples_since_clock_report: SampleTime,
    dropped_event_count: u64,
    late_event_count: u64,
}

impl GrainRenderer {
    /// Max number of grain events which can wait for activation.
    pub const PENDING_EVENTS_CAPACITY: usize = 4096;
    /// Size of the scheduler to renderer message queue.
    pub const MESSAGE_QUEUE_SIZE: usize = 256;
    /// Size of the renderer to scheduler clock channel.
    pub const CLOCK_QUEUE_SIZE: usize = 64;

    /// Create a new renderer with the given output signal specs and voice pool size.
    pub fn new(sample_rate: u32, channel_count: usize, max_voices: usize) -> Self {
        assert!(sample_rate > 0, "Invalid sample rate");
        assert!(channel_count > 0, "Invalid channel count");
        let max_voices = max_voices.max(1);

        let voices = vec![Voice::new(); max_voices];
        let active_voice_indices = Vec::with_capacity(max_voices);
        let pending_events = VecDeque::with_capacity(Self::PENDING_EVENTS_CAPACITY);

        let message_queue = Arc::new(ArrayQueue::new(Self::MESSAGE_QUEUE_SIZE));
        let (clock_sender, clock_receiver) = crossbeam_channel::bounded(Self::CLOCK_QUEUE_SIZE);

        Self {
            sample_rate,
            channel_count,
            voices,
            active_voice_indices,
            voice_limit: max_voices,
            pending_events,
            source: None,
            message_queue,
            clock_sender,
            clock_receiver,
            clock: 0,
            clock_epoch: 0,
            block_start_time: 0,
            clock_report_interval: None,
            samples_since_clock_report: 0,
            dropped_event_count: 0,
            late_event_count: 0,
        }
    }

    /// Output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output channel count.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Voice pool capacity.
    pub fn max_voices(&self) -> usize {
        self.voices.len()
    }

    /// Current max number of simultaneously active voices.
    pub fn voice_limit(&self) -> usize {
        self.voice_limit
    }

    /// Number of currently sounding voices.
    pub fn active_voice_count(&self) -> usize {
        self.active_voice_indices.len()
    }

    /// Absolute sample time of the next rendered frame.
    pub fn clock(&self) -> SampleTime {
        self.clock
    }

    /// Runtime statistics.
    pub fn stats(&self) -> RendererStats {
        RendererStats {
            clock: self.clock,
            active_voices: self.active_voice_indices.len(),
            pending_events: self.pending_events.len(),
            dropped_events: self.dropped_event_count,
            late_events: self.late_event_count,
        }
    }

    /// Allows controlling the renderer by pushing messages into this queue.
    pub fn message_queue(&self) -> RendererMessageQueue {
        Arc::clone(&self.message_queue)
    }

    /// Receiving end of the renderer's clock reports.
    pub fn clock_receiver(&self) -> Receiver<SchedulerMessage> {
        self.clock_receiver.clone()
    }

    #[cfg(test)]
    pub(crate) fn clock_sender(&self) -> Sender<SchedulerMessage> {
        self.clock_sender.clone()
    }

    /// Render the next block of interleaved output samples. Output is overwritten, not mixed.
    /// Mono outputs receive the average of left and right, outputs with more than two channels
    /// receive left and right in the first two channels.
    ///
    /// Returns the number of written samples, which always is `output.len()`.
    pub fn process(&mut self, output: &mut [f32]) -> usize {
        debug_assert!(
            output.len() % self.channel_count == 0,
            "Output must contain whole frames"
        );

        // messages only get applied at block boundaries
        self.process_messages();

        clear_buffer(output);
        let frame_count = output.len() / self.channel_count;
        self.block_start_time = self.clock;

        let mut frames_written = 0;
        while frames_written < frame_count {
            let current_time = self.clock + frames_written as SampleTime;
            // activate all grains which are due now
            self.process_events(current_time);
            // render until the next grain starts or the block ends
            let frames = self
                .time_until_next_event(current_time)
                .min(frame_count - frames_written);
            let segment_start = frames_written * self.channel_count;
            let segment_end = (frames_written + frames) * self.channel_count;
            self.render_voices(&mut output[segment_start..segment_end]);
            frames_written += frames;
        }

        self.clock += frame_count as SampleTime;
        self.report_clock(frame_count as SampleTime);

        output.len()
    }

    /// Process pending scheduler messages.
    fn process_messages(&mut self) {
        while let Some(message) = self.message_queue.pop() {
            match message {
                RendererMessage::SetBuffer(buffer) => {
                    // the previous buffer gets freed by the collector
                    self.source = Some(buffer);
                }
                RendererMessage::Schedule(events) => {
                    for event in events.iter() {
                        if self.pending_events.len() >= Self::PENDING_EVENTS_CAPACITY {
                            self.dropped_event_count += 1;
                            continue;
                        }
                        self.insert_event(*event);
                    }
                }
                RendererMessage::ClockStart { interval_ms } => {
                    let interval = milliseconds_to_samples(interval_ms as f64, self.sample_rate)
                        .round()
                        .max(1.0) as SampleTime;
                    self.clock_report_interval = Some(interval);
                    // report on the end of the next block
                    self.samples_since_clock_report = interval;
                }
                RendererMessage::ClockStop => {
                    self.clock_report_interval = None;
                }
                RendererMessage::Clear => {
                    self.clear();
                }
                RendererMessage::SetVoiceLimit(limit) => {
                    self.set_voice_limit(limit);
                }
                RendererMessage::Reset { epoch } => {
                    self.clear();
                    self.clock = 0;
                    self.clock_epoch = epoch;
                    self.samples_since_clock_report = self.clock_report_interval.unwrap_or(0);
                }
            }
        }
    }

    /// Drop all pending events and active voices.
    fn clear(&mut self) {
        self.pending_events.clear();
        for index in self.active_voice_indices.drain(..) {
            self.voices[index].deactivate();
        }
    }

    /// Apply a new voice limit. Voices above the new limit get stopped, newest first.
    fn set_voice_limit(&mut self, limit: usize) {
        self.voice_limit = limit.clamp(1, self.voices.len());
        while self.active_voice_indices.len() > self.voice_limit {
            if let Some(index) = self.active_voice_indices.pop() {
                self.voices[index].deactivate();
            }
        }
    }

    /// Send the current clock to the scheduler, if clock reports are enabled and due.
    fn report_clock(&mut self, elapsed_frames: SampleTime) {
        if let Some(interval) = self.clock_report_interval {
            self.samples_since_clock_report += elapsed_frames;
            if self.samples_since_clock_report >= interval {
                self.samples_since_clock_report = 0;
                let report = SchedulerMessage::Clock {
                    time: self.clock,
                    epoch: self.clock_epoch,
                };
                match self.clock_sender.try_send(report) {
                    // best effort: the next report supersedes a dropped one
                    Ok(()) | Err(TrySendError::Full(_)) => (),
                    Err(TrySendError::Disconnected(_)) => {
                        // receivers are owned by the renderer too, so this never happens
                        self.clock_report_interval = None;
                    }
                }
            }
        }
    }

    /// Activate the given grain in a free voice slot, or drop it.
    fn activate_voice(&mut self, event: &GrainEvent) {
        let Some(source) = self.source.as_deref() else {
            // no source: nothing to play
            return;
        };
        if self.active_voice_indices.len() >= self.voice_limit {
            self.dropped_event_count += 1;
            return;
        }
        if let Some(index) = self.voices.iter().position(|v| !v.is_active()) {
            self.voices[index].activate(event, source.frame_count());
            self.active_voice_indices.push(index);
        } else {
            self.dropped_event_count += 1;
        }
    }

    /// Mix all active voices into the given interleaved output segment.
    fn render_voices(&mut self, output: &mut [f32]) {
        if self.active_voice_indices.is_empty() {
            return;
        }
        let Some(source) = self.source.as_deref() else {
            return;
        };
        let voices = &mut self.voices;
        let active_voice_indices = &self.active_voice_indices;

        // Eliminate channel count match branch from hot path
        match self.channel_count {
            1 => {
                for frame in output.iter_mut() {
                    let (left, right) = mix_voices(voices, active_voice_indices, source);
                    *frame = (left + right) * 0.5;
                }
            }
            2 => {
                for frame in output.chunks_exact_mut(2) {
                    let (left, right) = mix_voices(voices, active_voice_indices, source);
                    frame[0] = left;
                    frame[1] = right;
                }
            }
            channel_count => {
                for frame in output.chunks_exact_mut(channel_count) {
                    let (left, right) = mix_voices(voices, active_voice_indices, source);
                    frame[0] = left;
                    frame[1] = right;
                }
            }
        }

        // release voices which finished playback
        self.active_voice_indices
            .retain(|&index| self.voices[index].is_active());
    }
}

impl EventProcessor for GrainRenderer {
    type Event = GrainEvent;

    fn events(&self) -> &VecDeque<Self::Event> {
        &self.pending_events
    }

    fn events_mut(&mut self) -> &mut VecDeque<Self::Event> {
        &mut self.pending_events
    }

    fn process_event(&mut self, event: Self::Event) {
        if event.start_time < self.block_start_time {
            // arrived too late: playing it now would shift it in time
            self.late_event_count += 1;
            return;
        }
        self.activate_voice(&event);
    }
}

/// Render and sum up a single stereo frame of all active voices.
#[inline]
fn mix_voices(
    voices: &mut [Voice],
    active_voice_indices: &[usize],
    source: &SourceBuffer,
) -> (f32, f32) {
    let mut left = 0.0;
    let mut right = 0.0;
    for &index in active_voice_indices {
        let voice = &mut voices[index];
        if voice.is_active() {
            let (l, r) = voice.process(source);
            left += l;
            right += r;
        }
    }
    (left, right)
}

// -------------------------------------------------------------------------------------------------
