use std::{
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{RecvTimeoutError, Sender};

use super::GrainScheduler;
use crate::{error::Error, sample::SourceBuffer, settings::EngineSettings};

// -------------------------------------------------------------------------------------------------

/// Commands sent from a [`SchedulerThread`] handle to its worker thread.
enum SchedulerCommand {
    Start,
    Stop,
    Reset,
    ResetSeed(u32),
    SetSettings(Box<EngineSettings>),
    SetBuffer(SourceBuffer),
    Shutdown,
}

// -------------------------------------------------------------------------------------------------

/// Runs a [`GrainScheduler`] in its own thread and ticks it at the configured tick interval.
///
/// The scheduler is controlled via commands, which get applied in order between ticks.
/// Dropping the handle stops the scheduler and joins the thread. Use
/// [`SchedulerThread::shutdown`] to get the scheduler back.
pub struct SchedulerThread {
    command_sender: Sender<SchedulerCommand>,
    thread: Option<JoinHandle<GrainScheduler>>,
}

impl SchedulerThread {
    /// Move the given scheduler into a new worker thread.
    pub fn spawn(scheduler: GrainScheduler) -> Self {
        let (command_sender, command_receiver) =
            crossbeam_channel::bounded(scheduler.config().command_queue_size);
        let thread = thread::Builder::new()
            .name("grain_scheduler".to_string())
            .spawn(move || Self::run(scheduler, command_receiver))
            .expect("failed to spawn grain scheduler thread");
        Self {
            command_sender,
            thread: Some(thread),
        }
    }

    /// Start scheduling grains.
    pub fn start(&self) -> Result<(), Error> {
        self.send(SchedulerCommand::Start)
    }

    /// Stop scheduling grains and silence the renderer.
    pub fn stop(&self) -> Result<(), Error> {
        self.send(SchedulerCommand::Stop)
    }

    /// Stop and rewind the scheduler and the renderer to time zero.
    pub fn reset(&self) -> Result<(), Error> {
        self.send(SchedulerCommand::Reset)
    }

    /// Re-seed the scheduler's random generator.
    pub fn reset_seed(&self, seed: u32) -> Result<(), Error> {
        self.send(SchedulerCommand::ResetSeed(seed))
    }

    /// Replace the scheduler's settings.
    pub fn set_settings(&self, settings: EngineSettings) -> Result<(), Error> {
        self.send(SchedulerCommand::SetSettings(Box::new(settings)))
    }

    /// Replace the renderer's source buffer.
    pub fn set_buffer(&self, buffer: SourceBuffer) -> Result<(), Error> {
        self.send(SchedulerCommand::SetBuffer(buffer))
    }

    /// Stop the scheduler, join the thread and return the scheduler.
    pub fn shutdown(mut self) -> Result<GrainScheduler, Error> {
        let thread = self
            .thread
            .take()
            .ok_or_else(|| Error::ThreadError("thread already joined".to_string()))?;
        self.command_sender.send(SchedulerCommand::Shutdown)?;
        thread
            .join()
            .map_err(|_| Error::ThreadError("grain scheduler thread panicked".to_string()))
    }

    fn send(&self, command: SchedulerCommand) -> Result<(), Error> {
        self.command_sender.send(command).map_err(|err| {
            log::warn!("Failed to send grain scheduler command: the thread is no longer running");
            err.into()
        })
    }

    fn run(
        mut scheduler: GrainScheduler,
        receiver: crossbeam_channel::Receiver<SchedulerCommand>,
    ) -> GrainScheduler {
        let tick_interval = scheduler.config().tick_interval;
        let mut next_tick = Instant::now();
        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            let command = match receiver.recv_timeout(timeout) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => {
                    scheduler.tick();
                    next_tick += tick_interval;
                    let now = Instant::now();
                    if next_tick < now {
                        // don't try to catch up missed ticks
                        next_tick = now + tick_interval;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // handle got dropped without a shutdown
                    break;
                }
            };
            let result = match command {
                SchedulerCommand::Start => scheduler.start().map(|_| {
                    // schedule the first batch right away
                    scheduler.tick();
                    next_tick = Instant::now() + tick_interval;
                }),
                SchedulerCommand::Stop => scheduler.stop(),
                SchedulerCommand::Reset => scheduler.reset(),
                SchedulerCommand::ResetSeed(seed) => {
                    scheduler.reset_seed(seed);
                    Ok(())
                }
                SchedulerCommand::SetSettings(settings) => {
                    scheduler.set_settings(*settings);
                    Ok(())
                }
                SchedulerCommand::SetBuffer(buffer) => scheduler.set_buffer(buffer),
                SchedulerCommand::Shutdown => break,
            };
            if let Err(err) = result {
                log::error!("Grain scheduler command failed: {err}");
            }
        }
        if let Err(err) = scheduler.stop() {
            log::error!("Failed to stop grain scheduler on shutdown: {err}");
        }
        scheduler
    }
}

impl Drop for SchedulerThread {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            // the thread also quits when the channel disconnects
            let _ = self.command_sender.send(SchedulerCommand::Shutdown);
            if thread.join().is_err() {
                log::error!("Grain scheduler thread panicked");
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        renderer::GrainRenderer,
        scheduler::{SchedulerConfig, SchedulerState},
    };

    #[test]
    fn start_stop_shutdown() {
        let mut renderer = GrainRenderer::new(48000, 2, 16);
        let scheduler = GrainScheduler::new(
            &renderer,
            EngineSettings::default(),
            42,
            SchedulerConfig::default(),
        )
        .unwrap();

        let scheduler_thread = SchedulerThread::spawn(scheduler);
        scheduler_thread.start().unwrap();
        let mut output = vec![0.0; 480 * 2];
        for _ in 0..10 {
            renderer.process(&mut output);
            thread::sleep(Duration::from_millis(10));
        }
        scheduler_thread.stop().unwrap();

        let scheduler = scheduler_thread.shutdown().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.emitted_grain_count() > 0);
    }

    #[test]
    fn drop_joins_thread() {
        let renderer = GrainRenderer::new(48000, 2, 16);
        let scheduler = GrainScheduler::new(
            &renderer,
            EngineSettings::default(),
            42,
            SchedulerConfig::default(),
        )
        .unwrap();
        let scheduler_thread = SchedulerThread::spawn(scheduler);
        scheduler_thread.start().unwrap();
        scheduler_thread.reset_seed(7).unwrap();
        drop(scheduler_thread);
    }
}
