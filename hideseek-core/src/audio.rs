//! # Audio Device Module
//!
//! This module handles recording and playback using CPAL (Cross-Platform Audio Library).
//! It provides functions for selecting a device configuration that matches the
//! analysis sample rate, recording a fixed-length mono buffer and playing
//! buffers back either blocking or through a stoppable handle.
//!
//! ## Features
//! - Automatic audio device selection
//! - Multi-channel input downmixed to mono
//! - Mono output duplicated across all device channels
//! - Idempotent stop that releases the output device immediately

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::RecvTimeoutError;
use log::{debug, error, info};

use crate::AudioBuffer;

/// How long recording waits for the next chunk before giving up on the device.
const CHUNK_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll interval while waiting for playback to finish.
const PLAYBACK_POLL: Duration = Duration::from_millis(10);

/// Records `duration_s` seconds of mono audio from the default input device.
///
/// Blocks until the requested number of samples has arrived. The device must
/// support `sample_rate` exactly, since the detector bins depend on it.
pub fn record(duration_s: f32, sample_rate: u32) -> Result<AudioBuffer> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!("[AUDIO] Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, sample_rate)
        .ok_or_else(|| anyhow!("No f32 input format at {} Hz found", sample_rate))?;
    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
    let channels = usize::from(config.channels());
    let config: cpal::StreamConfig = config.into();

    info!("[AUDIO] Recording at {} Hz, {} channel(s)", sample_rate, channels);

    let total = (f64::from(sample_rate) * f64::from(duration_s)) as usize;
    let (sender, receiver) = crossbeam_channel::unbounded::<Vec<f32>>();

    let err_fn = |err| error!("[AUDIO] An error occurred on the input stream: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let mono: Vec<f32> = data
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect();
            // The receiver is gone once enough samples were collected.
            let _ = sender.send(mono);
        },
        err_fn,
        None,
    )?;

    stream.play().context("failed to start the input stream")?;

    let mut samples = Vec::with_capacity(total);
    while samples.len() < total {
        match receiver.recv_timeout(CHUNK_TIMEOUT) {
            Ok(chunk) => samples.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) => bail!("input device stopped delivering audio"),
            Err(RecvTimeoutError::Disconnected) => bail!("input stream closed unexpectedly"),
        }
    }
    drop(stream);

    samples.truncate(total);
    debug!("[AUDIO] Recorded {} samples", samples.len());
    Ok(AudioBuffer::new(samples, sample_rate))
}

/// A sound playing on the default output device.
///
/// Dropping the handle stops playback.
pub struct Playback {
    stream: Option<cpal::Stream>,
    finished: Arc<AtomicBool>,
}

impl Playback {
    /// True until the last sample has been handed to the device or `stop` was called.
    pub fn is_playing(&self) -> bool {
        self.stream.is_some() && !self.finished.load(Ordering::Acquire)
    }

    /// Stops playback and releases the output device.
    ///
    /// Safe to call any number of times, also after playback ended on its own.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!("[AUDIO] Output stream released");
        }
    }

    /// Blocks until the sound has finished, then releases the device.
    pub fn wait(mut self) {
        while self.is_playing() {
            thread::sleep(PLAYBACK_POLL);
        }
        self.stop();
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts playing `buffer` and returns immediately.
pub fn play(buffer: &AudioBuffer) -> Result<Playback> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;

    let sample_rate = buffer.sample_rate();
    let configs = device.supported_output_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, sample_rate)
        .ok_or_else(|| anyhow!("No f32 output format at {} Hz found", sample_rate))?;
    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
    let channels = usize::from(config.channels());
    let config: cpal::StreamConfig = config.into();

    debug!(
        "[AUDIO] Playing {} samples on {} at {} Hz",
        buffer.len(),
        device.name()?,
        sample_rate
    );

    let finished = Arc::new(AtomicBool::new(false));
    let finished_flag = Arc::clone(&finished);
    let mut cursor = PlaybackCursor::new(buffer.samples().to_vec());

    let err_fn = |err| error!("[AUDIO] An error occurred on the output stream: {}", err);

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if cursor.fill(data, channels) {
                finished_flag.store(true, Ordering::Release);
            }
        },
        err_fn,
        None,
    )?;

    stream.play().context("failed to start the output stream")?;

    Ok(Playback {
        stream: Some(stream),
        finished,
    })
}

/// Feeds a mono buffer into interleaved device callbacks.
struct PlaybackCursor {
    samples: Vec<f32>,
    position: usize,
    drained: bool,
}

impl PlaybackCursor {
    fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
            drained: false,
        }
    }

    /// Writes the next frames into `data`, padding with silence.
    ///
    /// Returns true only once a full callback of silence has followed the
    /// last sample, so the device has taken the tail before the stream drops.
    fn fill(&mut self, data: &mut [f32], channels: usize) -> bool {
        let was_done = self.position >= self.samples.len();
        for frame in data.chunks_mut(channels.max(1)) {
            let value = self.samples.get(self.position).copied().unwrap_or(0.0);
            frame.fill(value);
            self.position += 1;
        }
        if was_done {
            self.drained = true;
        }
        self.drained
    }
}

/// Plays `buffer` and returns once it has finished.
pub fn play_blocking(buffer: &AudioBuffer) -> Result<()> {
    play(buffer)?.wait();
    Ok(())
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// This function searches through available audio configurations and selects
/// the one that best matches our requirements:
/// - 32-bit float format
/// - Sample rate range containing the target
/// - Fewest channels (mono preferred)
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}
