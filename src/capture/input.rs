// src/capture/input.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::capture::{FrameSource, SampleFrame};
use crate::config::{CHANNELS, SpectrogramConfig};
use crate::error::{Result, SpectrogramError};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Shared between the cpal callbacks and the reading side.
#[derive(Default)]
struct StreamHealth {
    fault: Mutex<Option<String>>,
    dropped: AtomicU64,
}

/// Reading end of the capture ring: hands out whole frames, watching the
/// stream's health while it waits.
struct FrameReader {
    consumer: HeapCons<i16>,
    health: Arc<StreamHealth>,
    frame_size: usize,
    timeout: Duration,
    reported_drops: u64,
}

impl FrameReader {
    fn new(
        consumer: HeapCons<i16>,
        health: Arc<StreamHealth>,
        frame_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            consumer,
            health,
            frame_size,
            timeout,
            reported_drops: 0,
        }
    }

    fn check_health(&mut self) -> Result<()> {
        if let Ok(fault) = self.health.fault.lock() {
            if let Some(msg) = fault.as_ref() {
                return Err(SpectrogramError::Device(msg.clone()));
            }
        }
        let dropped = self.health.dropped.load(Ordering::Relaxed);
        if dropped > self.reported_drops {
            log::warn!(
                "capture ring overflowed, {} samples dropped",
                dropped - self.reported_drops
            );
            self.reported_drops = dropped;
        }
        Ok(())
    }

    /// Block until a whole frame is buffered and pop exactly that much.
    /// Anything beyond it stays queued for the next call.
    fn read_frame(&mut self) -> Result<SampleFrame> {
        let deadline = Instant::now() + self.timeout;
        loop {
            self.check_health()?;
            if self.consumer.occupied_len() >= self.frame_size {
                let mut samples = vec![0i16; self.frame_size];
                let n = self.consumer.pop_slice(&mut samples);
                debug_assert_eq!(n, self.frame_size);
                return Ok(SampleFrame::new(samples));
            }
            if Instant::now() >= deadline {
                return Err(SpectrogramError::Device(format!(
                    "timed out after {:?} waiting for {} samples",
                    self.timeout, self.frame_size
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Microphone capture. The cpal callback pushes channel 0 into a lock-free
/// ring; `acquire_frame` pops one frame at a time off the other end.
pub struct MicSource {
    stream: Option<Stream>,
    reader: FrameReader,
}

impl MicSource {
    /// Open the default input device, or the first one whose name contains
    /// `device_name`, at the configured rate.
    pub fn open(config: &SpectrogramConfig, device_name: Option<&str>) -> Result<Self> {
        config.validate()?;

        let host = cpal::default_host();
        let device = match device_name {
            Some(wanted) => host
                .input_devices()
                .map_err(device_err)?
                .find(|d| d.name().map(|n| n.contains(wanted)).unwrap_or(false))
                .ok_or_else(|| {
                    SpectrogramError::Device(format!("no input device matching {wanted:?}"))
                })?,
            None => host
                .default_input_device()
                .ok_or_else(|| SpectrogramError::Device("no input device available".into()))?,
        };
        let name = device.name().unwrap_or_else(|_| "<unnamed>".into());

        let (sample_format, stream_config) = pick_config(&device, config.sample_rate)?;
        log::info!(
            "opening input {name:?}: {} Hz, {} channel(s), {:?}",
            stream_config.sample_rate.0,
            stream_config.channels,
            sample_format
        );

        // Room for a few frames so a slow tick does not immediately drop audio.
        let rb = HeapRb::<i16>::new(config.frame_size * 4);
        let (producer, consumer) = rb.split();
        let health = Arc::new(StreamHealth::default());

        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, producer, health.clone())?,
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, producer, health.clone())?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, producer, health.clone())?,
            other => {
                return Err(SpectrogramError::Device(format!(
                    "unsupported sample format: {other:?}"
                )));
            }
        };

        Ok(Self {
            stream: Some(stream),
            reader: FrameReader::new(
                consumer,
                health,
                config.frame_size,
                config.device_timeout(),
            ),
        })
    }
}

impl FrameSource for MicSource {
    fn acquire_frame(&mut self) -> Result<SampleFrame> {
        if self.stream.is_none() {
            return Err(SpectrogramError::Device("input stream is closed".into()));
        }
        self.reader.read_frame()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("failed to pause input stream: {e}");
            }
            drop(stream);
            log::info!("input stream closed");
        }
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn device_err(e: impl std::fmt::Display) -> SpectrogramError {
    SpectrogramError::Device(e.to_string())
}

/// Find a supported config running at `rate`. Mono beats multichannel,
/// i16 beats the formats we have to convert.
fn pick_config(device: &cpal::Device, rate: u32) -> Result<(SampleFormat, StreamConfig)> {
    let score = |channels: u16, format: SampleFormat| {
        let mut s = 0;
        if channels == CHANNELS {
            s += 2;
        }
        if format == SampleFormat::I16 {
            s += 1;
        }
        s
    };

    let best = device
        .supported_input_configs()
        .map_err(device_err)?
        .filter(|range| {
            range.min_sample_rate().0 <= rate
                && rate <= range.max_sample_rate().0
                && matches!(
                    range.sample_format(),
                    SampleFormat::I16 | SampleFormat::F32 | SampleFormat::U16
                )
        })
        .max_by_key(|range| score(range.channels(), range.sample_format()))
        .ok_or_else(|| {
            SpectrogramError::Device(format!("input device cannot capture at {rate} Hz"))
        })?;

    let supported = best.with_sample_rate(SampleRate(rate));
    Ok((supported.sample_format(), supported.into()))
}

/// Build an input stream for sample type `T`, converting to i16 and keeping
/// only the first channel of each interleaved frame.
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: HeapProd<i16>,
    health: Arc<StreamHealth>,
) -> Result<Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = config.channels as usize;
    let err_health = health.clone();
    let err_fn = move |err: cpal::StreamError| {
        log::error!("input stream error: {err}");
        if let Ok(mut fault) = err_health.fault.lock() {
            fault.get_or_insert_with(|| err.to_string());
        }
    };

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let frames = data.len() / channels;
                let pushed = producer.push_iter(
                    data.chunks_exact(channels)
                        .map(|frame| i16::from_sample(frame[0])),
                );
                if pushed < frames {
                    // ring full -> the reader is behind; drop the rest
                    health
                        .dropped
                        .fetch_add((frames - pushed) as u64, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )
        .map_err(device_err)?;

    stream.play().map_err(device_err)?;
    Ok(stream)
}
