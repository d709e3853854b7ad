//! Concrete [`Microphone`] implementation: continuous `cpal` capture with
//! WebRTC voice-activity detection for endpointing.
//!
//! Grounded on `KSattaluri-MangoChat`'s `AudioCapture` — a dedicated cpal
//! input stream feeding raw samples to a `std::sync::mpsc` channel consumed
//! by a plain thread, adapted here from that example's FFT-visualization
//! pipeline down to the VAD-only onset/endpoint detection the engine needs.
//!
//! There is no wake-word keyword model here; that belongs to a narrow
//! external collaborator out of scope for this engine, so both `wakeup` and
//! `listen` treat the onset and continuation of voiced audio as the
//! trigger. A real deployment would swap this for a proper wake-word engine
//! behind the same trait.

use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use avs_core::collaborators::Microphone;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use webrtc_vad::{SampleRate as VadSampleRate, Vad, VadMode};

const TARGET_SAMPLE_RATE: u32 = 16_000;
const VAD_FRAME_SAMPLES: usize = 320; // 20ms @ 16kHz, a frame length webrtc-vad accepts
const SILENCE_HANGOVER_MS: f64 = 700.0;
const VOICE_START_FRAMES: usize = 2;

/// Captures microphone audio via `cpal` and endpoints it with a WebRTC VAD.
pub struct CpalMicrophone {
    device_name: Option<String>,
}

impl CpalMicrophone {
    #[must_use]
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn open_device(&self) -> Result<(cpal::Device, StreamConfig, u32), String> {
        let host = cpal::default_host();
        let device = match &self.device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| e.to_string())?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| format!("input device '{name}' not found"))?,
            None => host
                .default_input_device()
                .ok_or_else(|| "no default input device".to_string())?,
        };

        let supported = device.default_input_config().map_err(|e| e.to_string())?;
        let device_rate = supported.sample_rate().0;
        let config = StreamConfig {
            channels: supported.channels().max(1),
            sample_rate: SampleRate(device_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((device, config, device_rate))
    }

    /// Runs one capture session on the calling (blocking) thread until the
    /// mode's stop condition is reached or the stream fails.
    fn run(&self, mode: CaptureMode) -> Option<CaptureResult> {
        let (device, config, device_rate) = match self.open_device() {
            Ok(v) => v,
            Err(e) => {
                log::error!("[CpalMicrophone] failed to open input device: {e}");
                return None;
            }
        };

        let channels = config.channels as usize;
        let decimate = (device_rate / TARGET_SAMPLE_RATE).max(1);

        let (raw_tx, raw_rx) = std_mpsc::sync_channel::<Vec<f32>>(64);
        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono: Vec<f32> = if channels > 1 {
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                        .collect()
                } else {
                    data.to_vec()
                };
                let decimated: Vec<f32> = if decimate > 1 {
                    mono.iter().step_by(decimate as usize).copied().collect()
                } else {
                    mono
                };
                let _ = raw_tx.try_send(decimated);
            },
            |err| log::error!("[CpalMicrophone] stream error: {err}"),
            None,
        );
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::error!("[CpalMicrophone] failed to build input stream: {e}");
                return None;
            }
        };
        if let Err(e) = stream.play() {
            log::error!("[CpalMicrophone] failed to start input stream: {e}");
            return None;
        }

        let outcome = self.pump(mode, &raw_rx);
        drop(stream);
        outcome
    }

    fn pump(&self, mode: CaptureMode, raw_rx: &std_mpsc::Receiver<Vec<f32>>) -> Option<CaptureResult> {
        let mut vad = Vad::new_with_rate_and_mode(VadSampleRate::Rate16kHz, VadMode::Aggressive);
        let mut pending: Vec<i16> = Vec::new();
        let mut voiced_run = 0usize;
        let mut detected_voice = false;
        let mut silence_ms_since_voice = 0.0f64;
        let mut pcm = Vec::new();
        let started = Instant::now();
        let frame_ms = (VAD_FRAME_SAMPLES as f64 / TARGET_SAMPLE_RATE as f64) * 1000.0;

        'capture: loop {
            let chunk = match raw_rx.recv_timeout(Duration::from_millis(500)) {
                Ok(chunk) => chunk,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return None,
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    if let CaptureMode::CaptureUtterance { timeout: Some(t) } = mode {
                        if started.elapsed() >= t {
                            break 'capture Some(CaptureResult { detected_voice, pcm });
                        }
                    }
                    continue;
                }
            };

            pending.extend(
                chunk
                    .iter()
                    .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16),
            );

            while pending.len() >= VAD_FRAME_SAMPLES {
                let frame: Vec<i16> = pending.drain(..VAD_FRAME_SAMPLES).collect();
                let voiced = vad.is_voice_segment(&frame).unwrap_or(false);

                match mode {
                    CaptureMode::WaitForVoiceOnset => {
                        if voiced {
                            voiced_run += 1;
                            if voiced_run >= VOICE_START_FRAMES {
                                break 'capture Some(CaptureResult {
                                    detected_voice: true,
                                    pcm: Vec::new(),
                                });
                            }
                        } else {
                            voiced_run = 0;
                        }
                    }
                    CaptureMode::CaptureUtterance { timeout } => {
                        if voiced {
                            detected_voice = true;
                            silence_ms_since_voice = 0.0;
                        } else if detected_voice {
                            silence_ms_since_voice += frame_ms;
                        }
                        if detected_voice {
                            for sample in &frame {
                                pcm.extend_from_slice(&sample.to_le_bytes());
                            }
                        }
                        if detected_voice && silence_ms_since_voice >= SILENCE_HANGOVER_MS {
                            break 'capture Some(CaptureResult { detected_voice, pcm });
                        }
                        if let Some(t) = timeout {
                            if started.elapsed() >= t {
                                break 'capture Some(CaptureResult { detected_voice, pcm });
                            }
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CaptureMode {
    WaitForVoiceOnset,
    CaptureUtterance { timeout: Option<Duration> },
}

struct CaptureResult {
    detected_voice: bool,
    pcm: Vec<u8>,
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn wakeup(&self, keyword: &str) -> bool {
        log::info!(
            "[CpalMicrophone] waiting for speech onset (configured wake word \"{keyword}\" is not matched against audio content)"
        );
        let device_name = self.device_name.clone();
        let result = tokio::task::spawn_blocking(move || {
            CpalMicrophone::new(device_name).run(CaptureMode::WaitForVoiceOnset)
        })
        .await
        .ok()
        .flatten();
        result.is_some()
    }

    async fn listen(&self, timeout: Option<Duration>) -> Vec<u8> {
        let device_name = self.device_name.clone();
        let result = tokio::task::spawn_blocking(move || {
            CpalMicrophone::new(device_name).run(CaptureMode::CaptureUtterance { timeout })
        })
        .await
        .ok()
        .flatten();
        match result {
            Some(r) if r.detected_voice => r.pcm,
            _ => Vec::new(),
        }
    }
}
