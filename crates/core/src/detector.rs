//! Debounced blow detection over a live spectrum.
//!
//! Each tick averages the lowest `LOW_END_BINS` bins. Frames above
//! `BLOW_THRESHOLD` build up a consistency count, quieter frames decay it by
//! one, and the callback fires once the count exceeds the required frames.
//! Firing tears the capture session down, so a session triggers at most once.

use crate::capture::{CaptureProvider, SpectrumSource};
use crate::constants::{
    BLOW_THRESHOLD, LOW_END_BINS, MAX_FRAME_RATE, MIN_FRAME_RATE, REFERENCE_FRAME_RATE,
    REQUIRED_FRAMES,
};
use crate::error::CaptureError;
use log::{debug, info, warn};

/// Mean magnitude of the low-end bins. Missing bins count as silence.
pub fn low_end_energy(spectrum: &[u8]) -> f32 {
    let sum: u32 = spectrum.iter().take(LOW_END_BINS).map(|&b| u32::from(b)).sum();
    sum as f32 / LOW_END_BINS as f32
}

/// Clamps an evaluation cadence into `MIN_FRAME_RATE..=MAX_FRAME_RATE`.
/// NaN and infinities fall back to the reference rate.
pub fn sanitize_frame_rate(frame_rate: f32) -> f32 {
    if !frame_rate.is_finite() {
        return REFERENCE_FRAME_RATE;
    }
    frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE)
}

/// Rescales `REQUIRED_FRAMES` so the sustained duration stays the same at
/// another evaluation cadence.
pub fn required_frames_for_rate(frame_rate: f32) -> u32 {
    let frame_rate = sanitize_frame_rate(frame_rate);
    let scaled = (REQUIRED_FRAMES as f32 * frame_rate / REFERENCE_FRAME_RATE).round();
    (scaled as u32).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Listening,
    Triggered,
}

/// What `start` achieved. `Unavailable` means only manual fallback remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Listening,
    Unavailable(CaptureError),
}

impl Capability {
    pub fn is_listening(&self) -> bool {
        matches!(self, Capability::Listening)
    }
}

/// Outcome of one evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not listening; nothing was read.
    Inactive,
    Listening { consistency: u32 },
    /// The callback ran on this tick and the session is gone.
    Detected,
}

pub struct BlowDetector<P: CaptureProvider> {
    provider: P,
    session: Option<P::Session>,
    on_detected: Option<Box<dyn FnOnce()>>,
    state: DetectorState,
    consistency: u32,
    required_frames: u32,
}

impl<P: CaptureProvider> BlowDetector<P> {
    /// Detector calibrated for a 60Hz evaluation cadence.
    pub fn new(provider: P) -> Self {
        Self::with_frame_rate(provider, REFERENCE_FRAME_RATE)
    }

    pub fn with_frame_rate(provider: P, frame_rate: f32) -> Self {
        Self {
            provider,
            session: None,
            on_detected: None,
            state: DetectorState::Idle,
            consistency: 0,
            required_frames: required_frames_for_rate(frame_rate),
        }
    }

    /// Opens a capture session and arms the detector.
    ///
    /// Calling this while already listening is a no-op. Capture failures are
    /// logged and reported through the returned flag, never propagated; the
    /// callback is then dropped without being called.
    pub fn start<F>(&mut self, on_detected: F) -> Capability
    where
        F: FnOnce() + 'static,
    {
        if self.state == DetectorState::Listening {
            return Capability::Listening;
        }

        match self.provider.open() {
            Ok(session) => {
                self.session = Some(session);
                self.on_detected = Some(Box::new(on_detected));
                self.consistency = 0;
                self.state = DetectorState::Listening;
                info!(
                    "Listening for blow (threshold {}, {} frames)",
                    BLOW_THRESHOLD, self.required_frames
                );
                Capability::Listening
            }
            Err(e) => {
                warn!("Microphone access denied or error: {}", e);
                Capability::Unavailable(e)
            }
        }
    }

    /// Runs one evaluation. Call once per frame.
    pub fn tick(&mut self) -> Tick {
        if self.state != DetectorState::Listening {
            return Tick::Inactive;
        }

        let energy = self
            .session
            .as_mut()
            .and_then(|s| s.read_spectrum())
            .map(low_end_energy);
        let Some(energy) = energy else {
            warn!("Capture session ended underneath the detector");
            self.stop();
            return Tick::Inactive;
        };

        if energy > f32::from(BLOW_THRESHOLD) {
            self.consistency += 1;
            if self.consistency > self.required_frames {
                info!("Blow detected after {} frames", self.consistency);
                if let Some(callback) = self.on_detected.take() {
                    callback();
                }
                self.release();
                self.state = DetectorState::Triggered;
                return Tick::Detected;
            }
        } else {
            self.consistency = self.consistency.saturating_sub(1);
        }
        debug!("low end {:.1}, consistency {}", energy, self.consistency);

        Tick::Listening {
            consistency: self.consistency,
        }
    }

    /// Halts evaluation and releases the capture session. Idempotent.
    pub fn stop(&mut self) {
        self.release();
        if self.state == DetectorState::Listening {
            self.state = DetectorState::Idle;
        }
    }

    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.on_detected = None;
        self.consistency = 0;
    }

    /// The current spectrum snapshot, only while listening.
    pub fn read_spectrum(&mut self) -> Option<&[u8]> {
        if self.state != DetectorState::Listening {
            return None;
        }
        self.session.as_mut()?.read_spectrum()
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == DetectorState::Listening
    }

    pub fn consistency(&self) -> u32 {
        self.consistency
    }

    pub fn required_frames(&self) -> u32 {
        self.required_frames
    }
}

impl<P: CaptureProvider> Drop for BlowDetector<P> {
    fn drop(&mut self) {
        self.release();
    }
}
