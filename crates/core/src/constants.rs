//! Shared constants for blow detection.

/// Transform length in samples.
pub const FFT_SIZE: usize = 512;

/// Magnitude bins exposed per snapshot (half the transform length).
pub const BIN_COUNT: usize = FFT_SIZE / 2;

/// Weight of the previous spectrum in the exponential smoothing (0.0-1.0)
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.3;

/// dB value mapped to byte 0
pub const MIN_DECIBELS: f32 = -100.0;

/// dB value mapped to byte 255
pub const MAX_DECIBELS: f32 = -30.0;

/// Number of lowest bins averaged into the low-end energy feature.
/// Roughly 0Hz to ~1300Hz at 44.1k/48k.
pub const LOW_END_BINS: usize = 15;

/// Low-end energy (0-255 scale) that must be strictly exceeded for a frame to count.
pub const BLOW_THRESHOLD: u8 = 150;

/// Consecutive qualifying frames that must be exceeded before firing (~330ms @ 60fps).
pub const REQUIRED_FRAMES: u32 = 20;

/// Evaluation cadence `REQUIRED_FRAMES` is calibrated for.
pub const REFERENCE_FRAME_RATE: f32 = 60.0;

/// Evaluation cadences outside this range are clamped.
pub const MIN_FRAME_RATE: f32 = 1.0;
pub const MAX_FRAME_RATE: f32 = 1000.0;
