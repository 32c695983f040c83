pub mod analyzer;
pub mod capture;
pub mod constants;
pub mod detector;
pub mod error;

pub use analyzer::SpectralAnalyzer;
pub use capture::{CaptureProvider, SpectrumSource};
pub use detector::{sanitize_frame_rate, BlowDetector, Capability, DetectorState, Tick};
pub use error::CaptureError;
