//! Seams between the decision engine and whatever produces spectra.

use crate::error::CaptureError;

/// A live, refreshable magnitude spectrum.
///
/// Implementations refresh one backing buffer in place; the returned slice
/// is only valid until the next call.
pub trait SpectrumSource {
    /// Refreshes and returns the current byte magnitudes (0-255 per bin).
    /// Returns `None` once the source has been stopped.
    fn read_spectrum(&mut self) -> Option<&[u8]>;

    /// Releases the underlying device. Safe to call any number of times.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Acquires spectrum sources, e.g. by opening a microphone.
pub trait CaptureProvider {
    type Session: SpectrumSource;

    /// Either a fully wired session or an error; never a partial session.
    fn open(&mut self) -> Result<Self::Session, CaptureError>;
}
