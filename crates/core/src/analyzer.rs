//! Analyser-node style spectral analysis on raw PCM.
//!
//! Produces byte magnitudes (0-255) from the most recent `FFT_SIZE` samples,
//! smoothed across refreshes to suppress single-frame jitter.

use crate::constants::{BIN_COUNT, FFT_SIZE, MAX_DECIBELS, MIN_DECIBELS, SMOOTHING_TIME_CONSTANT};
use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::{samples_fft_to_spectrum, FrequencyLimit};

pub struct SpectralAnalyzer {
    sample_rate: u32,
    history: Vec<f32>,
    // Pre-computed Blackman coefficients (a0=0.42, a1=0.5, a2=0.08)
    window: Vec<f32>,
    windowed: Vec<f32>,
    smoothed: Vec<f32>,
    bins: Vec<u8>,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        let window = (0..FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32;
                0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
            })
            .collect();

        Self {
            sample_rate,
            history: vec![0.0; FFT_SIZE],
            window,
            windowed: vec![0.0; FFT_SIZE],
            smoothed: vec![0.0; BIN_COUNT],
            bins: vec![0; BIN_COUNT],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Appends mono samples, keeping only the most recent `FFT_SIZE`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let incoming = if samples.len() > FFT_SIZE {
            &samples[samples.len() - FFT_SIZE..]
        } else {
            samples
        };
        let n = incoming.len();
        self.history.copy_within(n.., 0);
        for (slot, &sample) in self.history[FFT_SIZE - n..].iter_mut().zip(incoming) {
            *slot = if sample.is_finite() { sample } else { 0.0 };
        }
    }

    /// Recomputes the spectrum from the current history and returns the
    /// refreshed byte bins. The same buffer is reused on every call.
    pub fn refresh(&mut self) -> &[u8] {
        for ((out, &sample), &coef) in self
            .windowed
            .iter_mut()
            .zip(&self.history)
            .zip(&self.window)
        {
            *out = sample * coef;
        }

        let spectrum = match samples_fft_to_spectrum(
            &self.windowed,
            self.sample_rate,
            FrequencyLimit::All,
            Some(&divide_by_N),
        ) {
            Ok(spectrum) => spectrum,
            Err(e) => {
                log::error!("Spectrum analysis failed, keeping previous snapshot: {:?}", e);
                return &self.bins;
            }
        };

        let tau = SMOOTHING_TIME_CONSTANT;
        let range_scale = 1.0 / (MAX_DECIBELS - MIN_DECIBELS);
        for ((smoothed, byte), (_, magnitude)) in self
            .smoothed
            .iter_mut()
            .zip(self.bins.iter_mut())
            .zip(spectrum.data().iter())
        {
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude.val();
            let db = 20.0 * smoothed.log10();
            let scaled = 255.0 * (db - MIN_DECIBELS) * range_scale;
            // NaN and -inf (silent bins) both land on 0
            *byte = if scaled.is_nan() { 0 } else { scaled.clamp(0.0, 255.0) as u8 };
        }

        &self.bins
    }

    /// The snapshot produced by the last refresh.
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
        self.bins.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::low_end_energy;

    const RATE: u32 = 48000;

    // 375 Hz sits exactly on bin 4 at 48kHz / 512
    fn low_tone(amplitude: f32) -> Vec<f32> {
        (0..FFT_SIZE)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * 375.0 * i as f32 / RATE as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_new_analyzer_is_silent() {
        let analyzer = SpectralAnalyzer::new(RATE);
        assert_eq!(analyzer.bins().len(), BIN_COUNT);
        assert!(analyzer.bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_silence_produces_zero_bins() {
        let mut analyzer = SpectralAnalyzer::new(RATE);
        analyzer.push_samples(&[0.0; FFT_SIZE]);
        let bins = analyzer.refresh();
        assert_eq!(bins.len(), BIN_COUNT);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_low_tone_lands_in_low_end() {
        let mut analyzer = SpectralAnalyzer::new(RATE);
        analyzer.push_samples(&low_tone(0.5));
        let bins = analyzer.refresh();
        assert_eq!(bins[4], 255, "tone bin should saturate: {:?}", &bins[..8]);
        assert!(bins[200] < 50, "far bin should stay quiet: {}", bins[200]);
        assert!(low_end_energy(bins) > 0.0);
    }

    #[test]
    fn test_refresh_reuses_buffer() {
        let mut analyzer = SpectralAnalyzer::new(RATE);
        let first = analyzer.refresh().as_ptr();
        analyzer.push_samples(&low_tone(0.2));
        let second = analyzer.refresh().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_smoothing_holds_then_decays() {
        let mut analyzer = SpectralAnalyzer::new(RATE);
        analyzer.push_samples(&low_tone(0.5));
        analyzer.refresh();

        analyzer.push_samples(&[0.0; FFT_SIZE]);
        let held = analyzer.refresh()[4];
        assert!(held > 200, "one silent frame should not erase the peak: {}", held);

        for _ in 0..20 {
            analyzer.refresh();
        }
        assert_eq!(analyzer.bins()[4], 0);
    }

    #[test]
    fn test_non_finite_samples_are_zeroed() {
        let mut analyzer = SpectralAnalyzer::new(RATE);
        analyzer.push_samples(&[f32::NAN; FFT_SIZE]);
        analyzer.push_samples(&[f32::INFINITY; 16]);
        let bins = analyzer.refresh();
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_push_keeps_most_recent_window() {
        let mut analyzer = SpectralAnalyzer::new(RATE);
        let mut long = vec![1.0f32; FFT_SIZE];
        long.extend(low_tone(0.5));
        analyzer.push_samples(&long);
        assert_eq!(analyzer.history, low_tone(0.5));

        analyzer.push_samples(&[0.25; 4]);
        assert_eq!(&analyzer.history[FFT_SIZE - 4..], &[0.25; 4]);
        assert_eq!(analyzer.history[0], low_tone(0.5)[4]);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut analyzer = SpectralAnalyzer::new(RATE);
        analyzer.push_samples(&low_tone(0.5));
        analyzer.refresh();
        analyzer.reset();
        assert!(analyzer.bins().iter().all(|&b| b == 0));
        assert!(analyzer.refresh().iter().all(|&b| b == 0));
    }
}
