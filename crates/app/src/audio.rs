use anyhow::Result;
use blowout_core::constants::FFT_SIZE;
use blowout_core::{
    sanitize_frame_rate, CaptureError, CaptureProvider, SpectralAnalyzer, SpectrumSource,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SizedSample;
use log::{info, warn};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Opens capture sessions on a named input device ("default" for the host default).
pub struct Microphone {
    device_name: String,
    frame_rate: f32,
}

impl Microphone {
    /// The frame rate sizes the capture buffer so one frame of audio always fits.
    pub fn with_frame_rate(device_name: impl Into<String>, frame_rate: f32) -> Self {
        Self {
            device_name: device_name.into(),
            frame_rate: sanitize_frame_rate(frame_rate),
        }
    }

    fn find_device(&self, host: &cpal::Host) -> Result<cpal::Device, CaptureError> {
        if self.device_name == "default" {
            host.default_input_device()
                .ok_or_else(|| CaptureError::DeviceUnavailable("No default input found".into()))
        } else {
            host.input_devices()
                .map_err(capture_error)?
                .find(|d| d.name().ok().as_deref() == Some(self.device_name.as_str()))
                .ok_or_else(|| {
                    CaptureError::DeviceUnavailable(format!(
                        "Input device not found: {}",
                        self.device_name
                    ))
                })
        }
    }
}

impl CaptureProvider for Microphone {
    type Session = CaptureSession;

    fn open(&mut self) -> Result<CaptureSession, CaptureError> {
        let host = cpal::default_host();
        info!("Audio host: {}", host.id().name());

        let device = self.find_device(&host)?;
        info!("Using input device: {}", device.name().unwrap_or_default());

        let supported = device.default_input_config().map_err(capture_error)?;
        let sample_format = supported.sample_format();
        let sample_rate = supported.sample_rate().0;
        let channels = usize::from(supported.channels()).max(1);
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer_size = ring_capacity(sample_rate, self.frame_rate);
        let (producer, consumer) = HeapRb::<f32>::new(buffer_size).split();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_mono_stream(&device, &config, channels, producer, |s: f32| s)
            }
            cpal::SampleFormat::I16 => {
                build_mono_stream(&device, &config, channels, producer, i16_to_f32)
            }
            cpal::SampleFormat::U16 => {
                build_mono_stream(&device, &config, channels, producer, u16_to_f32)
            }
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(capture_error)?;
        stream.play().map_err(capture_error)?;

        info!(
            "Microphone open ({} Hz, {} ch, {:?})",
            sample_rate, channels, sample_format
        );
        Ok(CaptureSession {
            stream: Some(stream),
            samples: consumer,
            scratch: vec![0.0; FFT_SIZE],
            analyzer: SpectralAnalyzer::new(sample_rate),
        })
    }
}

/// A live microphone stream feeding a spectral analyzer.
pub struct CaptureSession {
    stream: Option<cpal::Stream>,
    samples: HeapCons<f32>,
    scratch: Vec<f32>,
    analyzer: SpectralAnalyzer,
}

impl SpectrumSource for CaptureSession {
    fn read_spectrum(&mut self) -> Option<&[u8]> {
        self.stream.as_ref()?;
        drain_into(&mut self.samples, &mut self.scratch, &mut self.analyzer);
        Some(self.analyzer.refresh())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause input stream: {}", e);
            }
            drop(stream);
            self.analyzer.reset();
            info!("Microphone released");
        }
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_mono_stream<T: SizedSample + 'static>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut producer: HeapProd<f32>,
    to_f32: fn(T) -> f32,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            downmix_into(&mut producer, data, channels, to_f32);
        },
        |err| warn!("Input error: {}", err),
        None,
    )
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

fn u16_to_f32(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

/// Ring capacity in mono samples: two frames of audio at the evaluation
/// rate, never less than 100ms or one transform. The producer drops the
/// newest samples once full, so a frame's worth must always fit.
fn ring_capacity(sample_rate: u32, frame_rate: f32) -> usize {
    let per_frame = (sample_rate as f32 / sanitize_frame_rate(frame_rate)).ceil() as usize;
    (per_frame * 2).max(sample_rate as usize / 10).max(FFT_SIZE)
}

/// Averages interleaved frames down to mono. Samples that don't fit are dropped.
fn downmix_into<P, T>(producer: &mut P, data: &[T], channels: usize, to_f32: fn(T) -> f32)
where
    P: Producer<Item = f32>,
    T: Copy,
{
    for frame in data.chunks(channels) {
        let mono = frame.iter().map(|&s| to_f32(s)).sum::<f32>() / frame.len() as f32;
        let _ = producer.try_push(mono);
    }
}

/// Moves everything captured since the last read into the analyzer.
fn drain_into<C: Consumer<Item = f32>>(
    consumer: &mut C,
    scratch: &mut [f32],
    analyzer: &mut SpectralAnalyzer,
) {
    loop {
        let read = consumer.pop_slice(scratch);
        if read == 0 {
            break;
        }
        analyzer.push_samples(&scratch[..read]);
    }
}

fn capture_error(err: impl std::fmt::Display) -> CaptureError {
    CaptureError::classify(err.to_string())
}

pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    Ok(host
        .input_devices()?
        .map(|d| d.name().unwrap_or("Unknown".to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Observer;

    #[test]
    fn test_downmix_averages_channels() {
        let (mut prod, mut cons) = HeapRb::<f32>::new(8).split();
        downmix_into(&mut prod, &[1.0f32, 0.0, 0.5, 0.5, -1.0, 1.0], 2, |s| s);

        let mut out = [0.0f32; 3];
        assert_eq!(cons.pop_slice(&mut out), 3);
        assert_eq!(out, [0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_downmix_drops_when_full() {
        let (mut prod, cons) = HeapRb::<f32>::new(2).split();
        downmix_into(&mut prod, &[0.1f32, 0.2, 0.3, 0.4], 1, |s| s);
        assert_eq!(cons.occupied_len(), 2);
    }

    #[test]
    fn test_integer_samples_convert_to_unit_range() {
        assert_eq!(i16_to_f32(0), 0.0);
        assert_eq!(i16_to_f32(i16::MAX), 1.0);
        assert!((i16_to_f32(i16::MIN) + 1.0).abs() < 1e-4);

        assert_eq!(u16_to_f32(0), -1.0);
        assert_eq!(u16_to_f32(u16::MAX), 1.0);
        assert!(u16_to_f32(32768).abs() < 1e-4);
    }

    #[test]
    fn test_downmix_converts_integer_frames() {
        let (mut prod, mut cons) = HeapRb::<f32>::new(4).split();
        downmix_into(&mut prod, &[i16::MAX, 0, i16::MAX, i16::MAX], 2, i16_to_f32);
        downmix_into(&mut prod, &[u16::MAX, 0], 1, u16_to_f32);

        let mut out = [0.0f32; 4];
        assert_eq!(cons.pop_slice(&mut out), 4);
        assert_eq!(out, [0.5, 1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_ring_holds_a_frame_at_low_rates() {
        assert_eq!(ring_capacity(48000, 60.0), 4800);
        assert_eq!(ring_capacity(48000, 5.0), 19200);
        assert_eq!(ring_capacity(48000, 1e-30), 96000);
        assert_eq!(ring_capacity(1000, 1000.0), FFT_SIZE);
    }

    #[test]
    fn test_drain_empties_ring_buffer() {
        let (mut prod, mut cons) = HeapRb::<f32>::new(FFT_SIZE * 3).split();
        let tone: Vec<f32> = (0..FFT_SIZE * 2)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 375.0 * i as f32 / 48000.0).sin())
            .collect();
        prod.push_slice(&tone);

        let mut analyzer = SpectralAnalyzer::new(48000);
        let mut scratch = vec![0.0; FFT_SIZE];
        drain_into(&mut cons, &mut scratch, &mut analyzer);

        assert_eq!(cons.occupied_len(), 0);
        assert_eq!(analyzer.refresh()[4], 255);
    }

    #[test]
    fn test_unknown_device_is_unavailable() {
        let mut mic = Microphone::with_frame_rate("blowout-test-device-that-does-not-exist", 60.0);
        assert!(mic.open().is_err());
    }
}
