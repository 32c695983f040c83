//! Fixed-rate frame pacing for the evaluation loop.

use blowout_core::sanitize_frame_rate;
use std::thread;
use std::time::{Duration, Instant};

pub struct FrameClock {
    interval: Duration,
    next: Instant,
}

impl FrameClock {
    /// The rate is clamped to the supported range first.
    pub fn new(frame_rate: f32) -> Self {
        let rate = sanitize_frame_rate(frame_rate);
        let interval = Duration::from_secs_f64(1.0 / f64::from(rate));
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps until the next frame deadline.
    ///
    /// After a stall the schedule restarts from now rather than firing the
    /// missed frames back to back.
    pub fn wait_next(&mut self) {
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
    }
}
