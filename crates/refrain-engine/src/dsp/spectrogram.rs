use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

/// Power below this is clamped before taking the logarithm.
const POWER_FLOOR: f32 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrogramConfig {
    pub window_size: usize,
    pub overlap_ratio: f64,
}

impl SpectrogramConfig {
    /// Samples between the starts of consecutive frames.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn hop(&self) -> usize {
        ((self.window_size as f64 * (1.0 - self.overlap_ratio)) as usize).max(1)
    }

    pub fn bins(&self) -> usize {
        self.window_size / 2 + 1
    }
}

/// Log-power time×frequency matrix, stored frame by frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    bins: usize,
    frames: usize,
    data: Vec<f32>,
}

impl Spectrogram {
    /// Build the spectrogram of one channel.
    ///
    /// Frames of `window_size` samples advance by [`SpectrogramConfig::hop`];
    /// a trailing partial frame is dropped, so inputs shorter than one
    /// window produce an empty matrix.
    pub fn build(samples: &[f32], config: &SpectrogramConfig) -> Self {
        let n = config.window_size;
        let bins = config.bins();
        let hop = config.hop();

        if samples.len() < n {
            return Self {
                bins,
                frames: 0,
                data: Vec::new(),
            };
        }

        let frames = (samples.len() - n) / hop + 1;
        let window = hann_window(n);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);

        let mut data = Vec::with_capacity(frames * bins);
        let mut buffer = vec![Complex { re: 0.0, im: 0.0 }; n];

        for frame in 0..frames {
            let start = frame * hop;
            for ((slot, &sample), &w) in buffer
                .iter_mut()
                .zip(&samples[start..start + n])
                .zip(&window)
            {
                *slot = Complex {
                    re: sample * w,
                    im: 0.0,
                };
            }

            fft.process(&mut buffer);

            data.extend(
                buffer[..bins]
                    .iter()
                    .map(|c| 10.0 * c.norm_sqr().max(POWER_FLOOR).log10()),
            );
        }

        Self { bins, frames, data }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Log-power of one cell.
    ///
    /// # Panics
    /// Panics if `frame` or `bin` is out of range.
    pub fn get(&self, frame: usize, bin: usize) -> f32 {
        self.data[frame * self.bins + bin]
    }

    /// All bins of one frame.
    pub fn frame(&self, frame: usize) -> &[f32] {
        &self.data[frame * self.bins..(frame + 1) * self.bins]
    }
}

#[allow(clippy::cast_precision_loss)]
fn hann_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    let n = size as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (n - 1.0)).cos()))
        .collect()
}
