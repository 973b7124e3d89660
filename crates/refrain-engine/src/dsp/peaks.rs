use crate::dsp::spectrogram::Spectrogram;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakConfig {
    /// Side of the square neighbourhood, in cells.
    pub neighborhood_size: usize,
    /// A peak must be strictly louder than this (dB).
    pub amplitude_min: f32,
}

/// A landmark: a cell that dominates its neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub time_frame: u32,
    pub frequency_bin: u32,
    pub magnitude: f32,
}

/// Extract landmarks from a spectrogram.
///
/// A cell is a peak when it equals the maximum of the neighbourhood
/// `[t - h, t + h] × [f - h, f + h]` (with `h = neighborhood_size / 2`) and
/// exceeds `amplitude_min`. Cells closer than `h` to any border are never
/// peaks. The result is sorted by time frame, then frequency bin; hashing
/// depends on this order.
#[allow(clippy::cast_possible_truncation)]
pub fn find_peaks(spectrogram: &Spectrogram, config: &PeakConfig) -> Vec<Peak> {
    let half = config.neighborhood_size / 2;
    let frames = spectrogram.frames();
    let bins = spectrogram.bins();

    if frames < 2 * half + 1 || bins < 2 * half + 1 {
        return Vec::new();
    }

    // Square-window maximum, separated into a pass along frequency and one
    // along time. Cells within `half` of a border are left at -inf and are
    // never candidates.
    let mut freq_max = vec![f32::NEG_INFINITY; frames * bins];
    for t in 0..frames {
        let row = spectrogram.frame(t);
        for f in half..bins - half {
            freq_max[t * bins + f] = window_max(&row[f - half..=f + half]);
        }
    }

    let mut peaks = Vec::new();
    for t in half..frames - half {
        for f in half..bins - half {
            let value = spectrogram.get(t, f);
            if value <= config.amplitude_min {
                continue;
            }

            let neighbourhood_max = (t - half..=t + half)
                .map(|tt| freq_max[tt * bins + f])
                .fold(f32::NEG_INFINITY, f32::max);

            if value >= neighbourhood_max {
                peaks.push(Peak {
                    time_frame: t as u32,
                    frequency_bin: f as u32,
                    magnitude: value,
                });
            }
        }
    }

    peaks
}

fn window_max(values: &[f32]) -> f32 {
    values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}
