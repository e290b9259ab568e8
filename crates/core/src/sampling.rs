//! Frame sampling contract.
//!
//! A decoded frame with zero-based index `i` is kept iff
//! `i % stride == 0`, where `stride = max(1, floor(native_fps / target_fps))`.
//! Kept frames are numbered from 0 per video.

use crate::cargo_type::CargoType;

/// Default sampling rate for euro-pallet recordings (frames per second).
pub const DEFAULT_FPS_EURO: f64 = 1.0;

/// Default sampling rate for bunker recordings (frames per second).
pub const DEFAULT_FPS_BUNKER: f64 = 0.2;

/// Compute the decode stride for a requested sampling rate.
///
/// Never returns zero. A non-positive or non-finite target rate keeps
/// every frame.
pub fn stride(native_fps: f64, target_fps: f64) -> u64 {
    if !(target_fps.is_finite() && target_fps > 0.0) || !native_fps.is_finite() {
        return 1;
    }
    let ratio = (native_fps / target_fps).floor();
    if ratio < 1.0 {
        1
    } else {
        ratio as u64
    }
}

/// Whether the frame at `index` survives sampling.
pub fn keeps(index: u64, stride: u64) -> bool {
    index % stride.max(1) == 0
}

/// Number of frames kept out of `total_frames` decoded frames.
pub fn expected_kept(total_frames: u64, stride: u64) -> u64 {
    total_frames.div_ceil(stride.max(1))
}

/// File name of the `sequence`-th kept frame of a video.
pub fn frame_file_name(video_stem: &str, sequence: u64) -> String {
    format!("{video_stem}_{sequence:06}.jpg")
}

/// Per-cargo default sampling rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRates {
    pub euro: f64,
    pub bunker: f64,
}

impl Default for FrameRates {
    fn default() -> Self {
        Self {
            euro: DEFAULT_FPS_EURO,
            bunker: DEFAULT_FPS_BUNKER,
        }
    }
}

impl FrameRates {
    /// Effective rate for one video: an explicit override wins, otherwise
    /// the cargo default. Unknown cargo samples at the sparse bunker rate.
    pub fn effective(&self, cargo: CargoType, override_fps: Option<f64>) -> f64 {
        if let Some(fps) = override_fps {
            return fps;
        }
        match cargo {
            CargoType::Euro => self.euro,
            CargoType::Bunker | CargoType::Unknown => self.bunker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_floors_ratio() {
        assert_eq!(stride(25.0, 1.0), 25);
        assert_eq!(stride(25.0, 0.2), 125);
        assert_eq!(stride(29.97, 2.0), 14);
    }

    #[test]
    fn stride_is_never_zero() {
        assert_eq!(stride(10.0, 30.0), 1);
        assert_eq!(stride(25.0, 0.0), 1);
        assert_eq!(stride(25.0, f64::NAN), 1);
    }

    #[test]
    fn kept_indices_are_multiples_of_stride() {
        let kept: Vec<u64> = (0..10).filter(|i| keeps(*i, 3)).collect();
        assert_eq!(kept, vec![0, 3, 6, 9]);
        assert_eq!(expected_kept(10, 3), 4);
        assert_eq!(expected_kept(9, 3), 3);
    }

    #[test]
    fn frame_names_are_zero_padded() {
        assert_eq!(frame_file_name("cam_1", 0), "cam_1_000000.jpg");
        assert_eq!(frame_file_name("cam_1", 42), "cam_1_000042.jpg");
    }

    #[test]
    fn effective_rate_prefers_override() {
        let rates = FrameRates::default();
        assert_eq!(rates.effective(CargoType::Euro, None), 1.0);
        assert_eq!(rates.effective(CargoType::Bunker, None), 0.2);
        assert_eq!(rates.effective(CargoType::Unknown, None), 0.2);
        assert_eq!(rates.effective(CargoType::Bunker, Some(3.0)), 3.0);
    }
}
