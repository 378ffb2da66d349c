use std::hash::Hash;

use crate::error::{ClusterError, Result};

/// An input point with `D` 8-bit channels.
///
/// Samples are compared with exact per-channel equality when deduplicating,
/// and promoted to `f32` coordinates for every distance computation so
/// channel differences never wrap.
pub trait Sample<const D: usize>: Copy + Eq + Hash {
    fn channels(&self) -> [f32; D];
}

impl<const D: usize> Sample<D> for [u8; D] {
    #[inline]
    fn channels(&self) -> [f32; D] {
        self.map(f32::from)
    }
}

impl Sample<3> for rgb::RGB<u8> {
    #[inline]
    fn channels(&self) -> [f32; 3] {
        [f32::from(self.r), f32::from(self.g), f32::from(self.b)]
    }
}

/// Split an interleaved channel buffer (e.g. `RGBRGB...`) into `D`-channel points.
pub fn points_from_interleaved<const D: usize>(buf: &[u8]) -> Result<Vec<[u8; D]>> {
    if D == 0 || buf.len() % D != 0 {
        return Err(ClusterError::DimensionMismatch {
            expected: D,
            found: buf.len() % D.max(1),
        });
    }
    Ok(buf
        .chunks_exact(D)
        .map(|c| {
            let mut p = [0u8; D];
            p.copy_from_slice(c);
            p
        })
        .collect())
}

/// Round and clamp `f32` coordinates back to 8-bit channels.
#[inline]
pub fn to_u8_channels<const D: usize>(coords: &[f32; D]) -> [u8; D] {
    coords.map(|c| c.round().clamp(0.0, 255.0) as u8)
}
