//! Pixel-to-pixel diversion between two images of the same size.
//!
//! Sums the metric distance of every pair of co-located pixels. Used to
//! compare a quantized image against its source independently of the MSE the
//! clustering reports.

use imgref::ImgRef;
use rgb::RGB8;

use crate::distance::DistanceMetric;
use crate::error::{ClusterError, Result};
use crate::sample::Sample;

/// Sum of per-pixel distances between `a` and `b`.
pub fn pixel_diversion<M: DistanceMetric<3>>(
    a: ImgRef<'_, RGB8>,
    b: ImgRef<'_, RGB8>,
    metric: &M,
) -> Result<f64> {
    check_shape(a, b)?;
    let total = a
        .rows()
        .zip(b.rows())
        .flat_map(|(ra, rb)| ra.iter().zip(rb.iter()))
        .map(|(pa, pb)| f64::from(metric.distance(&pa.channels(), &pb.channels())))
        .sum();
    Ok(total)
}

/// [`pixel_diversion`] divided by the pixel count; `0.0` for empty images.
pub fn mean_pixel_diversion<M: DistanceMetric<3>>(
    a: ImgRef<'_, RGB8>,
    b: ImgRef<'_, RGB8>,
    metric: &M,
) -> Result<f64> {
    let total = pixel_diversion(a, b, metric)?;
    let n = a.width() * a.height();
    Ok(if n == 0 { 0.0 } else { total / n as f64 })
}

fn check_shape(a: ImgRef<'_, RGB8>, b: ImgRef<'_, RGB8>) -> Result<()> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(ClusterError::ShapeMismatch {
            left: (a.width(), a.height()),
            right: (b.width(), b.height()),
        });
    }
    Ok(())
}
