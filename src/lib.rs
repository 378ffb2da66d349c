#![forbid(unsafe_code)]

//! Color quantization by k-means clustering with deterministic,
//! mode-seeded initialization.
//!
//! Pixels are deduplicated into unique colors with multiplicities, `k`
//! starting centroids are chosen from the unique colors, and a weighted
//! k-means loop refines them. The per-unique cluster ids are then spread back
//! over the original pixel order.
//!
//! ```
//! use modequant::{InitMethod, QuantizeConfig};
//!
//! let pixels: Vec<rgb::RGB8> = (0..64u8)
//!     .map(|i| rgb::RGB8 { r: i * 4, g: 255 - i * 4, b: 128 })
//!     .collect();
//! let config = QuantizeConfig::new().colors(4).init(InitMethod::Fft);
//! let result = modequant::quantize(&pixels, 8, 8, &config).unwrap();
//! assert_eq!(result.palette_len(), 4);
//! assert_eq!(result.indices().len(), 64);
//! ```

pub mod distance;
pub mod diversion;
pub mod error;
pub mod init;
pub mod kmeans;
pub mod remap;
pub mod sample;
pub mod unique;

pub use distance::{DistanceMetric, Euclidean, RgbDistance};
pub use error::{ClusterError, Result};
pub use init::{FarthestFirst, Initializer, RandomSample, UniformModeDistance};
pub use kmeans::{Clustering, KMeans, KMeansConfig, StopReason};
pub use sample::Sample;
pub use unique::{UniqueSet, dedupe};

use std::time::{Duration, Instant};

use rgb::RGB8;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Clustering of an entire dataset, in original point order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutput<const D: usize> {
    pub centroids: Vec<[f32; D]>,
    /// Cluster of each original point.
    pub assignment: Vec<usize>,
    pub mse: f64,
    pub iterations: usize,
    pub stop_reason: StopReason,
}

/// Cluster `points` into `k` clusters: dedupe, initialize, iterate, expand.
pub fn cluster<S, M, I, const D: usize>(
    points: &[S],
    k: usize,
    metric: &M,
    init: &I,
) -> Result<ClusterOutput<D>>
where
    S: Sample<D>,
    M: DistanceMetric<D>,
    I: Initializer<D>,
{
    cluster_with_config(points, k, metric, init, &KMeansConfig::default())
}

/// [`cluster`] with explicit engine tuning.
pub fn cluster_with_config<S, M, I, const D: usize>(
    points: &[S],
    k: usize,
    metric: &M,
    init: &I,
    config: &KMeansConfig,
) -> Result<ClusterOutput<D>>
where
    S: Sample<D>,
    M: DistanceMetric<D>,
    I: Initializer<D>,
{
    check_k(k, points.len())?;
    let unique = UniqueSet::from_points(points);
    let result = KMeans::new(metric, init)
        .with_config(config.clone())
        .run(&unique, k)?;
    let assignment = remap::expand(&result.assignment, &unique);
    Ok(ClusterOutput {
        centroids: result.centroids,
        assignment,
        mse: result.mse,
        iterations: result.iterations,
        stop_reason: result.stop_reason,
    })
}

fn check_k(k: usize, available: usize) -> Result<()> {
    if k == 0 {
        return Err(ClusterError::ZeroClusters);
    }
    if k > available {
        return Err(ClusterError::TooManyClusters { k, available });
    }
    Ok(())
}

/// Initial centroid strategy for [`quantize`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum InitMethod {
    /// Farthest-first traversal from the mode.
    Fft,
    /// Uniform mode distance with the default spread and relax factors.
    #[default]
    Umdi,
    /// Custom-tuned uniform mode distance.
    UmdiWith(UniformModeDistance),
    /// Seeded random sampling without replacement.
    Random { seed: u64 },
}

impl<const D: usize> Initializer<D> for InitMethod {
    fn select<M: DistanceMetric<D>>(
        &self,
        points: &[[f32; D]],
        counts: &[u32],
        k: usize,
        metric: &M,
    ) -> Result<Vec<[f32; D]>> {
        match *self {
            Self::Fft => FarthestFirst.select(points, counts, k, metric),
            Self::Umdi => UniformModeDistance::default().select(points, counts, k, metric),
            Self::UmdiWith(umdi) => umdi.select(points, counts, k, metric),
            Self::Random { seed } => RandomSample::new(seed).select(points, counts, k, metric),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Fft => "fft",
            Self::Umdi | Self::UmdiWith(_) => "umdi",
            Self::Random { .. } => "random",
        }
    }
}

/// Configuration for image quantization.
#[derive(Debug, Clone)]
pub struct QuantizeConfig {
    /// Number of palette colors (1..=256).
    pub colors: usize,
    /// Initial centroid strategy.
    pub init: InitMethod,
    /// Engine tuning.
    pub kmeans: KMeansConfig,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            colors: 16,
            init: InitMethod::default(),
            kmeans: KMeansConfig::default(),
        }
    }
}

impl QuantizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn colors(mut self, n: usize) -> Self {
        self.colors = n;
        self
    }

    pub fn init(mut self, init: InitMethod) -> Self {
        self.init = init;
        self
    }

    pub fn kmeans(mut self, kmeans: KMeansConfig) -> Self {
        self.kmeans = kmeans;
        self
    }
}

/// Wall-clock time spent in each quantization stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub unique_mapping: Duration,
    pub init_point_selection: Duration,
    pub k_means: Duration,
    pub unique_demapping: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.unique_mapping + self.init_point_selection + self.k_means + self.unique_demapping
    }
}

/// Quantization result.
#[derive(Debug, Clone)]
pub struct QuantizeResult {
    palette: Vec<[u8; 3]>,
    centroids: Vec<[f32; 3]>,
    indices: Vec<u8>,
    mse: f64,
    iterations: usize,
    stop_reason: StopReason,
    timings: StageTimings,
}

impl QuantizeResult {
    /// Palette entries: the final centroids rounded to 8-bit channels.
    pub fn palette(&self) -> &[[u8; 3]] {
        &self.palette
    }

    /// Unrounded final centroids, same order as the palette.
    pub fn centroids(&self) -> &[[f32; 3]] {
        &self.centroids
    }

    /// Palette index of each pixel, in input order.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn palette_len(&self) -> usize {
        self.palette.len()
    }

    /// Count-weighted MSE of the clustering, in squared metric units.
    pub fn mse(&self) -> f64 {
        self.mse
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    /// The quantized image: every pixel replaced by its palette color.
    pub fn render(&self) -> Vec<RGB8> {
        self.indices
            .iter()
            .map(|&i| {
                let [r, g, b] = self.palette[i as usize];
                RGB8 { r, g, b }
            })
            .collect()
    }
}

/// Quantize an RGB image to `config.colors` colors.
pub fn quantize(
    pixels: &[RGB8],
    width: usize,
    height: usize,
    config: &QuantizeConfig,
) -> Result<QuantizeResult> {
    validate_inputs(pixels.len(), width, height, config.colors)?;

    let t0 = Instant::now();
    let unique = UniqueSet::from_points(pixels);
    let unique_mapping = t0.elapsed();

    quantize_unique(&unique, config.colors, config, unique_mapping)
}

/// Quantize the same image once per entry of `colors`.
///
/// Pixels are deduplicated once and shared by every run. All color counts are
/// validated before any clustering starts.
pub fn quantize_many(
    pixels: &[RGB8],
    width: usize,
    height: usize,
    colors: &[usize],
    config: &QuantizeConfig,
) -> Result<Vec<QuantizeResult>> {
    for &k in colors {
        validate_inputs(pixels.len(), width, height, k)?;
    }

    let t0 = Instant::now();
    let unique = UniqueSet::from_points(pixels);
    let unique_mapping = t0.elapsed();
    for &k in colors {
        check_k(k, unique.len())?;
    }

    #[cfg(feature = "parallel")]
    if config.kmeans.parallel {
        return colors
            .par_iter()
            .map(|&k| quantize_unique(&unique, k, config, unique_mapping))
            .collect();
    }

    colors
        .iter()
        .map(|&k| quantize_unique(&unique, k, config, unique_mapping))
        .collect()
}

fn quantize_unique(
    unique: &UniqueSet<RGB8, 3>,
    k: usize,
    config: &QuantizeConfig,
    unique_mapping: Duration,
) -> Result<QuantizeResult> {
    check_k(k, unique.len())?;
    let engine = KMeans::new(RgbDistance, config.init).with_config(config.kmeans.clone());

    let t0 = Instant::now();
    let initial = config
        .init
        .select(unique.coords(), unique.counts(), k, &RgbDistance)?;
    let init_point_selection = t0.elapsed();

    let t0 = Instant::now();
    let result = engine.fit_from(unique.coords(), unique.counts(), initial, None)?;
    let k_means = t0.elapsed();

    let t0 = Instant::now();
    let per_pixel = remap::expand(&result.assignment, unique);
    // k <= 256 is validated up front
    let indices: Vec<u8> = per_pixel.into_iter().map(|c| c as u8).collect();
    let unique_demapping = t0.elapsed();

    let timings = StageTimings {
        unique_mapping,
        init_point_selection,
        k_means,
        unique_demapping,
    };
    debug!(
        colors = k,
        unique = unique.len(),
        pixels = unique.total(),
        init = Initializer::<3>::name(&config.init),
        mse = result.mse,
        ?timings,
        "quantized"
    );

    Ok(QuantizeResult {
        palette: result.centroids.iter().map(sample::to_u8_channels).collect(),
        centroids: result.centroids,
        indices,
        mse: result.mse,
        iterations: result.iterations,
        stop_reason: result.stop_reason,
        timings,
    })
}

fn validate_inputs(pixel_count: usize, width: usize, height: usize, colors: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ClusterError::ZeroDimension);
    }
    if width.checked_mul(height) != Some(pixel_count) {
        return Err(ClusterError::BufferSizeMismatch {
            len: pixel_count,
            width,
            height,
        });
    }
    if colors == 0 || colors > 256 {
        return Err(ClusterError::InvalidColorCount(colors));
    }
    Ok(())
}
