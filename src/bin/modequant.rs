use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use modequant::{InitMethod, QuantizeConfig, QuantizeResult, StageTimings};
use rgb::RGB8;
use serde::Serialize;
use tracing::{debug, info};

/// Compress images to a fixed number of colors with k-means.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(short, long = "image", required = true, num_args = 1..)]
    images: Vec<PathBuf>,

    /// Palette sizes to produce, one output per size
    #[arg(short, long, required = true, num_args = 1..)]
    colors: Vec<usize>,

    /// Initial centroid selection
    #[arg(long, value_enum, default_value_t = InitChoice::Umdi)]
    init: InitChoice,

    /// Random initializations tried per image; the lowest MSE is kept
    #[arg(long, default_value_t = 100)]
    trials: u64,

    /// Seed of the first random trial
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Upper bound on k-means iterations
    #[arg(long, default_value_t = 300)]
    max_iterations: usize,

    /// Output directory
    #[arg(short = 'd', long, default_value = "compressed")]
    out_dir: PathBuf,

    /// Print the per-stage time profile
    #[arg(short, long)]
    time: bool,

    /// Print the MSE of every result
    #[arg(long)]
    mse: bool,

    /// Write a per-run profile report
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print a JSON summary of every run to stdout
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum InitChoice {
    Fft,
    Umdi,
    Random,
    All,
}

impl InitChoice {
    fn expand(self) -> &'static [InitChoice] {
        match self {
            Self::Fft => &[Self::Fft],
            Self::Umdi => &[Self::Umdi],
            Self::Random => &[Self::Random],
            Self::All => &[Self::Random, Self::Fft, Self::Umdi],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Fft => "fft",
            Self::Umdi => "umdi",
            Self::Random => "random",
            Self::All => "all",
        }
    }
}

#[derive(Serialize, Debug)]
struct Row {
    image: String,
    init: &'static str,
    colors: usize,
    mse: f64,
    iterations: usize,
    stop_reason: String,
    unique_mapping_s: f64,
    init_point_selection_s: f64,
    unique_demapping_s: f64,
    k_means_s: f64,
    output: PathBuf,
}

impl Row {
    fn new(image: &str, init: &'static str, result: &QuantizeResult, output: PathBuf) -> Self {
        let t: &StageTimings = result.timings();
        Self {
            image: image.to_string(),
            init,
            colors: result.palette_len(),
            mse: result.mse(),
            iterations: result.iterations(),
            stop_reason: format!("{:?}", result.stop_reason()),
            unique_mapping_s: t.unique_mapping.as_secs_f64(),
            init_point_selection_s: t.init_point_selection.as_secs_f64(),
            unique_demapping_s: t.unique_demapping.as_secs_f64(),
            k_means_s: t.k_means.as_secs_f64(),
            output,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("modequant=info".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.trials == 0 {
        bail!("--trials must be at least 1");
    }
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let base = QuantizeConfig::new()
        .kmeans(modequant::KMeansConfig::new().max_iterations(args.max_iterations));
    let mut rows = Vec::new();

    for path in &args.images {
        let img = image::open(path)
            .with_context(|| format!("reading {}", path.display()))?
            .to_rgb8();
        let (width, height) = (img.width() as usize, img.height() as usize);
        let pixels: Vec<RGB8> = img
            .pixels()
            .map(|p| RGB8 {
                r: p[0],
                g: p[1],
                b: p[2],
            })
            .collect();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        info!(image = %stem, width, height, "compressing");

        let original = args.out_dir.join(format!("{stem}_original.png"));
        if !original.exists() {
            save(&original, &pixels, width, height)?;
        }

        for &choice in args.init.expand() {
            let results = match choice {
                InitChoice::Random => best_random(&pixels, width, height, &args, &base)?,
                InitChoice::Fft => {
                    let config = base.clone().init(InitMethod::Fft);
                    modequant::quantize_many(&pixels, width, height, &args.colors, &config)
                        .context("quantizing")?
                }
                InitChoice::Umdi | InitChoice::All => {
                    let config = base.clone().init(InitMethod::Umdi);
                    modequant::quantize_many(&pixels, width, height, &args.colors, &config)
                        .context("quantizing")?
                }
            };

            for result in &results {
                let k = result.palette_len();
                let out = args
                    .out_dir
                    .join(format!("{stem}_{}_{k}colors.png", choice.label()));
                save(&out, &result.render(), width, height)?;

                if !args.json {
                    println!("{stem} {} {k} colors -> {}", choice.label(), out.display());
                    if args.time {
                        print_timings(result.timings());
                    }
                    if args.mse {
                        println!("  mse: {}", result.mse());
                    }
                }
                rows.push(Row::new(&stem, choice.label(), result, out));
            }
        }
    }

    if let Some(csv) = &args.csv {
        let file = fs::File::create(csv).with_context(|| format!("creating {}", csv.display()))?;
        write_csv(file, &rows).with_context(|| format!("writing {}", csv.display()))?;
        info!(path = %csv.display(), rows = rows.len(), "wrote profile");
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    Ok(())
}

/// Run `args.trials` seeded random initializations per color count and keep
/// the lowest MSE of each.
fn best_random(
    pixels: &[RGB8],
    width: usize,
    height: usize,
    args: &Args,
    base: &QuantizeConfig,
) -> Result<Vec<QuantizeResult>> {
    let mut best: Vec<Option<QuantizeResult>> = vec![None; args.colors.len()];
    for trial in 0..args.trials {
        let seed = args.seed.wrapping_add(trial);
        let config = base.clone().init(InitMethod::Random { seed });
        let results = modequant::quantize_many(pixels, width, height, &args.colors, &config)
            .context("quantizing")?;
        for (slot, result) in best.iter_mut().zip(results) {
            if slot.as_ref().is_none_or(|b| result.mse() < b.mse()) {
                debug!(seed, colors = result.palette_len(), mse = result.mse(), "new best random");
                *slot = Some(result);
            }
        }
    }
    Ok(best.into_iter().flatten().collect())
}

fn save(path: &Path, pixels: &[RGB8], width: usize, height: usize) -> Result<()> {
    let raw: Vec<u8> = pixels.iter().flat_map(|p| [p.r, p.g, p.b]).collect();
    let img = image::RgbImage::from_raw(width as u32, height as u32, raw)
        .context("pixel buffer does not match image size")?;
    img.save(path)
        .with_context(|| format!("writing {}", path.display()))
}

fn print_timings(t: &StageTimings) {
    println!("  unique_mapping: {:.6}s", t.unique_mapping.as_secs_f64());
    println!("  init_point_selection: {:.6}s", t.init_point_selection.as_secs_f64());
    println!("  k_means: {:.6}s", t.k_means.as_secs_f64());
    println!("  unique_demapping: {:.6}s", t.unique_demapping.as_secs_f64());
}

/// Profile report record, one per run, in the original report's column layout.
#[derive(Serialize)]
struct CsvRecord<'a> {
    #[serde(rename = "im_name")]
    image: &'a str,
    #[serde(rename = "init_method")]
    init: &'a str,
    colors: usize,
    mse: f64,
    #[serde(rename = "unique_mapping_time(s)")]
    unique_mapping: f64,
    #[serde(rename = "init_point_selection_time(s)")]
    init_point_selection: f64,
    #[serde(rename = "unique_demapping_time(s)")]
    unique_demapping: f64,
    #[serde(rename = "k_means_time(s)")]
    k_means: f64,
}

impl<'a> From<&'a Row> for CsvRecord<'a> {
    fn from(r: &'a Row) -> Self {
        Self {
            image: &r.image,
            init: r.init,
            colors: r.colors,
            mse: r.mse,
            unique_mapping: r.unique_mapping_s,
            init_point_selection: r.init_point_selection_s,
            unique_demapping: r.unique_demapping_s,
            k_means: r.k_means_s,
        }
    }
}

fn write_csv<W: io::Write>(out: W, rows: &[Row]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for row in rows {
        wtr.serialize(CsvRecord::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}
