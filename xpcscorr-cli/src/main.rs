use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xpcscorr::io::{load_bin_mask, load_frame_stack};
use xpcscorr::{
    AnyCorrelator, Backend, CorrelationMatrix, Correlator, CorrelatorConfig, DenseCorrelator,
    ExtraOptions, PixelType, ProfileReport,
};

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "XPCS dense g2 correlator (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BackendConfig {
    Direct,
    Device,
    Fft,
}

impl From<BackendConfig> for Backend {
    fn from(value: BackendConfig) -> Self {
        match value {
            BackendConfig::Direct => Backend::Direct,
            BackendConfig::Device => Backend::Device,
            BackendConfig::Fft => Backend::Fft,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    frames: Vec<String>,
    qmask_path: String,
    backend: BackendConfig,
    profile: bool,
    validate: bool,
    tolerance: f64,
    save_fft_plans: bool,
    reuse_buffers: bool,
    pixel_chunk: usize,
    output_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let opts = ExtraOptions::default();
        Self {
            frames: Vec::new(),
            qmask_path: String::new(),
            backend: BackendConfig::Direct,
            profile: false,
            validate: false,
            tolerance: 5e-3,
            save_fft_plans: opts.save_fft_plans,
            reuse_buffers: opts.reuse_buffers,
            pixel_chunk: opts.pixel_chunk,
            output_path: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProfileRecord {
    upload_ms: f64,
    compute_ms: f64,
    readback_ms: f64,
    total_ms: f64,
}

impl From<ProfileReport> for ProfileRecord {
    fn from(value: ProfileReport) -> Self {
        let ms = |d: std::time::Duration| d.as_secs_f64() * 1e3;
        Self {
            upload_ms: ms(value.upload),
            compute_ms: ms(value.compute),
            readback_ms: ms(value.readback),
            total_ms: ms(value.total()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ValidationRecord {
    tolerance: f64,
    /// Largest relative deviation from the direct correlator, per bin.
    max_rel_diff: Vec<f64>,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct Output {
    backend: &'static str,
    bins: usize,
    lags: usize,
    /// Row `b` holds bin `b + 1`; column `k` holds lag `k + 1`.
    g2: Vec<Vec<f64>>,
    profile: Option<ProfileRecord>,
    validation: Option<ValidationRecord>,
}

fn validate(reference: &CorrelationMatrix, result: &CorrelationMatrix, tolerance: f64) -> ValidationRecord {
    let max_rel_diff: Vec<f64> = reference
        .rows()
        .zip(result.rows())
        .map(|(want, got)| {
            want.iter()
                .zip(got)
                .map(|(&w, &g)| (w - g).abs() / w.abs().max(f64::EPSILON))
                .fold(0.0, f64::max)
        })
        .collect();
    let passed = max_rel_diff.iter().all(|&d| d <= tolerance);
    ValidationRecord {
        tolerance,
        max_rel_diff,
        passed,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("xpcscorr=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.frames.len() < 2 || config.qmask_path.is_empty() {
        return Err("frames (at least two) and qmask_path must be set in the config".into());
    }
    if config.tolerance.is_nan() || config.tolerance <= 0.0 {
        return Err("tolerance must be positive".into());
    }

    let frames = load_frame_stack(&config.frames)?;
    let qmask = load_bin_mask(&config.qmask_path)?;
    let stack = frames.view();
    let (height, width) = stack.shape();
    tracing::info!(
        frames = stack.frames(),
        height,
        width,
        bins = qmask.num_bins(),
        "loaded inputs"
    );

    let backend = Backend::from(config.backend);
    let options = ExtraOptions {
        save_fft_plans: config.save_fft_plans,
        reuse_buffers: config.reuse_buffers,
        pixel_chunk: config.pixel_chunk,
    };
    let corr_config = CorrelatorConfig::new(qmask, PixelType::U16)
        .with_profile(config.profile)
        .with_options(options);
    let correlator = AnyCorrelator::new(backend, height, width, stack.frames(), corr_config.clone())?;
    let result = correlator.correlate(stack)?;

    let validation = if config.validate {
        let reference = DenseCorrelator::new(height, width, stack.frames(), corr_config)?
            .correlate(stack)?;
        let record = validate(&reference, &result, config.tolerance);
        if !record.passed {
            tracing::warn!(backend = backend.name(), "validation against direct correlator failed");
        }
        Some(record)
    } else {
        None
    };

    let output = Output {
        backend: backend.name(),
        bins: result.bins(),
        lags: result.lags(),
        g2: result.rows().map(<[f64]>::to_vec).collect(),
        profile: correlator.last_profile().map(ProfileRecord::from),
        validation,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
