//! series-info - Inspect and extract planes from multi-series image files.
//!
//! This binary wires the command line to a [`SeriesReader`] backed by the
//! companion engine.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_series_reader::{
    config::{
        AssociatedConfig, Cli, Command, InfoConfig, PlaneConfig, ReaderArgs, RegionConfig,
        ReportFormat,
    },
    engine::{CompanionProvider, EngineHandle},
    render::RegionEncoder,
    series::{RegionRequest, SeriesMetadata, SeriesReader},
    OutputFormat,
};

type Reader = SeriesReader<CompanionProvider>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Info(config) => run_info(config),
        Command::Plane(config) => run_plane(config),
        Command::Region(config) => run_region(config),
        Command::Associated(config) => run_associated(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_series_reader=debug,series_info=debug"
    } else {
        "image_series_reader=warn,series_info=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open the file named by the shared reader arguments.
fn open_reader(args: &ReaderArgs) -> Result<Reader, String> {
    let handle = EngineHandle::new(CompanionProvider::new());
    let mut reader = SeriesReader::new(handle, args.options()).map_err(|e| e.to_string())?;
    reader.open(&args.path).map_err(|e| e.to_string())?;
    Ok(reader)
}

/// Write an encoded image and report where it went.
fn write_output(path: &Path, data: &[u8]) -> Result<(), String> {
    std::fs::write(path, data).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    info!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

fn encoder(format: OutputFormat, quality: u8) -> Result<RegionEncoder, String> {
    RegionEncoder::new(format)
        .with_quality(quality)
        .map_err(|e| e.to_string())
}

/// Map a command result to an exit code, logging the failure.
fn finish(result: Result<(), String>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Info Command
// =============================================================================

/// JSON report of one file.
#[derive(Serialize)]
struct FileReport {
    path: PathBuf,
    series_count: usize,
    series: Vec<SeriesReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<String>,
}

#[derive(Serialize)]
struct SeriesReport {
    #[serde(flatten)]
    metadata: SeriesMetadata,
    associated_images: Vec<String>,
}

fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.reader.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    finish(info(&config))
}

fn info(config: &InfoConfig) -> Result<(), String> {
    let mut reader = open_reader(&config.reader)?;
    let series_count = reader.series_count().map_err(|e| e.to_string())?;

    let selected: Vec<usize> = match config.series {
        Some(series) => vec![series],
        None => (0..series_count).collect(),
    };

    let mut series = Vec::with_capacity(selected.len());
    for index in selected {
        reader.select_series(index).map_err(|e| e.to_string())?;
        let associated_images = reader.associated_image_names().map_err(|e| e.to_string())?;
        let metadata = reader.metadata().map_err(|e| e.to_string())?.clone();
        series.push(SeriesReport {
            metadata,
            associated_images,
        });
    }

    let document = if config.document {
        reader.metadata_document().map_err(|e| e.to_string())?
    } else {
        None
    };

    let report = FileReport {
        path: config.reader.path.clone(),
        series_count,
        series,
        document,
    };

    match config.format {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        ReportFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &FileReport) {
    println!("File: {}", report.path.display());
    println!("Series: {}", report.series_count);

    for entry in &report.series {
        let m = &entry.metadata;
        println!();
        println!("Series #{}", m.series_index);
        println!("─────────────────────────────────");
        println!("  Dimensions:  {} x {}", m.size_x, m.size_y);
        println!(
            "  Planes:      {} (Z={}, C={}, T={})",
            m.image_count, m.size_z, m.size_c, m.size_t
        );
        println!(
            "  Pixel type:  {} ({} bits, {} sample(s) per pixel)",
            m.pixel_type, m.bits_per_pixel, m.rgb_channel_count
        );
        println!("  Plane size:  {} bytes", m.plane_byte_size);
        println!(
            "  Tile:        {} x {}",
            m.optimal_tile_width, m.optimal_tile_height
        );
        println!(
            "  Pixel size:  {} x {} x {} mm",
            fmt_optional(m.physical_size_x),
            fmt_optional(m.physical_size_y),
            fmt_optional(m.physical_size_z)
        );
        println!("  Time step:   {} s", fmt_optional(m.physical_size_t));

        for (channel, color) in m.channel_colors.colors().iter().enumerate() {
            if let Some(color) = color {
                let [r, g, b, a] = color.to_rgba();
                println!("  Channel {}:   rgba({}, {}, {}, {})", channel, r, g, b, a);
            }
        }

        println!("  Levels:");
        for level in m.pyramid.levels() {
            println!(
                "    {}: {} x {} (downsample {:.3}, {} x {} tiles)",
                level.index, level.width, level.height, level.downsample, level.tiles_x, level.tiles_y
            );
        }

        if !entry.associated_images.is_empty() {
            println!("  Associated:  {}", entry.associated_images.join(", "));
        }
    }

    if let Some(document) = &report.document {
        println!();
        println!("{}", document);
    }
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{}", v))
}

// =============================================================================
// Plane Command
// =============================================================================

fn run_plane(config: PlaneConfig) -> ExitCode {
    init_logging(config.reader.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    finish(plane(&config))
}

fn plane(config: &PlaneConfig) -> Result<(), String> {
    let mut reader = open_reader(&config.reader)?;
    reader
        .select_series(config.plane.series)
        .map_err(|e| e.to_string())?;

    let coord = config.plane.coordinate();
    let buffer = reader.read_plane_at(coord).map_err(|e| e.to_string())?;
    debug!(
        plane = buffer.plane_index,
        level = buffer.resolution,
        "Read plane {}",
        coord
    );

    let lookup_table = reader.lookup_table_8bit().map_err(|e| e.to_string())?;
    let data = encoder(config.image.image_format, config.image.quality)?
        .with_lookup_table(lookup_table)
        .encode_plane(&buffer)
        .map_err(|e| e.to_string())?;

    write_output(&config.image.output, &data)
}

// =============================================================================
// Region Command
// =============================================================================

fn run_region(config: RegionConfig) -> ExitCode {
    init_logging(config.reader.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    finish(region(&config))
}

fn region(config: &RegionConfig) -> Result<(), String> {
    let mut reader = open_reader(&config.reader)?;
    reader
        .select_series(config.plane.series)
        .map_err(|e| e.to_string())?;

    let request = match config.downsample {
        Some(d) => RegionRequest::at_downsample(d, config.x, config.y, config.width, config.height),
        None => RegionRequest::at_level(
            config.level.unwrap_or(0),
            config.x,
            config.y,
            config.width,
            config.height,
        ),
    }
    .with_plane(config.plane.coordinate());

    let region = reader.read_region(request).map_err(|e| e.to_string())?;
    let (out_w, out_h) = region.output_size();
    info!(
        "Read {}x{} from level {} (downsample {:.3}), output {}x{}",
        region.width, region.height, region.level, region.level_downsample, out_w, out_h
    );

    let lookup_table = reader.lookup_table_8bit().map_err(|e| e.to_string())?;
    let data = encoder(config.image.image_format, config.image.quality)?
        .with_lookup_table(lookup_table)
        .encode_region(&region)
        .map_err(|e| e.to_string())?;

    write_output(&config.image.output, &data)
}

// =============================================================================
// Associated Command
// =============================================================================

fn run_associated(config: AssociatedConfig) -> ExitCode {
    init_logging(config.reader.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    finish(associated(&config))
}

fn associated(config: &AssociatedConfig) -> Result<(), String> {
    let mut reader = open_reader(&config.reader)?;
    reader
        .select_series(config.series)
        .map_err(|e| e.to_string())?;

    let (Some(name), Some(output)) = (&config.name, &config.output) else {
        let names = reader.associated_image_names().map_err(|e| e.to_string())?;
        if names.is_empty() {
            println!("(no associated images)");
        }
        for name in names {
            println!("{}", name);
        }
        return Ok(());
    };

    let image = reader
        .associated_image(name)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("No associated image named '{}'", name))?;

    let data = encoder(config.image_format, config.quality)?
        .encode_associated(&image)
        .map_err(|e| e.to_string())?;

    write_output(output, &data)
}
