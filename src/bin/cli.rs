// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! helmshell CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use helmshell::cli::{stage_bar, stage_callback, Reporter};
use helmshell::envelope::EnvelopeStrategy;
use helmshell::geometry::analyze;
use helmshell::pipeline::{preprocess, prepare_head, HelmetPipeline, HelmetType};
use helmshell::{boolean, drape, integrity, io, seam, Mesh, PipelineConfig, QualityWarning, Transform};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "helmshell")]
#[command(about = "Helmet shell fitting - repair, drape, subtract and finish head scans", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to helmshell.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of colored text
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report manifold and watertight status of mesh files
    Check {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Classify every STL/PLY file below a directory
    Scan { dir: PathBuf },

    /// Clean, fill, orient and decimate a head scan
    Repair {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Extend a head into a closed solid along the drape axis
    Drape {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Envelope strategy (slice or raycast)
        #[arg(long)]
        strategy: Option<EnvelopeStrategy>,
        /// Slice count or ray grid side, depending on the strategy
        #[arg(long)]
        resolution: Option<usize>,
    },

    /// Boolean difference A - B
    Subtract {
        a: PathBuf,
        b: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Smooth the seam region of a cut shell
    Finish {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Full pipeline from head scan and helmet template to finished shell
    Run {
        #[arg(long)]
        head: PathBuf,
        #[arg(long)]
        helmet: PathBuf,
        #[arg(long)]
        chin: Option<PathBuf>,
        /// Template family, places the chin piece (flat or winged)
        #[arg(long)]
        helmet_type: Option<HelmetType>,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Subject name used in output file names
        #[arg(long)]
        name: Option<String>,
        /// Normal offset of the head surface
        #[arg(long)]
        offset: Option<f64>,
        /// Left-right, posterior-anterior and dorsal-ventral shift
        #[arg(long, num_args = 3, value_names = ["LR", "PA", "DV"], allow_negative_numbers = true)]
        translate: Option<Vec<f64>>,
        /// Rotation about X, Y and Z in degrees
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        rotate: Option<Vec<f64>>,
        /// Laplacian relaxation before the offset, in [0, 1]
        #[arg(long)]
        smoothing: Option<f64>,
        /// Skip the initial head placement (inputs are already aligned)
        #[arg(long)]
        no_preprocess: bool,
    },

    /// Print the effective configuration, or write it to a file
    Config {
        #[arg(long, value_name = "FILE")]
        write: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dispatch(&cli) {
        Reporter::report_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

fn read(path: &Path) -> Result<Mesh> {
    io::read_mesh(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn write(mesh: &Mesh, path: &Path) -> Result<()> {
    io::write_mesh(mesh, path).with_context(|| format!("Failed to write {}", path.display()))
}

fn dispatch(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match &cli.command {
        Commands::Check { inputs } => check_command(inputs, cli.json),
        Commands::Scan { dir } => scan_command(dir, cli.json),
        Commands::Repair { input, output } => {
            let mesh = read(input)?;
            let start = Instant::now();
            let repaired = prepare_head(&mesh, &config)?;
            write(&repaired, output)?;
            report_result(cli.json, output, &repaired, &[], start)
        }
        Commands::Drape {
            input,
            output,
            strategy,
            resolution,
        } => {
            let mut config = config;
            if let Some(strategy) = strategy {
                config.drape_strategy = *strategy;
            }
            if let Some(resolution) = resolution {
                config.n_slices = *resolution;
                config.ray_resolution = *resolution;
            }
            let mesh = read(input)?;
            let start = Instant::now();
            let (draped, warnings) = drape::drape_with_fallback(&mesh, &config)?.into_parts();
            write(&draped, output)?;
            report_result(cli.json, output, &draped, &warnings, start)
        }
        Commands::Subtract { a, b, output } => {
            let (a_mesh, b_mesh) = (read(a)?, read(b)?);
            let start = Instant::now();
            let (result, warnings) = boolean::difference(&a_mesh, &b_mesh)?.into_parts();
            write(&result, output)?;
            report_result(cli.json, output, &result, &warnings, start)
        }
        Commands::Finish { input, output } => {
            let mesh = read(input)?;
            let start = Instant::now();
            let (finished, warnings) = seam::finish_seam(&mesh, &config.seam_params())?.into_parts();
            write(&finished, output)?;
            report_result(cli.json, output, &finished, &warnings, start)
        }
        Commands::Run {
            head,
            helmet,
            chin,
            helmet_type,
            output,
            name,
            offset,
            translate,
            rotate,
            smoothing,
            no_preprocess,
        } => {
            let mut config = config;
            if let Some(name) = name {
                config.subject_name = name.clone();
            }
            let mut transform = Transform::default().with_offset(config.offset_distance);
            if let Some(offset) = offset {
                transform = transform.with_offset(*offset);
            }
            if let Some(t) = translate {
                transform = transform.with_translation([t[0], t[1], t[2]]);
            }
            if let Some(r) = rotate {
                transform = transform.with_rotation([r[0], r[1], r[2]]);
            }
            if let Some(s) = smoothing {
                transform = transform.with_smoothing(*s);
            }

            let head = read(head)?;
            let helmet = read(helmet)?;
            let chin = chin.as_deref().map(read).transpose()?;
            let run = RunInputs {
                head,
                helmet,
                chin,
                helmet_type: *helmet_type,
                preprocess: !no_preprocess,
            };
            run_command(config, run, &transform, output, cli.json)
        }
        Commands::Config { write: target } => {
            match target {
                Some(path) => {
                    config.save(path)?;
                    Reporter::success(&format!("Configuration written to {}", path.display()));
                }
                None => println!("{}", toml::to_string_pretty(&config)?),
            }
            Ok(())
        }
    }
}

fn check_command(inputs: &[PathBuf], json: bool) -> Result<()> {
    let mut reports = Vec::new();
    let mut all_closed = true;
    for input in inputs {
        let mesh = read(input)?;
        let report = integrity::check(&mesh);
        let stats = analyze(&mesh);
        all_closed &= report.manifold && report.watertight;
        if !json {
            Reporter::report_check(input, &report, &stats);
        }
        reports.push(serde_json::json!({
            "file": input,
            "integrity": report,
            "geometry": stats,
        }));
    }
    if json {
        Reporter::print_json(&reports)?;
    }
    if !all_closed {
        std::process::exit(1);
    }
    Ok(())
}

fn scan_command(dir: &Path, json: bool) -> Result<()> {
    let report = integrity::scan_directory(dir)?;
    if json {
        Reporter::print_json(&report)?;
    } else {
        Reporter::report_scan(dir, &report);
    }
    Ok(())
}

fn report_result(
    json: bool,
    output: &Path,
    mesh: &Mesh,
    warnings: &[QualityWarning],
    start: Instant,
) -> Result<()> {
    let report = integrity::check(mesh);
    if json {
        return Reporter::print_json(&serde_json::json!({
            "output": output,
            "elapsed_ms": start.elapsed().as_secs_f64() * 1000.0,
            "integrity": report,
            "warnings": warnings,
        }));
    }
    Reporter::report_warnings(warnings);
    Reporter::success(&format!(
        "Wrote {} ({} faces, manifold={}, watertight={}) in {}",
        output.display(),
        mesh.triangle_count(),
        report.manifold,
        report.watertight,
        Reporter::format_duration(start.elapsed())
    ));
    Ok(())
}

struct RunInputs {
    head: Mesh,
    helmet: Mesh,
    chin: Option<Mesh>,
    helmet_type: Option<HelmetType>,
    preprocess: bool,
}

fn run_command(
    config: PipelineConfig,
    inputs: RunInputs,
    transform: &Transform,
    output: &Path,
    json: bool,
) -> Result<()> {
    let (head, helmet, chin) = if inputs.preprocess {
        let prepared = preprocess(
            &inputs.head,
            &inputs.helmet,
            inputs.chin.as_ref(),
            inputs.helmet_type,
        )?;
        (prepared.head, prepared.helmet, prepared.chin)
    } else {
        (inputs.head, inputs.helmet, inputs.chin)
    };

    if !json {
        Reporter::report_info(&format!(
            "Fitting {} (offset {}, DV {})",
            config.subject_name.cyan(),
            transform.offset,
            transform.dv()
        ));
    }
    let pb = stage_bar(!json);
    let pipeline = HelmetPipeline::new(config).with_progress(stage_callback(pb.clone()));
    let result = pipeline.run(&head, &helmet, chin.as_ref(), transform);
    pb.finish_and_clear();
    let (output_meshes, warnings) = result?.into_parts();
    let written = output_meshes.write_outputs(output)?;

    if json {
        return Reporter::print_json(&serde_json::json!({
            "files": written,
            "stages": output_meshes.stages,
            "warnings": warnings,
            "total_ms": output_meshes.total_ms(),
        }));
    }
    Reporter::report_stages(&output_meshes.stages, &written);
    Reporter::report_warnings(&warnings);
    if output_meshes.chin.is_none() && chin.is_some() {
        Reporter::report_warning("chin piece could not be trimmed and was not written");
    }
    if written.is_empty() {
        bail!("pipeline produced no output files");
    }
    Reporter::success("Shell finished");
    Ok(())
}
