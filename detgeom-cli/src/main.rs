//! detgeom CLI
//!
//! Inspects, converts, remasks and assembles diffraction detector geometry files.
#![allow(clippy::uninlined_format_args)]

use clap::{Args, Parser, Subcommand};
use detgeom_core::{Detector, LoadOptions, MaskCode, MaskPolicy, ZoomBounds};
use detgeom_io::{load_array, load_detector, parse, write, write_frame};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    DetgeomIo(#[from] detgeom_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] detgeom_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Diffraction detector geometry toolkit.
#[derive(Parser)]
#[command(name = "detgeom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Post-load normalization flags.
#[derive(Args, Debug, Clone, Copy)]
struct LoadArgs {
    /// Normalize correction factors to unit mean
    #[arg(long)]
    norm: bool,

    /// Project pixels onto the flat detector plane
    #[arg(long)]
    twodim: bool,
}

impl From<LoadArgs> for LoadOptions {
    fn from(args: LoadArgs) -> Self {
        LoadOptions::new()
            .with_norm(args.norm)
            .with_twodim(args.twodim)
    }
}

/// Mask interpretation flags.
#[derive(Args, Debug, Clone, Copy)]
struct MaskArgs {
    /// Ignore mask codes and treat every pixel as good
    #[arg(long)]
    no_mask: bool,

    /// Keep bad (code 1) pixels usable
    #[arg(long)]
    keep_bad: bool,
}

impl From<MaskArgs> for MaskPolicy {
    fn from(args: MaskArgs) -> Self {
        MaskPolicy::new()
            .with_enabled(!args.no_mask)
            .with_keep_bad(args.keep_bad)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show a summary of a detector file
    Info {
        /// Detector file (text or HDF5)
        detector: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        mask: MaskArgs,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Re-encode a detector file; the output format follows the extension
    Convert {
        /// Input detector file
        input: PathBuf,

        /// Output file (`.h5`/`.hdf5` for HDF5, anything else for text)
        output: PathBuf,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Mark good pixels beyond a q-radius as bad
    Remask {
        /// Input detector file
        input: PathBuf,

        /// Output detector file
        output: PathBuf,

        /// Largest q-radius kept good
        #[arg(long)]
        qradius: f64,
    },

    /// Assemble per-pixel data into a 2D frame
    Assemble {
        /// Detector file
        detector: PathBuf,

        /// Per-pixel data (HDF5 `data`/`background` dataset or raw little-endian f64)
        #[arg(long)]
        data: PathBuf,

        /// Output frame (`.csv` for CSV, anything else for raw f64)
        #[arg(short, long)]
        output: PathBuf,

        /// Crop to the usable pixels
        #[arg(long)]
        zoomed: bool,

        /// Fold the frame under centro-symmetry
        #[arg(long)]
        symmetric: bool,

        #[command(flatten)]
        mask: MaskArgs,
    },
}

/// Summary printed by `detgeom info`.
#[derive(Debug, Serialize)]
struct DetectorSummary {
    num_pix: usize,
    detd: f64,
    ewald_rad: f64,
    good: usize,
    bad: usize,
    irrelevant: usize,
    usable: usize,
    grid_shape: (usize, usize),
    zoom: Option<ZoomBounds>,
    max_q_radius: f64,
    has_background: bool,
}

impl DetectorSummary {
    fn from_detector(det: &mut Detector) -> Self {
        let count = |code: MaskCode| {
            det.store()
                .raw_mask()
                .iter()
                .filter(|&&c| c == code)
                .count()
        };
        let (good, bad, irrelevant) = (
            count(MaskCode::Good),
            count(MaskCode::Bad),
            count(MaskCode::Irrelevant),
        );
        let zoom = det.zoom_bounds().ok();
        let max_q_radius = det.q_radius().iter().copied().fold(0.0, f64::max);
        let store = det.store();
        Self {
            num_pix: store.num_pix(),
            detd: store.detd(),
            ewald_rad: store.ewald_rad(),
            good,
            bad,
            irrelevant,
            usable: det.usable_count(),
            grid_shape: det.grid_shape(),
            zoom,
            max_q_radius,
            has_background: store.background().is_some(),
        }
    }

    fn print(&self) {
        println!("Pixels: {}", self.num_pix);
        println!("Detector distance: {}", self.detd);
        println!("Ewald radius: {}", self.ewald_rad);
        println!(
            "Mask codes: {} good, {} bad, {} irrelevant",
            self.good, self.bad, self.irrelevant
        );
        println!("Usable pixels: {}", self.usable);
        println!("Grid shape: {} x {}", self.grid_shape.0, self.grid_shape.1);
        match &self.zoom {
            Some(z) => println!(
                "Zoom window: x {}..{}, y {}..{}",
                z.x_min, z.x_max, z.y_min, z.y_max
            ),
            None => println!("Zoom window: none (no usable pixels)"),
        }
        println!("Max q-radius: {:.6}", self.max_q_radius);
        println!("Background: {}", if self.has_background { "yes" } else { "no" });
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Info {
            detector,
            json,
            mask,
            load,
        } => {
            let mut det = load_detector(&detector, load.into(), mask.into())?;
            let summary = DetectorSummary::from_detector(&mut det);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("File: {}", detector.display());
                summary.print();
            }
        }

        Commands::Convert {
            input,
            output,
            load,
        } => {
            let store = parse(&input, load.into())?;
            write(&store, &output)?;
            log::info!(
                "converted {} pixels: {} -> {}",
                store.num_pix(),
                input.display(),
                output.display()
            );
        }

        Commands::Remask {
            input,
            output,
            qradius,
        } => {
            let store = parse(&input, LoadOptions::new())?;
            let mut det = Detector::new(store, MaskPolicy::new())?;
            let changed = det.remask(qradius)?;
            write(det.store(), &output)?;
            log::info!(
                "marked {changed} pixels beyond q = {qradius} as bad; wrote {}",
                output.display()
            );
        }

        Commands::Assemble {
            detector,
            data,
            output,
            zoomed,
            symmetric,
            mask,
        } => {
            let mut det = load_detector(&detector, LoadOptions::new(), mask.into())?;
            let values = load_array(&data)?;
            let frame = if symmetric {
                det.assemble_symmetric(&values, zoomed, false)?
            } else {
                det.assemble(&values, zoomed)?
            };
            write_frame(&output, &frame)?;
            let (nx, ny) = frame.shape();
            log::info!(
                "wrote {nx} x {ny} frame ({} valid cells) to {}",
                frame.valid_count(),
                output.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_flags_map_onto_policy() {
        let cli = Cli::try_parse_from(["detgeom", "info", "det.h5", "--keep-bad", "--norm"]).unwrap();
        let Commands::Info { mask, load, .. } = cli.command else {
            panic!("expected info");
        };
        assert_eq!(
            MaskPolicy::from(mask),
            MaskPolicy::new().with_keep_bad(true)
        );
        assert_eq!(LoadOptions::from(load), LoadOptions::new().with_norm(true));

        let cli = Cli::try_parse_from(["detgeom", "-v", "info", "det.h5", "--no-mask"]).unwrap();
        assert!(cli.verbose);
        let Commands::Info { mask, .. } = cli.command else {
            panic!("expected info");
        };
        assert!(!MaskPolicy::from(mask).enabled);
    }

    #[test]
    fn test_assemble_requires_data_and_output() {
        assert!(Cli::try_parse_from(["detgeom", "assemble", "det.dat"]).is_err());
        let cli = Cli::try_parse_from([
            "detgeom",
            "assemble",
            "det.dat",
            "--data",
            "frame.bin",
            "-o",
            "out.csv",
            "--symmetric",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Assemble {
                symmetric: true,
                zoomed: false,
                ..
            }
        ));
    }

    #[test]
    fn test_remask_requires_radius() {
        assert!(Cli::try_parse_from(["detgeom", "remask", "in.dat", "out.dat"]).is_err());
    }
}
