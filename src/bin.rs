//! CLI front-end: `train` runs the cascade trainer over a directory of
//! positive/negative crops, `detect` runs a saved cascade over an image and
//! prints the clustered face rectangles.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cascade_detector::{Cascade, TrainingConfig};

#[derive(Parser)]
#[command(name = "detector", about = "Cascaded Haar/AdaBoost face detector")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a cascade from directories of cropped positive/negative images.
    Train {
        #[arg(long)]
        positives: PathBuf,
        #[arg(long)]
        negatives: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Target weak-learner count per stage, e.g. "--stages 2,5,10,20".
        #[arg(long, value_delimiter = ',')]
        stages: Vec<usize>,
        /// Optional JSON file overriding the default training config.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run a saved cascade over one grayscale image.
    Detect {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        image: PathBuf,
    },
}

fn image_paths(dir: &PathBuf) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            positives,
            negatives,
            output,
            stages,
            config,
        } => {
            let config = match config {
                Some(path) => {
                    let text = fs::read_to_string(&path)?;
                    serde_json::from_str(&text)?
                }
                None => TrainingConfig::default(),
            };

            let positive_paths = image_paths(&positives)?;
            let negative_paths = image_paths(&negatives)?;

            log::info!(
                "training cascade: {} positives, {} negatives, stages {:?}",
                positive_paths.len(),
                negative_paths.len(),
                stages
            );
            let cascade = Cascade::learn(&positive_paths, &negative_paths, &stages, &config)?;
            cascade.save(&output)?;
            println!(
                "trained {} stages, saved to {}",
                cascade.stage_count(),
                output.display()
            );
        }
        Command::Detect { model, image } => {
            let cascade = Cascade::load(&model)?;
            let img = image::open(&image)?.into_luma8();
            let (w, h) = img.dimensions();
            let faces = cascade.detect(img.as_raw(), h as usize, w as usize);

            println!("{} face(s) detected", faces.len());
            for face in faces {
                println!("{} {} {} {}", face.y, face.x, face.h, face.w);
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
