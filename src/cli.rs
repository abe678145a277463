// ============================================================================
// MaskFE CLI: headless mask authoring via command-line arguments
// ============================================================================
//
// Usage examples:
//   maskfe --photo house.jpg --strokes facade.toml --output mask.png
//   maskfe -p house.jpg -s facade.toml -o mask.png --preview overlay.png
//   maskfe -p house.jpg -s facade.toml -o mask.png --manifest request.json \
//          --prompt "modern facade" -r "refs/*.jpg=cladding style"
//
// Strokes come from a TOML stroke script and run through the same pointer
// handling as interactive painting. The manifest is the exact request the
// image generator would receive, with base64 payloads.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::MaskerConfig;
use crate::io::{self, Photo, PhotoError};
use crate::ops::aspect;
use crate::ops::mask::MaskError;
use crate::ops::preview;
use crate::ops::replay::{ReplayError, StrokeScript};
use crate::ops::submit::{ReferenceImage, SubmissionRequest, SubmitError};
use crate::project::Project;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskFE headless mask compiler.
#[derive(Parser, Debug)]
#[command(
    name = "maskfe",
    about = "Paint an edit mask over a photo and prepare a generation request",
    long_about = "Replay a stroke script over a photo, write the binary edit mask\n\
                  (white = change, black = keep), and optionally a preview overlay\n\
                  and the JSON request an image generator would receive.\n\n\
                  Example:\n  \
                  maskfe --photo house.jpg --strokes facade.toml --output mask.png\n  \
                  maskfe -p house.jpg -s facade.toml -o mask.png --manifest req.json --prompt \"teal door\""
)]
pub struct CliArgs {
    /// Photo to mask. PNG, JPEG, WEBP, BMP, TGA, ICO and TIFF are accepted.
    #[arg(short, long, value_name = "FILE")]
    pub photo: PathBuf,

    /// TOML stroke script to replay. Without one the mask is all black.
    #[arg(short, long, value_name = "SCRIPT.toml")]
    pub strokes: Option<PathBuf>,

    /// Where to write the mask PNG.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Also write the highlight composited over the photo.
    #[arg(long, value_name = "FILE")]
    pub preview: Option<PathBuf>,

    /// Write the generation request (photo, mask, references, prompt) as JSON.
    #[arg(short, long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Free-text instruction for the generator.
    #[arg(long, default_value = "", value_name = "TEXT")]
    pub prompt: String,

    /// Style reference as PATH or PATH=DESCRIPTION. Glob patterns accepted;
    /// every match shares the description.
    #[arg(short, long = "reference", value_name = "PATH[=DESCRIPTION]")]
    pub references: Vec<String>,

    /// Config file. Defaults to the per-user MaskFE config.toml.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level and print timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Photo(#[from] PhotoError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("could not write mask: {0}")]
    Mask(#[from] MaskError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error("could not write preview: {0}")]
    Preview(#[from] image::ImageError),
    #[error("could not encode manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("photo and drawing surface sizes differ")]
    SizeMismatch,
    #[error("reference '{pattern}' matched no files")]
    Reference { pattern: String },
    #[error("invalid reference pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// The JSON document written by `--manifest`.
#[derive(Serialize)]
struct Manifest<'a> {
    aspect_ratio: &'static str,
    request: &'a SubmissionRequest,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the headless pipeline and return an OS exit code.
/// `0` = mask (and any requested extras) written, `1` = something failed.
pub fn run(args: CliArgs, config: &MaskerConfig) -> ExitCode {
    let start = Instant::now();
    match execute(&args, config) {
        Ok(()) => {
            if args.verbose {
                println!(
                    "wrote {} in {:.1} ms",
                    args.output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(args: &CliArgs, config: &MaskerConfig) -> Result<(), CliError> {
    let mut project = Project::new(config);
    project.load_photo(Photo::open(&args.photo)?);

    if let Some(path) = &args.strokes {
        let script = StrokeScript::load(path)?;
        let summary = script.replay(&mut project)?;
        info!(
            "{}: {} strokes, {} undos, {} clears",
            path.display(),
            summary.strokes,
            summary.undos,
            summary.clears
        );
    }

    let mask = project.compile_mask().ok_or(SubmitError::NoPhoto)?;
    mask.save(&args.output)?;
    if args.verbose {
        println!(
            "mask {}x{}, {} pixels marked for editing",
            mask.width(),
            mask.height(),
            mask.white_pixel_count()
        );
    }

    if let Some(path) = &args.preview {
        let photo = project.photo().ok_or(SubmitError::NoPhoto)?.decode_rgba()?;
        let overlay = preview::render_overlay(&photo, project.canvas.surface())
            .ok_or(CliError::SizeMismatch)?;
        overlay.save(path)?;
        debug!("preview written to {}", path.display());
    }

    if let Some(path) = &args.manifest {
        let references = load_references(&args.references)?;
        let aspect_ratio = aspect::infer_aspect_ratio(
            project
                .photo()
                .map(Photo::dimensions)
                .ok_or(SubmitError::NoPhoto),
        );
        let ticket = project.begin_submission(references, args.prompt.clone())?;
        let manifest = Manifest {
            aspect_ratio,
            request: &ticket.request,
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(path, json).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        })?;
        info!("manifest written to {}", path.display());
    }

    Ok(())
}

// ============================================================================
// References
// ============================================================================

/// Split `PATH=DESCRIPTION`. The description is optional.
fn parse_reference(arg: &str) -> (&str, &str) {
    match arg.split_once('=') {
        Some((path, description)) => (path.trim(), description.trim()),
        None => (arg.trim(), ""),
    }
}

fn load_references(args: &[String]) -> Result<Vec<ReferenceImage>, CliError> {
    let mut references = Vec::new();
    for arg in args {
        let (pattern, description) = parse_reference(arg);
        for path in expand_reference(pattern)? {
            references.push(ReferenceImage {
                image: io::read_encoded(&path)?,
                description: description.to_string(),
            });
        }
    }
    Ok(references)
}

/// Resolve one reference argument to the files it names: the literal path
/// if it exists, otherwise every glob match in sorted order. A pattern that
/// names no file is an error.
fn expand_reference(pattern: &str) -> Result<Vec<PathBuf>, CliError> {
    let as_path = Path::new(pattern);
    if as_path.is_file() {
        return Ok(vec![as_path.to_path_buf()]);
    }

    let entries = glob::glob(pattern).map_err(|source| CliError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut matched = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => matched.push(path),
            Ok(_) => {}
            Err(e) => warn!("skipping unreadable match for '{}': {}", pattern, e),
        }
    }
    if matched.is_empty() {
        return Err(CliError::Reference {
            pattern: pattern.to_string(),
        });
    }
    debug!("reference '{}' matched {} files", pattern, matched.len());
    Ok(matched)
}
