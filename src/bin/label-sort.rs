//! Folder mode: sort every label export in a directory and write the
//! outputs next to each other in a timestamped folder.

use chrono::{DateTime, Local};
use clap::Parser;
use eyre::{Result, WrapErr, bail};
use labelsort::config::{SorterConfig, parse_keywords};
use labelsort::pipeline::{BatchInput, BatchOptions, BatchOutcome, Pipeline, SourceFile};
use labelsort::telemetry;
use std::fs;
use std::path::{Path, PathBuf};

/// Sort shipping-label PDFs into warehouse, packing-room, and high-volume files.
#[derive(Parser, Debug)]
#[command(name = "label-sort", version, about)]
struct Cli {
    /// Folder holding the exported label PDFs
    #[arg(long, env = "LABELSORT_INPUT")]
    input: PathBuf,

    /// Folder that receives `Output/<timestamp>/`
    #[arg(long, env = "LABELSORT_OUTPUT")]
    output: PathBuf,

    /// Comma-separated hazmat keywords (replaces the configured list)
    #[arg(long)]
    keywords: Option<String>,

    /// Do not draw hazmat stickers on labels
    #[arg(long)]
    no_hazmat_sticker: bool,

    /// Move processed PDFs into `INPUT/DISCARD/`
    #[arg(long)]
    discard: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();
    let cli = Cli::parse();

    let paths = collect_pdf_paths(&cli.input)?;
    if paths.is_empty() {
        bail!("no PDF files found in {}", cli.input.display());
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = fs::read(path).wrap_err_with(|| format!("read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(SourceFile { name, bytes });
    }
    let options = BatchOptions {
        hazmat_keywords: cli
            .keywords
            .as_deref()
            .map(parse_keywords)
            .filter(|keywords| !keywords.is_empty()),
        hazmat_sticker: cli.no_hazmat_sticker.then_some(false),
    };

    let outcome = Pipeline::new(SorterConfig::from_env())
        .run(BatchInput { files, options })
        .wrap_err("batch failed")?;

    let target = output_dir(&cli.output, Local::now());
    write_outputs(&target, &outcome)?;
    for line in &outcome.log {
        println!("{line}");
    }
    println!("Outputs written to {}", target.display());

    if cli.discard {
        for path in &paths {
            let moved = move_to_discard(path)?;
            println!("Moved {} to {}", path.display(), moved.display());
        }
    }
    Ok(())
}

/// `*.pdf` files directly inside `dir`, in name order.
fn collect_pdf_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).wrap_err_with(|| format!("list {}", dir.display()))? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if path.is_file() && is_pdf {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn output_dir(root: &Path, now: DateTime<Local>) -> PathBuf {
    root.join("Output")
        .join(now.format("%I-%M_%m-%d-%y").to_string())
}

fn write_outputs(dir: &Path, outcome: &BatchOutcome) -> Result<()> {
    fs::create_dir_all(dir).wrap_err_with(|| format!("create {}", dir.display()))?;
    for file in &outcome.files {
        let path = dir.join(&file.name);
        fs::write(&path, &file.bytes).wrap_err_with(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

fn move_to_discard(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let discard = parent.join("DISCARD");
    fs::create_dir_all(&discard).wrap_err_with(|| format!("create {}", discard.display()))?;
    let target = discard.join(path.file_name().unwrap_or_default());
    fs::rename(path, &target).wrap_err_with(|| format!("move {}", path.display()))?;
    Ok(target)
}
