use anyhow::{bail, Context, Result};
use clap::Parser;
use dicom_batch_curate::config::{Config, ConfigBuilder};
use dicom_batch_curate::processor::{PatientPreview, PatientProcessor};
use env_logger::Builder;
use log::{error, Level, LevelFilter};
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Redact and chronologically sequence patient DICOM directories
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Root directory containing the patient subdirectories
    #[arg(short, long, value_name = "ROOT_PATH")]
    root: PathBuf,

    /// Regex a subdirectory name must match to be processed as a patient
    #[arg(short, long, value_name = "REGEX", default_value = ".*")]
    pattern: String,

    /// Anonymization tag replacing the patient name (default: the patient
    /// directory name)
    #[arg(short, long, value_name = "TAG")]
    tag: Option<String>,

    /// Load the configuration from a JSON file
    #[arg(short, long, value_name = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Show what would change without touching any file
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show more verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => ConfigBuilder::default().build(),
    };

    let config = match &args.tag {
        Some(tag) => ConfigBuilder::from(config)
            .patient_name_override(tag.clone())
            .build(),
        None => config,
    };

    Ok(config)
}

fn find_patient_dirs(root: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    let mut patients: Vec<PathBuf> = fs::read_dir(root)
        .with_context(|| format!("failed to read {}", root.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| pattern.is_match(name))
        })
        .collect();
    patients.sort();
    Ok(patients)
}

fn print_preview(preview: &PatientPreview) {
    println!(
        "{} (anonymization tag: {})",
        preview.patient.display(),
        preview.anonymization_tag
    );
    for (path, redaction) in &preview.redactions {
        println!("  {}", path.display());
        for change in &redaction.changes {
            println!("    {}: {:?} -> {:?}", change.field, change.before, change.after);
        }
    }
    for planned in &preview.planned {
        println!(
            "  {} -> {}",
            planned.from.display(),
            planned.to.display()
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Error
    };

    let mut builder = Builder::from_default_env();
    builder
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "Error",
                Level::Warn => "Warning",
                Level::Info => "Info",
                Level::Debug => "Debug",
                Level::Trace => "Trace",
            };
            writeln!(buf, "{}: {}", level, record.args())
        })
        .filter(None, log_level);
    builder.init();

    let pattern = Regex::new(&args.pattern)
        .with_context(|| format!("invalid patient directory pattern {:?}", args.pattern))?;
    let config = load_config(&args)?;

    let patients = find_patient_dirs(&args.root, &pattern)?;
    if patients.is_empty() {
        bail!(
            "no patient directories matching {:?} under {}",
            args.pattern,
            args.root.display()
        );
    }

    let processor = PatientProcessor::new(config);

    if args.dry_run {
        let mut failed = 0usize;
        for patient in &patients {
            match processor.preview(patient) {
                Ok(preview) => print_preview(&preview),
                Err(err) => {
                    error!("{err}");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {} patient directories failed", patients.len());
        }
        return Ok(());
    }

    // Patient subtrees are disjoint, so they can be processed in parallel;
    // one patient's failure never stops the others.
    let results: Vec<_> = patients
        .par_iter()
        .map(|patient| processor.process(patient))
        .collect();

    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(summary) => println!(
                "{}: {} record(s) -> {}",
                summary.patient.display(),
                summary.records,
                summary.output_dir.display()
            ),
            Err(err) => {
                error!("{err}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} patient directories failed", patients.len());
    }

    Ok(())
}
