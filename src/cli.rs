//
// cli.rs
// dicom-headers
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the engine.
//

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Parser, Subcommand};

use crate::jobs::{self, HeadersReply, ScanMessage};
use crate::models::{DicomIndex, HeaderNode};

/// Command-line interface glue code: defines the available verbs and
/// dispatches to the engine entry points.
#[derive(Parser)]
#[command(name = "dicom-headers")]
#[command(about = "DICOM metadata indexing and header inspection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a directory into a Patient/Study/Series/Instance index
    Index {
        directory: PathBuf,
        /// Emit the aggregated index as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Decode a single file's header tree
    Headers {
        file: PathBuf,
        /// Emit the tree as JSON instead of indented text
        #[arg(long)]
        json: bool,
        /// Maximum sequence depth to print in text mode
        #[arg(long, default_value_t = 4)]
        max_depth: usize,
    },
}

pub async fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();

    match cli.command {
        Commands::Index { directory, json } => run_index(directory, json).await?,
        Commands::Headers {
            file,
            json,
            max_depth,
        } => run_headers(file, json, max_depth).await?,
    }

    Ok(())
}

async fn run_index(directory: PathBuf, json: bool) -> anyhow::Result<()> {
    let (_job_id, mut rx) = jobs::start_scan(directory.clone());

    while let Some(message) = rx.recv().await {
        match message {
            ScanMessage::Progress {
                percent,
                current_path,
                ..
            } => {
                let path = current_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                eprintln!("[{:>3.0}%] {}", percent * 100.0, path);
            }
            ScanMessage::Result { index, .. } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&index)?);
                } else {
                    print_index_summary(&directory, &index);
                }
                return Ok(());
            }
            ScanMessage::Error { error, .. } => bail!("Scan failed: {error}"),
        }
    }

    bail!("Scan ended without a terminal message")
}

fn print_index_summary(root: &Path, index: &DicomIndex) {
    let stats = &index.stats;

    println!("{}", "=".repeat(80));
    println!("DICOM Index: {}", root.display());
    println!("{}", "=".repeat(80));

    println!(
        "Files: {} parsed / {} listed",
        stats.files_parsed, stats.files_total
    );
    println!(
        "Patients: {} | Studies: {} | Series: {} | Instances: {}",
        stats.patients, stats.studies, stats.series, stats.instances
    );
    if !stats.modality_by_series.is_empty() {
        let buckets: Vec<String> = stats
            .modality_by_series
            .iter()
            .map(|(modality, count)| format!("{modality}={count}"))
            .collect();
        println!("Series by modality: {}", buckets.join(" "));
    }

    for patient in &index.patients {
        println!(
            "\nPATIENT {} ({})",
            patient.patient_id,
            patient.patient_name.as_deref().unwrap_or("N/A")
        );
        for study in &patient.studies {
            println!(
                "  STUDY {} {}",
                study.study_uid,
                study.study_description.as_deref().unwrap_or("")
            );
            for series in &study.series {
                println!(
                    "    SERIES {} [{}] {} ({} instance(s))",
                    series.series_uid,
                    series.modality,
                    series.series_description.as_deref().unwrap_or(""),
                    series.instance_count
                );
            }
        }
    }
}

async fn run_headers(file: PathBuf, json: bool, max_depth: usize) -> anyhow::Result<()> {
    match jobs::get_headers(file).await {
        HeadersReply::Headers(nodes) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&nodes)?);
            } else {
                print_nodes(&nodes, 0, max_depth);
            }
            Ok(())
        }
        HeadersReply::Error { error } => bail!("Header decode failed: {error}"),
    }
}

fn print_nodes(nodes: &[HeaderNode], depth: usize, max_depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        println!(
            "{}{} {} {} {}",
            indent,
            node.tag_hex,
            node.keyword,
            node.vr.as_deref().unwrap_or("--"),
            node.preview
        );
        if depth < max_depth {
            if let Some(children) = &node.children {
                print_nodes(children, depth + 1, max_depth);
            }
        }
    }
}
