// ==============================================================================
// main.rs - Genetics Processor Entry Point
// ==============================================================================
// Description: CLI for cohort variant extraction from VEP-annotated VCF files
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use genetics_processor::audit::{file_sha256, AuditEventType, AuditLog, AUDIT_LOG_FILE};
use genetics_processor::config::{load_gene_panel, parse_gene_list, FilterConfig};
use genetics_processor::models::CohortAnalysis;
use genetics_processor::output::{OutputFormat, OutputGenerator};
use genetics_processor::processor::{discover_input_files, CohortProcessor};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory searched recursively for .vcf/.vcf.gz files
    #[arg(short, long, env = "INPUT_DIR")]
    input_dir: PathBuf,

    /// Directory for variant tables, summaries and the audit log
    #[arg(short, long, env = "OUTPUT_DIR", default_value = "results")]
    output_dir: PathBuf,

    /// Comma-separated gene symbols (e.g. TP53,BRCA1)
    #[arg(long, env = "GENE_PANEL")]
    gene_panel: Option<String>,

    /// CSV/TSV file with one gene symbol per row
    #[arg(long, env = "GENE_PANEL_FILE")]
    gene_panel_file: Option<PathBuf>,

    /// Minimum read depth
    #[arg(long, env = "MIN_DEPTH")]
    min_depth: Option<u32>,

    /// Minimum variant allele fraction
    #[arg(long, env = "MIN_ALLELE_FREQUENCY")]
    min_allele_frequency: Option<f64>,

    /// Maximum population allele frequency
    #[arg(long, env = "MAX_POPULATION_FREQUENCY")]
    max_population_frequency: Option<f64>,

    /// Keep only pathogenic / risk-factor variants
    /// (env accepts 1/0, true/false, yes/no, on/off)
    #[arg(
        long,
        env = "PATHOGENIC_ONLY",
        action = clap::ArgAction::SetTrue,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pathogenic_only: bool,

    /// Allowed IMPACT level (repeatable)
    #[arg(long = "impact", env = "IMPACTS", value_delimiter = ',')]
    impacts: Vec<String>,

    /// Consequence term to match (repeatable)
    #[arg(long = "consequence", env = "CONSEQUENCES", value_delimiter = ',')]
    consequences: Vec<String>,

    /// CSQ field holding the population allele frequency
    #[arg(long, env = "POPULATION_FREQUENCY_FIELD")]
    population_frequency_field: Option<String>,

    /// JSON filter configuration file
    #[arg(short, long, env = "FILTER_CONFIG")]
    config: Option<PathBuf>,

    /// Variant table format: csv, json or parquet (repeatable)
    #[arg(short, long = "format", value_delimiter = ',')]
    formats: Vec<OutputFormat>,

    /// Maximum number of files processed concurrently
    #[arg(short, long, env = "WORKER_THREADS")]
    threads: Option<usize>,
}

/// Defaults < JSON config file < environment / CLI flags
fn build_filter_config(args: &Args) -> Result<FilterConfig> {
    let mut config = match &args.config {
        Some(path) => FilterConfig::from_json_file(path)?,
        None => FilterConfig::default(),
    };

    let mut panel = BTreeSet::new();
    if let Some(path) = &args.gene_panel_file {
        panel.extend(load_gene_panel(path)?);
    }
    if let Some(list) = &args.gene_panel {
        panel.extend(parse_gene_list(list));
    }
    if !panel.is_empty() {
        config = config.with_gene_panel(panel);
    }

    if let Some(depth) = args.min_depth {
        config = config.with_min_depth(depth);
    }
    if let Some(frequency) = args.min_allele_frequency {
        config = config.with_min_allele_frequency(frequency);
    }
    if let Some(frequency) = args.max_population_frequency {
        config = config.with_max_population_frequency(frequency);
    }
    if args.pathogenic_only {
        config = config.with_pathogenic_only(true);
    }
    if !args.impacts.is_empty() {
        config = config.with_allowed_impacts(args.impacts.iter().map(|i| i.trim().to_uppercase()));
    }
    if !args.consequences.is_empty() {
        config = config.with_consequence_terms(args.consequences.iter().map(|c| c.trim().to_string()));
    }
    if let Some(field) = &args.population_frequency_field {
        config = config.with_population_frequency_field(field.as_str());
    }

    config.validate()?;
    Ok(config)
}

/// Discover, extract, export; audit events for every file and output
async fn execute(args: &Args, config: FilterConfig, audit: &AuditLog) -> Result<()> {
    let inputs = discover_input_files(&args.input_dir)
        .with_context(|| format!("Failed to scan {:?}", args.input_dir))?;

    if inputs.is_empty() {
        warn!("No VCF files found under {:?}", args.input_dir);
    }

    audit.log(
        AuditEventType::RunStarted,
        Some(args.input_dir.display().to_string()),
        serde_json::json!({
            "files": inputs.len(),
            "filter": &config,
        }),
    )?;

    let mut processor = CohortProcessor::new(config.clone());
    if let Some(threads) = args.threads {
        processor = processor.with_max_workers(threads);
    }

    let run = processor.run(&inputs).await?;

    for file in &run.files {
        let checksum = file_sha256(&file.path)
            .with_context(|| format!("Failed to checksum {:?}", file.path))?;

        let event_type = if file.schema_found {
            AuditEventType::FileProcessed
        } else {
            AuditEventType::FileSkipped
        };

        audit.log(
            event_type,
            Some(file.path.display().to_string()),
            serde_json::json!({
                "sample_id": file.sample_id,
                "sha256": checksum,
                "data_lines": file.stats.data_lines,
                "records": file.stats.accepted,
            }),
        )?;
    }

    let analysis = CohortAnalysis {
        run_id: audit.run_id(),
        generated_at: Utc::now(),
        filter: config,
        sample_ids: run.sample_ids(),
        files_processed: run.files_processed(),
        files_skipped: run.files_skipped(),
        dataset: run.dataset,
    };

    let formats = if args.formats.is_empty() {
        vec![OutputFormat::Csv]
    } else {
        args.formats.clone()
    };

    let generator = OutputGenerator::new(&args.output_dir);
    let written = generator.generate(&analysis, &formats)?;

    for (format, path) in &written {
        audit.log(
            AuditEventType::OutputWritten,
            Some(path.display().to_string()),
            serde_json::json!({
                "format": format,
                "variants": analysis.dataset.len(),
            }),
        )?;
    }

    audit.log(
        AuditEventType::RunCompleted,
        None,
        serde_json::json!({
            "samples": analysis.sample_ids.len(),
            "files_processed": analysis.files_processed,
            "files_skipped": analysis.files_skipped,
            "variants": analysis.dataset.len(),
        }),
    )?;

    info!(
        "Run {} complete: {} variants across {} samples written to {:?}",
        analysis.run_id,
        analysis.dataset.len(),
        analysis.sample_ids.len(),
        args.output_dir
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genetics_processor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Genetics Processor starting...");

    // Parse command line arguments
    let args = Args::parse();
    let config = build_filter_config(&args)?;

    if config.gene_panel.is_empty() {
        warn!("Gene panel is empty; no variants will be selected");
    }

    let audit = AuditLog::new(args.output_dir.join(AUDIT_LOG_FILE), Uuid::new_v4());

    match execute(&args, config, &audit).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {:#}", e);

            // Audit: Run failed
            audit.log(
                AuditEventType::RunFailed,
                None,
                serde_json::json!({
                    "error": format!("{:#}", e),
                }),
            )?;

            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_config_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"min_depth": 50, "gene_panel": ["KRAS"], "allowed_impacts": ["HIGH"]}"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "genetics-processor",
            "--input-dir",
            "in",
            "--config",
            file.path().to_str().unwrap(),
            "--gene-panel",
            "TP53, BRCA1",
            "--min-allele-frequency",
            "0.1",
            "--impact",
            "moderate",
            "--format",
            "csv,parquet",
        ]);

        let config = build_filter_config(&args).unwrap();
        assert_eq!(config.min_depth, 50);
        assert_eq!(config.min_allele_frequency, 0.1);
        assert_eq!(config.gene_panel.iter().collect::<Vec<_>>(), vec!["BRCA1", "TP53"]);
        assert_eq!(config.allowed_impacts.iter().collect::<Vec<_>>(), vec!["MODERATE"]);
        assert_eq!(args.formats, vec![OutputFormat::Csv, OutputFormat::Parquet]);
    }

    #[test]
    fn test_invalid_frequency_rejected() {
        let args = Args::parse_from([
            "genetics-processor",
            "--input-dir",
            "in",
            "--max-population-frequency",
            "1.5",
        ]);

        assert!(build_filter_config(&args).is_err());
    }

    #[test]
    fn test_pathogenic_only_from_numeric_env() {
        std::env::set_var("PATHOGENIC_ONLY", "1");
        let enabled = Args::try_parse_from(["genetics-processor", "--input-dir", "in"]);
        std::env::set_var("PATHOGENIC_ONLY", "0");
        let disabled = Args::try_parse_from(["genetics-processor", "--input-dir", "in"]);
        std::env::remove_var("PATHOGENIC_ONLY");

        assert!(enabled.unwrap().pathogenic_only);
        assert!(!disabled.unwrap().pathogenic_only);
    }
}
