// ==============================================================================
// processor.rs - Cohort Variant Processing
// ==============================================================================
// Description: Per-file variant extraction and parallel cohort fan-out
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 3.0.0
// ==============================================================================

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::FilterConfig;
use crate::models::{CohortDataset, VariantRecord};
use crate::parsers::csq::read_annotation_schema_from_path;
use crate::parsers::vcf::{open_vcf, LineOutcome, RecordExtractor, VariantParseError};

/// File name suffixes picked up by input discovery
const VCF_SUFFIXES: [&str; 3] = [".vcf", ".vcf.gz", ".vcf.bgz"];

/// Cohort processing errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to open {}: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process {}: {}", .path.display(), .source)]
    FileFailed {
        path: PathBuf,
        #[source]
        source: VariantParseError,
    },

    #[error("File worker failed: {0}")]
    WorkerFailed(String),

    #[error("Failed to scan input directory: {0}")]
    Discovery(#[from] walkdir::Error),
}

/// Per-file line counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub data_lines: usize,
    pub accepted: usize,
    pub not_passing: usize,
    pub unannotated: usize,
    pub no_qualifying_transcript: usize,
}

impl ExtractionStats {
    fn record(&mut self, outcome: &LineOutcome) {
        self.data_lines += 1;
        match outcome {
            LineOutcome::Accepted(_) => self.accepted += 1,
            LineOutcome::NotPassing => self.not_passing += 1,
            LineOutcome::Unannotated => self.unannotated += 1,
            LineOutcome::NoQualifyingTranscript => self.no_qualifying_transcript += 1,
        }
    }
}

/// What happened to one input file
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub sample_id: String,
    /// False when the header declares no CSQ format and the file was skipped
    pub schema_found: bool,
    pub stats: ExtractionStats,
}

/// Records extracted from one input file, in line order
#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub summary: FileSummary,
    pub records: Vec<VariantRecord>,
}

/// Result of a complete cohort run
#[derive(Debug, Clone)]
pub struct CohortRun {
    pub dataset: CohortDataset,
    /// One summary per input file, in submission order
    pub files: Vec<FileSummary>,
}

impl CohortRun {
    pub fn sample_ids(&self) -> Vec<String> {
        self.files.iter().map(|f| f.sample_id.clone()).collect()
    }

    pub fn files_processed(&self) -> usize {
        self.files.iter().filter(|f| f.schema_found).count()
    }

    pub fn files_skipped(&self) -> usize {
        self.files.iter().filter(|f| !f.schema_found).count()
    }
}

/// Sample identifier of a file: base name up to the first '.'
///
/// # Examples
/// ```
/// use std::path::Path;
/// use genetics_processor::processor::sample_id_from_path;
///
/// assert_eq!(sample_id_from_path(Path::new("/data/run1/SAMPLE1.vep.vcf.gz")), "SAMPLE1");
/// ```
pub fn sample_id_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();

    file_name.split('.').next().unwrap_or_default().to_string()
}

/// True for .vcf/.vcf.gz/.vcf.bgz names (index files excluded)
pub fn is_vcf_file_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    VCF_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Recursively collect VCF files under `root`, sorted by path
pub fn discover_input_files(root: &Path) -> Result<Vec<PathBuf>, ProcessingError> {
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_vcf_file_name(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!("Discovered {} VCF files under {:?}", files.len(), root);

    Ok(files)
}

/// Extract all qualifying records of one VCF file
///
/// A file whose header declares no CSQ format yields no records and no error.
/// Any malformed data line fails the whole file.
pub fn process_file(path: &Path, config: &FilterConfig) -> Result<FileExtraction, ProcessingError> {
    let sample_id = sample_id_from_path(path);
    let open_error = |source: std::io::Error| ProcessingError::Open {
        path: path.to_path_buf(),
        source,
    };

    let schema = read_annotation_schema_from_path(path).map_err(open_error)?;

    if schema.is_empty() {
        warn!(
            "No CSQ annotation format in header of {:?}; sample {} contributes no records",
            path, sample_id
        );
        return Ok(FileExtraction {
            summary: FileSummary {
                path: path.to_path_buf(),
                sample_id,
                schema_found: false,
                stats: ExtractionStats::default(),
            },
            records: Vec::new(),
        });
    }

    debug!("{:?}: {} CSQ fields", path, schema.len());

    let reader = open_vcf(path).map_err(open_error)?;
    let extractor = RecordExtractor::new(&schema, config, &sample_id);
    let file_error = |source: VariantParseError| ProcessingError::FileFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut records = Vec::new();
    let mut stats = ExtractionStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| file_error(VariantParseError::IoError(e)))?;

        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let outcome = extractor.evaluate(&line, index + 1).map_err(file_error)?;
        stats.record(&outcome);

        if let LineOutcome::Accepted(record) = outcome {
            records.push(record);
        }
    }

    info!(
        "{}: {} records from {} data lines ({} not PASS, {} unannotated, {} without qualifying transcript)",
        sample_id,
        records.len(),
        stats.data_lines,
        stats.not_passing,
        stats.unannotated,
        stats.no_qualifying_transcript
    );

    Ok(FileExtraction {
        summary: FileSummary {
            path: path.to_path_buf(),
            sample_id,
            schema_found: true,
            stats,
        },
        records,
    })
}

/// Fans `process_file` out over a cohort of VCF files
pub struct CohortProcessor {
    config: Arc<FilterConfig>,
    max_workers: usize,
}

impl CohortProcessor {
    /// Create a processor with one worker per available CPU
    pub fn new(config: FilterConfig) -> Self {
        let max_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            config: Arc::new(config),
            max_workers,
        }
    }

    /// Cap the number of files processed concurrently
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Process every file and flatten the results
    ///
    /// Fails as a whole on the first failing file; records of files that
    /// already completed are discarded.
    pub async fn run(&self, paths: &[PathBuf]) -> Result<CohortRun, ProcessingError> {
        info!(
            "Processing {} VCF files with up to {} workers",
            paths.len(),
            self.max_workers
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut join_set = JoinSet::new();

        for (index, path) in paths.iter().cloned().enumerate() {
            let config = Arc::clone(&self.config);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ProcessingError::WorkerFailed(e.to_string()))?;

                let extraction = tokio::task::spawn_blocking(move || process_file(&path, &config))
                    .await
                    .map_err(|e| ProcessingError::WorkerFailed(e.to_string()))??;

                Ok::<_, ProcessingError>((index, extraction))
            });
        }

        let mut completed = Vec::with_capacity(paths.len());

        while let Some(joined) = join_set.join_next().await {
            let result = joined
                .map_err(|e| ProcessingError::WorkerFailed(e.to_string()))
                .and_then(|r| r);

            match result {
                Ok(done) => completed.push(done),
                Err(e) => {
                    error!("Cohort run aborted: {}", e);
                    join_set.abort_all();
                    return Err(e);
                }
            }
        }

        // Submission order keeps outputs reproducible between runs
        completed.sort_by_key(|(index, _)| *index);

        let mut records = Vec::new();
        let mut files = Vec::with_capacity(completed.len());
        for (_, extraction) in completed {
            records.extend(extraction.records);
            files.push(extraction.summary);
        }

        info!(
            "Cohort run complete: {} records from {} files",
            records.len(),
            files.len()
        );

        Ok(CohortRun {
            dataset: CohortDataset::new(records),
            files,
        })
    }
}
