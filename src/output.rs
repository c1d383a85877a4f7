// ==============================================================================
// output.rs - Multi-Format Output Generation
// ==============================================================================
// Description: Export the cohort variant table, sample table and run summary
//              for the dashboard and report layers
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

// Apache Arrow/Parquet for columnar data
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::config::FilterConfig;
use crate::models::{CohortAnalysis, VariantRecord};
use crate::summary::{
    gene_prevalence, mutation_matrix, risk_status, substitution_spectrum, summarize_samples,
    GeneCount, MutationMatrix, SampleSummary, SubstitutionCount,
};

/// Base name of the variant table files
const VARIANTS_FILE_STEM: &str = "variants";

/// Consolidated per-sample table
pub const SAMPLE_TABLE_FILE: &str = "samples.csv";

/// Run metadata and cohort aggregates
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// Supported variant table formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated table (spreadsheets, pandas)
    Csv,
    /// JSON with run metadata (web APIs and JavaScript)
    Json,
    /// Apache Parquet (Python, R, Spark)
    Parquet,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(format!("unknown output format '{}' (csv, json, parquet)", other)),
        }
    }
}

/// Run metadata plus the aggregates behind the cohort overview
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub filter: FilterConfig,
    pub sample_ids: Vec<String>,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub variant_count: usize,
    pub samples_with_variants: usize,
    pub samples_without_variants: usize,
    pub gene_prevalence: Vec<GeneCount>,
    pub substitution_spectrum: Vec<SubstitutionCount>,
    /// gene -> sample -> consequence (OncoPrint cells)
    pub mutation_matrix: MutationMatrix,
    pub samples: Vec<SampleSummary>,
}

impl RunSummary {
    pub fn from_analysis(analysis: &CohortAnalysis) -> Self {
        let samples = summarize_samples(&analysis.dataset, &analysis.sample_ids);
        let (samples_with_variants, samples_without_variants) = risk_status(&samples);

        Self {
            run_id: analysis.run_id,
            generated_at: analysis.generated_at,
            filter: analysis.filter.clone(),
            sample_ids: analysis.sample_ids.clone(),
            files_processed: analysis.files_processed,
            files_skipped: analysis.files_skipped,
            variant_count: analysis.dataset.len(),
            samples_with_variants,
            samples_without_variants,
            gene_prevalence: gene_prevalence(&analysis.dataset),
            substitution_spectrum: substitution_spectrum(&analysis.dataset),
            mutation_matrix: mutation_matrix(&analysis.dataset),
            samples,
        }
    }
}

/// Flat row of the sample table
#[derive(Debug, Serialize)]
struct SampleTableRow<'a> {
    sample_id: &'a str,
    has_qualifying_variant: &'static str,
    genes: String,
    variant_count: usize,
}

/// Multi-format output generator
pub struct OutputGenerator {
    output_dir: PathBuf,
}

impl OutputGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the variant table in each requested format, plus the sample
    /// table and run summary
    ///
    /// # Returns
    /// * HashMap of format -> variant table path
    pub fn generate(
        &self,
        analysis: &CohortAnalysis,
        formats: &[OutputFormat],
    ) -> Result<HashMap<OutputFormat, PathBuf>> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {:?}", self.output_dir)
        })?;

        let mut result = HashMap::new();

        for format in formats {
            if result.contains_key(format) {
                continue;
            }

            let path = self
                .output_dir
                .join(format!("{}.{}", VARIANTS_FILE_STEM, format.extension()));

            match format {
                OutputFormat::Csv => self.generate_csv(&path, &analysis.dataset.records)?,
                OutputFormat::Json => self.generate_json(&path, analysis)?,
                OutputFormat::Parquet => self.generate_parquet(&path, &analysis.dataset.records)?,
            }

            result.insert(*format, path);
        }

        let summary = RunSummary::from_analysis(analysis);
        self.generate_sample_table(&self.output_dir.join(SAMPLE_TABLE_FILE), &summary.samples)?;
        self.generate_run_summary(&self.output_dir.join(RUN_SUMMARY_FILE), &summary)?;

        Ok(result)
    }

    /// Generate CSV variant table
    fn generate_csv(&self, path: &Path, records: &[VariantRecord]) -> Result<()> {
        info!("Generating CSV output: {:?}", path);

        let mut writer = csv::Writer::from_path(path).context("Failed to create CSV output file")?;
        if records.is_empty() {
            // serde only emits headers alongside the first row
            writer
                .write_record(VARIANT_COLUMNS)
                .context("Failed to write CSV header")?;
        }
        for record in records {
            writer.serialize(record).context("Failed to write CSV row")?;
        }
        writer.flush().context("Failed to flush CSV output")?;

        info!("CSV output complete: {} variants", records.len());
        Ok(())
    }

    /// Generate JSON output (run metadata + variants)
    fn generate_json(&self, path: &Path, analysis: &CohortAnalysis) -> Result<()> {
        info!("Generating JSON output: {:?}", path);

        let file = std::fs::File::create(path).context("Failed to create JSON output file")?;
        serde_json::to_writer_pretty(file, analysis).context("Failed to write JSON output")?;

        info!(
            "JSON output complete: {} variants, {} samples",
            analysis.dataset.len(),
            analysis.sample_ids.len()
        );
        Ok(())
    }

    /// Generate Parquet output (columnar format for data science)
    fn generate_parquet(&self, path: &Path, records: &[VariantRecord]) -> Result<()> {
        info!("Generating Parquet output: {:?}", path);

        let schema = Arc::new(variant_arrow_schema());

        let strings = |f: fn(&VariantRecord) -> &str| -> ArrayRef {
            Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
        };

        let columns: Vec<ArrayRef> = vec![
            strings(|r| r.sample_id.as_str()),
            strings(|r| r.chromosome.as_str()),
            Arc::new(UInt64Array::from(
                records.iter().map(|r| r.position).collect::<Vec<_>>(),
            )),
            strings(|r| r.reference_allele.as_str()),
            strings(|r| r.alternate_allele.as_str()),
            strings(|r| r.gene_symbol.as_str()),
            Arc::new(Float64Array::from(
                records.iter().map(|r| r.allele_frequency).collect::<Vec<_>>(),
            )),
            Arc::new(UInt32Array::from(
                records.iter().map(|r| r.read_depth).collect::<Vec<_>>(),
            )),
            strings(|r| r.consequence_type.as_str()),
            strings(|r| r.substitution_class.as_str()),
            Arc::new(UInt64Array::from(
                records.iter().map(|r| r.protein_position).collect::<Vec<_>>(),
            )),
            strings(|r| r.protein_change_notation.as_str()),
            strings(|r| r.clinical_significance.as_str()),
            strings(|r| r.impact_level.as_str()),
        ];

        let batch = RecordBatch::try_new(schema.clone(), columns)
            .context("Failed to create Arrow RecordBatch")?;

        // Write to Parquet file with compression
        let file = std::fs::File::create(path).context("Failed to create Parquet file")?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))
            .context("Failed to create Parquet writer")?;

        writer.write(&batch).context("Failed to write Parquet data")?;
        writer.close().context("Failed to close Parquet writer")?;

        info!("Parquet output complete: {} variants", records.len());
        Ok(())
    }

    fn generate_sample_table(&self, path: &Path, samples: &[SampleSummary]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).context("Failed to create sample table")?;

        if samples.is_empty() {
            writer
                .write_record(["sample_id", "has_qualifying_variant", "genes", "variant_count"])
                .context("Failed to write sample table header")?;
        }

        for sample in samples {
            writer
                .serialize(SampleTableRow {
                    sample_id: &sample.sample_id,
                    has_qualifying_variant: if sample.has_qualifying_variant { "yes" } else { "no" },
                    genes: sample.genes.join(", "),
                    variant_count: sample.variant_count,
                })
                .context("Failed to write sample table row")?;
        }
        writer.flush().context("Failed to flush sample table")?;

        Ok(())
    }

    fn generate_run_summary(&self, path: &Path, summary: &RunSummary) -> Result<()> {
        let file = std::fs::File::create(path).context("Failed to create run summary")?;
        serde_json::to_writer_pretty(file, summary).context("Failed to write run summary")?;
        Ok(())
    }
}

/// Variant table column names, in output order
pub const VARIANT_COLUMNS: [&str; 14] = [
    "sample_id",
    "chromosome",
    "position",
    "reference_allele",
    "alternate_allele",
    "gene_symbol",
    "allele_frequency",
    "read_depth",
    "consequence_type",
    "substitution_class",
    "protein_position",
    "protein_change_notation",
    "clinical_significance",
    "impact_level",
];

/// Arrow schema of the variant table
pub fn variant_arrow_schema() -> Schema {
    Schema::new(vec![
        Field::new("sample_id", DataType::Utf8, false),
        Field::new("chromosome", DataType::Utf8, false),
        Field::new("position", DataType::UInt64, false),
        Field::new("reference_allele", DataType::Utf8, false),
        Field::new("alternate_allele", DataType::Utf8, false),
        Field::new("gene_symbol", DataType::Utf8, false),
        Field::new("allele_frequency", DataType::Float64, false),
        Field::new("read_depth", DataType::UInt32, false),
        Field::new("consequence_type", DataType::Utf8, false),
        Field::new("substitution_class", DataType::Utf8, false),
        Field::new("protein_position", DataType::UInt64, false),
        Field::new("protein_change_notation", DataType::Utf8, false),
        Field::new("clinical_significance", DataType::Utf8, false),
        Field::new("impact_level", DataType::Utf8, false),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CohortDataset;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    fn analysis() -> CohortAnalysis {
        let record = VariantRecord {
            sample_id: "SAMPLE1".to_string(),
            chromosome: "chr17".to_string(),
            position: 7675088,
            reference_allele: "C".to_string(),
            alternate_allele: "T".to_string(),
            gene_symbol: "TP53".to_string(),
            allele_frequency: 0.6,
            read_depth: 40,
            consequence_type: "missense_variant".to_string(),
            substitution_class: "C>T".to_string(),
            protein_position: 175,
            protein_change_notation: "p.Arg175His".to_string(),
            clinical_significance: "pathogenic".to_string(),
            impact_level: "HIGH".to_string(),
        };

        CohortAnalysis {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            filter: FilterConfig::new().with_gene_panel(["TP53"]),
            sample_ids: vec!["SAMPLE1".to_string(), "SAMPLE2".to_string()],
            files_processed: 2,
            files_skipped: 0,
            dataset: CohortDataset::new(vec![record]),
        }
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Csv.extension(), "csv");
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert_eq!(OutputFormat::Parquet.extension(), "parquet");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("PARQUET".parse::<OutputFormat>(), Ok(OutputFormat::Parquet));
        assert!("sqlite".parse::<OutputFormat>().is_err());

        let json = serde_json::to_string(&OutputFormat::Json).unwrap();
        assert_eq!(json, "\"json\"");
    }

    #[test]
    fn test_generate_all_formats() {
        let dir = TempDir::new().unwrap();
        let generator = OutputGenerator::new(dir.path());
        let analysis = analysis();

        let written = generator
            .generate(
                &analysis,
                &[OutputFormat::Csv, OutputFormat::Json, OutputFormat::Parquet],
            )
            .unwrap();
        assert_eq!(written.len(), 3);

        // CSV header follows the record field order
        let mut reader = csv::Reader::from_path(&written[&OutputFormat::Csv]).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, VARIANT_COLUMNS);
        let rows: Vec<VariantRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows, analysis.dataset.records);

        // JSON round-trips the full analysis
        let json = std::fs::read_to_string(&written[&OutputFormat::Json]).unwrap();
        let parsed: CohortAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.dataset, analysis.dataset);
        assert_eq!(parsed.filter, analysis.filter);

        // Parquet row count
        let file = std::fs::File::open(&written[&OutputFormat::Parquet]).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|batch| batch.unwrap().num_rows()).sum();
        assert_eq!(rows, 1);

        // Sample table lists samples without variants too
        let mut samples = csv::Reader::from_path(dir.path().join(SAMPLE_TABLE_FILE)).unwrap();
        let sample_rows: Vec<csv::StringRecord> = samples.records().map(|r| r.unwrap()).collect();
        assert_eq!(sample_rows.len(), 2);
        assert_eq!(&sample_rows[0][1], "yes");
        assert_eq!(&sample_rows[1][0], "SAMPLE2");
        assert_eq!(&sample_rows[1][1], "no");

        let summary: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(RUN_SUMMARY_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["variant_count"], 1);
        assert_eq!(summary["samples_without_variants"], 1);
        assert_eq!(summary["substitution_spectrum"][2]["class"], "C>T");
        assert_eq!(summary["substitution_spectrum"][2]["count"], 1);
        assert_eq!(summary["mutation_matrix"]["TP53"]["SAMPLE1"], "missense_variant");
        assert!(summary["mutation_matrix"]["TP53"].get("SAMPLE2").is_none());
    }

    #[test]
    fn test_empty_dataset_still_writes_headers() {
        let dir = TempDir::new().unwrap();
        let generator = OutputGenerator::new(dir.path());
        let mut analysis = analysis();
        analysis.dataset = CohortDataset::default();

        let written = generator.generate(&analysis, &[OutputFormat::Csv]).unwrap();

        let mut reader = csv::Reader::from_path(&written[&OutputFormat::Csv]).unwrap();
        assert_eq!(reader.headers().unwrap().len(), VARIANT_COLUMNS.len());
        assert_eq!(reader.records().count(), 0);
    }
}
