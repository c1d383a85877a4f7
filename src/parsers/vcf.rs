// ==============================================================================
// parsers/vcf.rs - VCF data line extraction
// ==============================================================================
// Description: Turns one CSQ-annotated VCF data line into at most one
//              variant record
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// References:
// - VCF 4.2 Spec: https://samtools.github.io/hts-specs/VCFv4.2.pdf
// - VEP CSQ: https://www.ensembl.org/info/docs/tools/vep/vep_formats.html
// ==============================================================================

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use super::csq::{AnnotationSchema, TranscriptAnnotation};
use crate::allele_metrics::{
    decode_sample_metrics, normalize_substitution, read_depth, resolve_allele_frequency,
    MetricError,
};
use crate::config::FilterConfig;
use crate::models::VariantRecord;
use crate::validator::{fields, VariantValidator};

const CHROM_COLUMN: usize = 0;
const POS_COLUMN: usize = 1;
const REF_COLUMN: usize = 3;
const ALT_COLUMN: usize = 4;
const FILTER_COLUMN: usize = 6;
const INFO_COLUMN: usize = 7;
const FORMAT_COLUMN: usize = 8;
const SAMPLE_COLUMN: usize = 9;

/// FILTER value of calls that passed all filters
pub const PASS_FILTER: &str = "PASS";

/// INFO key of the VEP annotation block
pub const CSQ_INFO_KEY: &str = "CSQ=";

/// Placeholder for annotation fields missing from the accepted transcript
const NOT_ANNOTATED: &str = "N/A";

/// VCF line extraction errors
#[derive(Error, Debug)]
pub enum VariantParseError {
    #[error("Malformed line {line}: expected at least {expected} columns, found {found}")]
    MalformedLine {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid {field} value at line {line}: '{value}'")]
    InvalidNumericField {
        line: usize,
        field: String,
        value: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl VariantParseError {
    fn numeric(line: usize, err: MetricError) -> Self {
        VariantParseError::InvalidNumericField {
            line,
            field: err.field().to_string(),
            value: err.value().to_string(),
        }
    }
}

/// What one data line contributed
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// First transcript annotation that passed validation
    Accepted(VariantRecord),
    /// FILTER is not PASS
    NotPassing,
    /// INFO carries no CSQ block
    Unannotated,
    /// No transcript annotation passed validation
    NoQualifyingTranscript,
}

/// Open a .vcf file, decompressing .gz/.bgz transparently
pub fn open_vcf(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let compressed = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("bgz"));

    if compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Value of the CSQ entry in an INFO column, up to the next ';'
fn annotation_block(info: &str) -> Option<&str> {
    info.split(';').find_map(|entry| entry.strip_prefix(CSQ_INFO_KEY))
}

/// Amino-acid position from a "start/length" Protein_position value
///
/// Non-numeric starts ("?", "123-125", "") give 0.
fn protein_position(annotation: &TranscriptAnnotation<'_>) -> u64 {
    annotation
        .get(fields::PROTEIN_POSITION)
        .and_then(|value| value.split('/').next())
        .filter(|start| !start.is_empty() && start.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|start| start.parse::<u64>().ok())
        .unwrap_or(0)
}

fn field_or_placeholder(annotation: &TranscriptAnnotation<'_>, field: &str) -> String {
    annotation
        .get(field)
        .map_or(NOT_ANNOTATED, |value| *value)
        .to_string()
}

/// Extracts variant records from the data lines of one file
pub struct RecordExtractor<'a> {
    schema: &'a AnnotationSchema,
    validator: VariantValidator<'a>,
    sample_id: &'a str,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(schema: &'a AnnotationSchema, config: &'a FilterConfig, sample_id: &'a str) -> Self {
        Self {
            schema,
            validator: VariantValidator::new(config),
            sample_id,
        }
    }

    /// Extract the record of one data line, if any transcript qualifies
    ///
    /// # Arguments
    /// * `line` - Raw tab-delimited data line
    /// * `line_number` - 1-based line number, used in error reports
    ///
    /// # Returns
    /// * `Ok(Some(record))` - First transcript that passed validation
    /// * `Ok(None)` - Line filtered, unannotated or without qualifying transcript
    /// * `Err(VariantParseError)` - Too few columns or unparseable numeric field
    pub fn extract(
        &self,
        line: &str,
        line_number: usize,
    ) -> Result<Option<VariantRecord>, VariantParseError> {
        match self.evaluate(line, line_number)? {
            LineOutcome::Accepted(record) => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    /// Classify one data line
    pub fn evaluate(&self, line: &str, line_number: usize) -> Result<LineOutcome, VariantParseError> {
        let columns: Vec<&str> = line.trim().split('\t').collect();

        if columns.len() <= INFO_COLUMN {
            return Err(VariantParseError::MalformedLine {
                line: line_number,
                expected: INFO_COLUMN + 1,
                found: columns.len(),
            });
        }

        if columns[FILTER_COLUMN] != PASS_FILTER {
            return Ok(LineOutcome::NotPassing);
        }

        let Some(block) = annotation_block(columns[INFO_COLUMN]) else {
            return Ok(LineOutcome::Unannotated);
        };

        if columns.len() <= SAMPLE_COLUMN {
            return Err(VariantParseError::MalformedLine {
                line: line_number,
                expected: SAMPLE_COLUMN + 1,
                found: columns.len(),
            });
        }

        let metrics = decode_sample_metrics(columns[FORMAT_COLUMN], columns[SAMPLE_COLUMN]);
        let depth = read_depth(&metrics).map_err(|e| VariantParseError::numeric(line_number, e))?;
        let allele_frequency = resolve_allele_frequency(&metrics)
            .map_err(|e| VariantParseError::numeric(line_number, e))?;

        let position = columns[POS_COLUMN].trim().parse::<u64>().map_err(|_| {
            VariantParseError::InvalidNumericField {
                line: line_number,
                field: "POS".to_string(),
                value: columns[POS_COLUMN].to_string(),
            }
        })?;

        // Only the first qualifying transcript contributes a record
        for entry in block.split(',') {
            let annotation = self.schema.annotate(entry);

            let accepted = self
                .validator
                .accepts(&annotation, depth, allele_frequency)
                .map_err(|e| VariantParseError::numeric(line_number, e))?;

            if accepted {
                let record = self.build_record(&columns, position, depth, allele_frequency, &annotation);
                return Ok(LineOutcome::Accepted(record));
            }
        }

        Ok(LineOutcome::NoQualifyingTranscript)
    }

    fn build_record(
        &self,
        columns: &[&str],
        position: u64,
        read_depth: u32,
        allele_frequency: f64,
        annotation: &TranscriptAnnotation<'_>,
    ) -> VariantRecord {
        let reference_allele = columns[REF_COLUMN];
        let alternate_allele = columns[ALT_COLUMN];

        let consequence_type = annotation
            .get(fields::CONSEQUENCE)
            .and_then(|terms| terms.split('&').next())
            .unwrap_or_default()
            .to_string();

        VariantRecord {
            sample_id: self.sample_id.to_string(),
            chromosome: columns[CHROM_COLUMN].to_string(),
            position,
            reference_allele: reference_allele.to_string(),
            alternate_allele: alternate_allele.to_string(),
            gene_symbol: annotation
                .get(fields::SYMBOL)
                .copied()
                .unwrap_or_default()
                .to_string(),
            allele_frequency,
            read_depth,
            consequence_type,
            substitution_class: normalize_substitution(reference_allele, alternate_allele),
            protein_position: protein_position(annotation),
            protein_change_notation: field_or_placeholder(annotation, fields::HGVSP),
            clinical_significance: field_or_placeholder(annotation, fields::CLIN_SIG),
            impact_level: field_or_placeholder(annotation, fields::IMPACT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AnnotationSchema {
        AnnotationSchema::new(
            [
                "Allele",
                "Consequence",
                "IMPACT",
                "SYMBOL",
                "Protein_position",
                "HGVSp",
                "CLIN_SIG",
                "gnomAD_AF",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
        )
    }

    fn config() -> FilterConfig {
        FilterConfig::new()
            .with_gene_panel(["TP53", "BRCA1"])
            .with_min_depth(20)
            .with_min_allele_frequency(0.05)
            .with_max_population_frequency(0.01)
    }

    fn line(filter: &str, csq: &str, sample: &str) -> String {
        format!(
            "17\t7675088\t.\tG\tA\t60\t{}\tDP=40;CSQ={};SOMATIC\tGT:AD:DP\t{}",
            filter, csq, sample
        )
    }

    #[test]
    fn test_extracts_first_qualifying_transcript() {
        let schema = schema();
        let config = config();
        let extractor = RecordExtractor::new(&schema, &config, "SAMPLE1");

        let csq = "A|intron_variant|MODIFIER|ATP1B2|||benign|0.5,\
                   A|missense_variant&splice_region_variant|HIGH|TP53|175/393|p.Arg175His|pathogenic|0.0,\
                   A|stop_gained|HIGH|BRCA1|12/1863|p.Gln12Ter|pathogenic|0.0";
        let record = extractor
            .extract(&line("PASS", csq, "0/1:8,12:40"), 10)
            .unwrap()
            .unwrap();

        assert_eq!(record.sample_id, "SAMPLE1");
        assert_eq!(record.chromosome, "17");
        assert_eq!(record.position, 7675088);
        assert_eq!(record.gene_symbol, "TP53");
        assert_eq!(record.read_depth, 40);
        assert!((record.allele_frequency - 0.6).abs() < 1e-12);
        assert_eq!(record.consequence_type, "missense_variant");
        assert_eq!(record.substitution_class, "C>T");
        assert_eq!(record.protein_position, 175);
        assert_eq!(record.protein_change_notation, "p.Arg175His");
        assert_eq!(record.clinical_significance, "pathogenic");
        assert_eq!(record.impact_level, "HIGH");
    }

    #[test]
    fn test_non_pass_and_unannotated_lines() {
        let schema = schema();
        let config = config();
        let extractor = RecordExtractor::new(&schema, &config, "S");

        let csq = "A|missense_variant|HIGH|TP53|175/393|p.Arg175His||0";
        assert_eq!(
            extractor.evaluate(&line("LowQual", csq, "0/1:8,12:40"), 1).unwrap(),
            LineOutcome::NotPassing
        );

        let unannotated = "17\t100\t.\tG\tA\t60\tPASS\tDP=40\tGT:DP\t0/1:40";
        assert_eq!(
            extractor.evaluate(unannotated, 2).unwrap(),
            LineOutcome::Unannotated
        );

        let rejected = "A|missense_variant|HIGH|KRAS|12/189|p.Gly12Asp||0";
        assert_eq!(
            extractor.evaluate(&line("PASS", rejected, "0/1:8,12:40"), 3).unwrap(),
            LineOutcome::NoQualifyingTranscript
        );
    }

    #[test]
    fn test_missing_annotation_fields() {
        let schema = AnnotationSchema::new(vec!["SYMBOL".to_string(), "Protein_position".to_string()]);
        let config = config();
        let extractor = RecordExtractor::new(&schema, &config, "S");

        let record = extractor
            .extract(&line("PASS", "TP53|?-175/393", "0/1:1,1:40"), 1)
            .unwrap()
            .unwrap();

        assert_eq!(record.protein_position, 0);
        assert_eq!(record.consequence_type, "");
        assert_eq!(record.protein_change_notation, "N/A");
        assert_eq!(record.clinical_significance, "N/A");
        assert_eq!(record.impact_level, "N/A");
    }

    #[test]
    fn test_malformed_lines() {
        let schema = schema();
        let config = config();
        let extractor = RecordExtractor::new(&schema, &config, "S");

        let too_short = "17\t7675088\t.\tG\tA\t60\tPASS";
        assert!(matches!(
            extractor.evaluate(too_short, 5),
            Err(VariantParseError::MalformedLine {
                line: 5,
                expected: 8,
                found: 7
            })
        ));

        let no_sample = "17\t7675088\t.\tG\tA\t60\tPASS\tCSQ=A|x|HIGH|TP53";
        assert!(matches!(
            extractor.evaluate(no_sample, 6),
            Err(VariantParseError::MalformedLine {
                line: 6,
                expected: 10,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_numeric_fields() {
        let schema = schema();
        let config = config();
        let extractor = RecordExtractor::new(&schema, &config, "S");
        let csq = "A|missense_variant|HIGH|TP53|175/393|p.Arg175His||0";

        match extractor.evaluate(&line("PASS", csq, "0/1:8,12:deep"), 7) {
            Err(VariantParseError::InvalidNumericField { line, field, value }) => {
                assert_eq!(line, 7);
                assert_eq!(field, "DP");
                assert_eq!(value, "deep");
            }
            other => panic!("Expected InvalidNumericField, got {:?}", other),
        }

        let bad_position = format!(
            "17\tchr\t.\tG\tA\t60\tPASS\tCSQ={}\tGT:AD:DP\t0/1:8,12:40",
            csq
        );
        assert!(matches!(
            extractor.evaluate(&bad_position, 8),
            Err(VariantParseError::InvalidNumericField { .. })
        ));
    }

    #[test]
    fn test_unparseable_population_frequency_fails_line() {
        let schema = schema();
        let config = config();
        let extractor = RecordExtractor::new(&schema, &config, "S");
        let csq = "A|missense_variant|HIGH|TP53|175/393|p.Arg175His|pathogenic|abc";

        match extractor.evaluate(&line("PASS", csq, "0/1:8,12:40"), 12) {
            Err(VariantParseError::InvalidNumericField { line, field, value }) => {
                assert_eq!(line, 12);
                assert_eq!(field, "gnomAD_AF");
                assert_eq!(value, "abc");
            }
            other => panic!("Expected InvalidNumericField, got {:?}", other),
        }

        // Non-PASS lines never reach the annotation
        assert_eq!(
            extractor.evaluate(&line("LowQual", csq, "0/1:8,12:40"), 13).unwrap(),
            LineOutcome::NotPassing
        );
    }

    #[test]
    fn test_annotation_block_lookup() {
        assert_eq!(annotation_block("DP=4;CSQ=A|b;AC=1"), Some("A|b"));
        assert_eq!(annotation_block("CSQ=A|b"), Some("A|b"));
        assert_eq!(annotation_block("DP=4;XCSQ=A|b"), None);
    }
}
