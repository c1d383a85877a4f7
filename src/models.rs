// ==============================================================================
// models.rs - Cohort Variant Data Models
// ==============================================================================
// Description: Data structures produced by the cohort variant extraction engine
// Author: Matt Barham
// Created: 2025-11-12
// Modified: 2026-10-19
// Version: 3.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::FilterConfig;

/// Pyrimidine-anchored single-nucleotide substitution class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubstitutionClass {
    #[serde(rename = "C>A")]
    CtoA,
    #[serde(rename = "C>G")]
    CtoG,
    #[serde(rename = "C>T")]
    CtoT,
    #[serde(rename = "T>A")]
    TtoA,
    #[serde(rename = "T>C")]
    TtoC,
    #[serde(rename = "T>G")]
    TtoG,
}

impl SubstitutionClass {
    /// All six classes in signature-plot order
    pub const ALL: [SubstitutionClass; 6] = [
        SubstitutionClass::CtoA,
        SubstitutionClass::CtoG,
        SubstitutionClass::CtoT,
        SubstitutionClass::TtoA,
        SubstitutionClass::TtoC,
        SubstitutionClass::TtoG,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubstitutionClass::CtoA => "C>A",
            SubstitutionClass::CtoG => "C>G",
            SubstitutionClass::CtoT => "C>T",
            SubstitutionClass::TtoA => "T>A",
            SubstitutionClass::TtoC => "T>C",
            SubstitutionClass::TtoG => "T>G",
        }
    }

    /// Parse a normalized "REF>ALT" label; non-canonical labels give None
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.as_str() == label)
    }
}

/// One accepted transcript annotation for one VCF data line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Sample identifier (file base name up to the first '.')
    pub sample_id: String,

    /// Chromosome as written in the VCF (e.g., "chr17", "17")
    pub chromosome: String,

    /// 1-based position
    pub position: u64,

    pub reference_allele: String,

    pub alternate_allele: String,

    /// Gene symbol of the accepted transcript (CSQ SYMBOL)
    pub gene_symbol: String,

    /// Variant allele frequency (0.0-1.0)
    pub allele_frequency: f64,

    /// Read depth (DP), 0 when not reported
    pub read_depth: u32,

    /// First consequence term of the accepted transcript (e.g., "missense_variant")
    pub consequence_type: String,

    /// Canonical class ("C>T", ...) or the raw upper-cased pair for non-SNVs
    pub substitution_class: String,

    /// Amino-acid position, 0 when unknown or non-numeric
    pub protein_position: u64,

    /// HGVS protein notation, "N/A" when not annotated
    pub protein_change_notation: String,

    /// ClinVar significance text, "N/A" when not annotated
    pub clinical_significance: String,

    /// VEP impact level (HIGH, MODERATE, LOW, MODIFIER), "N/A" when not annotated
    pub impact_level: String,
}

impl VariantRecord {
    /// Canonical substitution class, None for indels and non-canonical pairs
    pub fn canonical_substitution(&self) -> Option<SubstitutionClass> {
        SubstitutionClass::from_label(&self.substitution_class)
    }
}

/// Flattened variant records across every processed file
///
/// Record order within one file follows line order; order between files
/// carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortDataset {
    pub records: Vec<VariantRecord>,
}

impl CohortDataset {
    pub fn new(records: Vec<VariantRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantRecord> {
        self.records.iter()
    }

    pub fn for_sample<'a>(&'a self, sample_id: &'a str) -> impl Iterator<Item = &'a VariantRecord> {
        self.records.iter().filter(move |r| r.sample_id == sample_id)
    }

    pub fn for_gene<'a>(&'a self, gene_symbol: &'a str) -> impl Iterator<Item = &'a VariantRecord> {
        self.records.iter().filter(move |r| r.gene_symbol == gene_symbol)
    }

    pub fn into_records(self) -> Vec<VariantRecord> {
        self.records
    }
}

/// Complete result of one analysis run, handed to the reporting layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortAnalysis {
    pub run_id: Uuid,

    pub generated_at: DateTime<Utc>,

    /// Filter configuration the dataset was produced with
    pub filter: FilterConfig,

    /// One sample identifier per input file, including files without records
    pub sample_ids: Vec<String>,

    /// Files with a usable annotation header
    pub files_processed: usize,

    /// Files skipped because their header declares no annotation format
    pub files_skipped: usize,

    pub dataset: CohortDataset,
}
