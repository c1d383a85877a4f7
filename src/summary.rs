// ==============================================================================
// summary.rs - Cohort Summary Statistics
// ==============================================================================
// Description: Per-sample and per-gene aggregates of the cohort dataset, as
//              consumed by the dashboard and report layers
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::{CohortDataset, SubstitutionClass};

/// One row of the consolidated sample table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub sample_id: String,
    /// At least one record survived filtering
    pub has_qualifying_variant: bool,
    /// Distinct genes in first-seen order
    pub genes: Vec<String>,
    pub variant_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneCount {
    pub gene_symbol: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionCount {
    pub class: SubstitutionClass,
    pub count: usize,
}

/// gene -> sample -> first consequence type seen
pub type MutationMatrix = BTreeMap<String, BTreeMap<String, String>>;

/// Build the sample table; every listed sample gets a row, records or not
pub fn summarize_samples(dataset: &CohortDataset, sample_ids: &[String]) -> Vec<SampleSummary> {
    let mut by_sample: HashMap<&str, (Vec<String>, usize)> = HashMap::new();

    for record in dataset.iter() {
        let (genes, count) = by_sample.entry(record.sample_id.as_str()).or_default();
        *count += 1;
        if !genes.contains(&record.gene_symbol) {
            genes.push(record.gene_symbol.clone());
        }
    }

    sample_ids
        .iter()
        .map(|sample_id| {
            let (genes, variant_count) = by_sample
                .get(sample_id.as_str())
                .cloned()
                .unwrap_or_default();

            SampleSummary {
                sample_id: sample_id.clone(),
                has_qualifying_variant: variant_count > 0,
                genes,
                variant_count,
            }
        })
        .collect()
}

/// Record count per gene, most frequent first (ties by symbol)
pub fn gene_prevalence(dataset: &CohortDataset) -> Vec<GeneCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in dataset.iter() {
        *counts.entry(record.gene_symbol.as_str()).or_insert(0) += 1;
    }

    let mut prevalence: Vec<GeneCount> = counts
        .into_iter()
        .map(|(gene, count)| GeneCount {
            gene_symbol: gene.to_string(),
            count,
        })
        .collect();

    prevalence.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.gene_symbol.cmp(&b.gene_symbol)));
    prevalence
}

/// Counts of the six canonical substitution classes, in signature order
///
/// Indels and other non-canonical pairs are not counted.
pub fn substitution_spectrum(dataset: &CohortDataset) -> Vec<SubstitutionCount> {
    let mut counts: HashMap<SubstitutionClass, usize> = HashMap::new();
    for class in dataset.iter().filter_map(|r| r.canonical_substitution()) {
        *counts.entry(class).or_insert(0) += 1;
    }

    SubstitutionClass::ALL
        .into_iter()
        .map(|class| SubstitutionCount {
            class,
            count: counts.get(&class).copied().unwrap_or(0),
        })
        .collect()
}

/// Gene x sample matrix of mutated cells (OncoPrint)
pub fn mutation_matrix(dataset: &CohortDataset) -> MutationMatrix {
    let mut matrix = MutationMatrix::new();

    for record in dataset.iter() {
        matrix
            .entry(record.gene_symbol.clone())
            .or_default()
            .entry(record.sample_id.clone())
            .or_insert_with(|| record.consequence_type.clone());
    }

    matrix
}

/// (samples with a qualifying variant, samples without)
pub fn risk_status(summaries: &[SampleSummary]) -> (usize, usize) {
    let positive = summaries.iter().filter(|s| s.has_qualifying_variant).count();
    (positive, summaries.len() - positive)
}
