// ==============================================================================
// validator.rs - Variant Validation
// ==============================================================================
// Description: Decides whether one transcript annotation is clinically relevant
//              and technically supported
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// Gates (all must pass):
//   1. Gene panel     - SYMBOL is in the panel
//   2. Function       - IMPACT allowed OR Consequence contains a configured term
//   3. Technical      - depth >= min_depth OR VAF >= min_allele_frequency
//   4. Population     - population AF <= max_population_frequency
//                       (unparseable AF is an error, not a rejection)
//   5. Clinical       - CLIN_SIG has a pathogenic marker (pathogenic_only only)
// ==============================================================================

use crate::allele_metrics::MetricError;
use crate::config::FilterConfig;
use crate::parsers::csq::TranscriptAnnotation;

/// CSQ field names read by validation and record extraction
pub mod fields {
    pub const SYMBOL: &str = "SYMBOL";
    pub const IMPACT: &str = "IMPACT";
    pub const CONSEQUENCE: &str = "Consequence";
    pub const CLIN_SIG: &str = "CLIN_SIG";
    pub const PROTEIN_POSITION: &str = "Protein_position";
    pub const HGVSP: &str = "HGVSp";
}

/// Lower-case markers of a clinically significant CLIN_SIG value
pub const PATHOGENIC_MARKERS: [&str; 2] = ["pathogenic", "risk_factor"];

/// Pure accept/reject predicate over transcript annotations
#[derive(Debug, Clone)]
pub struct VariantValidator<'a> {
    config: &'a FilterConfig,
    consequence_terms: Vec<String>,
}

impl<'a> VariantValidator<'a> {
    pub fn new(config: &'a FilterConfig) -> Self {
        Self {
            config,
            consequence_terms: config
                .consequence_terms
                .iter()
                .map(|term| term.to_lowercase())
                .collect(),
        }
    }

    /// Combined decision for one transcript annotation of a line
    ///
    /// The population frequency is decoded before any gate runs, so an
    /// unparseable value fails even when another gate would reject.
    pub fn accepts(
        &self,
        annotation: &TranscriptAnnotation<'_>,
        depth: u32,
        allele_frequency: f64,
    ) -> Result<bool, MetricError> {
        let population_frequency = self.population_frequency(annotation)?;

        Ok(self.in_gene_panel(annotation)
            && self.is_functionally_relevant(annotation)
            && self.is_technically_supported(depth, allele_frequency)
            && self.is_rare_in_population(population_frequency)
            && self.is_clinically_significant(annotation))
    }

    pub fn in_gene_panel(&self, annotation: &TranscriptAnnotation<'_>) -> bool {
        annotation
            .get(fields::SYMBOL)
            .is_some_and(|symbol| self.config.gene_panel.contains(*symbol))
    }

    /// Impact OR consequence match; a gate with nothing configured is skipped
    pub fn is_functionally_relevant(&self, annotation: &TranscriptAnnotation<'_>) -> bool {
        let impacts = &self.config.allowed_impacts;

        if impacts.is_empty() && self.consequence_terms.is_empty() {
            return true;
        }

        let impact_matches = annotation.get(fields::IMPACT).is_some_and(|impact| {
            impacts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(impact.trim()))
        });

        let consequence_matches = annotation.get(fields::CONSEQUENCE).is_some_and(|consequence| {
            let consequence = consequence.to_lowercase();
            self.consequence_terms
                .iter()
                .any(|term| consequence.contains(term.as_str()))
        });

        impact_matches || consequence_matches
    }

    pub fn is_technically_supported(&self, depth: u32, allele_frequency: f64) -> bool {
        depth >= self.config.min_depth || allele_frequency >= self.config.min_allele_frequency
    }

    /// Population AF of a transcript: first '&' component of the configured field
    ///
    /// Absent, empty and '.' values count as 0.
    pub fn population_frequency(&self, annotation: &TranscriptAnnotation<'_>) -> Result<f64, MetricError> {
        let field = self.config.population_frequency_field.as_str();
        let raw = annotation
            .get(field)
            .and_then(|value| value.split('&').next())
            .map(str::trim)
            .unwrap_or_default();

        if raw.is_empty() || raw == "." {
            return Ok(0.0);
        }

        raw.parse::<f64>()
            .ok()
            .filter(|frequency| frequency.is_finite())
            .ok_or_else(|| MetricError::InvalidNumber {
                field: field.to_string(),
                value: raw.to_string(),
            })
    }

    pub fn is_rare_in_population(&self, population_frequency: f64) -> bool {
        population_frequency <= self.config.max_population_frequency
    }

    pub fn is_clinically_significant(&self, annotation: &TranscriptAnnotation<'_>) -> bool {
        if !self.config.pathogenic_only {
            return true;
        }

        let significance = annotation
            .get(fields::CLIN_SIG)
            .map(|value| value.to_lowercase())
            .unwrap_or_default();

        PATHOGENIC_MARKERS
            .iter()
            .any(|marker| significance.contains(marker))
    }
}
