// ==============================================================================
// allele_metrics.rs - Per-Sample Allele Metrics
// ==============================================================================
// Description: Decodes the FORMAT/sample columns of a VCF data line and derives
//              read depth, variant allele frequency and substitution class
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// Algorithm:
//   VAF resolution (first match wins):
//   - AF present            → first comma-separated component of AF
//   - AD present            → ALT depth / sum of all allele depths
//   - AD absent or all zero → 0.0
//
//   Substitutions are folded onto the pyrimidine strand:
//   G>A → C>T, G>C → C>G, G>T → C>A, A>C → T>G, A>G → T>C, A>T → T>A
// ==============================================================================

use std::collections::HashMap;
use thiserror::Error;

/// Direct allele frequency FORMAT key
pub const ALLELE_FREQUENCY_KEY: &str = "AF";

/// Allelic depths FORMAT key (REF,ALT[,ALT...])
pub const ALLELE_DEPTH_KEY: &str = "AD";

/// Read depth FORMAT key
pub const READ_DEPTH_KEY: &str = "DP";

/// VCF missing-value marker
const MISSING_VALUE: &str = ".";

/// Errors raised while decoding numeric sample metrics
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("{field} value '{value}' is not a valid number")]
    InvalidNumber { field: String, value: String },

    #[error("{field} value '{value}' is out of range")]
    OutOfRange { field: String, value: String },
}

impl MetricError {
    fn invalid(field: &str, value: &str) -> Self {
        MetricError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    fn out_of_range(field: &str, value: &str) -> Self {
        MetricError::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Name of the metric that failed to decode
    pub fn field(&self) -> &str {
        match self {
            MetricError::InvalidNumber { field, .. } | MetricError::OutOfRange { field, .. } => field,
        }
    }

    /// Raw text of the metric that failed to decode
    pub fn value(&self) -> &str {
        match self {
            MetricError::InvalidNumber { value, .. } | MetricError::OutOfRange { value, .. } => value,
        }
    }
}

/// Pair the colon-delimited FORMAT keys with the colon-delimited sample values
///
/// Keys without a matching value (truncated sample column) are dropped.
///
/// # Examples
/// ```
/// use genetics_processor::allele_metrics::decode_sample_metrics;
///
/// let metrics = decode_sample_metrics("GT:AD:DP", "0/1:8,12:40");
/// assert_eq!(metrics.get("AD"), Some(&"8,12"));
/// assert_eq!(metrics.get("DP"), Some(&"40"));
/// ```
pub fn decode_sample_metrics<'a>(format: &'a str, sample: &'a str) -> HashMap<&'a str, &'a str> {
    format.split(':').zip(sample.split(':')).collect()
}

/// Look up a metric, treating the VCF missing marker as absent
fn metric_value<'a>(metrics: &HashMap<&str, &'a str>, key: &str) -> Option<&'a str> {
    metrics
        .get(key)
        .copied()
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != MISSING_VALUE)
}

/// Read depth (DP) of the sample, 0 when not reported
pub fn read_depth(metrics: &HashMap<&str, &str>) -> Result<u32, MetricError> {
    match metric_value(metrics, READ_DEPTH_KEY) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| MetricError::invalid(READ_DEPTH_KEY, raw)),
        None => Ok(0),
    }
}

/// Resolve the variant allele frequency of the sample
///
/// A direct AF metric takes priority over the AD-derived ratio.
///
/// # Examples
/// ```
/// use std::collections::HashMap;
/// use genetics_processor::allele_metrics::resolve_allele_frequency;
///
/// let direct = HashMap::from([("AF", "0.42,0.1"), ("AD", "10,5")]);
/// assert_eq!(resolve_allele_frequency(&direct).unwrap(), 0.42);
///
/// let from_depths = HashMap::from([("AD", "10,5")]);
/// assert!((resolve_allele_frequency(&from_depths).unwrap() - 5.0 / 15.0).abs() < 1e-12);
///
/// let no_reads = HashMap::from([("AD", "0,0")]);
/// assert_eq!(resolve_allele_frequency(&no_reads).unwrap(), 0.0);
/// ```
pub fn resolve_allele_frequency(metrics: &HashMap<&str, &str>) -> Result<f64, MetricError> {
    if let Some(raw) = metric_value(metrics, ALLELE_FREQUENCY_KEY) {
        let first = raw.split(',').next().unwrap_or_default().trim();
        let frequency = first
            .parse::<f64>()
            .map_err(|_| MetricError::invalid(ALLELE_FREQUENCY_KEY, raw))?;

        if !(0.0..=1.0).contains(&frequency) {
            return Err(MetricError::out_of_range(ALLELE_FREQUENCY_KEY, raw));
        }
        return Ok(frequency);
    }

    let Some(raw) = metric_value(metrics, ALLELE_DEPTH_KEY) else {
        return Ok(0.0);
    };

    let depths = raw
        .split(',')
        .map(|depth| match depth.trim() {
            MISSING_VALUE => Ok(0.0),
            depth => depth
                .parse::<f64>()
                .map_err(|_| MetricError::invalid(ALLELE_DEPTH_KEY, raw)),
        })
        .collect::<Result<Vec<f64>, MetricError>>()?;

    // Need at least REF and one ALT depth
    if depths.len() < 2 {
        return Err(MetricError::invalid(ALLELE_DEPTH_KEY, raw));
    }
    if depths.iter().any(|depth| !depth.is_finite() || *depth < 0.0) {
        return Err(MetricError::out_of_range(ALLELE_DEPTH_KEY, raw));
    }

    let total: f64 = depths.iter().sum();
    if total > 0.0 {
        Ok(depths[1] / total)
    } else {
        Ok(0.0)
    }
}

/// Fold a REF>ALT change onto its pyrimidine-anchored substitution class
///
/// Canonical pairs, indels and multi-allelic ALTs pass through unchanged
/// (upper-cased).
///
/// # Examples
/// ```
/// use genetics_processor::allele_metrics::normalize_substitution;
///
/// assert_eq!(normalize_substitution("G", "A"), "C>T");
/// assert_eq!(normalize_substitution("c", "t"), "C>T");
/// assert_eq!(normalize_substitution("A", "A"), "A>A");
/// ```
pub fn normalize_substitution(reference: &str, alternate: &str) -> String {
    let pair = format!("{}>{}", reference.to_uppercase(), alternate.to_uppercase());

    let folded = match pair.as_str() {
        "G>A" => "C>T",
        "G>C" => "C>G",
        "G>T" => "C>A",
        "A>C" => "T>G",
        "A>G" => "T>C",
        "A>T" => "T>A",
        _ => return pair,
    };

    folded.to_string()
}
