// ==============================================================================
// config.rs - Variant Filter Configuration
// ==============================================================================
// Description: Immutable filter thresholds and gene panel for one analysis run
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Default CSQ field carrying the population allele frequency
pub const DEFAULT_POPULATION_FREQUENCY_FIELD: &str = "gnomAD_AF";

/// Header names accepted on the first row of a gene panel file
const PANEL_HEADER_NAMES: [&str; 3] = ["gene", "symbol", "gene_symbol"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    FrequencyOutOfRange { name: &'static str, value: f64 },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid gene panel file {path}: {source}")]
    GenePanel {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Filter thresholds consumed by variant validation
///
/// Built once per run and shared read-only by every file worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum read depth (OR-combined with `min_allele_frequency`)
    pub min_depth: u32,

    /// Minimum variant allele frequency (OR-combined with `min_depth`)
    pub min_allele_frequency: f64,

    /// Upper bound on population allele frequency
    pub max_population_frequency: f64,

    /// Eligible gene symbols; an empty panel accepts nothing
    pub gene_panel: BTreeSet<String>,

    /// Require a pathogenic/risk-factor ClinVar marker
    pub pathogenic_only: bool,

    /// Accepted IMPACT levels (case-insensitive)
    pub allowed_impacts: BTreeSet<String>,

    /// Consequence substrings (case-insensitive), OR-combined with impacts
    pub consequence_terms: BTreeSet<String>,

    /// CSQ field read as population allele frequency
    pub population_frequency_field: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_depth: 20,
            min_allele_frequency: 0.05,
            max_population_frequency: 0.01,
            gene_panel: BTreeSet::new(),
            pathogenic_only: false,
            allowed_impacts: BTreeSet::new(),
            consequence_terms: BTreeSet::new(),
            population_frequency_field: DEFAULT_POPULATION_FREQUENCY_FIELD.to_string(),
        }
    }
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_depth(mut self, depth: u32) -> Self {
        self.min_depth = depth;
        self
    }

    pub fn with_min_allele_frequency(mut self, frequency: f64) -> Self {
        self.min_allele_frequency = frequency;
        self
    }

    pub fn with_max_population_frequency(mut self, frequency: f64) -> Self {
        self.max_population_frequency = frequency;
        self
    }

    pub fn with_gene_panel<I, S>(mut self, genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gene_panel = genes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pathogenic_only(mut self, pathogenic_only: bool) -> Self {
        self.pathogenic_only = pathogenic_only;
        self
    }

    pub fn with_allowed_impacts<I, S>(mut self, impacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_impacts = impacts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_consequence_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.consequence_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_population_frequency_field(mut self, field: impl Into<String>) -> Self {
        self.population_frequency_field = field.into();
        self
    }

    /// Check frequency thresholds are proportions
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frequencies = [
            ("min_allele_frequency", self.min_allele_frequency),
            ("max_population_frequency", self.max_population_frequency),
        ];

        for (name, value) in frequencies {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::FrequencyOutOfRange { name, value });
            }
        }

        Ok(())
    }

    /// Load a JSON config file; omitted keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Split a comma-separated gene list (e.g., from an environment variable)
///
/// # Examples
/// ```
/// use genetics_processor::config::parse_gene_list;
///
/// let genes = parse_gene_list(" TP53, BRCA1,,KRAS ");
/// assert_eq!(genes.into_iter().collect::<Vec<_>>(), vec!["BRCA1", "KRAS", "TP53"]);
/// ```
pub fn parse_gene_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|gene| !gene.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load a gene panel file: one symbol per row, first column
///
/// `.tsv`/`.txt` files are tab-delimited, everything else comma-delimited.
/// Lines starting with '#' and a leading "gene"/"symbol" header row are ignored.
pub fn load_gene_panel(path: impl AsRef<Path>) -> Result<BTreeSet<String>, ConfigError> {
    let path = path.as_ref();
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") | Some("txt") => b'\t',
        _ => b',',
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|source| ConfigError::GenePanel {
            path: path.display().to_string(),
            source,
        })?;

    let mut panel = BTreeSet::new();

    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|source| ConfigError::GenePanel {
            path: path.display().to_string(),
            source,
        })?;

        let Some(gene) = record.get(0).map(str::trim).filter(|g| !g.is_empty()) else {
            continue;
        };

        if row == 0
            && PANEL_HEADER_NAMES
                .iter()
                .any(|name| gene.eq_ignore_ascii_case(name))
        {
            continue;
        }

        panel.insert(gene.to_string());
    }

    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults() {
        let config = FilterConfig::default();
        assert_eq!(config.min_depth, 20);
        assert_eq!(config.min_allele_frequency, 0.05);
        assert_eq!(config.max_population_frequency, 0.01);
        assert!(config.gene_panel.is_empty());
        assert!(!config.pathogenic_only);
        assert_eq!(config.population_frequency_field, "gnomAD_AF");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_frequency() {
        let config = FilterConfig::new().with_max_population_frequency(1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FrequencyOutOfRange {
                name: "max_population_frequency",
                ..
            })
        ));

        let config = FilterConfig::new().with_min_allele_frequency(-0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_config_with_partial_keys() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(
            file,
            r#"{{"min_depth": 30, "gene_panel": ["TP53", "BRCA2"], "allowed_impacts": ["HIGH"]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = FilterConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.min_depth, 30);
        assert!(config.gene_panel.contains("TP53"));
        assert!(config.gene_panel.contains("BRCA2"));
        assert!(config.allowed_impacts.contains("HIGH"));
        // Omitted keys keep defaults
        assert_eq!(config.min_allele_frequency, 0.05);
    }

    #[test]
    fn test_invalid_json_config() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{{ not json").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            FilterConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_gene_panel_with_header_and_comments() {
        let mut file = Builder::new().suffix(".tsv").tempfile().unwrap();
        write!(
            file,
            "\
symbol\tnote
# hereditary cancer genes
TP53\tli-fraumeni
BRCA1
 KRAS \t
"
        )
        .unwrap();
        file.flush().unwrap();

        let panel = load_gene_panel(file.path()).unwrap();
        assert_eq!(
            panel.into_iter().collect::<Vec<_>>(),
            vec!["BRCA1", "KRAS", "TP53"]
        );
    }
}
