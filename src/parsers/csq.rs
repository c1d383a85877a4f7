// ==============================================================================
// parsers/csq.rs - VEP CSQ annotation schema
// ==============================================================================
// Description: Resolves the field order of the embedded CSQ annotation block
//              from the VCF header
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Format:
//   ##INFO=<ID=CSQ,Number=.,Type=String,Description="Consequence annotations
//   from Ensembl VEP. Format: Allele|Consequence|IMPACT|SYMBOL|...">
// ==============================================================================

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::path::Path;

use super::vcf::open_vcf;

/// Marker identifying the CSQ INFO declaration
const CSQ_DECLARATION_ID: &str = "ID=CSQ,";

/// Marker preceding the pipe-delimited field list
const FORMAT_DECLARATOR: &str = "Format:";

/// One transcript entry of a CSQ block, keyed by schema field name
pub type TranscriptAnnotation<'a> = HashMap<&'a str, &'a str>;

/// Ordered CSQ field names of one VCF file
///
/// An empty schema means the file carries no usable annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSchema {
    fields: Vec<String>,
}

impl AnnotationSchema {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Parse the field list out of a CSQ header declaration
    ///
    /// Returns None when the declaration has no closing quote or no fields.
    pub fn from_declaration(line: &str) -> Option<Self> {
        let start = line.find(FORMAT_DECLARATOR)? + FORMAT_DECLARATOR.len();
        let rest = &line[start..];
        let end = rest.rfind('"')?;
        let format = rest[..end].trim();

        if format.is_empty() {
            return None;
        }

        Some(Self::new(
            format.split('|').map(|f| f.trim().to_string()).collect(),
        ))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Pair one pipe-delimited transcript entry with the schema
    ///
    /// Values past the last schema field are dropped; fields past the last
    /// value are absent from the result.
    pub fn annotate<'a>(&'a self, entry: &'a str) -> TranscriptAnnotation<'a> {
        self.fields
            .iter()
            .map(String::as_str)
            .zip(entry.split('|'))
            .collect()
    }
}

/// True for the header line declaring the CSQ field order
fn is_csq_declaration(line: &str) -> bool {
    line.contains(CSQ_DECLARATION_ID) && line.contains(FORMAT_DECLARATOR)
}

/// Scan header lines for the CSQ declaration
///
/// Stops at the first declaration or at the first data line; blank lines
/// are skipped. A missing or malformed declaration yields an empty schema.
pub fn read_annotation_schema<R: BufRead>(reader: R) -> io::Result<AnnotationSchema> {
    for line in reader.lines() {
        let line = line?;

        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with('#') {
            break;
        }

        if is_csq_declaration(&line) {
            return Ok(AnnotationSchema::from_declaration(&line).unwrap_or_default());
        }
    }

    Ok(AnnotationSchema::default())
}

/// Read the CSQ schema of a .vcf or .vcf.gz file
pub fn read_annotation_schema_from_path(path: impl AsRef<Path>) -> io::Result<AnnotationSchema> {
    read_annotation_schema(open_vcf(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "\
##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total Depth\">
##INFO=<ID=CSQ,Number=.,Type=String,Description=\"Consequence annotations from Ensembl VEP. Format: Allele|Consequence|IMPACT|SYMBOL|Protein_position|HGVSp|CLIN_SIG|gnomAD_AF\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE1
";

    #[test]
    fn test_reads_field_order() {
        let schema = read_annotation_schema(Cursor::new(HEADER)).unwrap();
        assert_eq!(
            schema.fields(),
            &[
                "Allele",
                "Consequence",
                "IMPACT",
                "SYMBOL",
                "Protein_position",
                "HGVSp",
                "CLIN_SIG",
                "gnomAD_AF"
            ]
        );
    }

    #[test]
    fn test_missing_declaration_gives_empty_schema() {
        let header = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t100\t.\tA\tG\t50\tPASS\tDP=10
";
        let schema = read_annotation_schema(Cursor::new(header)).unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_blank_lines_inside_header() {
        let contents = "\
##fileformat=VCFv4.2

##INFO=<ID=CSQ,Number=.,Type=String,Description=\"Format: Allele|SYMBOL\">
   
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
";
        let schema = read_annotation_schema(Cursor::new(contents)).unwrap();
        assert_eq!(schema.fields(), &["Allele", "SYMBOL"]);
    }

    #[test]
    fn test_declaration_after_data_is_ignored() {
        let contents = "\
##fileformat=VCFv4.2
1\t100\t.\tA\tG\t50\tPASS\tDP=10
##INFO=<ID=CSQ,Number=.,Type=String,Description=\"Format: Allele|SYMBOL\">
";
        let schema = read_annotation_schema(Cursor::new(contents)).unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_malformed_declaration() {
        let line = "##INFO=<ID=CSQ,Number=.,Type=String,Description=Format: Allele|SYMBOL>";
        assert_eq!(AnnotationSchema::from_declaration(line), None);

        let schema = read_annotation_schema(Cursor::new(format!("{}\n", line))).unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_annotate_pairs_fields_positionally() {
        let schema = AnnotationSchema::new(vec![
            "Allele".to_string(),
            "SYMBOL".to_string(),
            "IMPACT".to_string(),
        ]);

        let full = schema.annotate("T|TP53|HIGH|extra");
        assert_eq!(full.len(), 3);
        assert_eq!(full.get("SYMBOL"), Some(&"TP53"));

        let truncated = schema.annotate("T|TP53");
        assert_eq!(truncated.get("IMPACT"), None);

        let blank = schema.annotate("T||HIGH");
        assert_eq!(blank.get("SYMBOL"), Some(&""));
    }
}
