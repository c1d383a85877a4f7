// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for VEP-annotated VCF files
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

pub mod csq;
pub mod vcf;

pub use csq::{read_annotation_schema, AnnotationSchema, TranscriptAnnotation};
pub use vcf::{open_vcf, LineOutcome, RecordExtractor, VariantParseError};
