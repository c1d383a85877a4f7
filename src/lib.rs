// ==============================================================================
// lib.rs - Genetics Processor Library
// ==============================================================================
// Description: Library interface for cohort variant extraction and filtering
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

pub mod parsers;
pub mod allele_metrics;
pub mod audit;
pub mod config;
pub mod validator;
pub mod models;
pub mod processor;
pub mod summary;
pub mod output;
