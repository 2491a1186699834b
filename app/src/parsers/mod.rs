// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for VCF inputs and CPIC reference tables
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod cpic_tables;
pub mod vcf;

pub use cpic_tables::{AlleleDefinitions, TableKind, TableLoadError};
pub use vcf::{ParseError, ParseWarning, ParsedDocument, VariantRecord, VcfParser, WarningKind};
