// ==============================================================================
// lib.rs - Pharmacogenomics Processor Library
// ==============================================================================
// Description: Library interface for VCF parsing, knowledge base loading,
//              phenotype inference, drug risk resolution and inheritance
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod alleles;
pub mod config;
pub mod curated;
pub mod inheritance;
pub mod input;
pub mod interactions;
pub mod knowledge_base;
pub mod models;
pub mod output;
pub mod parsers;
pub mod phenotype;
pub mod processor;

pub use config::ProcessorConfig;
pub use inheritance::{cross_genes, InheritanceReport, ParentProfile};
pub use knowledge_base::KnowledgeBase;
pub use models::AnalysisResult;
pub use processor::{analyze, AnalysisError, PgxProcessor};
