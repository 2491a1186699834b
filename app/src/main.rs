// ==============================================================================
// main.rs - Pharmacogenomics Processor Entry Point
// ==============================================================================
// Description: Command line interface for analysis, inheritance and catalog
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pgx_processor::config::{
    ProcessorConfig, DEFAULT_TABLES_DIR, ENV_MAX_EXPANSION_RATIO, ENV_MAX_INPUT_BYTES,
    ENV_PREVIEW_ROWS, ENV_TABLES_DIR,
};
use pgx_processor::inheritance::{cross_genes, ParentProfile};
use pgx_processor::input::DEFAULT_MAX_INPUT_BYTES;
use pgx_processor::output::{AnalysisReport, OutputGenerator};
use pgx_processor::parsers::vcf::DEFAULT_MAX_EXPANSION_RATIO;
use pgx_processor::processor::PgxProcessor;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing CPIC tables
    #[arg(long, env = ENV_TABLES_DIR, default_value = DEFAULT_TABLES_DIR, global = true)]
    tables_dir: PathBuf,

    /// Maximum accepted input size in bytes
    #[arg(long, env = ENV_MAX_INPUT_BYTES, default_value_t = DEFAULT_MAX_INPUT_BYTES, global = true)]
    max_input_bytes: u64,

    /// Decoded bytes allowed per raw input byte (caps decompression)
    #[arg(long, env = ENV_MAX_EXPANSION_RATIO, default_value_t = DEFAULT_MAX_EXPANSION_RATIO, global = true)]
    max_expansion_ratio: u64,

    /// Stop parsing after this many data records
    #[arg(long, env = ENV_PREVIEW_ROWS, global = true)]
    preview_rows: Option<usize>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze VCF files against a list of drugs
    Analyze {
        /// Input VCF files (plain, gzip or BGZF)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Comma-separated drug names
        #[arg(short, long, value_delimiter = ',', required = true)]
        drugs: Vec<String>,

        /// Sample to analyze (first sample if omitted)
        #[arg(short, long)]
        sample: Option<String>,

        /// Write reports here instead of stdout
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Offspring phenotype distribution for two parents
    Cross {
        /// Parent 1: VCF path, or GENE=A/B pairs separated by commas
        #[arg(long)]
        parent1: String,

        /// Parent 2: VCF path, or GENE=A/B pairs separated by commas
        #[arg(long)]
        parent2: String,

        /// Sample in parent 1's VCF
        #[arg(long)]
        sample1: Option<String>,

        /// Sample in parent 2's VCF
        #[arg(long)]
        sample2: Option<String>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List drugs with pharmacogenomic guidelines
    Drugs,

    /// List screened genes and their data sources
    Genes,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pgx_processor=info".into());

    // Logs go to stderr so stdout stays valid JSON
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("Pharmacogenomics Processor starting...");

    let config = ProcessorConfig::default()
        .with_tables_dir(&args.tables_dir)
        .with_max_input_bytes(args.max_input_bytes)
        .with_max_expansion_ratio(args.max_expansion_ratio)
        .with_preview_rows(args.preview_rows);
    let processor = PgxProcessor::from_config(config);

    match args.command {
        Command::Analyze {
            inputs,
            drugs,
            sample,
            output_dir,
        } => run_analyze(&processor, inputs, drugs, sample, output_dir).await,
        Command::Cross {
            parent1,
            parent2,
            sample1,
            sample2,
            output_dir,
        } => {
            let p1 = load_parent(&processor, &parent1, sample1.as_deref())
                .context("Failed to load parent 1")?;
            let p2 = load_parent(&processor, &parent2, sample2.as_deref())
                .context("Failed to load parent 2")?;
            let report = cross_genes(processor.knowledge_base(), &p1, &p2);

            match output_dir {
                Some(dir) => {
                    OutputGenerator::new(dir).write_inheritance("inheritance", &report)?;
                }
                None => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            Ok(())
        }
        Command::Drugs => {
            let kb = processor.knowledge_base();
            let catalog: Vec<_> = kb
                .drugs()
                .into_iter()
                .map(|drug| serde_json::json!({ "drug": drug, "genes": kb.genes_for_drug(drug) }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&catalog)?);
            Ok(())
        }
        Command::Genes => {
            let summaries = processor.knowledge_base().gene_summaries();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            Ok(())
        }
    }
}

async fn run_analyze(
    processor: &PgxProcessor,
    inputs: Vec<PathBuf>,
    drugs: Vec<String>,
    sample: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let total = inputs.len();
    let outcomes = processor.analyze_paths(inputs, drugs, sample).await;
    let generator = output_dir.map(OutputGenerator::new);

    let mut failed = 0;
    let mut reports = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(result) => {
                let report = AnalysisReport::from_result(&result);
                match &generator {
                    Some(generator) => {
                        generator.write_report(&report)?;
                    }
                    None => reports.push(report),
                }
            }
            Err(e) => {
                warn!("{:?}: {}", outcome.path, e);
                failed += 1;
            }
        }
    }

    if !reports.is_empty() {
        if reports.len() == 1 {
            println!("{}", reports[0].to_json_pretty()?);
        } else {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, total);
    }
    Ok(())
}

/// Parent profile from a VCF path or `GENE=A/B,GENE=A/B` pairs
fn load_parent(processor: &PgxProcessor, arg: &str, sample: Option<&str>) -> Result<ParentProfile> {
    let path = Path::new(arg);
    if path.is_file() {
        let no_drugs: [&str; 0] = [];
        let result = processor
            .analyze_path(path, &no_drugs, sample)
            .with_context(|| format!("Failed to analyze {:?}", path))?;
        return Ok(ParentProfile::from_result(&result));
    }

    let entries = arg
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(gene, diplotype)| (gene.trim().to_string(), diplotype.trim().to_string()))
                .with_context(|| format!("Invalid parent entry '{}', expected GENE=A/B", entry))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ParentProfile::from_diplotypes(entries)?)
}
