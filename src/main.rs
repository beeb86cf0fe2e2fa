// ==============================================================================
// main.rs - Genetic Risk Analyzer Entry Point
// ==============================================================================
// Description: Batch CLI that analyzes VCF files and writes clinical reports
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use genetic_risk_analyzer::audit::{log_event, AuditEventType, AuditSink};
use genetic_risk_analyzer::validator::is_supported;
use genetic_risk_analyzer::{
    AnalysisResult, Analyzer, AnalyzerConfig, KnowledgeBase, OutputFormat, PatientContext, RecommendationRules,
    ReportGenerator, ResultStore, SqliteResultStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// VCF files (.vcf, .vcf.gz, .vcf.bgz) or directories to scan for them
    #[arg(required_unless_present = "text_report")]
    inputs: Vec<PathBuf>,

    /// Free-text genetic reports to scan (already extracted from PDF/images)
    #[arg(long)]
    text_report: Vec<PathBuf>,

    /// Directory that receives one report folder per analysis
    #[arg(short, long, env = "GRA_OUTPUT_DIR", default_value = "reports")]
    output_dir: PathBuf,

    /// Report formats (text, json, csv, parquet)
    #[arg(short, long, value_delimiter = ',', default_value = "text,json")]
    format: Vec<OutputFormat>,

    /// Maximum variant records per file
    #[arg(long, env = "GRA_RECORD_LIMIT")]
    record_limit: Option<usize>,

    /// Reject inputs larger than this many bytes (no limit by default)
    #[arg(long, env = "GRA_MAX_FILE_SIZE")]
    max_file_size: Option<u64>,

    /// Analyzer configuration (JSON)
    #[arg(long, env = "GRA_CONFIG")]
    config: Option<PathBuf>,

    /// Curated knowledge base (JSON) replacing the built-in one
    #[arg(long, env = "GRA_KNOWLEDGE_BASE")]
    knowledge_base: Option<PathBuf>,

    /// Recommendation rules (JSON)
    #[arg(long, env = "GRA_RULES")]
    rules: Option<PathBuf>,

    /// SQLite result store and audit trail
    #[arg(long, env = "GRA_STORE")]
    store: Option<PathBuf>,

    /// Maximum files analyzed at once
    #[arg(long, default_value_t = 4)]
    jobs: usize,

    #[arg(long)]
    patient_id: Option<String>,

    #[arg(long)]
    patient_name: Option<String>,

    #[arg(long)]
    age: Option<u32>,

    #[arg(long)]
    sex: Option<String>,

    /// Lifestyle note (repeatable)
    #[arg(long)]
    lifestyle: Vec<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn patient(&self) -> Option<PatientContext> {
        let patient = PatientContext {
            patient_id: self.patient_id.clone(),
            name: self.patient_name.clone(),
            age: self.age,
            sex: self.sex.clone(),
            lifestyle: self.lifestyle.clone(),
        };
        (patient != PatientContext::default()).then_some(patient)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "genetic_risk_analyzer=info".into());
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Genetic Risk Analyzer v{} starting...", env!("CARGO_PKG_VERSION"));

    // Configuration: file, then flag overrides
    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::from_json_path(path)?,
        None => AnalyzerConfig::default(),
    };
    if let Some(limit) = args.record_limit {
        config = config.with_record_limit(limit);
    }
    if let Some(max) = args.max_file_size {
        config = config.with_max_file_size(max);
    }
    if let Some(path) = &args.rules {
        config = config.with_rules(RecommendationRules::from_json_path(path)?);
    }

    let kb = match &args.knowledge_base {
        Some(path) => Arc::new(
            KnowledgeBase::from_json_path(path)
                .with_context(|| format!("Failed to load knowledge base {}", path.display()))?,
        ),
        None => KnowledgeBase::builtin(),
    };
    info!("Knowledge base: {} curated variants", kb.len());

    let store = match &args.store {
        Some(path) => Some(Arc::new(SqliteResultStore::open(path)?)),
        None => None,
    };

    // Ctrl-C cancels in-flight parses
    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling analyses");
                cancelled.store(true, Ordering::Relaxed);
            }
        });
    }

    let mut analyzer = Analyzer::new(kb, config).with_cancel_check({
        let cancelled = cancelled.clone();
        Arc::new(move || cancelled.load(Ordering::Relaxed))
    });
    if let Some(store) = &store {
        analyzer = analyzer.with_audit_sink(store.clone());
    }
    let analyzer = Arc::new(analyzer);

    let files = collect_inputs(&args.inputs);
    if files.is_empty() && args.text_report.is_empty() {
        anyhow::bail!("No .vcf or .vcf.gz files found in the given inputs");
    }
    info!("Analyzing {} VCF file(s), {} text report(s)", files.len(), args.text_report.len());

    let generator = ReportGenerator::new(&args.output_dir);
    let patient = args.patient();
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));

    let mut handles = Vec::new();
    for path in files {
        let permit = semaphore.clone().acquire_owned().await?;
        let analyzer = analyzer.clone();
        let patient = patient.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            analyzer.analyze_file(&path, patient)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.context("Analysis task panicked")?);
    }

    for path in &args.text_report {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text report {}", path.display()))?;
        let (extraction, mut result) = analyzer.analyze_text(&text, patient.clone());
        result.metadata.source_file = Some(path.display().to_string());
        info!(
            "Text report {}: {} tokens, {} heuristic hints, {} resolved variants",
            path.display(),
            extraction.findings.len(),
            extraction.hints.len(),
            extraction.resolved_keys().len()
        );
        results.push(result);
    }

    let mut failed = 0usize;
    for result in &results {
        if let Err(e) = publish(result, &generator, &args.format, store.as_deref()) {
            error!("Failed to publish analysis {}: {:#}", result.analysis_id, e);
            failed += 1;
            continue;
        }
        if !result.is_success() {
            failed += 1;
        }
    }

    info!(
        "Batch complete: {} analyses, {} failed, reports in {}",
        results.len(),
        failed,
        args.output_dir.display()
    );

    if failed > 0 {
        anyhow::bail!("{} of {} analyses failed", failed, results.len());
    }
    Ok(())
}

/// Write reports and cache the result
fn publish(
    result: &AnalysisResult,
    generator: &ReportGenerator,
    formats: &[OutputFormat],
    store: Option<&SqliteResultStore>,
) -> Result<()> {
    let source = result.metadata.source_file.as_deref().unwrap_or("-");
    match &result.error {
        None => info!(
            "{}: {} variants, risk level {}, {} urgent flag(s)",
            source,
            result.total_variants,
            result.risk_assessment.overall_risk_level,
            result.urgent_flags.len()
        ),
        Some(e) => warn!("{}: analysis failed: {}", source, e),
    }

    let written = generator.generate(result, formats)?;
    log_event(
        store.map(|s| s as &dyn AuditSink),
        AuditEventType::ReportWritten,
        &result.analysis_id,
        Some(generator.report_dir(result).display().to_string()),
        serde_json::json!({ "formats": written.keys().collect::<Vec<_>>() }),
    );

    if let Some(store) = store {
        store.put(&result.analysis_id, result)?;
        log_event(
            Some(store),
            AuditEventType::ResultStored,
            &result.analysis_id,
            None,
            serde_json::json!({}),
        );
    }

    Ok(())
}

/// Directory scans only pick up files that are named as VCFs
fn is_vcf_name(path: &Path) -> bool {
    is_supported(path)
        && path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().to_ascii_lowercase().contains(".vcf"))
}

/// Expand directories into supported VCF files, sorted for stable order
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).follow_links(true) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_vcf_name(entry.path()) => {
                        files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping unreadable entry under {}: {}", input.display(), e),
                }
            }
        } else {
            // Files are passed through; the validator reports problems per analysis
            files.push(input.clone());
        }
    }
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_inputs_walks_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("batch");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("b.vcf.gz"), b"").unwrap();
        std::fs::write(nested.join("a.vcf"), b"").unwrap();
        std::fs::write(nested.join("notes.txt"), b"").unwrap();
        std::fs::write(nested.join("reads.fastq.gz"), b"").unwrap();

        let explicit = dir.path().join("explicit.txt");
        let files = collect_inputs(&[dir.path().to_path_buf(), explicit.clone()]);

        assert_eq!(
            files,
            vec![nested.join("a.vcf"), nested.join("b.vcf.gz"), explicit]
        );
    }

    #[test]
    fn test_patient_only_when_given() {
        let args = Args::parse_from(["genetic-risk-analyzer", "a.vcf"]);
        assert!(args.patient().is_none());
        assert_eq!(args.format, vec![OutputFormat::Text, OutputFormat::Json]);

        let args = Args::parse_from(["genetic-risk-analyzer", "a.vcf", "--age", "50", "-f", "csv,parquet"]);
        assert_eq!(args.patient().unwrap().age, Some(50));
        assert_eq!(args.format, vec![OutputFormat::Csv, OutputFormat::Parquet]);
    }
}
