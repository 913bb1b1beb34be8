use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tabwriter::TabWriter;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use hss_cli::cli::{Cli, Commands};
use hss_engine::{
    check_feasibility, schedule, BatchDisposition, BatchRecord, EngineResolver, SimEngine,
};
use hss_geom::{bands_for_orders, compute_loci, write_boundary_table, ImpedanceSample};
use hss_results::{
    aggregate, write_run_manifest, BatchManifestRecord, ExportContext, MergedDataset, RunManifest,
};
use hss_study::{expand, load_study_from_path, resolve_study, ResolvedStudy};

/// Impedance sweep variables paired into locus samples.
const RESISTANCE_VARIABLE: &str = "m:R";
const REACTANCE_VARIABLE: &str = "m:X";

/// Nominal voltage the simulated engine reports for every terminal.
const SIM_NOMINAL_KV: f64 = 110.0;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Expand { study, json } => cmd_expand(study, *json),
        Commands::Run { study, output } => cmd_run(study, output),
        Commands::Aggregate {
            study,
            exports,
            output,
        } => cmd_aggregate(study, exports, output),
        Commands::Boundary {
            study,
            exports,
            output,
        } => cmd_boundary(study, exports, output),
    };

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn load_resolved(path: &Path) -> Result<ResolvedStudy> {
    let set = load_study_from_path(path)?;
    let study = resolve_study(&set)?;
    if study.diagnostics.has_issues() {
        info!("study resolution: {}", study.diagnostics.summary());
    }
    Ok(study)
}

fn cmd_expand(study_path: &Path, json: bool) -> Result<()> {
    let study = load_resolved(study_path)?;
    let expansion = expand(
        &study.base_cases,
        &study.contingencies,
        &study.filters,
        &hss_study::ResolveAll,
    )?;

    if json {
        let rendered = serde_json::to_string_pretty(&expansion.variants)
            .context("serializing variants to JSON")?;
        println!("{rendered}");
        return Ok(());
    }

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "ID\tBASE CASE\tCONTINGENCY\tFILTER")?;
    for variant in &expansion.variants {
        let filter = variant
            .filter
            .as_ref()
            .map(|f| f.label())
            .unwrap_or_else(|| "-".into());
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            variant.id, variant.base_case, variant.contingency.name, filter
        )?;
    }
    writer.flush()?;
    for (base_case, contingency) in &expansion.skipped {
        println!("skipped contingency '{contingency}' for base case '{base_case}'");
    }
    info!(
        variants = expansion.variants.len(),
        skipped = expansion.skipped.len(),
        "expansion complete"
    );
    Ok(())
}

fn cmd_run(study_path: &Path, output: &Path) -> Result<()> {
    let study = load_resolved(study_path)?;
    fs::create_dir_all(output)
        .with_context(|| format!("creating output directory '{}'", output.display()))?;

    let engine = build_sim_engine(&study, &output.join("exports"));
    let expansion = expand(
        &study.base_cases,
        &study.contingencies,
        &study.filters,
        &EngineResolver(&engine),
    )?;
    let mut variants = expansion.variants;
    info!(
        variants = variants.len(),
        skipped = expansion.skipped.len(),
        "expanded study '{}'",
        study.name
    );

    let gate = check_feasibility(&engine, &mut variants)?;
    info!(
        convergent = gate.convergent,
        non_convergent = gate.non_convergent,
        skipped = gate.skipped,
        "feasibility gate complete"
    );

    let execution = schedule(&engine, &mut variants, &study.settings.schedule);
    if execution.failed_batches > 0 {
        warn!(
            failed_batches = execution.failed_batches,
            "some batches failed; their artifacts are retained"
        );
    }

    let export_paths: Vec<PathBuf> = variants
        .iter()
        .filter_map(|v| v.result_export.clone())
        .collect();
    let ctx = ExportContext::new(
        &study.terminals,
        &study.mutual_pairs,
        study.settings.solver.nominal_frequency_hz,
    );
    let dataset = aggregate(&export_paths, &ctx, &study.settings.aggregate)?;
    let merged_path = output.join("merged.csv");
    dataset.write_csv(&merged_path, study.settings.aggregate.attach_voltage_level)?;

    let orders: Vec<u32> = (1..=study.settings.solver.max_harmonic_order).collect();
    let bands = bands_for_orders(&orders, study.settings.solver.nominal_frequency_hz);
    let loci = compute_loci(
        &impedance_samples(&dataset),
        &bands,
        &study.settings.boundary,
    );
    let boundary_path = output.join("boundaries.csv");
    write_boundary_table(&boundary_path, &loci)?;

    let mut manifest = RunManifest::new(study.name.clone());
    manifest.variants_expanded = variants.len();
    manifest.convergent = gate.convergent;
    manifest.non_convergent = gate.non_convergent;
    manifest.skipped = gate.skipped;
    manifest.batches = execution.batches.iter().map(batch_manifest).collect();
    manifest.exports_expected = export_paths.len();
    manifest.exports_merged = dataset.merged_files;
    manifest.merged_output = Some(merged_path.display().to_string());
    manifest.boundary_output = Some(boundary_path.display().to_string());
    write_run_manifest(&output.join("run_manifest.json"), &manifest)?;

    info!(
        output = %output.display(),
        rows = dataset.len(),
        loci = loci.len(),
        "run complete"
    );
    Ok(())
}

fn cmd_aggregate(study_path: &Path, exports: &[PathBuf], output: &Path) -> Result<()> {
    let study = load_resolved(study_path)?;
    let dataset = aggregate_exports(&study, exports)?;
    dataset.write_csv(output, study.settings.aggregate.attach_voltage_level)?;
    info!(
        rows = dataset.len(),
        merged = dataset.merged_files,
        expected = dataset.expected_files,
        renames = dataset.renames.len(),
        output = %output.display(),
        "aggregation complete"
    );
    Ok(())
}

fn cmd_boundary(study_path: &Path, exports: &[PathBuf], output: &Path) -> Result<()> {
    let study = load_resolved(study_path)?;
    let dataset = aggregate_exports(&study, exports)?;
    let orders: Vec<u32> = (1..=study.settings.solver.max_harmonic_order).collect();
    let bands = bands_for_orders(&orders, study.settings.solver.nominal_frequency_hz);
    let loci = compute_loci(
        &impedance_samples(&dataset),
        &bands,
        &study.settings.boundary,
    );
    write_boundary_table(output, &loci)?;
    info!(loci = loci.len(), output = %output.display(), "boundary table written");
    Ok(())
}

fn aggregate_exports(study: &ResolvedStudy, exports: &[PathBuf]) -> Result<MergedDataset> {
    if exports.is_empty() {
        bail!("no export files given");
    }
    let ctx = ExportContext::new(
        &study.terminals,
        &study.mutual_pairs,
        study.settings.solver.nominal_frequency_hz,
    );
    Ok(aggregate(exports, &ctx, &study.settings.aggregate)?)
}

fn build_sim_engine(study: &ResolvedStudy, export_root: &Path) -> SimEngine {
    let mut engine = SimEngine::new(export_root);
    for terminal in &study.terminals {
        for location in &terminal.locations {
            engine = engine.with_terminal(&terminal.name, location, SIM_NOMINAL_KV);
        }
    }
    for pair in &study.mutual_pairs {
        engine = engine.with_mutual_location(&pair.used_name);
    }
    engine
}

/// Pair R and X sweep rows into impedance samples, keyed on everything
/// except the variable name. Rows missing either half are dropped.
fn impedance_samples(dataset: &MergedDataset) -> Vec<ImpedanceSample> {
    let mut halves: HashMap<hss_results::ResultKey, (Option<f64>, Option<f64>)> = HashMap::new();
    for row in &dataset.rows {
        let is_resistance = match row.key.variable.as_str() {
            RESISTANCE_VARIABLE => true,
            REACTANCE_VARIABLE => false,
            _ => continue,
        };
        let mut key = row.key.clone();
        key.variable.clear();
        let entry = halves.entry(key).or_default();
        if is_resistance {
            entry.0 = Some(row.value);
        } else {
            entry.1 = Some(row.value);
        }
    }
    halves
        .into_iter()
        .filter_map(|(key, (r, x))| {
            Some(ImpedanceSample {
                frequency_hz: key.frequency_hz(),
                terminal: key.terminal,
                resistance_ohm: r?,
                reactance_ohm: x?,
            })
        })
        .collect()
}

fn batch_manifest(record: &BatchRecord) -> BatchManifestRecord {
    BatchManifestRecord {
        base_case: record.base_case.clone(),
        status: match record.disposition {
            BatchDisposition::Completed => "ok".into(),
            BatchDisposition::Failed => "failed".into(),
        },
        attempts: record.attempts,
        serial_fallback: record.serial_fallback,
        error: record.error.clone(),
        cases: record.cases.len(),
    }
}
