use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use offset_finder::config::Config;
use offset_finder::data::{save_matrices, JsonMatrixLoader, JsonResultExporter, MatrixLoader, SyntheticParams, SyntheticScene};
use offset_finder::logging::metrics::BATCH_OPERATION;
use offset_finder::logging::{global_metrics, init_logging};
use offset_finder::matrix::{FoundOffset, TransformSet};
use offset_finder::search::{OffsetFinderService, SearchEvent};
use offset_finder::utils::validation::{diagnose_offset, feasibility_check, set_statistics, SetStatistics};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "offsets")]
#[command(about = "Find rigid offsets that map a model transform set into a space transform set")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for every offset mapping the model into the space
    Search {
        /// Model matrices (JSON)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Space matrices (JSON)
        #[arg(short, long)]
        space: Option<PathBuf>,

        /// Where to write the found offsets
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        tolerance: Option<f32>,

        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Worker thread ceiling
        #[arg(short, long)]
        workers: Option<usize>,

        /// Diagnose the first candidates after the run
        #[arg(short, long)]
        diagnose: bool,
    },

    /// Print set statistics and the feasibility check
    Inspect {
        #[arg(short, long)]
        model: Option<PathBuf>,

        #[arg(short, long)]
        space: Option<PathBuf>,

        #[arg(short, long)]
        tolerance: Option<f32>,
    },

    /// Compare fingerprint and tolerance matching for the first candidates
    Diagnose {
        #[arg(short, long)]
        model: Option<PathBuf>,

        #[arg(short, long)]
        space: Option<PathBuf>,

        #[arg(short, long)]
        tolerance: Option<f32>,

        /// Number of candidates to diagnose
        #[arg(short = 'n', long, default_value = "3")]
        candidates: usize,
    },

    /// Write a synthetic model/space pair with planted offsets
    Generate {
        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,

        #[arg(short, long, default_value = "8")]
        model_size: usize,

        /// Number of planted offsets
        #[arg(short = 'k', long, default_value = "4")]
        offsets: usize,

        /// Number of random transforms mixed into space
        #[arg(short, long, default_value = "200")]
        decoys: usize,

        #[arg(short = 'r', long, default_value = "100")]
        translation_range: i32,

        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if cli.verbose > 0 || cli.config.is_none() {
        let level = match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        config.logging.global_level = level.to_string();
        config.logging.search_level = level.to_string();
        config.logging.diagnostics_level = level.to_string();
    }
    let _guard = init_logging(&config.logging)?;

    match cli.command {
        Commands::Search {
            model,
            space,
            output,
            tolerance,
            batch_size,
            workers,
            diagnose,
        } => {
            override_paths(&mut config, model, space, output.clone());
            let export = output.or_else(|| cli.config.as_ref().map(|_| config.paths.output.clone()));
            if let Some(tolerance) = tolerance {
                config.search.tolerance = tolerance;
            }
            if let Some(batch_size) = batch_size {
                config.search.batch_size = batch_size;
            }
            if workers.is_some() {
                config.search.max_workers = workers;
            }
            config.diagnostics.enabled |= diagnose;
            check_config(&config)?;
            handle_search(config, export).await?;
        }
        Commands::Inspect { model, space, tolerance } => {
            override_paths(&mut config, model, space, None);
            if let Some(tolerance) = tolerance {
                config.search.tolerance = tolerance;
            }
            check_config(&config)?;
            handle_inspect(&config)?;
        }
        Commands::Diagnose {
            model,
            space,
            tolerance,
            candidates,
        } => {
            override_paths(&mut config, model, space, None);
            if let Some(tolerance) = tolerance {
                config.search.tolerance = tolerance;
            }
            check_config(&config)?;
            handle_diagnose(&config, candidates)?;
        }
        Commands::Generate {
            output_dir,
            model_size,
            offsets,
            decoys,
            translation_range,
            seed,
        } => {
            let params = SyntheticParams {
                model_size,
                offsets,
                decoys,
                translation_range,
            };
            handle_generate(&output_dir, &params, seed)?;
        }
    }

    Ok(())
}

fn override_paths(config: &mut Config, model: Option<PathBuf>, space: Option<PathBuf>, output: Option<PathBuf>) {
    if let Some(model) = model {
        config.paths.model = model;
    }
    if let Some(space) = space {
        config.paths.space = space;
    }
    if let Some(output) = output {
        config.paths.output = output;
    }
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    if let Err(errors) = config.validate() {
        for error in &errors {
            tracing::error!("Configuration validation error: {}", error);
        }
        bail!("Invalid configuration: {}", errors.join("; "));
    }
    Ok(())
}

fn load_sets(config: &Config) -> anyhow::Result<(TransformSet, TransformSet)> {
    let tolerance = config.search.tolerance;
    let model = JsonMatrixLoader.load(&config.paths.model)?;
    let space = JsonMatrixLoader.load(&config.paths.space)?;
    Ok((
        TransformSet::with_tolerance(model, tolerance),
        TransformSet::with_tolerance(space, tolerance),
    ))
}

/// Exports to `export` when given; a cancelled run exports its partial results.
async fn handle_search(config: Config, export: Option<PathBuf>) -> anyhow::Result<()> {
    let (model, space) = load_sets(&config)?;
    println!("Loaded {} model and {} space matrices", model.len(), space.len());

    let service = Arc::new(OffsetFinderService::new(config)?);

    let mut events = service.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SearchEvent::Progress { processed, total }) => {
                    eprint!("\rProcessed {}/{}", processed, total);
                    let _ = std::io::stderr().flush();
                }
                Ok(SearchEvent::Finished { .. }) | Ok(SearchEvent::Failed(_)) => {
                    eprintln!();
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let interrupt = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                service.cancel();
            }
        })
    };

    let result = service.find_offsets(Arc::new(model), Arc::new(space)).await;
    interrupt.abort();
    let _ = printer.await;
    let report = result?;

    if let Some(stats) = global_metrics().run_stats(BATCH_OPERATION, report.outcome.run_id) {
        tracing::info!(
            batches = stats.count,
            total_ms = stats.total_ms,
            mean_ms = stats.mean_ms,
            p95_ms = stats.p95_ms,
            "Batch timings"
        );
    }

    let outcome = &report.outcome;
    if outcome.is_cancelled() {
        println!(
            "Search cancelled after {}/{} candidates; partial results follow",
            outcome.processed, outcome.total
        );
    }
    println!(
        "Found {} offsets in {:.1} ms",
        outcome.offsets.len(),
        outcome.elapsed.as_secs_f64() * 1000.0
    );
    print_offsets(&outcome.offsets);

    for diagnosis in report.diagnoses.iter().filter(|d| d.has_divergence()) {
        println!(
            "Warning: {} matched {} elements by fingerprint but {} by tolerance",
            diagnosis.label, diagnosis.fingerprint_matches, diagnosis.tolerance_matches
        );
    }

    if let Some(path) = export {
        let written = service.export_results(&JsonResultExporter, &path)?;
        println!("Wrote {} offsets to {}", written, path.display());
    }
    Ok(())
}

fn print_offsets(offsets: &[FoundOffset]) {
    if offsets.is_empty() {
        return;
    }
    println!(
        "{:<6} {:<8} {:>12} {:>12} {:>12}  {:<16}",
        "#", "space", "tx", "ty", "tz", "fingerprint"
    );
    println!("{}", "-".repeat(72));
    for (i, offset) in offsets.iter().enumerate() {
        let m = offset.matrix.original();
        println!(
            "{:<6} {:<8} {:>12.5} {:>12.5} {:>12.5}  {}",
            i,
            offset.space_index,
            m[(0, 3)],
            m[(1, 3)],
            m[(2, 3)],
            offset.matrix.fingerprint()
        );
    }
}

fn print_statistics(stats: &SetStatistics) {
    println!("{} ({} matrices, {} digits)", stats.name, stats.count, stats.digits);
    if stats.count > 0 {
        println!(
            "  determinant min/max/avg: {:.6} / {:.6} / {:.6}",
            stats.min_determinant, stats.max_determinant, stats.avg_determinant
        );
    }
    println!("  singular: {}", stats.singular.len());
    println!("  duplicate pairs: {}", stats.duplicates.len());
    println!("  unique fingerprints: {}", stats.unique_fingerprints);
}

fn handle_inspect(config: &Config) -> anyhow::Result<()> {
    let (model, space) = load_sets(config)?;
    let tolerance = config.search.tolerance;

    print_statistics(&set_statistics("Model", &model, tolerance));
    print_statistics(&set_statistics("Space", &space, tolerance));

    if feasibility_check(&model, &space, tolerance) {
        println!("Feasibility check passed");
    } else {
        println!("Feasibility check failed; see the log for details");
    }
    Ok(())
}

fn handle_diagnose(config: &Config, candidates: usize) -> anyhow::Result<()> {
    let (model, space) = load_sets(config)?;
    let tolerance = config.search.tolerance;

    let Some(first) = model.get(0) else {
        bail!("Model set is empty");
    };
    let Some(inv0) = first.original().try_inverse() else {
        bail!("model[0] is not invertible (determinant {:e})", first.determinant());
    };

    for i in 0..candidates.min(space.len()) {
        let candidate = space[i].original() * inv0;
        let diagnosis = diagnose_offset(
            &format!("cand[{}]", i),
            &candidate,
            &model,
            &space,
            tolerance,
            config.diagnostics.max_reported,
        );
        println!(
            "{}: hash={}/{}, nearly={}/{}{}",
            diagnosis.label,
            diagnosis.fingerprint_matches,
            diagnosis.model_len,
            diagnosis.tolerance_matches,
            diagnosis.model_len,
            if diagnosis.has_divergence() { "  (divergent)" } else { "" }
        );
        for mismatch in &diagnosis.mismatches {
            println!("    {}", mismatch);
        }
    }
    Ok(())
}

fn handle_generate(output_dir: &Path, params: &SyntheticParams, seed: u64) -> anyhow::Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create {}", output_dir.display()))?;

    let scene = SyntheticScene::generate(params, seed);
    save_matrices(&output_dir.join("model.json"), &scene.model)?;
    save_matrices(&output_dir.join("space.json"), &scene.space)?;
    save_matrices(&output_dir.join("planted_offsets.json"), &scene.offsets)?;

    println!(
        "Wrote {} model and {} space matrices ({} planted offsets) to {}",
        scene.model.len(),
        scene.space.len(),
        scene.offsets.len(),
        output_dir.display()
    );
    Ok(())
}
