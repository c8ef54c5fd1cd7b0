mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::Path;
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{CleanupArgs, Cli, Commands, ReviewCommand};
use dotenv::dotenv;
use progress::CliReporter;
use sweeper_core::review::{self, ReviewDecision};
use sweeper_core::run::tables::human_bytes;
use sweeper_core::{
    run_cleanup, Accounting, AppConfig, CancelToken, CleanupOptions, CleanupOutcome,
    CleanupReport, Error, ScanEngine,
};
use tracing::{error, info, warn};

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_VERIFY_ABORT: i32 = 5;
const EXIT_INTEGRITY: i32 = 6;

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match sweeper_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(EXIT_FAILURE);
        }
    };

    let args = Cli::parse();

    let code = match args.command {
        Some(Commands::Scan(scan)) => {
            let mut config = config;
            scan.apply(&mut config);
            report(run_scan(config))
        }
        Some(Commands::Review(command)) => report(run_review(command)),
        Some(Commands::Cleanup(cleanup)) => match run_cleanup_command(&config, cleanup) {
            Ok(code) => code,
            Err(err) => exit_code_for(&err),
        },
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            EXIT_OK
        }
        None => {
            let _ = Cli::command().print_long_help();
            EXIT_OK
        }
    };

    drop(_guard);
    process::exit(code);
}

fn report(result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => EXIT_OK,
        Err(err) => {
            error!("Error: {:#}", err);
            EXIT_FAILURE
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::VerificationFailed { .. } | Error::NoVerifiablePairs) => {
            error!("{}", format!("ABORT: {}. Nothing was moved.", err).red());
            EXIT_VERIFY_ABORT
        }
        _ => {
            error!("Error: {:#}", err);
            EXIT_FAILURE
        }
    }
}

/// Ctrl-C trips the token so the passes stop and flush their checkpoints.
fn interrupt_handler(token: CancelToken) -> impl Fn() + Send + 'static {
    move || {
        eprintln!("\nInterrupted, saving checkpoints...");
        token.cancel();
    }
}

fn run_scan(config: AppConfig) -> anyhow::Result<()> {
    let engine = ScanEngine::new(config);
    if let Err(e) = ctrlc::set_handler(interrupt_handler(engine.cancel_token())) {
        warn!("Ctrl-C will not stop the scan cleanly: {}", e);
    }
    let reporter = CliReporter::new();
    let summary = match engine.run(&reporter) {
        Err(Error::Cancelled) => {
            bail!("scan interrupted; checkpoints were saved, rerun to resume")
        }
        result => result.context("scan failed")?,
    };

    println!();
    info!(
        "Run {} ({} mode, {} files scanned)",
        summary.run_dir.display().to_string().cyan(),
        summary.mode,
        summary.files_scanned
    );
    if let Some(stats) = summary.match_stats {
        info!(
            "{} duplicate groups, {} selected for review, {} wasted",
            format!("{}", summary.groups_found).red(),
            format!("{}", summary.groups_selected).red(),
            human_bytes(summary.wasted_bytes).red(),
        );
        info!(
            "{} size candidates, {} cheap-hashed, {} strong-hashed, {} excluded",
            stats.size_candidates, stats.cheap_hashed, stats.strong_hashed, stats.excluded
        );
    }
    if let Some(stats) = summary.fingerprint_stats {
        info!(
            "{} fingerprints ({} from checkpoint), {} similar pairs, {} clusters",
            format!("{}", stats.files).cyan(),
            stats.cache_hits,
            format!("{}", summary.edges).cyan(),
            format!("{}", summary.clusters).cyan(),
        );
    }
    info!(
        "{} review artifacts written{}",
        summary.artifacts,
        if summary.missing_targets > 0 {
            format!(" ({} with missing targets)", summary.missing_targets)
        } else {
            String::new()
        }
    );
    Ok(())
}

fn run_review(command: ReviewCommand) -> anyhow::Result<()> {
    match command {
        ReviewCommand::List { run_dir } => list_decisions(&run_dir),
        ReviewCommand::Keep { artifact } => {
            let path = review::set_keep(&artifact, true)?;
            println!("{} {}", "KEEP".green(), path.display());
            Ok(())
        }
        ReviewCommand::Unkeep { artifact } => {
            let path = review::set_keep(&artifact, false)?;
            println!("{} {}", "remove".yellow(), path.display());
            Ok(())
        }
    }
}

fn list_decisions(run_dir: &Path) -> anyhow::Result<()> {
    let Some(root) = review::find_review_root(run_dir) else {
        bail!("no review directory in {}", run_dir.display());
    };
    let decisions = review::read_decisions(&root)?;
    let mut current = "";
    for decision in &decisions {
        if decision.group != current {
            current = &decision.group;
            println!("{}", current.bold());
        }
        print_decision(decision);
    }
    let keep = decisions.iter().filter(|d| d.keep).count();
    println!(
        "{} artifacts: {} keep, {} remove",
        decisions.len(),
        keep,
        decisions.len() - keep
    );
    Ok(())
}

fn print_decision(decision: &ReviewDecision) {
    let marker = if decision.keep {
        "KEEP  ".green()
    } else {
        "remove".yellow()
    };
    let target = match &decision.target {
        Some(t) if decision.target_exists() => t.display().to_string().normal(),
        Some(t) => format!("{} (missing)", t.display()).red(),
        None => "(empty artifact)".red(),
    };
    println!("  {} {}  -> {}", marker, decision.artifact_name(), target);
}

fn run_cleanup_command(config: &AppConfig, args: CleanupArgs) -> anyhow::Result<i32> {
    let options = CleanupOptions {
        sample_size: args.sample.unwrap_or(config.sample_size).max(1),
    };
    let reporter = CliReporter::new();
    let mut rng = rand::thread_rng();
    let skip_prompt = args.yes;

    let outcome = run_cleanup(&args.run_dir, options, &mut rng, &reporter, |acc| {
        print_accounting(acc);
        if skip_prompt {
            return true;
        }
        match prompt_confirm("Copy remove targets to quarantine and continue?", Some(false)) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Cannot read confirmation: {}", e);
                false
            }
        }
    })?;

    match outcome {
        CleanupOutcome::NothingToDo { broken } => {
            info!(
                "No existing remove targets; nothing to do ({} broken)",
                broken
            );
            Ok(EXIT_OK)
        }
        CleanupOutcome::Declined(_) => {
            info!("Cancelled; nothing was copied or moved");
            Ok(EXIT_OK)
        }
        CleanupOutcome::Completed(report) => Ok(print_report(&report)),
    }
}

fn print_accounting(acc: &Accounting) {
    println!();
    println!("{}", "Cleanup accounting".bold());
    println!(
        "  links: {} keep, {} remove",
        acc.links_keep, acc.links_remove
    );
    println!(
        "  existing: {} total ({}), {} keep ({}), {} remove ({})",
        acc.existing_total,
        human_bytes(acc.bytes_total),
        acc.existing_keep,
        human_bytes(acc.bytes_keep),
        acc.existing_remove,
        human_bytes(acc.bytes_remove)
    );
    println!(
        "  projected reclaim: {} ({:.1}%)",
        human_bytes(acc.projected_reclaim()).green(),
        acc.reclaim_percent()
    );
    if let Some(disk) = acc.disk {
        println!(
            "  disk: {} total, {} used, {} free",
            human_bytes(disk.total),
            human_bytes(disk.used()),
            human_bytes(disk.available)
        );
    }
    if let Some(after) = acc.free_after_copy() {
        if after < 0 {
            println!(
                "  {}",
                format!(
                    "free after quarantine copy: short by {}",
                    human_bytes(after.unsigned_abs() as u64)
                )
                .red()
            );
        } else {
            println!("  free after quarantine copy: {}", human_bytes(after as u64));
        }
    }
    if let (Some(dataset), Some(after), Some(pct)) = (
        acc.dataset,
        acc.dataset_after(),
        acc.dataset_reduction_percent(),
    ) {
        println!(
            "  dataset: {} files, {} -> {} ({:.1}% smaller)",
            dataset.files,
            human_bytes(dataset.bytes),
            human_bytes(after),
            pct
        );
    }
    println!();
}

fn print_report(report: &CleanupReport) -> i32 {
    info!(
        "Copied {} ({} failed), verified {} samples, moved {} ({} failed, {} missing)",
        report.copied,
        report.copy_failed,
        report.sampled,
        format!("{}", report.moved).green(),
        report.move_failed,
        report.missing_source
    );
    info!("Originals moved to {}", report.removed_dir.display());
    if report.has_integrity_problems() {
        error!(
            "{}",
            format!(
                "{} kept targets are missing or inside the removed area; see {}",
                report.kept_problems.len(),
                report.post_review_dir.display()
            )
            .red()
        );
        EXIT_INTEGRITY
    } else {
        info!("All {} kept targets intact", report.kept_ok);
        EXIT_OK
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
