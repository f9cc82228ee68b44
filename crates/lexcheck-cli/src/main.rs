//! `lexcheck` command-line front end

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lexcheck_core::{
    discover_outputs, BatchOrchestrator, CancelToken, LexcheckConfig, RollbackLog, RunSummary,
    TitleMaintenance,
};
use lexcheck_record::IdPolicy;
use lexcheck_report::{DiscrepancyReporter, JsonlSink, TracingProgress};
use lexcheck_store::{DirectoryContentStore, JsonIndexStore};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("lexcheck")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Validate legal-document datasets and check them against the index and content stores")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("check")
                .about("Normalize, verify and write corrected datasets")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory containing *.csv datasets"),
                )
                .arg(
                    Arg::new("index")
                        .long("index")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Index snapshot (JSON object keyed by identifier)"),
                )
                .arg(
                    Arg::new("content-root")
                        .long("content-root")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Content store root directory"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_parser(value_parser!(PathBuf))
                        .help("Durable report destination (JSON lines)"),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .value_parser(value_parser!(usize))
                        .help("Concurrent verifications per dataset"),
                )
                .arg(
                    Arg::new("strict-ids")
                        .long("strict-ids")
                        .action(ArgAction::SetTrue)
                        .help("Reject identifiers without exactly five fractional digits"),
                ),
        )
        .subcommand(
            Command::new("repair-titles")
                .about("Write corrected multi-part titles back to the index")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory containing corrected datasets"),
                )
                .arg(
                    Arg::new("index")
                        .long("index")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Index snapshot to update"),
                )
                .arg(
                    Arg::new("rollback-log")
                        .long("rollback-log")
                        .value_parser(value_parser!(PathBuf))
                        .help("Append previous titles here before overwriting (JSON lines)"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Report changes without writing"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<LexcheckConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => LexcheckConfig::load(path)?,
        None => LexcheckConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn path_arg(args: &ArgMatches, name: &str) -> Result<PathBuf> {
    args.get_one::<PathBuf>(name)
        .cloned()
        .with_context(|| format!("missing argument {name}"))
}

fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

async fn check(config: LexcheckConfig, args: &ArgMatches) -> Result<ExitCode> {
    let mut config = config;
    if let Some(report) = args.get_one::<PathBuf>("report") {
        config = config.with_report_path(report);
    }
    if let Some(workers) = args.get_one::<usize>("workers") {
        config = config.with_workers(*workers);
    }
    if args.get_flag("strict-ids") {
        config = config.with_id_policy(IdPolicy::Strict);
    }
    config.validate()?;

    let input = path_arg(args, "input")?;
    let index = JsonIndexStore::load(path_arg(args, "index")?)
        .await
        .context("loading index snapshot")?;
    let content = DirectoryContentStore::new(path_arg(args, "content-root")?);
    let sink = JsonlSink::create(&config.report_path).context("opening report")?;
    let reporter = Arc::new(DiscrepancyReporter::new(Arc::new(sink), Arc::new(TracingProgress)));

    let report_path = config.report_path.clone();
    let orchestrator = BatchOrchestrator::new(config, Arc::new(index), Arc::new(content), reporter)?
        .with_cancel(cancel_on_ctrl_c());
    let summary = orchestrator.run_dir(&input).await?;

    print_summary(&summary);
    println!("Report: {}", report_path.display());
    Ok(if summary.is_consistent() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(summary: &RunSummary) {
    println!("Datasets:");
    for d in &summary.datasets {
        println!(
            "  {}: rows {}, rejected {}, corrected {}, consistent {}, missing {}, errored {}{}",
            d.dataset,
            d.rows,
            d.rejected,
            d.corrected,
            d.consistent,
            d.missing,
            d.errored,
            if d.failed { " [FAILED]" } else { "" },
        );
    }
    for output in &summary.outputs {
        println!("  wrote {}", output.display());
    }
    if summary.cancelled {
        println!("Run cancelled");
    }
    println!(
        "Status: {}",
        if summary.is_consistent() { "CONSISTENT" } else { "DISCREPANCIES" }
    );
}

async fn repair_titles(config: &LexcheckConfig, args: &ArgMatches) -> Result<ExitCode> {
    let input = path_arg(args, "input")?;
    let index = JsonIndexStore::load(path_arg(args, "index")?)
        .await
        .context("loading index snapshot")?;
    let datasets = discover_outputs(&input, &config.output_suffix)?;
    let dry_run = args.get_flag("dry-run");

    let mut maintenance = TitleMaintenance::new(&index)
        .with_dry_run(dry_run)
        .with_cancel(cancel_on_ctrl_c());
    if !dry_run {
        let path = args
            .get_one::<PathBuf>("rollback-log")
            .unwrap_or(&config.rollback_path);
        let log = RollbackLog::open(path)?;
        println!("Rollback log: {}", log.path().display());
        maintenance = maintenance.with_rollback_log(log);
    }
    let summaries = maintenance.repair_titles(&datasets).await?;

    let mut errors = 0;
    for s in &summaries {
        println!(
            "{}: updated {}, unchanged {}, skipped {}, not found {}, errors {}",
            s.dataset, s.updated, s.unchanged, s.skipped, s.not_found, s.errors
        );
        errors += s.errors;
    }
    Ok(if errors == 0 && summaries.len() == datasets.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("check", args)) => check(config, args).await,
        Some(("repair-titles", args)) => repair_titles(&config, args).await,
        _ => anyhow::bail!("unknown command"),
    }
}
