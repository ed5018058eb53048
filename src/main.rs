use clap::Parser;
use flow_sync::core::report;
use flow_sync::utils::error::ErrorScope;
use flow_sync::utils::{logger, validation::Validate};
use flow_sync::{CliConfig, FileSheetSource, LocalTableStore, SyncConfig, SyncEngine};
use std::process::ExitCode;

/// At least one job failed.
const EXIT_JOB_FAILED: u8 = 1;
/// The run never started: bad config, unreadable source, empty lookup.
const EXIT_RUN_ABORTED: u8 = 2;

fn main() -> ExitCode {
    let cli = CliConfig::parse();

    match cli.log_format {
        flow_sync::config::LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        flow_sync::config::LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("🚀 Starting flow-sync");
    tracing::info!("📁 Loading configuration from: {}", cli.config.display());

    // Load config
    let mut config = match SyncConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config.display(), e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            return ExitCode::from(EXIT_RUN_ABORTED);
        }
    };

    // Command-line overrides win over the file
    cli.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        return ExitCode::from(EXIT_RUN_ABORTED);
    }

    let options = match cli.run_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::from(EXIT_RUN_ABORTED);
        }
    };

    tracing::info!(
        "✅ Configuration loaded: {} job(s){}",
        config.jobs.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    let engine = SyncEngine::new(FileSheetSource::new(), LocalTableStore::new(), config, options);

    let summary = match engine.run() {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("❌ Fatal error: {} (scope: {:?})", e, e.scope());
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            let code = match e.scope() {
                ErrorScope::Run => EXIT_RUN_ABORTED,
                ErrorScope::Job => EXIT_JOB_FAILED,
            };
            return ExitCode::from(code);
        }
    };

    println!("{}", report::render_summary(&summary));

    if let Some(path) = &cli.report {
        if let Err(e) = report::write_report(path, &summary) {
            tracing::error!("❌ Failed to write report to {}: {}", path.display(), e);
        } else {
            tracing::info!("📁 Report saved to: {}", path.display());
        }
    }

    if summary.all_succeeded() {
        println!("✅ All jobs completed successfully!");
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_JOB_FAILED)
    }
}
