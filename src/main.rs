use anyhow::Context;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use twr_localization::{
    init_logging, AccuracySummary, Configuration, Dataset, LocalizationReport, Localizer, LogLevel, OutputFormat,
};

/// Offline SS-TWR localization of logged ranging exchanges
#[derive(Debug, Parser)]
#[command(name = "twr-localize", version)]
struct Cli {
    /// Directory holding the anchor, mobile and frame tables
    data_dir: PathBuf,

    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Result file; results go to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Result encoding
    #[arg(short, long, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Overrides the configured log level
    #[arg(long)]
    log_level: Option<LogLevel>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Configuration::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging);

    let localizer = Localizer::from_configuration(&config).context("setting up localizer")?;
    let dataset = Dataset::load(&cli.data_dir)
        .with_context(|| format!("loading measurement tables from {}", cli.data_dir.display()))?;

    let report = localizer.run(&dataset)?;

    match &cli.output {
        Some(path) => {
            report
                .results
                .save(path, cli.format)
                .with_context(|| format!("writing results to {}", path.display()))?;
            tracing::info!(path = %path.display(), format = %cli.format, "results written");
        }
        None => report.results.write(io::stdout().lock(), cli.format)?,
    }

    print_summary(&report);
    Ok(())
}

/// Accuracy and failure overview on stderr
fn print_summary(report: &LocalizationReport) {
    eprintln!("Rounds: {} solved, {} failed", report.results.len(), report.failures.len());
    for (category, count) in report.failure_counts() {
        eprintln!("  {} failures: {}", category, count);
    }

    eprintln!("Accuracy: {}", report.accuracy());
    for (mac, summary) in AccuracySummary::per_mobile(&report.results) {
        eprintln!("  node {}: {}", mac, summary);
    }
}
