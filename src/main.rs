//! CLI entrypoint
//!
//! Wires the collaborators together: parse arguments, set up logging, load
//! the NZB and the provider list, open the pools, run the reconciliation to
//! quiescence, and report per-provider results.

use clap::Parser;
use nzb_refresh::{
    load_nzb_file, load_provider_list, reconcile_nzb, Progress, Provider, RefreshError, Result,
    Run, RunStatistics, DEFAULT_PROVIDER_PATH,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Check an NZB against all configured NNTP providers and re-upload
/// articles that some providers have lost
#[derive(Parser, Debug)]
#[command(name = "nzb-refresh", version, about)]
struct Cli {
    /// Path to the NZB file to be checked
    nzb_file: PathBuf,

    /// Only check availability - don't re-upload
    #[arg(short = 'c', long = "check")]
    check: bool,

    /// Path to the provider JSON config file
    #[arg(short = 'p', long = "provider", default_value = DEFAULT_PROVIDER_PATH)]
    provider: PathBuf,

    /// Log additional output to a '<nzb-basename>.log' file
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Write a per-file availability report to '<nzb-basename>.csv'
    #[arg(long = "csv")]
    csv: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Fatal error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(&cli)?;

    let start = Instant::now();
    info!("preparing...");

    let nzb = load_nzb_file(&cli.nzb_file)?;
    let provider_configs = load_provider_list(&cli.provider)?;

    // Open every pool and probe capabilities concurrently; any failure here
    // is a configuration error and aborts the run
    let mut setups = Vec::with_capacity(provider_configs.len());
    for config in provider_configs {
        setups.push(tokio::spawn(Provider::connect(config)));
    }
    let mut providers = Vec::with_capacity(setups.len());
    for setup in setups {
        let provider = setup
            .await
            .map_err(|e| RefreshError::Other(format!("provider setup failed: {}", e)))??;
        providers.push(provider);
    }

    if !providers
        .iter()
        .any(|p| p.capabilities().post || p.capabilities().ihave)
    {
        info!("no provider has IHAVE or POST capability");
    }

    info!("preparation took {:?}", start.elapsed());

    let total_segments = nzb.total_segments();
    let mut banner = format!("starting segment check of {} segments", total_segments);
    if cli.check {
        banner.push_str(" (check only, no re-upload)");
    }
    println!("{}", capitalize(&banner));
    info!("{}", banner);

    let check_start = Instant::now();
    let run = Arc::new(Run {
        providers,
        stats: Arc::new(RunStatistics::from_nzb(&nzb)),
        progress: Arc::new(Progress::new(total_segments)),
        check_only: cli.check,
    });

    reconcile_nzb(run.clone(), &nzb).await;

    info!(
        "segment check took {:?} | {:.1} ms/segment",
        check_start.elapsed(),
        per_segment_ms(check_start.elapsed(), total_segments)
    );

    for provider in &run.providers {
        let line = provider.summary_line();
        println!("{}", line);
        info!("{}", line);
    }

    if cli.csv {
        let csv_path = sibling_with_extension(&cli.nzb_file, "csv");
        info!("writing csv file...");
        print!("Writing csv file... ");
        let provider_names: Vec<String> = run
            .providers
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        run.stats.write_csv(&csv_path, &provider_names)?;
        println!("done");
    }

    let runtime = format!(
        "Total runtime {:?} | {:.1} ms/segment",
        start.elapsed(),
        per_segment_ms(start.elapsed(), total_segments)
    );
    println!("{}", runtime);
    info!("{}", runtime);

    // Dropping the Run closes every provider pool
    Ok(())
}

/// Initialize tracing output.
///
/// `--debug` writes a full debug log to `<nzb-basename>.log`; otherwise
/// logging goes to stderr, filtered by `RUST_LOG` (default `warn`) so
/// stdout stays clean for the report.
fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug {
        let log_path = sibling_with_extension(&cli.nzb_file, "log");
        let file = std::fs::File::create(&log_path).map_err(|e| {
            RefreshError::Config(format!(
                "unable to open debug log file '{}': {}",
                log_path.display(),
                e
            ))
        })?;
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// `some/dir/post.nzb` -> `post.<ext>` in the working directory
fn sibling_with_extension(path: &Path, ext: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "nzb-refresh".to_string());
    PathBuf::from(format!("{}.{}", stem, ext))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn per_segment_ms(elapsed: Duration, total_segments: u64) -> f64 {
    if total_segments == 0 {
        return 0.0;
    }
    elapsed.as_millis() as f64 / total_segments as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_with_extension() {
        assert_eq!(
            sibling_with_extension(Path::new("/some/dir/post.nzb"), "csv"),
            PathBuf::from("post.csv")
        );
        assert_eq!(
            sibling_with_extension(Path::new("post.nzb"), "log"),
            PathBuf::from("post.log")
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("starting check"), "Starting check");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_per_segment_ms_zero_segments() {
        assert_eq!(per_segment_ms(Duration::from_secs(1), 0), 0.0);
        assert_eq!(per_segment_ms(Duration::from_secs(1), 500), 2.0);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["nzb-refresh", "post.nzb", "-c", "-p", "servers.json"]);
        assert_eq!(cli.nzb_file, PathBuf::from("post.nzb"));
        assert!(cli.check);
        assert_eq!(cli.provider, PathBuf::from("servers.json"));
        assert!(!cli.debug);
        assert!(!cli.csv);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["nzb-refresh", "post.nzb"]);
        assert!(!cli.check);
        assert_eq!(cli.provider, PathBuf::from(DEFAULT_PROVIDER_PATH));
    }
}
