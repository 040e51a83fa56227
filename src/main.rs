// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging and parse command-line arguments
// 2. Load the config file and apply command-line overrides
// 3. Read the target file and start a run
// 4. Print progress batch by batch, then the full report once the run ends
// 5. Optionally e-mail the report
// 6. Exit with a code: 0 = run completed, 1 = run did not complete
//    (nothing to check, cancelled), 2 = error
//
// A DOWN site is a result, not an error, so it never changes the exit code.
// =============================================================================

mod batch;     // src/batch/ - batch scheduling and result aggregation
mod checker;   // src/checker/ - target loading and per-site probing
mod cli;       // src/cli.rs - command-line parsing
mod config;    // src/config.rs - JSON config file
mod notify;    // src/notify.rs - user-facing notifications
mod report;    // src/report/ - report rendering and the mail relay

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing_subscriber::EnvFilter;

use batch::{RunContext, RunEvent, Scheduler};
use checker::{load_target_file, CheckResult, FallbackPolicy, HttpProber};
use cli::{CheckArgs, Cli, Commands};
use config::{Config, ConfigError};
use notify::Notification;
use report::{format_json, format_text, MailRelay, RelayError, ReportOptions};

#[tokio::main]
async fn main() {
    init_logging();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr so stdout only carries the report.
// RUST_LOG overrides the default level, e.g. RUST_LOG=site_guardian=debug
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("site_guardian=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check(args) => handle_check(config, args).await,
        Commands::Presets => {
            list_presets(&config);
            Ok(0)
        }
    }
}

// Handles the 'check' subcommand
async fn handle_check(config: Config, args: CheckArgs) -> Result<i32> {
    let config = apply_overrides(config, &args)?;
    let options = config.report_options();

    let path = match (&args.file, &args.preset) {
        (Some(file), _) => file.clone(),
        (None, Some(name)) => config.preset(name)?.to_path_buf(),
        (None, None) => anyhow::bail!("no target file given"),
    };

    let list = match load_target_file(&path) {
        Ok(list) => list,
        Err(e) => {
            print_notice(&Notification::danger(format!("Could not load the target file: {}", e)), args.json);
            return Ok(2);
        }
    };

    if list.invalid_count() > 0 {
        print_notice(
            &Notification::warning(format!(
                "The target file contains {} invalid line(s); they will be skipped",
                list.invalid_count()
            )),
            args.json,
        );
    }

    let prober = HttpProber::new(config.probe_timeout(), config.fallback_policy)
        .context("failed to create HTTP client")?;
    let scheduler = Scheduler::new(prober, config.max_concurrent_checks);
    let context = RunContext::new();

    // Ctrl-C stops the run between batches instead of killing the process,
    // so the sites checked so far still get reported
    let cancel = scheduler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(render_events(rx, options, args.json));

    let outcome = scheduler.run(&context, &list.targets, &tx).await;

    // Closing the channel lets the renderer finish printing and exit
    drop(tx);
    renderer.await.context("event renderer crashed")?;

    let report = match outcome {
        Ok(report) => report,
        // Already shown to the user as a notification by the renderer
        Err(_) => return Ok(1),
    };

    if args.json {
        println!("{}", format_json(&report.results)?);
    } else {
        println!(
            "⏱️  Checked {} site(s) in {:.1}s",
            report.summary.total,
            report.elapsed.as_secs_f64()
        );
    }

    if report.cancelled {
        return Ok(1);
    }

    if args.send_report {
        return Ok(send_report(&config, args.to.as_deref(), &report.results, args.json).await);
    }

    Ok(0)
}

// Command-line flags win over the config file
fn apply_overrides(mut config: Config, args: &CheckArgs) -> Result<Config, ConfigError> {
    if let Some(concurrency) = args.concurrency {
        config.max_concurrent_checks = concurrency;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.probe_timeout_ms = timeout_ms;
    }
    if args.strict {
        config.fallback_policy = FallbackPolicy::Strict;
    }
    if args.no_ssl {
        config.check_ssl = false;
    }
    if args.no_latency {
        config.check_latency = false;
    }

    config.validate()?;
    Ok(config)
}

async fn render_events(mut events: UnboundedReceiver<RunEvent>, options: ReportOptions, json: bool) {
    let mut renderer = Renderer::new(options, json);
    while let Some(event) = events.recv().await {
        if let Some(text) = renderer.render(event) {
            print!("{}", text);
        }
    }
}

// Turns run events into terminal output
//
// Each batch prints one progress line; the table itself is printed once,
// from everything collected, when the run finishes. In JSON mode stdout is
// reserved for the final document, so only notifications are shown (through
// the log).
struct Renderer {
    options: ReportOptions,
    json: bool,
    results: Vec<CheckResult>,
}

impl Renderer {
    fn new(options: ReportOptions, json: bool) -> Self {
        Self {
            options,
            json,
            results: Vec::new(),
        }
    }

    // What to print on stdout for one event, if anything
    fn render(&mut self, event: RunEvent) -> Option<String> {
        match event {
            RunEvent::Notice(notice) if self.json => {
                notice.log();
                None
            }
            RunEvent::Notice(notice) => Some(format!("{}\n", notice)),
            _ if self.json => None,
            RunEvent::Started { batches } => Some(format!("   {} batch(es) to run\n", batches)),
            RunEvent::BatchCompleted {
                index,
                results,
                summary,
                completed,
                total,
            } => {
                self.results.extend(results);
                let percent = completed as f64 / total as f64 * 100.0;
                Some(format!(
                    "   batch {}: {:>3.0}% ({}/{})  ✅ {}  ❌ {}\n",
                    index + 1,
                    percent,
                    completed,
                    total,
                    summary.up,
                    summary.down
                ))
            }
            RunEvent::Finished { cancelled } => {
                let mut out = String::from("\n");
                if cancelled {
                    out.push_str("Partial results, the run was cancelled:\n");
                }
                out.push_str(&format_text(&self.results, &self.options));
                Some(out)
            }
        }
    }
}

fn print_notice(notice: &Notification, json: bool) {
    if json {
        notice.log();
    } else {
        println!("{}", notice);
    }
}

// Sends the report and turns the outcome into a notification + exit code
async fn send_report(config: &Config, recipient: Option<&str>, results: &[CheckResult], json: bool) -> i32 {
    let Some(relay_config) = config.mail_relay.clone() else {
        print_notice(&Notification::warning("No mail relay configured"), json);
        return 2;
    };
    let Some(recipient) = recipient.or(config.email_recipient.as_deref()) else {
        print_notice(&Notification::warning("No report recipient configured"), json);
        return 2;
    };

    let relay = match MailRelay::new(relay_config) {
        Ok(relay) => relay,
        Err(e) => {
            print_notice(&Notification::danger(format!("Could not set up the mail relay: {}", e)), json);
            return 2;
        }
    };

    match relay.send_report(recipient, results).await {
        Ok(()) => {
            print_notice(&Notification::success(format!("Report sent to {}", recipient)), json);
            0
        }
        Err(RelayError::NoResults) => {
            print_notice(&Notification::warning("No results to send"), json);
            1
        }
        Err(e) => {
            print_notice(&Notification::danger(format!("Could not send the report: {}", e)), json);
            2
        }
    }
}

// Handles the 'presets' subcommand
fn list_presets(config: &Config) {
    if config.presets.is_empty() {
        println!("No presets configured");
        return;
    }

    for (name, path) in &config.presets {
        println!("{:<30} {}", name, path.display());
    }
}
