use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wepp_interchange::ash_post::{AshPost, load_hillslope_attributes};
use wepp_interchange::cli::{Args, AshArgs, Command, DocsArgs, RunArgs, VersionArgs};
use wepp_interchange::docs::{render_readme, write_readme};
use wepp_interchange::{
    INTERCHANGE_VERSION, InterchangeConfig, InterchangeRun, RunSummary, read_version_manifest,
    remove_incompatible_interchange,
};

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nReceived CTRL+C, cancelling...");
                watcher.cancel();
            }
        });

        execute(args, cancel).await
    });

    if let Err(error) = result {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), error);
        process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wepp_interchange={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn execute(args: Args, cancel: CancellationToken) -> Result<()> {
    debug!("Command line arguments: {:?}", args);
    match args.command {
        Command::Run(run) => run_interchange(run, cancel).await,
        Command::Docs(docs) => docs_command(docs),
        Command::Version(version) => version_command(version),
        Command::Ash(ash) => ash_command(ash).await,
    }
}

async fn run_interchange(args: RunArgs, cancel: CancellationToken) -> Result<()> {
    let config = args.config()?;
    let run = InterchangeRun::new(&args.workdir)
        .with_config(config)
        .with_cancel(cancel);

    println!("{}", "Starting WEPP interchange".bright_green().bold());
    println!("  {} {}", "Input:".bright_cyan(), run.output_dir().display());
    println!("  {} {}", "Output:".bright_cyan(), run.interchange_dir().display());

    let summary = match &args.product {
        Some(product) => run.run_product(product).await,
        None => run.run().await,
    }
    .with_context(|| format!("Interchange run failed for {}", args.workdir.display()))?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "Interchange complete".bright_green().bold());
    if summary.refreshed {
        println!(
            "  {} stale artifacts from another major version were removed",
            "Refreshed:".bright_yellow()
        );
    }
    println!(
        "  {} {}",
        "Artifacts:".bright_cyan(),
        summary.artifacts.len().to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Rows written:".bright_cyan(),
        summary.total_rows().to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Files parsed:".bright_cyan(),
        summary.total_files().to_string().bright_white().bold()
    );
    println!(
        "  {} {:.2}s",
        "Time:".bright_cyan(),
        summary.processing_time_ms as f64 / 1000.0
    );
    for artifact in &summary.artifacts {
        let name = artifact
            .output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("    {} {}", name, artifact.rows_written.to_string().dimmed());
    }
}

fn docs_command(args: DocsArgs) -> Result<()> {
    if args.write {
        let path = write_readme(&args.dir)?;
        println!("{} {}", "Wrote".bright_green(), path.display());
    } else {
        print!("{}", render_readme(&args.dir)?);
    }
    Ok(())
}

fn version_command(args: VersionArgs) -> Result<()> {
    match read_version_manifest(&args.dir) {
        Some(found) if found.major == INTERCHANGE_VERSION.major => {
            println!(
                "{} {} (running {})",
                "Compatible:".bright_green(),
                found,
                INTERCHANGE_VERSION
            );
        }
        Some(found) => {
            println!(
                "{} {} (running {})",
                "Incompatible:".bright_red(),
                found,
                INTERCHANGE_VERSION
            );
        }
        None => {
            println!(
                "{} no readable manifest in {}",
                "Missing:".bright_yellow(),
                args.dir.display()
            );
        }
    }

    if args.remove_incompatible && remove_incompatible_interchange(&args.dir)? {
        println!("{} {}", "Removed".bright_red(), args.dir.display());
    }
    Ok(())
}

async fn ash_command(args: AshArgs) -> Result<()> {
    let attributes = load_hillslope_attributes(&args.hillslopes).with_context(|| {
        format!("Failed to read hillslope attributes {}", args.hillslopes.display())
    })?;
    let (start, end) = args.date_range();

    let mut config = InterchangeConfig::from_env();
    if args.no_docs {
        config = config.without_docs();
    }
    let post = AshPost::new(&args.ash_dir, attributes)
        .with_date_range(start, end)
        .with_config(config);

    info!("Ash post-processing {}", args.ash_dir.display());
    let summary = tokio::task::spawn_blocking(move || post.run()).await??;
    print_summary(&summary);
    Ok(())
}
