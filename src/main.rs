//! CLI entry point for `mboxpress`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

use mboxpress::config::{self, Config};
use mboxpress::model::document::NormalizedDocument;
use mboxpress::normalize::{normalize_with_registry, NormalizeOptions};

#[derive(Parser)]
#[command(
    name = "mboxpress",
    version,
    about = "Convert mbox and maildir archives into publish-ready JSON documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "MBOXPRESS_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert archives into normalized documents
    Convert {
        /// mbox files or maildir directories (defaults to the config file's archives)
        archives: Vec<PathBuf>,

        /// Category per archive, matched positionally; a single value
        /// applies to all archives
        #[arg(short, long)]
        category: Vec<String>,

        /// Suffix appended to every derived author name
        #[arg(long, value_name = "SUFFIX")]
        author_suffix: Option<String>,

        /// Treat plaintext bodies as Markdown
        #[arg(long)]
        markdownify: bool,

        /// Write one JSON file per document under this directory
        /// instead of printing a JSON array to stdout
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Pretty-print the stdout JSON
        #[arg(long)]
        pretty: bool,

        /// Keep slugs unique across all archives instead of per archive
        #[arg(long)]
        shared_slugs: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref());

    let log_level = match cli.verbose {
        0 => config.defaults.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Convert {
            archives,
            category,
            author_suffix,
            markdownify,
            output,
            pretty,
            shared_slugs,
        } => cmd_convert(
            &config,
            &archives,
            &category,
            author_suffix.as_deref(),
            markdownify,
            output.as_deref(),
            pretty,
            shared_slugs,
        ),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxpress.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Build the effective `(path, options)` list for a convert run.
fn resolve_archives(
    config: &Config,
    archives: &[PathBuf],
    categories: &[String],
    author_suffix: Option<&str>,
    markdownify: bool,
) -> anyhow::Result<Vec<(PathBuf, NormalizeOptions)>> {
    if archives.is_empty() {
        if config.archives.is_empty() {
            anyhow::bail!(
                "no archives given on the command line and none configured; \
                 pass paths or add [[archives]] entries to the config file"
            );
        }
        return Ok(config
            .archives
            .iter()
            .map(|a| (a.path.clone(), a.options(&config.defaults)))
            .collect());
    }

    let suffix = author_suffix
        .map(String::from)
        .unwrap_or_else(|| config.defaults.author_suffix.clone());
    let markdownify = markdownify || config.defaults.markdownify;

    let category_for = |i: usize| -> anyhow::Result<String> {
        match categories.len() {
            0 => anyhow::bail!("--category is required when passing archives"),
            1 => Ok(categories[0].clone()),
            n if n == archives.len() => Ok(categories[i].clone()),
            n => anyhow::bail!(
                "got {n} categories for {} archives; pass one per archive or a single one for all",
                archives.len()
            ),
        }
    };

    archives
        .iter()
        .enumerate()
        .map(|(i, path)| {
            Ok((
                path.clone(),
                NormalizeOptions {
                    category: category_for(i)?,
                    author_suffix: suffix.clone(),
                    markdownify,
                },
            ))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn cmd_convert(
    config: &Config,
    archives: &[PathBuf],
    categories: &[String],
    author_suffix: Option<&str>,
    markdownify: bool,
    output: Option<&Path>,
    pretty: bool,
    shared_slugs: bool,
) -> anyhow::Result<()> {
    let jobs = resolve_archives(config, archives, categories, author_suffix, markdownify)?;

    let (documents, failures) = convert_archives(&jobs, shared_slugs);

    if failures == jobs.len() {
        anyhow::bail!("all {failures} archive(s) failed to open");
    }

    match output {
        Some(dir) => write_documents(dir, &documents)?,
        None => {
            let json = if pretty {
                serde_json::to_string_pretty(&documents)?
            } else {
                serde_json::to_string(&documents)?
            };
            println!("{json}");
        }
    }

    Ok(())
}

/// Convert each archive in order, with a progress bar per archive.
///
/// No archive failure aborts the run: any error from the open step
/// (missing path, not a mailbox, I/O failure) is reported and counted,
/// and the remaining archives are still processed. Returns the collected
/// documents and the number of archives skipped.
fn convert_archives(
    jobs: &[(PathBuf, NormalizeOptions)],
    shared_slugs: bool,
) -> (Vec<NormalizedDocument>, usize) {
    let mut documents: Vec<NormalizedDocument> = Vec::new();
    let mut seen_slugs: HashSet<String> = HashSet::new();
    let mut failures = 0usize;

    for (path, options) in jobs {
        if !shared_slugs {
            seen_slugs.clear();
        }

        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );

        let result = normalize_with_registry(
            path,
            options,
            &mut seen_slugs,
            Some(&|current, total| {
                pb.set_length(total);
                pb.set_position(current);
            }),
        );
        pb.finish_and_clear();

        match result {
            Ok(batch) => {
                println!(
                    "  Converted {} of {} message(s) from {} [category: {}]",
                    batch.converted(),
                    batch.messages_read,
                    path.display(),
                    options.category
                );
                documents.extend(batch.documents);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not process archive");
                eprintln!("  Skipping archive {}: {e}", path.display());
                failures += 1;
            }
        }
    }

    (documents, failures)
}

/// Write one `<slug>.json` file per document under `dir`.
///
/// Slugs contain `/` separators, so each document lands in its
/// category/month subdirectory.
fn write_documents(dir: &Path, documents: &[NormalizedDocument]) -> anyhow::Result<()> {
    for doc in documents {
        let path = dir.join(format!("{}.json", doc.slug));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(doc)?)?;
    }
    println!("  Wrote {} document(s) to {}", documents.len(), dir.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxpress", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
