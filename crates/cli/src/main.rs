use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::StreamExt;
use notecheck_core::{context_window, locate_word, CheckStats, Issue};
use notecheck_hybrid::{CheckRequest, HybridChecker, NotecheckConfig, StreamEvent};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const CONTEXT_RADIUS: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "notecheck", version = VERSION, about = "Spelling and terminology checks for speaker notes")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print machine-readable JSON instead of a listing.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dictionary check only.
    Quick {
        /// Text file to check, or `-` for stdin.
        input: PathBuf,
        #[arg(long, value_delimiter = ',')]
        terms: Vec<String>,
    },
    /// Dictionary and model check, merged.
    Full {
        input: PathBuf,
        /// Slide text used as context for the model.
        #[arg(long)]
        slide: Option<PathBuf>,
        #[arg(long, value_delimiter = ',')]
        terms: Vec<String>,
        /// Print model findings as they arrive.
        #[arg(long, action = ArgAction::SetTrue)]
        stream: bool,
    },
    /// Ask the model which slide terms to treat as correct.
    Terms { input: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let config = NotecheckConfig::load(cli.config.as_deref())?;
    let checker = HybridChecker::from_config(&config)?;

    match cli.command {
        Commands::Quick { input, terms } => {
            let text = read_input(&input)?;
            let report = checker.quick_check(&text, &terms);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_issues(&text, &report.issues);
                print_stats(&report.stats);
            }
        }
        Commands::Full {
            input,
            slide,
            terms,
            stream,
        } => {
            let req = CheckRequest {
                speaker_notes: read_input(&input)?,
                slide_content: match slide {
                    Some(path) => read_input(&path)?,
                    None => String::new(),
                },
                terminology: terms,
            };
            if stream {
                run_stream(&checker, req, cli.json).await?;
            } else {
                let report = checker.full_check(&req).await;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    if report.fallback_mode {
                        eprintln!("warning: model unavailable, showing dictionary results only");
                    }
                    print_issues(&req.speaker_notes, &report.errors);
                    print_stats(&report.stats.deterministic);
                    if let Some(generative) = &report.stats.generative {
                        println!(
                            "model: {} findings, {} input / {} output tokens",
                            generative.error_count,
                            generative.usage.input_tokens,
                            generative.usage.output_tokens
                        );
                    }
                    println!("elapsed: {} ms", report.stats.total_time_ms);
                }
            }
        }
        Commands::Terms { input } => {
            let slide = read_input(&input)?;
            let terms = checker.extract_terminology(&slide).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&terms)?);
            } else {
                for term in terms {
                    println!("{term}");
                }
            }
        }
    }
    Ok(())
}

async fn run_stream(checker: &HybridChecker, req: CheckRequest, json: bool) -> Result<()> {
    let text = req.speaker_notes.clone();
    let mut events = checker.stream_check(req).await;
    while let Some(event) = events.next().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }
        match event {
            StreamEvent::Issue(issue) => {
                println!("+ {} -> {}", issue.word(), issue.suggestions().join(", "));
            }
            StreamEvent::Done(issues) => {
                println!();
                print_issues(&text, &issues);
            }
            StreamEvent::Failed(message) => {
                anyhow::bail!("stream failed: {message}");
            }
        }
    }
    Ok(())
}

fn print_issues(text: &str, issues: &[Issue]) {
    if issues.is_empty() {
        println!("no issues found");
        return;
    }
    for issue in issues {
        let suggestions = if issue.suggestions().is_empty() {
            "(no suggestion)".to_string()
        } else {
            issue.suggestions().join(", ")
        };
        println!(
            "{:<6} {} -> {}  [{}, {:?}, {:.2}] {}",
            issue.id().to_string(),
            issue.word(),
            suggestions,
            issue.kind().as_str(),
            issue.origin(),
            issue.confidence_score(),
            issue.reason()
        );
        if let Some(position) = issue.position().or_else(|| locate_word(text, issue.word())) {
            println!("       ...{}...", context_window(text, position, CONTEXT_RADIUS));
        }
    }
}

fn print_stats(stats: &CheckStats) {
    println!(
        "words: {} total, {} correct, {} misspelled ({} skipped, {} custom terms)",
        stats.total_words,
        stats.correct_words,
        stats.error_count,
        stats.skipped,
        stats.custom_term_matches
    );
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
