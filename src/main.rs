//! waterbear CLI: hybrid knowledge retrieval over space-biology publications.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use waterbear::corpus;
use waterbear::engine::{Engine, EngineConfig};
use waterbear::error::{ExtractError, WbError, WbResult};
use waterbear::ingest::SourceDocument;
use waterbear::intent::QueryIntent;

#[derive(Parser)]
#[command(name = "waterbear", version, about = "Hybrid knowledge retrieval engine")]
struct Cli {
    /// Engine configuration file (TOML). Defaults are used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Graph snapshot file. Loaded before the command if it exists; saved
    /// back after commands that change the graph.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Fusion weight for graph confidence versus vector similarity, in
    /// [0, 1]. Overrides the configured value.
    #[arg(long, global = true)]
    alpha: Option<f32>,

    /// Print machine-readable JSON instead of human-readable text
    /// (ingest, query, stats, info).
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file.
    Init {
        /// Where to write the config.
        #[arg(long, default_value = "waterbear.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Extract triples from text files into the knowledge graph.
    Ingest {
        /// Text files, one document each. The file stem becomes the
        /// document id.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a single question against the knowledge graph.
    Query {
        /// The question.
        question: String,
    },

    /// Interactive chat with conversation memory.
    Chat {
        /// Session identifier for conversation memory.
        #[arg(long, default_value = "default")]
        session: String,
    },

    /// Show knowledge graph statistics.
    Stats,

    /// Show engine info and collaborator availability.
    Info,

    /// Ingest the bundled sample corpus and run example queries.
    Demo,
}

const DEMO_QUESTIONS: &[&str] = &[
    "How does microgravity affect bone density?",
    "What is biofilm formation?",
    "Compare muscle atrophy and bone loss during spaceflight.",
];

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Init { path, force } = &cli.command {
        if path.exists() && !force {
            miette::bail!(
                "{} already exists, pass --force to overwrite",
                path.display()
            );
        }
        EngineConfig::default().save(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(alpha) = cli.alpha {
        config.retrieval.alpha = alpha;
    }

    let engine = Engine::new(config)?;

    if let Some(path) = &cli.snapshot {
        if path.exists() {
            let loaded = engine.load_snapshot(path)?;
            println!("Loaded {loaded} triples from {}", path.display());
        }
    }

    match cli.command {
        Commands::Init { .. } => unreachable!("handled before engine construction"),

        Commands::Ingest { files } => {
            let documents = files
                .iter()
                .map(|path| read_document(path))
                .collect::<WbResult<Vec<_>>>()?;

            let report = engine.ingest_batch(&documents);
            if cli.json {
                print_json(&report)?;
            } else {
                for outcome in &report.outcomes {
                    println!(
                        "  {} -> {} triples ({} chunks)",
                        outcome.document_id, outcome.triples_added, outcome.chunks
                    );
                }
                for skip in &report.skipped {
                    println!("  {} skipped: {}", skip.document_id, skip.reason);
                }
                println!("{report}");
            }
            save_snapshot_if_requested(&engine, cli.snapshot.as_deref())?;
        }

        Commands::Query { question } => {
            let response = engine.kg_query(&question);
            if cli.json {
                print_json(&response)?;
            } else {
                print_intent_line(&response.intent);
                println!();
                println!("{}", response.answer);
                if !response.top_triples.is_empty() {
                    println!();
                    println!("Top relationships ({} total):", response.relevant_triples_count);
                    for triple in &response.top_triples {
                        println!("  {triple}");
                    }
                }
            }
        }

        Commands::Chat { session } => {
            run_chat(&engine, &session)?;
        }

        Commands::Stats => {
            if cli.json {
                print_json(&engine.stats())?;
            } else {
                println!("{}", engine.stats());
            }
        }

        Commands::Info => {
            if cli.json {
                print_json(&engine.info())?;
            } else {
                println!("{}", engine.info());
            }
        }

        Commands::Demo => {
            let report = engine.ingest_batch(&corpus::bundled_documents());
            println!("{report}");
            for question in DEMO_QUESTIONS {
                println!();
                println!("Q: {question}");
                let response = engine.kg_query(question);
                print_intent_line(&response.intent);
                println!("{}", response.answer);
            }
            save_snapshot_if_requested(&engine, cli.snapshot.as_deref())?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).into_diagnostic()?
    );
    Ok(())
}

fn read_document(path: &Path) -> WbResult<SourceDocument> {
    let document_id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document")
        .to_string();
    let text = std::fs::read_to_string(path).map_err(|source| {
        WbError::from(ExtractError::Unreadable {
            document_id: document_id.clone(),
            source,
        })
    })?;
    Ok(SourceDocument::new(document_id, text))
}

fn print_intent_line(intent: &QueryIntent) {
    let entities: Vec<&str> = intent.entities.iter().map(String::as_str).collect();
    let mut line = format!(
        "Intent: {} (confidence {:.2})",
        intent.query_type, intent.confidence
    );
    if !entities.is_empty() {
        line.push_str(&format!(", entities: {}", entities.join(", ")));
    }
    if let Some(focus) = &intent.focus_area {
        line.push_str(&format!(", focus: {focus}"));
    }
    println!("{line}");
}

fn save_snapshot_if_requested(engine: &Engine, snapshot: Option<&Path>) -> Result<()> {
    if let Some(path) = snapshot {
        engine.save_snapshot(path)?;
        println!("Saved graph snapshot to {}", path.display());
    }
    Ok(())
}

fn run_chat(engine: &Engine, session: &str) -> Result<()> {
    println!("waterbear chat. Ask a question, or use 'stats', 'memory', 'clear', 'quit'.");
    let stdin = io::stdin();
    let mut out = io::stdout();

    loop {
        write!(out, "you> ").into_diagnostic()?;
        out.flush().into_diagnostic()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).into_diagnostic()? == 0 {
            break;
        }
        let line = line.trim();

        match line {
            "" => continue,
            "quit" | "exit" => break,
            "stats" => println!("{}", engine.stats()),
            "memory" => {
                let status = engine.memory_status(session);
                println!(
                    "memory: {} ({} turns stored)",
                    if status.memory_enabled {
                        "enabled"
                    } else {
                        "disabled"
                    },
                    status.conversation_length
                );
            }
            "clear" => {
                engine.clear_memory(session);
                println!("conversation memory cleared");
            }
            question => {
                let response = engine.ask(session, question);
                println!();
                println!("{}", response.answer);
                println!();
            }
        }
    }

    Ok(())
}
