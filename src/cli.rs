use crate::resolver::MemoryLocator;
use crate::server::{self, ServerConfig, DEFAULT_PORT};
use crate::staging::{self, Summary};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{info, warn};

/// Serve the memory knowledge graph visualizer over HTTP.
///
/// Finds memory.json (the given path, then ./memory.json, ~/memory.json,
/// ~/code/memory.json, ~/.config/claude/memory.json), copies it next to the
/// visualizer assets in the current directory, and serves that directory.
///
///   memviz                        default port 8021, auto-find memory.json
///   memviz 3000                   custom port, auto-find memory.json
///   memviz ~/my-memory.json       default port, custom file
///   memviz 3000 ~/my-memory.json  custom port and file
#[derive(Parser)]
#[command(author, version, about, verbatim_doc_comment)]
pub struct Cli {
    #[arg(
        value_name = "PORT|PATH",
        allow_hyphen_values = true,
        trailing_var_arg = true,
        help = "An all-digit token is the port, anything else is the memory file path")]
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeArgs {
    pub port: u64,
    pub memory_path: Option<String>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            memory_path: None,
        }
    }
}

impl ServeArgs {
    /// All-digit tokens set the port, any other token sets the path. Last one wins.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = Self::default();

        for token in tokens {
            let token = token.as_ref();
            if is_port_token(token) {
                args.port = token.parse().unwrap_or(u64::MAX);
            } else {
                args.memory_path = Some(token.to_string());
            }
        }

        args
    }
}

fn is_port_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Resolves, stages, and summarizes the memory file under `root`.
pub fn prepare(root: &Path, locator: &MemoryLocator, custom_path: Option<&str>) -> Result<Option<Summary>> {
    let resolved = locator.resolve(custom_path);
    staging::stage(resolved.as_deref(), locator.local_path())?;

    let summary = match staging::summarize(locator.local_path()) {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Could not summarize memory file: {:#}", e);
            println!("Could not read memory file: {:#}", e);
            Some(Summary::default())
        }
    };

    if let Some(summary) = summary {
        println!(
            "Knowledge Graph: {} entities, {} relations",
            summary.entities, summary.relations
        );
    }

    info!("Prepared {}", root.display());
    Ok(summary)
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let args = ServeArgs::from_tokens(&cli.tokens);

    println!("Memory Knowledge Graph Visualizer");
    println!("{}", "=".repeat(50));

    let root = std::env::current_dir().context("Failed to determine the working directory")?;
    let locator = MemoryLocator::new(&root);
    prepare(&root, &locator, args.memory_path.as_deref())?;

    server::run(ServerConfig { port: args.port, root }).await
}
