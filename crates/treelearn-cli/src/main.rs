//! Treelearn CLI
//!
//! Interactive shell and scripted demo for exploring a topic as a tree of
//! conversations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use treelearn_core::{IntentOutcome, LearningSession, NodeId, OfflineGenerator, SessionConfig};

#[derive(Parser)]
#[command(name = "treelearn")]
#[command(about = "Treelearn - Explore a subject as a branching tree of conversations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive learning session
    Chat {
        /// Config file (default: <config dir>/treelearn/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Artificial generator latency in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },

    /// Run a scripted exploration and print the resulting tree
    Demo {
        /// Print the tree view as JSON
        #[arg(long)]
        json: bool,
    },
}

const HELP: &str = "\
Type a question to ask it. With a node selected, text goes to that node.

Commands:
  :tree                    Show the topic tree
  :select [index|none]     List nodes, select one by index, or clear
  :expand [title; title]   Add subtopics to the selected node
  :context                 Show the context sent for the selected node
  :view                    Print the render view as JSON
  :transcript              Show every message in order
  :stats                   Show generation statistics
  :help                    Show this help
  :quit                    Exit";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { config, latency_ms } => {
            let config = match config {
                Some(path) => SessionConfig::load_from(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => SessionConfig::load(),
            };
            init_tracing(&config.log_level);
            cmd_chat(config, latency_ms).await
        }
        Commands::Demo { json } => {
            init_tracing("warn");
            cmd_demo(json).await
        }
    }
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_chat(config: SessionConfig, latency_ms: u64) -> Result<()> {
    let generator = OfflineGenerator::with_latency(Duration::from_millis(latency_ms));
    let session = LearningSession::with_config(Arc::new(generator), config);
    tracing::debug!(latency_ms, "Chat session started");

    println!("Treelearn v{}", env!("CARGO_PKG_VERSION"));
    println!("Ask a question to start, or :help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> ", prompt_label(&session));
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.strip_prefix(':') {
            Some(command) => {
                if !run_command(&session, command)? {
                    break;
                }
            }
            None => submit_text(&session, line).await,
        }
    }

    Ok(())
}

fn prompt_label(session: &LearningSession) -> String {
    match session.selected() {
        Some(id) => session.with_tree(|tree| {
            tree.get(&id)
                .map(|node| node.title.clone())
                .unwrap_or_else(|| id.short())
        }),
        None if session.with_tree(|tree| tree.is_empty()) => "new".to_string(),
        None => "transcript".to_string(),
    }
}

async fn submit_text(session: &LearningSession, text: &str) {
    match session.submit(text, session.selected()).await {
        Ok(IntentOutcome::RootCreated(root)) => {
            let answer = session.with_tree(|tree| {
                tree.get(&root)
                    .and_then(|node| node.messages.last())
                    .map(|m| m.content.clone())
            });
            if let Some(answer) = answer {
                println!("{}", answer);
            }
            println!("✓ Root created. Use :expand to branch out.");
        }
        Ok(IntentOutcome::Replied(message)) => println!("{}", message.content),
        Ok(_) => {}
        Err(e) => println!("✗ {}", e),
    }
}

/// Run a `:` command. Returns false when the shell should exit.
fn run_command(session: &LearningSession, input: &str) -> Result<bool> {
    let (command, arg) = match input.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (input, ""),
    };

    match command {
        "tree" => {
            let selected = session.selected();
            let outline = session.with_tree(|tree| tree.outline(selected.as_ref()));
            if outline.is_empty() {
                println!("No tree yet. Ask a question first.");
            } else {
                print!("{}", outline);
            }
        }
        "select" => cmd_select(session, arg),
        "expand" => {
            let Some(node_id) = session.selected() else {
                println!("Select a node first.");
                return Ok(true);
            };
            let titles = if arg.is_empty() {
                None
            } else {
                Some(
                    arg.split(';')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect(),
                )
            };
            match session.expand_node(&node_id, titles) {
                Ok(children) => {
                    println!("✓ Added {} subtopics", children.len());
                    let selected = session.selected();
                    print!("{}", session.with_tree(|tree| tree.outline(selected.as_ref())));
                }
                Err(e) => println!("✗ {}", e),
            }
        }
        "context" => match session.selected() {
            Some(node_id) => match session.context_for(&node_id) {
                Ok(context) if context.is_empty() => println!("(empty)"),
                Ok(context) => println!("{}", context),
                Err(e) => println!("✗ {}", e),
            },
            None => println!("Select a node first."),
        },
        "view" => println!("{}", serde_json::to_string_pretty(&session.view())?),
        "transcript" => println!("{}", session.transcript_text()),
        "stats" => {
            let stats = session.metrics();
            let nodes = session.with_tree(|tree| tree.len());
            println!("  Nodes:       {}", nodes);
            println!(
                "  Generations: {} started, {} ok, {} failed",
                stats.generations_started, stats.generations_succeeded, stats.generations_failed
            );
            println!("  Busy:        {}", stats.busy_rejections);
            println!("  Avg Latency: {:.1}ms", stats.avg_latency_ms);
        }
        "help" | "h" => println!("{}", HELP),
        "quit" | "q" | "exit" => return Ok(false),
        other => println!("Unknown command :{} (try :help)", other),
    }

    Ok(true)
}

fn cmd_select(session: &LearningSession, arg: &str) {
    let nodes: Vec<(NodeId, String, usize)> = session.with_tree(|tree| {
        tree.nodes()
            .map(|node| (node.id, node.title.clone(), node.depth))
            .collect()
    });

    if arg.is_empty() {
        for (i, (_, title, depth)) in nodes.iter().enumerate() {
            println!("  [{}] {}{}", i, "  ".repeat(*depth), title);
        }
        return;
    }

    if arg == "none" {
        if let Err(e) = session.select_node(None) {
            println!("✗ {}", e);
        }
        return;
    }

    match arg.parse::<usize>().ok().and_then(|i| nodes.get(i)) {
        Some((id, title, _)) => match session.select_node(Some(*id)) {
            Ok(()) => println!("✓ Selected {}", title),
            Err(e) => println!("✗ {}", e),
        },
        None => println!("No node at index {:?} (use :select to list)", arg),
    }
}

async fn cmd_demo(json: bool) -> Result<()> {
    let session = LearningSession::new(Arc::new(OfflineGenerator::new()));

    let root = session
        .submit_root("How does recursion work in programming?")
        .await
        .context("Failed to create root")?;
    let topics = session
        .expand_node(&root, None)
        .context("Failed to expand root")?;
    let first = *topics.first().context("No topics suggested")?;
    let deeper = session
        .expand_node(&first, Some(vec!["Base Case".into(), "Call Stack".into()]))
        .context("Failed to expand topic")?;
    let deepest = *deeper.last().context("No subtopics created")?;

    session
        .submit_to_node(&first, "Can you give an example?")
        .await
        .context("Follow-up failed")?;
    session
        .submit_to_node(&deepest, "What happens when the stack runs out?")
        .await
        .context("Follow-up failed")?;
    session.select_node(Some(deepest))?;

    let context = session.context_for(&deepest)?;

    if json {
        let output = serde_json::json!({
            "view": session.view(),
            "context": context,
            "metrics": session.metrics(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Tree:");
    print!("{}", session.with_tree(|tree| tree.outline(Some(&deepest))));
    println!();
    println!("Context for deepest node:");
    println!("{}", context);
    println!();

    let layout = session.layout();
    let (width, height) = layout.canvas_size(&session.config().layout);
    println!("Layout ({:.0} x {:.0} canvas):", width, height);
    for node in session.view().nodes {
        println!(
            "  {:>7.1} {:>7.1}  {}",
            node.position.x, node.position.y, node.title
        );
    }

    Ok(())
}
