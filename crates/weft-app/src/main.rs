//! Weft application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Load the pattern catalog (built-in set when no directory is configured)
//! 3. Build the HTTP generation backend, executor and session store
//! 4. Run one subcommand against the flow controller

mod cli;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use weft_core::{UserId, WeftConfig};
use weft_engine::{
    EngineError, FlowController, FlowReply, HttpBackend, InteractionType, MemoryStore,
    PatternAdvisor, PatternExecutor, SessionStore, Suggestion, TextExporter,
};
use weft_patterns::PatternCatalog;

use cli::{CliArgs, Command};

type AppResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> AppResult {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config = WeftConfig::load_or_default(&config_file);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.resolve_log_level(&config))),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Weft v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let patterns_dir = args.resolve_patterns_dir(&config);
    let catalog = Arc::new(PatternCatalog::load_or_empty(patterns_dir.as_deref()));
    tracing::info!(patterns = catalog.len(), "Pattern catalog ready");

    let backend = Arc::new(HttpBackend::from_env(
        config.backend.endpoint.clone(),
        &config.backend.api_key_env,
    ));
    tracing::info!(endpoint = %backend.endpoint(), models = ?config.backend.models, "Generation backend configured");

    let executor = Arc::new(PatternExecutor::new(backend, Arc::clone(&catalog), &config));
    let memory = Arc::new(MemoryStore::new());
    let store = SessionStore::new(memory.clone(), config.session.ttl());
    let controller = FlowController::new(
        Arc::clone(&executor),
        store,
        Arc::new(TextExporter),
        &config,
    );

    match args.command {
        Command::Patterns => {
            print_patterns(&catalog);
            Ok(())
        }
        Command::Run { pattern, input, all } => {
            let text = read_input(input.as_deref())?;
            let user = UserId::new("local");
            let reply = controller
                .run(&user, &text, &pattern, all)
                .await
                .map_err(report)?;
            print_all_pages(&controller, &user, reply).await
        }
        Command::Suggest { input, interaction } => {
            let text = read_input(input.as_deref())?;
            let advisor = PatternAdvisor::new(executor);
            match advisor.suggest(&text, None, interaction).await.map_err(report)? {
                Some(Suggestion::Ranked(ranked)) => {
                    println!("{} ({:.0}%)", ranked.pattern, ranked.confidence * 100.0);
                    if !ranked.reasoning.is_empty() {
                        println!("{}", ranked.reasoning);
                    }
                    if let Some(requested) = &ranked.fallback_from {
                        println!("(substituted for unknown pattern {})", requested);
                    }
                    if !ranked.alternatives.is_empty() {
                        println!("Alternatives: {}", ranked.alternatives.join(", "));
                    }
                }
                Some(Suggestion::Executed(executed)) => {
                    println!("Ran {} on request:\n", executed.pattern);
                    println!("{}", executed.output);
                }
                None => println!("No suggestion."),
            }
            Ok(())
        }
        Command::Session {
            input,
            user,
            out_dir,
        } => {
            let text = read_input(Some(input.as_path()))?;
            run_session(&controller, &memory, &UserId::new(user), &text, &out_dir).await
        }
    }
}

/// Read a file, or stdin when no path is given.
fn read_input(path: Option<&Path>) -> Result<String, std::io::Error> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn report(e: EngineError) -> Box<dyn std::error::Error> {
    tracing::error!(error = %e, "Pattern operation failed");
    e.user_message().into()
}

fn print_patterns(catalog: &PatternCatalog) {
    if catalog.is_empty() {
        println!("No patterns available.");
        return;
    }
    for category in catalog.categories() {
        println!("{}", category.label());
        for pattern in catalog.patterns_in(category) {
            println!("  {:<24} {}", pattern.name, pattern.description);
        }
    }
}

fn print_reply(reply: &FlowReply) {
    for page in &reply.pages {
        println!("{}\n", page);
    }
    if let Some(position) = reply.position {
        if position.total > 1 {
            println!("[page {}]", position);
        }
    }
    if let Some(menu) = &reply.menu {
        println!("{}:", menu.title);
        for (i, option) in menu.options.iter().enumerate() {
            println!("  {}) {}  [{}]", i + 1, option.label, option.token);
        }
        if menu.total_pages > 1 {
            println!("  (menu page {}/{})", menu.page + 1, menu.total_pages);
        }
    }
}

/// Print the first page, then page through the rest of the result.
async fn print_all_pages(controller: &FlowController, user: &UserId, first: FlowReply) -> AppResult {
    let mut reply = first;
    loop {
        for page in &reply.pages {
            println!("{}", page);
        }
        match reply.position {
            Some(p) if p.index + 1 < p.total => {
                reply = controller.handle(user, "chunk:next").await.map_err(report)?;
            }
            _ => return Ok(()),
        }
    }
}

async fn run_session(
    controller: &FlowController,
    memory: &MemoryStore,
    user: &UserId,
    text: &str,
    out_dir: &Path,
) -> AppResult {
    let reply = controller
        .start(user, text, InteractionType::Chat)
        .await
        .map_err(report)?;
    print_reply(&reply);
    let mut menu = reply.menu;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        // A number picks the matching option of the last menu.
        let token = match (line.parse::<usize>(), &menu) {
            (Ok(n), Some(m)) if n >= 1 && n <= m.options.len() => m.options[n - 1].token.clone(),
            _ => line.to_string(),
        };

        memory.purge_expired();
        match controller.handle(user, &token).await {
            Ok(reply) => {
                print_reply(&reply);
                if let Some(artifact) = &reply.artifact {
                    let path = artifact.write_to(out_dir).map_err(report)?;
                    println!("Saved {}", path.display());
                }
                if reply.terminal {
                    break;
                }
                menu = reply.menu;
            }
            Err(e) => {
                tracing::warn!(token = %token, error = %e, "Action failed");
                println!("{}", e.user_message());
            }
        }
    }

    controller.clear(user).map_err(report)?;
    Ok(())
}
