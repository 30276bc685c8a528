use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing::info;

use mythsearch_cli::repl::{self, Command as ReplCommand, Repl};
use mythsearch_cli::{init_logging, render};
use mythsearch_core::config::Config;
use mythsearch_core::types::{FilterSpec, ALL};
use mythsearch_engine::{Action, Response, SearchService};

const CLI_SESSION: &str = "cli";
const REPL_SESSION: &str = "repl";

/// Semantic search over folklore stories.
#[derive(Parser, Debug)]
#[command(name = "mythsearch", author, version, about, long_about = None)]
struct Cli {
    /// Configuration environment (selects config.<env>.toml).
    #[arg(short, long, env = "RUST_ENV")]
    env: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one search and print a page of results.
    Search {
        /// Free-text query.
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long, default_value = ALL)]
        continent: String,
        #[arg(long, default_value = ALL)]
        culture: String,
        #[arg(long, default_value = ALL)]
        creature: String,
        /// 1-based page to show.
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the continents, cultures and creatures present in the corpus.
    Facets {
        #[arg(long)]
        json: bool,
    },
    /// Print the full text of a story by id.
    Read {
        id: usize,
        #[arg(long)]
        json: bool,
    },
    /// Interactive search (the default).
    Repl,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = Config::load_for_env(cli.env.as_deref()).context("loading configuration")?;
    let service = Arc::new(SearchService::from_config(&config).context("loading story corpus")?);
    info!(stories = service.corpus().len(), "ready");
    let rt = Runtime::new()?;

    match cli.command.unwrap_or(Command::Repl) {
        Command::Search { query, continent, culture, creature, page, json } => {
            let filters = FilterSpec::from_selections(&continent, &culture, &creature);
            let mut resp = request(&rt, &service, CLI_SESSION, Action::Search { query: query.join(" "), filters })?;
            if page > 1 {
                resp = request(&rt, &service, CLI_SESSION, Action::GoTo { page })?;
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else if let Some(view) = &resp.page {
                print!("{}", render::page(view));
            }
        }
        Command::Facets { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(service.filter_options())?);
            } else {
                print!("{}", render::facets(service.filter_options()));
            }
        }
        Command::Read { id, json } => {
            let view = service.read_story(id);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", render::story(&view));
            }
        }
        Command::Repl => run_repl(&rt, &service)?,
    }
    Ok(())
}

fn request(rt: &Runtime, service: &Arc<SearchService>, session: &str, action: Action) -> anyhow::Result<Response> {
    let timeout = service.options().timeout;
    Ok(rt.block_on(service.handle_with_timeout(session, action, timeout))?)
}

fn run_repl(rt: &Runtime, service: &Arc<SearchService>) -> anyhow::Result<()> {
    println!("{}", repl::HELP);
    println!("📊 {} stories loaded", service.corpus().len());
    let mut state = Repl::default();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("\nsearch> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let Some(command) = repl::parse(&line?) else { continue };

        match &command {
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", repl::HELP),
            ReplCommand::Facets => print!("{}", render::facets(service.filter_options())),
            ReplCommand::ShowFilters => println!("{}", render::filters(state.filters())),
            _ => {}
        }
        let action = match state.action(&command) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(msg) => {
                println!("❌ {msg}");
                continue;
            }
        };
        match request(rt, service, REPL_SESSION, action) {
            Ok(resp) => {
                state.observe(&resp);
                match (&resp.story, &resp.page) {
                    (Some(story), _) => print!("{}", render::story(story)),
                    (None, Some(page)) => print!("{}", render::page(page)),
                    (None, None) => {}
                }
            }
            Err(e) => println!("❌ Search failed: {e:#}"),
        }
    }
    println!("👋 Goodbye!");
    Ok(())
}
