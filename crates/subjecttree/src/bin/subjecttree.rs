use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use subjecttree::{presets, MoreChildrenOutcome, Preferences, Session};
use subjecttree_ai::{LLMProviderFactory, LlmTreeFetcher, TreeFetcher};
use subjecttree_core::{
    import_json, ConfigManager, LoggingConfig, SubjectTreeConfig, SubjectTreeError,
    SUPPORTED_PROVIDERS,
};
use subjecttree_render::{LayoutMode, Marker};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, Registry};

#[derive(Parser)]
#[command(
    name = "subjecttree",
    version,
    author,
    about = "SubjectTree - map any field of study with an LLM",
    long_about = "SubjectTree asks a language model for the hierarchy of subjects in a field of study, shows it as a collapsible tree and grows any node on request."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(
        long,
        global = true,
        help = "Capture logs to a file under ~/.subjecttree/logs"
    )]
    debug: bool,

    #[arg(long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Generate the subject tree for a field of study")]
    Generate {
        #[arg(help = "Field of study, e.g. \"Algebra\"")]
        field: String,

        #[arg(long, help = "Provider for this run (overrides config and preferences)")]
        provider: Option<String>,

        #[arg(long, help = "Model for this run")]
        model: Option<String>,

        #[arg(long, value_parser = parse_layout, help = "Layout: tree or list")]
        layout: Option<LayoutMode>,

        #[arg(long, help = "Expand every node before printing")]
        expand_all: bool,

        #[arg(short, long, help = "Show node descriptions")]
        descriptions: bool,

        #[arg(long, help = "Write the tree as JSON")]
        json: Option<PathBuf>,

        #[arg(long, help = "Write the diagram as SVG")]
        svg: Option<PathBuf>,
    },

    #[command(about = "Generate more children for one node of a saved tree")]
    More {
        #[arg(help = "Tree JSON file written by 'generate --json'")]
        tree: PathBuf,

        #[arg(help = "Node path, e.g. \"Algebra/Linear Algebra\"")]
        node: String,

        #[arg(long, help = "Field of study (defaults to the root name)")]
        field: Option<String>,

        #[arg(long, help = "Provider for this run")]
        provider: Option<String>,

        #[arg(long, help = "Model for this run")]
        model: Option<String>,
    },

    #[command(about = "Print a saved tree")]
    Show {
        #[arg(help = "Tree JSON file")]
        tree: PathBuf,

        #[arg(long, help = "Expand every node before printing")]
        expand_all: bool,

        #[arg(short, long, help = "Show node descriptions")]
        descriptions: bool,

        #[arg(long, value_parser = parse_layout, help = "Layout: tree or list")]
        layout: Option<LayoutMode>,

        #[arg(long, help = "Write the diagram as SVG")]
        svg: Option<PathBuf>,
    },

    #[command(about = "Generate a tree and explore it interactively")]
    Explore {
        #[arg(help = "Field of study")]
        field: String,

        #[arg(long, help = "Provider for this run")]
        provider: Option<String>,

        #[arg(long, help = "Model for this run")]
        model: Option<String>,
    },

    #[command(about = "List the preset fields of study")]
    Fields,

    #[command(about = "Remember a provider (and optionally a model) for future runs")]
    Provider {
        #[arg(help = "anthropic, openai, openai-compatible, ollama or lmstudio")]
        name: String,

        #[arg(long, help = "Model to use with this provider")]
        model: Option<String>,
    },

    #[command(about = "Write a default configuration file")]
    InitConfig {
        #[arg(help = "Destination (default: ./.subjecttree.toml)")]
        path: Option<PathBuf>,
    },
}

fn parse_layout(value: &str) -> std::result::Result<LayoutMode, String> {
    value.parse().map_err(|e: SubjectTreeError| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<SubjectTreeError>() {
            Some(e) => eprintln!("{} {}", "Error:".red().bold(), e.user_message()),
            None => eprintln!("{} {:#}", "Error:".red().bold(), err),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_mgr = match &cli.config {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;
    let config = config_mgr.config();

    init_logging(&config.logging, cli.verbose, cli.debug)?;
    if let Some(path) = config_mgr.config_path() {
        info!("Using configuration from {}", path.display());
    }

    match cli.command {
        Commands::Generate {
            field,
            provider,
            model,
            layout,
            expand_all,
            descriptions,
            json,
            svg,
        } => {
            let session = new_session(config, provider, model)?;
            if let Some(mode) = layout {
                session.set_layout(mode);
            }
            let field = presets::find(&field).map(str::to_string).unwrap_or(field);
            generate_with_spinner(&session, &field).await?;
            if expand_all {
                session.expand_all();
            }
            print_outline(&session, descriptions);
            export(&session, json.as_deref(), svg.as_deref())?;
        }
        Commands::More {
            tree,
            node,
            field,
            provider,
            model,
        } => {
            handle_more(config, &tree, &node, field.as_deref(), provider, model).await?;
        }
        Commands::Show {
            tree,
            expand_all,
            descriptions,
            layout,
            svg,
        } => {
            let session = Session::from_config(Arc::new(OfflineFetcher), &config.render)?;
            session.load(import_json(&tree)?, None);
            if let Some(mode) = layout {
                session.set_layout(mode);
            }
            if expand_all {
                session.expand_all();
            }
            print_outline(&session, descriptions);
            export(&session, None, svg.as_deref())?;
        }
        Commands::Explore {
            field,
            provider,
            model,
        } => {
            let session = Arc::new(new_session(config, provider, model)?);
            let field = presets::find(&field).map(str::to_string).unwrap_or(field);
            generate_with_spinner(&session, &field).await?;
            explore(session).await?;
        }
        Commands::Fields => {
            println!("{}", "Preset fields of study".cyan().bold());
            for field in presets::FIELDS {
                println!("  {}", field);
            }
        }
        Commands::Provider { name, model } => {
            let name = name.to_lowercase();
            if !SUPPORTED_PROVIDERS.contains(&name.as_str()) {
                bail!(
                    "Unknown provider '{}'. Choose one of: {}",
                    name,
                    SUPPORTED_PROVIDERS.join(", ")
                );
            }
            let prefs = Preferences {
                provider: Some(name.clone()),
                model,
            };
            let path = prefs.save()?;
            println!("✓ Provider set to {}", name.green());
            println!("  Saved to {}", path.display());
            if ConfigManager::provider_from_env() {
                println!(
                    "{}",
                    "  Note: SUBJECTTREE_LLM_PROVIDER is set and takes precedence".yellow()
                );
            }
        }
        Commands::InitConfig { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(".subjecttree.toml"));
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            ConfigManager::create_default_config(&path)?;
            println!("✓ Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool, debug_log: bool) -> Result<()> {
    let env_filter = || {
        if verbose {
            EnvFilter::new("subjecttree=debug,subjecttree_core=debug,subjecttree_ai=debug,subjecttree_render=debug,info")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
        }
    };

    let json = logging.format == "json";
    let json_layer = json.then(|| fmt::layer().json().with_writer(io::stderr));
    let pretty_layer = (!json).then(|| fmt::layer().with_writer(io::stderr));

    let file_layer = if debug_log {
        let (file, log_path) = prepare_debug_log()?;
        eprintln!("{} {}", "📝 Debug log:".cyan(), log_path.display());
        Some(
            fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false),
        )
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(env_filter())
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
    Ok(())
}

fn prepare_debug_log() -> Result<(File, PathBuf)> {
    let log_dir = ConfigManager::user_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S");
    let log_path = log_dir.join(format!("subjecttree-debug-{}.log", timestamp));
    let file = File::create(&log_path)?;
    Ok((file, log_path))
}

fn new_session(
    config: &SubjectTreeConfig,
    provider: Option<String>,
    model: Option<String>,
) -> Result<Session> {
    let mut llm = config.llm.clone();
    match Preferences::load() {
        Ok(prefs) => prefs.apply(&mut llm, ConfigManager::provider_from_env()),
        Err(e) => warn!("Ignoring saved preferences: {}", e),
    }
    if let Some(provider) = provider {
        if provider != llm.provider {
            llm.model = None;
        }
        llm.provider = provider.to_lowercase();
    }
    if model.is_some() {
        llm.model = model;
    }

    let provider = LLMProviderFactory::create_from_config(&llm)?;
    let generation = LLMProviderFactory::generation_config(&llm);
    info!(
        "Using {} ({})",
        provider.provider_name(),
        provider.model_name()
    );
    let fetcher = Arc::new(LlmTreeFetcher::new(provider, generation));
    Ok(Session::from_config(fetcher, &config.render)?)
}

fn spinner(message: String) -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn generate_with_spinner(session: &Session, field: &str) -> Result<()> {
    let pb = spinner(format!(
        "Generating subject tree for {} with {}",
        field.bold(),
        session.fetcher().describe()
    ));
    let result = session.generate(field).await;
    pb.finish_and_clear();
    let frame = result?;
    println!(
        "✓ Generated {} ({} nodes)",
        field.green().bold(),
        session.snapshot().map(|t| t.size()).unwrap_or(frame.nodes.len())
    );
    Ok(())
}

async fn handle_more(
    config: &SubjectTreeConfig,
    tree_path: &Path,
    node: &str,
    field: Option<&str>,
    provider: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let session = new_session(config, provider, model)?;
    session.load(import_json(tree_path)?, field);
    let id = session
        .resolve(node)
        .ok_or_else(|| SubjectTreeError::NodeNotFound(node.to_string()))?;

    let pb = spinner(format!("Generating more children for {}", id.to_string().bold()));
    let outcome = session.request_more_children(&id).await;
    pb.finish_and_clear();

    match outcome? {
        MoreChildrenOutcome::Merged { added, dropped, .. } => {
            print_merge(&id.to_string(), &added, &dropped);
            session.export_json(tree_path)?;
            println!("  Updated {}", tree_path.display());
            print_outline(&session, false);
        }
        MoreChildrenOutcome::AlreadyPending => println!("A request for {} is already running", id),
        MoreChildrenOutcome::Stale => println!("The tree changed; result for {} discarded", id),
    }
    Ok(())
}

fn print_merge(target: &str, added: &[String], dropped: &[String]) {
    if added.is_empty() {
        println!("No new children for {}", target.bold());
    } else {
        println!("✓ {} new children for {}", added.len(), target.bold());
    }
    for name in added {
        println!("  {} {}", "+".green(), name);
    }
    for name in dropped {
        println!("  {} {} {}", "=".yellow(), name, "(already present)".dimmed());
    }
}

fn print_outline(session: &Session, descriptions: bool) {
    for line in session.outline_lines() {
        let marker = match line.marker {
            Marker::Leaf => line.marker.symbol().dimmed(),
            _ => line.marker.symbol().cyan(),
        };
        let name = if line.depth == 0 {
            line.name.bold()
        } else {
            line.name.normal()
        };
        let mut out = format!("{}{} {}", "  ".repeat(line.depth), marker, name);
        if line.hidden_children > 0 {
            out.push_str(&format!(" {}", format!("({})", line.hidden_children).dimmed()));
        }
        if line.pending {
            out.push_str(&format!(" {}", "…".yellow()));
        }
        if descriptions {
            if let Some(description) = &line.description {
                out.push_str(&format!(" {}", format!("- {}", description).dimmed()));
            }
        }
        println!("{}", out);
    }
}

fn export(session: &Session, json: Option<&Path>, svg: Option<&Path>) -> Result<()> {
    if let Some(path) = json {
        session.export_json(path)?;
        println!("✓ Tree written to {}", path.display());
    }
    if let Some(path) = svg {
        session.export_svg(path)?;
        println!("✓ Diagram written to {}", path.display());
    }
    Ok(())
}

const EXPLORE_HELP: &str = "Commands:
  more <path>          generate more children for a node (runs in the background)
  toggle <path>        expand or collapse a node
  expand-all           expand every node
  collapse-all         collapse everything below the root
  layout tree|list     switch layout
  show                 print the tree
  export <file.json>   save the tree
  svg <file.svg>       save the diagram
  quit                 wait for running requests and exit";

async fn explore(session: Arc<Session>) -> Result<()> {
    print_outline(&session, false);
    println!("{}", EXPLORE_HELP.dimmed());

    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".cyan().bold());
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "quit" | "exit" => break,
            "help" => println!("{}", EXPLORE_HELP),
            "show" => print_outline(&session, true),
            "expand-all" => {
                session.expand_all();
                print_outline(&session, false);
            }
            "collapse-all" => {
                session.collapse_all();
                print_outline(&session, false);
            }
            "layout" => match arg.parse::<LayoutMode>() {
                Ok(mode) => {
                    session.set_layout(mode);
                    println!("Layout: {}", mode);
                }
                Err(e) => println!("{}", e.to_string().red()),
            },
            "toggle" => match session.resolve(arg) {
                Some(id) if session.toggle(&id) => print_outline(&session, false),
                Some(id) => println!("{} cannot change right now", id),
                None => println!("{}", format!("No node at '{}'", arg).red()),
            },
            "more" => match session.resolve(arg) {
                Some(id) => {
                    let session = Arc::clone(&session);
                    println!("… asking for more children of {}", id);
                    tasks.spawn(async move {
                        match session.request_more_children(&id).await {
                            Ok(MoreChildrenOutcome::Merged { added, dropped, .. }) => {
                                println!();
                                print_merge(&id.to_string(), &added, &dropped);
                            }
                            Ok(MoreChildrenOutcome::AlreadyPending) => {
                                println!("{} is already waiting for children", id);
                            }
                            Ok(MoreChildrenOutcome::Stale) => {
                                println!("Discarded result for {}: the tree changed", id);
                            }
                            Err(e) => {
                                println!();
                                println!("{} {}", "Error:".red().bold(), e.user_message());
                            }
                        }
                    });
                }
                None => println!("{}", format!("No node at '{}'", arg).red()),
            },
            "export" if !arg.is_empty() => match session.export_json(Path::new(arg)) {
                Ok(()) => println!("✓ Tree written to {}", arg),
                Err(e) => println!("{} {}", "Error:".red().bold(), e.user_message()),
            },
            "svg" if !arg.is_empty() => match session.export_svg(Path::new(arg)) {
                Ok(()) => println!("✓ Diagram written to {}", arg),
                Err(e) => println!("{} {}", "Error:".red().bold(), e.user_message()),
            },
            other => println!("Unknown command '{}'. Type 'help'.", other),
        }

        // Reap finished requests so their handles do not pile up.
        while tasks.try_join_next().is_some() {}
    }

    if !tasks.is_empty() {
        println!("Waiting for {} running request(s)...", tasks.len());
        while tasks.join_next().await.is_some() {}
    }
    Ok(())
}

/// Fetcher for commands that only read saved trees.
struct OfflineFetcher;

#[async_trait::async_trait]
impl TreeFetcher for OfflineFetcher {
    async fn fetch(&self, _scope: &subjecttree_ai::FetchScope) -> subjecttree_core::Result<String> {
        Err(SubjectTreeError::Configuration(
            "this command does not contact a provider".to_string(),
        ))
    }

    fn describe(&self) -> String {
        "offline".to_string()
    }
}
