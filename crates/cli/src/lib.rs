use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use gitreader_graph::{
    parse_layout_mode, DirectorySource, GraphSession, GraphSource, GraphView, HeadlessCanvas,
    NodeStatus, Preferences, ViewConfig,
};
use gitreader_protocol::{
    payload_schema, serialize_json, EdgeKind, GraphLayoutMode, TourStep, FULL_SCOPE,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod http_source;

pub use http_source::HttpSource;

type DynSource = Arc<dyn GraphSource>;
type HeadlessSession = GraphSession<DynSource, HeadlessCanvas>;

#[derive(Parser)]
#[command(name = "gitreader-graph")]
#[command(about = "Build and inspect gitreader graph views from the command line", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// View tunables (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding graph.json and per-scope <scope>.json payloads
    #[arg(long, global = true, conflicts_with = "url")]
    dir: Option<PathBuf>,

    /// Base URL of a running analysis service
    #[arg(long, global = true)]
    url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a view for a scope or chapter and print it with its status
    View(ViewArgs),

    /// Render one guided tour step
    Tour(TourArgs),

    /// Read or write the persisted layout preference
    Layout(LayoutArgs),

    /// Print the JSON Schema of the graph payload a source must serve
    Schema,
}

#[derive(Args)]
struct ViewArgs {
    /// Scope to load
    #[arg(long, default_value = FULL_SCOPE)]
    scope: String,

    /// Chapter id (`group:<folder>`, `story:<id>`, ...); overrides --scope
    #[arg(long)]
    chapter: Option<String>,

    /// Layout mode: cluster|layer|free (defaults to the saved preference)
    #[arg(long)]
    layout: Option<GraphLayoutMode>,

    /// Preferences file consulted when --layout is absent
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Expand a folder cluster or file (repeatable)
    #[arg(long = "expand")]
    expand: Vec<String>,

    /// Hide external dependency nodes
    #[arg(long)]
    hide_external: bool,

    /// Edge kinds to show (repeatable; default: all)
    #[arg(long = "edge")]
    edges: Vec<EdgeKind>,

    /// Number of "reveal more" steps to apply
    #[arg(long, default_value_t = 0)]
    reveal: usize,

    /// Node to select
    #[arg(long)]
    select: Option<String>,

    /// Node whose neighborhood to isolate
    #[arg(long)]
    focus: Option<String>,
}

#[derive(Args)]
struct TourArgs {
    #[arg(long, default_value = FULL_SCOPE)]
    scope: String,

    /// Node ids the step allows (repeatable)
    #[arg(long = "allowed", required = true)]
    allowed: Vec<String>,

    /// Step node; defaults to the first allowed id
    #[arg(long)]
    node: Option<String>,

    #[arg(long)]
    layout: Option<GraphLayoutMode>,
}

#[derive(Args)]
struct LayoutArgs {
    #[command(subcommand)]
    action: LayoutAction,
}

#[derive(Subcommand)]
enum LayoutAction {
    /// Print the saved layout mode
    Get {
        #[arg(long)]
        prefs: PathBuf,
    },
    /// Save a layout mode
    Set {
        mode: String,
        #[arg(long)]
        prefs: PathBuf,
    },
}

#[derive(Serialize)]
struct ViewOutput<'a> {
    layout: GraphLayoutMode,
    view: &'a GraphView,
    status: &'a NodeStatus,
    visible_node_ids: Vec<&'a str>,
    visible_edge_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus: Option<&'a str>,
}

#[derive(Serialize)]
struct TourOutput<'a> {
    step: &'a TourStep,
    status: &'a NodeStatus,
    visible_node_ids: Vec<&'a str>,
    visible_edge_ids: Vec<&'a str>,
}

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ViewConfig> {
    match path {
        Some(path) => ViewConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ViewConfig::default()),
    }
}

fn build_source(dir: Option<PathBuf>, url: Option<String>) -> Result<DynSource> {
    match (dir, url) {
        (Some(dir), _) => {
            if !dir.is_dir() {
                bail!("Graph directory not found: {}", dir.display());
            }
            Ok(Arc::new(DirectorySource::new(dir)))
        }
        (None, Some(url)) => Ok(Arc::new(HttpSource::new(&url)?)),
        (None, None) => bail!("Either --dir or --url is required"),
    }
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::View(args) => {
            let source = build_source(cli.dir, cli.url)?;
            run_view(args, source, config).await?
        }
        Commands::Tour(args) => {
            let source = build_source(cli.dir, cli.url)?;
            run_tour(args, source, config).await?
        }
        Commands::Layout(args) => run_layout(args)?,
        Commands::Schema => print_stdout(&serialize_json(&payload_schema()?)?)?,
    }

    Ok(())
}

async fn run_view(args: ViewArgs, source: DynSource, config: ViewConfig) -> Result<()> {
    let layout = match (args.layout, &args.prefs) {
        (Some(layout), _) => layout,
        (None, Some(prefs)) => Preferences::load_or_default(prefs).layout_mode,
        (None, None) => GraphLayoutMode::default(),
    };

    let mut session: HeadlessSession = GraphSession::new(source, HeadlessCanvas::new(), config);
    session.set_layout_mode(layout);
    if !args.edges.is_empty() {
        session
            .controller_mut()
            .set_edge_filters(args.edges.iter().copied());
    }
    if args.hide_external {
        session.toggle_external_nodes();
    }

    let loaded = match &args.chapter {
        Some(chapter) => session.load_chapter(chapter).await,
        None => session.load_scope(&args.scope).await,
    };
    loaded.context("Failed to load graph")?;

    for id in &args.expand {
        if !session.expansion().is_expanded(id) {
            session.toggle_cluster_expansion(id);
        }
    }
    for _ in 0..args.reveal {
        if !session.reveal_more() {
            break;
        }
    }
    if let Some(select) = &args.select {
        session.select_node(Some(select));
    }
    if let Some(focus) = &args.focus {
        session.select_node(Some(focus));
        if !session.focus_selected() {
            log::warn!("Focus target {focus} is not visible");
        }
    }

    let controller = session.controller();
    let output = ViewOutput {
        layout,
        view: session.view(),
        status: session.node_status(),
        visible_node_ids: controller.visible_node_ids(),
        visible_edge_count: controller.visible_edge_ids().len(),
        focus: controller.focus_node(),
    };
    print_stdout(&serialize_json(&output)?)
}

async fn run_tour(args: TourArgs, source: DynSource, config: ViewConfig) -> Result<()> {
    let mut session: HeadlessSession = GraphSession::new(source, HeadlessCanvas::new(), config);
    session.set_layout_mode(args.layout.unwrap_or(GraphLayoutMode::Free));
    session
        .load_scope(&args.scope)
        .await
        .context("Failed to load graph")?;

    let node_id = args
        .node
        .clone()
        .or_else(|| args.allowed.first().cloned())
        .unwrap_or_default();
    let step = TourStep {
        step_index: 0,
        total_steps: None,
        node_id,
        allowed_node_ids: args.allowed.clone(),
        focus: None,
    };
    session.start_tour_step(&step);

    let controller = session.controller();
    let output = TourOutput {
        step: &step,
        status: session.node_status(),
        visible_node_ids: controller.visible_node_ids(),
        visible_edge_ids: controller.visible_edge_ids(),
    };
    print_stdout(&serialize_json(&output)?)
}

fn run_layout(args: LayoutArgs) -> Result<()> {
    let prefs = match args.action {
        LayoutAction::Get { prefs } => Preferences::load_or_default(&prefs),
        LayoutAction::Set { mode, prefs: path } => {
            let prefs = Preferences {
                layout_mode: parse_layout_mode(&mode)?,
            };
            prefs
                .save(&path)
                .with_context(|| format!("Failed to save preferences {}", path.display()))?;
            log::info!("Saved layout mode {}", prefs.layout_mode);
            prefs
        }
    };
    print_stdout(&serialize_json(&prefs)?)
}
