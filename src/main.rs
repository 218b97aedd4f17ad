//! ucg CLI entry point

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ucg_engine::cli::{AnalyzeArgs, ChainsArgs, Cli, Commands, NeighborsArgs, QueryArgs};
use ucg_engine::{
    AnalysisParams, BuildRequest, BuildResponse, ChainRequest, EdgeType, Engine, EngineConfig, GraphError,
    NeighborhoodRequest, RequestOptions, Result,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run(cli: &Cli) -> Result<String> {
    let config = EngineConfig::load_or_default(cli.config.as_deref())?;
    init_logging(cli, &config);
    let engine = Engine::new(config);

    match &cli.command {
        Commands::Build(args) => {
            let built = build(&engine, cli, &args.root)?;
            if args.dump {
                let graph = built.handle.graph();
                let dump = serde_json::json!({
                    "build": &built,
                    "nodes": graph.nodes(),
                    "edges": graph.edges(),
                });
                render(cli, &dump)
            } else {
                render(cli, &built)
            }
        }
        Commands::Neighbors(args) => run_neighbors(&engine, cli, args),
        Commands::Chains(args) => run_chains(&engine, cli, args),
        Commands::Query(args) => run_query(&engine, cli, args),
        Commands::Analyze(args) => run_analyze(&engine, cli, args),
    }
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level
fn init_logging(cli: &Cli, config: &EngineConfig) {
    let fallback = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // a second init (tests driving `run` twice) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build(engine: &Engine, cli: &Cli, root: &Path) -> Result<BuildResponse> {
    let request = BuildRequest {
        tier: cli.tier.into(),
        ..BuildRequest::new(root).with_flags(cli.enrichment_flags())
    };
    let built = engine.build(request)?;
    tracing::info!(
        "Graph for {}: {} nodes, {} edges",
        built.root_path,
        built.report.node_count,
        built.report.edge_count
    );
    Ok(built)
}

fn options(cli: &Cli) -> RequestOptions {
    RequestOptions::new(cli.tier.into())
}

fn parse_edge_types(raw: &[String]) -> Result<Option<Vec<EdgeType>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.iter()
        .map(|name| EdgeType::parse(name).ok_or_else(|| GraphError::invalid(format!("unknown edge type '{}'", name))))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn run_neighbors(engine: &Engine, cli: &Cli, args: &NeighborsArgs) -> Result<String> {
    let built = build(engine, cli, &args.root)?;
    let request = NeighborhoodRequest {
        max_nodes: args.max_nodes,
        direction: args.direction.into(),
        min_confidence: args.min_confidence,
        edge_types: parse_edge_types(&args.edge_types)?,
        ..NeighborhoodRequest::new(args.node.clone(), args.k)
    };
    let result = engine.neighborhood(&built.handle, &request, &options(cli))?;
    render(cli, &result)
}

fn run_chains(engine: &Engine, cli: &Cli, args: &ChainsArgs) -> Result<String> {
    let built = build(engine, cli, &args.root)?;
    let request = ChainRequest {
        max_chains: args.max_chains,
        direction: args.direction.into(),
        min_confidence: args.min_confidence,
        edge_types: parse_edge_types(&args.edge_types)?,
        ..ChainRequest::new(args.node.clone(), args.max_depth)
    };
    let result = engine.chains(&built.handle, &request, &options(cli))?;
    render(cli, &result)
}

fn run_query(engine: &Engine, cli: &Cli, args: &QueryArgs) -> Result<String> {
    let built = build(engine, cli, &args.root)?;
    let options = match args.timeout_ms {
        Some(ms) => RequestOptions::with_timeout(cli.tier.into(), Duration::from_millis(ms)),
        None => options(cli),
    };
    let result = engine.query(&built.handle, &args.text, &options)?;
    render(cli, &result)
}

fn run_analyze(engine: &Engine, cli: &Cli, args: &AnalyzeArgs) -> Result<String> {
    let built = build(engine, cli, &args.root)?;
    let params = AnalysisParams { top_n: args.top_n };
    let result = engine.analyze(&built.handle, args.kind.into(), &params, &options(cli));
    render(cli, &result)
}

fn render<T: Serialize>(cli: &Cli, value: &T) -> Result<String> {
    let text = if cli.compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(text)
}
