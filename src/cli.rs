//! CLI argument definitions using clap with a subcommand per engine operation
//!
//! Every subcommand takes the project root, builds (or reuses) its graph and
//! prints the operation's response as JSON.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::analysis::AnalysisKind;
use crate::enrich::EnrichmentFlags;
use crate::tier::Tier;
use crate::traversal::Direction;

/// Universal code graph: build, traverse and query call/import graphs
#[derive(Parser, Debug)]
#[command(name = "ucg")]
#[command(about = "Builds a call/import graph for a project and answers traversal, query and analysis requests")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Caller tier used to clamp request bounds
    #[arg(long, value_enum, default_value = "community", global = true, env = "UCG_TIER")]
    pub tier: TierArg,

    /// TOML configuration file
    #[arg(long, value_name = "FILE", global = true, env = "UCG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run the semantic-similarity enrichment pass
    #[arg(long, global = true)]
    pub semantic: bool,

    /// Skip polymorphism enrichment
    #[arg(long, global = true)]
    pub no_polymorphism: bool,

    /// Skip logical (cross-file naming) enrichment
    #[arg(long, global = true)]
    pub no_logical: bool,

    /// Compact single-line JSON instead of pretty-printed
    #[arg(long, global = true)]
    pub compact: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    pub fn enrichment_flags(&self) -> EnrichmentFlags {
        EnrichmentFlags {
            polymorphism: !self.no_polymorphism,
            semantic: self.semantic,
            logical: !self.no_logical,
        }
    }
}

// ============================================
// Subcommands
// ============================================

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract facts and build the graph, printing the build report
    #[command(visible_alias = "b")]
    Build(BuildArgs),

    /// Nodes within k hops of a center node
    #[command(visible_alias = "n")]
    Neighbors(NeighborsArgs),

    /// Enumerate call chains from a start node
    Chains(ChainsArgs),

    /// Run a graph query (MATCH ... WHERE ... RETURN ...)
    #[command(visible_alias = "q")]
    Query(QueryArgs),

    /// Run one of the structural analyses
    #[command(visible_alias = "a")]
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project root to extract
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Include every node and edge in the output, not just the report
    #[arg(long)]
    pub dump: bool,
}

#[derive(Args, Debug)]
pub struct NeighborsArgs {
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Center node id, e.g. `python::pkg.mod::function::handler`
    #[arg(value_name = "NODE")]
    pub node: String,

    /// Hop radius
    #[arg(short, long, default_value_t = 2)]
    pub k: usize,

    #[arg(long)]
    pub max_nodes: Option<usize>,

    #[arg(long, value_enum, default_value = "outbound")]
    pub direction: DirectionArg,

    #[arg(long, default_value_t = 0.0)]
    pub min_confidence: f64,

    /// Comma-separated edge types to follow (CALLS,IMPORTS,...)
    #[arg(long, value_delimiter = ',')]
    pub edge_types: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ChainsArgs {
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    #[arg(value_name = "NODE")]
    pub node: String,

    #[arg(long, default_value_t = 3)]
    pub max_depth: usize,

    #[arg(long)]
    pub max_chains: Option<usize>,

    #[arg(long, value_enum, default_value = "outbound")]
    pub direction: DirectionArg,

    #[arg(long, default_value_t = 0.0)]
    pub min_confidence: f64,

    #[arg(long, value_delimiter = ',')]
    pub edge_types: Vec<String>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Query text
    #[arg(value_name = "QUERY")]
    pub text: String,

    /// Abort after this many milliseconds, returning partial rows
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    #[arg(value_enum)]
    pub kind: AnalysisArg,

    /// Number of hot nodes to report
    #[arg(long)]
    pub top_n: Option<usize>,
}

// ============================================
// Value enums
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    Community,
    Pro,
    Enterprise,
}

impl From<TierArg> for Tier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Community => Tier::Community,
            TierArg::Pro => Tier::Pro,
            TierArg::Enterprise => Tier::Enterprise,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    #[value(alias = "out")]
    Outbound,
    #[value(alias = "in")]
    Inbound,
    Both,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Outbound => Direction::Outbound,
            DirectionArg::Inbound => Direction::Inbound,
            DirectionArg::Both => Direction::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnalysisArg {
    #[value(alias = "hot-nodes")]
    Hot,
    #[value(alias = "dead-code")]
    Dead,
    #[value(alias = "circular-imports")]
    Cycles,
    #[value(alias = "layer-violations")]
    Layers,
}

impl From<AnalysisArg> for AnalysisKind {
    fn from(arg: AnalysisArg) -> Self {
        match arg {
            AnalysisArg::Hot => AnalysisKind::HotNodes,
            AnalysisArg::Dead => AnalysisKind::DeadCode,
            AnalysisArg::Cycles => AnalysisKind::CircularImports,
            AnalysisArg::Layers => AnalysisKind::LayerViolations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ucg",
            "neighbors",
            "/repo",
            "python::a::function::f",
            "-k",
            "50",
            "--tier",
            "pro",
            "--semantic",
            "--no-logical",
            "--edge-types",
            "CALLS,IMPORTS",
        ])
        .unwrap();
        assert_eq!(Tier::from(cli.tier), Tier::Pro);
        let flags = cli.enrichment_flags();
        assert!(flags.semantic && flags.polymorphism && !flags.logical);
        match cli.command {
            Commands::Neighbors(args) => {
                assert_eq!(args.k, 50);
                assert_eq!(args.edge_types, vec!["CALLS", "IMPORTS"]);
                assert_eq!(Direction::from(args.direction), Direction::Outbound);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_analysis_aliases() {
        let cli = Cli::try_parse_from(["ucg", "analyze", ".", "dead-code"]).unwrap();
        match cli.command {
            Commands::Analyze(args) => assert_eq!(AnalysisKind::from(args.kind), AnalysisKind::DeadCode),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
