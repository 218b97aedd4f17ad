//! ucg-engine: universal code graph engine
//!
//! Language extractors turn source files into facts (symbols, call sites,
//! imports). The builders assemble those facts into a [`UniversalGraph`] of
//! typed, confidence-weighted edges, enrichment passes add inferred edges,
//! and the graph then answers bounded requests:
//!
//! - k-hop neighborhoods and call chains ([`traversal`])
//! - a small pattern-matching query language ([`query`])
//! - hot nodes, dead code, import cycles and layer violations ([`analysis`])
//!
//! Every request is clamped by a [`TierLimiter`] and reports the limits it
//! ran under.
//!
//! # Example
//!
//! ```ignore
//! use ucg_engine::{BuildRequest, Engine, NeighborhoodRequest, RequestOptions};
//!
//! let engine = Engine::default();
//! let built = engine.build(BuildRequest::new("path/to/project"))?;
//! let around = engine.neighborhood(
//!     &built.handle,
//!     &NeighborhoodRequest::new("python::app.views::function::index", 2),
//!     &RequestOptions::default(),
//! )?;
//! println!("{} nodes", around.nodes.len());
//! ```

pub mod analysis;
pub mod builder;
pub mod cache;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod facts;
pub mod graph;
pub mod query;
pub mod tier;
pub mod traversal;

pub use analysis::{AnalysisKind, AnalysisOutput, AnalysisParams, AnalysisResult};
pub use builder::{build_graph, BuildReport};
pub use cache::{CacheKey, CacheStats, GraphCache};
pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use engine::{BuildRequest, BuildResponse, Engine, GraphHandle, RequestOptions};
pub use enrich::EnrichmentFlags;
pub use error::{GraphError, QueryParseError, Result};
pub use extract::{ExtractorRegistry, PythonExtractor, RustExtractor};
pub use facts::{CallFact, FactExtractor, FactSet, FileFacts, ImportFact, SymbolFact, SymbolKind};
pub use graph::{EdgeType, GraphEdge, GraphNode, NodeKind, UniversalGraph};
pub use query::QueryResult;
pub use tier::{AppliedLimits, ConfigTierLimiter, Tier, TierLimiter, ToolKind, ToolLimits};
pub use traversal::{ChainRequest, Chains, Direction, Neighborhood, NeighborhoodRequest, RequestContext};
