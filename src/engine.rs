//! Request/response facade over the graph engine
//!
//! A build request produces a [`GraphHandle`]; every other request runs
//! against a handle. Handles share the immutable graph through an `Arc`,
//! so concurrent requests on one build need no synchronization.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::analysis::{self, AnalysisKind, AnalysisParams, AnalysisResult};
use crate::builder::{build_graph, BuildReport};
use crate::cache::{CacheKey, CacheStats, GraphCache};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::enrich::EnrichmentFlags;
use crate::error::{GraphError, Result};
use crate::extract::ExtractorRegistry;
use crate::facts::FactSet;
use crate::graph::UniversalGraph;
use crate::query::{self, QueryResult};
use crate::tier::{ConfigTierLimiter, Tier, TierLimiter};
use crate::traversal::{self, ChainRequest, Chains, Neighborhood, NeighborhoodRequest, RequestContext};

/// Reference to one built graph
#[derive(Debug, Clone)]
pub struct GraphHandle {
    pub root_path: PathBuf,
    pub fingerprint: u64,
    pub flags: EnrichmentFlags,
    graph: Arc<UniversalGraph>,
}

impl GraphHandle {
    pub fn graph(&self) -> &UniversalGraph {
        &self.graph
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub root_path: PathBuf,
    /// Pre-extracted facts; `None` runs the registered extractors over `root_path`
    pub fact_set: Option<FactSet>,
    pub enrichment_flags: EnrichmentFlags,
    pub tier: Tier,
}

impl BuildRequest {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Self::default()
        }
    }

    pub fn with_facts(mut self, facts: FactSet) -> Self {
        self.fact_set = Some(facts);
        self
    }

    pub fn with_flags(mut self, flags: EnrichmentFlags) -> Self {
        self.enrichment_flags = flags;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResponse {
    #[serde(skip)]
    pub handle: GraphHandle,
    pub root_path: String,
    pub fingerprint: String,
    pub tier: Tier,
    pub enrichment_flags: EnrichmentFlags,
    pub from_cache: bool,
    #[serde(flatten)]
    pub report: BuildReport,
}

/// Per-request caller inputs
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub tier: Tier,
    pub cancel: CancelToken,
}

impl RequestOptions {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_timeout(tier: Tier, timeout: Duration) -> Self {
        Self {
            tier,
            cancel: CancelToken::with_timeout(timeout),
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    limiter: Arc<dyn TierLimiter>,
    registry: ExtractorRegistry,
    cache: Option<GraphCache>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            limiter: Arc::new(ConfigTierLimiter::new(&config.limits)),
            registry: ExtractorRegistry::default(),
            cache: GraphCache::from_config(&config.cache),
            config,
        }
    }

    /// Replace the configured limiter with an injected one
    pub fn with_limiter(mut self, limiter: Arc<dyn TierLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(GraphCache::stats)
    }

    /// Extract (when needed) and build a graph
    pub fn build(&self, request: BuildRequest) -> Result<BuildResponse> {
        let BuildRequest {
            root_path,
            fact_set,
            enrichment_flags: flags,
            tier,
        } = request;

        let facts = match fact_set {
            Some(facts) => facts,
            None => self.extract(&root_path)?,
        };
        let fingerprint = facts.fingerprint();
        let enrichment = &self.config.enrichment;
        let run = || Ok(build_graph(&facts, flags, enrichment));

        let (graph, report, from_cache) = match &self.cache {
            Some(cache) => {
                let key = CacheKey {
                    root: root_path.clone(),
                    content_hash: fingerprint,
                    flags,
                };
                let (entry, hit) = cache.get_or_build(key, run)?;
                (entry.graph, (*entry.report).clone(), hit)
            }
            None => {
                let (graph, report) = build_graph(&facts, flags, enrichment);
                (Arc::new(graph), report, false)
            }
        };

        Ok(BuildResponse {
            handle: GraphHandle {
                root_path: root_path.clone(),
                fingerprint,
                flags,
                graph,
            },
            root_path: root_path.display().to_string(),
            fingerprint: format!("{:016x}", fingerprint),
            tier,
            enrichment_flags: flags,
            from_cache,
            report,
        })
    }

    fn extract(&self, root: &Path) -> Result<FactSet> {
        if !root.is_dir() {
            return Err(GraphError::invalid(format!(
                "root path {} is not a directory",
                root.display()
            )));
        }
        Ok(self.registry.extract_project(root, &self.config.extraction))
    }

    fn context<'a>(&'a self, options: &RequestOptions) -> RequestContext<'a> {
        RequestContext {
            limiter: self.limiter.as_ref(),
            tier: options.tier,
            decay: self.config.enrichment.decay,
            cancel: options.cancel.clone(),
        }
    }

    pub fn neighborhood(
        &self,
        handle: &GraphHandle,
        request: &NeighborhoodRequest,
        options: &RequestOptions,
    ) -> Result<Neighborhood> {
        traversal::neighborhood(handle.graph(), request, &self.context(options))
    }

    pub fn chains(&self, handle: &GraphHandle, request: &ChainRequest, options: &RequestOptions) -> Result<Chains> {
        traversal::chains(handle.graph(), request, &self.context(options))
    }

    pub fn query(&self, handle: &GraphHandle, text: &str, options: &RequestOptions) -> Result<QueryResult> {
        query::execute(handle.graph(), text, &self.context(options))
    }

    pub fn analyze(
        &self,
        handle: &GraphHandle,
        kind: AnalysisKind,
        params: &AnalysisParams,
        options: &RequestOptions,
    ) -> AnalysisResult {
        analysis::analyze(handle.graph(), kind, params, &self.context(options))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{CallFact, SymbolFact, SymbolKind};

    fn facts() -> FactSet {
        let mut facts = FactSet::new();
        for (name, line) in [("a", 1), ("b", 5), ("c", 9)] {
            facts.symbols.push(SymbolFact {
                language: "python".into(),
                file_path: "m.py".into(),
                name: name.into(),
                kind: SymbolKind::Function,
                line,
                end_line: line + 2,
                ..SymbolFact::default()
            });
        }
        for (caller, callee, line) in [("a", "b", 2), ("b", "c", 6)] {
            facts.calls.push(CallFact {
                language: "python".into(),
                file_path: "m.py".into(),
                caller: Some(caller.into()),
                callee: callee.into(),
                line,
            });
        }
        facts
    }

    #[test]
    fn test_build_then_neighborhood() {
        let engine = Engine::default();
        let built = engine
            .build(BuildRequest::new("/virtual").with_facts(facts()).with_flags(EnrichmentFlags::none()))
            .unwrap();
        assert!(!built.from_cache);
        assert_eq!(built.report.call_edges, 2);

        let result = engine
            .neighborhood(
                &built.handle,
                &NeighborhoodRequest::new("python::m::function::a", 2),
                &RequestOptions::default(),
            )
            .unwrap();
        assert_eq!(result.depth_by_node.len(), 3);
        assert_eq!(result.depth_by_node["python::m::function::c"], 2);
    }

    #[test]
    fn test_cache_shares_graph() {
        let mut config = EngineConfig::default();
        config.cache.enabled = true;
        let engine = Engine::new(config);
        let first = engine.build(BuildRequest::new("/virtual").with_facts(facts())).unwrap();
        let second = engine.build(BuildRequest::new("/virtual").with_facts(facts())).unwrap();
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(Arc::ptr_eq(&first.handle.graph, &second.handle.graph));
        assert_eq!(engine.cache_stats().map(|s| s.hits), Some(1));
    }

    #[test]
    fn test_unknown_center_is_error() {
        let engine = Engine::default();
        let built = engine.build(BuildRequest::new("/virtual").with_facts(facts())).unwrap();
        let err = engine
            .neighborhood(
                &built.handle,
                &NeighborhoodRequest::new("python::m::function::missing", 1),
                &RequestOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode { .. }));
    }

    #[test]
    fn test_missing_root_without_facts() {
        let engine = Engine::default();
        let err = engine
            .build(BuildRequest::new("/definitely/not/a/real/root"))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidRequest { .. }));
    }
}
