//! Path-keyword layer classification for module nodes

use crate::graph::Layer;

const PRESENTATION_KEYWORDS: &[&str] = &[
    "view", "views", "ui", "route", "routes", "router", "routers", "controller", "controllers",
    "api", "handler", "handlers", "template", "templates", "cli", "web", "page", "pages",
    "component", "components", "endpoint", "endpoints", "presentation", "frontend",
];

const DOMAIN_KEYWORDS: &[&str] = &[
    "service", "services", "domain", "core", "logic", "usecase", "usecases", "use_cases",
    "business", "entity", "entities", "application",
];

const DATA_KEYWORDS: &[&str] = &[
    "db", "database", "repository", "repositories", "repo", "repos", "dao", "model", "models",
    "storage", "store", "persistence", "migration", "migrations", "orm", "schema", "schemas",
    "data",
];

/// Assign a layer from the file path.
///
/// Segments are checked from the file stem outward, so the innermost
/// keyword wins (`app/api/models.py` is data, `app/models/api.py` is
/// presentation).
pub fn classify_layer(file_path: &str) -> Layer {
    let normalized = file_path.replace('\\', "/").to_lowercase();
    let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(last) = segments.last_mut() {
        let stem = last.split('.').next().unwrap_or(*last);
        *last = stem;
    }

    for segment in segments.iter().rev() {
        if let Some(layer) = classify_segment(segment) {
            return layer;
        }
    }
    Layer::Unknown
}

fn classify_segment(segment: &str) -> Option<Layer> {
    let stem = segment.trim_start_matches('_');
    if PRESENTATION_KEYWORDS.contains(&stem) {
        return Some(Layer::Presentation);
    }
    if DOMAIN_KEYWORDS.contains(&stem) {
        return Some(Layer::Domain);
    }
    if DATA_KEYWORDS.contains(&stem) {
        return Some(Layer::Data);
    }
    // Compound stems such as `user_views` or `order_repository`
    let tokens: Vec<&str> = stem.split('_').collect();
    if tokens.len() > 1 {
        for token in tokens.iter().rev() {
            if PRESENTATION_KEYWORDS.contains(token) {
                return Some(Layer::Presentation);
            }
            if DOMAIN_KEYWORDS.contains(token) {
                return Some(Layer::Domain);
            }
            if DATA_KEYWORDS.contains(token) {
                return Some(Layer::Data);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_directory() {
        assert_eq!(classify_layer("app/views/home.py"), Layer::Presentation);
        assert_eq!(classify_layer("app/services/billing.py"), Layer::Domain);
        assert_eq!(classify_layer("app/db/session.py"), Layer::Data);
        assert_eq!(classify_layer("app/misc/helpers.py"), Layer::Unknown);
    }

    #[test]
    fn test_innermost_keyword_wins() {
        assert_eq!(classify_layer("app/api/models.py"), Layer::Data);
        assert_eq!(classify_layer("app/models/api.py"), Layer::Presentation);
    }

    #[test]
    fn test_compound_file_stems() {
        assert_eq!(classify_layer("src/order_repository.rs"), Layer::Data);
        assert_eq!(classify_layer("src/user_views.py"), Layer::Presentation);
    }
}
