//! Entry-point heuristics.
//!
//! Symbols invoked by a runtime, framework or test runner have no static
//! callers; flagging them keeps dead-code detection from reporting them.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::facts::{SymbolFact, SymbolKind};

static ROUTE_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|\.|::)(route|get|post|put|patch|delete|head|options|websocket|api_view|endpoint|view_config)\b")
        .expect("valid regex")
});

static CLI_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|\.|::)(command|group|cli|main|subcommand|typer|click)\b").expect("valid regex")
});

static HANDLER_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|\.|::)(task|shared_task|receiver|handler|on_event|listener|subscribe|hook|cron|schedule)\b")
        .expect("valid regex")
});

static TEST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(test|tokio::test|rstest|pytest\..*|fixture|pytest\.fixture|bench)\b").expect("valid regex")
});

/// Why a symbol counts as an entry point, or `None`
pub fn detect_entry_point(fact: &SymbolFact) -> Option<&'static str> {
    if fact.kind != SymbolKind::Class && fact.name == "main" && fact.enclosing_class.is_none() {
        return Some("main entry");
    }

    for decorator in &fact.decorators {
        let decorator = decorator.trim_start_matches('@').trim();
        if TEST_MARKER.is_match(decorator) {
            return Some("test marker");
        }
        if ROUTE_DECORATOR.is_match(decorator) {
            return Some("route/handler decorator");
        }
        if CLI_DECORATOR.is_match(decorator) {
            return Some("cli command marker");
        }
        if HANDLER_DECORATOR.is_match(decorator) {
            return Some("event handler decorator");
        }
    }

    if is_test_name(fact) {
        return Some("test naming convention");
    }

    if fact.kind == SymbolKind::Function && matches!(fact.name.as_str(), "lambda_handler" | "handler")
    {
        return Some("serverless handler");
    }

    None
}

fn is_test_name(fact: &SymbolFact) -> bool {
    let in_test_file = fact.file_path.contains("test");
    match fact.kind {
        SymbolKind::Class => fact.name.starts_with("Test"),
        SymbolKind::Function | SymbolKind::Method => {
            fact.name.starts_with("test_") || (in_test_file && fact.name.starts_with("test"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str, decorators: &[&str]) -> SymbolFact {
        SymbolFact {
            language: "python".into(),
            file_path: "app/routes.py".into(),
            name: name.into(),
            decorators: decorators.iter().map(|d| d.to_string()).collect(),
            line: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_main_and_tests() {
        assert_eq!(detect_entry_point(&func("main", &[])), Some("main entry"));
        assert_eq!(
            detect_entry_point(&func("test_login", &[])),
            Some("test naming convention")
        );
        assert_eq!(detect_entry_point(&func("it_works", &["test"])), Some("test marker"));
        assert_eq!(detect_entry_point(&func("helper", &[])), None);
    }

    #[test]
    fn test_decorators() {
        assert_eq!(
            detect_entry_point(&func("index", &["app.route(\"/\")"])),
            Some("route/handler decorator")
        );
        assert_eq!(
            detect_entry_point(&func("sync", &["click.command()"])),
            Some("cli command marker")
        );
        assert_eq!(
            detect_entry_point(&func("on_save", &["receiver(post_save)"])),
            Some("event handler decorator")
        );
        assert_eq!(detect_entry_point(&func("cached", &["lru_cache"])), None);
    }
}
