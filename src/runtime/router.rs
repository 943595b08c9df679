//! Capability routing: keyword/pattern matching in direct mode, with an
//! AI-mode downgrade when no dispatcher is configured.

use regex::Regex;

use crate::config::{CapabilityRoutingConfig, RoutingSection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    Direct,
    Ai,
}

impl RoutingMode {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("ai") {
            RoutingMode::Ai
        } else {
            RoutingMode::Direct
        }
    }
}

#[derive(Debug, Clone)]
pub enum RouteDecision {
    Capability(String),
    Ai,
    Fallback(String),
    None,
}

/// Matches a task's text against configured capabilities in declared
/// order. Direct mode tries a case-insensitive keyword substring match
/// first, then a case-insensitive regex pattern match; a capability whose
/// regex fails to compile is logged and skipped, never fatal.
pub struct Router {
    default_mode: RoutingMode,
    fallback_capability: Option<String>,
    fallback_enabled: bool,
    capabilities: Vec<CapabilityRoutingConfig>,
    ai_dispatcher_available: bool,
}

impl Router {
    pub fn new(section: &RoutingSection, ai_dispatcher_available: bool) -> Self {
        Self {
            default_mode: RoutingMode::parse(&section.default_mode),
            fallback_capability: section.fallback_capability.clone(),
            fallback_enabled: section.fallback_enabled,
            capabilities: section.capabilities.clone(),
            ai_dispatcher_available,
        }
    }

    /// Routes `text` to a capability id, `Ai` (defer to the dispatcher),
    /// a fallback capability, or nothing at all. Direct keyword/pattern
    /// matching over every `routing_mode == direct` capability always runs
    /// first; only when nothing matches does `default_mode` decide between
    /// AI dispatch and the configured fallback.
    pub fn route(&self, text: &str) -> RouteDecision {
        if let Some(id) = self.match_direct(text) {
            return RouteDecision::Capability(id);
        }

        let effective_mode = if self.default_mode == RoutingMode::Ai && !self.ai_dispatcher_available {
            RoutingMode::Direct
        } else {
            self.default_mode
        };

        if effective_mode == RoutingMode::Ai {
            return RouteDecision::Ai;
        }

        match (&self.fallback_capability, self.fallback_enabled) {
            (Some(id), true) => RouteDecision::Fallback(id.clone()),
            _ => RouteDecision::None,
        }
    }

    fn match_direct(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let direct: Vec<&CapabilityRoutingConfig> = self
            .capabilities
            .iter()
            .filter(|cap| cap.routing_mode.eq_ignore_ascii_case("direct"))
            .collect();

        for cap in &direct {
            if cap.keywords.iter().any(|kw| lower.contains(&kw.to_lowercase())) {
                return Some(cap.capability_id.clone());
            }
        }

        for cap in &direct {
            for pattern in &cap.patterns {
                match Regex::new(&format!("(?i){pattern}")) {
                    Ok(re) => {
                        if re.is_match(text) {
                            return Some(cap.capability_id.clone());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            capability_id = %cap.capability_id,
                            pattern,
                            error = %e,
                            "skipping capability with invalid routing pattern"
                        );
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> RoutingSection {
        RoutingSection {
            default_mode: "direct".into(),
            fallback_capability: Some("general".into()),
            fallback_enabled: true,
            capabilities: vec![
                CapabilityRoutingConfig {
                    capability_id: "weather".into(),
                    routing_mode: "direct".into(),
                    keywords: vec!["weather".into(), "forecast".into()],
                    patterns: vec![],
                },
                CapabilityRoutingConfig {
                    capability_id: "math".into(),
                    routing_mode: "direct".into(),
                    keywords: vec![],
                    patterns: vec![r"\d+\s*[\+\-\*/]\s*\d+".into()],
                },
            ],
        }
    }

    #[test]
    fn keyword_match_wins_in_configured_order() {
        let router = Router::new(&section(), false);
        match router.route("what's the weather forecast today") {
            RouteDecision::Capability(id) => assert_eq!(id, "weather"),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn pattern_match_used_when_no_keyword_matches() {
        let router = Router::new(&section(), false);
        match router.route("what is 2 + 2") {
            RouteDecision::Capability(id) => assert_eq!(id, "math"),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn falls_back_when_nothing_matches() {
        let router = Router::new(&section(), false);
        match router.route("tell me a joke") {
            RouteDecision::Fallback(id) => assert_eq!(id, "general"),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn invalid_regex_is_skipped_not_fatal() {
        let mut section = section();
        section.capabilities.push(CapabilityRoutingConfig {
            capability_id: "broken".into(),
            routing_mode: "direct".into(),
            keywords: vec![],
            patterns: vec!["(unclosed".into()],
        });
        let router = Router::new(&section, false);
        // Should still fall through to fallback without panicking.
        match router.route("nothing matches this") {
            RouteDecision::Fallback(id) => assert_eq!(id, "general"),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn ai_mode_downgrades_to_direct_without_dispatcher() {
        let mut section = section();
        section.default_mode = "ai".into();
        let router = Router::new(&section, false);
        match router.route("what's the weather forecast today") {
            RouteDecision::Capability(id) => assert_eq!(id, "weather"),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn ai_mode_defers_to_dispatcher_when_available() {
        let mut section = section();
        section.default_mode = "ai".into();
        let router = Router::new(&section, true);
        assert!(matches!(router.route("anything"), RouteDecision::Ai));
    }

    #[test]
    fn direct_keyword_match_runs_before_ai_default_mode() {
        // A hybrid config (direct capabilities + an AI fallback) must still
        // keyword-route when the text matches, even though `default_mode`
        // is `ai` and a dispatcher is available.
        let mut section = section();
        section.default_mode = "ai".into();
        let router = Router::new(&section, true);
        match router.route("what's the weather forecast today") {
            RouteDecision::Capability(id) => assert_eq!(id, "weather"),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn ai_mode_capability_with_keywords_is_not_direct_routed() {
        let mut section = section();
        section.capabilities.push(CapabilityRoutingConfig {
            capability_id: "ai-only".into(),
            routing_mode: "ai".into(),
            keywords: vec!["summarize".into()],
            patterns: vec![],
        });
        let router = Router::new(&section, false);
        // `ai-only`'s keyword must be ignored since its routing_mode isn't
        // `direct`; with no dispatcher available this falls through to the
        // configured fallback instead of matching the capability.
        match router.route("please summarize this") {
            RouteDecision::Fallback(id) => assert_eq!(id, "general"),
            other => panic!("unexpected decision: {other:?}"),
        }
    }
}
