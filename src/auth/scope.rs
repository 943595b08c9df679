//! BFS expansion of declared scopes against a configured hierarchy.
//!
//! The hierarchy is a flat `scope -> [implied scopes]` map with no implicit
//! inheritance: `"admin"` implies nothing unless the config says so, and
//! there is no built-in admin bypass. A `"*"` anywhere in the declared or
//! expanded set is a short-circuit: the subject is authorized for
//! anything. Expansion is breadth-first with a visited set (cycle-safe)
//! and a hard depth cap, since the hierarchy is operator-authored config
//! and a cycle or runaway chain should degrade to "stop expanding", not
//! hang the request.

use std::collections::{HashMap, HashSet, VecDeque};

/// Scope chains longer than this are truncated rather than followed
/// further; a legitimate hierarchy is a handful of levels deep, so this
/// only ever bites a misconfigured or cyclic one.
const MAX_EXPANSION_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct ScopeHierarchy {
    implies: HashMap<String, Vec<String>>,
}

impl ScopeHierarchy {
    pub fn new(implies: HashMap<String, Vec<String>>) -> Self {
        Self { implies }
    }

    /// Expand `declared` to the full set of scopes it implies, including
    /// the declared scopes themselves. If any declared scope is `"*"`,
    /// returns immediately with just `["*"]` — the caller should treat
    /// that as "everything".
    pub fn expand(&self, declared: &[String]) -> HashSet<String> {
        if declared.iter().any(|s| s == "*") {
            let mut all = HashSet::new();
            all.insert("*".to_string());
            return all;
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = declared.iter().cloned().map(|s| (s, 0)).collect();

        while let Some((scope, depth)) = queue.pop_front() {
            if !visited.insert(scope.clone()) {
                continue;
            }
            if scope == "*" {
                let mut all = HashSet::new();
                all.insert("*".to_string());
                return all;
            }
            if depth >= MAX_EXPANSION_DEPTH {
                continue;
            }
            if let Some(implied) = self.implies.get(&scope) {
                for next in implied {
                    if !visited.contains(next) {
                        queue.push_back((next.clone(), depth + 1));
                    }
                }
            }
        }

        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy(pairs: &[(&str, &[&str])]) -> ScopeHierarchy {
        let mut map = HashMap::new();
        for (scope, implied) in pairs {
            map.insert(scope.to_string(), implied.iter().map(|s| s.to_string()).collect());
        }
        ScopeHierarchy::new(map)
    }

    #[test]
    fn expands_transitively() {
        let h = hierarchy(&[("files:admin", &["files:write"]), ("files:write", &["files:read"])]);
        let expanded = h.expand(&["files:admin".to_string()]);
        assert!(expanded.contains("files:admin"));
        assert!(expanded.contains("files:write"));
        assert!(expanded.contains("files:read"));
    }

    #[test]
    fn no_implicit_admin_bypass() {
        let h = hierarchy(&[]);
        let expanded = h.expand(&["admin".to_string()]);
        assert_eq!(expanded.len(), 1);
        assert!(expanded.contains("admin"));
    }

    #[test]
    fn wildcard_short_circuits() {
        let h = hierarchy(&[("files:admin", &["files:write"])]);
        let expanded = h.expand(&["files:read".to_string(), "*".to_string()]);
        assert_eq!(expanded, HashSet::from(["*".to_string()]));
    }

    #[test]
    fn mid_expansion_wildcard_short_circuits() {
        let h = hierarchy(&[("files:admin", &["*"])]);
        let expanded = h.expand(&["files:admin".to_string()]);
        assert_eq!(expanded, HashSet::from(["*".to_string()]));
    }

    #[test]
    fn cycles_terminate() {
        let h = hierarchy(&[("a", &["b"]), ("b", &["a"])]);
        let expanded = h.expand(&["a".to_string()]);
        assert_eq!(expanded, HashSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn unknown_scope_expands_to_itself_only() {
        let h = hierarchy(&[]);
        let expanded = h.expand(&["unmapped:scope".to_string()]);
        assert_eq!(expanded, HashSet::from(["unmapped:scope".to_string()]));
    }
}
