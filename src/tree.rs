//! Segment trie used to resolve a request path to a route.
//!
//! Paths are split on `/` and each segment walks one level of the trie.
//! A segment is one of:
//!
//! | Pattern         | Matches                                            |
//! |-----------------|----------------------------------------------------|
//! | `users`         | exactly `users`                                    |
//! | `:id`           | any single segment, bound to `id`                  |
//! | `:id:\d+`       | any single segment that fully matches `\d+`        |
//! | `:*`            | everything that remains, `/` included (last only)  |
//!
//! Literal edges always win over the wildcard edge, and the search backtracks
//! across the whole remaining path: `/api/action` beats `/:api/action`, but
//! `/api/other` still reaches `/:api/other` if the literal subtree dead-ends.
//!
//! All wildcards at one position share a single structural edge. Each leaf
//! remembers the names it was registered with, so `/a/:x/b` and `/a/:y/c`
//! report `x` and `y` respectively.
//!
//! Constraints are compiled with Unicode mode off, so `\d`, `\w` and `\s`
//! are ASCII classes (`:id:\d+` rejects `١٢`). A pattern that needs Unicode
//! mode to be valid on UTF-8 text (`.`, negated classes) keeps it.

use std::borrow::Cow;
use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::RouteError;

/// Path parameters captured by wildcard segments, keyed by wildcard name.
pub type Params = HashMap<String, String>;

/// Reserved wildcard name for the trailing catch-all.
pub const CATCH_ALL: &str = "*";

/// A successful trie lookup.
#[derive(Debug)]
pub struct Found<'t, T> {
    pub value: &'t T,
    pub params: Params,
}

/// A trie mapping path patterns to values of type `T`.
///
/// Built once at startup; lookups take `&self` and never allocate trie nodes.
#[derive(Clone, Debug)]
pub struct PathTrie<T> {
    root: Node<T>,
}

#[derive(Clone, Debug)]
struct Node<T> {
    edges: HashMap<String, Node<T>>,
    wildcard: Option<Box<Node<T>>>,
    leaves: Vec<Leaf<T>>,
    // Leaves reached through a trailing `:*` from this node.
    catch_all: Vec<Leaf<T>>,
}

#[derive(Clone, Debug)]
struct Leaf<T> {
    wildcards: Vec<String>,
    // `None` when no wildcard on the way here is constrained.
    constraints: Option<Vec<Option<Constraint>>>,
    value: T,
}

#[derive(Clone, Debug)]
struct Constraint {
    pattern: String,
    regex: Regex,
}

enum Segment<'a> {
    Literal(&'a str),
    Wildcard { name: &'a str, pattern: Option<&'a str> },
    CatchAll { pattern: Option<&'a str> },
}

impl<T> PathTrie<T> {
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Inserts `value` under `path`.
    ///
    /// Fails on malformed patterns and on a pattern that is structurally
    /// identical (same literals, same wildcard positions, same constraints)
    /// to one already present.
    pub fn insert(&mut self, path: &str, value: T) -> Result<(), RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash);
        }

        let segments = split_path(path);
        let mut wildcards = Vec::new();
        let mut constraints = Vec::new();
        let mut node = &mut self.root;

        for (i, raw) in segments.iter().enumerate() {
            match parse_segment(raw)? {
                Segment::Literal(lit) => {
                    node = node.edges.entry(lit.to_owned()).or_insert_with(Node::new);
                }
                Segment::Wildcard { name, pattern } => {
                    wildcards.push(name.to_owned());
                    constraints.push(compile(name, pattern)?);
                    node = &mut **node.wildcard.get_or_insert_with(|| Box::new(Node::new()));
                }
                Segment::CatchAll { pattern } => {
                    if i + 1 != segments.len() {
                        return Err(RouteError::CatchAllNotLast);
                    }
                    wildcards.push(CATCH_ALL.to_owned());
                    constraints.push(compile(CATCH_ALL, pattern)?);
                    return push_leaf(&mut node.catch_all, wildcards, constraints, value);
                }
            }
        }

        push_leaf(&mut node.leaves, wildcards, constraints, value)
    }

    /// Resolves `path` to the first matching leaf in registration order.
    ///
    /// Returns `None` for an empty path, a path not starting with `/`, or when
    /// nothing matches after full backtracking.
    pub fn find(&self, path: &str) -> Option<Found<'_, T>> {
        if !path.starts_with('/') {
            return None;
        }

        let segments = split_path(path);
        let mut values = Vec::with_capacity(segments.len());
        let leaf = self.root.find(&segments, &mut values)?;

        let params = leaf
            .wildcards
            .iter()
            .cloned()
            .zip(values.into_iter().map(Cow::into_owned))
            .collect();

        Some(Found { value: &leaf.value, params })
    }
}

impl<T> Default for PathTrie<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            edges: HashMap::new(),
            wildcard: None,
            leaves: Vec::new(),
            catch_all: Vec::new(),
        }
    }

    fn find<'n, 'p>(
        &'n self,
        segments: &[&'p str],
        values: &mut Vec<Cow<'p, str>>,
    ) -> Option<&'n Leaf<T>> {
        let Some((&seg, rest)) = segments.split_first() else {
            return self.leaves.iter().find(|leaf| leaf.accepts(values));
        };

        if let Some(child) = self.edges.get(seg) {
            if let Some(leaf) = child.find(rest, values) {
                return Some(leaf);
            }
        }

        if let Some(wildcard) = &self.wildcard {
            values.push(Cow::Borrowed(seg));
            if let Some(leaf) = wildcard.find(rest, values) {
                return Some(leaf);
            }
            values.pop();
        }

        if !self.catch_all.is_empty() {
            values.push(Cow::Owned(segments.join("/")));
            if let Some(leaf) = self.catch_all.iter().find(|leaf| leaf.accepts(values)) {
                return Some(leaf);
            }
            values.pop();
        }

        None
    }
}

impl<T> Leaf<T> {
    fn accepts(&self, values: &[Cow<'_, str>]) -> bool {
        let Some(constraints) = &self.constraints else {
            return true;
        };

        // Every leaf on a node was reached through the same number of wildcards.
        debug_assert_eq!(constraints.len(), values.len());

        constraints
            .iter()
            .zip(values)
            .all(|(constraint, value)| match constraint {
                Some(c) => c.regex.is_match(value),
                None => true,
            })
    }

    fn patterns(&self) -> Vec<Option<&str>> {
        match &self.constraints {
            Some(cs) => cs.iter().map(|c| c.as_ref().map(|c| c.pattern.as_str())).collect(),
            None => vec![None; self.wildcards.len()],
        }
    }
}

fn push_leaf<T>(
    leaves: &mut Vec<Leaf<T>>,
    wildcards: Vec<String>,
    constraints: Vec<Option<Constraint>>,
    value: T,
) -> Result<(), RouteError> {
    let constraints = if constraints.iter().all(Option::is_none) {
        None
    } else {
        Some(constraints)
    };

    let leaf = Leaf { wildcards, constraints, value };
    let patterns = leaf.patterns();
    if leaves.iter().any(|existing| existing.patterns() == patterns) {
        return Err(RouteError::Duplicate);
    }

    leaves.push(leaf);
    Ok(())
}

fn parse_segment(seg: &str) -> Result<Segment<'_>, RouteError> {
    let Some(spec) = seg.strip_prefix(':') else {
        return Ok(Segment::Literal(seg));
    };

    let (name, pattern) = match spec.split_once(':') {
        Some((name, pattern)) => (name, Some(pattern).filter(|p| !p.is_empty())),
        None => (spec, None),
    };

    match name {
        "" => Err(RouteError::EmptyWildcardName(seg.to_owned())),
        CATCH_ALL => Ok(Segment::CatchAll { pattern }),
        _ => Ok(Segment::Wildcard { name, pattern }),
    }
}

fn compile(name: &str, pattern: Option<&str>) -> Result<Option<Constraint>, RouteError> {
    let Some(pattern) = pattern else {
        return Ok(None);
    };

    let anchored = format!("^(?:{pattern})$");
    let regex = RegexBuilder::new(&anchored)
        .unicode(false)
        .build()
        .or_else(|_| Regex::new(&anchored))
        .map_err(|source| RouteError::InvalidRegex { name: name.to_owned(), source })?;

    Ok(Some(Constraint { pattern: pattern.to_owned(), regex }))
}

/// Splits a path into segments, dropping one leading and one trailing empty
/// segment: `"/"` → `[]`, `"/admin/"` → `["admin"]`.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(paths: &[&'static str]) -> PathTrie<&'static str> {
        let mut trie = PathTrie::new();
        for path in paths {
            trie.insert(path, *path).unwrap();
        }
        trie
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn split_path_trims_one_slash_each_side() {
        assert!(split_path("/").is_empty());
        assert!(split_path("").is_empty());
        assert_eq!(split_path("/admin"), ["admin"]);
        assert_eq!(split_path("/admin/"), ["admin"]);
        assert_eq!(split_path("/admin/users"), ["admin", "users"]);
    }

    #[test]
    fn literal_routes_match_with_no_params() {
        let t = trie(&["/", "/api/action", "/admin/action", "/admin/action.json"]);
        for path in ["/", "/api/action", "/admin/action", "/admin/action.json"] {
            let found = t.find(path).unwrap();
            assert_eq!(*found.value, path);
            assert!(found.params.is_empty());
        }
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let t = trie(&["/admin/action"]);
        assert_eq!(*t.find("/admin/action/").unwrap().value, "/admin/action");
    }

    #[test]
    fn invalid_paths_do_not_match() {
        let t = trie(&["/"]);
        assert!(t.find("").is_none());
        assert!(t.find("admin").is_none());
    }

    #[test]
    fn wildcard_binds_the_segment() {
        let t = trie(&["/:api/action", "/api/:action", "/:seg1/:seg2/bob"]);

        let found = t.find("/poop/action").unwrap();
        assert_eq!(*found.value, "/:api/action");
        assert_eq!(found.params, params(&[("api", "poop")]));

        let found = t.find("/api/poop").unwrap();
        assert_eq!(*found.value, "/api/:action");
        assert_eq!(found.params, params(&[("action", "poop")]));

        let found = t.find("/a/b/bob").unwrap();
        assert_eq!(found.params, params(&[("seg1", "a"), ("seg2", "b")]));
    }

    #[test]
    fn literal_wins_over_wildcard() {
        let t = trie(&["/:api/action", "/api/action"]);
        let found = t.find("/api/action").unwrap();
        assert_eq!(*found.value, "/api/action");
        assert!(found.params.is_empty());
    }

    #[test]
    fn backtracks_out_of_a_dead_end_literal_subtree() {
        let t = trie(&["/api/action", "/:api/other"]);
        let found = t.find("/api/other").unwrap();
        assert_eq!(*found.value, "/:api/other");
        assert_eq!(found.params, params(&[("api", "api")]));
    }

    #[test]
    fn deep_backtracking_picks_the_most_specific_route() {
        let t = trie(&[
            "/:seg1/:seg2/ron",
            "/:seg1/:seg2/:seg3",
            "/:seg1/:seg2/ron/apple",
            "/:seg1/:seg2/ron/:apple",
        ]);
        assert_eq!(*t.find("/c/d/ron").unwrap().value, "/:seg1/:seg2/ron");
        assert_eq!(*t.find("/c/d/wat").unwrap().value, "/:seg1/:seg2/:seg3");
        assert_eq!(*t.find("/c/d/ron/apple").unwrap().value, "/:seg1/:seg2/ron/apple");

        let found = t.find("/c/d/ron/orange").unwrap();
        assert_eq!(*found.value, "/:seg1/:seg2/ron/:apple");
        assert_eq!(found.params, params(&[("seg1", "c"), ("seg2", "d"), ("apple", "orange")]));
    }

    #[test]
    fn regex_constraints_disambiguate_sibling_leaves() {
        let t = trie(&[
            r"/site2/:id:\d+",
            "/site2/:id:[a-z]+",
            r"/site2/:id:\d[a-z]+",
            "/site2/:id",
        ]);
        assert_eq!(*t.find("/site2/123").unwrap().value, r"/site2/:id:\d+");
        assert_eq!(*t.find("/site2/abc").unwrap().value, "/site2/:id:[a-z]+");
        assert_eq!(*t.find("/site2/1abc").unwrap().value, r"/site2/:id:\d[a-z]+");

        let found = t.find("/site2/1abc1").unwrap();
        assert_eq!(*found.value, "/site2/:id");
        assert_eq!(found.params, params(&[("id", "1abc1")]));
    }

    #[test]
    fn constraints_are_fully_anchored() {
        let t = trie(&[r"/n/:id:\d+"]);
        assert!(t.find("/n/12x").is_none());
        assert!(t.find("/n/x12").is_none());

        let t = trie(&["/alt/:v:a|b"]);
        assert!(t.find("/alt/a").is_some());
        assert!(t.find("/alt/ab").is_none());
    }

    #[test]
    fn constraints_at_several_depths() {
        let t = trie(&[r"/site2/:id:\d+/other/:var:[A-Z]+"]);
        let found = t.find("/site2/123/other/OK").unwrap();
        assert_eq!(found.params, params(&[("id", "123"), ("var", "OK")]));
        assert!(t.find("/site2/123/other/ok").is_none());
    }

    #[test]
    fn catch_all_consumes_the_remainder() {
        let t = trie(&["/site3/:*", "/site2/:id/:*", r"/site4/:id:\d+/:*"]);

        let found = t.find("/site3/foo/bar/baz").unwrap();
        assert_eq!(found.params, params(&[("*", "foo/bar/baz")]));

        let found = t.find("/site2/1abc1/foo/bar/baz/boo").unwrap();
        assert_eq!(found.params, params(&[("id", "1abc1"), ("*", "foo/bar/baz/boo")]));

        let found = t.find("/site4/123/foo/bar").unwrap();
        assert_eq!(found.params, params(&[("id", "123"), ("*", "foo/bar")]));
        assert!(t.find("/site4/abc/foo").is_none());
    }

    #[test]
    fn catch_all_needs_at_least_one_segment() {
        let t = trie(&["/files/:*"]);
        assert!(t.find("/files").is_none());
        assert!(t.find("/files/").is_none());
    }

    #[test]
    fn deeper_routes_beat_a_catch_all() {
        let t = trie(&["/files/:*", "/files/:name/raw"]);
        assert_eq!(*t.find("/files/a/raw").unwrap().value, "/files/:name/raw");
        assert_eq!(*t.find("/files/a/b").unwrap().value, "/files/:*");
    }

    #[test]
    fn leaves_report_their_own_wildcard_names() {
        let t = trie(&["/a/:x/b", "/a/:y/c"]);
        assert_eq!(t.find("/a/1/b").unwrap().params, params(&[("x", "1")]));
        assert_eq!(t.find("/a/1/c").unwrap().params, params(&[("y", "1")]));
    }

    #[test]
    fn first_registered_leaf_wins_among_equals() {
        let t = trie(&["/a/:x", r"/a/:y:\d+"]);
        let found = t.find("/a/5").unwrap();
        assert_eq!(*found.value, "/a/:x");
        assert_eq!(found.params, params(&[("x", "5")]));
    }

    #[test]
    fn digit_classes_are_ascii_only() {
        let t = trie(&[r"/n/:id:\d+", "/any/:v:.+", r"/w/:word:\w+"]);
        assert!(t.find("/n/42").is_some());
        assert!(t.find("/n/١٢").is_none());
        assert!(t.find("/w/é").is_none());
        assert_eq!(t.find("/any/café").unwrap().params["v"], "café");
    }

    #[test]
    fn rejects_malformed_patterns() {
        let mut t = PathTrie::new();
        assert!(matches!(t.insert("admin", ()), Err(RouteError::MissingLeadingSlash)));
        assert!(matches!(t.insert("/a/:", ()), Err(RouteError::EmptyWildcardName(_))));
        assert!(matches!(t.insert("/a/:*/b", ()), Err(RouteError::CatchAllNotLast)));
        assert!(matches!(t.insert("/a/:id:(", ()), Err(RouteError::InvalidRegex { .. })));
    }

    #[test]
    fn rejects_structural_duplicates() {
        let mut t = PathTrie::new();
        t.insert("/users/:id", 1).unwrap();
        assert!(matches!(t.insert("/users/:id", 2), Err(RouteError::Duplicate)));
        assert!(matches!(t.insert("/users/:name/", 3), Err(RouteError::Duplicate)));
        t.insert(r"/users/:id:\d+", 4).unwrap();
        assert!(matches!(t.insert(r"/users/:n:\d+", 5), Err(RouteError::Duplicate)));
    }
}
