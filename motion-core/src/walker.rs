//! Generic depth-first traversal over document trees.
//!
//! Every heuristic shares this one walk. A [`Visitor`] sees each mapping
//! twice: [`Visitor::enter`] before its children (inspection and in-place
//! mutation) and [`Visitor::leave`] after them (removal decisions, which may
//! depend on what the children contained). Sequences are rebuilt after all of
//! their members have been visited, dropping members that asked to be
//! removed. Scalars are leaves and are never handed to the visitor.

use serde_json::{Map, Value};

/// A visitor's verdict on a mapping node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Visit {
    /// Keep the node (and, from [`Visitor::enter`], descend into it).
    Keep,
    /// Remove the node from its parent sequence.
    ///
    /// Ignored for nodes that are not sequence members.
    Remove,
}

/// Where a mapping node sits in the document.
#[derive(Debug, Clone)]
pub struct VisitContext {
    pointer: String,
    member_of: Option<String>,
    depth: usize,
}

impl VisitContext {
    fn root() -> Self {
        Self {
            pointer: String::new(),
            member_of: None,
            depth: 0,
        }
    }

    fn field(&self, key: &str) -> Self {
        Self {
            pointer: format!("{}/{}", self.pointer, escape_pointer_token(key)),
            member_of: None,
            depth: self.depth + 1,
        }
    }

    fn element(&self, index: usize, member_of: Option<&str>) -> Self {
        Self {
            pointer: format!("{}/{index}", self.pointer),
            member_of: member_of.map(str::to_string),
            depth: self.depth + 1,
        }
    }

    /// JSON pointer (RFC 6901) of the node, as it was before any removals.
    #[must_use]
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    /// Key of the mapping entry holding the sequence this node belongs to.
    ///
    /// `None` for the root, for mapping-valued fields and for members of
    /// nested sequences.
    #[must_use]
    pub fn member_of(&self) -> Option<&str> {
        self.member_of.as_deref()
    }

    /// Whether the node is a direct member of a sequence stored under `key`.
    #[must_use]
    pub fn is_member_of(&self, key: &str) -> bool {
        self.member_of() == Some(key)
    }

    /// Nesting depth; the root is at depth zero.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Callbacks invoked on every mapping node during a [`walk`].
pub trait Visitor {
    /// Called before the node's children are walked.
    ///
    /// Returning [`Visit::Remove`] skips the children and [`Visitor::leave`].
    fn enter(&mut self, node: &mut Map<String, Value>, ctx: &VisitContext) -> Visit;

    /// Called after the node's children are walked.
    fn leave(&mut self, _node: &mut Map<String, Value>, _ctx: &VisitContext) -> Visit {
        Visit::Keep
    }
}

/// Counters collected over one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Mapping nodes handed to the visitor.
    pub visited: usize,
    /// Sequence members dropped.
    pub removed: usize,
}

/// Walk `root` depth-first, applying `visitor` to every mapping node.
pub fn walk<V: Visitor + ?Sized>(root: &mut Value, visitor: &mut V) -> WalkStats {
    let mut stats = WalkStats::default();
    let ctx = VisitContext::root();
    match root {
        Value::Object(map) => {
            // The root has no parent sequence, so a removal verdict is moot.
            let _ = walk_map(map, visitor, &ctx, &mut stats);
        }
        Value::Array(items) => walk_sequence(items, None, visitor, &ctx, &mut stats),
        _ => {}
    }
    tracing::trace!(
        visited = stats.visited,
        removed = stats.removed,
        "walk finished"
    );
    stats
}

fn walk_map<V: Visitor + ?Sized>(
    map: &mut Map<String, Value>,
    visitor: &mut V,
    ctx: &VisitContext,
    stats: &mut WalkStats,
) -> Visit {
    stats.visited += 1;
    if visitor.enter(map, ctx) == Visit::Remove {
        return Visit::Remove;
    }

    for (key, child) in map.iter_mut() {
        let child_ctx = ctx.field(key);
        match child {
            Value::Object(inner) => {
                let _ = walk_map(inner, visitor, &child_ctx, stats);
            }
            Value::Array(items) => {
                walk_sequence(items, Some(key.as_str()), visitor, &child_ctx, stats);
            }
            _ => {}
        }
    }

    visitor.leave(map, ctx)
}

fn walk_sequence<V: Visitor + ?Sized>(
    items: &mut Vec<Value>,
    member_of: Option<&str>,
    visitor: &mut V,
    ctx: &VisitContext,
    stats: &mut WalkStats,
) {
    let mut keep = Vec::with_capacity(items.len());
    for (index, item) in items.iter_mut().enumerate() {
        let item_ctx = ctx.element(index, member_of);
        let verdict = match item {
            Value::Object(map) => walk_map(map, visitor, &item_ctx, stats),
            Value::Array(inner) => {
                walk_sequence(inner, None, visitor, &item_ctx, stats);
                Visit::Keep
            }
            _ => Visit::Keep,
        };
        keep.push(verdict == Visit::Keep);
    }

    let removed = keep.iter().filter(|kept| !**kept).count();
    if removed > 0 {
        let mut flags = keep.into_iter();
        items.retain(|_| flags.next().unwrap_or(true));
        stats.removed += removed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Records every pointer in visit order.
    struct Recorder {
        entered: Vec<String>,
        left: Vec<String>,
    }

    impl Visitor for Recorder {
        fn enter(&mut self, _node: &mut Map<String, Value>, ctx: &VisitContext) -> Visit {
            self.entered.push(ctx.pointer().to_string());
            Visit::Keep
        }

        fn leave(&mut self, _node: &mut Map<String, Value>, ctx: &VisitContext) -> Visit {
            self.left.push(ctx.pointer().to_string());
            Visit::Keep
        }
    }

    /// Removes every mapping with `"drop": true`.
    struct Dropper;

    impl Visitor for Dropper {
        fn enter(&mut self, _node: &mut Map<String, Value>, _ctx: &VisitContext) -> Visit {
            Visit::Keep
        }

        fn leave(&mut self, node: &mut Map<String, Value>, _ctx: &VisitContext) -> Visit {
            if node.get("drop") == Some(&Value::Bool(true)) {
                Visit::Remove
            } else {
                Visit::Keep
            }
        }
    }

    #[test]
    fn test_parent_entered_before_children_and_left_after() {
        let mut doc = json!({"a": {"b": {}}, "list": [{"c": 1}]});
        let mut recorder = Recorder {
            entered: Vec::new(),
            left: Vec::new(),
        };
        let stats = walk(&mut doc, &mut recorder);

        assert_eq!(recorder.entered, vec!["", "/a", "/a/b", "/list/0"]);
        assert_eq!(recorder.left, vec!["/a/b", "/a", "/list/0", ""]);
        assert_eq!(stats.visited, 4);
        assert_eq!(stats.removed, 0);
    }

    #[test]
    fn test_removal_rebuilds_sequence() {
        let mut doc = json!({
            "items": [
                {"id": 1},
                {"id": 2, "drop": true},
                {"id": 3},
                {"id": 4, "drop": true}
            ]
        });
        let stats = walk(&mut doc, &mut Dropper);
        assert_eq!(doc, json!({"items": [{"id": 1}, {"id": 3}]}));
        assert_eq!(stats.removed, 2);
    }

    #[test]
    fn test_removal_outside_sequence_is_ignored() {
        let mut doc = json!({"drop": true, "child": {"drop": true}});
        let original = doc.clone();
        let stats = walk(&mut doc, &mut Dropper);
        assert_eq!(doc, original);
        assert_eq!(stats.removed, 0);
    }

    #[test]
    fn test_member_of_tracks_containing_key() {
        struct Members(Vec<(String, Option<String>)>);
        impl Visitor for Members {
            fn enter(&mut self, _node: &mut Map<String, Value>, ctx: &VisitContext) -> Visit {
                self.0
                    .push((ctx.pointer().to_string(), ctx.member_of().map(str::to_string)));
                Visit::Keep
            }
        }

        let mut doc = json!({"layers": [{"shapes": [[{"x": 1}]]}]});
        let mut members = Members(Vec::new());
        let _ = walk(&mut doc, &mut members);
        assert_eq!(
            members.0,
            vec![
                (String::new(), None),
                ("/layers/0".to_string(), Some("layers".to_string())),
                ("/layers/0/shapes/0/0".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_pointer_tokens_are_escaped() {
        let mut doc = json!({"a/b": {"c~d": {}}});
        let mut recorder = Recorder {
            entered: Vec::new(),
            left: Vec::new(),
        };
        let _ = walk(&mut doc, &mut recorder);
        assert_eq!(recorder.entered, vec!["", "/a~1b", "/a~1b/c~0d"]);
        assert!(doc.pointer("/a~1b/c~0d").is_some());
    }

    #[test]
    fn test_scalar_root_is_untouched() {
        let mut doc = json!(42);
        let stats = walk(&mut doc, &mut Dropper);
        assert_eq!(doc, json!(42));
        assert_eq!(stats, WalkStats::default());
    }
}
