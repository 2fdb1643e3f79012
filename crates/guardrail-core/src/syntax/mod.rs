// SPDX-License-Identifier: Apache-2.0

//! Python syntax trees.
//!
//! Source text is parsed with `tree-sitter-python` and lowered into the
//! closed [`NodeKind`] sum type. Parsing fails distinctly on malformed input
//! so callers can mark a revision unanalyzable instead of aborting.

mod lower;
mod node;

use tracing::{debug, instrument};
use tree_sitter::{Node as TsNode, Parser};

pub use node::{BoolOp, CompareOp, LineSpan, Literal, Node, NodeKind};

use crate::error::GuardrailError;
use lower::{Lowerer, span_of};

/// A parsed and lowered Python module together with its source lines.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    root: Node,
    lines: Vec<String>,
}

impl SyntaxTree {
    /// Parses `source`. `label` names the revision ("old" or "new") in errors.
    ///
    /// # Errors
    ///
    /// Returns `GuardrailError::Parse` if the source contains a syntax error,
    /// or `GuardrailError::Grammar` if the parser cannot be initialized.
    #[instrument(skip(source), fields(bytes = source.len()))]
    pub fn parse(source: &str, label: &str) -> crate::Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| GuardrailError::Parse {
                label: label.to_string(),
                reason: "parser produced no tree".to_string(),
                line: 1,
            })?;

        let ts_root = tree.root_node();
        if ts_root.has_error() {
            let (line, reason) = first_error(ts_root, source)
                .unwrap_or_else(|| (1, "invalid syntax".to_string()));
            debug!(label, line, %reason, "Revision is unanalyzable");
            return Err(GuardrailError::Parse {
                label: label.to_string(),
                reason,
                line,
            });
        }

        let root = Lowerer::new(source).lower_module(ts_root);
        let lines = source.lines().map(str::to_string).collect();
        Ok(Self { root, lines })
    }

    /// The lowered module node.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of source lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Source text of a 1-indexed line, or `""` when out of range.
    #[must_use]
    pub fn line(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map_or("", String::as_str)
    }

    /// Lines of `span`, trimmed and joined with single spaces.
    #[must_use]
    pub fn excerpt(&self, span: LineSpan) -> String {
        span.lines()
            .map(|l| self.line(l).trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Line and description of the first `ERROR` or `MISSING` node in document order.
fn first_error(node: TsNode<'_>, source: &str) -> Option<(usize, String)> {
    if node.is_missing() {
        return Some((span_of(node).start, format!("missing `{}`", node.kind())));
    }
    if node.is_error() {
        let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
        let token: String = text.split_whitespace().next().unwrap_or("").chars().take(20).collect();
        let reason = if token.is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("unexpected `{token}`")
        };
        return Some((span_of(node).start, reason));
    }
    let mut cursor = node.walk();
    let children: Vec<TsNode<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(|child| first_error(child, source))
}
