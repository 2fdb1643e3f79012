// SPDX-License-Identifier: Apache-2.0

//! Lowered Python syntax tree.
//!
//! The concrete tree-sitter tree is lowered into this closed set of node
//! kinds so that pattern extraction is a single exhaustive `match`. Comments
//! do not survive lowering, and string contents are opaque leaves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive, 1-indexed range of source lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    /// First line (1-indexed).
    pub start: usize,
    /// Last line (1-indexed, inclusive).
    pub end: usize,
}

impl LineSpan {
    /// Creates a span, swapping the bounds if they are reversed.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// Span covering a single line.
    #[must_use]
    pub fn line(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    /// Iterates every line in the span.
    pub fn lines(&self) -> impl Iterator<Item = usize> {
        self.start..=self.end
    }

    /// Returns true if `line` lies inside the span.
    #[must_use]
    pub fn contains(&self, line: usize) -> bool {
        (self.start..=self.end).contains(&line)
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn join(&self, other: LineSpan) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Line distance between the starts of two spans.
    #[must_use]
    pub fn distance(&self, other: LineSpan) -> usize {
        self.start.abs_diff(other.start)
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A lowered syntax node: its kind plus the lines it occupies.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node kind and payload.
    pub kind: NodeKind,
    /// Lines covered by the node.
    pub span: LineSpan,
}

/// Comparison operators in a comparison chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOp {
    /// Parses a tree-sitter operator token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::NotEq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::LtE),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::GtE),
            "in" => Some(Self::In),
            "not in" => Some(Self::NotIn),
            "is" => Some(Self::Is),
            "is not" => Some(Self::IsNot),
            _ => None,
        }
    }

    /// Canonical source spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }
}

/// Boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// Literal values. String contents are kept for operand comparison only.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(String),
    Bool(bool),
    None,
}

/// Closed set of node kinds the extractor understands.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Top-level module body.
    Module { body: Vec<Node> },
    /// `def` (sync or async). `header` is the line of the `def` keyword.
    FunctionDef {
        name: String,
        header: usize,
        decorators: Vec<Node>,
        body: Vec<Node>,
    },
    /// `class` definition.
    ClassDef {
        name: String,
        decorators: Vec<Node>,
        body: Vec<Node>,
    },
    /// `if` / `elif` (an `elif` is lowered into a nested `If` in `orelse`).
    If {
        test: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
    },
    /// `while` loop.
    While {
        test: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
    },
    /// `for` loop.
    For {
        target: Box<Node>,
        iter: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
    },
    /// `with` statement.
    With { items: Vec<Node>, body: Vec<Node> },
    /// `try` statement.
    Try {
        body: Vec<Node>,
        handlers: Vec<Node>,
        orelse: Vec<Node>,
        finalbody: Vec<Node>,
    },
    /// `except` clause; `exc_type` is `None` for a bare `except:`.
    ExceptHandler {
        exc_type: Option<Box<Node>>,
        body: Vec<Node>,
    },
    /// `raise` statement.
    Raise { exc: Option<Box<Node>> },
    /// `return` statement.
    Return { value: Option<Box<Node>> },
    /// Plain or augmented assignment.
    Assign {
        targets: Vec<Node>,
        value: Option<Box<Node>>,
    },
    /// Expression used as a statement.
    Expr { value: Box<Node> },
    /// Function or method call. Keyword argument values are included in `args`.
    Call { func: Box<Node>, args: Vec<Node> },
    /// `value.attr`.
    Attribute { value: Box<Node>, attr: String },
    /// Bare identifier.
    Name(String),
    /// Comparison chain `left op0 c0 op1 c1 ...`.
    Compare {
        left: Box<Node>,
        ops: Vec<CompareOp>,
        comparators: Vec<Node>,
    },
    /// `and` / `or`.
    BoolOp { op: BoolOp, values: Vec<Node> },
    /// `not operand`.
    Not { operand: Box<Node> },
    /// Literal constant.
    Literal(Literal),
    /// Tuple, list or set display.
    Collection { elements: Vec<Node> },
    /// Anything else; children are still traversed.
    Other { children: Vec<Node> },
}

impl Node {
    /// Dotted name of a `Name`/`Attribute` chain (`self.db.add`), or the callee of a call.
    #[must_use]
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Name(id) => Some(id.clone()),
            NodeKind::Attribute { value, attr } => match value.dotted_name() {
                Some(prefix) => Some(format!("{prefix}.{attr}")),
                None => Some(attr.clone()),
            },
            NodeKind::Call { func, .. } => func.dotted_name(),
            _ => None,
        }
    }

    /// Last segment of a name chain (`db.add` -> `add`), or the callee's for a call.
    #[must_use]
    pub fn terminal_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Name(id) => Some(id),
            NodeKind::Attribute { attr, .. } => Some(attr),
            NodeKind::Call { func, .. } => func.terminal_name(),
            _ => None,
        }
    }

    /// Returns the string value if the node is a string literal.
    #[must_use]
    pub fn as_str_literal(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Literal(Literal::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Variable-name-insensitive structural signature.
    ///
    /// Identifiers collapse to `_`, while attribute names, callee names,
    /// operators and literal operands are kept.
    #[must_use]
    pub fn shape(&self) -> String {
        match &self.kind {
            NodeKind::Name(_) => "_".to_string(),
            NodeKind::Attribute { value, attr } => format!("{}.{attr}", value.shape()),
            NodeKind::Call { func, args } => {
                let callee = func.terminal_name().unwrap_or("_");
                let args: Vec<String> = args.iter().map(Node::shape).collect();
                format!("{callee}({})", args.join(","))
            }
            NodeKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut out = left.shape();
                for (op, rhs) in ops.iter().zip(comparators) {
                    out.push_str(op.as_str());
                    out.push_str(&rhs.shape());
                }
                format!("cmp({out})")
            }
            NodeKind::BoolOp { op, values } => {
                let sep = match op {
                    BoolOp::And => " and ",
                    BoolOp::Or => " or ",
                };
                let parts: Vec<String> = values.iter().map(Node::shape).collect();
                format!("({})", parts.join(sep))
            }
            NodeKind::Not { operand } => format!("not {}", operand.shape()),
            NodeKind::Literal(Literal::Str(s)) => format!("{s:?}"),
            NodeKind::Literal(Literal::Number(n)) => n.clone(),
            NodeKind::Literal(Literal::Bool(b)) => if *b { "True" } else { "False" }.to_string(),
            NodeKind::Literal(Literal::None) => "None".to_string(),
            NodeKind::Collection { elements } => {
                let parts: Vec<String> = elements.iter().map(Node::shape).collect();
                format!("[{}]", parts.join(","))
            }
            NodeKind::Raise { exc } => match exc {
                Some(exc) => format!("raise {}", exc.shape()),
                None => "raise".to_string(),
            },
            _ => "…".to_string(),
        }
    }
}
