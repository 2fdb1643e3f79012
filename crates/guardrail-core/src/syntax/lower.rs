// SPDX-License-Identifier: Apache-2.0

//! Lowering from the tree-sitter concrete syntax tree into [`Node`].

use tree_sitter::Node as TsNode;

use super::node::{BoolOp, CompareOp, LineSpan, Literal, Node, NodeKind};

/// Converts tree-sitter positions into lowered nodes.
pub(super) struct Lowerer<'a> {
    source: &'a [u8],
}

impl<'a> Lowerer<'a> {
    pub(super) fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
        }
    }

    /// Lowers a `module` node.
    pub(super) fn lower_module(&self, root: TsNode<'_>) -> Node {
        Node {
            kind: NodeKind::Module {
                body: self.lower_children(root),
            },
            span: span_of(root),
        }
    }

    fn text(&self, node: TsNode<'_>) -> &'a str {
        node.utf8_text(self.source).unwrap_or_default()
    }

    /// Lowers every named child, dropping comments.
    fn lower_children(&self, node: TsNode<'_>) -> Vec<Node> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter_map(|child| self.lower(child))
            .collect()
    }

    fn lower_field(&self, node: TsNode<'_>, field: &str) -> Option<Node> {
        node.child_by_field_name(field).and_then(|n| self.lower(n))
    }

    fn lower_block_field(&self, node: TsNode<'_>, field: &str) -> Vec<Node> {
        node.child_by_field_name(field)
            .map(|block| self.lower_children(block))
            .unwrap_or_default()
    }

    fn boxed_field(&self, node: TsNode<'_>, field: &str) -> Box<Node> {
        Box::new(
            self.lower_field(node, field)
                .unwrap_or_else(|| other(node, Vec::new())),
        )
    }

    /// Lowers any node. Returns `None` for nodes that carry no structure (comments).
    fn lower(&self, node: TsNode<'_>) -> Option<Node> {
        let span = span_of(node);
        let kind = match node.kind() {
            "comment" | "line_continuation" => return None,
            "module" | "block" => NodeKind::Other {
                children: self.lower_children(node),
            },
            "decorated_definition" => return self.lower_decorated(node),
            "function_definition" => NodeKind::FunctionDef {
                name: self.field_text(node, "name"),
                header: span.start,
                decorators: Vec::new(),
                body: self.lower_block_field(node, "body"),
            },
            "class_definition" => NodeKind::ClassDef {
                name: self.field_text(node, "name"),
                decorators: Vec::new(),
                body: self.lower_block_field(node, "body"),
            },
            "if_statement" => return Some(self.lower_if(node)),
            "while_statement" => NodeKind::While {
                test: self.boxed_field(node, "condition"),
                body: self.lower_block_field(node, "body"),
                orelse: self.else_body(node),
            },
            "for_statement" => NodeKind::For {
                target: self.boxed_field(node, "left"),
                iter: self.boxed_field(node, "right"),
                body: self.lower_block_field(node, "body"),
                orelse: self.else_body(node),
            },
            "with_statement" => NodeKind::With {
                items: self.with_items(node),
                body: self.lower_block_field(node, "body"),
            },
            "try_statement" => self.lower_try(node),
            "except_clause" | "except_group_clause" => self.lower_except(node),
            "raise_statement" => NodeKind::Raise {
                exc: self.first_named(node).map(Box::new),
            },
            "return_statement" => NodeKind::Return {
                value: self.first_named(node).map(Box::new),
            },
            "expression_statement" => return self.lower_expression_statement(node),
            "assignment" | "augmented_assignment" => NodeKind::Assign {
                targets: self.lower_field(node, "left").into_iter().collect(),
                value: self.lower_field(node, "right").map(Box::new),
            },
            "call" => NodeKind::Call {
                func: self.boxed_field(node, "function"),
                args: self.call_args(node),
            },
            "attribute" => NodeKind::Attribute {
                value: self.boxed_field(node, "object"),
                attr: self.field_text(node, "attribute"),
            },
            "identifier" => NodeKind::Name(self.text(node).to_string()),
            "comparison_operator" => self.lower_compare(node),
            "boolean_operator" => self.lower_bool_op(node),
            "not_operator" => NodeKind::Not {
                operand: self.boxed_field(node, "argument"),
            },
            "parenthesized_expression" => return self.first_named(node),
            "decorator" => return self.first_named(node),
            "keyword_argument" => return self.lower_field(node, "value"),
            "string" | "concatenated_string" => {
                NodeKind::Literal(Literal::Str(self.string_value(node)))
            }
            "integer" | "float" => NodeKind::Literal(Literal::Number(self.text(node).to_string())),
            "true" => NodeKind::Literal(Literal::Bool(true)),
            "false" => NodeKind::Literal(Literal::Bool(false)),
            "none" => NodeKind::Literal(Literal::None),
            "tuple" | "list" | "set" | "expression_list" | "pattern_list" => NodeKind::Collection {
                elements: self.lower_children(node),
            },
            _ => NodeKind::Other {
                children: self.lower_children(node),
            },
        };
        Some(Node { kind, span })
    }

    fn field_text(&self, node: TsNode<'_>, field: &str) -> String {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_string())
            .unwrap_or_default()
    }

    fn first_named(&self, node: TsNode<'_>) -> Option<Node> {
        let mut cursor = node.walk();
        let mut children = node.named_children(&mut cursor);
        children.find_map(|child| self.lower(child))
    }

    fn lower_decorated(&self, node: TsNode<'_>) -> Option<Node> {
        let mut cursor = node.walk();
        let decorators: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "decorator")
            .filter_map(|child| self.lower(child))
            .collect();
        let mut definition = self.lower_field(node, "definition")?;
        match &mut definition.kind {
            NodeKind::FunctionDef {
                decorators: slot, ..
            }
            | NodeKind::ClassDef {
                decorators: slot, ..
            } => *slot = decorators,
            _ => {}
        }
        Some(definition)
    }

    /// `if` with `elif` chains folded into nested `If` nodes in `orelse`.
    fn lower_if(&self, node: TsNode<'_>) -> Node {
        let mut cursor = node.walk();
        let alternatives: Vec<TsNode<'_>> = node
            .children_by_field_name("alternative", &mut cursor)
            .collect();

        let mut orelse = Vec::new();
        for alt in alternatives.iter().rev() {
            match alt.kind() {
                "else_clause" => orelse = self.lower_block_field(*alt, "body"),
                "elif_clause" => {
                    let nested = Node {
                        kind: NodeKind::If {
                            test: self.boxed_field(*alt, "condition"),
                            body: self.lower_block_field(*alt, "consequence"),
                            orelse: std::mem::take(&mut orelse),
                        },
                        span: span_of(*alt),
                    };
                    orelse = vec![nested];
                }
                _ => {}
            }
        }

        Node {
            kind: NodeKind::If {
                test: self.boxed_field(node, "condition"),
                body: self.lower_block_field(node, "consequence"),
                orelse,
            },
            span: span_of(node),
        }
    }

    fn else_body(&self, node: TsNode<'_>) -> Vec<Node> {
        node.child_by_field_name("alternative")
            .map(|alt| self.lower_block_field(alt, "body"))
            .unwrap_or_default()
    }

    fn with_items(&self, node: TsNode<'_>) -> Vec<Node> {
        let mut cursor = node.walk();
        let mut items = Vec::new();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "with_clause" {
                continue;
            }
            let mut inner = child.walk();
            for item in child.named_children(&mut inner) {
                if let Some(value) = self.lower_field(item, "value") {
                    items.push(value);
                }
            }
        }
        items
    }

    fn lower_try(&self, node: TsNode<'_>) -> NodeKind {
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "except_clause" | "except_group_clause" => {
                    handlers.extend(self.lower(child));
                }
                "else_clause" => orelse = self.lower_block_field(child, "body"),
                "finally_clause" => {
                    finalbody = self.block_child(child);
                }
                _ => {}
            }
        }

        NodeKind::Try {
            body: self.lower_block_field(node, "body"),
            handlers,
            orelse,
            finalbody,
        }
    }

    fn block_child(&self, node: TsNode<'_>) -> Vec<Node> {
        let mut cursor = node.walk();
        let block = node
            .named_children(&mut cursor)
            .find(|child| child.kind() == "block");
        block.map(|b| self.lower_children(b)).unwrap_or_default()
    }

    fn lower_except(&self, node: TsNode<'_>) -> NodeKind {
        let mut cursor = node.walk();
        let exc_type = node
            .named_children(&mut cursor)
            .find(|child| child.kind() != "block" && child.kind() != "comment")
            .and_then(|child| {
                if child.kind() == "as_pattern" {
                    self.first_named(child)
                } else {
                    self.lower(child)
                }
            })
            .map(Box::new);

        NodeKind::ExceptHandler {
            exc_type,
            body: self.block_child(node),
        }
    }

    fn lower_expression_statement(&self, node: TsNode<'_>) -> Option<Node> {
        let mut cursor = node.walk();
        let mut values: Vec<Node> = node
            .named_children(&mut cursor)
            .filter_map(|child| self.lower(child))
            .collect();
        let span = span_of(node);

        let value = match values.len() {
            0 => return None,
            1 => values.remove(0),
            _ => Node {
                kind: NodeKind::Collection { elements: values },
                span,
            },
        };

        if matches!(value.kind, NodeKind::Assign { .. }) {
            return Some(Node {
                kind: value.kind,
                span,
            });
        }

        Some(Node {
            kind: NodeKind::Expr {
                value: Box::new(value),
            },
            span,
        })
    }

    fn call_args(&self, node: TsNode<'_>) -> Vec<Node> {
        node.child_by_field_name("arguments")
            .map(|args| self.lower_children(args))
            .unwrap_or_default()
    }

    fn lower_compare(&self, node: TsNode<'_>) -> NodeKind {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut previous = String::new();

        // `not in` and `is not` may arrive as one token or as two
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.is_named() {
                if let Some(operand) = self.lower(child) {
                    operands.push(operand);
                }
                previous.clear();
                continue;
            }
            let token = self
                .text(child)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            match (previous.as_str(), token.as_str()) {
                ("not", "in") => {
                    ops.push(CompareOp::NotIn);
                }
                ("is", "not") => {
                    ops.pop();
                    ops.push(CompareOp::IsNot);
                }
                (_, tok) => {
                    if let Some(op) = CompareOp::from_token(tok) {
                        ops.push(op);
                    }
                }
            }
            previous = token;
        }

        let mut operands = operands.into_iter();
        let left = operands
            .next()
            .unwrap_or_else(|| other(node, Vec::new()));
        NodeKind::Compare {
            left: Box::new(left),
            ops,
            comparators: operands.collect(),
        }
    }

    fn lower_bool_op(&self, node: TsNode<'_>) -> NodeKind {
        let op = match node.child_by_field_name("operator").map(|n| n.kind()) {
            Some("or") => BoolOp::Or,
            _ => BoolOp::And,
        };
        let mut values = Vec::new();
        for side in ["left", "right"] {
            if let Some(value) = self.lower_field(node, side) {
                // Flatten `a and b and c` into one node
                match value.kind {
                    NodeKind::BoolOp {
                        op: inner,
                        values: nested,
                    } if inner == op => values.extend(nested),
                    kind => values.push(Node {
                        kind,
                        span: value.span,
                    }),
                }
            }
        }
        NodeKind::BoolOp { op, values }
    }

    /// String contents without quotes or prefixes.
    fn string_value(&self, node: TsNode<'_>) -> String {
        if node.kind() == "concatenated_string" {
            let mut cursor = node.walk();
            return node
                .named_children(&mut cursor)
                .map(|part| self.string_value(part))
                .collect();
        }
        let mut cursor = node.walk();
        let parts: Vec<&str> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "string_content")
            .map(|child| self.text(child))
            .collect();
        parts.concat()
    }
}

fn other(node: TsNode<'_>, children: Vec<Node>) -> Node {
    Node {
        kind: NodeKind::Other { children },
        span: span_of(node),
    }
}

/// 1-indexed inclusive line span of a tree-sitter node.
pub(super) fn span_of(node: TsNode<'_>) -> LineSpan {
    let start = node.start_position();
    let end = node.end_position();
    // A node ending at column 0 ends on the previous line
    let end_line = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    LineSpan::new(start.row + 1, end_line)
}
