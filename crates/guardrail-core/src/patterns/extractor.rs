// SPDX-License-Identifier: Apache-2.0

//! Single-pass pattern extraction over the lowered syntax tree.

use std::collections::HashSet;

use tracing::debug;

use super::{PatternRules, PatternType, SecurityPattern};
use crate::severity;
use crate::syntax::{CompareOp, LineSpan, Node, NodeKind, SyntaxTree};

/// Longest snippet kept on a pattern, in characters.
const MAX_SNIPPET_CHARS: usize = 160;

/// Extracts [`SecurityPattern`]s from syntax trees.
#[derive(Debug, Clone, Default)]
pub struct PatternExtractor {
    rules: PatternRules,
}

impl PatternExtractor {
    /// Creates an extractor with the given keyword rules.
    #[must_use]
    pub fn new(rules: PatternRules) -> Self {
        Self { rules }
    }

    /// Returns every pattern in `tree`, ordered by appearance.
    #[must_use]
    pub fn extract(&self, tree: &SyntaxTree) -> Vec<SecurityPattern> {
        let mut walk = Walk {
            rules: &self.rules,
            tree,
            scope: None,
            owner: None,
            in_test: false,
            folded: HashSet::new(),
            out: Vec::new(),
        };
        walk.visit(tree.root());

        let mut patterns = walk.out;
        patterns.sort_by_key(|p| (p.line_range.start, p.line_range.end, p.pattern_type));
        debug!(count = patterns.len(), "Patterns extracted");
        patterns
    }

    /// Like [`extract`](Self::extract), keeping only the patterns that apply to `path`.
    #[must_use]
    pub fn extract_file(&self, path: &str, tree: &SyntaxTree) -> Vec<SecurityPattern> {
        let mut patterns = self.extract(tree);
        patterns.retain(|p| self.rules.applies_to(p.pattern_type, path));
        patterns
    }
}

/// A check found inside a condition, before it is turned into a pattern.
struct ConditionCheck {
    pattern_type: PatternType,
    anchors: Vec<String>,
    detail: String,
}

struct Walk<'a> {
    rules: &'a PatternRules,
    tree: &'a SyntaxTree,
    /// Enclosing function name.
    scope: Option<String>,
    /// Function a decorator or definition pattern belongs to.
    owner: Option<String>,
    /// True while visiting a condition already analysed as a whole.
    in_test: bool,
    /// Spans of permission-denial raises folded into their guard.
    folded: HashSet<LineSpan>,
    out: Vec<SecurityPattern>,
}

impl Walk<'_> {
    fn visit_all(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.visit(node);
        }
    }

    fn visit(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Module { body } => self.visit_all(body),
            NodeKind::FunctionDef {
                name,
                header,
                decorators,
                body,
            } => {
                self.owner = Some(name.clone());
                for decorator in decorators {
                    self.decorator(decorator, Some(name));
                }
                self.function_name(name, *header);
                self.owner = None;
                let outer = self.scope.replace(name.clone());
                self.visit_all(body);
                self.scope = outer;
            }
            NodeKind::ClassDef {
                decorators, body, ..
            } => {
                for decorator in decorators {
                    self.decorator(decorator, None);
                }
                self.visit_all(body);
            }
            NodeKind::If { test, body, orelse } => {
                self.condition(node, test, body, true);
                self.visit_test(test);
                self.visit_all(body);
                self.visit_all(orelse);
            }
            NodeKind::While { test, body, orelse } => {
                self.condition(node, test, body, false);
                self.visit_test(test);
                self.visit_all(body);
                self.visit_all(orelse);
            }
            NodeKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.visit(target);
                self.visit(iter);
                self.visit_all(body);
                self.visit_all(orelse);
            }
            NodeKind::With { items, body } => {
                self.visit_all(items);
                self.visit_all(body);
            }
            NodeKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.try_block(node, handlers);
                self.visit_all(body);
                self.visit_all(handlers);
                self.visit_all(orelse);
                self.visit_all(finalbody);
            }
            NodeKind::ExceptHandler { body, .. } => self.visit_all(body),
            NodeKind::Raise { exc } => {
                if let Some(exc) = exc {
                    self.raise(node, exc);
                    self.visit(exc);
                }
            }
            NodeKind::Return { value } => {
                if let Some(value) = value {
                    self.visit(value);
                }
            }
            NodeKind::Assign { targets, value } => {
                self.assignment(node, targets);
                self.visit_all(targets);
                if let Some(value) = value {
                    self.visit(value);
                }
            }
            NodeKind::Expr { value } => self.visit(value),
            NodeKind::Call { func, args } => {
                self.call(node, func, args);
                self.visit(func);
                self.visit_all(args);
            }
            NodeKind::Attribute { value, .. } => self.visit(value),
            NodeKind::Name(_) | NodeKind::Literal(_) => {}
            NodeKind::Compare {
                left, comparators, ..
            } => {
                if !self.in_test {
                    self.free_comparison(node);
                }
                self.visit(left);
                self.visit_all(comparators);
            }
            NodeKind::BoolOp { values, .. } => self.visit_all(values),
            NodeKind::Not { operand } => self.visit(operand),
            NodeKind::Collection { elements } => self.visit_all(elements),
            NodeKind::Other { children } => self.visit_all(children),
        }
    }

    /// Visits a condition for nested calls without re-reporting its comparisons.
    fn visit_test(&mut self, test: &Node) {
        let outer = std::mem::replace(&mut self.in_test, true);
        self.visit(test);
        self.in_test = outer;
    }

    fn emit(
        &mut self,
        pattern_type: PatternType,
        line_range: LineSpan,
        context: String,
        anchors: Vec<String>,
        shape: String,
    ) {
        let snippet = truncate(&self.tree.excerpt(line_range), MAX_SNIPPET_CHARS);
        let context = match &self.scope {
            Some(scope) => format!("{context} in {scope}()"),
            None => context,
        };
        debug!(
            pattern = %pattern_type,
            start = line_range.start,
            end = line_range.end,
            "Security pattern matched"
        );

        let mut anchors = anchors;
        anchors.retain(|a| !a.is_empty());
        anchors.dedup();

        self.out.push(SecurityPattern {
            pattern_type,
            severity: severity::classify(pattern_type),
            line_range,
            snippet,
            context,
            source_kind: pattern_type.source_kind(),
            anchors,
            scope: self.owner.clone().or_else(|| self.scope.clone()),
            shape: format!("{}:{shape}", pattern_type.id()),
        });
    }

    /// Checks on an `if`/`elif`/`while` test, with guard folding.
    fn condition(&mut self, node: &Node, test: &Node, body: &[Node], is_if: bool) {
        let mut checks = Vec::new();
        self.collect_checks(test, is_if, &mut checks);
        if checks.is_empty() {
            return;
        }

        let mut range = LineSpan::new(node.span.start, test.span.end);
        let mut shape = test.shape();

        let guards_access = checks
            .iter()
            .any(|c| c.pattern_type.source_kind().is_access_control());
        if guards_access
            && let Some(first) = body.first()
            && let NodeKind::Raise { exc: Some(exc) } = &first.kind
            && exc
                .terminal_name()
                .is_some_and(|name| self.rules.is_permission_error(name))
        {
            range = range.join(first.span);
            shape.push_str("=>");
            shape.push_str(&first.shape());
            self.folded.insert(first.span);
        }

        // One pattern per type; anchors of repeated checks are merged
        let mut merged: Vec<ConditionCheck> = Vec::new();
        for check in checks {
            match merged
                .iter_mut()
                .find(|m| m.pattern_type == check.pattern_type)
            {
                Some(existing) => existing.anchors.extend(check.anchors),
                None => merged.push(check),
            }
        }

        for check in merged {
            let pattern_range = if check.pattern_type.source_kind().is_access_control() {
                range
            } else {
                LineSpan::new(node.span.start, test.span.end)
            };
            self.emit(
                check.pattern_type,
                pattern_range,
                check.detail,
                check.anchors,
                shape.clone(),
            );
        }
    }

    fn collect_checks(&self, test: &Node, is_if: bool, checks: &mut Vec<ConditionCheck>) {
        match &test.kind {
            NodeKind::BoolOp { values, .. } => {
                for value in values {
                    self.collect_checks(value, is_if, checks);
                }
            }
            NodeKind::Not { operand } => self.collect_checks(operand, is_if, checks),
            NodeKind::Name(_) | NodeKind::Attribute { .. } | NodeKind::Call { .. } => {
                if let Some(name) = test.terminal_name()
                    && self.rules.is_authentication_name(name)
                {
                    checks.push(ConditionCheck {
                        pattern_type: PatternType::AuthenticationCheck,
                        anchors: vec![name.to_string()],
                        detail: format!("Authentication check on `{name}`"),
                    });
                }
            }
            NodeKind::Compare {
                left,
                ops,
                comparators,
            } => {
                if let Some(name) = left.terminal_name()
                    && self.rules.is_authentication_name(name)
                {
                    checks.push(ConditionCheck {
                        pattern_type: PatternType::AuthenticationCheck,
                        anchors: vec![name.to_string()],
                        detail: format!("Authentication check on `{name}`"),
                    });
                }
                self.comparison_checks(left, ops, comparators, is_if, checks);
            }
            _ => {}
        }
    }

    /// Role, action and identity checks in one comparison chain.
    fn comparison_checks(
        &self,
        left: &Node,
        ops: &[CompareOp],
        comparators: &[Node],
        is_if: bool,
        checks: &mut Vec<ConditionCheck>,
    ) {
        let mut lhs = left;
        for (op, rhs) in ops.iter().zip(comparators) {
            match op {
                CompareOp::Eq | CompareOp::NotEq => {
                    if let Some(check) = self.role_equality(lhs, *op, rhs) {
                        checks.push(check);
                    }
                }
                CompareOp::In | CompareOp::NotIn => {
                    if let Some(check) = self.membership(lhs, *op, rhs) {
                        checks.push(check);
                    }
                }
                CompareOp::Is | CompareOp::IsNot if is_if => {
                    let subject = lhs.dotted_name().unwrap_or_else(|| "value".to_string());
                    checks.push(ConditionCheck {
                        pattern_type: PatternType::DefensiveCheck,
                        anchors: vec![lhs.terminal_name().unwrap_or_default().to_string()],
                        detail: format!("Defensive `{}` check on `{subject}`", op.as_str()),
                    });
                }
                _ => {}
            }
            lhs = rhs;
        }
    }

    fn role_equality(&self, lhs: &Node, op: CompareOp, rhs: &Node) -> Option<ConditionCheck> {
        let (operand, literal) = match (lhs.as_str_literal(), rhs.as_str_literal()) {
            (None, Some(lit)) => (lhs, lit),
            (Some(lit), None) => (rhs, lit),
            _ => return None,
        };
        let operand_name = operand.terminal_name().unwrap_or_default();
        if !self.rules.is_role_value(literal) && !self.rules.is_role_name(operand_name) {
            return None;
        }
        Some(ConditionCheck {
            pattern_type: PatternType::RoleCheck,
            anchors: vec![literal.to_string(), operand_name.to_string()],
            detail: format!("Role check `{operand_name} {} \"{literal}\"`", op.as_str()),
        })
    }

    fn membership(&self, lhs: &Node, op: CompareOp, rhs: &Node) -> Option<ConditionCheck> {
        let NodeKind::Collection { elements } = &rhs.kind else {
            return None;
        };
        let literals: Vec<String> = elements
            .iter()
            .filter_map(Node::as_str_literal)
            .map(str::to_string)
            .collect();
        if literals.is_empty() {
            return None;
        }
        let name = lhs.terminal_name()?;
        let pattern_type = if self.rules.is_action_name(name) {
            PatternType::ActionWhitelist
        } else if self.rules.is_role_name(name)
            || literals.iter().any(|l| self.rules.is_role_value(l))
        {
            PatternType::RoleCheck
        } else {
            return None;
        };
        let detail = format!(
            "{} `{name} {} ({})`",
            pattern_type.label(),
            op.as_str(),
            literals.join(", ")
        );
        Some(ConditionCheck {
            pattern_type,
            anchors: literals,
            detail,
        })
    }

    /// Role and action checks outside a condition (`allowed = role == "hr"`).
    fn free_comparison(&mut self, node: &Node) {
        let NodeKind::Compare {
            left,
            ops,
            comparators,
        } = &node.kind
        else {
            return;
        };
        let mut checks = Vec::new();
        self.comparison_checks(left, ops, comparators, false, &mut checks);
        for check in checks {
            self.emit(
                check.pattern_type,
                node.span,
                check.detail,
                check.anchors,
                node.shape(),
            );
        }
    }

    fn function_name(&mut self, name: &str, header: usize) {
        let range = LineSpan::line(header);
        let shape = format!("def {name}");
        if self.rules.is_authorization_function(name) {
            self.emit(
                PatternType::AuthorizationFunction,
                range,
                format!("Authorization function `{name}`"),
                vec![name.to_string()],
                shape.clone(),
            );
        }
        if self.rules.is_validation_function(name) {
            self.emit(
                PatternType::InputValidation,
                range,
                format!("Validation function `{name}`"),
                vec![name.to_string()],
                shape.clone(),
            );
        }
        if self.rules.is_mutation_function(name) {
            self.emit(
                PatternType::MutationFunction,
                range,
                format!("Mutation function `{name}`"),
                vec![name.to_string()],
                shape,
            );
        }
    }

    fn decorator(&mut self, decorator: &Node, function: Option<&String>) {
        let Some(dotted) = decorator.dotted_name() else {
            return;
        };
        let terminal = decorator.terminal_name().unwrap_or_default().to_string();
        let args: Vec<&Node> = match &decorator.kind {
            NodeKind::Call { args, .. } => args.iter().collect(),
            _ => Vec::new(),
        };
        let literal_args: Vec<String> = args
            .iter()
            .copied()
            .filter_map(Node::as_str_literal)
            .map(str::to_string)
            .collect();
        let shape = {
            let arg_shapes: Vec<String> = args.iter().map(|a| a.shape()).collect();
            format!("@{dotted}({})", arg_shapes.join(","))
        };
        let function_name = function.cloned().unwrap_or_default();
        let range = decorator.span;

        if self.rules.is_authorization_decorator(&terminal) {
            let mut anchors = literal_args.clone();
            anchors.push(function_name.clone());
            self.emit(
                PatternType::AuthorizationDecorator,
                range,
                format!("Authorization decorator `@{dotted}`"),
                anchors,
                shape.clone(),
            );
        }
        if self.rules.is_rate_limit(&dotted) {
            self.emit(
                PatternType::RateLimiting,
                range,
                format!("Rate limit decorator `@{dotted}`"),
                vec![function_name.clone()],
                shape.clone(),
            );
        }
        if self.rules.is_audit_call(&terminal, &dotted) {
            self.emit(
                PatternType::AuditLogging,
                range,
                format!("Audit decorator `@{dotted}`"),
                vec![function_name.clone()],
                shape.clone(),
            );
        }
        if let NodeKind::Call { func, .. } = &decorator.kind
            && let NodeKind::Attribute { attr, .. } = &func.kind
            && self.rules.is_route_verb(attr)
        {
            let verb = attr.to_lowercase();
            let path = literal_args.first().cloned().unwrap_or_default();
            let mut anchors = Vec::new();
            if !function_name.is_empty() {
                anchors.push(function_name.clone());
                anchors.push(format!("{verb}_{function_name}"));
            }
            anchors.push(path.clone());
            self.emit(
                PatternType::MutatingEndpoint,
                range,
                format!("{} endpoint {path}", verb.to_uppercase()),
                anchors,
                shape,
            );
        }
    }

    /// `state.<attr> = ...`, `state.api_args[key] = ...` and `selected_api = ...`.
    fn assignment(&mut self, node: &Node, targets: &[Node]) {
        for target in targets {
            let Some(mutated) = self.state_target(target) else {
                continue;
            };
            let field = mutated.rsplit('.').next().unwrap_or_default().to_string();
            let scope = self.scope.clone().unwrap_or_default();
            let shape = format!("{mutated}=");
            self.emit(
                PatternType::StateMutation,
                node.span,
                format!("State mutation `{mutated}`"),
                vec![field, scope],
                shape,
            );
        }
    }

    fn state_target(&self, target: &Node) -> Option<String> {
        match &target.kind {
            NodeKind::Name(name) if self.rules.is_state_variable(name) => Some(name.clone()),
            NodeKind::Attribute { .. } => {
                let dotted = target.dotted_name()?;
                let (owners, _) = dotted.rsplit_once('.')?;
                owners
                    .split('.')
                    .any(|owner| self.rules.is_state_receiver(owner))
                    .then_some(dotted)
            }
            // Subscript target: the subscripted value comes first
            NodeKind::Other { children } => children.first().and_then(|c| self.state_target(c)),
            NodeKind::Collection { elements } => {
                elements.iter().find_map(|e| self.state_target(e))
            }
            _ => None,
        }
    }

    fn try_block(&mut self, node: &Node, handlers: &[Node]) {
        if handlers.is_empty() {
            return;
        }
        let caught: Vec<String> = handlers
            .iter()
            .map(|h| match &h.kind {
                NodeKind::ExceptHandler {
                    exc_type: Some(exc),
                    ..
                } => exc.dotted_name().unwrap_or_else(|| exc.shape()),
                _ => "*".to_string(),
            })
            .collect();
        let range = LineSpan::line(node.span.start);
        self.emit(
            PatternType::ErrorHandling,
            range,
            format!("try/except {}", caught.join(", ")),
            caught.clone(),
            format!("try/except({})", caught.join("|")),
        );
    }

    fn raise(&mut self, node: &Node, exc: &Node) {
        let Some(exception) = exc.terminal_name().map(str::to_string) else {
            return;
        };
        let mut anchors = vec![exception.clone()];
        if let NodeKind::Call { args, .. } = &exc.kind {
            anchors.extend(
                args.iter()
                    .filter_map(Node::as_str_literal)
                    .map(str::to_string),
            );
        }
        let shape = node.shape();

        if self.rules.is_permission_error(&exception) && !self.folded.contains(&node.span) {
            self.emit(
                PatternType::PermissionDenial,
                node.span,
                format!("Raises `{exception}`"),
                anchors.clone(),
                shape.clone(),
            );
        }
        if self.rules.is_http_exception(&exception) {
            self.emit(
                PatternType::ErrorHandling,
                node.span,
                format!("Raises `{exception}`"),
                anchors.clone(),
                shape.clone(),
            );
        }
        if self.rules.is_validation_exception(&exception) {
            self.emit(
                PatternType::InputValidation,
                node.span,
                format!("Validation failure `{exception}`"),
                anchors,
                shape,
            );
        }
    }

    fn call(&mut self, node: &Node, func: &Node, args: &[Node]) {
        let Some(dotted) = func.dotted_name() else {
            return;
        };
        let terminal = func.terminal_name().unwrap_or_default().to_string();
        let literal_args: Vec<String> = args
            .iter()
            .filter_map(Node::as_str_literal)
            .map(str::to_string)
            .collect();
        let scope = self.scope.clone().unwrap_or_default();

        if self.rules.is_audit_call(&terminal, &dotted) {
            let mut anchors = vec![terminal.clone()];
            anchors.extend(literal_args.iter().take(1).cloned());
            self.emit(
                PatternType::AuditLogging,
                node.span,
                format!("Audit call `{dotted}`"),
                anchors,
                node.shape(),
            );
        }
        if self.rules.is_rate_limit(&dotted) {
            self.emit(
                PatternType::RateLimiting,
                node.span,
                format!("Rate limit call `{dotted}`"),
                vec![terminal.clone(), scope.clone()],
                node.shape(),
            );
        }

        let write = match &func.kind {
            NodeKind::Attribute { value, attr } => value
                .terminal_name()
                .filter(|receiver| self.rules.is_persistence_write(receiver, attr))
                .map(|receiver| format!("{receiver}.{attr}")),
            NodeKind::Name(name) if self.rules.is_attribute_writer(name) => {
                let field = literal_args.first().cloned().unwrap_or_default();
                Some(if field.is_empty() {
                    name.clone()
                } else {
                    format!("{name}({field})")
                })
            }
            _ => None,
        };
        if let Some(write) = write {
            self.emit(
                PatternType::PersistenceWrite,
                node.span,
                format!("Persistence write `{write}`"),
                vec![scope, terminal],
                node.shape(),
            );
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(src: &str) -> Vec<SecurityPattern> {
        let tree = SyntaxTree::parse(src, "new").expect("fixture parses");
        PatternExtractor::default().extract(&tree)
    }

    fn types(patterns: &[SecurityPattern]) -> Vec<PatternType> {
        patterns.iter().map(|p| p.pattern_type).collect()
    }

    #[test]
    fn test_guard_folds_permission_denial() {
        let src = r#"def update_employee(emp_id, data):
    log_event("employee_update", session_id, {"emp_id": emp_id})
    if state.role != "hr":
        raise PermissionError("Only HR can update employees")
    employee.update(data)
"#;
        let patterns = extract(src);
        assert_eq!(
            types(&patterns),
            vec![
                PatternType::MutationFunction,
                PatternType::AuditLogging,
                PatternType::RoleCheck,
            ]
        );
        let role = &patterns[2];
        assert_eq!(role.line_range, LineSpan::new(3, 4));
        assert_eq!(role.scope.as_deref(), Some("update_employee"));
        assert!(role.anchors.contains(&"hr".to_string()));
        assert_eq!(patterns[1].line_range, LineSpan::line(2));
        assert!(patterns[1].anchors.contains(&"employee_update".to_string()));
    }

    #[test]
    fn test_unguarded_permission_denial() {
        let src = "def check(user):\n    raise PermissionError(\"nope\")\n";
        let patterns = extract(src);
        assert_eq!(types(&patterns), vec![PatternType::PermissionDenial]);
    }

    #[test]
    fn test_strings_and_comments_never_match() {
        let src = r#"def helper():
    """if state.role == 'admin': raise PermissionError"""
    # if not state.is_authenticated: log_event("x")
    message = "db.add(user)"
    return message
"#;
        assert!(extract(src).is_empty());
    }

    #[test]
    fn test_authentication_in_bool_op() {
        let src = "if not user.is_authenticated or user.role == \"admin\":\n    deny()\n";
        let patterns = extract(src);
        assert_eq!(
            types(&patterns),
            vec![PatternType::AuthenticationCheck, PatternType::RoleCheck]
        );
    }

    #[test]
    fn test_action_whitelist() {
        let src = "if action not in (\"view\", \"list\"):\n    raise PermissionError(action)\n";
        let patterns = extract(src);
        assert_eq!(types(&patterns), vec![PatternType::ActionWhitelist]);
        assert_eq!(patterns[0].anchors, vec!["view", "list"]);
        assert_eq!(patterns[0].line_range, LineSpan::new(1, 2));
    }

    #[test]
    fn test_decorated_endpoint() {
        let src = r#"@router.post("/leave/approve")
@require_role("manager")
def approve_leave(request_id):
    return {"status": "approved"}
"#;
        let patterns = extract(src);
        assert_eq!(
            types(&patterns),
            vec![
                PatternType::MutatingEndpoint,
                PatternType::AuthorizationDecorator
            ]
        );
        assert!(patterns[0].severity.is_none());
        assert!(patterns[0].anchors.contains(&"post_approve_leave".to_string()));
    }

    #[test]
    fn test_try_and_http_exception() {
        let src = r#"def fetch(emp_id):
    try:
        return load(emp_id)
    except KeyError:
        raise HTTPException(status_code=404, detail="missing")
"#;
        let patterns = extract(src);
        assert_eq!(
            types(&patterns),
            vec![PatternType::ErrorHandling, PatternType::ErrorHandling]
        );
        assert_eq!(patterns[0].line_range, LineSpan::line(2));
        assert_eq!(patterns[1].line_range, LineSpan::line(5));
    }

    #[test]
    fn test_validation_and_defensive_checks() {
        let src = r#"def validate_payload(payload):
    if payload is None:
        raise ValueError("payload required")
    return payload
"#;
        let patterns = extract(src);
        assert_eq!(
            types(&patterns),
            vec![
                PatternType::InputValidation,
                PatternType::DefensiveCheck,
                PatternType::InputValidation
            ]
        );
    }

    #[test]
    fn test_persistence_writes_and_rate_limit() {
        let src = r#"@limiter.limit("5/minute")
def create_employee(db, data):
    employee = Employee(**data)
    db.add(employee)
    db.commit()
    setattr(employee, "role", "hr")
    return employee
"#;
        let patterns = extract(src);
        assert_eq!(
            types(&patterns),
            vec![
                PatternType::RateLimiting,
                PatternType::MutationFunction,
                PatternType::PersistenceWrite,
                PatternType::PersistenceWrite,
                PatternType::PersistenceWrite,
            ]
        );
    }

    #[test]
    fn test_state_mutations() {
        let src = r#"def execute(state, plan):
    state.selected = plan.first()
    state.api_args["limit"] = 10
    selected_api = plan.api
    result = run(selected_api)
    state.history.append(result)
    return result
"#;
        let patterns = extract(src);
        assert_eq!(
            types(&patterns),
            vec![
                PatternType::StateMutation,
                PatternType::StateMutation,
                PatternType::StateMutation,
            ]
        );
        assert_eq!(patterns[0].line_range, LineSpan::line(2));
        assert!(patterns[0].severity.is_none());
        assert_eq!(patterns[1].context, "State mutation `state.api_args` in execute()");
        assert_eq!(patterns[2].anchors, vec!["selected_api", "execute"]);
    }

    #[test]
    fn test_state_mutations_are_limited_to_agent_code() {
        let src = "def execute(state):\n    state.done = True\n";
        let tree = SyntaxTree::parse(src, "new").expect("fixture parses");
        let extractor = PatternExtractor::default();
        assert_eq!(extractor.extract_file("app/agent/execute.py", &tree).len(), 1);
        assert!(extractor.extract_file("app/api/execute.py", &tree).is_empty());
    }

    #[test]
    fn test_shape_ignores_variable_names() {
        let a = extract("if state.role != \"hr\":\n    deny()\n");
        let b = extract("if ctx.role != \"hr\":\n    deny()\n");
        assert_eq!(a[0].shape, b[0].shape);
        let c = extract("if ctx.role != \"admin\":\n    deny()\n");
        assert_ne!(a[0].shape, c[0].shape);
    }

    #[test]
    fn test_truncate_snippet() {
        let long = "x".repeat(200);
        let out = truncate(&long, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with('…'));
    }
}
