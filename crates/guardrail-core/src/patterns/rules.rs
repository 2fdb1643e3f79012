// SPDX-License-Identifier: Apache-2.0

//! Immutable keyword registries consulted by the extractor.

use super::PatternType;
use crate::config::PatternsConfig;

/// Lower-cased keyword lists, built once and shared read-only.
#[derive(Debug, Clone)]
pub struct PatternRules {
    authentication_fragments: Vec<String>,
    role_values: Vec<String>,
    role_fragments: Vec<String>,
    action_names: Vec<String>,
    permission_error_fragments: Vec<String>,
    authorization_function_fragments: Vec<String>,
    authorization_decorators: Vec<String>,
    audit_calls: Vec<String>,
    audit_fragments: Vec<String>,
    validation_prefixes: Vec<String>,
    validation_verbs: Vec<String>,
    validation_nouns: Vec<String>,
    validation_exceptions: Vec<String>,
    validation_exception_fragments: Vec<String>,
    rate_limit_fragments: Vec<String>,
    http_exception_fragments: Vec<String>,
    persistence_receivers: Vec<String>,
    persistence_methods: Vec<String>,
    attribute_writers: Vec<String>,
    route_verbs: Vec<String>,
    mutation_verbs: Vec<String>,
    state_receivers: Vec<String>,
    state_variables: Vec<String>,
    state_mutation_dirs: Vec<String>,
}

impl Default for PatternRules {
    fn default() -> Self {
        Self::from_config(&PatternsConfig::default())
    }
}

fn lowered(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|n| haystack.contains(n.as_str()))
}

fn equals_any(value: &str, candidates: &[String]) -> bool {
    let value = value.to_lowercase();
    candidates.iter().any(|c| *c == value)
}

impl PatternRules {
    /// Builds rules from the `[patterns]` configuration section.
    #[must_use]
    pub fn from_config(config: &PatternsConfig) -> Self {
        Self {
            authentication_fragments: lowered(&config.authentication_fragments),
            role_values: lowered(&config.role_values),
            role_fragments: lowered(&config.role_fragments),
            action_names: lowered(&config.action_names),
            permission_error_fragments: lowered(&config.permission_error_fragments),
            authorization_function_fragments: lowered(&config.authorization_function_fragments),
            authorization_decorators: lowered(&config.authorization_decorators),
            audit_calls: lowered(&config.audit_calls),
            audit_fragments: lowered(&config.audit_fragments),
            validation_prefixes: lowered(&config.validation_prefixes),
            validation_verbs: lowered(&config.validation_verbs),
            validation_nouns: lowered(&config.validation_nouns),
            validation_exceptions: lowered(&config.validation_exceptions),
            validation_exception_fragments: lowered(&config.validation_exception_fragments),
            rate_limit_fragments: lowered(&config.rate_limit_fragments),
            http_exception_fragments: lowered(&config.http_exception_fragments),
            persistence_receivers: lowered(&config.persistence_receivers),
            persistence_methods: lowered(&config.persistence_methods),
            attribute_writers: lowered(&config.attribute_writers),
            route_verbs: lowered(&config.route_verbs),
            mutation_verbs: lowered(&config.mutation_verbs),
            state_receivers: lowered(&config.state_receivers),
            state_variables: lowered(&config.state_variables),
            state_mutation_dirs: lowered(&config.state_mutation_dirs),
        }
    }

    pub(crate) fn is_authentication_name(&self, name: &str) -> bool {
        contains_any(name, &self.authentication_fragments)
    }

    pub(crate) fn is_role_value(&self, literal: &str) -> bool {
        equals_any(literal, &self.role_values)
    }

    pub(crate) fn is_role_name(&self, name: &str) -> bool {
        contains_any(name, &self.role_fragments)
    }

    pub(crate) fn is_action_name(&self, name: &str) -> bool {
        equals_any(name, &self.action_names)
    }

    pub(crate) fn is_permission_error(&self, exception: &str) -> bool {
        contains_any(exception, &self.permission_error_fragments)
    }

    pub(crate) fn is_authorization_function(&self, name: &str) -> bool {
        contains_any(name, &self.authorization_function_fragments)
    }

    pub(crate) fn is_authorization_decorator(&self, name: &str) -> bool {
        equals_any(name, &self.authorization_decorators) || self.is_authorization_function(name)
    }

    pub(crate) fn is_audit_call(&self, terminal: &str, dotted: &str) -> bool {
        equals_any(terminal, &self.audit_calls) || contains_any(dotted, &self.audit_fragments)
    }

    /// `validate_*` / `sanitize_*`, or a validation verb together with an input noun.
    pub(crate) fn is_validation_function(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self
            .validation_prefixes
            .iter()
            .any(|p| name.starts_with(p.as_str()))
        {
            return true;
        }
        contains_any(&name, &self.validation_verbs) && contains_any(&name, &self.validation_nouns)
    }

    pub(crate) fn is_validation_exception(&self, exception: &str) -> bool {
        equals_any(exception, &self.validation_exceptions)
            || contains_any(exception, &self.validation_exception_fragments)
    }

    pub(crate) fn is_rate_limit(&self, dotted: &str) -> bool {
        contains_any(dotted, &self.rate_limit_fragments)
    }

    pub(crate) fn is_http_exception(&self, exception: &str) -> bool {
        contains_any(exception, &self.http_exception_fragments)
    }

    /// `db.add`, `self.session.commit`, `db_session.delete`, ...
    pub(crate) fn is_persistence_write(&self, receiver: &str, method: &str) -> bool {
        let receiver = receiver.to_lowercase();
        let receiver_matches = self.persistence_receivers.iter().any(|r| {
            receiver == *r || receiver.ends_with(&format!("_{r}"))
        });
        receiver_matches && equals_any(method, &self.persistence_methods)
    }

    pub(crate) fn is_attribute_writer(&self, name: &str) -> bool {
        equals_any(name, &self.attribute_writers)
    }

    pub(crate) fn is_route_verb(&self, method: &str) -> bool {
        equals_any(method, &self.route_verbs)
    }

    /// `create_user`, `user_update`, `bulk_delete_rows`, ...
    pub(crate) fn is_mutation_function(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.mutation_verbs.iter().any(|verb| {
            name.starts_with(&format!("{verb}_"))
                || name.contains(&format!("_{verb}_"))
                || name.ends_with(&format!("_{verb}"))
        })
    }

    pub(crate) fn is_state_receiver(&self, name: &str) -> bool {
        equals_any(name, &self.state_receivers)
    }

    pub(crate) fn is_state_variable(&self, name: &str) -> bool {
        equals_any(name, &self.state_variables)
    }

    /// Whether `pattern_type` is reported for a file at `path`.
    ///
    /// State mutations only count inside one of the configured directories
    /// (`app/agent/execute.py` for `agent`).
    #[must_use]
    pub fn applies_to(&self, pattern_type: PatternType, path: &str) -> bool {
        if pattern_type != PatternType::StateMutation || self.state_mutation_dirs.is_empty() {
            return true;
        }
        path.rsplit_once('/').is_some_and(|(dirs, _)| {
            dirs.split('/')
                .any(|dir| equals_any(dir, &self.state_mutation_dirs))
        })
    }
}
