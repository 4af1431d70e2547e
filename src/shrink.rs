//! Optional post-processing that collapses statement action lists.

use {
    crate::{
        catalog::ActionCatalog,
        policy::{PolicyDocument, Statement},
        serutil::JsonList,
        LensError,
    },
    std::collections::BTreeMap,
};

/// Rewrites a composed policy document into an equivalent, smaller one.
pub trait PolicyShrinker {
    fn shrink(&self, document: PolicyDocument) -> Result<PolicyDocument, LensError>;
}

/// Collapses a statement's action list against the catalog: a full service
/// becomes `service:*`, a complete common-prefix group becomes
/// `service:Prefix*`.
pub struct ActionListShrinker<'a> {
    catalog: &'a dyn ActionCatalog,
}

impl<'a> ActionListShrinker<'a> {
    pub fn new(catalog: &'a dyn ActionCatalog) -> Self {
        Self {
            catalog,
        }
    }

    fn shrink_actions(&self, actions: Vec<String>) -> Vec<String> {
        let mut by_service: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut passthrough = Vec::new();
        for action in actions {
            match action.split_once(':') {
                Some((service, name)) => {
                    by_service.entry(service.to_string()).or_default().push(name.to_string());
                }
                None => passthrough.push(action),
            }
        }

        let mut out = passthrough;
        for (service, mut present) in by_service {
            let catalog_actions: Vec<String> =
                self.catalog.service_actions(&service).into_iter().map(|spec| spec.name).collect();

            if !catalog_actions.is_empty() && catalog_actions.iter().all(|a| present.contains(a)) {
                out.push(format!("{}:*", service));
                continue;
            }

            // Collapse complete leading-word groups (Get*, Put*, List*).
            let mut collapsed: Vec<String> = Vec::new();
            while let Some(action) = present.first().cloned() {
                let prefix = leading_word(&action);
                let group: Vec<String> =
                    catalog_actions.iter().filter(|a| leading_word(a) == prefix).cloned().collect();
                if !group.is_empty() && group.iter().all(|a| present.contains(a)) && group.len() > 1 {
                    collapsed.push(format!("{}:{}*", service, prefix));
                    present.retain(|a| !group.contains(a));
                } else {
                    collapsed.push(format!("{}:{}", service, action));
                    present.remove(0);
                }
            }
            out.extend(collapsed);
        }

        out.sort();
        out.dedup();
        out
    }
}

impl PolicyShrinker for ActionListShrinker<'_> {
    fn shrink(&self, document: PolicyDocument) -> Result<PolicyDocument, LensError> {
        let mut statements = Vec::new();
        for statement in document.statements() {
            let shrunk = match statement.action() {
                Some(actions) => {
                    let actions = self.shrink_actions(actions.iter().cloned().collect());
                    let mut builder = Statement::builder();
                    builder.effect(statement.effect()).action(JsonList::from_compact(actions));
                    if let Some(resource) = statement.resource() {
                        builder.resource(resource.clone());
                    }
                    if let Some(not_resource) = statement.not_resource() {
                        builder.not_resource(not_resource.clone());
                    }
                    if let Some(condition) = statement.condition() {
                        builder.condition(condition.clone());
                    }
                    if let Some(sid) = statement.sid() {
                        builder.sid(sid);
                    }
                    builder.build().map_err(|e| LensError::InvalidStatement(e.to_string()))?
                }
                None => statement.clone(),
            };
            statements.push(shrunk);
        }

        let mut builder = PolicyDocument::builder();
        if let Some(version) = document.version() {
            builder.version(version);
        }
        builder.statement(statements);
        builder.build().map_err(|e| LensError::InvalidStatement(e.to_string()))
    }
}

/// The leading capitalized word of an action name (`GetObject` → `Get`).
fn leading_word(action: &str) -> String {
    let mut out = String::new();
    for (i, c) in action.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            break;
        }
        out.push(c);
    }
    out
}
