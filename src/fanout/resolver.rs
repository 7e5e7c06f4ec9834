//! Target resolution.
//!
//! Turns a [`Selection`] plus an instance name into the ordered set of
//! targets one dispatch will touch. Resolution is lenient by design: unknown
//! names and missing instances degrade to warnings and a smaller (possibly
//! empty) set, never to an error.

use serde::Serialize;

use crate::config::Connections;
use crate::engine::types::TargetConfig;
use crate::fanout::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::fanout::names;

/// Which targets of an instance a dispatch should run on.
///
/// One variant per call-site shape; each resolves with its own rule instead
/// of runtime type inspection.
#[derive(Debug, Clone)]
pub enum Selection {
    /// A single target name, aliased via the static display-name table.
    One(String),
    /// An ordered list of target names.
    Many(Vec<String>),
    /// Target name -> display alias, in request order.
    Aliased(Vec<(String, String)>),
    /// Target name -> literal descriptor, bypassing the registry.
    Literal(Vec<(String, TargetConfig)>),
}

impl Selection {
    pub fn one(name: impl Into<String>) -> Self {
        Self::One(name.into())
    }

    pub fn many<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Many(names.into_iter().map(Into::into).collect())
    }

    pub fn aliased<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self::Aliased(pairs.into_iter().map(|(n, a)| (n.into(), a.into())).collect())
    }
}

/// One resolved target: display alias plus its descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTarget {
    pub alias: String,
    pub config: TargetConfig,
}

/// Ordered alias -> descriptor set for one dispatch. Order is request order
/// and is preserved through scheduling and merging.
pub type TargetSet = Vec<ResolvedTarget>;

/// Resolves `selection` against `instance` in `connections`.
///
/// Unknown target names emit [`Diagnostic::TargetMissing`] and are skipped;
/// a missing instance emits [`Diagnostic::InstanceMissing`] and resolves to
/// an empty set. Duplicate aliases keep their first position, last
/// descriptor wins.
pub fn resolve(
    connections: &Connections,
    instance: &str,
    selection: &Selection,
    sink: &dyn DiagnosticsSink,
) -> TargetSet {
    // Literal selections carry their own descriptors; the registry (and even
    // the instance) is irrelevant for them.
    if let Selection::Literal(pairs) = selection {
        let mut set = TargetSet::new();
        for (name, config) in pairs {
            upsert(&mut set, names::display_name(name).to_string(), config.clone());
        }
        return set;
    }

    let Some(targets) = connections.instance(instance) else {
        sink.emit(Diagnostic::InstanceMissing {
            instance: instance.to_string(),
        });
        return TargetSet::new();
    };

    let mut set = TargetSet::new();
    let push_named = |set: &mut TargetSet, name: &str, alias: Option<&str>| match targets
        .get(name)
    {
        Some(config) => {
            let alias = alias.unwrap_or_else(|| names::display_name(name)).to_string();
            upsert(set, alias, config.clone());
        }
        None => sink.emit(Diagnostic::TargetMissing {
            instance: instance.to_string(),
            name: name.to_string(),
        }),
    };

    match selection {
        Selection::One(name) => push_named(&mut set, name, None),
        Selection::Many(namelist) => {
            for name in namelist {
                push_named(&mut set, name, None);
            }
        }
        Selection::Aliased(pairs) => {
            for (name, alias) in pairs {
                push_named(&mut set, name, Some(alias));
            }
        }
        Selection::Literal(_) => unreachable!("handled above"),
    }

    set
}

/// Insert keeping first position on duplicate alias, last config winning.
fn upsert(set: &mut TargetSet, alias: String, config: TargetConfig) {
    match set.iter_mut().find(|t| t.alias == alias) {
        Some(existing) => existing.config = config,
        None => set.push(ResolvedTarget { alias, config }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::diagnostics::CollectingSink;
    use crate::observability::Sensitive;

    fn sample_connections() -> Connections {
        Connections::from_json(
            r#"{
                "replica": {
                    "repA": { "server": "a", "user": "u", "password": "", "base": "db" },
                    "repB": { "server": "b", "user": "u", "password": "", "base": "db" },
                    "primary": { "server": "p", "user": "u", "password": "", "base": "db" }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn single_name_uses_display_table_fallback() {
        let sink = CollectingSink::new();
        let set = resolve(
            &sample_connections(),
            "replica",
            &Selection::one("repA"),
            &sink,
        );

        assert_eq!(set.len(), 1);
        assert_eq!(set[0].alias, "repA");
        assert_eq!(set[0].config.host, "a");
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn single_known_name_gets_friendly_alias() {
        let sink = CollectingSink::new();
        let set = resolve(
            &sample_connections(),
            "replica",
            &Selection::one("primary"),
            &sink,
        );

        assert_eq!(set[0].alias, "Primary");
    }

    #[test]
    fn list_preserves_request_order() {
        let sink = CollectingSink::new();
        let set = resolve(
            &sample_connections(),
            "replica",
            &Selection::many(["repB", "repA"]),
            &sink,
        );

        let aliases: Vec<_> = set.iter().map(|t| t.alias.as_str()).collect();
        assert_eq!(aliases, ["repB", "repA"]);
    }

    #[test]
    fn unknown_name_warns_and_is_skipped() {
        let sink = CollectingSink::new();
        let set = resolve(
            &sample_connections(),
            "replica",
            &Selection::aliased([("repA", "Replica A"), ("repX", "Replica X")]),
            &sink,
        );

        assert_eq!(set.len(), 1);
        assert_eq!(set[0].alias, "Replica A");

        let events = sink.drain();
        assert_eq!(
            events,
            vec![Diagnostic::TargetMissing {
                instance: "replica".into(),
                name: "repX".into(),
            }]
        );
    }

    #[test]
    fn missing_instance_is_empty_set_with_warning() {
        let sink = CollectingSink::new();
        let set = resolve(
            &sample_connections(),
            "staging",
            &Selection::one("repA"),
            &sink,
        );

        assert!(set.is_empty());
        assert_eq!(
            sink.drain(),
            vec![Diagnostic::InstanceMissing {
                instance: "staging".into(),
            }]
        );
    }

    #[test]
    fn literal_selection_bypasses_registry() {
        let sink = CollectingSink::new();
        let literal = TargetConfig {
            driver: "sqlite".to_string(),
            host: String::new(),
            port: 0,
            username: String::new(),
            password: Sensitive::default(),
            database: ":memory:".to_string(),
            ssh_tunnel: None,
        };
        let set = resolve(
            &sample_connections(),
            "nonexistent-instance",
            &Selection::Literal(vec![("adhoc".to_string(), literal)]),
            &sink,
        );

        assert_eq!(set.len(), 1);
        assert_eq!(set[0].alias, "adhoc");
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn duplicate_alias_keeps_first_position_last_config() {
        let sink = CollectingSink::new();
        let set = resolve(
            &sample_connections(),
            "replica",
            &Selection::aliased([("repA", "Same"), ("repB", "Same")]),
            &sink,
        );

        assert_eq!(set.len(), 1);
        assert_eq!(set[0].alias, "Same");
        assert_eq!(set[0].config.host, "b");
    }
}
