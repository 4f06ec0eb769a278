//! SV-007: Interpreter resolution: turn a script record into an ExecutableUnit.
//!
//! The (interpreter, master-only) pair picks exactly one strategy:
//! - shebang, any scope        → shell process on any target
//! - engine, master only       → engine bound to build/launcher context, master only
//! - engine, any target        → engine on any target
//!
//! Everything else is rejected here, before anything is dispatched.

use super::error::{Error, Result};
use super::types::*;

/// Classify an (interpreter, scope) pair.
pub fn strategy_for(interpreter: Interpreter, master_only: bool) -> Result<Strategy> {
    match (interpreter, master_only) {
        (Interpreter::Shebang, _) => Ok(Strategy::Shell),
        (Interpreter::Engine, true) => Ok(Strategy::Engine {
            master_context: true,
        }),
        (Interpreter::Engine, false) => Ok(Strategy::Engine {
            master_context: false,
        }),
        (other, _) => Err(Error::UnsupportedInterpreterCombination {
            interpreter: other.to_string(),
            master_only,
        }),
    }
}

/// Build the unit for one run of `record`. The record must carry its body.
pub fn resolve(
    record: &ScriptRecord,
    parameters: ParameterSet,
    build: Option<BuildContext>,
) -> Result<ExecutableUnit> {
    let strategy = strategy_for(record.interpreter, record.restricted_to_master)?;
    let body = record
        .body
        .clone()
        .ok_or_else(|| Error::BodyUnavailable(record.id.clone()))?;

    Ok(ExecutableUnit {
        script_id: record.id.clone(),
        strategy,
        master_only: record.restricted_to_master,
        body,
        parameters,
        build,
    })
}

/// Merge supplied values into the record's declared parameters.
///
/// Declared names keep their order and take the supplied value when one is given;
/// supplied names that were never declared are appended.
pub fn bind_parameters(declared: &[Parameter], supplied: &[Parameter]) -> ParameterSet {
    let supplied_map = ParameterSet::new(supplied.to_vec()).to_map();
    let mut bound: Vec<Parameter> = declared
        .iter()
        .map(|p| match supplied_map.get(&p.name) {
            Some(value) => Parameter::new(p.name.clone(), value.clone()),
            None => p.clone(),
        })
        .collect();
    for (name, value) in supplied_map {
        if !declared.iter().any(|p| p.name == name) {
            bound.push(Parameter::new(name, value));
        }
    }
    ParameterSet::new(bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(interpreter: Interpreter, master_only: bool) -> ScriptRecord {
        let mut r = ScriptRecord::new("s.rhai", "s", interpreter, "");
        r.restricted_to_master = master_only;
        r.body = Some("print(\"hi\");".into());
        r
    }

    #[test]
    fn test_sv007_shebang_any_scope() {
        for master_only in [false, true] {
            let unit = resolve(
                &record(Interpreter::Shebang, master_only),
                ParameterSet::default(),
                None,
            )
            .unwrap();
            assert_eq!(unit.strategy, Strategy::Shell);
            assert_eq!(unit.master_only, master_only);
        }
    }

    #[test]
    fn test_sv007_engine_scopes() {
        let master = resolve(&record(Interpreter::Engine, true), ParameterSet::default(), None)
            .unwrap();
        assert_eq!(
            master.strategy,
            Strategy::Engine {
                master_context: true
            }
        );
        assert!(master.master_only);

        let anywhere = resolve(&record(Interpreter::Engine, false), ParameterSet::default(), None)
            .unwrap();
        assert_eq!(
            anywhere.strategy,
            Strategy::Engine {
                master_context: false
            }
        );
    }

    #[test]
    fn test_sv007_source_missing_rejected() {
        let err = resolve(
            &record(Interpreter::SourceMissing, false),
            ParameterSet::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedInterpreterCombination {
                master_only: false,
                ..
            }
        ));
    }

    #[test]
    fn test_sv007_body_required() {
        let mut r = record(Interpreter::Engine, false);
        r.body = None;
        let err = resolve(&r, ParameterSet::default(), None).unwrap_err();
        assert!(matches!(err, Error::BodyUnavailable(id) if id == "s.rhai"));
    }

    #[test]
    fn test_sv007_unit_carries_build_and_params() {
        let build = BuildContext {
            name: "nightly".into(),
            number: 42,
            workspace: None,
        };
        let params = ParameterSet::new(vec![Parameter::new("A", Some("1".into()))]);
        let unit = resolve(
            &record(Interpreter::Engine, true),
            params.clone(),
            Some(build.clone()),
        )
        .unwrap();
        assert_eq!(unit.parameters, params);
        assert_eq!(unit.build, Some(build));
        assert_eq!(unit.body, "print(\"hi\");");
    }

    #[test]
    fn test_sv007_bind_parameters() {
        let declared = vec![Parameter::new("HOST", None), Parameter::new("PORT", None)];
        let supplied = vec![
            Parameter::new("PORT", Some("22".into())),
            Parameter::new("EXTRA", Some("x".into())),
            Parameter::new("PORT", Some("2222".into())),
        ];
        let bound = bind_parameters(&declared, &supplied);
        let names: Vec<_> = bound.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["HOST", "PORT", "EXTRA"]);
        let map = bound.to_map();
        assert_eq!(map["HOST"], None);
        assert_eq!(map["PORT"].as_deref(), Some("2222"));
    }
}
