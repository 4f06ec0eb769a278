//! SV-012: Engine strategy: evaluate a body in an embedded rhai engine.
//!
//! Parameters are visible as variables of the same name and through the `params`
//! map. `node` names the executing node. With a master context and a build
//! attached, `build` and `launcher` are bound too; without a build they are absent.

use crate::core::types::{BuildContext, ExecutableUnit, Strategy, UnitResult};
use rhai::{Dynamic, Engine, Map, Scope};
use std::sync::{Arc, Mutex};

/// Evaluate the unit's body. Script errors are reported in the output, not raised.
pub fn run(unit: &ExecutableUnit, node: &str) -> UnitResult {
    let captured = Arc::new(Mutex::new(String::new()));
    let engine = build_engine(&captured);
    let mut scope = bind_scope(unit, node);

    let (success, value) = match engine.eval_with_scope::<Dynamic>(&mut scope, &unit.body) {
        Ok(value) if value.is_unit() => (true, None),
        Ok(value) => (true, Some(value.to_string())),
        Err(e) => {
            append(&captured, &format!("error: {}", e));
            (false, None)
        }
    };

    let output = captured.lock().map(|buf| buf.clone()).unwrap_or_default();
    UnitResult {
        success,
        output,
        value,
    }
}

fn build_engine(captured: &Arc<Mutex<String>>) -> Engine {
    let mut engine = Engine::new();

    let out = Arc::clone(captured);
    engine.on_print(move |text| append(&out, text));

    let dbg = Arc::clone(captured);
    engine.on_debug(move |text, source, pos| match source {
        Some(source) => append(&dbg, &format!("[debug] {} @ {}: {}", source, pos, text)),
        None => append(&dbg, &format!("[debug] {}: {}", pos, text)),
    });

    engine
}

fn append(buf: &Arc<Mutex<String>>, line: &str) {
    if let Ok(mut buf) = buf.lock() {
        buf.push_str(line);
        buf.push('\n');
    }
}

/// Variables visible to the script.
fn bind_scope(unit: &ExecutableUnit, node: &str) -> Scope<'static> {
    let mut scope = Scope::new();
    let mut params = Map::new();

    for (name, value) in unit.parameters.to_map() {
        let value = value.map(Dynamic::from).unwrap_or(Dynamic::UNIT);
        params.insert(name.as_str().into(), value.clone());
        scope.push_dynamic(name, value);
    }

    scope.push_constant("params", params);
    scope.push_constant("node", node.to_string());

    if let (Strategy::Engine { master_context: true }, Some(build)) = (unit.strategy, &unit.build)
    {
        scope.push_constant("build", build_binding(build));
        scope.push_constant("launcher", launcher_binding(node, build));
    }

    scope
}

fn build_binding(build: &BuildContext) -> Map {
    let mut map = Map::new();
    map.insert("name".into(), Dynamic::from(build.name.clone()));
    map.insert(
        "number".into(),
        Dynamic::from(i64::try_from(build.number).unwrap_or(i64::MAX)),
    );
    map.insert("workspace".into(), workspace_value(build));
    map
}

fn launcher_binding(node: &str, build: &BuildContext) -> Map {
    let mut map = Map::new();
    map.insert("node".into(), Dynamic::from(node.to_string()));
    map.insert("local".into(), Dynamic::from(true));
    map.insert("workspace".into(), workspace_value(build));
    map
}

fn workspace_value(build: &BuildContext) -> Dynamic {
    match &build.workspace {
        Some(path) => Dynamic::from(path.display().to_string()),
        None => Dynamic::UNIT,
    }
}
