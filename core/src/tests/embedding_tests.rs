//! Tests for the host-facing state lifecycle, registration and execution

use super::captured_state;
use crate::capability::{Builtin, BuiltinGroup, StdModule};
use crate::code::Code;
use crate::controller::{ExecutionController, Outcome, Phase};
use crate::error::{Error, ErrorKind, RuntimeError};
use crate::host::{Callable, HostModule};
use crate::state::State;
use crate::value::{UserData, Value};
use std::time::Duration;

#[test]
fn test_globals_round_trip() {
    let mut state = State::bare();
    state.set_global("base", 20).unwrap();
    state.set_global("label", "total").unwrap();
    state.run("result = {label: base + 22}").unwrap();

    let result = state.get_global("result").unwrap();
    assert_eq!(result.as_dict().unwrap().get("total"), Value::Int(42));
    assert_eq!(state.get_global("never_bound").unwrap(), Value::None);
}

#[test]
fn test_globals_snapshot_hides_dunders() {
    let mut state = State::bare();
    state.set_global("a", 1).unwrap();
    state.run("b = a + 1\n__private__ = 3\n").unwrap();

    let globals = state.globals().unwrap();
    assert_eq!(globals.get("a"), Some(&Value::Int(1)));
    assert_eq!(globals.get("b"), Some(&Value::Int(2)));
    assert!(globals.keys().all(|name| !name.starts_with("__")));
}

#[test]
fn test_definitions_accumulate_across_runs() {
    let mut state = State::bare();
    state.run("def greet(name):\n    return 'hello ' + name\n").unwrap();
    state.run("message = greet('ember')").unwrap();
    assert_eq!(state.get_global("message").unwrap(), Value::from("hello ember"));
}

#[test]
fn test_eval_returns_expression_value() {
    let mut state = State::bare();
    state.set_global("items", vec![3i64, 1, 2]).unwrap();
    assert_eq!(state.eval("sorted(items)").unwrap(), Value::from(vec![1i64, 2, 3]));
    assert_eq!(state.eval("  len(items) * 2  ").unwrap(), Value::Int(6));

    let err = state.eval("x = 1").unwrap_err();
    let compile = err.as_compile().unwrap();
    assert_eq!(compile.name(), "<eval>");
}

#[test]
fn test_call_guest_function_by_name() {
    let mut state = State::bare();
    state.run("def add(a, b=10):\n    return a + b\n").unwrap();

    let sum = state.call("add", &[Value::Int(2), Value::Int(3)]).unwrap();
    assert_eq!(sum, Value::Int(5));
    let defaulted = state.call("add", &[Value::Int(1)]).unwrap();
    assert_eq!(defaulted, Value::Int(11));

    let err = state.call("missing", &[]).unwrap_err();
    let runtime = err.as_runtime().unwrap();
    assert_eq!(runtime.kind, ErrorKind::NameNotFound);
    assert_eq!(runtime.message, "name 'missing' is not defined");
}

#[test]
fn test_host_function_calls_back_into_script() {
    let mut state = State::bare();
    state
        .register_fn("apply", |ctx, args| {
            let Some((callee, rest)) = args.split_first() else {
                return Err(RuntimeError::type_error("apply() needs a callable"));
            };
            ctx.call(callee, rest).map(Some)
        })
        .unwrap();

    state
        .run("def double(x):\n    return x * 2\nresult = apply(double, 21)\n")
        .unwrap();
    assert_eq!(state.get_global("result").unwrap(), Value::Int(42));
}

#[test]
fn test_host_function_reads_and_writes_globals() {
    let mut state = State::bare();
    state
        .register_fn("remember", |ctx, args| {
            let count = ctx.get_global("count").as_int().unwrap_or(0);
            ctx.set_global("count", count + 1);
            ctx.set_global("last", args.first().cloned().unwrap_or(Value::None));
            Ok(None)
        })
        .unwrap();

    state
        .run("returned = remember('a')\nremember('b')\n")
        .unwrap();
    assert_eq!(state.get_global("count").unwrap(), Value::Int(2));
    assert_eq!(state.get_global("last").unwrap(), Value::from("b"));
    assert_eq!(state.get_global("returned").unwrap(), Value::None);
}

#[test]
fn test_host_error_surfaces_as_runtime_error() {
    let mut state = State::bare();
    state
        .register_callable(
            "lookup",
            Callable::from_fn("lookup", |args| {
                Err(RuntimeError::key_error(format!("{:?}", args.len())))
            }),
        )
        .unwrap();

    let err = state.run("lookup(1, 2)").unwrap_err();
    let runtime = err.as_runtime().unwrap();
    assert_eq!(runtime.exception, "KeyError");
    assert_eq!(runtime.kind, ErrorKind::KeyNotFound);
}

#[test]
fn test_print_goes_to_configured_sink() {
    let (mut state, buffer) = captured_state();
    state.run("print('a', 1)\nprint([1, 'b'])\n").unwrap();
    assert_eq!(buffer.take(), "a 1\n[1, 'b']\n");

    state.run("print()").unwrap();
    assert_eq!(buffer.contents(), "\n");
}

#[test]
fn test_compile_errors_are_reported_together() {
    let mut state = State::bare();
    let err = state.run("break\ncontinue\n").unwrap_err();
    let Error::Compile(errors) = err else {
        panic!("expected a compile error, got {:?}", err);
    };
    assert_eq!(errors.name(), "<string>");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors.first().line, 1);
    assert!(errors.to_string().starts_with("<string>:1:"));
}

#[test]
fn test_failed_compile_leaves_namespace_untouched() {
    let mut state = State::bare();
    assert!(state.run("x = 1\ny = (\n").is_err());
    assert!(!state.globals().unwrap().contains_key("x"));
}

#[test]
fn test_runtime_error_location() {
    let mut state = State::bare();
    let err = state.run("a = 1\nb = a / 0\n").unwrap_err();
    let runtime = err.as_runtime().unwrap();
    assert_eq!(runtime.exception, "ZeroDivisionError");
    let location = runtime.location().unwrap();
    assert_eq!(location.file, "<string>");
    assert_eq!(location.line, 2);

    // Statements before the failure keep their effect
    assert_eq!(state.get_global("a").unwrap(), Value::Int(1));
    assert_eq!(state.get_global("b").unwrap(), Value::None);
}

#[test]
fn test_code_runs_in_many_states() {
    let mut first = State::bare();
    let mut second = State::bare();
    let code = first.compile("total = base * 2", "job.py").unwrap();

    first.set_global("base", 1).unwrap();
    second.set_global("base", 5).unwrap();
    first.execute(&code).unwrap();
    second.execute(&code).unwrap();
    second.execute(&code).unwrap();

    assert_eq!(first.get_global("total").unwrap(), Value::Int(2));
    assert_eq!(second.get_global("total").unwrap(), Value::Int(10));
    assert_eq!(code.digest(), Code::compile("total = base * 2", "other").unwrap().digest());
}

#[test]
fn test_closed_state_rejects_operations() {
    let mut state = State::new();
    state.close();
    assert!(state.is_closed());
    assert!(matches!(state.eval("1"), Err(Error::StateClosed)));
    assert!(matches!(state.call("f", &[]), Err(Error::StateClosed)));
    assert!(matches!(state.globals(), Err(Error::StateClosed)));
    assert!(matches!(
        state.register_guest_module("m", "x = 1"),
        Err(Error::StateClosed)
    ));
    assert!(!state.is_module_enabled(StdModule::Math));
    assert!(state.enabled_modules().is_empty());
}

#[test]
fn test_host_values_outlive_close() {
    let mut state = State::bare();
    state.run("data = {'k': [1, 2]}").unwrap();
    let data = state.get_global("data").unwrap();
    state.close();
    assert_eq!(data.repr(), "{'k': [1, 2]}");
}

#[test]
fn test_module_capabilities_toggle_at_runtime() {
    let mut state = State::bare();
    let err = state.run("import math").unwrap_err();
    assert_eq!(err.as_runtime().unwrap().exception, "ModuleNotFoundError");

    state.enable_module(StdModule::Math).unwrap();
    assert!(state.is_module_enabled(StdModule::Math));
    state.run("import math\nroot = math.sqrt(9)\n").unwrap();
    assert_eq!(state.get_global("root").unwrap(), Value::Float(3.0));

    state.disable_module(StdModule::Math).unwrap();
    assert!(state.enabled_modules().is_empty());
    assert!(state.get_module_attr("math", "pi").unwrap().is_none());
    assert!(state.run("import math").is_err());
}

#[test]
fn test_builtin_capabilities_toggle_at_runtime() {
    let mut state = State::bare();
    assert!(state.eval("hasattr(1, 'real')").is_err());

    state.enable_builtin(Builtin::Hasattr).unwrap();
    assert_eq!(state.eval("hasattr(1, 'real')").unwrap(), Value::Bool(true));

    state.enable_builtin_group(BuiltinGroup::Execution).unwrap();
    assert!(state.is_builtin_enabled(Builtin::Eval));
    assert!(state.is_builtin_enabled(Builtin::Exec));
    assert_eq!(state.eval("eval('2 ** 5')").unwrap(), Value::Int(32));

    state.disable_builtin(Builtin::Hasattr).unwrap();
    assert!(!state.is_builtin_enabled(Builtin::Hasattr));
    assert_eq!(state.enabled_builtins().len(), 2);
}

#[test]
fn test_module_attributes_after_import() {
    let (mut state, _) = captured_state();
    assert!(state.get_module_attr("math", "pi").unwrap().is_none());

    state.run("import math").unwrap();
    let pi = state.get_module_attr("math", "pi").unwrap().unwrap();
    assert_eq!(pi.as_float(), Some(std::f64::consts::PI));
    assert!(state.get_module_attr("math", "nothing").unwrap().is_none());
}

#[test]
fn test_registered_modules_are_importable() {
    let mut state = State::bare();
    state
        .register_guest_module("shapes", "def area(w, h):\n    return w * h\n")
        .unwrap();
    state
        .register_host_module(
            HostModule::new("units")
                .with("scale", 100)
                .function("to_cm", |_ctx, args| {
                    let metres = args.first().and_then(Value::as_float).unwrap_or(0.0);
                    Ok(Some(Value::Float(metres * 100.0)))
                }),
        )
        .unwrap();

    state
        .run("from shapes import area\nimport units\nresult = [area(2, 3), units.scale, units.to_cm(1.5)]\n")
        .unwrap();
    assert_eq!(state.get_global("result").unwrap().repr(), "[6, 100, 150.0]");
    assert!(state.get_module_attr("shapes", "area").unwrap().is_some());
}

#[test]
fn test_guest_module_compile_error_is_reported_on_registration() {
    let mut state = State::bare();
    let err = state.register_guest_module("broken", "def f(:\n").unwrap_err();
    assert_eq!(err.as_compile().unwrap().name(), "broken");
}

#[test]
fn test_user_data_passes_through_unchanged() {
    #[derive(Debug, PartialEq)]
    struct Handle(u32);

    let mut state = State::bare();
    let handle = UserData::new(Handle(7));
    state.set_global("h", Value::UserData(handle.clone())).unwrap();
    state.run("pair = [h, h]").unwrap();

    let pair = state.get_global("pair").unwrap();
    let list = pair.as_list().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.get(0).as_user_data().unwrap().ptr_eq(&handle));
    assert_eq!(list.get(1).downcast_ref::<Handle>(), Some(&Handle(7)));
}

#[test]
fn test_guest_function_returned_to_host_is_callable() {
    let mut state = State::bare();
    state.run("def triple(x):\n    return x * 3\n").unwrap();
    let triple = state.get_global("triple").unwrap();
    assert_eq!(triple.type_name(), "function");

    state.set_global("f", triple).unwrap();
    assert_eq!(state.eval("f(4)").unwrap(), Value::Int(12));
}

#[test]
fn test_states_have_distinct_ids() {
    let first = State::bare();
    let second = State::bare();
    assert_ne!(first.id(), second.id());
}

#[test]
fn test_compile_once_execute_with_varying_globals() {
    let mut state = State::bare();
    let code = state.compile("result = n ** 2", "square.py").unwrap();

    let mut results = Vec::new();
    for n in 0..5 {
        state.set_global("n", n).unwrap();
        state.execute(&code).unwrap();
        results.push(state.get_global("result").unwrap());
    }
    assert_eq!(Value::from(results), Value::from(vec![0i64, 1, 4, 9, 16]));
}

#[test]
fn test_guest_handled_exception_stays_in_guest() {
    let mut state = State::bare();
    state
        .run("try:\n    ratio = 1 / 0\nexcept ZeroDivisionError:\n    ratio = -1\n")
        .unwrap();
    assert_eq!(state.get_global("ratio").unwrap(), Value::Int(-1));
}

#[test]
fn test_host_indexing_is_lenient_guest_indexing_is_strict() {
    let mut state = State::bare();
    state.run("items = [1, 2]\nmapping = {'a': 1}\n").unwrap();

    let items = state.get_global("items").unwrap();
    assert_eq!(items.as_list().unwrap().get(5), Value::None);
    let mapping = state.get_global("mapping").unwrap();
    assert_eq!(mapping.as_dict().unwrap().get("zzz"), Value::None);

    let err = state.eval("items[5]").unwrap_err();
    assert_eq!(err.as_runtime().unwrap().kind, ErrorKind::IndexOutOfRange);
    let err = state.eval("mapping['zzz']").unwrap_err();
    assert_eq!(err.as_runtime().unwrap().kind, ErrorKind::KeyNotFound);
}

#[test]
fn test_cyclic_guest_values() {
    let mut state = State::bare();
    let err = state
        .run("a = [1]\na.append(a)\nb = [1]\nb.append(b)\nsame = a == b\n")
        .unwrap_err();
    let Error::Runtime(err) = err else {
        panic!("expected a guest exception, got {:?}", err);
    };
    assert_eq!(err.exception, "RecursionError");

    // The bridge keeps the cycle and host equality terminates on it
    let a = state.get_global("a").unwrap();
    assert_eq!(a, state.get_global("a").unwrap());
    assert_eq!(a.as_list().unwrap().len(), 2);
}

#[test]
fn test_deep_guest_nesting_reaches_the_host() {
    let mut state = State::bare();
    state
        .run("x = []\nfor i in range(100000):\n    x = [x]\n")
        .unwrap();
    let x = state.get_global("x").unwrap();
    assert_eq!(x.as_list().unwrap().len(), 1);
    drop(x);
    drop(state);
}

#[test]
fn test_execute_with_controller() {
    let mut state = State::bare();
    let code = state.compile("total = sum(range(10))", "<controlled>").unwrap();
    let mut controller = ExecutionController::new().timeout(Some(Duration::from_secs(5)));
    let outcome = state.execute_with(&mut controller, &code).unwrap();
    assert!(matches!(outcome, Outcome::Completed(_)));
    assert_eq!(controller.phase(), Phase::Completed);
    assert_eq!(state.get_global("total").unwrap(), Value::Int(45));

    let code = state.compile("n = 0\nwhile True:\n    n += 1\n", "<spin>").unwrap();
    let mut controller = ExecutionController::new().timeout(Some(Duration::from_millis(20)));
    let outcome = state.execute_with(&mut controller, &code).unwrap();
    assert!(matches!(outcome, Outcome::TimedOut));
    assert_eq!(controller.phase(), Phase::TimedOut);
}
