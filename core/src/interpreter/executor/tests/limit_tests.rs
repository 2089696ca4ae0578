//! Tests for size and nesting limits on guest-built values

use super::helpers::{eval, parse, raises, run_global, Session, RECURSION_LIMIT};
use crate::interpreter::checkpoint::Checkpoint;
use crate::interpreter::{ExecResult, Interrupt};
use crate::value::Value;
use std::time::Duration;

#[test]
fn test_cyclic_lists_compare_with_recursion_error() {
    let err = raises("a = [1]\na.append(a)\nb = [1]\nb.append(b)\nx = a == b\n");
    assert_eq!(err.exception, "RecursionError");
    assert!(err.message.contains("in comparison"));

    let err = raises("a = [1]\na.append(a)\nb = [1]\nb.append(b)\nx = a < b\n");
    assert_eq!(err.exception, "RecursionError");

    // The same object short-circuits on identity
    assert_eq!(
        run_global("a = [1]\na.append(a)\nsame = a == a\n", "same"),
        Value::Bool(true)
    );
}

#[test]
fn test_cyclic_dicts_compare_with_recursion_error() {
    let err = raises("a = {}\na['k'] = a\nb = {}\nb['k'] = b\nx = a == b\n");
    assert_eq!(err.exception, "RecursionError");
}

#[test]
fn test_deep_nesting_repr_is_bounded() {
    let source = format!(
        "x = []\nfor i in range({}):\n    x = [x]\ns = repr(x)\n",
        RECURSION_LIMIT * 3
    );
    let err = raises(&source);
    assert_eq!(err.exception, "RecursionError");
    assert!(err.message.contains("repr"));

    // Shallow nesting still renders
    assert_eq!(eval("repr([[[1]], ((2,),)])"), Value::from("[[[1]], ((2,),)]"));
}

#[test]
fn test_deep_tuple_hash_is_bounded() {
    let err = raises("t = ()\nfor i in range(400):\n    t = (t,)\nd = {t: 1}\n");
    assert_eq!(err.exception, "RecursionError");
}

#[test]
fn test_padding_widths_are_bounded() {
    for source in [
        "s = '{:>99999999999999}'.format(1)",
        "s = format(1, '99999999999999')",
        "s = 'ab'.center(10**15)",
        "s = 'abc'.zfill(10**15)",
        "s = 'ab'.ljust(9223372036854775807)",
        "s = 'ab'.rjust(10**15, '*')",
        "s = '%99999999999999d' % 1",
        "s = '%.99999999999999f' % 1.5",
    ] {
        let err = raises(source);
        assert_eq!(err.exception, "OverflowError", "{}", source);
    }
    assert_eq!(eval("'ab'.center(6, '*')"), Value::from("**ab**"));
    assert_eq!(eval("'{:>5}'.format(1)"), Value::from("    1"));
}

#[test]
fn test_grouping_rejected_for_hex() {
    let err = raises("s = format(1, ',x')");
    assert_eq!(err.exception, "ValueError");
    assert_eq!(err.message, "Cannot specify ',' with 'x'.");
    assert_eq!(eval("format(65535, '_x')"), Value::from("ffff"));
    assert_eq!(eval("format(1234567, ',')"), Value::from("1,234,567"));
}

#[test]
fn test_oversized_results_raise_overflow() {
    for source in [
        "x = [0] * (2**30)",
        "x = (0,) * (2**30)",
        "x = 'ab' * (2**40)",
        "x = 'a' * (2**20)\ny = ''.join([x] * 32)",
        "x = ('a' * (2**20)).replace('a', 'bb' * 16)",
    ] {
        let err = raises(source);
        assert_eq!(err.exception, "OverflowError", "{}", source);
        assert_eq!(err.message, "sequence is too long");
    }
    assert_eq!(
        run_global("x = [1, 2] * 3\n", "x"),
        Value::from(vec![1i64, 2, 1, 2, 1, 2])
    );
    assert_eq!(run_global("x = (None,) * 2\n", "x"), Value::from(((), ())));
}

#[test]
fn test_json_indent_is_bounded() {
    let err = raises("import json\ns = json.dumps([1], indent=10**9)\n");
    assert_eq!(err.exception, "OverflowError");
}

#[test]
fn test_large_repetition_honours_deadline() {
    let mut session = Session::new();
    let program = parse("x = [0, 0, 0, 0] * (2**22)\n");
    let mut checkpoint = Checkpoint::with_timeout(Duration::from_millis(5));
    let result = session.execute(&program, &mut checkpoint);
    assert!(matches!(result, ExecResult::Interrupted(Interrupt::TimedOut)));
    assert!(!session.has_global("x"));
}

#[test]
fn test_deeply_nested_values_drop_without_recursion() {
    let mut session = Session::new();
    session.run(
        "
class Node:
    def __init__(self, next):
        self.next = next

items = []
pairs = ()
table = {}
chain = None
for i in range(100000):
    items = [items]
    pairs = (pairs,)
    table = {'next': table}
    chain = Node(chain)
",
    );
    // Rebinding releases the old chains while the script runs
    session.run("items = None\npairs = None\ntable = None\nchain = None\nitems = [[[]]]\n");
    assert_eq!(session.global("items").repr(), "[[[]]]");

    session.run("again = []\nfor i in range(100000):\n    again = [again]\n");
    drop(session);
}
