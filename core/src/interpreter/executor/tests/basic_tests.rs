//! Tests for literals, operators and names

use super::helpers::{eval, eval_repr, raises, run_global, Session};
use crate::error::ErrorKind;
use crate::value::Value;

#[test]
fn test_integer_arithmetic() {
    assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
    assert_eq!(eval("7 // 2"), Value::Int(3));
    assert_eq!(eval("-7 // 2"), Value::Int(-4));
    assert_eq!(eval("-7 % 3"), Value::Int(2));
    assert_eq!(eval("7 % -3"), Value::Int(-2));
    assert_eq!(eval("2 ** 10"), Value::Int(1024));
    assert_eq!(eval("-2 ** 2"), Value::Int(-4));
    assert_eq!(eval("1 << 4 | 1"), Value::Int(17));
    assert_eq!(eval("~5"), Value::Int(-6));
}

#[test]
fn test_true_division_yields_float() {
    assert_eq!(eval("7 / 2"), Value::Float(3.5));
    assert_eq!(eval("4 / 2"), Value::Float(2.0));
    assert_eq!(eval("2 ** -1"), Value::Float(0.5));
}

#[test]
fn test_mixed_numeric_promotion() {
    assert_eq!(eval("1 + 2.5"), Value::Float(3.5));
    assert_eq!(eval("True + True"), Value::Int(2));
    assert_eq!(eval_repr("1j * 1j"), "(-1+0j)");
    assert_eq!(eval_repr("(1 + 2j).real"), "1.0");
}

#[test]
fn test_integer_literals() {
    assert_eq!(eval("0x1F"), Value::Int(31));
    assert_eq!(eval("0o17"), Value::Int(15));
    assert_eq!(eval("0b101"), Value::Int(5));
    assert_eq!(eval("1_000_000"), Value::Int(1_000_000));
}

#[test]
fn test_division_by_zero() {
    let err = raises("x = 1 / 0");
    assert_eq!(err.exception, "ZeroDivisionError");
    assert_eq!(err.kind, ErrorKind::ZeroDivision);
    assert_eq!(err.message, "division by zero");

    assert_eq!(raises("x = 1 % 0").exception, "ZeroDivisionError");
    assert_eq!(raises("x = 1.0 // 0").exception, "ZeroDivisionError");
}

#[test]
fn test_integer_overflow_raises() {
    let err = raises("x = 9223372036854775807 + 1");
    assert_eq!(err.exception, "OverflowError");
    assert_eq!(raises("x = 2 ** 64").exception, "OverflowError");
}

#[test]
fn test_comparisons_chain() {
    assert_eq!(eval("1 < 2 < 3"), Value::Bool(true));
    assert_eq!(eval("1 < 3 < 2"), Value::Bool(false));
    assert_eq!(eval("1 == 1.0"), Value::Bool(true));
    assert_eq!(eval("'a' < 'b'"), Value::Bool(true));
    assert_eq!(eval("[1, 2] < [1, 3]"), Value::Bool(true));
    assert_eq!(eval("(1, 2) == (1, 2)"), Value::Bool(true));
    assert_eq!(eval("None is None"), Value::Bool(true));
    assert_eq!(eval("1 is not None"), Value::Bool(true));
}

#[test]
fn test_ordering_mismatched_types_raises() {
    let err = raises("x = 1 < 'a'");
    assert_eq!(err.exception, "TypeError");
    assert!(err.message.contains("not supported between instances"));
}

#[test]
fn test_unsupported_operand() {
    let err = raises("x = 'a' + 1");
    assert_eq!(err.exception, "TypeError");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn test_boolean_operators_return_operands() {
    assert_eq!(eval("0 or 'x'"), Value::from("x"));
    assert_eq!(eval("'' and 1"), Value::from(""));
    assert_eq!(eval("1 and 2"), Value::Int(2));
    assert_eq!(eval("not []"), Value::Bool(true));
}

#[test]
fn test_short_circuit_skips_right_side() {
    assert_eq!(eval("True or undefined_name"), Value::Bool(true));
    assert_eq!(eval("False and undefined_name"), Value::Bool(false));
}

#[test]
fn test_truthiness() {
    let source = "
values = [0, 1, 0.0, '', 'a', [], [0], {}, {'k': 1}, None, (), range(0)]
flags = [bool(v) for v in values]
";
    assert_eq!(
        run_global(source, "flags"),
        Value::from(vec![
            false, true, false, false, true, false, true, false, true, false, false, false
        ])
    );
}

#[test]
fn test_ternary() {
    assert_eq!(eval("'yes' if 1 > 0 else 'no'"), Value::from("yes"));
    assert_eq!(eval("'yes' if [] else 'no'"), Value::from("no"));
}

#[test]
fn test_assignment_forms() {
    let mut session = Session::new();
    session.run(
        "
a = b = 5
c, d = 1, 2
c, d = d, c
[e, (f, g)] = [3, (4, 5)]
h = 10
h += 1
h *= 2
h -= 2
h //= 4
",
    );
    assert_eq!(session.global("a"), Value::Int(5));
    assert_eq!(session.global("b"), Value::Int(5));
    assert_eq!(session.global("c"), Value::Int(2));
    assert_eq!(session.global("d"), Value::Int(1));
    assert_eq!(session.global("g"), Value::Int(5));
    assert_eq!(session.global("h"), Value::Int(5));
}

#[test]
fn test_unpacking_count_mismatch() {
    let err = raises("a, b = [1, 2, 3]");
    assert_eq!(err.exception, "ValueError");
    assert_eq!(err.message, "too many values to unpack (expected 2)");

    let err = raises("a, b, c = (1, 2)");
    assert_eq!(err.message, "not enough values to unpack (expected 3, got 2)");
}

#[test]
fn test_undefined_name() {
    let err = raises("x = missing + 1");
    assert_eq!(err.exception, "NameError");
    assert_eq!(err.kind, ErrorKind::NameNotFound);
    assert_eq!(err.message, "name 'missing' is not defined");
}

#[test]
fn test_del_unbinds_name() {
    let mut session = Session::new();
    session.run("x = 1\ny = 2\ndel x");
    assert!(!session.has_global("x"));
    assert!(session.has_global("y"));
    assert_eq!(session.raise("del x").exception, "NameError");
}

#[test]
fn test_globals_accumulate_across_runs() {
    let mut session = Session::new();
    session.run("def double(n):\n    return n * 2\n");
    session.run("result = double(21)");
    assert_eq!(session.global("result"), Value::Int(42));
}

#[test]
fn test_print_writes_to_output_sink() {
    let mut session = Session::new();
    session.run("print('a', 1, 2.5, None, [1, 'b'])\nprint('x', 'y', sep='-', end='!')");
    assert_eq!(session.output.take(), "a 1 2.5 None [1, 'b']\nx-y!");
}

#[test]
fn test_builtin_numeric_functions() {
    assert_eq!(eval("abs(-3)"), Value::Int(3));
    assert_eq!(eval("divmod(7, 2)"), Value::from((3i64, 1i64)));
    assert_eq!(eval("pow(2, 10, 1000)"), Value::Int(24));
    assert_eq!(eval("round(2.675, 2)"), Value::Float(2.67));
    assert_eq!(eval("round(0.5)"), Value::Int(0));
    assert_eq!(eval("round(1.5)"), Value::Int(2));
    assert_eq!(eval("min(3, 1, 2)"), Value::Int(1));
    assert_eq!(eval("max([4, 9, 2])"), Value::Int(9));
    assert_eq!(eval("sum([1, 2, 3], 10)"), Value::Int(16));
    assert_eq!(eval("int('ff', 16)"), Value::Int(255));
    assert_eq!(eval("int(-3.9)"), Value::Int(-3));
    assert_eq!(eval("float('1.5')"), Value::Float(1.5));
    assert_eq!(eval("chr(65) + str(ord('B'))"), Value::from("A66"));
}

#[test]
fn test_round_to_negative_places() {
    assert_eq!(eval("round(1234.5678, -2)"), Value::Float(1200.0));
    assert_eq!(eval("round(25.4, -1)"), Value::Float(30.0));
    assert_eq!(eval("round(25.0, -1)"), Value::Float(20.0));
    assert_eq!(eval("round(35.0, -1)"), Value::Float(40.0));
    assert_eq!(eval("round(-25.4, -1)"), Value::Float(-30.0));
    assert_eq!(eval("round(999.0, -3)"), Value::Float(1000.0));
    assert_eq!(eval("round(1e308, -400)"), Value::Float(0.0));
    assert_eq!(eval("round(1e308, 400)"), Value::Float(1e308));
    assert_eq!(eval("round(1.5, -1000)"), Value::Float(0.0));
}

#[test]
fn test_int_parse_failure() {
    let err = raises("x = int('abc')");
    assert_eq!(err.exception, "ValueError");
    assert!(err.message.contains("invalid literal for int()"));
}

#[test]
fn test_type_and_isinstance() {
    assert_eq!(eval("type(1).__name__"), Value::from("int"));
    assert_eq!(eval("type('s') is str"), Value::Bool(true));
    assert_eq!(eval("isinstance(True, int)"), Value::Bool(true));
    assert_eq!(eval("isinstance(1.0, (int, float))"), Value::Bool(true));
    assert_eq!(eval("isinstance([], dict)"), Value::Bool(false));
    assert_eq!(eval("callable(len)"), Value::Bool(true));
}

#[test]
fn test_float_repr_round_trips() {
    assert_eq!(eval_repr("0.1 + 0.2"), "0.30000000000000004");
    assert_eq!(eval_repr("1e20"), "1e+20");
    assert_eq!(eval_repr("float('inf')"), "inf");
    assert_eq!(eval_repr("-0.0"), "-0.0");
}
