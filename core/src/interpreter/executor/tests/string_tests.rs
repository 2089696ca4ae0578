//! Tests for string methods and formatting

use super::helpers::{eval, eval_repr, raises, run_global};
use crate::value::Value;

#[test]
fn test_case_and_whitespace_methods() {
    assert_eq!(eval("'MiXed'.upper()"), Value::from("MIXED"));
    assert_eq!(eval("'MiXed'.lower()"), Value::from("mixed"));
    assert_eq!(eval("'MiXed'.swapcase()"), Value::from("mIxED"));
    assert_eq!(eval("'hello wide world'.title()"), Value::from("Hello Wide World"));
    assert_eq!(eval("'hELLO'.capitalize()"), Value::from("Hello"));
    assert_eq!(eval("'  pad  '.strip()"), Value::from("pad"));
    assert_eq!(eval("'xxpadxx'.strip('x')"), Value::from("pad"));
    assert_eq!(eval("'  pad'.lstrip() + '|'"), Value::from("pad|"));
    assert_eq!(eval("'pad  '.rstrip() + '|'"), Value::from("pad|"));
}

#[test]
fn test_split_and_join() {
    assert_eq!(
        eval("'a  b\\tc\\n'.split()"),
        Value::from(vec!["a", "b", "c"])
    );
    assert_eq!(eval("'a,b,,c'.split(',')"), Value::from(vec!["a", "b", "", "c"]));
    assert_eq!(eval("'a,b,c'.split(',', 1)"), Value::from(vec!["a", "b,c"]));
    assert_eq!(eval("'a,b,c'.rsplit(',', 1)"), Value::from(vec!["a,b", "c"]));
    assert_eq!(eval("'one\\ntwo'.splitlines()"), Value::from(vec!["one", "two"]));
    assert_eq!(eval("'-'.join(['x', 'y', 'z'])"), Value::from("x-y-z"));
    assert_eq!(eval_repr("'key=value=x'.partition('=')"), "('key', '=', 'value=x')");
}

#[test]
fn test_join_rejects_non_strings() {
    let err = raises("', '.join(['a', 1])");
    assert_eq!(err.exception, "TypeError");
}

#[test]
fn test_search_methods() {
    assert_eq!(eval("'banana'.find('an')"), Value::Int(1));
    assert_eq!(eval("'banana'.rfind('an')"), Value::Int(3));
    assert_eq!(eval("'banana'.find('x')"), Value::Int(-1));
    assert_eq!(eval("'banana'.count('a')"), Value::Int(3));
    assert_eq!(eval("'banana'.replace('a', 'o')"), Value::from("bonono"));
    assert_eq!(eval("'banana'.replace('a', 'o', 1)"), Value::from("bonana"));
    assert_eq!(eval("'report.csv'.endswith('.csv')"), Value::Bool(true));
    assert_eq!(eval("'report.csv'.startswith(('x', 're'))"), Value::Bool(true));
    assert_eq!(eval("'v1.2'.removeprefix('v')"), Value::from("1.2"));

    assert_eq!(raises("'abc'.index('z')").exception, "ValueError");
}

#[test]
fn test_predicates_and_padding() {
    assert_eq!(eval("'123'.isdigit()"), Value::Bool(true));
    assert_eq!(eval("'abc'.isalpha()"), Value::Bool(true));
    assert_eq!(eval("'ab1'.isalnum()"), Value::Bool(true));
    assert_eq!(eval("' \\t'.isspace()"), Value::Bool(true));
    assert_eq!(eval("'42'.zfill(5)"), Value::from("00042"));
    assert_eq!(eval("'-42'.zfill(5)"), Value::from("-0042"));
    assert_eq!(eval("'ab'.center(6, '*')"), Value::from("**ab**"));
    assert_eq!(eval("'ab'.ljust(4) + '|'"), Value::from("ab  |"));
    assert_eq!(eval("'ab'.rjust(4)"), Value::from("  ab"));
}

#[test]
fn test_strings_are_unicode_aware() {
    assert_eq!(eval("len('héllo')"), Value::Int(5));
    assert_eq!(eval("'héllo'[1]"), Value::from("é"));
    assert_eq!(eval("'héllo'.upper()"), Value::from("HÉLLO"));
    assert_eq!(eval("ord('é')"), Value::Int(233));
}

#[test]
fn test_escape_sequences_and_repr() {
    assert_eq!(eval("len('a\\nb')"), Value::Int(3));
    assert_eq!(eval("r'a\\nb'"), Value::from("a\\nb"));
    assert_eq!(eval("repr('line\\n')"), Value::from("'line\\n'"));
    assert_eq!(eval("repr(\"it's\")"), Value::from("\"it's\""));
    assert_eq!(eval("'adjacent' ' literals'"), Value::from("adjacent literals"));
}

#[test]
fn test_f_strings() {
    let source = "
name = 'ada'
count = 3
price = 2.5
line = f'{name!r} bought {count} items at {price:.2f} = {count * price:>7.2f}'
braces = f'{{literal}} {name.upper()}'
";
    let mut session = super::helpers::Session::new();
    session.run(source);
    assert_eq!(
        session.global("line"),
        Value::from("'ada' bought 3 items at 2.50 =    7.50")
    );
    assert_eq!(session.global("braces"), Value::from("{literal} ADA"));
}

#[test]
fn test_format_specs() {
    assert_eq!(eval("format(1234567, ',')"), Value::from("1,234,567"));
    assert_eq!(eval("format(255, '#x')"), Value::from("0xff"));
    assert_eq!(eval("format(5, '08b')"), Value::from("00000101"));
    assert_eq!(eval("format(0.25, '.1%')"), Value::from("25.0%"));
    assert_eq!(eval("format('hi', '*^6')"), Value::from("**hi**"));
    assert_eq!(eval("format(-3, '+d')"), Value::from("-3"));
    assert_eq!(eval("format(3, '+d')"), Value::from("+3"));
    assert_eq!(eval("format(1.5e-7, 'g')"), Value::from("1.5e-07"));

    let err = raises("format('text', 'd')");
    assert_eq!(err.exception, "ValueError");
}

#[test]
fn test_str_format_method() {
    assert_eq!(eval("'{} and {}'.format('a', 'b')"), Value::from("a and b"));
    assert_eq!(eval("'{1}{0}{1}'.format('x', 'y')"), Value::from("yxy"));
    assert_eq!(eval("'{name}: {n:03d}'.format(name='id', n=7)"), Value::from("id: 007"));
    assert_eq!(eval("'{0[1]} {0[0]}'.format(['a', 'b'])"), Value::from("b a"));
    assert_eq!(eval("'{0:>{1}}|'.format('x', 4)"), Value::from("   x|"));
    assert_eq!(eval("'{{}} {!r}'.format('q')"), Value::from("{} 'q'"));

    let err = raises("'{} {0}'.format(1, 2)");
    assert_eq!(
        err.message,
        "cannot switch from automatic field numbering to manual field specification"
    );
    assert_eq!(raises("'{missing}'.format()").exception, "KeyError");
}

#[test]
fn test_percent_formatting() {
    assert_eq!(eval("'%s is %d years' % ('ada', 36)"), Value::from("ada is 36 years"));
    assert_eq!(eval("'%5.1f|%-4d|%03d' % (3.14159, 7, 5)"), Value::from("  3.1|7   |005"));
    assert_eq!(eval("'%x %r %%' % (255, 'q')"), Value::from("ff 'q' %"));
    assert_eq!(eval("'%(a)s-%(b)s' % {'a': 1, 'b': 2}"), Value::from("1-2"));
    assert_eq!(eval("'only %s' % 'one'"), Value::from("only one"));

    let err = raises("'%s %s' % ('one',)");
    assert_eq!(err.exception, "TypeError");
    assert_eq!(err.message, "not enough arguments for format string");

    let err = raises("'%s' % (1, 2)");
    assert_eq!(err.message, "not all arguments converted during string formatting");
}

#[test]
fn test_str_conversions() {
    let source = "
values = [str(1), str(2.0), str(None), str(True), str([1, 'a']), str((1,)), str({'k': 'v'})]
";
    assert_eq!(
        run_global(source, "values"),
        Value::from(vec!["1", "2.0", "None", "True", "[1, 'a']", "(1,)", "{'k': 'v'}"])
    );
}

#[test]
fn test_unbound_str_methods() {
    assert_eq!(eval("str.upper('abc')"), Value::from("ABC"));
    assert_eq!(
        eval("list(map(str.strip, [' a ', 'b ']))"),
        Value::from(vec!["a", "b"])
    );
}

#[test]
fn test_string_iteration_and_comparison() {
    assert_eq!(eval("[c for c in 'abc']"), Value::from(vec!["a", "b", "c"]));
    assert_eq!(eval("'apple' < 'banana'"), Value::Bool(true));
    assert_eq!(eval("'Z' < 'a'"), Value::Bool(true));
    assert_eq!(eval("min('hello')"), Value::from("e"));
}
