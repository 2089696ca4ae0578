//! Tests for functions, closures and argument binding

use super::helpers::{raises, run_global, Session};
use crate::value::Value;

#[test]
fn test_defaults_and_keywords() {
    let source = "
def greet(name, greeting='Hello', punctuation='!'):
    return greeting + ', ' + name + punctuation

a = greet('Ada')
b = greet('Bob', punctuation='?')
c = greet(greeting='Hi', name='Cy')
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("a"), Value::from("Hello, Ada!"));
    assert_eq!(session.global("b"), Value::from("Hello, Bob?"));
    assert_eq!(session.global("c"), Value::from("Hi, Cy!"));
}

#[test]
fn test_varargs_and_kwargs() {
    let source = "
def collect(first, *rest, **options):
    return [first, list(rest), sorted(options.keys())]

result = collect(1, 2, 3, b=2, a=1)
spread = collect(*[7, 8], **{'z': 0})
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("result").repr(), "[1, [2, 3], ['a', 'b']]");
    assert_eq!(session.global("spread").repr(), "[7, [8], ['z']]");
}

#[test]
fn test_keyword_only_parameters() {
    let source = "
def scale(value, *extra, factor=2):
    return (value + sum(extra)) * factor

def need(*args, key):
    return key

a = scale(3)
b = scale(3, 1, factor=10)
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("a"), Value::Int(6));
    assert_eq!(session.global("b"), Value::Int(40));

    let err = session.raise("need(1)");
    assert_eq!(err.exception, "TypeError");
    assert_eq!(
        err.message,
        "need() missing 1 required keyword-only argument: 'key'"
    );
}

#[test]
fn test_argument_errors() {
    let base = "def f(a, b):\n    return a + b\n";

    let err = raises(&format!("{}f(1)", base));
    assert_eq!(err.exception, "TypeError");
    assert_eq!(err.message, "f() missing 1 required positional argument: 'b'");

    let err = raises(&format!("{}f(1, 2, 3)", base));
    assert_eq!(err.message, "f() takes 2 positional arguments but 3 were given");

    let err = raises(&format!("{}f(1, c=2)", base));
    assert_eq!(err.message, "f() got an unexpected keyword argument 'c'");

    let err = raises(&format!("{}f(1, a=2)", base));
    assert_eq!(err.message, "f() got multiple values for argument 'a'");
}

#[test]
fn test_recursion() {
    let source = "
def fib(n):
    if n < 2:
        return n
    return fib(n - 1) + fib(n - 2)

result = fib(15)
";
    assert_eq!(run_global(source, "result"), Value::Int(610));
}

#[test]
fn test_recursion_limit_raises_recursion_error() {
    let err = raises("def down(n):\n    return down(n + 1)\n\ndown(0)\n");
    assert_eq!(err.exception, "RecursionError");
    assert!(err.message.contains("maximum recursion depth"));
}

#[test]
fn test_closures_capture_enclosing_scope() {
    let source = "
def make_counter():
    count = 0
    def increment():
        nonlocal count
        count += 1
        return count
    return increment

counter = make_counter()
counter()
counter()
result = counter()
";
    assert_eq!(run_global(source, "result"), Value::Int(3));
}

#[test]
fn test_closures_are_independent() {
    let source = "
def adder(n):
    return lambda x: x + n

add2 = adder(2)
add10 = adder(10)
result = [add2(1), add10(1)]
";
    assert_eq!(run_global(source, "result"), Value::from(vec![3i64, 11]));
}

#[test]
fn test_global_statement() {
    let source = "
hits = 0

def record():
    global hits
    hits += 1

record()
record()
";
    assert_eq!(run_global(source, "hits"), Value::Int(2));
}

#[test]
fn test_assignment_in_function_is_local() {
    let source = "
x = 'outer'

def shadow():
    x = 'inner'
    return x

inner = shadow()
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("inner"), Value::from("inner"));
    assert_eq!(session.global("x"), Value::from("outer"));
}

#[test]
fn test_function_without_return_yields_none() {
    assert_eq!(
        run_global("def f():\n    pass\n\nresult = f()\n", "result"),
        Value::None
    );
}

#[test]
fn test_lambda_defaults_and_sorting_key() {
    let source = "
words = ['pear', 'fig', 'banana']
by_length = sorted(words, key=lambda w: len(w))
by_last = sorted(words, key=lambda w, i=-1: w[i], reverse=True)
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(
        session.global("by_length"),
        Value::from(vec!["fig", "pear", "banana"])
    );
    assert_eq!(
        session.global("by_last"),
        Value::from(vec!["pear", "fig", "banana"])
    );
}

#[test]
fn test_higher_order_builtins() {
    let source = "
doubled = list(map(lambda x: x * 2, [1, 2, 3]))
evens = list(filter(lambda x: x % 2 == 0, range(7)))
pairs = list(zip('ab', [1, 2, 3]))
flags = [any([0, 0, 1]), all([1, 1, 0]), all([])]
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("doubled"), Value::from(vec![2i64, 4, 6]));
    assert_eq!(session.global("evens"), Value::from(vec![0i64, 2, 4, 6]));
    assert_eq!(session.global("pairs").repr(), "[('a', 1), ('b', 2)]");
    assert_eq!(session.global("flags"), Value::from(vec![true, false, true]));
}

#[test]
fn test_function_name_attribute() {
    let source = "
def named():
    pass

names = [named.__name__, len.__name__]
";
    assert_eq!(run_global(source, "names"), Value::from(vec!["named", "len"]));
}
