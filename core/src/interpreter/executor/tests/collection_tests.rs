//! Tests for lists, tuples, dicts, ranges and comprehensions

use super::helpers::{eval, eval_repr, raises, run_global, Session};
use crate::error::ErrorKind;
use crate::value::Value;

#[test]
fn test_list_methods() {
    let source = "
items = [3, 1, 2]
items.append(5)
items.extend([8, 13])
items.insert(0, 0)
popped = items.pop()
first = items.pop(0)
items.remove(5)
position = items.index(2)
items.sort()
ordered = items.copy()
items.reverse()
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("popped"), Value::Int(13));
    assert_eq!(session.global("first"), Value::Int(0));
    assert_eq!(session.global("position"), Value::Int(2));
    assert_eq!(session.global("ordered"), Value::from(vec![1i64, 2, 3, 8]));
    assert_eq!(session.global("items"), Value::from(vec![8i64, 3, 2, 1]));
}

#[test]
fn test_list_method_errors() {
    let err = raises("[].pop()");
    assert_eq!(err.exception, "IndexError");
    assert_eq!(err.message, "pop from empty list");

    let err = raises("[1].remove(2)");
    assert_eq!(err.exception, "ValueError");
    assert_eq!(err.message, "list.remove(x): x not in list");

    let err = raises("[1, 2].index(9)");
    assert_eq!(err.message, "9 is not in list");
}

#[test]
fn test_sort_with_key_and_reverse() {
    let source = "
people = [('ann', 31), ('bob', 25), ('cy', 31)]
people.sort(key=lambda p: p[1], reverse=True)
names = [p[0] for p in people]
";
    assert_eq!(run_global(source, "names"), Value::from(vec!["ann", "cy", "bob"]));
}

#[test]
fn test_indexing_and_slicing() {
    assert_eq!(eval("[10, 20, 30][-1]"), Value::Int(30));
    assert_eq!(eval("'hello'[1]"), Value::from("e"));
    assert_eq!(eval("[0, 1, 2, 3, 4, 5][1:4]"), Value::from(vec![1i64, 2, 3]));
    assert_eq!(eval("[0, 1, 2, 3, 4, 5][::2]"), Value::from(vec![0i64, 2, 4]));
    assert_eq!(eval("[0, 1, 2, 3][::-1]"), Value::from(vec![3i64, 2, 1, 0]));
    assert_eq!(eval("'abcdef'[-3:]"), Value::from("def"));
    assert_eq!(eval("'abc'[5:]"), Value::from(""));
    assert_eq!(eval_repr("(1, 2, 3)[:2]"), "(1, 2)");
    assert_eq!(eval("range(10)[2]"), Value::Int(2));
}

#[test]
fn test_index_out_of_range() {
    let err = raises("[1, 2, 3][3]");
    assert_eq!(err.exception, "IndexError");
    assert_eq!(err.kind, ErrorKind::IndexOutOfRange);
    assert_eq!(err.message, "list index out of range");

    assert_eq!(raises("(1,)[-2]").message, "tuple index out of range");
    assert_eq!(raises("''[0]").message, "string index out of range");
}

#[test]
fn test_slice_assignment_and_deletion() {
    let source = "
items = [0, 1, 2, 3, 4, 5]
items[1:3] = ['a', 'b', 'c']
del items[-2:]
items[0] = 'start'
del items[1]
";
    assert_eq!(run_global(source, "items").repr(), "['start', 'b', 'c', 3]");

    let err = raises("items = [1, 2, 3, 4]\nitems[::2] = [9]\n");
    assert_eq!(
        err.message,
        "attempt to assign sequence of size 1 to extended slice of size 2"
    );
}

#[test]
fn test_sequence_operators() {
    assert_eq!(eval("[1, 2] + [3]"), Value::from(vec![1i64, 2, 3]));
    assert_eq!(eval("[0] * 3"), Value::from(vec![0i64, 0, 0]));
    assert_eq!(eval("'ab' * 2"), Value::from("abab"));
    assert_eq!(eval_repr("(1,) + (2,)"), "(1, 2)");
    assert_eq!(eval("3 in [1, 2, 3]"), Value::Bool(true));
    assert_eq!(eval("'ell' in 'hello'"), Value::Bool(true));
    assert_eq!(eval("'k' not in {'k': 1}"), Value::Bool(false));
}

#[test]
fn test_augmented_add_extends_list_in_place() {
    let source = "
a = [1]
b = a
a += [2]
same = a is b
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("same"), Value::Bool(true));
    assert_eq!(session.global("b"), Value::from(vec![1i64, 2]));
}

#[test]
fn test_dict_operations() {
    let source = "
d = {'a': 1}
d['b'] = 2
d.update({'c': 3})
d.setdefault('a', 100)
d.setdefault('z', 26)
got = [d.get('a'), d.get('missing'), d.get('missing', 0)]
removed = d.pop('b')
keys = list(d.keys())
values = list(d.values())
items = list(d.items())
size = len(d)
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("got").repr(), "[1, None, 0]");
    assert_eq!(session.global("removed"), Value::Int(2));
    assert_eq!(session.global("keys"), Value::from(vec!["a", "c", "z"]));
    assert_eq!(session.global("values"), Value::from(vec![1i64, 3, 26]));
    assert_eq!(
        session.global("items").repr(),
        "[('a', 1), ('c', 3), ('z', 26)]"
    );
    assert_eq!(session.global("size"), Value::Int(3));
}

#[test]
fn test_missing_key() {
    let err = raises("d = {'a': 1}\nd['b']\n");
    assert_eq!(err.exception, "KeyError");
    assert_eq!(err.kind, ErrorKind::KeyNotFound);
    assert_eq!(err.message, "'b'");

    assert_eq!(raises("{}.pop(3)").message, "3");
}

#[test]
fn test_unhashable_dict_key() {
    let err = raises("d = {[1]: 2}");
    assert_eq!(err.exception, "TypeError");
    assert_eq!(err.message, "unhashable type: 'list'");
}

#[test]
fn test_numeric_keys_are_equal_across_types() {
    let source = "
d = {1: 'int'}
d[1.0] = 'float'
d[True] = 'bool'
result = [len(d), d[1]]
";
    assert_eq!(run_global(source, "result").repr(), "[1, 'bool']");
}

#[test]
fn test_dict_constructor_forms() {
    assert_eq!(
        eval_repr("dict([('a', 1), ('b', 2)])"),
        "{'a': 1, 'b': 2}"
    );
    assert_eq!(eval_repr("dict(x=1, y=2)"), "{'x': 1, 'y': 2}");
    assert_eq!(eval_repr("dict(zip('ab', [1, 2]))"), "{'a': 1, 'b': 2}");
}

#[test]
fn test_comprehensions() {
    let mut session = Session::new();
    session.run(
        "
squares = [n * n for n in range(6) if n % 2 == 0]
pairs = [(a, b) for a in range(3) for b in range(a)]
lengths = {w: len(w) for w in ['ox', 'bird']}
nested = [[c for c in word] for word in ['ab', 'c']]
",
    );
    assert_eq!(session.global("squares"), Value::from(vec![0i64, 4, 16]));
    assert_eq!(session.global("pairs").repr(), "[(1, 0), (2, 0), (2, 1)]");
    assert_eq!(session.global("lengths").repr(), "{'ox': 2, 'bird': 4}");
    assert_eq!(session.global("nested").repr(), "[['a', 'b'], ['c']]");
}

#[test]
fn test_comprehension_variable_does_not_leak() {
    let mut session = Session::new();
    session.run("result = [n for n in range(3)]");
    assert!(!session.has_global("n"));
}

#[test]
fn test_tuple_methods_and_immutability() {
    assert_eq!(eval("(1, 2, 2, 3).count(2)"), Value::Int(2));
    assert_eq!(eval("(5, 6, 7).index(7)"), Value::Int(2));

    let err = raises("t = (1, 2)\nt[0] = 5\n");
    assert_eq!(err.exception, "TypeError");
    assert_eq!(err.message, "'tuple' object does not support item assignment");
}

#[test]
fn test_builtins_over_iterables() {
    assert_eq!(eval("len(range(0, 10, 3))"), Value::Int(4));
    assert_eq!(eval("list(reversed([1, 2, 3]))"), Value::from(vec![3i64, 2, 1]));
    assert_eq!(eval("sorted('bca')"), Value::from(vec!["a", "b", "c"]));
    assert_eq!(eval("sorted([3, 1, 2], reverse=True)"), Value::from(vec![3i64, 2, 1]));
    assert_eq!(eval("max(['aa', 'b'], key=len)"), Value::from("aa"));
    assert_eq!(eval_repr("list(enumerate('ab'))"), "[(0, 'a'), (1, 'b')]");
    assert_eq!(eval_repr("tuple([1, 2])"), "(1, 2)");
}

#[test]
fn test_self_referencing_list_repr() {
    let mut session = Session::new();
    session.run("a = [1]\na.append(a)\ntext = repr(a)\n");
    assert_eq!(session.global("text"), Value::from("[1, [...]]"));
}
