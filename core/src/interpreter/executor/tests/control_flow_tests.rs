//! Tests for branches and loops

use super::helpers::{output, run_global, Session};
use crate::value::Value;

#[test]
fn test_if_elif_else() {
    let source = "
def classify(n):
    if n < 0:
        return 'negative'
    elif n == 0:
        return 'zero'
    else:
        return 'positive'

results = [classify(-5), classify(0), classify(3)]
";
    assert_eq!(
        run_global(source, "results"),
        Value::from(vec!["negative", "zero", "positive"])
    );
}

#[test]
fn test_while_with_break_and_continue() {
    let source = "
n = 0
odds = []
while True:
    n += 1
    if n > 9:
        break
    if n % 2 == 0:
        continue
    odds.append(n)
";
    assert_eq!(run_global(source, "odds"), Value::from(vec![1i64, 3, 5, 7, 9]));
}

#[test]
fn test_for_over_range_and_tuple_targets() {
    let mut session = Session::new();
    session.run(
        "
total = 0
for i in range(1, 11):
    total += i

pairs = []
for index, letter in enumerate('abc'):
    pairs.append(letter * (index + 1))

countdown = list(range(5, 0, -2))
",
    );
    assert_eq!(session.global("total"), Value::Int(55));
    assert_eq!(session.global("pairs"), Value::from(vec!["a", "bb", "ccc"]));
    assert_eq!(session.global("countdown"), Value::from(vec![5i64, 3, 1]));
}

#[test]
fn test_nested_loop_break_only_exits_inner() {
    let source = "
found = []
for i in range(3):
    for j in range(3):
        if j > i:
            break
        found.append((i, j))
";
    let found = run_global(source, "found");
    assert_eq!(found.as_list().map(|l| l.len()), Some(6));
}

#[test]
fn test_loop_variable_survives_loop() {
    assert_eq!(run_global("for i in range(4):\n    pass\n", "i"), Value::Int(3));
}

#[test]
fn test_iterating_dict_yields_keys_in_insertion_order() {
    let source = "
d = {'b': 1, 'a': 2, 'c': 3}
d['a'] = 20
keys = [k for k in d]
";
    assert_eq!(run_global(source, "keys"), Value::from(vec!["b", "a", "c"]));
}

#[test]
fn test_list_mutation_during_iteration_uses_snapshot() {
    let source = "
items = [1, 2, 3]
seen = []
for item in items:
    seen.append(item)
    if len(items) < 6:
        items.append(item * 10)
";
    assert_eq!(run_global(source, "seen"), Value::from(vec![1i64, 2, 3]));
}

#[test]
fn test_one_line_suites_and_semicolons() {
    let text = output("if True: print('a'); print('b')\nfor c in 'xy': print(c)\n");
    assert_eq!(text, "a\nb\nx\ny\n");
}

#[test]
fn test_pass_and_empty_program() {
    let mut session = Session::new();
    session.run("");
    session.run("# only a comment\n");
    session.run("pass");
}

#[test]
fn test_iterator_protocol_with_next() {
    let source = "
it = iter([10, 20])
a = next(it)
b = next(it)
c = next(it, 'done')
";
    let mut session = Session::new();
    session.run(source);
    assert_eq!(session.global("a"), Value::Int(10));
    assert_eq!(session.global("b"), Value::Int(20));
    assert_eq!(session.global("c"), Value::from("done"));
    assert_eq!(session.raise("next(it)").exception, "StopIteration");
}

#[test]
fn test_user_defined_iterator() {
    let source = "
class Countdown:
    def __init__(self, start):
        self.current = start

    def __iter__(self):
        return self

    def __next__(self):
        if self.current <= 0:
            raise StopIteration
        self.current -= 1
        return self.current + 1

values = list(Countdown(3))
";
    assert_eq!(run_global(source, "values"), Value::from(vec![3i64, 2, 1]));
}
