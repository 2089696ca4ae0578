//! Tests for moving values between the host and guest code

use crate::state::State;
use crate::value::{Complex64, Dict, IntPolicy, List, Value};
use maplit::{btreemap, hashmap};
use serde_json::json;

#[test]
fn test_host_maps_become_guest_dicts() {
    let mut state = State::bare();
    state
        .set_global("prices", hashmap! { "apple" => 1.5, "pear" => 2.0 })
        .unwrap();
    state
        .set_global("stock", btreemap! { "apple" => 3, "pear" => 0 })
        .unwrap();

    state
        .run("value = sum([prices[k] * stock[k] for k in stock])\nkeys = sorted(prices.keys())\n")
        .unwrap();
    assert_eq!(state.get_global("value").unwrap(), Value::Float(4.5));
    assert_eq!(state.get_global("keys").unwrap(), Value::from(vec!["apple", "pear"]));
}

#[test]
fn test_containers_are_copied_into_the_guest() {
    let mut state = State::bare();
    let items = List::from_vec(vec![Value::Int(1)]);
    state.set_global("items", Value::List(items.clone())).unwrap();
    state.run("items.append(2)").unwrap();

    // The host list is untouched; the guest holds its own copy
    assert_eq!(items.len(), 1);
    assert_eq!(state.get_global("items").unwrap(), Value::from(vec![1i64, 2]));
}

#[test]
fn test_shared_structure_survives_the_trip_in() {
    let mut state = State::bare();
    let inner = List::from_vec(vec![Value::Int(0)]);
    let outer = List::from_vec(vec![Value::List(inner.clone()), Value::List(inner)]);
    state.set_global("outer", Value::List(outer)).unwrap();

    state.run("outer[0].append(1)\nsame = outer[0] is outer[1]\n").unwrap();
    assert_eq!(state.get_global("same").unwrap(), Value::Bool(true));
    assert_eq!(state.eval("outer[1]").unwrap(), Value::from(vec![0i64, 1]));
}

#[test]
fn test_cyclic_guest_structures_come_out_cyclic() {
    let mut state = State::bare();
    state.run("node = {'name': 'root'}\nnode['self'] = node\n").unwrap();

    let node = state.get_global("node").unwrap();
    let dict = node.as_dict().unwrap();
    assert_eq!(dict.get("name"), Value::from("root"));
    assert!(dict.get("self").as_dict().unwrap().ptr_eq(dict));
    assert_eq!(node.repr(), "{'name': 'root', 'self': {...}}");
}

#[test]
fn test_json_values_cross_both_ways() {
    let mut state = State::bare();
    let payload = json!({ "user": "ada", "tags": ["x", "y"], "score": 9.5, "admin": false });
    state.set_global("payload", payload).unwrap();
    state
        .run("summary = {'who': payload['user'], 'count': len(payload['tags']), 'ok': payload['score'] > 9}")
        .unwrap();

    let summary = state.get_global("summary").unwrap();
    assert_eq!(
        summary.to_json(),
        Some(json!({ "who": "ada", "count": 2, "ok": true }))
    );
}

#[test]
fn test_tuples_and_none_keep_their_shape() {
    let mut state = State::bare();
    state.set_global("pair", ("left", 2)).unwrap();
    state.set_global("missing", Option::<i64>::None).unwrap();
    state
        .run("kind = type(pair).__name__\nfirst = pair[0]\nis_none = missing is None\n")
        .unwrap();

    assert_eq!(state.get_global("kind").unwrap(), Value::from("tuple"));
    assert_eq!(state.get_global("first").unwrap(), Value::from("left"));
    assert_eq!(state.get_global("is_none").unwrap(), Value::Bool(true));

    state.run("out = (1, 'two', None)").unwrap();
    assert_eq!(state.get_global("out").unwrap(), Value::from((1, "two", ())));
}

#[test]
fn test_non_scalar_guest_keys_reach_host_as_repr() {
    let mut state = State::bare();
    state.run("grid = {(0, 1): 'a', 2: 'b'}").unwrap();

    let grid = state.get_global("grid").unwrap();
    let dict = grid.as_dict().unwrap();
    assert_eq!(dict.get("(0, 1)"), Value::from("a"));
    assert_eq!(dict.get(2), Value::from("b"));
}

#[test]
fn test_host_dict_keys_are_usable_in_guest() {
    let mut state = State::bare();
    let dict = Dict::new();
    dict.insert(1, "int key");
    dict.insert("s", "str key");
    dict.insert(true, "bool key");
    state.set_global("d", Value::Dict(dict)).unwrap();

    // True and 1 are the same key, so the later insert replaced the first
    assert_eq!(state.eval("len(d)").unwrap(), Value::Int(2));
    assert_eq!(state.eval("d[1]").unwrap(), Value::from("bool key"));
    assert_eq!(state.eval("d['s']").unwrap(), Value::from("str key"));
}

#[test]
fn test_complex_numbers_cross() {
    let mut state = State::bare();
    state.set_global("z", Complex64::new(1.0, 2.0)).unwrap();
    let doubled = state.eval("z * 2").unwrap();
    assert_eq!(doubled, Value::Complex(Complex64::new(2.0, 4.0)));
    assert_eq!(state.eval("(3+4j).real").unwrap(), Value::Float(3.0));
}

#[test]
fn test_wide_host_integers_follow_policy() {
    let mut state = State::bare();
    let huge = i128::from(i64::MAX) + 10;
    state
        .set_global("saturated", Value::from_wide_int(huge, IntPolicy::Saturate))
        .unwrap();
    state
        .set_global("approx", Value::from_wide_int(huge, IntPolicy::Float))
        .unwrap();

    assert_eq!(state.eval("saturated").unwrap(), Value::Int(i64::MAX));
    assert_eq!(state.eval("type(approx).__name__").unwrap(), Value::from("float"));
    assert!(Value::try_from_wide_int(huge).is_err());
}

#[test]
fn test_guest_instances_round_trip_by_identity() {
    let mut state = State::bare();
    state
        .run("class Point:\n    def __init__(self, x):\n        self.x = x\np = Point(4)\n")
        .unwrap();

    let point = state.get_global("p").unwrap();
    assert_eq!(point.type_name(), "object");
    state.set_global("q", point).unwrap();
    assert_eq!(state.eval("q is p").unwrap(), Value::Bool(true));
    assert_eq!(state.eval("q.x").unwrap(), Value::Int(4));
}
