use super::*;
use std::collections::HashMap;

#[test]
fn test_scalar_conversions() {
    assert_eq!(Value::from(()), Value::None);
    assert_eq!(Value::from(true), Value::Bool(true));
    assert_eq!(Value::from(7u8), Value::Int(7));
    assert_eq!(Value::from(-3i32), Value::Int(-3));
    assert_eq!(Value::from(2.5f64), Value::Float(2.5));
    assert_eq!(Value::from('x'), Value::Str("x".to_string()));
    assert_eq!(Value::from(None::<i64>), Value::None);
    assert_eq!(Value::from(Some(4i64)), Value::Int(4));
}

#[test]
fn test_wide_integer_policies() {
    let big = i64::MAX as i128 + 10;
    assert_eq!(Value::from_wide_int(big, IntPolicy::Saturate), Value::Int(i64::MAX));
    assert_eq!(Value::from_wide_int(-big, IntPolicy::Saturate), Value::Int(i64::MIN));
    assert_eq!(
        Value::from_wide_int(big, IntPolicy::Wrap),
        Value::Int(big as i64)
    );
    assert!(matches!(
        Value::from_wide_int(big, IntPolicy::Float),
        Value::Float(_)
    ));
    assert_eq!(Value::from_wide_int(5, IntPolicy::Float), Value::Int(5));
    assert_eq!(Value::try_from_wide_int(big), Err(IntOverflow(big)));
}

#[test]
fn test_accessors_follow_numeric_tower() {
    assert_eq!(Value::Bool(true).as_int(), None);
    assert_eq!(Value::Int(3).as_float(), Some(3.0));
    assert_eq!(Value::Float(1.5).as_int(), None);
    assert_eq!(Value::from("hi").as_str(), Some("hi"));
    assert!(Value::None.is_none());
}

#[test]
fn test_numeric_dict_keys_are_unified() {
    let dict = Dict::new();
    dict.insert(1i64, "one");
    dict.insert(1.0f64, "uno");
    dict.insert(true, "si");
    assert_eq!(dict.len(), 1);
    assert_eq!(dict.get(1i64), Value::from("si"));
}

#[test]
fn test_dict_replace_keeps_position() {
    let dict: Dict = vec![("a", 1i64), ("b", 2), ("c", 3)].into_iter().collect();
    dict.insert("a", 10i64);
    let keys: Vec<String> = dict
        .keys()
        .iter()
        .filter_map(|k| k.as_str().map(str::to_string))
        .collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert_eq!(dict.get("missing"), Value::None);
    assert_eq!(dict.try_get("missing"), None);
}

#[test]
fn test_container_handles_share_storage() {
    let list = List::new();
    let alias = list.clone();
    alias.push(1i64);
    assert_eq!(list.len(), 1);
    assert!(list.ptr_eq(&alias));
    assert!(!list.ptr_eq(&List::new()));
}

#[test]
fn test_repr_matches_guest_rendering() {
    assert_eq!(Value::Float(1.0).repr(), "1.0");
    assert_eq!(Value::Float(1e16).repr(), "1e+16");
    assert_eq!(Value::Float(0.0001).repr(), "0.0001");
    assert_eq!(Value::Float(f64::NAN).repr(), "nan");
    assert_eq!(Value::from("it's").repr(), "\"it's\"");
    assert_eq!(Value::from(vec![1i64, 2]).repr(), "[1, 2]");
    assert_eq!(Value::Tuple(Tuple::new(vec![Value::Int(1)])).repr(), "(1,)");
    assert_eq!(Value::Complex(Complex64::new(0.0, 2.0)).repr(), "2j");
    assert_eq!(Value::Complex(Complex64::new(1.0, -1.0)).repr(), "(1-1j)");
}

#[test]
fn test_display_leaves_strings_unquoted() {
    assert_eq!(Value::from("plain").to_string(), "plain");
    assert_eq!(Value::from(vec!["a"]).to_string(), "['a']");
}

#[test]
fn test_self_referencing_list_repr_terminates() {
    let list = List::new();
    list.push(Value::List(list.clone()));
    assert_eq!(Value::List(list).repr(), "[[...]]");
}

#[test]
fn test_json_round_trip_preserves_structure() {
    let json = serde_json::json!({"name": "ember", "tags": ["a", "b"], "n": 3, "ok": null});
    let value = Value::from(json.clone());
    let dict = value.as_dict().unwrap();
    assert_eq!(dict.get("n"), Value::Int(3));
    assert_eq!(dict.get("ok"), Value::None);
    assert_eq!(value.to_json(), Some(json));
}

#[test]
fn test_non_json_values_have_no_json_form() {
    assert_eq!(Value::Complex(Complex64::new(1.0, 1.0)).to_json(), None);
    assert_eq!(Value::UserData(UserData::new(5u8)).to_json(), None);
}

#[test]
fn test_from_host_recognises_structures() {
    let mut scores = HashMap::new();
    scores.insert("a".to_string(), 1i64);
    let value = Value::from_host(scores);
    assert_eq!(value.as_dict().map(|d| d.get("a")), Some(Value::Int(1)));

    assert_eq!(Value::from_host(vec![1i64, 2]), Value::from(vec![1i64, 2]));
}

#[test]
fn test_from_host_wraps_unknown_types() {
    #[derive(Debug, PartialEq)]
    struct Handle(u32);

    let value = Value::from_host(Handle(9));
    let data = value.as_user_data().unwrap();
    assert!(data.is::<Handle>());
    assert_eq!(value.downcast_ref::<Handle>(), Some(&Handle(9)));
    assert!(data.type_name().ends_with("Handle"));
}

#[test]
fn test_cyclic_values_compare_without_looping() {
    let cyclic = |head: i64| {
        let list = List::from_vec(vec![Value::Int(head)]);
        list.push(Value::List(list.clone()));
        Value::List(list)
    };
    let (a, b) = (cyclic(1), cyclic(1));
    assert_eq!(a, a.clone());
    assert_eq!(a, b);
    assert_ne!(a, cyclic(2));

    let dict = Dict::new();
    dict.insert("self", Value::Dict(dict.clone()));
    let other = Dict::new();
    other.insert("self", Value::Dict(other.clone()));
    assert_eq!(Value::Dict(dict), Value::Dict(other));
}
