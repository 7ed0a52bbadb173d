//! Tests for expressions and predicates built in code

use super::*;
use serde_json::json;

fn exchange_with_headers(pairs: &[(&str, Value)]) -> Exchange {
    let mut exchange = Exchange::with_body(json!({"user": {"id": 7, "tags": ["a", "b"]}}));
    for (k, v) in pairs {
        exchange.message_mut().set_header(*k, v.clone());
    }
    exchange
}

#[test]
fn test_header_equality_is_string_when_not_numeric() {
    let bar = exchange_with_headers(&[("foo", json!("bar"))]);
    let num = exchange_with_headers(&[("foo", json!(123))]);
    let p = header("foo").is_equal_to("bar");
    assert!(p.matches(&bar).unwrap());
    assert!(!p.matches(&num).unwrap());
}

#[test]
fn test_numeric_coercion() {
    let ex = exchange_with_headers(&[("n", json!("10"))]);
    assert!(header("n").is_greater_than(9).matches(&ex).unwrap());
    // String comparison would say "10" < "9"
    assert!(!header("n").is_less_than(9).matches(&ex).unwrap());
    assert!(header("n").is_equal_to(json!(10.0)).matches(&ex).unwrap());
}

#[test]
fn test_missing_header_is_null() {
    let ex = exchange_with_headers(&[]);
    assert_eq!(header("nope").evaluate(&ex).unwrap(), Value::Null);
    assert!(!header("nope").exists().matches(&ex).unwrap());
    assert!(!header("nope").is_greater_than(0).matches(&ex).unwrap());
    assert!(header("nope").is_not_equal_to("x").matches(&ex).unwrap());
}

#[test]
fn test_body_path() {
    let ex = exchange_with_headers(&[]);
    assert_eq!(Expression::BodyPath("user.id".into()).evaluate(&ex).unwrap(), json!(7));
    assert_eq!(
        Expression::BodyPath("user.tags.1".into()).evaluate(&ex).unwrap(),
        json!("b")
    );
    assert_eq!(
        Expression::BodyPath("user.nope".into()).evaluate(&ex).unwrap(),
        Value::Null
    );
}

#[test]
fn test_body_path_on_text_fails() {
    let ex = Exchange::with_body("plain");
    assert!(Expression::BodyPath("a".into()).evaluate(&ex).is_err());
}

#[test]
fn test_contains_on_arrays_and_objects() {
    let ex = exchange_with_headers(&[]);
    assert!(
        Expression::BodyPath("user.tags".into())
            .contains("a")
            .matches(&ex)
            .unwrap()
    );
    assert!(
        Expression::BodyPath("user".into())
            .contains("id")
            .matches(&ex)
            .unwrap()
    );
}

#[test]
fn test_logic_combinators() {
    let ex = exchange_with_headers(&[("a", json!(1)), ("b", json!(2))]);
    let p = header("a")
        .is_equal_to(1)
        .and(header("b").is_equal_to(2))
        .and(header("c").exists().negate());
    assert!(p.matches(&ex).unwrap());
    assert!(matches!(p, Predicate::And(ref v) if v.len() == 3));

    let q = Predicate::Constant(false).or(header("b").is_less_than(1));
    assert!(!q.matches(&ex).unwrap());
}

#[test]
fn test_custom_closures() {
    let ex = exchange_with_headers(&[("n", json!(4))]);
    let doubled = Expression::custom(|ex| {
        let n = ex.message().header("n").and_then(Value::as_i64).unwrap_or(0);
        Ok(json!(n * 2))
    });
    assert_eq!(doubled.evaluate(&ex).unwrap(), json!(8));

    let failing = Predicate::custom(|_| Err(ExchangeError::expression("nope")));
    assert!(failing.matches(&ex).is_err());
}

#[test]
fn test_evaluate_u64() {
    let ex = exchange_with_headers(&[("n", json!("5")), ("neg", json!(-1))]);
    assert_eq!(header("n").evaluate_u64(&ex).unwrap(), 5);
    assert!(header("neg").evaluate_u64(&ex).is_err());
    assert!(header("missing").evaluate_u64(&ex).is_err());
}

#[test]
fn test_regex_predicate() {
    let ex = exchange_with_headers(&[("code", json!("AB-123"))]);
    let p = header("code").matches_regex(r"^[A-Z]{2}-\d+$").unwrap();
    assert!(p.matches(&ex).unwrap());
    assert!(header("code").matches_regex("(").is_err());
}

#[test]
fn test_value_to_string() {
    assert_eq!(value_to_string(&Value::Null), "");
    assert_eq!(value_to_string(&json!("s")), "s");
    assert_eq!(value_to_string(&json!(1.5)), "1.5");
}
