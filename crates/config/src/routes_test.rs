//! Tests for route configuration

use super::*;

#[derive(Deserialize)]
struct Routes {
    routes: Vec<RouteConfig>,
}

fn routes(toml: &str) -> Vec<RouteConfig> {
    toml::from_str::<Routes>(toml).unwrap().routes
}

fn definition(toml: &str) -> Result<RouteDefinition> {
    routes(toml)[0].to_definition(0)
}

fn kinds(steps: &[ProcessorDefinition]) -> Vec<&'static str> {
    steps.iter().map(ProcessorDefinition::kind).collect()
}

#[test]
fn test_linear_route() {
    let def = definition(
        r#"
[[routes]]
from = "direct:in"
description = "demo"

[[routes.steps]]
type = "set_header"
name = "source"
value = "config"

[[routes.steps]]
type = "convert_body"
to = "json"

[[routes.steps]]
type = "to"
uri = "mock:out"
"#,
    )
    .unwrap();

    assert_eq!(def.id, "route1");
    assert_eq!(def.from, "direct:in");
    assert_eq!(def.description.as_deref(), Some("demo"));
    assert!(def.auto_startup);
    assert!(def.error_handler.is_none());
    assert_eq!(kinds(&def.steps), vec!["set_header", "convert_body", "to"]);
}

#[test]
fn test_nested_steps() {
    let def = definition(
        r#"
[[routes]]
id = "nested"
from = "direct:in"
auto_startup = false

[[routes.steps]]
type = "choice"
otherwise = [{ type = "to", uri = "mock:other" }]

[[routes.steps.when]]
predicate = "header.n > 1"
steps = [
    { type = "loop", count = 2, steps = [{ type = "to", uri = "mock:loop" }] },
]

[[routes.steps]]
type = "multicast"
parallel = true
strategy = "string_concat"
delimiter = ";"
steps = [
    { type = "to", uri = "mock:a" },
    { type = "pipeline", steps = [{ type = "set_body", value = "b" }, { type = "to", uri = "mock:b" }] },
]
"#,
    )
    .unwrap();

    assert_eq!(def.id, "nested");
    assert!(!def.auto_startup);
    assert_eq!(kinds(&def.steps), vec!["choice", "multicast"]);
    let ProcessorDefinition::Choice { whens, otherwise } = &def.steps[0] else {
        panic!("expected choice");
    };
    assert_eq!(kinds(&whens[0].steps), vec!["loop"]);
    assert_eq!(otherwise.as_ref().map(Vec::len), Some(1));

    let ProcessorDefinition::Multicast(multicast) = &def.steps[1] else {
        panic!("expected multicast");
    };
    assert!(multicast.options.parallel_processing);
    assert!(multicast.strategy.is_some());
    assert_eq!(kinds(&multicast.branches), vec!["to", "pipeline"]);
    assert_eq!(def.node_count(), 9);
}

#[test]
fn test_eip_steps() {
    let def = definition(
        r#"
[[routes]]
from = "seda:in"
steps = [
    { type = "split", token = "\n", steps = [{ type = "log", message = "line ${body}", level = "debug" }] },
    { type = "idempotent", message_id = "header.id", capacity = 10 },
    { type = "aggregate", correlation = "header.group", completion_size = 3 },
    { type = "load_balance", policy = "failover", max_attempts = 2, steps = [{ type = "to", uri = "mock:a" }, { type = "to", uri = "mock:b" }] },
    { type = "delay", millis = 5 },
    { type = "remove_header", pattern = "tmp*" },
    { type = "process", ref = "audit", options = { level = 2 } },
    { type = "stop" },
]
"#,
    )
    .unwrap();

    assert_eq!(
        kinds(&def.steps),
        vec![
            "split",
            "idempotent",
            "aggregate",
            "load_balance",
            "delay",
            "remove_header",
            "process",
            "stop"
        ]
    );
    let ProcessorDefinition::Split(split) = &def.steps[0] else {
        panic!("expected split");
    };
    assert_eq!(split.token.as_deref(), Some("\n"));
    let ProcessorDefinition::Idempotent(idempotent) = &def.steps[1] else {
        panic!("expected idempotent");
    };
    assert_eq!(idempotent.capacity, 10);
    assert!(idempotent.skip_duplicate);
    let ProcessorDefinition::LoadBalance { policy, .. } = &def.steps[3] else {
        panic!("expected load balancer");
    };
    assert!(matches!(
        policy,
        LoadBalancePolicy::Failover {
            max_attempts: Some(2),
            round_robin: false
        }
    ));
    let ProcessorDefinition::ProcessRef { name, options } = &def.steps[6] else {
        panic!("expected process ref");
    };
    assert_eq!(name, "audit");
    assert_eq!(options.get("level"), Some(&Value::from(2)));
}

#[test]
fn test_route_error_handler() {
    let def = definition(
        r#"
[[routes]]
from = "direct:in"
error_handler = { kind = "dead_letter", dead_letter_uri = "mock:dlq" }
"#,
    )
    .unwrap();
    assert_eq!(def.error_handler.map(|h| h.kind()), Some("dead_letter"));
}

#[test]
fn test_missing_and_invalid_fields() {
    let err = definition("[[routes]]\nfrom = \"\"").unwrap_err();
    assert!(err.to_string().contains("missing required field 'from'"));

    let err = definition("[[routes]]\nfrom = \"no-scheme\"").unwrap_err();
    assert!(matches!(err, ConfigError::Endpoint { .. }));

    let err = definition(
        r#"
[[routes]]
from = "direct:in"
steps = [{ type = "to", uri = " " }]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("step 'to'"));

    let err = definition(
        r#"
[[routes]]
from = "direct:in"
steps = [{ type = "loop", count = 2, while = "header.x" }]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("exactly one of count and while"));

    let err = definition(
        r#"
[[routes]]
from = "direct:in"
steps = [{ type = "choice" }]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("invalid when"));

    let err = definition(
        r#"
[[routes]]
from = "direct:in"
steps = [{ type = "log", message = "x", level = "loud" }]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("invalid level"));

    let err = definition(
        r#"
[[routes]]
from = "direct:in"
steps = [{ type = "aggregate", correlation = "header.k" }]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("completion_size"));
}

#[test]
fn test_expression_errors_name_the_route() {
    let err = definition(
        r#"
[[routes]]
id = "bad"
from = "direct:in"
steps = [{ type = "filter", predicate = "header.x ==", steps = [] }]
"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Expression {
            field: "predicate",
            ref route,
            ..
        } if route == "bad"
    ));

    let err = definition(
        r#"
[[routes]]
from = "direct:in"
steps = [{ type = "set_body", value = "${header.x" }]
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("invalid value"));
}

#[test]
fn test_unknown_step_type_is_a_parse_error() {
    let result = toml::from_str::<Routes>(
        r#"
[[routes]]
from = "direct:in"
steps = [{ type = "teleport" }]
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_values_keep_their_type() {
    let def = definition(
        r#"
[[routes]]
from = "direct:in"
steps = [
    { type = "set_header", name = "count", value = 3 },
    { type = "set_property", name = "flag", value = true },
]
"#,
    )
    .unwrap();
    let ProcessorDefinition::SetHeader { value: Some(Expression::Constant(value)), .. } = &def.steps[0]
    else {
        panic!("expected constant header");
    };
    assert_eq!(value, &Value::from(3));
}
