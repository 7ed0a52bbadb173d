//! Tests for the routing context

use super::*;

use switchyard_components::{MockEndpoint, default_components};
use switchyard_endpoint::EndpointError;
use switchyard_exchange::{Body, Exchange, ExchangeError, ExchangeState, Value};

fn context() -> Context {
    Context::new().with_components(default_components())
}

#[test]
fn test_add_routes_returns_ids() {
    let mut ctx = context();
    let ids = ctx
        .add_routes(
            RouteBuilder::new()
                .from("direct:a")
                .to("mock:a")
                .from("direct:b")
                .route_id("second")
                .to("mock:b"),
        )
        .unwrap();

    assert_eq!(ids, vec!["route1", "second"]);
    assert_eq!(ctx.route_ids(), vec!["route1", "second"]);
    assert_eq!(ctx.route_status("route1"), Some(RouteStatus::Stopped));
    assert_eq!(ctx.route("second").unwrap().from_uri(), "direct:b");
    assert!(ctx.route_status("missing").is_none());
}

#[test]
fn test_duplicate_route_id_adds_nothing() {
    let mut ctx = context();
    ctx.add_routes(RouteBuilder::new().from("direct:a").route_id("r").to("mock:a"))
        .unwrap();

    let err = ctx
        .add_routes(
            RouteBuilder::new()
                .from("direct:b")
                .route_id("other")
                .to("mock:b")
                .from("direct:c")
                .route_id("r")
                .to("mock:c"),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateRoute(ref id) if id == "r"));
    assert_eq!(ctx.route_ids(), vec!["r"]);
}

#[test]
fn test_build_failure_adds_nothing() {
    let mut ctx = context();
    let err = ctx
        .add_routes(
            RouteBuilder::new()
                .from("direct:a")
                .to("mock:a")
                .from("direct:b")
                .to("nope:x"),
        )
        .unwrap_err();
    assert!(err.to_string().contains("nope"));
    assert!(ctx.route_ids().is_empty());

    // the first route's direct consumer was released
    ctx.add_routes(RouteBuilder::new().from("direct:a").to("mock:a"))
        .unwrap();
}

#[test]
fn test_second_consumer_on_direct_fails() {
    let mut ctx = context();
    let err = ctx
        .add_routes(
            RouteBuilder::new()
                .from("direct:a")
                .to("mock:a")
                .from("direct:a")
                .to("mock:b"),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Consumer {
            source: EndpointError::ConsumerExists { .. },
            ..
        }
    ));
}

#[test]
fn test_endpoint_is_shared_by_normalized_uri() {
    let ctx = context();
    let a = ctx.endpoint("seda:q?size=5&blockWhenFull=true").unwrap();
    let b = ctx.endpoint("seda://q?blockWhenFull=true&size=5").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(ctx.endpoint_uris(), vec!["seda:q?blockWhenFull=true&size=5"]);

    let err = ctx.endpoint("ftp:host").err().unwrap();
    assert!(err.to_string().contains("available"));
}

#[tokio::test]
async fn test_start_stop_lifecycle() {
    let mut ctx = context().with_shutdown_timeout(Duration::from_secs(1));
    ctx.add_routes(
        RouteBuilder::new()
            .from("direct:a")
            .route_id("auto")
            .to("mock:a")
            .from("direct:b")
            .route_id("manual")
            .auto_startup(false)
            .to("mock:b"),
    )
    .unwrap();

    ctx.start().await.unwrap();
    assert!(ctx.is_started());
    assert_eq!(ctx.route_status("auto"), Some(RouteStatus::Started));
    assert_eq!(ctx.route_status("manual"), Some(RouteStatus::Stopped));

    ctx.start_route("manual").await.unwrap();
    assert_eq!(ctx.route_status("manual"), Some(RouteStatus::Started));

    // idempotent
    ctx.start_route("manual").await.unwrap();

    ctx.stop_route("auto").await.unwrap();
    assert_eq!(ctx.route_status("auto"), Some(RouteStatus::Stopped));
    ctx.stop_route("auto").await.unwrap();

    ctx.stop().await.unwrap();
    assert!(!ctx.is_started());
    assert_eq!(ctx.route_status("manual"), Some(RouteStatus::Stopped));
}

#[tokio::test]
async fn test_unknown_route_lists_available() {
    let mut ctx = context();
    ctx.add_routes(RouteBuilder::new().from("direct:a").route_id("known").to("mock:a"))
        .unwrap();

    let err = ctx.start_route("other").await.unwrap_err();
    assert_eq!(err.to_string(), "unknown route 'other', available: [known]");
}

#[tokio::test]
async fn test_template_send_body_through_route() {
    let mut ctx = context();
    ctx.add_routes(
        RouteBuilder::new()
            .from("direct:in")
            .set_header("seen", true)
            .to("mock:out"),
    )
    .unwrap();
    ctx.start().await.unwrap();

    ctx.producer_template()
        .send_body("direct:in", "hello")
        .await
        .unwrap();

    let out = ctx.endpoint("mock:out").unwrap();
    let out = MockEndpoint::from_endpoint(out.as_ref()).unwrap();
    assert_eq!(out.received_bodies(), vec![Body::from("hello")]);
    assert_eq!(
        out.received_messages()[0].header("seen"),
        Some(&Value::Bool(true))
    );

    let metrics = ctx.metrics(ctx.route_ids()[0]).unwrap();
    assert_eq!(metrics.exchanges_total, 1);
    assert_eq!(metrics.exchanges_completed, 1);
    ctx.stop().await.unwrap();
}

#[tokio::test]
async fn test_template_reports_missing_consumer() {
    let ctx = context();
    let err = ctx
        .producer_template()
        .send_body("direct:nobody", "x")
        .await
        .unwrap_err();
    assert!(matches!(
        err.exchange_error(),
        Some(ExchangeError::NoConsumer { .. })
    ));
}

#[tokio::test]
async fn test_template_completes_unclaimed_exchange() {
    let ctx = context();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);

    let mut exchange = Exchange::with_body("x");
    exchange.add_on_completion(move |_| flag.store(true, Ordering::SeqCst));
    let exchange = ctx.producer_template().send("mock:sink", exchange).await.unwrap();

    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(exchange.state(), ExchangeState::Done);
}

#[tokio::test]
async fn test_route_error_handler_overrides_context() {
    let mut ctx = context().with_error_handler(ErrorHandlerDefinition::NoErrorHandler);
    ctx.add_routes(
        RouteBuilder::new()
            .from("direct:a")
            .error_handler(ErrorHandlerDefinition::dead_letter_channel("mock:dlq"))
            .throw_exception("boom"),
    )
    .unwrap();
    ctx.start().await.unwrap();

    ctx.producer_template().send_body("direct:a", "x").await.unwrap();

    let dlq = ctx.endpoint("mock:dlq").unwrap();
    let dlq = MockEndpoint::from_endpoint(dlq.as_ref()).unwrap();
    assert_eq!(dlq.received_count(), 1);
    assert_eq!(ctx.error_handler().kind(), "none");
}
