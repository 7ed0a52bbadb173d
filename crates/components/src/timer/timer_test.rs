//! Tests for the timer component

use super::*;

use switchyard_endpoint::ComponentRegistry;
use switchyard_exchange::{ProcessFuture, Value};

#[derive(Clone, Default)]
struct Collect(Arc<Mutex<Vec<Exchange>>>);

impl Collect {
    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

impl Processor for Collect {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            self.0.lock().push(exchange.copy());
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

fn endpoint(uri: &str) -> Arc<dyn Endpoint> {
    let mut registry = ComponentRegistry::new();
    registry.register("timer", Arc::new(TimerComponent::new()));
    registry
        .create_endpoint(&EndpointUri::parse(uri).unwrap())
        .unwrap()
}

async fn wait_for(collect: &Collect, expected: usize) {
    for _ in 0..400 {
        if collect.len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timer fired {} times, expected {expected}", collect.len());
}

#[test]
fn test_parameters() {
    let configured = endpoint("timer:tick?period=50&delay=0&repeatCount=3");
    let timer = configured.as_any().downcast_ref::<TimerEndpoint>().unwrap();
    assert_eq!(timer.timer_name(), "tick");
    assert_eq!(timer.period(), Duration::from_millis(50));
    assert_eq!(timer.delay(), Duration::ZERO);
    assert_eq!(timer.repeat_count(), 3);

    let defaults = endpoint("timer:t");
    let timer = defaults.as_any().downcast_ref::<TimerEndpoint>().unwrap();
    assert_eq!(timer.period(), DEFAULT_PERIOD);
    assert_eq!(timer.delay(), DEFAULT_DELAY);
    assert_eq!(timer.repeat_count(), 0);
}

#[test]
fn test_zero_period_rejected() {
    let mut registry = ComponentRegistry::new();
    registry.register("timer", Arc::new(TimerComponent::new()));
    let err = registry
        .create_endpoint(&EndpointUri::parse("timer:t?period=0").unwrap())
        .err()
        .unwrap();
    assert!(err.to_string().contains("period"));
}

#[test]
fn test_no_producer() {
    let endpoint = endpoint("timer:t");
    let err = endpoint.create_producer().err().unwrap();
    assert!(err.to_string().contains("does not support producers"));
}

#[tokio::test]
async fn test_fires_repeat_count_times() {
    let endpoint = endpoint("timer:tick?period=5&delay=0&repeatCount=3");
    let collect = Collect::default();
    let consumer = endpoint.create_consumer(Arc::new(collect.clone())).unwrap();
    consumer.start().await.unwrap();

    wait_for(&collect, 3).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(collect.len(), 3);

    let fired = collect.0.lock();
    for (i, exchange) in fired.iter().enumerate() {
        assert_eq!(exchange.property(TIMER_NAME), Some(&Value::from("tick")));
        assert_eq!(exchange.property(TIMER_COUNTER), Some(&Value::from(i as u64 + 1)));
        let fired_at = exchange.property(TIMER_FIRED_TIME).unwrap().as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(fired_at).is_ok());
        assert!(exchange.message().body().is_empty());
        assert!(!exchange.is_in_out());
    }
}

#[tokio::test]
async fn test_stop_halts_firing() {
    let endpoint = endpoint("timer:tick?period=5&delay=0");
    let collect = Collect::default();
    let consumer = endpoint.create_consumer(Arc::new(collect.clone())).unwrap();
    consumer.start().await.unwrap();
    wait_for(&collect, 2).await;

    consumer.stop().await.unwrap();
    tokio::task::yield_now().await;
    let after_stop = collect.len();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(collect.len(), after_stop);
}

#[tokio::test]
async fn test_delay_postpones_first_firing() {
    let endpoint = endpoint("timer:late?period=5&delay=10000");
    let collect = Collect::default();
    let consumer = endpoint.create_consumer(Arc::new(collect.clone())).unwrap();
    consumer.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(collect.len(), 0);
    consumer.stop().await.unwrap();
}
