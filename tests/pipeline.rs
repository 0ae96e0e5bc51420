//! End-to-end report tests driven through an in-memory transport

use std::sync::atomic::{AtomicUsize, Ordering};

use kubectl_cost::{
    CostDimension, CostError, CostOptions, CostTransport, DisplayOptions, QueryMode, QueryParams,
    Result, run_cost,
};
use tokio_util::sync::CancellationToken;

struct StaticTransport {
    body: &'static str,
    calls: AtomicUsize,
}

impl StaticTransport {
    fn new(body: &'static str) -> Self {
        Self {
            body,
            calls: AtomicUsize::new(0),
        }
    }
}

impl CostTransport for StaticTransport {
    async fn fetch(
        &self,
        _path: &str,
        _params: &QueryParams,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.as_bytes().to_vec())
    }
}

fn cost_options(mode: QueryMode, display: DisplayOptions, namespace_filter: &str) -> CostOptions {
    CostOptions {
        window: "yesterday".to_string(),
        mode,
        display,
        namespace_filter: namespace_filter.to_string(),
        currency: "USD".to_string(),
    }
}

fn cpu_and_memory() -> DisplayOptions {
    DisplayOptions {
        show_cpu: true,
        show_memory: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn deployment_report_renders_namespace_titles_without_unallocated() {
    let transport = StaticTransport::new(
        r#"{
            "code": 200,
            "data": {
                "ns-a": {"cpuCost": 10, "memoryCost": 5},
                "ns-b": {"cpuCost": 3},
                "__unallocated__": {"cpuCost": 100}
            }
        }"#,
    );
    let options = cost_options(QueryMode::Rate, cpu_and_memory(), "");

    let mut out = Vec::new();
    run_cost(
        CostDimension::Deployment,
        &transport,
        &options,
        &mut out,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("ns-a") && text.contains("ns-b"));
    assert!(!text.contains("__unallocated__"));
    assert!(!text.contains("100.00 USD"));

    let ns_a = text.lines().find(|l| l.contains("ns-a")).unwrap();
    assert!(ns_a.contains("10.00 USD") && ns_a.contains("5.00 USD"));
    let ns_b = text.lines().find(|l| l.contains("ns-b")).unwrap();
    assert!(ns_b.contains("3.00 USD") && ns_b.contains("0.00 USD"));

    let summed = text.lines().find(|l| l.contains("SUMMED")).unwrap();
    assert!(summed.contains("13.00 USD") && summed.contains("18.00 USD"));
}

#[tokio::test]
async fn deployment_rate_report_filters_namespace_and_unallocated() {
    let transport = StaticTransport::new(
        r#"{
            "code": 200,
            "data": {
                "shop/frontend": {"cpuCost": 4.5, "ramCost": 1.25},
                "shop/checkout": {"cpuCost": 2},
                "ops/prometheus": {"cpuCost": 7},
                "__unallocated__": {"cpuCost": 100}
            }
        }"#,
    );
    let options = cost_options(QueryMode::Rate, cpu_and_memory(), "shop");

    let mut out = Vec::new();
    run_cost(
        CostDimension::Deployment,
        &transport,
        &options,
        &mut out,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert!(text.contains("Deployment"));
    assert!(text.contains("frontend") && text.contains("checkout"));
    assert!(!text.contains("prometheus"));
    assert!(!text.contains("__unallocated__"));
    assert!(text.find("checkout").unwrap() < text.find("frontend").unwrap());
    assert!(text.contains("6.50 USD"));
}

#[tokio::test]
async fn historical_deployment_never_reaches_transport() {
    let transport = StaticTransport::new("{}");
    let options = cost_options(QueryMode::Historical, DisplayOptions::default(), "");

    let mut out = Vec::new();
    let err = run_cost(
        CostDimension::Deployment,
        &transport,
        &options,
        &mut out,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CostError::UnsupportedMode(_)));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    assert!(out.is_empty());
}

#[tokio::test]
async fn malformed_body_fails_the_command() {
    let transport = StaticTransport::new("not json");
    let options = cost_options(QueryMode::Rate, DisplayOptions::default(), "");

    let mut out = Vec::new();
    let err = run_cost(
        CostDimension::Namespace,
        &transport,
        &options,
        &mut out,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CostError::Decode(_)));
}
