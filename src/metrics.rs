use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, GaugeVec, Histogram, register_counter, register_counter_vec,
    register_gauge_vec, register_histogram,
};

// unwraps here run once at first use; registration only fails on duplicate names
lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("learnhub_gate_requests_total", "Total number of throttled-route requests").unwrap();
    pub static ref ADMISSIONS: CounterVec = register_counter_vec!(
        "learnhub_gate_admissions_total",
        "Requests admitted by a limiter",
        &["limiter"]
    )
    .unwrap();
    pub static ref DENIALS: CounterVec = register_counter_vec!(
        "learnhub_gate_denials_total",
        "Requests denied by a limiter",
        &["limiter"]
    )
    .unwrap();
    pub static ref TRACKED_KEYS: GaugeVec = register_gauge_vec!(
        "learnhub_gate_tracked_keys",
        "Keys currently tracked by a limiter",
        &["limiter"]
    )
    .unwrap();
    pub static ref SWEPT_KEYS: CounterVec = register_counter_vec!(
        "learnhub_gate_swept_keys_total",
        "Expired keys removed by the background sweep",
        &["limiter"]
    )
    .unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "learnhub_gate_upstream_latency_seconds",
        "Upstream request latency in seconds"
    )
    .unwrap();
}
