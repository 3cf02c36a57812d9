use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, IntCounter, IntGauge, TextEncoder, opts, register_int_counter, register_int_gauge,
};

pub static CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "hirechat_connections_total",
        "Total number of live client connections accepted"
    ))
    .unwrap()
});

pub static LIVE_SUBSCRIPTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(opts!(
        "hirechat_live_subscriptions",
        "Number of currently registered live subscriptions"
    ))
    .unwrap()
});

pub static SLOW_CONNECTIONS_EVICTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "hirechat_slow_connections_evicted_total",
        "Live connections dropped because their outbound queue was full"
    ))
    .unwrap()
});

pub static MESSAGES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "hirechat_messages_sent_total",
        "Total number of messages persisted"
    ))
    .unwrap()
});

pub static MESSAGES_REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "hirechat_messages_rejected_total",
        "Send requests rejected by validation"
    ))
    .unwrap()
});

pub static POLL_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "hirechat_poll_requests_total",
        "Conversation fetches served (initial loads and polls)"
    ))
    .unwrap()
});

pub static PUSH_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "hirechat_push_sent_total",
        "Push notifications accepted by the push service"
    ))
    .unwrap()
});

pub static PUSH_FAILED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "hirechat_push_failed_total",
        "Push notifications that could not be delivered to the push service"
    ))
    .unwrap()
});

pub static PUSH_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "hirechat_push_skipped_total",
        "Pushes skipped because the receiver was live or had no device token"
    ))
    .unwrap()
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
