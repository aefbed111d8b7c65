//! Duration metrics for authenticator operations and outbound requests.
//!
//! Purely observational: helpers here record elapsed time and never touch
//! control flow or error values. Series are scraped through the Prometheus
//! exporter installed by [`start_prometheus`].

use metrics::{describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Histogram of logical operation durations, labeled by `method`
/// (`authenticate`, `refresh_user`, `pre_spawn_start`).
pub const METHOD_DURATION: &str = "hub_auth_method_duration_seconds";

/// Histogram of outbound request durations, labeled by `request`
/// (`refresh_token`, `exchange_token_<audience>`).
pub const REQUEST_DURATION: &str = "hub_auth_request_duration_seconds";

/// Histogram of outbound request durations split by HTTP status code,
/// labeled by `request` and `code`.
pub const HTTP_REQUEST_DURATION: &str = "hub_auth_http_request_duration_seconds";

/// Buckets extend the defaults with more resolution between 10s and +Inf,
/// matching the latency profile of identity-provider round trips.
const DURATION_BUCKETS: [f64; 17] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0, 15.0, 20.0,
    30.0,
];

/// Register descriptions for all histogram series.
pub fn init_metrics() {
    describe_histogram!(
        METHOD_DURATION,
        "Histogram of durations of authenticator methods"
    );
    describe_histogram!(
        REQUEST_DURATION,
        "Histogram of durations of outgoing requests made by the authenticator"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION,
        "Histogram of durations of outgoing requests split by HTTP status code"
    );
}

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn start_prometheus(addr: SocketAddr) -> anyhow::Result<()> {
    let duration_matcher = Matcher::Suffix(String::from("duration_seconds"));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(duration_matcher, &DURATION_BUCKETS)?
        .install()?;

    init_metrics();
    Ok(())
}

/// Record the duration of a logical authenticator method.
pub struct MethodTimer {
    method: &'static str,
    start: Instant,
}

impl MethodTimer {
    pub fn start(method: &'static str) -> Self {
        Self {
            method,
            start: Instant::now(),
        }
    }
}

impl Drop for MethodTimer {
    fn drop(&mut self) {
        histogram!(METHOD_DURATION, "method" => self.method)
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Record one outbound request observation.
pub fn observe_request(request: String, elapsed_secs: f64, code: u16) {
    histogram!(REQUEST_DURATION, "request" => request.clone()).record(elapsed_secs);
    histogram!(HTTP_REQUEST_DURATION, "request" => request, "code" => code.to_string())
        .record(elapsed_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_records_without_panicking() {
        // No recorder installed in unit tests; macros degrade to no-ops.
        let timer = MethodTimer::start("authenticate");
        drop(timer);
        observe_request("refresh_token".to_string(), 0.01, 200);
    }
}
