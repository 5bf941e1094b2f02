use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGaugeVec, Registry, TextEncoder};

/// Process-wide metrics registry, exposed at `/metrics` in Prometheus
/// exposition format.
pub struct Metrics {
    registry: Registry,
    pub jobs_total: IntCounterVec,
    pub claim_latency_seconds: HistogramVec,
    pub queue_depth: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let jobs_total = IntCounterVec::new(
            prometheus::Opts::new("payment_jobs_total", "Jobs processed, by outcome"),
            &["outcome"],
        )
        .expect("valid counter");

        let claim_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "payment_job_claim_latency_seconds",
                "Time spent blocked in claim() before a job arrived",
            ),
            &["worker"],
        )
        .expect("valid histogram");

        let queue_depth = IntGaugeVec::new(
            prometheus::Opts::new("payment_queue_depth", "Current length of each named queue"),
            &["queue"],
        )
        .expect("valid gauge");

        registry
            .register(Box::new(jobs_total.clone()))
            .expect("register jobs_total");
        registry
            .register(Box::new(claim_latency_seconds.clone()))
            .expect("register claim_latency_seconds");
        registry
            .register(Box::new(queue_depth.clone()))
            .expect("register queue_depth");

        Metrics {
            registry,
            jobs_total,
            claim_latency_seconds,
            queue_depth,
        }
    }

    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("encode metrics");
        String::from_utf8(buffer).expect("utf8 metrics output")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
