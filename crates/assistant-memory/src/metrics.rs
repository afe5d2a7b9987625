use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use lazy_static::lazy_static;
use std::sync::OnceLock;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static MESSAGES_STORED: OnceLock<Option<IntCounter>> = OnceLock::new();
static SUMMARIES_STORED: OnceLock<Option<IntCounter>> = OnceLock::new();
static SEARCHES: OnceLock<Option<IntCounterVec>> = OnceLock::new();
static SUMMARY_PASSES: OnceLock<Option<IntCounterVec>> = OnceLock::new();
static SEARCH_SECONDS: OnceLock<Option<Histogram>> = OnceLock::new();

fn register<C: prometheus::core::Collector + Clone + 'static>(collector: prometheus::Result<C>) -> Option<C> {
    let collector = collector.ok()?;
    REGISTRY.register(Box::new(collector.clone())).ok();
    Some(collector)
}

fn messages_stored() -> Option<&'static IntCounter> {
    MESSAGES_STORED
        .get_or_init(|| {
            register(IntCounter::new(
                "memory_messages_stored_total",
                "Messages appended to the log",
            ))
        })
        .as_ref()
}

fn summaries_stored() -> Option<&'static IntCounter> {
    SUMMARIES_STORED
        .get_or_init(|| register(IntCounter::new("memory_summaries_stored_total", "Summaries written")))
        .as_ref()
}

fn searches() -> Option<&'static IntCounterVec> {
    SEARCHES
        .get_or_init(|| {
            register(IntCounterVec::new(
                prometheus::opts!("memory_searches_total", "Similarity searches per corpus"),
                &["corpus"],
            ))
        })
        .as_ref()
}

fn summary_passes() -> Option<&'static IntCounterVec> {
    SUMMARY_PASSES
        .get_or_init(|| {
            register(IntCounterVec::new(
                prometheus::opts!("memory_summary_passes_total", "Summarization passes by outcome"),
                &["outcome"],
            ))
        })
        .as_ref()
}

fn search_seconds() -> Option<&'static Histogram> {
    SEARCH_SECONDS
        .get_or_init(|| {
            register(Histogram::with_opts(prometheus::HistogramOpts::new(
                "memory_search_seconds",
                "Time spent ranking one corpus",
            )))
        })
        .as_ref()
}

/// Registers every collector up front so `render` lists them before first use.
pub fn init_metrics() {
    messages_stored();
    summaries_stored();
    searches();
    summary_passes();
    search_seconds();
}

pub fn inc_messages_stored() {
    if let Some(counter) = messages_stored() {
        counter.inc();
    }
}

pub fn inc_summaries_stored() {
    if let Some(counter) = summaries_stored() {
        counter.inc();
    }
}

pub fn inc_search(corpus: &str) {
    if let Some(counter) = searches() {
        counter.with_label_values(&[corpus]).inc();
    }
}

pub fn observe_search(duration: f64) {
    if let Some(histogram) = search_seconds() {
        histogram.observe(duration);
    }
}

pub fn inc_summary_pass(outcome: &str) {
    if let Some(counter) = summary_passes() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
