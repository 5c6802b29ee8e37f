use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use post_render::application::render::{
    AmmoniaSanitizer, ContentRenderer, METRIC_FALLBACK_TOTAL, METRIC_MEMO_HIT_TOTAL,
    METRIC_MEMO_MISS_TOTAL, METRIC_RENDER_MS, METRIC_RENDER_TOTAL, MarkdownEngine,
    MemoizedRenderer, RenderError, RenderOptions,
};
use post_render::infra::telemetry::describe_metrics;

struct PanickingEngine;

impl MarkdownEngine for PanickingEngine {
    fn render_fragment(&self, _: &str, _: &RenderOptions) -> Result<String, RenderError> {
        panic!("engine exploded");
    }
}

#[test]
fn render_paths_emit_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    describe_metrics();

    let options = RenderOptions::default();

    let memo = MemoizedRenderer::new(
        Arc::new(ContentRenderer::new()),
        NonZeroUsize::new(8).expect("non-zero"),
    );
    memo.render("**one**", &options);
    memo.render("**one**", &options);
    memo.render("**two**", &options);

    let broken = ContentRenderer::with_parts(Arc::new(PanickingEngine), Arc::new(AmmoniaSanitizer));
    assert_eq!(broken.render("<x>", &options), "&lt;x&gt;");

    let mut counters: HashMap<String, u64> = HashMap::new();
    let mut fallback_stages = Vec::new();
    let mut saw_histogram = false;

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let key = composite_key.key();
        match value {
            DebugValue::Counter(count) => {
                if key.name() == METRIC_FALLBACK_TOTAL {
                    fallback_stages.extend(
                        key.labels()
                            .filter(|label| label.key() == "stage")
                            .map(|label| label.value().to_string()),
                    );
                }
                *counters.entry(key.name().to_string()).or_default() += count;
            }
            DebugValue::Histogram(samples) => {
                if key.name() == METRIC_RENDER_MS {
                    saw_histogram = !samples.is_empty();
                }
            }
            DebugValue::Gauge(_) => {}
        }
    }

    assert_eq!(counters.get(METRIC_MEMO_HIT_TOTAL), Some(&1));
    assert_eq!(counters.get(METRIC_MEMO_MISS_TOTAL), Some(&2));
    assert_eq!(counters.get(METRIC_RENDER_TOTAL), Some(&2));
    assert_eq!(counters.get(METRIC_FALLBACK_TOTAL), Some(&1));
    assert_eq!(fallback_stages, vec!["panic".to_string()]);
    assert!(saw_histogram, "render latency histogram should be recorded");
}
