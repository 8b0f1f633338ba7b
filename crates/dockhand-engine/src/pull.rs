use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dockhand_common::{ContainerEngine, PullProgress};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::metrics::round2;
use crate::overview::image_summary;

/// Per-layer progress and download speed for pull events.
#[derive(Debug, Default)]
pub struct LayerTracker {
    first_seen: HashMap<String, Instant>,
}

impl LayerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one engine event as a JSON object. Layer events gain
    /// `progress_percent` (when both counters are known) and
    /// `download_speed` in bytes per second since the layer first appeared.
    pub fn annotate(&mut self, event: &PullProgress, now: Instant) -> Value {
        let mut line = serde_json::to_value(event).unwrap_or_else(|_| json!({}));
        let Some(layer) = event.id.as_deref() else {
            return line;
        };
        if event.current.is_none() && event.total.is_none() {
            return line;
        }

        let current = event.current.unwrap_or(0);
        let total = event.total.unwrap_or(0);
        if current > 0 && total > 0 {
            line["progress_percent"] = json!(round2(current as f64 / total as f64 * 100.0));
        }

        let speed = match self.first_seen.get(layer) {
            None => {
                self.first_seen.insert(layer.to_string(), now);
                0
            }
            Some(started) => {
                let elapsed = now.duration_since(*started).as_secs_f64();
                if elapsed > 0.0 {
                    (current as f64 / elapsed) as i64
                } else {
                    0
                }
            }
        };
        line["download_speed"] = json!(speed);
        line
    }
}

fn json_line(value: &Value) -> String {
    format!("{value}\n")
}

/// Pull an image, yielding newline-terminated JSON objects: one per engine
/// event, then a final `{"summary": ...}` or `{"error": ...}`.
pub fn pull_image_stream(
    engine: Arc<dyn ContainerEngine>,
    repository: String,
    tag: String,
) -> BoxStream<'static, String> {
    Box::pin(async_stream::stream! {
        let reference = format!("{repository}:{tag}");
        info!(image = %reference, "Pulling image");
        let mut tracker = LayerTracker::new();
        let mut events = engine.pull_image(&repository, &tag);

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    if let Some(error) = event.error.as_deref() {
                        warn!(image = %reference, %error, "Pull reported an error");
                    }
                    yield json_line(&tracker.annotate(&event, Instant::now()));
                }
                Err(e) => {
                    warn!(image = %reference, error = %e, "Pull failed");
                    yield json_line(&json!({ "error": e.to_string() }));
                    return;
                }
            }
        }

        match engine.inspect_image(&reference).await {
            Ok(image) => {
                let summary = image_summary(image, &[]);
                info!(image = %reference, id = %summary.id, "Pull complete");
                yield json_line(&json!({ "summary": summary }));
            }
            Err(e) if e.is_not_found() => {
                yield json_line(&json!({ "error": format!("Image {reference} not found") }));
            }
            Err(e) => {
                yield json_line(&json!({ "error": e.to_string() }));
            }
        }
    })
}
