//! OutletHandle - one published stream and its counters

use std::sync::Arc;

use contracts::{OutletChannel, Publishable, StreamDescriptor, StreamKind};
use tracing::{trace, warn, Span};

use crate::metrics::OutletMetrics;

/// Handle to a live outlet
///
/// Publishing never fails outward: it runs on the device's delivery thread,
/// where there is no caller to return an error to.
pub struct OutletHandle {
    kind: StreamKind,
    channel: Box<dyn OutletChannel>,
    metrics: Arc<OutletMetrics>,
    span: Span,
}

impl OutletHandle {
    pub fn new(kind: StreamKind, channel: Box<dyn OutletChannel>) -> Self {
        let span = observability::outlet_span(kind, &channel.descriptor().source_id);
        Self {
            kind,
            channel,
            metrics: Arc::new(OutletMetrics::new()),
            span,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        self.channel.descriptor()
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<OutletMetrics> {
        &self.metrics
    }

    pub fn has_consumers(&self) -> bool {
        self.channel.has_consumers()
    }

    /// Publish one sample. Returns whether the transport accepted it.
    pub fn publish<P: Publishable>(&self, sample: &P) -> bool {
        debug_assert_eq!(P::KIND, self.kind);
        let _entered = self.span.enter();
        match self.channel.publish(sample.encode(), sample.timestamp()) {
            Ok(()) => {
                self.metrics.inc_published();
                observability::record_sample_published(self.kind);
                trace!(kind = %self.kind, "sample published");
                true
            }
            Err(e) => {
                self.metrics.inc_failures();
                observability::record_publish_failure(self.kind);
                warn!(kind = %self.kind, error = %e, "failed to publish sample");
                false
            }
        }
    }
}
