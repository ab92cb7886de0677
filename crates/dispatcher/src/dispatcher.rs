//! Dispatcher - routes device events to outlets

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use contracts::{
    Device, DeviceCallback, DeviceEvent, DeviceStream, OutletConfig, Publishable, StreamKind,
    StreamSchema, Transport,
};
use parking_lot::{Mutex, RwLock};
use sync_engine::{GazeMerger, GazePart};
use tracing::{debug, info, instrument, warn};

use crate::handle::OutletHandle;
use crate::metrics::OutletMetricsSnapshot;
use crate::{DispatcherError, Result};

/// Device subscription key; eye image encodings share one subscription.
fn subscription_key(stream: DeviceStream) -> DeviceStream {
    match stream {
        DeviceStream::EyeImage { .. } => DeviceStream::EyeImage { as_gif: false },
        other => other,
    }
}

/// Primary device stream feeding `kind`.
fn device_stream(kind: StreamKind, as_gif: bool) -> DeviceStream {
    match kind {
        StreamKind::Gaze => DeviceStream::Gaze,
        StreamKind::EyeImage => DeviceStream::EyeImage { as_gif },
        StreamKind::ExtSignal => DeviceStream::ExtSignal,
        StreamKind::TimeSync => DeviceStream::TimeSync,
        StreamKind::Positioning => DeviceStream::Positioning,
    }
}

/// State shared with device callbacks. Callbacks hold only a `Weak` to it.
struct OutletShared {
    device: Arc<dyn Device>,
    transport: Arc<dyn Transport>,
    outlets: RwLock<HashMap<StreamKind, Arc<OutletHandle>>>,
    /// Active device subscriptions, keyed by [`subscription_key`]
    subscribed: RwLock<HashSet<DeviceStream>>,
    merge_openness: AtomicBool,
    merger: GazeMerger,
    /// Held across merge and publish; gaze and openness arrive on different threads.
    gaze_order: Mutex<()>,
}

impl OutletShared {
    fn is_subscribed(&self, stream: DeviceStream) -> bool {
        self.subscribed.read().contains(&subscription_key(stream))
    }

    fn outlet(&self, kind: StreamKind) -> Option<Arc<OutletHandle>> {
        self.outlets.read().get(&kind).cloned()
    }

    fn publish<P: Publishable>(&self, sample: &P) {
        // the outlet may already be gone while a last event is in flight
        if let Some(outlet) = self.outlet(P::KIND) {
            outlet.publish(sample);
        }
    }

    fn handle_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Gaze(data) => self.on_gaze_part(GazePart::Gaze(data)),
            DeviceEvent::EyeOpenness(data) => self.on_gaze_part(GazePart::Openness(data)),
            DeviceEvent::EyeImage(image) => self.publish(&image),
            DeviceEvent::ExtSignal(signal) => self.publish(&signal),
            DeviceEvent::TimeSync(sync) => self.publish(&sync),
            DeviceEvent::Positioning(positioning) => self.publish(&positioning),
        }
    }

    fn on_gaze_part(&self, part: GazePart) {
        let merge =
            self.is_subscribed(DeviceStream::Gaze) && self.is_subscribed(DeviceStream::EyeOpenness);
        let _order = self.gaze_order.lock();
        for merged in self.merger.push(part, merge) {
            self.publish(&merged.sample);
        }
    }

    /// Publish everything still staged, as partial samples.
    fn flush_staged(&self) {
        let _order = self.gaze_order.lock();
        for merged in self.merger.drain() {
            self.publish(&merged.sample);
        }
    }

    fn subscribe(self: &Arc<Self>, stream: DeviceStream) -> Result<()> {
        let key = subscription_key(stream);
        // marked before subscribing: the first event may arrive before subscribe returns
        if !self.subscribed.write().insert(key) {
            return Ok(());
        }
        if let Err(e) = self.device.subscribe(stream, callback(Arc::downgrade(self))) {
            self.subscribed.write().remove(&key);
            return Err(e.into());
        }
        debug!(stream = %stream, "device stream subscribed");
        Ok(())
    }

    /// Must not be called with `outlets` or `subscribed` locked: the device may
    /// wait for an in-flight callback that needs them.
    fn unsubscribe(&self, stream: DeviceStream) -> Result<()> {
        let key = subscription_key(stream);
        if !self.subscribed.read().contains(&key) {
            return Ok(());
        }
        self.device.unsubscribe(stream)?;
        self.subscribed.write().remove(&key);
        debug!(stream = %stream, "device stream unsubscribed");
        Ok(())
    }
}

/// Capability-scoped trampoline handed to the device.
fn callback(shared: Weak<OutletShared>) -> DeviceCallback {
    Arc::new(move |event| {
        if let Some(shared) = shared.upgrade() {
            shared.handle_event(event);
        }
    })
}

/// Outlet manager
///
/// Publishes device streams through the transport, one outlet per stream kind.
/// Gaze and eye openness are merged into the gaze stream while both are
/// subscribed.
pub struct Dispatcher {
    shared: Arc<OutletShared>,
}

impl Dispatcher {
    /// Merging defaults to `config.merge_openness_into_gaze`, and is off for
    /// devices without eye openness.
    pub fn new(device: Arc<dyn Device>, transport: Arc<dyn Transport>, config: &OutletConfig) -> Self {
        let capable = device.info().has_eye_openness;
        if config.merge_openness_into_gaze && !capable {
            debug!("device has no eye openness, merging disabled");
        }
        Self {
            shared: Arc::new(OutletShared {
                device,
                transport,
                outlets: RwLock::new(HashMap::new()),
                subscribed: RwLock::new(HashSet::new()),
                merge_openness: AtomicBool::new(config.merge_openness_into_gaze && capable),
                merger: GazeMerger::new(),
                gaze_order: Mutex::new(()),
            }),
        }
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.shared.device
    }

    /// Start publishing `kind`. Returns `false` if it is already streaming.
    ///
    /// `as_gif` only applies to eye images (default: raw).
    #[instrument(name = "dispatcher_start_outlet", skip(self), fields(kind = %kind))]
    pub fn start_outlet(&self, kind: StreamKind, as_gif: Option<bool>) -> Result<bool> {
        if self.is_streaming(kind) {
            return Ok(false);
        }
        let shared = &self.shared;
        let as_gif = as_gif.unwrap_or(false);

        if !shared.outlets.read().contains_key(&kind) {
            let info = shared.device.info();
            let rate = if kind == StreamKind::Gaze { info.frequency } else { 0.0 };
            let descriptor = StreamSchema::of(kind).descriptor(&info.serial_number, rate, as_gif);
            let channel = shared.transport.create_outlet(descriptor)?;
            shared
                .outlets
                .write()
                .insert(kind, Arc::new(OutletHandle::new(kind, channel)));
        }

        let mut streams = vec![device_stream(kind, as_gif)];
        if kind == StreamKind::Gaze && self.merge_openness_into_gaze() {
            streams.push(DeviceStream::EyeOpenness);
        }
        for stream in streams {
            if let Err(e) = shared.subscribe(stream) {
                warn!(kind = %kind, error = %e, "device subscription failed, withdrawing outlet");
                self.stop_outlet(kind)?;
                return Err(e);
            }
        }

        info!(kind = %kind, "outlet started");
        Ok(true)
    }

    /// Stop publishing `kind`. Stopping an idle kind is a no-op.
    #[instrument(name = "dispatcher_stop_outlet", skip(self), fields(kind = %kind))]
    pub fn stop_outlet(&self, kind: StreamKind) -> Result<()> {
        let shared = &self.shared;
        shared.unsubscribe(device_stream(kind, false))?;
        if kind == StreamKind::Gaze {
            shared.unsubscribe(DeviceStream::EyeOpenness)?;
            shared.flush_staged();
        }

        let removed = shared.outlets.write().remove(&kind);
        if let Some(outlet) = removed {
            let stats = outlet.metrics().snapshot();
            info!(kind = %kind, published = stats.published, failures = stats.failures, "outlet stopped");
        }
        Ok(())
    }

    /// Device subscription active and outlet present.
    pub fn is_streaming(&self, kind: StreamKind) -> bool {
        self.shared.is_subscribed(device_stream(kind, false))
            && self.shared.outlets.read().contains_key(&kind)
    }

    pub fn merge_openness_into_gaze(&self) -> bool {
        self.shared.merge_openness.load(Ordering::Acquire)
    }

    /// Enable or disable merging eye openness into the gaze stream.
    ///
    /// Takes effect immediately when gaze is streaming; disabling publishes
    /// anything still staged as gaze-only samples.
    #[instrument(name = "dispatcher_set_merge", skip(self))]
    pub fn set_merge_openness_into_gaze(&self, enabled: bool) -> Result<()> {
        let shared = &self.shared;
        if enabled && !shared.device.info().has_eye_openness {
            return Err(DispatcherError::capability_missing("eye openness"));
        }
        shared.merge_openness.store(enabled, Ordering::Release);

        if self.is_streaming(StreamKind::Gaze) {
            if enabled {
                shared.subscribe(DeviceStream::EyeOpenness)?;
            } else {
                shared.unsubscribe(DeviceStream::EyeOpenness)?;
                shared.flush_staged();
            }
        }
        debug!(enabled, "eye openness merge updated");
        Ok(())
    }

    /// Kinds with a live outlet, in stream order.
    pub fn streaming_kinds(&self) -> Vec<StreamKind> {
        StreamKind::ALL
            .into_iter()
            .filter(|k| self.is_streaming(*k))
            .collect()
    }

    pub fn outlet_metrics(&self, kind: StreamKind) -> Option<OutletMetricsSnapshot> {
        self.shared.outlet(kind).map(|o| o.metrics().snapshot())
    }

    /// Number of gaze samples waiting for their eye openness partner.
    pub fn staged_len(&self) -> usize {
        self.shared.merger.staged_len()
    }

    /// Stop every outlet.
    pub fn stop_all(&self) {
        for kind in StreamKind::ALL {
            if let Err(e) = self.stop_outlet(kind) {
                warn!(kind = %kind, error = %e, "failed to stop outlet");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop_all();
    }
}
