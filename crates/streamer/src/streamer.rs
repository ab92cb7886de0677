//! Streamer - owns the outlet side and the inlet registry

use std::sync::Arc;

use contracts::{Device, DeviceInfo, OutletConfig, StreamKind, StreamerConfig, Transport};
use dispatcher::{check_clocks, Dispatcher};
use ingestion::InletRegistry;
use parking_lot::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::{Result, StreamerError};

/// Outlets need a connected device; inlets only need the transport.
pub struct Streamer {
    transport: Arc<dyn Transport>,
    config: StreamerConfig,
    outlets: RwLock<Option<Dispatcher>>,
    /// Merge preference applied at the next `connect`
    merge_preference: Mutex<bool>,
    inlets: InletRegistry,
}

impl Streamer {
    pub fn new(transport: Arc<dyn Transport>, config: StreamerConfig) -> Self {
        let inlets = InletRegistry::new(
            transport.clone(),
            config.inlet.clone(),
            config.discovery.timeout(),
        );
        Self {
            merge_preference: Mutex::new(config.outlet.merge_openness_into_gaze),
            transport,
            config,
            outlets: RwLock::new(None),
            inlets,
        }
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Inlet side: subscriptions and buffered record queries.
    pub fn inlets(&self) -> &InletRegistry {
        &self.inlets
    }

    /// Attach an eye tracker after verifying its clock matches the transport's.
    #[instrument(name = "streamer_connect", skip_all, fields(serial = %device.info().serial_number))]
    pub fn connect(&self, device: Arc<dyn Device>) -> Result<()> {
        let mut outlets = self.outlets.write();
        if let Some(current) = outlets.as_ref() {
            return Err(StreamerError::AlreadyConnected {
                serial_number: current.device().info().serial_number.clone(),
            });
        }

        let offset = check_clocks(device.as_ref(), self.transport.as_ref(), &self.config.clock_check)?;
        let config = OutletConfig {
            merge_openness_into_gaze: *self.merge_preference.lock(),
            ..self.config.outlet.clone()
        };

        let info = device.info().clone();
        *outlets = Some(Dispatcher::new(device, self.transport.clone(), &config));
        info!(
            serial = %info.serial_number,
            model = %info.model,
            frequency = info.frequency,
            clock_offset_s = offset,
            "eye tracker connected"
        );
        Ok(())
    }

    /// Stop every outlet and release the device.
    pub fn disconnect(&self) {
        if let Some(dispatcher) = self.outlets.write().take() {
            dispatcher.stop_all();
            info!("eye tracker disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.outlets.read().is_some()
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.outlets.read().as_ref().map(|d| d.device().info().clone())
    }

    fn with_outlets<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Dispatcher) -> dispatcher::Result<T>,
    ) -> Result<T> {
        let outlets = self.outlets.read();
        let dispatcher = outlets
            .as_ref()
            .ok_or(StreamerError::NotConnected { operation })?;
        Ok(f(dispatcher)?)
    }

    /// Start publishing `kind`. Returns `false` if it was already streaming.
    pub fn start_outlet(&self, kind: StreamKind, as_gif: Option<bool>) -> Result<bool> {
        self.with_outlets("start an outlet", |d| d.start_outlet(kind, as_gif))
    }

    /// Start every stream listed in the outlet configuration.
    pub fn start_configured_outlets(&self) -> Result<Vec<StreamKind>> {
        let as_gif = self.config.outlet.eye_image_as_gif;
        let mut started = Vec::new();
        for &kind in &self.config.outlet.streams {
            if self.start_outlet(kind, Some(as_gif))? {
                started.push(kind);
            }
        }
        Ok(started)
    }

    pub fn stop_outlet(&self, kind: StreamKind) -> Result<()> {
        self.with_outlets("stop an outlet", |d| d.stop_outlet(kind))
    }

    /// `false` when no device is connected.
    pub fn is_streaming(&self, kind: StreamKind) -> bool {
        self.outlets
            .read()
            .as_ref()
            .is_some_and(|d| d.is_streaming(kind))
    }

    /// Before `connect` this only records the preference.
    pub fn set_merge_openness_into_gaze(&self, enabled: bool) -> Result<()> {
        let outlets = self.outlets.read();
        if let Some(dispatcher) = outlets.as_ref() {
            dispatcher.set_merge_openness_into_gaze(enabled)?;
        }
        *self.merge_preference.lock() = enabled;
        Ok(())
    }

    pub fn merge_openness_into_gaze(&self) -> bool {
        match self.outlets.read().as_ref() {
            Some(dispatcher) => dispatcher.merge_openness_into_gaze(),
            None => *self.merge_preference.lock(),
        }
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        self.disconnect();
        let live = self.inlets.listener_ids().len();
        if live > 0 {
            warn!(count = live, "deleting inlets on shutdown");
            self.inlets.delete_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ClockCheckConfig;
    use loopback::{LoopbackTransport, MockDevice, MockDeviceConfig};

    fn streamer() -> Streamer {
        Streamer::new(Arc::new(LoopbackTransport::new()), StreamerConfig::default())
    }

    #[test]
    fn test_outlets_need_connection() {
        let streamer = streamer();
        assert!(!streamer.is_connected());
        assert!(matches!(
            streamer.start_outlet(StreamKind::Gaze, None),
            Err(StreamerError::NotConnected { .. })
        ));
        assert!(!streamer.is_streaming(StreamKind::Gaze));
    }

    #[test]
    fn test_connect_once() {
        let streamer = streamer();
        streamer.connect(Arc::new(MockDevice::manual())).unwrap();
        assert!(matches!(
            streamer.connect(Arc::new(MockDevice::manual())),
            Err(StreamerError::AlreadyConnected { .. })
        ));

        assert!(streamer.start_outlet(StreamKind::ExtSignal, None).unwrap());
        assert!(streamer.is_streaming(StreamKind::ExtSignal));

        streamer.disconnect();
        assert!(!streamer.is_connected());
        assert!(!streamer.is_streaming(StreamKind::ExtSignal));
    }

    #[test]
    fn test_connect_rejects_skewed_clock() {
        let streamer = streamer();
        let device = MockDevice::new(MockDeviceConfig {
            clock_skew_us: 250_000,
            ..MockDeviceConfig::manual()
        });
        let err = streamer.connect(Arc::new(device)).unwrap_err();
        assert!(matches!(
            err,
            StreamerError::Outlet(dispatcher::DispatcherError::ClockMismatch { .. })
        ));
        assert!(!streamer.is_connected());
    }

    #[test]
    fn test_merge_preference_before_connect() {
        let mut config = StreamerConfig::default();
        config.clock_check = ClockCheckConfig {
            enabled: false,
            ..Default::default()
        };
        let streamer = Streamer::new(Arc::new(LoopbackTransport::new()), config);

        streamer.set_merge_openness_into_gaze(false).unwrap();
        streamer.connect(Arc::new(MockDevice::manual())).unwrap();
        assert!(!streamer.merge_openness_into_gaze());

        streamer.set_merge_openness_into_gaze(true).unwrap();
        assert!(streamer.merge_openness_into_gaze());
    }

    #[test]
    fn test_start_configured_outlets() {
        let mut config = StreamerConfig::default();
        config.outlet.streams = vec![StreamKind::TimeSync, StreamKind::Positioning];
        let streamer = Streamer::new(Arc::new(LoopbackTransport::new()), config);
        streamer.connect(Arc::new(MockDevice::manual())).unwrap();

        let started = streamer.start_configured_outlets().unwrap();
        assert_eq!(started, vec![StreamKind::TimeSync, StreamKind::Positioning]);
        assert_eq!(streamer.inlets().remote_streams(None).unwrap().len(), 2);
    }
}
