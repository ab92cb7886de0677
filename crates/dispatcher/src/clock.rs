//! Startup clock agreement check between the device and the transport.

use contracts::{us_to_seconds, ClockCheckConfig, Device, Transport};
use tracing::{debug, instrument};

use crate::{DispatcherError, Result};

/// Mean of `device - transport` clock readings, in seconds.
///
/// Half of the samples read the device clock first and half the transport
/// clock first, so the call latency cancels out.
pub fn mean_clock_offset(device: &dyn Device, transport: &dyn Transport, samples: usize) -> f64 {
    let samples = samples.max(2);
    // warm up
    device.system_time_stamp();
    transport.local_clock();

    let mut sum = 0.0;
    for i in 0..samples {
        let (device_s, transport_s) = if i < samples / 2 {
            let d = us_to_seconds(device.system_time_stamp());
            (d, transport.local_clock())
        } else {
            let t = transport.local_clock();
            (us_to_seconds(device.system_time_stamp()), t)
        };
        sum += device_s - transport_s;
    }
    sum / samples as f64
}

/// Fail with `ClockMismatch` when the clocks disagree by more than the tolerance.
///
/// Returns the measured mean offset. Does nothing when the check is disabled.
#[instrument(name = "dispatcher_check_clocks", level = "debug", skip_all)]
pub fn check_clocks(
    device: &dyn Device,
    transport: &dyn Transport,
    config: &ClockCheckConfig,
) -> Result<f64> {
    if !config.enabled {
        return Ok(0.0);
    }
    let mean_offset_s = mean_clock_offset(device, transport, config.samples);
    observability::record_clock_offset(mean_offset_s);
    debug!(mean_offset_s, samples = config.samples, "clock offset measured");

    if mean_offset_s.abs() > config.tolerance_s {
        return Err(DispatcherError::ClockMismatch {
            mean_offset_s,
            tolerance_s: config.tolerance_s,
        });
    }
    Ok(mean_offset_s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopback::{LoopbackTransport, MockDevice, MockDeviceConfig};

    #[test]
    fn test_shared_clock_passes() {
        let device = MockDevice::manual();
        let offset = check_clocks(&device, &LoopbackTransport::new(), &ClockCheckConfig::default())
            .unwrap();
        assert!(offset.abs() < 0.001);
    }

    #[test]
    fn test_skewed_clock_fails() {
        let device = MockDevice::new(MockDeviceConfig {
            clock_skew_us: 5_000,
            ..MockDeviceConfig::manual()
        });
        let err = check_clocks(&device, &LoopbackTransport::new(), &ClockCheckConfig::default())
            .unwrap_err();
        match err {
            DispatcherError::ClockMismatch { mean_offset_s, .. } => {
                assert!((mean_offset_s - 0.005).abs() < 0.001)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_disabled_check_is_skipped() {
        let device = MockDevice::new(MockDeviceConfig {
            clock_skew_us: 1_000_000,
            ..MockDeviceConfig::manual()
        });
        let config = ClockCheckConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(check_clocks(&device, &LoopbackTransport::new(), &config).is_ok());
    }
}
