//! Mock eye tracker
//!
//! Implements `Device` with one generator thread per subscribed measurement
//! kind. Gaze and eye openness threads tick on the same device clock, so their
//! partials share device timestamps the way a real tracker's do.
//!
//! A manual device spawns nothing; tests drive it with [`MockDevice::emit`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    ContractError, Device, DeviceCallback, DeviceEvent, DeviceInfo, DeviceStream, EyeData,
    EyeImage, EyeOpenness, EyeOpennessData, ExtSignal, ExtSignalChange, GazeData, GazeOrigin,
    GazePoint, Positioning, PupilData, TimeSync, UserPosition, Vec2, Vec3,
};
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, trace, warn};

use crate::clock;

/// Mock device configuration
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    pub serial_number: String,
    pub model: String,
    /// Gaze and eye openness rate (Hz)
    pub frequency_hz: f64,
    pub has_eye_openness: bool,
    /// Eye image / positioning rate (Hz)
    pub aux_frequency_hz: f64,
    /// Added to every system timestamp, µs
    pub clock_skew_us: i64,
    /// Spawn generator threads on subscribe. A manual device only delivers `emit`ted events.
    pub generate: bool,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            serial_number: "MOCK-0001".to_string(),
            model: "Mock Tracker".to_string(),
            frequency_hz: 120.0,
            has_eye_openness: true,
            aux_frequency_hz: 10.0,
            clock_skew_us: 0,
            generate: true,
        }
    }
}

impl MockDeviceConfig {
    /// Device that delivers only what the caller emits.
    pub fn manual() -> Self {
        Self {
            generate: false,
            ..Default::default()
        }
    }
}

/// Running generator thread.
struct Generator {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Generator {
    fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("mock generator panicked");
            }
        }
    }
}

struct Subscription {
    callback: DeviceCallback,
    generator: Option<Generator>,
}

/// Eye image subscriptions are keyed without their encoding.
fn key(stream: DeviceStream) -> DeviceStream {
    match stream {
        DeviceStream::EyeImage { .. } => DeviceStream::EyeImage { as_gif: false },
        other => other,
    }
}

/// Mock eye tracker
pub struct MockDevice {
    info: DeviceInfo,
    config: MockDeviceConfig,
    /// Device clock origin; shared by all generators
    epoch: Instant,
    subscriptions: Mutex<HashMap<DeviceStream, Subscription>>,
}

impl MockDevice {
    pub fn new(config: MockDeviceConfig) -> Self {
        let info = DeviceInfo {
            serial_number: config.serial_number.clone(),
            model: config.model.clone(),
            address: format!("mock://{}", config.serial_number),
            frequency: config.frequency_hz,
            has_eye_openness: config.has_eye_openness,
        };
        Self {
            info,
            config,
            epoch: Instant::now(),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Create manual mock device
    pub fn manual() -> Self {
        Self::new(MockDeviceConfig::manual())
    }

    /// Deliver `event` to its subscriber, if any. Returns whether it was delivered.
    pub fn emit(&self, event: DeviceEvent) -> bool {
        let stream = match &event {
            DeviceEvent::Gaze(_) => DeviceStream::Gaze,
            DeviceEvent::EyeOpenness(_) => DeviceStream::EyeOpenness,
            DeviceEvent::EyeImage(_) => DeviceStream::EyeImage { as_gif: false },
            DeviceEvent::ExtSignal(_) => DeviceStream::ExtSignal,
            DeviceEvent::TimeSync(_) => DeviceStream::TimeSync,
            DeviceEvent::Positioning(_) => DeviceStream::Positioning,
        };
        // callbacks run without the lock held
        let callback = self
            .subscriptions
            .lock()
            .get(&stream)
            .map(|s| s.callback.clone());
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, stream: DeviceStream) -> bool {
        self.subscriptions.lock().contains_key(&key(stream))
    }

    fn spawn_generator(&self, stream: DeviceStream, callback: DeviceCallback) -> Result<Generator, ContractError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let epoch = self.epoch;
        let skew = self.config.clock_skew_us;
        let rate = match stream {
            DeviceStream::Gaze | DeviceStream::EyeOpenness => self.config.frequency_hz,
            DeviceStream::EyeImage { .. } | DeviceStream::Positioning => self.config.aux_frequency_hz,
            DeviceStream::ExtSignal | DeviceStream::TimeSync => 1.0,
        };
        let period = Duration::from_secs_f64(1.0 / rate.max(0.1));

        let thread = thread::Builder::new()
            .name(format!("mock-{stream}"))
            .spawn(move || {
                debug!(stream = %stream, rate, "mock generator started");
                let mut rng = rand::rng();
                // first tick after now, on the shared device clock grid
                let mut tick = (epoch.elapsed().as_nanos() / period.as_nanos()) as u32 + 1;

                while flag.load(Ordering::Relaxed) {
                    let due = epoch + period * tick;
                    if let Some(wait) = due.checked_duration_since(Instant::now()) {
                        thread::sleep(wait);
                    }
                    if !flag.load(Ordering::Relaxed) {
                        break;
                    }

                    let device_ts = (period * tick).as_micros() as i64;
                    let system_ts = clock::now_us() + skew;
                    callback(generate(stream, &mut rng, tick, device_ts, system_ts));
                    trace!(stream = %stream, device_ts, "mock event delivered");
                    tick += 1;
                }
                debug!(stream = %stream, "mock generator stopped");
            })?;

        Ok(Generator {
            running,
            thread: Some(thread),
        })
    }
}

impl Device for MockDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn subscribe(&self, stream: DeviceStream, callback: DeviceCallback) -> Result<(), ContractError> {
        if stream == DeviceStream::EyeOpenness && !self.config.has_eye_openness {
            return Err(ContractError::device(
                "subscribe",
                "eye openness is not supported by this device",
            ));
        }

        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.contains_key(&key(stream)) {
            return Ok(());
        }
        let generator = if self.config.generate {
            Some(self.spawn_generator(stream, callback.clone())?)
        } else {
            None
        };
        subscriptions.insert(key(stream), Subscription { callback, generator });
        debug!(stream = %stream, "device stream subscribed");
        Ok(())
    }

    fn unsubscribe(&self, stream: DeviceStream) -> Result<(), ContractError> {
        let removed = self.subscriptions.lock().remove(&key(stream));
        if let Some(generator) = removed.and_then(|s| s.generator) {
            generator.stop();
            debug!(stream = %stream, "device stream unsubscribed");
        }
        Ok(())
    }

    fn system_time_stamp(&self) -> i64 {
        clock::now_us() + self.config.clock_skew_us
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let subscriptions: Vec<_> = self.subscriptions.get_mut().drain().collect();
        for (_, subscription) in subscriptions {
            if let Some(generator) = subscription.generator {
                generator.stop();
            }
        }
    }
}

fn generate(
    stream: DeviceStream,
    rng: &mut impl Rng,
    tick: u32,
    device_time_stamp: i64,
    system_time_stamp: i64,
) -> DeviceEvent {
    match stream {
        DeviceStream::Gaze => DeviceEvent::Gaze(GazeData {
            left: eye(rng, -0.03),
            right: eye(rng, 0.03),
            device_time_stamp,
            system_time_stamp,
        }),
        DeviceStream::EyeOpenness => {
            let blink = rng.random_bool(0.02);
            let mut openness = || EyeOpenness {
                diameter: if blink { 0.0 } else { rng.random_range(9.0..12.0) },
                valid: true,
                available: true,
            };
            DeviceEvent::EyeOpenness(EyeOpennessData {
                left: openness(),
                right: openness(),
                device_time_stamp,
                system_time_stamp,
            })
        }
        DeviceStream::EyeImage { as_gif } => {
            let mut data = vec![0u8; 64];
            rng.fill(&mut data[..]);
            DeviceEvent::EyeImage(EyeImage {
                device_time_stamp,
                system_time_stamp,
                is_gif: as_gif,
                data: Bytes::from(data),
            })
        }
        DeviceStream::ExtSignal => DeviceEvent::ExtSignal(ExtSignal {
            device_time_stamp,
            system_time_stamp,
            value: tick % 2,
            change_type: if tick == 1 {
                ExtSignalChange::InitialValue
            } else {
                ExtSignalChange::ValueChanged
            },
        }),
        DeviceStream::TimeSync => DeviceEvent::TimeSync(TimeSync {
            system_request_time_stamp: system_time_stamp,
            device_time_stamp,
            system_response_time_stamp: system_time_stamp + rng.random_range(50..500),
        }),
        DeviceStream::Positioning => {
            let mut position = |x: f32| UserPosition {
                position: Vec3::new(
                    x + rng.random_range(-0.02..0.02),
                    0.5 + rng.random_range(-0.02..0.02),
                    0.5 + rng.random_range(-0.02..0.02),
                ),
                valid: true,
            };
            DeviceEvent::Positioning(Positioning {
                left: position(0.4),
                right: position(0.6),
            })
        }
    }
}

/// One eye looking near the screen centre. Eye openness is left empty.
fn eye(rng: &mut impl Rng, x_offset: f32) -> EyeData {
    let valid = rng.random_bool(0.97);
    EyeData {
        gaze_point: GazePoint {
            on_display_area: Vec2 {
                x: 0.5 + rng.random_range(-0.05..0.05),
                y: 0.5 + rng.random_range(-0.05..0.05),
            },
            in_user_coordinates: Vec3::new(rng.random_range(-20.0..20.0), rng.random_range(100.0..140.0), 0.0),
            valid,
            available: true,
        },
        pupil: PupilData {
            diameter: rng.random_range(2.5..4.5),
            valid,
            available: true,
        },
        gaze_origin: GazeOrigin {
            in_user_coordinates: Vec3::new(x_offset * 1000.0, 0.0, 600.0),
            in_track_box_coordinates: Vec3::new(0.5 + x_offset, 0.5, 0.5),
            valid,
            available: true,
        },
        eye_openness: EyeOpenness::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn collector() -> (DeviceCallback, mpsc::Receiver<DeviceEvent>) {
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let callback: DeviceCallback = Arc::new(move |event| {
            let _ = tx.lock().unwrap().send(event);
        });
        (callback, rx)
    }

    #[test]
    fn test_manual_emit_reaches_subscriber() {
        let device = MockDevice::manual();
        let sync = TimeSync::default();
        assert!(!device.emit(DeviceEvent::TimeSync(sync)));

        let (callback, rx) = collector();
        device.subscribe(DeviceStream::TimeSync, callback).unwrap();
        assert!(device.emit(DeviceEvent::TimeSync(sync)));
        assert_eq!(rx.try_recv().unwrap(), DeviceEvent::TimeSync(sync));

        device.unsubscribe(DeviceStream::TimeSync).unwrap();
        assert!(!device.emit(DeviceEvent::TimeSync(sync)));
    }

    #[test]
    fn test_gaze_and_openness_share_device_ticks() {
        let device = MockDevice::new(MockDeviceConfig {
            frequency_hz: 200.0,
            ..Default::default()
        });
        let (gaze_cb, gaze_rx) = collector();
        let (open_cb, open_rx) = collector();
        device.subscribe(DeviceStream::Gaze, gaze_cb).unwrap();
        device.subscribe(DeviceStream::EyeOpenness, open_cb).unwrap();

        thread::sleep(Duration::from_millis(100));
        device.unsubscribe(DeviceStream::Gaze).unwrap();
        device.unsubscribe(DeviceStream::EyeOpenness).unwrap();

        let gaze: Vec<i64> = gaze_rx
            .try_iter()
            .filter_map(|e| match e {
                DeviceEvent::Gaze(g) => Some(g.device_time_stamp),
                _ => None,
            })
            .collect();
        let openness: Vec<i64> = open_rx
            .try_iter()
            .filter_map(|e| match e {
                DeviceEvent::EyeOpenness(o) => Some(o.device_time_stamp),
                _ => None,
            })
            .collect();

        assert!(gaze.len() > 5);
        assert!(gaze.windows(2).all(|w| w[0] < w[1]));
        assert!(openness.iter().any(|t| gaze.contains(t)));
    }

    #[test]
    fn test_openness_requires_capability() {
        let device = MockDevice::new(MockDeviceConfig {
            has_eye_openness: false,
            generate: false,
            ..Default::default()
        });
        let (callback, _rx) = collector();
        assert!(device.subscribe(DeviceStream::EyeOpenness, callback).is_err());
    }

    #[test]
    fn test_system_clock_matches_transport_clock() {
        let device = MockDevice::manual();
        let delta = device.system_time_stamp() - clock::now_us();
        assert!(delta.abs() < 1_000);
    }
}
