//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置契约测试
//! - 模拟 e2e 测试：模拟眼动仪 -> 出口 -> 回环网络 -> 入口缓冲 -> 消费

#[cfg(test)]
mod contract_tests {
    use std::path::Path;

    use contracts::StreamKind;

    #[test]
    fn test_shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../streamer.toml");
        let config = config_loader::ConfigLoader::load_from_path(&path).unwrap();
        assert!(config.outlet.streams.contains(&StreamKind::Gaze));
        assert_eq!(
            config.inlet.capacity.for_kind(StreamKind::Gaze),
            contracts::StreamSchema::of(StreamKind::Gaze).default_capacity
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use contracts::{
        BufferSide, DeviceEvent, EyeImageRecord, EyeOpenness, EyeOpennessData, ExtSignal,
        ExtSignalChange, ExtSignalRecord, GazeData, GazeRecord, PositioningRecord, StreamKind,
        StreamerConfig, TimeSyncRecord,
    };
    use ingestion::{BufferedRecord, IngestionError, InletRegistry, SubscriptionId};
    use loopback::{LoopbackTransport, MockDevice};
    use streamer::Streamer;

    struct Rig {
        transport: Arc<LoopbackTransport>,
        device: Arc<MockDevice>,
        streamer: Streamer,
    }

    /// Streamer connected to a manually driven device over a fresh loopback network
    fn rig() -> Rig {
        let transport = Arc::new(LoopbackTransport::new());
        let device = Arc::new(MockDevice::manual());
        let mut config = StreamerConfig::default();
        // paired clock reads are load sensitive
        config.clock_check.enabled = false;
        let streamer = Streamer::new(transport.clone(), config);
        streamer.connect(device.clone()).unwrap();
        Rig {
            transport,
            device,
            streamer,
        }
    }

    impl Rig {
        fn listen(&self, kind: StreamKind, start: bool) -> SubscriptionId {
            self.streamer.start_outlet(kind, None).unwrap();
            let serial = &self.device_serial();
            self.streamer
                .inlets()
                .create_listener_for_source(&kind.source_id(serial), None, Some(start))
                .unwrap()
        }

        fn device_serial(&self) -> String {
            self.streamer.device_info().unwrap().serial_number
        }

        fn emit_signal(&self, system_time_stamp: i64) {
            assert!(self.device.emit(DeviceEvent::ExtSignal(ExtSignal {
                device_time_stamp: system_time_stamp + 7,
                system_time_stamp,
                value: 1,
                change_type: ExtSignalChange::ValueChanged,
            })));
        }
    }

    fn wait_for_len(inlets: &InletRegistry, id: SubscriptionId, len: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while inlets.buffer_len(id).unwrap() < len {
            assert!(Instant::now() < deadline, "inlet {id} never reached {len} records");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn system_times(records: &[ExtSignalRecord]) -> Vec<i64> {
        records.iter().map(|r| r.signal.system_time_stamp).collect()
    }

    #[test]
    fn test_e2e_publish_to_consume() {
        let rig = rig();
        let id = rig.listen(StreamKind::ExtSignal, true);
        let inlets = rig.streamer.inlets();

        for t in [100, 200, 300, 400] {
            rig.emit_signal(t);
        }
        wait_for_len(inlets, id, 4);

        let all: Vec<ExtSignalRecord> = inlets.peek_time_range(id, None, None, None).unwrap();
        assert_eq!(system_times(&all), vec![100, 200, 300, 400]);
        assert!(all.iter().all(|r| r.remote_time == r.signal.system_time_stamp));
        assert_eq!(all[0].signal.device_time_stamp, 107);

        // both bounds inclusive
        let middle: Vec<ExtSignalRecord> = inlets
            .consume_time_range(id, Some(200), Some(300), Some(false))
            .unwrap();
        assert_eq!(system_times(&middle), vec![200, 300]);
        assert_eq!(inlets.buffer_len(id).unwrap(), 2);

        let newest: Vec<ExtSignalRecord> = inlets.peek_n(id, None, None).unwrap();
        assert_eq!(system_times(&newest), vec![400]);

        let rest: Vec<ExtSignalRecord> = inlets.consume_n(id, None, None).unwrap();
        assert_eq!(system_times(&rest), vec![100, 400]);
        assert_eq!(inlets.buffer_len(id).unwrap(), 0);
        assert_eq!(inlets.inlet_stats(id).unwrap().samples_ingested, 4);
    }

    #[test]
    fn test_e2e_records_keep_arrival_order() {
        let rig = rig();
        let id = rig.listen(StreamKind::ExtSignal, true);
        let inlets = rig.streamer.inlets();

        let stamps: Vec<i64> = (1..=50).map(|i| i * 1_000).collect();
        for &t in &stamps {
            rig.emit_signal(t);
        }
        wait_for_len(inlets, id, stamps.len());

        let all: Vec<ExtSignalRecord> = inlets.peek_n(id, Some(usize::MAX), None).unwrap();
        assert_eq!(system_times(&all), stamps);
        assert!(all.windows(2).all(|w| w[0].local_time <= w[1].local_time));

        let oldest: Vec<ExtSignalRecord> =
            inlets.consume_n(id, Some(3), Some(BufferSide::Start)).unwrap();
        assert_eq!(system_times(&oldest), vec![1_000, 2_000, 3_000]);
        let newest: Vec<ExtSignalRecord> =
            inlets.consume_n(id, Some(2), Some(BufferSide::End)).unwrap();
        assert_eq!(system_times(&newest), vec![49_000, 50_000]);
        assert_eq!(inlets.buffer_len(id).unwrap(), 45);
    }

    #[test]
    fn test_e2e_local_time_applies_clock_offset() {
        let rig = rig();
        rig.transport.set_clock_offset(0.25);
        let id = rig.listen(StreamKind::ExtSignal, true);
        let inlets = rig.streamer.inlets();

        rig.emit_signal(2_000_000);
        wait_for_len(inlets, id, 1);

        let records: Vec<ExtSignalRecord> = inlets.consume_n(id, None, None).unwrap();
        assert_eq!(records[0].remote_time, 2_000_000);
        assert_eq!(records[0].local_time, 2_250_000);
    }

    fn probe<R: BufferedRecord>(inlets: &InletRegistry, id: SubscriptionId) -> Result<(), IngestionError> {
        inlets.peek_n::<R>(id, None, None).map(|_| ())
    }

    fn probe_kind(
        inlets: &InletRegistry,
        id: SubscriptionId,
        requested: StreamKind,
    ) -> Result<(), IngestionError> {
        match requested {
            StreamKind::Gaze => probe::<GazeRecord>(inlets, id),
            StreamKind::EyeImage => probe::<EyeImageRecord>(inlets, id),
            StreamKind::ExtSignal => probe::<ExtSignalRecord>(inlets, id),
            StreamKind::TimeSync => probe::<TimeSyncRecord>(inlets, id),
            StreamKind::Positioning => probe::<PositioningRecord>(inlets, id),
        }
    }

    #[test]
    fn test_e2e_type_mismatch_for_every_pairing() {
        let rig = rig();
        let inlets = rig.streamer.inlets();
        let listeners: Vec<(StreamKind, SubscriptionId)> = StreamKind::ALL
            .iter()
            .map(|&kind| (kind, rig.listen(kind, false)))
            .collect();

        for &(actual, id) in &listeners {
            assert_eq!(inlets.inlet_kind(id).unwrap(), actual);
            for requested in StreamKind::ALL {
                let result = probe_kind(inlets, id, requested);
                if requested == actual {
                    assert!(result.is_ok(), "{actual} inlet rejected its own records");
                } else {
                    match result {
                        Err(IngestionError::TypeMismatch {
                            expected,
                            actual: got,
                            ..
                        }) => {
                            assert_eq!(expected, requested);
                            assert_eq!(got, actual);
                        }
                        other => panic!("{requested} on {actual} inlet gave {other:?}"),
                    }
                }
            }
        }
    }

    #[test]
    fn test_e2e_stop_and_delete_are_idempotent() {
        let rig = rig();
        let id = rig.listen(StreamKind::TimeSync, true);
        let inlets = rig.streamer.inlets();
        assert!(inlets.is_listening(id).unwrap());

        inlets.stop_listening(id, None).unwrap();
        inlets.stop_listening(id, Some(true)).unwrap();
        assert!(!inlets.is_listening(id).unwrap());

        // restart after stop
        inlets.start_listening(id).unwrap();
        assert!(inlets.is_listening(id).unwrap());

        inlets.delete_listener(id).unwrap();
        assert!(matches!(
            inlets.delete_listener(id),
            Err(IngestionError::InletNotFound { .. })
        ));
        assert!(inlets.listener_ids().is_empty());
    }

    #[test]
    fn test_e2e_positioning_has_no_time_range() {
        let rig = rig();
        let id = rig.listen(StreamKind::Positioning, false);
        let inlets = rig.streamer.inlets();

        assert!(matches!(
            inlets.clear_time_range(id, None, None, None),
            Err(IngestionError::UnsupportedOperation { .. })
        ));
        assert!(inlets.consume_n::<PositioningRecord>(id, None, None).unwrap().is_empty());
    }

    fn gaze(t: i64) -> DeviceEvent {
        let mut data = GazeData {
            device_time_stamp: t,
            system_time_stamp: 1_000_000 + t,
            ..Default::default()
        };
        data.left.gaze_point.valid = true;
        data.right.gaze_point.valid = true;
        DeviceEvent::Gaze(data)
    }

    fn openness(t: i64) -> DeviceEvent {
        let eye = EyeOpenness {
            diameter: 9.5,
            valid: true,
            available: true,
        };
        DeviceEvent::EyeOpenness(EyeOpennessData {
            left: eye,
            right: eye,
            device_time_stamp: t,
            system_time_stamp: 1_000_000 + t,
        })
    }

    #[test]
    fn test_e2e_merged_gaze_in_device_order() {
        let rig = rig();
        assert!(rig.streamer.merge_openness_into_gaze());
        let id = rig.listen(StreamKind::Gaze, true);
        let inlets = rig.streamer.inlets();

        // openness leads for 1, gaze leads for 2 and 3
        rig.device.emit(openness(1));
        rig.device.emit(gaze(1));
        rig.device.emit(gaze(2));
        rig.device.emit(gaze(3));
        rig.device.emit(openness(2));
        rig.device.emit(openness(3));
        wait_for_len(inlets, id, 3);

        let records: Vec<GazeRecord> = inlets.consume_n(id, None, None).unwrap();
        let device_times: Vec<i64> = records.iter().map(|r| r.gaze.device_time_stamp).collect();
        assert_eq!(device_times, vec![1, 2, 3]);
        for record in &records {
            assert!(record.gaze.left.gaze_point.valid);
            assert!(record.gaze.right.eye_openness.available);
            assert_eq!(record.gaze.left.eye_openness.diameter, 9.5);
            assert_eq!(record.remote_time, record.gaze.system_time_stamp);
        }
    }

    #[test]
    fn test_e2e_disconnect_keeps_buffered_records() {
        let rig = rig();
        let id = rig.listen(StreamKind::ExtSignal, true);
        let inlets = rig.streamer.inlets();

        rig.emit_signal(500);
        wait_for_len(inlets, id, 1);
        rig.streamer.disconnect();
        assert!(!rig.streamer.is_streaming(StreamKind::ExtSignal));
        assert_eq!(rig.transport.outlet_count(), 0);

        let records: Vec<ExtSignalRecord> = inlets.consume_n(id, None, None).unwrap();
        assert_eq!(system_times(&records), vec![500]);
    }
}
