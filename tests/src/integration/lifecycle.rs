//! # Lifecycle Integration Tests
//!
//! Configuration in, ticks through, teardown out.
//!
//! ## Flows Tested:
//!
//! 1. **Config**: name-keyed mode overrides from JSON, invalid modes are fatal
//! 2. **Tick driver**: one flush per tick on a paused clock, shutdown, budget
//! 3. **Teardown**: leak reports, lookups fail afterwards, drop tears down

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    use envoy_bus::{
        BusConfig, BusError, DeliveryMode, Diagnostic, DispatchModeTable, EventManager, Listener,
        MemorySink, MessageType, ResponderKey, TickDriver,
    };

    #[derive(Debug)]
    struct Shielded;

    #[derive(Debug)]
    struct Regenerated(u32);

    fn counting<M: envoy_bus::Message>(hits: &Rc<Cell<u32>>) -> Listener<M> {
        let hits = Rc::clone(hits);
        Listener::unit(move || {
            hits.set(hits.get() + 1);
            Ok(())
        })
    }

    // =============================================================================
    // CONFIGURATION
    // =============================================================================

    #[test]
    fn test_json_overrides_apply_by_short_and_full_name() {
        let json = format!(
            r#"{{ "report_leaks": true, "dispatch_modes": {{ "Shielded": "next_tick", "{}": "deferred" }} }}"#,
            MessageType::of::<Regenerated>().name()
        );
        let config = BusConfig::from_json(&json).unwrap();
        let bus = EventManager::with_config(config).unwrap();

        bus.dispatch(Shielded).unwrap();
        bus.dispatch(Regenerated(5)).unwrap();
        assert_eq!(bus.pending_count::<Shielded>(), 1);
        assert_eq!(bus.pending_count::<Regenerated>(), 1);
        assert_eq!(bus.flush_deferred().unwrap(), 2);
    }

    #[test]
    fn test_type_registration_beats_config_name() {
        let config = BusConfig::from_json(r#"{ "dispatch_modes": { "Shielded": "now" } }"#).unwrap();
        let bus = EventManager::builder()
            .dispatch_modes(DispatchModeTable::new().with::<Shielded>(DeliveryMode::NextTick))
            .config(config)
            .try_build()
            .unwrap();

        let hits = Rc::new(Cell::new(0));
        let listener = counting::<Shielded>(&hits);
        bus.add_listener(&listener);
        bus.dispatch(Shielded).unwrap();
        assert_eq!(hits.get(), 0);
        assert_eq!(bus.flush_deferred().unwrap(), 1);
        assert_eq!(hits.get(), 1);
        bus.remove_listener(&listener);
    }

    #[test]
    fn test_unknown_mode_is_fatal() {
        let config =
            BusConfig::from_json(r#"{ "dispatch_modes": { "Shielded": "whenever" } }"#).unwrap();
        match EventManager::with_config(config) {
            Err(BusError::InvalidDeliveryMode { value }) => assert_eq!(value, "whenever"),
            other => panic!("Expected invalid mode error, got {other:?}"),
        }

        assert!(matches!(
            "sometime".parse::<DeliveryMode>(),
            Err(BusError::InvalidDeliveryMode { .. })
        ));
        assert!(matches!(
            DeliveryMode::try_from(7u8),
            Err(BusError::InvalidDeliveryMode { .. })
        ));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(
            BusConfig::from_json("{ dispatch_modes: "),
            Err(BusError::Config(_))
        ));
    }

    // =============================================================================
    // TICK DRIVER
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_driver_flushes_one_generation_per_tick() {
        let bus = Rc::new(
            EventManager::builder()
                .mode::<Regenerated>(DeliveryMode::NextTick)
                .sink(Rc::new(MemorySink::new()))
                .build(),
        );

        // Each delivery schedules the next one, so exactly one arrives per tick.
        let delivered = Rc::new(Cell::new(0));
        let count = Rc::clone(&delivered);
        let weak = Rc::downgrade(&bus);
        let listener = Listener::new(move |r: &Regenerated| {
            count.set(count.get() + 1);
            if let Some(bus) = weak.upgrade() {
                bus.dispatch(Regenerated(r.0 + 1))?;
            }
            Ok(())
        });
        bus.add_listener(&listener);
        bus.dispatch(Regenerated(0)).unwrap();

        let summary = TickDriver::new(Duration::from_millis(20))
            .with_max_ticks(6)
            .run(&bus, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.ticks, 6);
        assert_eq!(delivered.get(), 6);
        assert_eq!(summary.teardown.leaked_listeners, vec![MessageType::of::<Regenerated>()]);
        assert_eq!(bus.pending_count::<Regenerated>(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_stops_when_shutdown_resolves() {
        let bus = EventManager::builder()
            .sink(Rc::new(MemorySink::new()))
            .build();
        let hits = Rc::new(Cell::new(0));
        let listener = counting::<Shielded>(&hits);
        bus.add_listener(&listener);
        bus.dispatch_with(Shielded, DeliveryMode::NextTick).unwrap();

        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(45)).await;
            bus.remove_listener(&listener);
        };
        let summary = TickDriver::new(Duration::from_millis(10))
            .run(&bus, shutdown)
            .await
            .unwrap();

        // Ticks at 0, 10, 20, 30 and 40 ms.
        assert_eq!(summary.ticks, 5);
        assert_eq!(hits.get(), 1);
        assert!(summary.teardown.is_clean());
        assert_eq!(bus.stats().ticks, 5);
    }

    // =============================================================================
    // TEARDOWN
    // =============================================================================

    #[test]
    fn test_teardown_clears_everything_and_reports_one_leak() {
        let sink = Rc::new(MemorySink::new());
        let bus = EventManager::builder().sink(sink.clone()).build();

        let hits = Rc::new(Cell::new(0));
        let kept = counting::<Shielded>(&hits);
        let removed = counting::<Regenerated>(&hits);
        bus.add_listener(&kept);
        bus.add_listener(&removed);
        bus.remove_listener(&removed);
        bus.add_responder(|n: u32| n + 1);
        assert!(bus.remove_responder::<u32, u32>());

        let report = bus.teardown();
        assert_eq!(report.leaked_listeners, vec![MessageType::of::<Shielded>()]);
        assert!(report.leaked_responders.is_empty());
        assert_eq!(
            sink.reports(),
            vec![Diagnostic::LeakedListeners {
                message_types: vec![MessageType::of::<Shielded>()]
            }]
        );

        bus.dispatch(Shielded).unwrap();
        assert_eq!(hits.get(), 0);
        assert!(!bus.has_listener(&kept));
    }

    #[test]
    fn test_requests_fail_after_teardown() {
        let sink = Rc::new(MemorySink::new());
        let bus = EventManager::builder().sink(sink.clone()).build();
        bus.add_responder(|s: String| s.to_uppercase());
        bus.add_unit_responder(|| 42u8);
        assert_eq!(bus.request::<String, String>("hp".into()).unwrap(), "HP");

        let report = bus.teardown();
        assert_eq!(report.leaked_responders.len(), 2);
        assert!(report
            .leaked_responders
            .contains(&ResponderKey::new::<String, String>()));
        assert!(report.leaked_responders.contains(&ResponderKey::unit::<u8>()));

        assert!(matches!(
            bus.request::<String, String>("hp".into()),
            Err(BusError::ResponderNotFound { .. })
        ));
        assert!(matches!(
            bus.request_unit::<u8>(),
            Err(BusError::ResponderNotFound { .. })
        ));
        assert!(matches!(
            sink.reports().as_slice(),
            [Diagnostic::LeakedResponders { keys }] if keys.len() == 2
        ));
    }

    #[test]
    fn test_bus_is_reusable_after_teardown() {
        let sink = Rc::new(MemorySink::new());
        let bus = EventManager::builder().sink(sink.clone()).build();
        bus.teardown();
        assert!(bus.is_torn_down());

        let hits = Rc::new(Cell::new(0));
        let listener = counting::<Shielded>(&hits);
        bus.add_listener(&listener);
        assert!(!bus.is_torn_down());
        bus.dispatch(Shielded).unwrap();
        assert_eq!(hits.get(), 1);

        bus.remove_listener(&listener);
        assert!(bus.teardown().is_clean());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_drop_reports_leaks_once() {
        envoy_telemetry::init_test_logging();
        let sink = Rc::new(MemorySink::new());
        {
            let bus = EventManager::builder().sink(sink.clone()).build();
            bus.add_listener(&Listener::<Shielded>::new(|_| Ok(())));
            bus.add_unit_responder(|| 1i32);
        }
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_disabled_leak_reporting_still_returns_report() {
        let sink = Rc::new(MemorySink::new());
        let config = BusConfig::from_json(r#"{ "report_leaks": false }"#).unwrap();
        let bus = EventManager::builder()
            .config(config)
            .sink(sink.clone())
            .try_build()
            .unwrap();
        bus.add_listener(&Listener::<Shielded>::new(|_| Ok(())));

        assert_eq!(bus.teardown().leaked_listeners.len(), 1);
        assert!(sink.is_empty());
    }
}
