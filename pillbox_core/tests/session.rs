mod common;

use chrono::Timelike;
use common::{Rig, RigOpts, at, preset_for};
use pillbox_core::{ContainerId, CoreError, DoseTime, PhaseKind};
use pillbox_traits::Color;

fn second() -> ContainerId {
    ContainerId::from_digit(2).unwrap()
}

#[test]
fn keypad_setup_then_dose_is_due_at_eight_and_not_retriggered_at_eight_oh_one() {
    let mut rig = Rig::new(RigOpts::default());
    rig.ctl.start().unwrap();
    assert_eq!(rig.phase(), PhaseKind::Welcome);

    // Container 1: two doses at 08:00 and 20:00, ceiling 30. Others: none.
    rig.keys
        .push_script("A 2 08 00 20 00 30  0 30  0 30  0 30  0 30");
    assert!(rig.pump(100, |c| c.phase() == Some(PhaseKind::Monitoring)));
    assert_eq!(rig.keys.pending(), 0);

    let c1 = &rig.ctl.containers()[ContainerId::FIRST];
    assert_eq!(
        c1.schedule().doses(),
        &[DoseTime::new(8, 0).unwrap(), DoseTime::new(20, 0).unwrap()]
    );
    assert_eq!(c1.dose_count(), 2);
    assert_eq!(c1.max_temperature(), 30);
    assert!(rig.display.saw("Setup Complete"));

    assert!(rig.pump(20, |c| c.phase() == Some(PhaseKind::Dispensing)));
    let wall = rig.wall();
    assert_eq!((wall.hour(), wall.minute()), (8, 0));
    let c1 = &rig.ctl.containers()[ContainerId::FIRST];
    assert!(c1.is_ready());
    assert!(c1.door_open());
    assert_eq!(rig.outbox.sent().len(), 1);

    // No confirmation: still the same dispensing window at 08:01.
    rig.pump_until_wall(at(8, 1, 30));
    assert_eq!(rig.phase(), PhaseKind::Dispensing);
    assert_eq!(rig.ctl.stats().doses_triggered, 1);
    assert_eq!(rig.outbox.sent().len(), 1);
}

#[test]
fn acknowledged_dose_is_not_reopened_in_the_same_minute() {
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset_for(ContainerId::FIRST, &[(8, 0)], 30)),
        ..Default::default()
    });
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));

    rig.keys.push_script("A");
    rig.ctl.poll().unwrap();
    assert_eq!(rig.phase(), PhaseKind::Monitoring);
    assert!(rig.display.saw("Doors Closed"));
    let c1 = &rig.ctl.containers()[ContainerId::FIRST];
    assert!(!c1.door_open());
    assert!(!c1.is_ready());

    // Next tick is still inside 08:00.
    assert_eq!(rig.wall().minute(), 0);
    rig.ctl.poll().unwrap();
    assert_eq!(rig.phase(), PhaseKind::Monitoring);

    rig.pump_until_wall(at(8, 2, 0));
    assert_eq!(rig.ctl.stats().doses_triggered, 1);
    assert_eq!(rig.outbox.sent().len(), 1);
}

#[test]
fn dispensing_window_times_out_and_closes_opened_doors() {
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset_for(ContainerId::FIRST, &[(8, 0)], 30)),
        ..Default::default()
    });
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));
    let opened_at = rig.elapsed();
    assert_eq!(rig.servos[0].angle(), 0);

    assert!(rig.pump(100_000, |c| c.phase() == Some(PhaseKind::Monitoring)));
    assert!(rig.elapsed() - opened_at >= std::time::Duration::from_secs(30 * 60));

    let c1 = &rig.ctl.containers()[ContainerId::FIRST];
    assert!(!c1.door_open());
    assert!(!c1.is_ready());
    assert_eq!(rig.servos[0].angle(), 100);
    assert_eq!(rig.ctl.stats().doses_triggered, 1);
}

#[test]
fn dose_ready_runs_green_alert_and_single_notification() {
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset_for(ContainerId::FIRST, &[(8, 0)], 30)),
        ..Default::default()
    });
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));
    assert!(rig.indicator.saw_color(Color::GREEN));
    assert_eq!(rig.indicator.buzzes(), 10);
    assert!(rig.display.saw("is ready!"));
    assert_eq!(
        rig.outbox.sent(),
        vec![(
            "+15550100".to_string(),
            "Your medicine is ready now!".to_string()
        )]
    );
}

#[test]
fn temperature_excursion_raises_and_clears_alert() {
    let mut rig = Rig::monitoring(RigOpts {
        ambient: 37.0,
        preset: Some(preset_for(ContainerId::FIRST, &[], 30)),
        ..Default::default()
    });
    rig.ctl.poll().unwrap();
    assert!(rig.ctl.safety_active());
    assert_eq!(rig.indicator.color(), Color::RED);
    assert!(rig.display.saw("High Temperature"));
    assert!(rig.indicator.buzzes() >= 1);

    rig.ctl.poll().unwrap();
    assert_eq!(rig.ctl.stats().safety_alerts, 1);

    rig.rtc.set_temperature(25.0);
    rig.ctl.poll().unwrap();
    assert!(!rig.ctl.safety_active());
    assert_eq!(rig.indicator.color(), Color::OFF);
    assert_eq!(
        rig.display.last(),
        Some(("Room Temp:".to_string(), "25.00C".to_string()))
    );
}

#[test]
fn welcome_toggle_opens_then_closes_container_two() {
    let mut rig = Rig::new(RigOpts::default());
    rig.ctl.start().unwrap();

    rig.keys.push_script("2");
    rig.ctl.poll().unwrap();
    assert!(rig.ctl.containers()[second()].door_open());
    assert_eq!(rig.servos[1].angle(), 180);
    let expected: Vec<u8> = (81..=180).collect();
    assert_eq!(rig.servos[1].writes(), expected);

    rig.keys.push_script("2");
    rig.ctl.poll().unwrap();
    assert!(!rig.ctl.containers()[second()].door_open());
    assert_eq!(rig.servos[1].angle(), 80);
    assert!(rig.display.saw("Opened"));
    assert!(rig.display.saw("Closed"));
    assert_eq!(rig.phase(), PhaseKind::Welcome);
}

#[test]
fn manual_open_reseeds_baseline() {
    let mut rig = Rig::new(RigOpts::default());
    rig.ctl.start().unwrap();
    rig.weights[1].as_ref().unwrap().set(42.0);
    rig.keys.push_script("2");
    rig.ctl.poll().unwrap();
    assert_eq!(rig.ctl.containers()[second()].baseline_weight(), Some(42.0));
}

#[test]
fn welcome_confirm_closes_open_doors() {
    let mut rig = Rig::new(RigOpts {
        preset: Some(preset_for(ContainerId::FIRST, &[], 30)),
        ..Default::default()
    });
    rig.ctl.start().unwrap();
    rig.keys.push_script("1 3 A");
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Monitoring)));
    assert!(!rig.ctl.containers().any_open());
    assert!(rig.display.saw("All containers"));
    assert_eq!(rig.servos[0].angle(), 100);
    assert_eq!(rig.servos[2].angle(), 60);
}

#[test]
fn low_stock_in_welcome_alerts_once_per_episode() {
    let mut rig = Rig::new(RigOpts::default());
    rig.ctl.start().unwrap();
    let w = rig.weights[1].clone().unwrap();
    w.set(3.0);
    rig.keys.push_script("2");
    rig.ctl.poll().unwrap();
    assert_eq!(rig.ctl.stats().low_stock_alerts, 1);
    assert!(rig.indicator.saw_color(Color::BLUE));
    assert!(rig.display.saw("less medicine"));

    for _ in 0..5 {
        rig.ctl.poll().unwrap();
    }
    assert_eq!(rig.ctl.stats().low_stock_alerts, 1);

    w.set(50.0);
    rig.ctl.poll().unwrap();
    assert_eq!(
        rig.display.last(),
        Some(("1-5 open/close".to_string(), "A to proceed".to_string()))
    );
    // Outside a dose window a big delta is not consumption.
    assert_eq!(rig.ctl.stats().doses_taken, 0);
}

#[test]
fn closing_a_low_container_rearms_its_alert() {
    let mut rig = Rig::new(RigOpts::default());
    rig.ctl.start().unwrap();
    rig.weights[1].as_ref().unwrap().set(3.0);

    rig.keys.push_script("2");
    rig.ctl.poll().unwrap();
    assert_eq!(rig.ctl.stats().low_stock_alerts, 1);

    rig.keys.push_script("2");
    rig.ctl.poll().unwrap();
    assert!(!rig.ctl.containers()[second()].door_open());

    rig.keys.push_script("2");
    rig.ctl.poll().unwrap();
    assert!(rig.ctl.containers()[second()].door_open());
    assert_eq!(rig.ctl.stats().low_stock_alerts, 2);
}

#[test]
fn consumption_during_dispensing_is_detected_once() {
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset_for(second(), &[(8, 0)], 30)),
        ..Default::default()
    });
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));
    assert_eq!(rig.ctl.containers()[second()].baseline_weight(), Some(50.0));

    rig.weights[1].as_ref().unwrap().set(47.0);
    rig.ctl.poll().unwrap();
    assert_eq!(rig.ctl.stats().doses_taken, 1);
    assert!(rig.indicator.saw_color(Color::MAGENTA));
    assert!(rig.display.saw("taken"));
    assert_eq!(rig.ctl.containers()[second()].baseline_weight(), Some(47.0));

    for _ in 0..10 {
        rig.ctl.poll().unwrap();
    }
    assert_eq!(rig.ctl.stats().doses_taken, 1);
}

#[test]
fn notification_failure_does_not_block_dispensing() {
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset_for(ContainerId::FIRST, &[(8, 0)], 30)),
        ..Default::default()
    });
    rig.outbox.set_failing(true);
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));
    assert_eq!(rig.ctl.stats().notification_failures, 1);
    assert!(rig.outbox.sent().is_empty());
    assert!(rig.display.saw("Notify failed"));
    assert!(rig.indicator.saw_color(Color::YELLOW));
    assert!(rig.ctl.containers()[ContainerId::FIRST].door_open());
    assert!(rig.display.saw("is ready!"));
}

#[test]
fn servo_fault_is_absorbed_and_door_flag_unchanged() {
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset_for(ContainerId::FIRST, &[(8, 0)], 30)),
        ..Default::default()
    });
    rig.servos[0].set_failing(true);
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));
    assert!(rig.ctl.stats().actuator_faults >= 1);
    assert!(!rig.ctl.containers()[ContainerId::FIRST].door_open());
    assert!(rig.display.saw("Door 1 fault"));
    assert!(rig.indicator.saw_color(Color::YELLOW));

    // Confirm with every door shut retries the open.
    rig.servos[0].set_failing(false);
    rig.keys.push_script("A");
    rig.ctl.poll().unwrap();
    assert!(rig.ctl.containers()[ContainerId::FIRST].door_open());
    assert!(rig.display.saw("Opened"));
}

#[test]
fn missing_clock_halts_at_startup() {
    let mut rig = Rig::new(RigOpts {
        absent: true,
        ..Default::default()
    });
    let err = rig.ctl.start().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::ClockUnavailable(_))
    ));
    assert_eq!(rig.phase(), PhaseKind::Halted);
    assert!(rig.ctl.halt_reason().is_some());
    assert!(rig.display.saw("Couldn't find"));
    assert_eq!(rig.ctl.poll().unwrap(), PhaseKind::Halted);
}

#[test]
fn lost_power_requires_clock_entry() {
    let mut rig = Rig::new(RigOpts {
        lost_power: true,
        ..Default::default()
    });
    rig.ctl.start().unwrap();
    assert_eq!(rig.phase(), PhaseKind::SetClock);
    assert!(rig.display.saw("DDMMYYYYHHMMSS"));

    // 31 February is rejected, a cleared partial entry is discarded.
    rig.keys.push_script("31022026000000");
    for _ in 0..20 {
        rig.ctl.poll().unwrap();
    }
    assert_eq!(rig.phase(), PhaseKind::SetClock);
    assert!(rig.display.saw("Invalid date"));
    assert_eq!(rig.rtc.adjusted_to(), None);

    rig.keys.push_script("1403*14032026093000");
    assert!(rig.pump(30, |c| c.phase() == Some(PhaseKind::Welcome)));
    assert_eq!(rig.rtc.adjusted_to(), Some(at(9, 30, 0)));
}

#[test]
fn configure_reprompts_out_of_range_hour() {
    let mut rig = Rig::new(RigOpts::default());
    rig.ctl.start().unwrap();
    rig.keys
        .push_script("A 1 25 08 15 30  0 30  0 30  0 30  0 30");
    assert!(rig.pump(100, |c| c.phase() == Some(PhaseKind::Monitoring)));
    assert!(rig.display.saw("Invalid hour"));
    assert_eq!(
        rig.ctl.containers()[ContainerId::FIRST].schedule().doses(),
        &[DoseTime::new(8, 15).unwrap()]
    );
}

#[test]
fn poll_before_start_is_an_error() {
    let mut rig = Rig::new(RigOpts::default());
    let err = rig.ctl.poll().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::State(_))
    ));
}

#[test]
fn close_failure_at_timeout_keeps_dispensing_until_the_door_shuts() {
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset_for(ContainerId::FIRST, &[(8, 0)], 30)),
        ..Default::default()
    });
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));
    assert!(rig.ctl.containers()[ContainerId::FIRST].door_open());

    rig.servos[0].set_failing(true);
    assert!(rig.pump(100_000, |c| c.stats().actuator_faults >= 1));
    for _ in 0..3 {
        rig.ctl.poll().unwrap();
    }
    assert_eq!(rig.phase(), PhaseKind::Dispensing);
    let c1 = &rig.ctl.containers()[ContainerId::FIRST];
    assert!(c1.door_open());
    assert!(c1.is_ready());
    assert!(rig.display.saw("Door 1 fault"));
    assert!(rig.display.saw("Close failed"));
    assert!(rig.indicator.saw_color(Color::YELLOW));
    assert!(!rig.display.saw("Doors Closed"));

    rig.servos[0].set_failing(false);
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Monitoring)));
    let c1 = &rig.ctl.containers()[ContainerId::FIRST];
    assert!(!c1.door_open());
    assert!(!c1.is_ready());
    assert_eq!(rig.servos[0].angle(), 100);
    assert!(rig.display.saw("Doors Closed"));
}

#[test]
fn close_failure_on_confirm_is_retried() {
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset_for(ContainerId::FIRST, &[(8, 0)], 30)),
        ..Default::default()
    });
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));

    rig.servos[0].set_failing(true);
    rig.keys.push_script("A");
    rig.ctl.poll().unwrap();
    assert_eq!(rig.phase(), PhaseKind::Dispensing);
    assert!(rig.ctl.containers()[ContainerId::FIRST].door_open());
    assert!(rig.ctl.containers()[ContainerId::FIRST].is_ready());
    assert!(rig.display.saw("Close failed"));

    // Still failing: every retry is another counted fault.
    rig.ctl.poll().unwrap();
    assert_eq!(rig.phase(), PhaseKind::Dispensing);
    assert!(rig.ctl.stats().actuator_faults >= 2);
    assert!(!rig.display.saw("Doors Closed"));

    rig.servos[0].set_failing(false);
    rig.ctl.poll().unwrap();
    assert_eq!(rig.phase(), PhaseKind::Monitoring);
    assert!(!rig.ctl.containers()[ContainerId::FIRST].door_open());
    assert!(rig.display.saw("Doors Closed"));
}

#[test]
fn dose_due_during_another_window_is_counted_as_missed() {
    let mut preset = preset_for(ContainerId::FIRST, &[(8, 0)], 30);
    assert!(preset[1].schedule.push(DoseTime::new(8, 10).unwrap()));
    let mut rig = Rig::monitoring(RigOpts {
        start: at(7, 59, 50),
        preset: Some(preset),
        ..Default::default()
    });
    assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Dispensing)));

    rig.pump_until_wall(at(8, 15, 0));
    assert_eq!(rig.phase(), PhaseKind::Dispensing);
    assert_eq!(rig.ctl.stats().doses_missed, 1);
    assert_eq!(rig.ctl.stats().doses_triggered, 1);
    assert!(!rig.ctl.containers()[second()].is_ready());
    assert!(!rig.ctl.containers()[second()].door_open());
}
