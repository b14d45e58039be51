use super::*;
use shared::domain::{Medication, MedicationId};

fn med(id: &str, name: &str, times: &[&str]) -> Medication {
    Medication {
        id: MedicationId::from(id),
        name: name.to_string(),
        dose: "1 tab".to_string(),
        current_stock: 10,
        min_stock: 2,
        scheduled_times: times.iter().map(|t| t.to_string()).collect(),
        expiration_date: None,
        days_remaining: None,
    }
}

#[test]
fn tick_activates_first_due_unconfirmed_medication_in_cache_order() {
    let mut scheduler = AlarmScheduler::new();
    let meds = vec![
        med("a", "A", &["07:00"]),
        med("b", "B", &["09:00"]),
        med("c", "C", &["09:00"]),
    ];

    let triggered = scheduler.tick("09:00", &meds);
    assert_eq!(triggered, Some(MedicationId::from("b")));
    assert_eq!(scheduler.state(), &AlarmState::Active(MedicationId::from("b")));
}

#[test]
fn at_most_one_alarm_is_active_even_with_multiple_matches() {
    let mut scheduler = AlarmScheduler::new();
    let meds = vec![med("b", "B", &["09:00"]), med("c", "C", &["09:00"])];

    assert_eq!(scheduler.tick("09:00", &meds), Some(MedicationId::from("b")));
    // Still active: later ticks in the same minute do nothing.
    assert_eq!(scheduler.tick("09:00", &meds), None);
    assert_eq!(scheduler.state(), &AlarmState::Active(MedicationId::from("b")));
}

#[test]
fn remaining_matches_fire_on_later_ticks_after_confirmation() {
    let mut scheduler = AlarmScheduler::new();
    let meds = vec![med("b", "B", &["09:00"]), med("c", "C", &["09:00"])];

    assert_eq!(scheduler.tick("09:00", &meds), Some(MedicationId::from("b")));
    assert_eq!(scheduler.confirm(), Some(MedicationId::from("b")));
    assert_eq!(scheduler.tick("09:00", &meds), Some(MedicationId::from("c")));
    assert_eq!(scheduler.confirm(), Some(MedicationId::from("c")));
    // Both confirmed within the minute: nothing left to fire.
    assert_eq!(scheduler.tick("09:00", &meds), None);
    assert_eq!(scheduler.state(), &AlarmState::Idle);
}

#[test]
fn confirmed_ids_are_scoped_to_the_current_minute() {
    let mut scheduler = AlarmScheduler::new();
    let meds = vec![med("b", "B", &["09:00", "09:01"])];

    assert_eq!(scheduler.tick("09:00", &meds), Some(MedicationId::from("b")));
    scheduler.confirm();
    assert_eq!(scheduler.tick("09:00", &meds), None);

    // Minute rollover replaces the window, so the same id may fire again.
    assert_eq!(scheduler.tick("09:01", &meds), Some(MedicationId::from("b")));
}

#[test]
fn minute_rollover_clears_window_even_without_prior_alarm() {
    let mut scheduler = AlarmScheduler::new();
    let meds = vec![med("b", "B", &["09:01"])];

    assert_eq!(scheduler.tick("09:00", &meds), None);
    assert_eq!(scheduler.window().minute_key, "09:00");
    assert_eq!(scheduler.tick("09:01", &meds), Some(MedicationId::from("b")));
    assert_eq!(scheduler.window().minute_key, "09:01");
    assert!(scheduler.window().confirmed.is_empty());
}

#[test]
fn confirm_without_active_alarm_is_a_no_op() {
    let mut scheduler = AlarmScheduler::new();
    assert_eq!(scheduler.confirm(), None);
    assert_eq!(scheduler.state(), &AlarmState::Idle);
}

#[test]
fn reset_drops_state_and_window() {
    let mut scheduler = AlarmScheduler::new();
    let meds = vec![med("b", "B", &["09:00"])];
    scheduler.tick("09:00", &meds);
    scheduler.reset();
    assert_eq!(scheduler.state(), &AlarmState::Idle);
    assert!(scheduler.window().minute_key.is_empty());
    assert!(scheduler.window().confirmed.is_empty());
}
