//! Unit tests for cron schedules and job actions

use chrono::{Duration, TimeZone, Utc};
use styleset_agent::agent::RunRequest;
use styleset_agent::models::CronJob;
use styleset_agent::scheduler::{CustomSlide, GenerateSetAction, JobAction, Schedule, SlideSource};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

#[test]
fn test_parse_legacy_strings() {
    assert_eq!(Schedule::parse("daily"), Schedule::Daily);
    assert_eq!(Schedule::parse("0 0 * * *"), Schedule::Daily);
    assert_eq!(Schedule::parse("hourly"), Schedule::Hourly);
    assert_eq!(Schedule::parse("0 * * * *"), Schedule::Hourly);
    assert_eq!(Schedule::parse("*/15 * * * *"), Schedule::EveryMinutes(15));
    assert_eq!(Schedule::parse("*/0 * * * *"), Schedule::Hourly);
    assert_eq!(Schedule::parse("30 9 * * 1"), Schedule::Hourly);
}

#[test]
fn test_is_due() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let schedule = Schedule::EveryMinutes(30);

    assert!(schedule.is_due(None, now));
    assert!(!schedule.is_due(Some(now - Duration::minutes(29)), now));
    assert!(schedule.is_due(Some(now - Duration::minutes(30)), now));
    assert!(!Schedule::Daily.is_due(Some(now - Duration::hours(23)), now));
}

#[test]
fn test_cron_job_json_shape() {
    let subject_id = Uuid::new_v4();
    let job = CronJob::new(
        "nightly",
        Schedule::Daily,
        JobAction::DailyRun(RunRequest {
            subject_id: Some(subject_id),
            sets_per_day: Some(3),
            ..Default::default()
        }),
    );

    let value = serde_json::to_value(&job).unwrap();
    assert_eq!(value["schedule"], "daily");
    assert_eq!(value["action"]["type"], "daily_run");
    assert_eq!(value["action"]["setsPerDay"], 3);

    let parsed: CronJob = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.action, job.action);
}

#[test]
fn test_legacy_schedule_string_loads() {
    let json = serde_json::json!({
        "type": "generate_set",
        "subjectId": Uuid::new_v4(),
        "slides": { "custom": [{ "prompt": "bob cut" }] },
    });
    let action: JobAction = serde_json::from_value(json).unwrap();
    assert_ok!(action.validate());

    let schedule: Schedule = serde_json::from_value(serde_json::json!("*/5 * * * *")).unwrap();
    assert_eq!(schedule, Schedule::EveryMinutes(5));
}

#[test]
fn test_empty_slide_source_rejected() {
    let action = JobAction::GenerateSet(GenerateSetAction {
        subject_id: Uuid::new_v4(),
        template_id: None,
        slides: SlideSource::PresetIds(Vec::new()),
        naming_pattern: None,
    });
    assert_err!(action.validate());

    let blank = JobAction::GenerateSet(GenerateSetAction {
        subject_id: Uuid::new_v4(),
        template_id: None,
        slides: SlideSource::Custom(vec![CustomSlide {
            prompt: "  ".to_string(),
            negative_prompt: None,
        }]),
        naming_pattern: None,
    });
    assert_err!(blank.validate());
}

#[test]
fn test_set_name_pattern() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 7, 5, 9).unwrap();
    let mut action = GenerateSetAction {
        subject_id: Uuid::new_v4(),
        template_id: None,
        slides: SlideSource::PresetIds(vec![Uuid::new_v4()]),
        naming_pattern: None,
    };
    assert_eq!(action.set_name(now), "Auto set 2024-06-01");

    action.naming_pattern = Some("Drop {date} {time}".to_string());
    assert_eq!(action.set_name(now), "Drop 2024-06-01 07:05:09");
}
