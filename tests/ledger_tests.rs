//! Ledger behavior across window boundaries, concurrency and persistence.

use std::sync::Arc;

use assistant_orchestrator::budget::{
    BudgetLimit, JsonFileStore, ManualClock, UsageLedger, UsageStore, WindowKind,
};
use assistant_orchestrator::config::{BudgetSettings, MemoryConfigProvider};
use assistant_orchestrator::{HealthLevel, Orchestrator};
use chrono::{TimeDelta, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn clock_at(y: i32, m: u32, d: u32, h: u32) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()))
}

fn ledger_with_all_windows(clock: Arc<ManualClock>) -> UsageLedger {
    UsageLedger::with_clock(clock).with_limits([(
        "openai",
        vec![
            BudgetLimit::daily(dec!(1.00)),
            BudgetLimit::weekly(dec!(6.00)),
            BudgetLimit::monthly(dec!(25.00)),
        ],
    )])
}

#[test]
fn test_inclusive_boundary() {
    let ledger = UsageLedger::new().with_limits([("openai", vec![BudgetLimit::daily(dec!(10.00))])]);
    ledger.record_usage("openai", dec!(9.50), "gpt-4o");

    tokio_test::assert_ok!(ledger.can_afford("openai", dec!(0.50)));
    let violation = tokio_test::assert_err!(ledger.can_afford("openai", dec!(0.51)));
    assert_eq!(violation.kind, WindowKind::Daily);
    assert_eq!(violation.limit, dec!(10.00));
    assert_eq!(violation.accumulated, dec!(9.50));
    assert!(violation.to_string().contains("daily"));
}

#[test]
fn test_unlimited_service_always_affordable() {
    let ledger = UsageLedger::new();
    ledger.record_usage("ollama", dec!(1000), "llama3");
    assert!(ledger.can_afford("ollama", dec!(1_000_000)).is_ok());
    assert!(ledger.status("ollama").is_none());
}

#[test]
fn test_day_rollover_keeps_week_and_month() {
    // Wednesday
    let clock = clock_at(2024, 3, 13, 22);
    let ledger = ledger_with_all_windows(clock.clone());
    ledger.record_usage("openai", dec!(0.80), "gpt-4o");

    clock.advance(TimeDelta::hours(3));
    assert_eq!(ledger.accumulated("openai", WindowKind::Daily), Decimal::ZERO);
    assert_eq!(ledger.accumulated("openai", WindowKind::Weekly), dec!(0.80));
    assert_eq!(ledger.accumulated("openai", WindowKind::Monthly), dec!(0.80));
    assert!(ledger.can_afford("openai", dec!(1.00)).is_ok());
}

#[test]
fn test_week_rollover_on_monday() {
    // Sunday evening
    let clock = clock_at(2024, 3, 17, 20);
    let ledger = ledger_with_all_windows(clock.clone());
    ledger.record_usage("openai", dec!(0.50), "gpt-4o");

    clock.advance(TimeDelta::hours(5));
    let status = ledger.status("openai").unwrap();
    let weekly = status.window(WindowKind::Weekly).unwrap();
    assert_eq!(weekly.accumulated, Decimal::ZERO);
    assert_eq!(weekly.period_start, Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap());
    assert_eq!(status.window(WindowKind::Monthly).unwrap().accumulated, dec!(0.50));
}

#[test]
fn test_month_rollover() {
    let clock = clock_at(2024, 2, 29, 23);
    let ledger = ledger_with_all_windows(clock.clone());
    ledger.record_usage("openai", dec!(0.90), "gpt-4o");
    assert_eq!(ledger.status("openai").unwrap().health(), HealthLevel::Critical);

    clock.advance(TimeDelta::hours(2));
    assert_eq!(ledger.accumulated("openai", WindowKind::Monthly), Decimal::ZERO);
    assert_eq!(ledger.status("openai").unwrap().health(), HealthLevel::Healthy);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_across_tasks() {
    let ledger = Arc::new(ledger_with_all_windows(clock_at(2024, 3, 13, 12)));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                for _ in 0..100 {
                    ledger.record_usage("openai", dec!(0.0001), "gpt-4o-mini");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    for kind in WindowKind::ALL {
        assert_eq!(ledger.accumulated("openai", kind), dec!(0.16));
    }
    assert_eq!(ledger.records(Some("openai")).len(), 1600);
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path().join("usage.json"));
    let clock = clock_at(2024, 3, 13, 12);

    let first = Orchestrator::builder()
        .clock(clock.clone())
        .budget_settings(BudgetSettings::default())
        .build()
        .unwrap();
    first.ledger().record_usage("claude", dec!(0.30), "claude-3-haiku");
    first.flush(&store).await.unwrap();

    let second = Orchestrator::builder()
        .clock(clock.clone())
        .budget_settings(BudgetSettings::default())
        .build()
        .unwrap();
    assert!(second.restore(&store).await.unwrap());
    assert_eq!(second.ledger().accumulated("claude", WindowKind::Daily), dec!(0.30));
    assert_eq!(second.ledger().records(Some("claude")).len(), 1);
    assert!(second.ledger().can_afford("claude", dec!(0.45)).is_ok());
    assert!(second.ledger().can_afford("claude", dec!(0.46)).is_err());

    // a day later the restored daily window is stale
    clock.advance(TimeDelta::days(1));
    assert_eq!(second.ledger().accumulated("claude", WindowKind::Daily), Decimal::ZERO);
    assert_eq!(second.ledger().accumulated("claude", WindowKind::Monthly), dec!(0.30));
}

#[tokio::test]
async fn test_restore_from_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path().join("missing.json"));
    let orchestrator = Orchestrator::builder().build().unwrap();
    assert!(!orchestrator.restore(&store).await.unwrap());
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_corrupt_store_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("usage.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let err = JsonFileStore::new(path).load().await.unwrap_err();
    assert!(matches!(err, assistant_orchestrator::Error::Store(_)));
}

#[tokio::test]
async fn test_limits_from_config() {
    let config = MemoryConfigProvider::new()
        .value("budget.elevenlabs.daily", "0.10")
        .value("budget.local.monthly", "0");
    let orchestrator = Orchestrator::builder()
        .configure(&config)
        .await
        .unwrap()
        .build()
        .unwrap();

    let ledger = orchestrator.ledger();
    assert!(ledger.can_afford("elevenlabs", dec!(0.10)).is_ok());
    assert!(ledger.can_afford("elevenlabs", dec!(0.11)).is_err());
    assert!(ledger.can_afford("local", Decimal::ZERO).is_ok());
    assert!(ledger.can_afford("local", dec!(0.0001)).is_err());
    assert_eq!(
        orchestrator.get_budget_status(None).keys().collect::<Vec<_>>(),
        vec!["claude", "elevenlabs", "local", "openai"]
    );
}
