//! End-to-end booking scenarios against an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use booking_engine::{
    BookingError, BookingOrchestrator, BookingRequest, CalendarCleanup, CalendarStatus, EngineConfig, ErrorKind,
    Refund, RequestContext, SlotResolver,
};
use calendar_sync::testing::RecordingProvider;
use calendar_sync::CalendarSync;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use database::models::{NewAvailabilityRule, NewUser};
use database::{availability, booking, calendar_account, user, wallet, BookingStatus, Database, DayOfWeek, Role};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

struct Harness {
    db: Database,
    engine: BookingOrchestrator,
    provider: Arc<RecordingProvider>,
    teacher_id: i64,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    async fn with_config(config: EngineConfig) -> Self {
        Self::with_database(Database::in_memory().await.unwrap(), config).await
    }

    /// Harness over a database file with a pool of several connections, so
    /// concurrent requests hold separate transactions and contend for
    /// SQLite's write lock. Keep the returned directory alive.
    async fn on_disk() -> (Self, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("lessons.db").display());
        let db = Database::connect_with_pool_size(&url, 8).await.unwrap();
        db.migrate().await.unwrap();
        (Self::with_database(db, EngineConfig::default()).await, dir)
    }

    async fn with_database(db: Database, config: EngineConfig) -> Self {
        let provider = Arc::new(RecordingProvider::new());
        let calendar = CalendarSync::new(db.clone(), provider.clone(), Duration::from_secs(1));
        let engine = BookingOrchestrator::new(db.clone(), calendar, config);

        // Teacher A: $50/hr, Monday 09:00-12:00.
        let teacher_id = create_user(&db, "teacher-a@example.com", Role::Teacher, Some(5000)).await;
        availability::create_rule(
            db.pool(),
            teacher_id,
            &NewAvailabilityRule {
                day_of_week: DayOfWeek::Monday,
                start_time: "09:00:00".parse().unwrap(),
                end_time: "12:00:00".parse().unwrap(),
            },
        )
        .await
        .unwrap();

        Self {
            db,
            engine,
            provider,
            teacher_id,
        }
    }

    /// A student holding `balance_cents` whose trial was already used.
    async fn paying_student(&self, email: &str, balance_cents: i64) -> i64 {
        let id = self.student(email, balance_cents).await;
        sqlx::query("UPDATE wallets SET trial_credits = 0, trial_used = 1 WHERE student_id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await
            .unwrap();
        id
    }

    /// A fresh student: one trial credit and `balance_cents`.
    async fn student(&self, email: &str, balance_cents: i64) -> i64 {
        let id = create_user(&self.db, email, Role::Student, None).await;
        let mut conn = self.db.pool().acquire().await.unwrap();
        wallet::ensure_wallet(&mut conn, id).await.unwrap();
        drop(conn);
        if balance_cents > 0 {
            wallet::apply_credit(self.db.pool(), id, balance_cents, &format!("seed:{}", id), "seed")
                .await
                .unwrap();
        }
        id
    }

    async fn book(&self, student_id: i64, start: &str, end: &str) -> Result<booking_engine::BookingOutcome, BookingError> {
        self.engine
            .book(
                &RequestContext::new(student_id, Role::Student, now()),
                &BookingRequest::new(self.teacher_id, "2025-01-06", start, end),
            )
            .await
    }

    async fn balance(&self, student_id: i64) -> i64 {
        wallet::get_wallet(self.db.pool(), student_id)
            .await
            .unwrap()
            .unwrap()
            .balance_cents
    }

    async fn live_bookings(&self) -> Vec<database::Booking> {
        let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        booking::live_bookings_between(self.db.pool(), self.teacher_id, monday, monday)
            .await
            .unwrap()
    }
}

async fn create_user(db: &Database, email: &str, role: Role, rate: Option<i64>) -> i64 {
    user::create_user(
        db.pool(),
        &NewUser {
            name: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            role,
            hourly_rate_cents: rate,
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn test_paid_booking_debits_wallet() {
    let h = Harness::new().await;
    let student_b = h.paying_student("b@example.com", 10_000).await;

    let outcome = h.book(student_b, "10:00", "11:00").await.unwrap();

    assert!(!outcome.trial);
    assert_eq!(outcome.cost_cents, 5000);
    assert_eq!(outcome.booking.status, BookingStatus::Scheduled);
    assert_eq!(outcome.calendar, CalendarStatus::NotConnected);
    assert_eq!(h.balance(student_b).await, 5000);

    let funding_id = outcome.booking.funding_transaction_id.unwrap();
    let funding = wallet::get_transaction(h.db.pool(), funding_id).await.unwrap();
    assert_eq!(funding.amount_cents, -5000);
    assert_eq!(funding.student_id, student_b);
    assert!(funding.reference.starts_with("lesson:"));

    assert_eq!(wallet::ledger_balance(h.db.pool(), student_b).await.unwrap(), 5000);
}

#[tokio::test]
async fn test_overlap_rejected_adjacent_accepted() {
    let h = Harness::new().await;
    let student_b = h.paying_student("b@example.com", 10_000).await;
    let student_c = h.paying_student("c@example.com", 10_000).await;

    h.book(student_b, "10:00", "11:00").await.unwrap();

    let overlapping = h.book(student_c, "10:30", "11:30").await;
    assert!(matches!(overlapping, Err(BookingError::SlotUnavailable)));
    assert_eq!(h.balance(student_c).await, 10_000);

    let adjacent = h.book(student_c, "11:00", "12:00").await.unwrap();
    assert_eq!(adjacent.booking.start_time.to_string(), "11:00:00");
    assert_eq!(h.balance(student_c).await, 5000);
}

#[tokio::test]
async fn test_insufficient_balance_reports_amounts() {
    let h = Harness::new().await;
    let student_d = h.paying_student("d@example.com", 1000).await;

    let result = h.book(student_d, "10:00", "11:00").await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Funding);
    match err {
        BookingError::InsufficientBalance {
            required_cents,
            available_cents,
        } => {
            assert_eq!(required_cents, 5000);
            assert_eq!(available_cents, 1000);
        }
        other => panic!("expected insufficient balance, got {:?}", other),
    }
    assert!(h.live_bookings().await.is_empty());
    assert_eq!(h.balance(student_d).await, 1000);
    assert_eq!(
        wallet::list_transactions(h.db.pool(), student_d, 10).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_outside_availability_is_conflict() {
    let h = Harness::new().await;
    let student = h.paying_student("b@example.com", 10_000).await;

    let result = h.book(student, "11:30", "12:30").await;
    assert!(matches!(result, Err(BookingError::SlotUnavailable)));

    let tuesday = h
        .engine
        .book(
            &RequestContext::new(student, Role::Student, now()),
            &BookingRequest::new(h.teacher_id, "2025-01-07", "10:00", "11:00"),
        )
        .await;
    assert!(matches!(tuesday, Err(BookingError::SlotUnavailable)));
    assert_eq!(h.balance(student).await, 10_000);
}

#[tokio::test]
async fn test_validation_before_any_work() {
    let h = Harness::new().await;
    let student = h.paying_student("b@example.com", 10_000).await;
    let ctx = RequestContext::new(student, Role::Student, now());

    let past = h
        .engine
        .book(&ctx, &BookingRequest::new(h.teacher_id, "2024-12-30", "10:00", "11:00"))
        .await;
    assert!(matches!(past, Err(BookingError::Validation(_))));

    let inverted = h
        .engine
        .book(&ctx, &BookingRequest::new(h.teacher_id, "2025-01-06", "11:00", "10:00"))
        .await;
    assert_eq!(inverted.unwrap_err().kind(), ErrorKind::Validation);

    let unknown = h
        .engine
        .book(&ctx, &BookingRequest::new(9999, "2025-01-06", "10:00", "11:00"))
        .await;
    assert!(matches!(unknown, Err(BookingError::TeacherNotFound(9999))));

    let as_student_id = h
        .engine
        .book(&ctx, &BookingRequest::new(student, "2025-01-06", "10:00", "11:00"))
        .await;
    assert!(matches!(as_student_id, Err(BookingError::TeacherNotFound(_))));

    let teacher_ctx = RequestContext::new(h.teacher_id, Role::Teacher, now());
    let by_teacher = h
        .engine
        .book(&teacher_ctx, &BookingRequest::new(h.teacher_id, "2025-01-06", "10:00", "11:00"))
        .await;
    assert!(matches!(by_teacher, Err(BookingError::Forbidden(_))));

    assert_eq!(h.balance(student).await, 10_000);
}

#[tokio::test]
async fn test_default_rate_when_teacher_has_none() {
    let h = Harness::with_config(EngineConfig {
        default_hourly_rate_cents: 3000,
        ..EngineConfig::default()
    })
    .await;
    user::set_hourly_rate(h.db.pool(), h.teacher_id, None).await.unwrap();
    let student = h.paying_student("b@example.com", 10_000).await;

    let outcome = h.book(student, "09:00", "09:30").await.unwrap();
    assert_eq!(outcome.cost_cents, 1500);
    assert_eq!(h.balance(student).await, 8500);
}

#[tokio::test]
async fn test_unpriceable_rate_rolls_back() {
    let h = Harness::new().await;
    user::set_hourly_rate(h.db.pool(), h.teacher_id, Some(i64::MAX))
        .await
        .unwrap();
    let student = h.paying_student("b@example.com", 10_000).await;

    let err = h.book(student, "10:00", "11:00").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.balance(student).await, 10_000);
    assert!(h.live_bookings().await.is_empty());
}

#[tokio::test]
async fn test_trial_used_once() {
    let h = Harness::new().await;
    let student = h.student("new@example.com", 0).await;

    let first = h.book(student, "09:00", "10:00").await.unwrap();
    assert!(first.trial);
    assert_eq!(first.cost_cents, 0);
    assert!(first.booking.is_trial);
    assert!(first.booking.funding_transaction_id.is_none());

    let wallet_after = wallet::get_wallet(h.db.pool(), student).await.unwrap().unwrap();
    assert_eq!(wallet_after.trial_credits, 0);
    assert!(wallet_after.trial_used);

    // No balance and no trial left.
    let second = h.book(student, "10:00", "11:00").await;
    assert!(matches!(
        second,
        Err(BookingError::InsufficientBalance {
            required_cents: 5000,
            available_cents: 0
        })
    ));

    wallet::apply_credit(h.db.pool(), student, 5000, "topup:1", "top up")
        .await
        .unwrap();
    let third = h.book(student, "10:00", "11:00").await.unwrap();
    assert!(!third.trial);
    assert!(third.booking.funding_transaction_id.is_some());
    assert_eq!(h.balance(student).await, 0);
}

async fn identical_requests_one_wins(h: Arc<Harness>) {
    let mut students = Vec::new();
    for i in 0..6 {
        students.push(h.paying_student(&format!("s{}@example.com", i), 10_000).await);
    }

    let attempts = students.iter().map(|&student| {
        let h = Arc::clone(&h);
        tokio::spawn(async move { (student, h.book(student, "10:00", "11:00").await) })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter(|(_, r)| r.is_ok()).collect();
    assert_eq!(winners.len(), 1);
    for (_, result) in results.iter().filter(|(_, r)| r.is_err()) {
        assert!(matches!(result, Err(BookingError::SlotUnavailable)));
    }

    assert_eq!(h.live_bookings().await.len(), 1);
    let winner = winners[0].0;
    for &(student, _) in &results {
        let expected = if student == winner { 5000 } else { 10_000 };
        assert_eq!(h.balance(student).await, expected);
    }
}

async fn debits_never_overspend(h: Arc<Harness>) {
    // Enough for exactly two of the three lessons.
    let student = h.paying_student("rich@example.com", 10_000).await;

    let slots = [("09:00", "10:00"), ("10:00", "11:00"), ("11:00", "12:00")];
    let attempts = slots.iter().map(|&(start, end)| {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.book(student, start, end).await })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(BookingError::InsufficientBalance { .. }))));
    assert_eq!(h.balance(student).await, 0);
    assert_eq!(wallet::ledger_balance(h.db.pool(), student).await.unwrap(), 0);
}

async fn no_overlapping_live_bookings(h: Arc<Harness>) {
    let mut students = Vec::new();
    for i in 0..8 {
        students.push(h.paying_student(&format!("p{}@example.com", i), 50_000).await);
    }

    // Deterministic spread of starts and lengths across the morning.
    let mut seed: u64 = 0x2545_f491;
    let mut requests = Vec::new();
    for i in 0..40 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let start_min = 9 * 60 + ((seed >> 33) % 10) as u32 * 15;
        let length = [30, 45, 60][((seed >> 17) % 3) as usize];
        let end_min = start_min + length;
        let fmt = |m: u32| format!("{:02}:{:02}", m / 60, m % 60);
        requests.push((students[i % students.len()], fmt(start_min), fmt(end_min)));
    }

    let attempts = requests.into_iter().map(|(student, start, end)| {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.book(student, &start, &end).await })
    });
    for result in futures::future::join_all(attempts).await {
        match result.unwrap() {
            Ok(_) | Err(BookingError::SlotUnavailable) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    let live = h.live_bookings().await;
    assert!(!live.is_empty());
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            assert!(
                !(a.start_time < b.end_time && b.start_time < a.end_time),
                "bookings {} and {} overlap",
                a.id,
                b.id
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_requests_one_wins() {
    identical_requests_one_wins(Arc::new(Harness::new().await)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overspend() {
    debits_never_overspend(Arc::new(Harness::new().await)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_overlapping_live_bookings() {
    no_overlapping_live_bookings(Arc::new(Harness::new().await)).await;
}

// The in-memory database has a single connection, which queues the
// transactions above. These run them against separate connections.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contended_identical_requests_one_wins() {
    let (h, _dir) = Harness::on_disk().await;
    identical_requests_one_wins(Arc::new(h)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contended_debits_never_overspend() {
    let (h, _dir) = Harness::on_disk().await;
    debits_never_overspend(Arc::new(h)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contended_overlapping_requests() {
    let (h, _dir) = Harness::on_disk().await;
    let h = Arc::new(h);
    let mut students = Vec::new();
    for i in 0..12 {
        students.push(h.paying_student(&format!("c{}@example.com", i), 10_000).await);
    }

    // Every request overlaps 10:00-10:30.
    let attempts = students.iter().enumerate().map(|(i, &student)| {
        let h = Arc::clone(&h);
        let (start, end) = if i % 2 == 0 { ("09:30", "10:30") } else { ("10:00", "11:00") };
        tokio::spawn(async move { (student, h.book(student, start, end).await) })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let mut spent = 0;
    for (_, result) in &results {
        match result {
            Ok(outcome) => spent += outcome.cost_cents,
            Err(BookingError::SlotUnavailable) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(results.iter().filter(|(_, r)| r.is_ok()).count(), 1);
    assert_eq!(h.live_bookings().await.len(), 1);

    let mut remaining = 0;
    for &(student, _) in &results {
        remaining += h.balance(student).await;
    }
    assert_eq!(remaining + spent, 12 * 10_000);
}

#[tokio::test]
async fn test_cancel_refunds_once_and_frees_slot() {
    let h = Harness::new().await;
    let student = h.paying_student("b@example.com", 10_000).await;
    let booked = h.book(student, "10:00", "11:00").await.unwrap();
    let ctx = RequestContext::new(student, Role::Student, now());

    let cancelled = h.engine.cancel(&ctx, booked.booking.id).await.unwrap();
    assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
    assert!(matches!(cancelled.refund, Refund::Credited { amount_cents: 5000, .. }));
    assert_eq!(cancelled.calendar, CalendarCleanup::NothingToRemove);
    assert_eq!(h.balance(student).await, 10_000);

    let again = h.engine.cancel(&ctx, booked.booking.id).await;
    assert!(matches!(again, Err(BookingError::NotScheduled(_))));

    // Refund is keyed by booking, so a repeated compensation is a no-op.
    assert_eq!(h.engine.refund(&cancelled.booking).await, Refund::AlreadyRefunded);
    assert_eq!(h.balance(student).await, 10_000);

    h.book(student, "10:00", "11:00").await.unwrap();
}

#[tokio::test]
async fn test_cancel_trial_restores_credit() {
    let h = Harness::new().await;
    let student = h.student("new@example.com", 0).await;
    let booked = h.book(student, "10:00", "11:00").await.unwrap();
    assert!(booked.trial);

    let teacher_ctx = RequestContext::new(h.teacher_id, Role::Teacher, now());
    let cancelled = h.engine.cancel(&teacher_ctx, booked.booking.id).await.unwrap();
    assert_eq!(cancelled.refund, Refund::TrialRestored);

    let wallet_after = wallet::get_wallet(h.db.pool(), student).await.unwrap().unwrap();
    assert_eq!(wallet_after.trial_credits, 1);
    assert!(!wallet_after.trial_used);

    assert!(h.book(student, "10:00", "11:00").await.unwrap().trial);
}

#[tokio::test]
async fn test_cancel_requires_participant() {
    let h = Harness::new().await;
    let student = h.paying_student("b@example.com", 10_000).await;
    let other = h.paying_student("other@example.com", 10_000).await;
    let booked = h.book(student, "10:00", "11:00").await.unwrap();

    let result = h
        .engine
        .cancel(&RequestContext::new(other, Role::Student, now()), booked.booking.id)
        .await;
    assert!(matches!(result, Err(BookingError::Forbidden(_))));

    let missing = h
        .engine
        .cancel(&RequestContext::new(student, Role::Student, now()), 4242)
        .await;
    assert!(matches!(missing, Err(BookingError::NotFound(4242))));
}

#[tokio::test]
async fn test_completion() {
    let h = Harness::new().await;
    let student = h.paying_student("b@example.com", 20_000).await;
    let early = h.book(student, "09:00", "10:00").await.unwrap();
    let late = h.book(student, "11:00", "12:00").await.unwrap();

    let teacher_before = RequestContext::new(h.teacher_id, Role::Teacher, now());
    let result = h.engine.complete(&teacher_before, early.booking.id).await;
    assert!(matches!(result, Err(BookingError::Validation(_))));

    let during_second = NaiveDate::from_ymd_opt(2025, 1, 6)
        .unwrap()
        .and_hms_opt(11, 15, 0)
        .unwrap();
    let student_ctx = RequestContext::new(student, Role::Student, during_second);
    let result = h.engine.complete(&student_ctx, late.booking.id).await;
    assert!(matches!(result, Err(BookingError::Forbidden(_))));

    assert_eq!(h.engine.complete_elapsed(during_second).await.unwrap(), 1);
    let stored = booking::get_booking(h.db.pool(), early.booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Completed);

    let teacher_ctx = RequestContext::new(h.teacher_id, Role::Teacher, during_second);
    let completed = h.engine.complete(&teacher_ctx, late.booking.id).await.unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);

    // Completed lessons still hold their slot.
    let other = h.paying_student("c@example.com", 10_000).await;
    assert!(matches!(
        h.book(other, "09:00", "10:00").await,
        Err(BookingError::SlotUnavailable)
    ));
}

async fn connect_calendar(db: &Database, user_id: i64) {
    calendar_account::save_tokens(
        db.pool(),
        user_id,
        "access",
        "refresh",
        Utc::now() + chrono::Duration::hours(1),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_calendar_synced_after_commit() {
    let h = Harness::new().await;
    let student = h.paying_student("b@example.com", 10_000).await;
    connect_calendar(&h.db, h.teacher_id).await;
    connect_calendar(&h.db, student).await;

    let outcome = h.book(student, "10:00", "11:00").await.unwrap();
    let event_id = outcome.calendar_event_id().unwrap().to_string();

    let stored = booking::get_booking(h.db.pool(), outcome.booking.id).await.unwrap();
    assert_eq!(stored.teacher_calendar_event_id.as_deref(), Some(event_id.as_str()));
    assert!(stored.student_calendar_event_id.is_some());
    assert_eq!(h.provider.recorded().created.len(), 2);

    let cancelled = h
        .engine
        .cancel(&RequestContext::new(student, Role::Student, now()), outcome.booking.id)
        .await
        .unwrap();
    assert_eq!(cancelled.calendar, CalendarCleanup::Removed { events: 2 });
}

#[tokio::test]
async fn test_calendar_failure_does_not_fail_booking() {
    let h = Harness::new().await;
    let student = h.paying_student("b@example.com", 10_000).await;
    connect_calendar(&h.db, h.teacher_id).await;
    h.provider.fail_events(true);

    let outcome = h.book(student, "10:00", "11:00").await.unwrap();
    assert_eq!(outcome.calendar, CalendarStatus::Failed);
    assert!(outcome.calendar_event_id().is_none());
    assert_eq!(h.balance(student).await, 5000);
}

#[tokio::test]
async fn test_slow_calendar_reports_pending() {
    let h = Harness::with_config(EngineConfig {
        calendar_wait: Duration::from_millis(50),
        ..EngineConfig::default()
    })
    .await;
    let student = h.paying_student("b@example.com", 10_000).await;
    connect_calendar(&h.db, h.teacher_id).await;
    h.provider.delay(Some(Duration::from_millis(300)));

    let outcome = h.book(student, "10:00", "11:00").await.unwrap();
    assert_eq!(outcome.calendar, CalendarStatus::Pending);
    assert_eq!(h.live_bookings().await.len(), 1);

    // The detached task still finishes and stores the event id.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let stored = booking::get_booking(h.db.pool(), outcome.booking.id).await.unwrap();
    assert!(stored.teacher_calendar_event_id.is_some());
}

#[tokio::test]
async fn test_cancel_while_calendar_pending_removes_event() {
    let h = Harness::with_config(EngineConfig {
        calendar_wait: Duration::from_millis(50),
        ..EngineConfig::default()
    })
    .await;
    let student = h.paying_student("b@example.com", 10_000).await;
    connect_calendar(&h.db, h.teacher_id).await;
    h.provider.delay(Some(Duration::from_millis(300)));

    let outcome = h.book(student, "10:00", "11:00").await.unwrap();
    assert_eq!(outcome.calendar, CalendarStatus::Pending);

    let cancelled = h
        .engine
        .cancel(&RequestContext::new(student, Role::Student, now()), outcome.booking.id)
        .await
        .unwrap();
    assert_eq!(cancelled.calendar, CalendarCleanup::NothingToRemove);

    // The sync task creates the event after the cancel, then removes it.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let recorded = h.provider.recorded();
    assert_eq!(recorded.created.len(), 1);
    assert_eq!(recorded.deleted, vec![recorded.created[0].1.clone()]);

    let stored = booking::get_booking(h.db.pool(), outcome.booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert!(stored.teacher_calendar_event_id.is_none());
}

#[tokio::test]
async fn test_resolver_views_match_commits() {
    let h = Harness::new().await;
    let student = h.paying_student("b@example.com", 10_000).await;
    h.book(student, "10:00", "11:00").await.unwrap();

    let resolver = SlotResolver::new(h.db.clone());
    let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();

    let day = resolver.day_view(h.teacher_id, monday).await.unwrap();
    assert_eq!(day.slots.len(), 3);
    assert_eq!(day.slots.iter().filter(|s| s.is_free()).count(), 2);

    let candidates = resolver.candidates(h.teacher_id, monday, 60).await.unwrap();
    let starts: Vec<String> = candidates.iter().map(|c| c.start.format("%H:%M").to_string()).collect();
    assert_eq!(starts, vec!["09:00", "11:00"]);

    let week = resolver
        .range_view(h.teacher_id, monday, monday + chrono::Duration::days(6))
        .await
        .unwrap();
    assert_eq!(week.len(), 7);
    assert_eq!(week.iter().filter(|d| !d.slots.is_empty()).count(), 1);

    let too_long = resolver
        .range_view(h.teacher_id, monday, monday + chrono::Duration::days(31))
        .await;
    assert!(matches!(too_long, Err(BookingError::Validation(_))));
}
