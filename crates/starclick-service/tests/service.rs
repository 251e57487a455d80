//! Integration tests for the economy service on in-memory storage.
//!
//! Storage failures are injected with thin wrappers around
//! [`MemoryStore`] that implement the same storage traits.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::panic
)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::task::JoinSet;
use tokio::time::Instant;

use starclick_core::{EconomyConfig, EconomyError, EffectCatalog, GuardPolicy, ManualClock};
use starclick_db::{
    DbError, GatewayError, LedgerRecorder, MemoryStore, PersistenceGateway, PlayerSnapshot,
};
use starclick_ledger::ReconciliationResult;
use starclick_service::{EconomyService, ServiceError};
use starclick_types::{
    Command, CommandOutcome, ItemId, LedgerEntry, LedgerEntryType, LedgerQuery, PlayerId,
    ResourceState,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

type MemoryService<G = MemoryStore, L = MemoryStore> = EconomyService<G, L, ManualClock>;

fn build<G, L>(config: EconomyConfig, gateway: G, ledger: L) -> (MemoryService<G, L>, ManualClock)
where
    G: PersistenceGateway,
    L: LedgerRecorder,
{
    let clock = ManualClock::new(t0());
    let service = EconomyService::new(
        Arc::new(EffectCatalog::standard()),
        Arc::new(config),
        gateway,
        ledger,
        clock.clone(),
    );
    (service, clock)
}

fn memory_service(config: EconomyConfig) -> (MemoryService, MemoryStore, ManualClock) {
    let store = MemoryStore::new();
    let (service, clock) = build(config, store.clone(), store.clone());
    (service, store, clock)
}

fn later(millis: u64) -> Instant {
    Instant::now()
        .checked_add(Duration::from_millis(millis))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Failure-injecting storage
// ---------------------------------------------------------------------------

/// Reports a version conflict for the next `conflicts` saves.
#[derive(Clone)]
struct ConflictingGateway {
    inner: MemoryStore,
    conflicts: Arc<AtomicU32>,
}

impl PersistenceGateway for ConflictingGateway {
    async fn load(&self, player_id: PlayerId) -> Result<Option<PlayerSnapshot>, GatewayError> {
        self.inner.load(player_id).await
    }

    async fn save(
        &self,
        state: &ResourceState,
        pending: &[LedgerEntry],
        expected_version: u64,
    ) -> Result<u64, GatewayError> {
        let injected = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(GatewayError::VersionConflict {
                player_id: state.player_id,
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner.save(state, pending, expected_version).await
    }
}

/// Fails every append while `down` is set.
#[derive(Clone)]
struct FlakyLedger {
    inner: MemoryStore,
    down: Arc<AtomicBool>,
}

impl LedgerRecorder for FlakyLedger {
    async fn append(&self, entries: &[LedgerEntry]) -> Result<usize, GatewayError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(GatewayError::Backend(DbError::Config(
                "ledger offline".to_owned(),
            )));
        }
        self.inner.append(entries).await
    }

    async fn page(
        &self,
        player_id: PlayerId,
        query: &LedgerQuery,
    ) -> Result<Vec<LedgerEntry>, GatewayError> {
        self.inner.page(player_id, query).await
    }

    async fn entries(&self, player_id: PlayerId) -> Result<Vec<LedgerEntry>, GatewayError> {
        self.inner.entries(player_id).await
    }
}

// ---------------------------------------------------------------------------
// Registration and basic commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_then_click_keeps_ledger_balanced() {
    let (service, store, _) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();

    let registered = service.register(player).await.unwrap();
    assert_eq!(registered.outcome, 1000);
    assert_eq!(registered.state.version, 1);

    let clicked = service.click(player).await.unwrap();
    assert_eq!(clicked.state.total_clicks, 1);
    assert_eq!(clicked.state.version, 2);

    let stored = store.load(player).await.unwrap().unwrap();
    assert_eq!(stored.state, clicked.state);
    assert_eq!(
        service.audit(player).await.unwrap(),
        ReconciliationResult::Balanced
    );
}

#[tokio::test]
async fn second_registration_is_rejected() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    let err = service.register(player).await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyRegistered { .. }));
    assert_eq!(err.code(), "ALREADY_REGISTERED");
}

#[tokio::test]
async fn unknown_player_is_not_found() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let err = service.click(PlayerId::new()).await.unwrap_err();
    assert_eq!(err.code(), "PLAYER_NOT_FOUND");
}

#[tokio::test]
async fn dispatch_routes_every_command_kind() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();

    let registered = service.dispatch(player, &Command::Register).await.unwrap();
    assert_eq!(
        registered.outcome,
        CommandOutcome::Registered { stars: 1000 }
    );

    let bought = service
        .dispatch(
            player,
            &Command::Purchase {
                item_id: ItemId::from("basic_click"),
                quantity: 1,
            },
        )
        .await
        .unwrap();
    assert!(matches!(bought.outcome, CommandOutcome::Purchase(_)));
    assert_eq!(bought.state.click_power, 2);

    let daily = service
        .dispatch(player, &Command::DailyReward)
        .await
        .unwrap();
    assert!(matches!(daily.outcome, CommandOutcome::DailyReward(_)));
}

#[tokio::test]
async fn stocked_booster_is_used_through_the_service() {
    let (service, _, clock) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();
    let booster = ItemId::from("booster_2x_1h");
    service.register(player).await.unwrap();
    service.purchase(player, &booster, 2).await.unwrap();

    let busy = service.use_item(player, &booster).await.unwrap_err();
    assert_eq!(busy.code(), "BOOSTER_ALREADY_ACTIVE");

    clock.advance(chrono::Duration::hours(1));
    let used = service
        .dispatch(
            player,
            &Command::UseItem {
                item_id: booster.clone(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(used.outcome, CommandOutcome::ItemUsed(_)));
    let stored = service.state(player).await.unwrap();
    assert_eq!(stored.inventory_count(&booster), 0);
    assert_eq!(stored.active_boosters.len(), 1);
}

#[tokio::test]
async fn engine_rejection_writes_nothing() {
    let (service, store, _) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    let err = service
        .purchase(player, &ItemId::from("galactic_click"), 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Economy(EconomyError::PrerequisiteNotMet { .. })
    ));

    let stored = store.load(player).await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.state.stars, 1000);
}

#[tokio::test]
async fn banned_player_cannot_click() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();
    service.register(player).await.unwrap();
    service.set_banned(player, true).await.unwrap();

    let err = service.click(player).await.unwrap_err();
    assert_eq!(err.code(), "BANNED");

    service.set_banned(player, false).await.unwrap();
    assert!(service.click(player).await.is_ok());
}

#[tokio::test]
async fn offline_income_uses_the_service_clock() {
    let (service, _, clock) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    clock.advance(chrono::Duration::hours(2));
    let offline = service.reconcile_offline(player).await.unwrap();
    assert_eq!(offline.outcome.elapsed_seconds, 7200);
    assert_eq!(offline.outcome.passive_income, 36_000);
}

#[tokio::test]
async fn referral_credits_the_referrer_once() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let referrer = PlayerId::new();
    let referred = PlayerId::new();
    service.register(referrer).await.unwrap();
    service.register(referred).await.unwrap();

    let first = service.record_referral(referrer, referred).await.unwrap();
    assert_eq!(first.outcome.reward, 1000);
    let marked = service.state(referred).await.unwrap();
    assert_eq!(marked.referred_by, Some(referrer));
    assert_eq!(marked.stars, 1000);

    let err = service
        .record_referral(referrer, referred)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ALREADY_REFERRED");
}

#[tokio::test]
async fn referral_of_unregistered_player_is_rejected() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let referrer = PlayerId::new();
    service.register(referrer).await.unwrap();

    for _ in 0..5 {
        let err = service
            .record_referral(referrer, PlayerId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PlayerNotFound { .. }));
    }
    let state = service.state(referrer).await.unwrap();
    assert_eq!(state.stars, 1000);
    assert!(state.referrals.is_empty());
}

#[tokio::test]
async fn a_player_can_be_referred_only_once() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let (a, b, referred) = (PlayerId::new(), PlayerId::new(), PlayerId::new());
    for player in [a, b, referred] {
        service.register(player).await.unwrap();
    }

    service.record_referral(a, referred).await.unwrap();
    let err = service
        .dispatch(b, &Command::Referral { referred })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Economy(EconomyError::AlreadyReferred { .. })
    ));
    assert_eq!(service.state(b).await.unwrap().stars, 1000);
    assert_eq!(service.state(referred).await.unwrap().referred_by, Some(a));
}

#[tokio::test]
async fn committed_commands_stamp_last_save() {
    let (service, _, clock) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    clock.advance(chrono::Duration::hours(5));
    let clicked = service.click(player).await.unwrap();
    let stored = service.state(player).await.unwrap();
    assert_eq!(stored.last_save, t0() + chrono::Duration::hours(5));
    assert_eq!(stored.last_save, clicked.state.last_active_at);
    assert_eq!(stored.version, 2);
}

// ---------------------------------------------------------------------------
// Ledger queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ledger_pages_and_summary() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let player = PlayerId::new();
    service.register(player).await.unwrap();
    service.admin_remove(player, 100, "chargeback").await.unwrap();

    let page = service
        .get_ledger(player, &LedgerQuery::default())
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].entry_type, LedgerEntryType::AdminRemove);
    assert_eq!(page[0].reason, "chargeback");
    assert_eq!(page[1].entry_type, LedgerEntryType::Opening);

    let summary = service.balance_summary(player).await.unwrap();
    assert_eq!(summary.total_income, 1000);
    assert_eq!(summary.total_expenses, 100);
    assert_eq!(summary.current_balance, 900);
    assert_eq!(summary.entry_count, 2);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clicks_for_one_player_are_serialized() {
    let (service, store, _) = memory_service(EconomyConfig::default());
    let service = Arc::new(service);
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..20 {
        let service = Arc::clone(&service);
        tasks.spawn(async move { service.click(player).await.map(|t| t.outcome) });
    }
    while let Some(joined) = tasks.join_next().await {
        assert!(joined.unwrap().is_ok());
    }

    let state = service.state(player).await.unwrap();
    assert_eq!(state.total_clicks, 20);
    assert_eq!(state.energy, 80);

    let entries = store.entries(player).await.unwrap();
    let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    let expected: Vec<u64> = (1..=state.ledger_sequence).collect();
    assert_eq!(sequences, expected);
    assert!(service.audit(player).await.unwrap().is_balanced());
    assert_eq!(service.guard().active_players(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_players_do_not_contend() {
    let (service, _, _) = memory_service(EconomyConfig::default());
    let service = Arc::new(service);
    let players: Vec<PlayerId> = (0..8).map(|_| PlayerId::new()).collect();

    let mut tasks = JoinSet::new();
    for player in players.iter().copied() {
        let service = Arc::clone(&service);
        tasks.spawn(async move {
            service.register(player).await?;
            service.click(player).await?;
            service.click(player).await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        assert!(joined.unwrap().is_ok());
    }
    for player in players {
        assert_eq!(service.state(player).await.unwrap().total_clicks, 2);
    }
}

#[tokio::test]
async fn queued_command_times_out_behind_a_held_lease() {
    let mut config = EconomyConfig::default();
    config.service.command_deadline_ms = 30;
    let (service, store, _) = memory_service(config);
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    let lease = service.guard().acquire(player, later(1000)).await.unwrap();
    let err = service.click(player).await.unwrap_err();
    assert!(matches!(err, ServiceError::Timeout { .. }));
    assert_eq!(store.load(player).await.unwrap().unwrap().version, 1);

    drop(lease);
    assert!(service.click(player).await.is_ok());
}

#[tokio::test]
async fn reject_policy_reports_busy() {
    let mut config = EconomyConfig::default();
    config.service.guard_policy = GuardPolicy::Reject;
    let (service, _, _) = memory_service(config);
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    let _lease = service.guard().acquire(player, later(1000)).await.unwrap();
    let err = service.click(player).await.unwrap_err();
    assert_eq!(err.code(), "BUSY");
}

// ---------------------------------------------------------------------------
// Version conflicts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_conflicts_are_retried() {
    let store = MemoryStore::new();
    let conflicts = Arc::new(AtomicU32::new(0));
    let gateway = ConflictingGateway {
        inner: store.clone(),
        conflicts: Arc::clone(&conflicts),
    };
    let (service, _) = build(EconomyConfig::default(), gateway, store.clone());
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    conflicts.store(2, Ordering::SeqCst);
    let clicked = service.click(player).await.unwrap();
    assert_eq!(clicked.state.total_clicks, 1);
    assert_eq!(conflicts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn persistent_conflicts_surface_after_bounded_retries() {
    let store = MemoryStore::new();
    let conflicts = Arc::new(AtomicU32::new(0));
    let gateway = ConflictingGateway {
        inner: store.clone(),
        conflicts: Arc::clone(&conflicts),
    };
    let (service, _) = build(EconomyConfig::default(), gateway, store.clone());
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    conflicts.store(100, Ordering::SeqCst);
    let err = service.click(player).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { attempts: 4, .. }));
    assert_eq!(conflicts.load(Ordering::SeqCst), 96);

    let stored = store.load(player).await.unwrap().unwrap();
    assert_eq!(stored.state.total_clicks, 0);
    assert_eq!(stored.state.stars, 1000);
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_append_is_flushed_before_the_next_read() {
    let store = MemoryStore::new();
    let down = Arc::new(AtomicBool::new(false));
    let ledger = FlakyLedger {
        inner: store.clone(),
        down: Arc::clone(&down),
    };
    let (service, _) = build(EconomyConfig::default(), store.clone(), ledger);
    let player = PlayerId::new();
    service.register(player).await.unwrap();

    down.store(true, Ordering::SeqCst);
    let err = service.click(player).await.unwrap_err();
    assert_eq!(err.code(), "LEDGER_UNAVAILABLE");
    assert_eq!(err.body().message, "ledger temporarily unavailable");

    // The state was saved with its entries in the outbox.
    let stored = store.load(player).await.unwrap().unwrap();
    assert_eq!(stored.state.total_clicks, 1);
    assert!(!stored.pending_ledger.is_empty());
    assert_eq!(store.entries(player).await.unwrap().len(), 1);

    // While the ledger is down, no further command runs.
    let blocked = service.click(player).await.unwrap_err();
    assert_eq!(blocked.code(), "LEDGER_UNAVAILABLE");
    let stored = store.load(player).await.unwrap().unwrap();
    assert_eq!(stored.state.total_clicks, 1);

    down.store(false, Ordering::SeqCst);
    let entries = service
        .get_ledger(player, &LedgerQuery::default())
        .await
        .unwrap();
    assert_eq!(
        u64::try_from(entries.len()).unwrap(),
        stored.state.ledger_sequence
    );
    assert!(service.audit(player).await.unwrap().is_balanced());
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

async fn scripted_crits(seed: u64) -> Vec<(u64, bool)> {
    let mut config = EconomyConfig::default();
    config.service.rng_seed = Some(seed);
    let (service, _, _) = memory_service(config);
    let player = PlayerId::new();
    service.register(player).await.unwrap();
    service.admin_grant(player, 20_000, "test funds").await.unwrap();
    for item in ["basic_click", "double_click", "triple_click", "critical_strike"] {
        service
            .purchase(player, &ItemId::from(item), 1)
            .await
            .unwrap();
    }

    let mut outcomes = Vec::new();
    for _ in 0..90 {
        let click = service.click(player).await.unwrap().outcome;
        outcomes.push((click.value, click.is_critical));
    }
    outcomes
}

#[tokio::test]
async fn seeded_services_roll_identical_criticals() {
    let first = scripted_crits(42).await;
    let second = scripted_crits(42).await;
    assert_eq!(first, second);
    assert!(first.iter().any(|(_, crit)| *crit));
}
