//! End-to-end tests across ingress, settlement and the engine.
//!
//! These drive the system the way a presentation layer would, through the
//! [`Gateway`], and check the properties that must hold for any sequence
//! of calls: one open match at a time, no negative balances, no double
//! settlement, and pots that never pay out more than they hold.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use wagerpot_engine::{
    AutoResolveOutcome, Credentials, Gateway, InMemorySessions, StaticFeed, SyncOutcome,
    WagerEngine,
};
use wagerpot_types::*;

/// Gateway with generous rate limits and a few issued sessions.
struct Harness {
    gateway: Gateway,
    sessions: Arc<InMemorySessions>,
    admin: Credentials,
}

impl Harness {
    fn new() -> Self {
        Self::with_feed(None)
    }

    fn with_feed(feed: Option<Arc<StaticFeed>>) -> Self {
        let config = EngineConfig {
            rate_limit: RateLimitConfig {
                capacity: 1_000_000,
                refill_per_second: 1_000_000.0,
            },
            ..EngineConfig::default()
        };
        let engine = Arc::new(WagerEngine::new(config).expect("valid config"));
        let sessions = Arc::new(InMemorySessions::new());
        let mut gateway = Gateway::new(engine, sessions.clone());
        if let Some(feed) = feed {
            gateway = gateway.with_feed(feed);
        }
        let admin = Credentials::admin(sessions.issue_admin());
        Self {
            gateway,
            sessions,
            admin,
        }
    }

    fn login(&self, who: &str) -> Credentials {
        Credentials::user(self.sessions.issue_user(Identity::from(who)))
    }

    fn engine(&self) -> &WagerEngine {
        self.gateway.engine()
    }
}

const SCHEDULE: &str = r#"[
    {"key": "2024casj_qm1", "comp_level": "qm", "match_number": 1, "actual_time": null,
     "winning_alliance": "",
     "alliances": {"red": {"team_keys": ["frc254", "frc100"]},
                   "blue": {"team_keys": ["frc1678", "frc604"]}}},
    {"key": "2024casj_qm2", "comp_level": "qm", "match_number": 2, "actual_time": null,
     "winning_alliance": "",
     "alliances": {"red": {"team_keys": ["frc971"]}, "blue": {"team_keys": ["frc1323"]}}},
    {"key": "2024casj_f1m1", "comp_level": "f", "match_number": 1, "actual_time": null,
     "alliances": {"red": {"team_keys": ["frc1"]}, "blue": {"team_keys": ["frc2"]}}}
]"#;

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn full_lifecycle_through_gateway() {
    let h = Harness::new();
    let alice = h.login("alice");
    let bob = h.login("bob");
    let carol = h.login("carol");

    // SCHEDULE
    let m = h.gateway.schedule(&h.admin, "Team 254", "Team 1678").unwrap();
    assert_eq!(m.id, MatchId(1));
    assert_eq!(
        h.gateway.active_match(&alice).unwrap().map(|a| a.id),
        Some(m.id)
    );

    // WAGER
    h.gateway.place_wager(&alice, m.id, "Team 254", 60).unwrap();
    h.gateway.place_wager(&bob, m.id, "Team 1678", 30).unwrap();
    let placed = h.gateway.place_wager(&carol, m.id, "Team 1678", 10).unwrap();
    assert_eq!(placed.remaining_balance, 90);

    let stats = h.gateway.stats(&alice, m.id).unwrap();
    assert_eq!(stats.total_pot, 100);
    assert_eq!(stats.side_a.staked, 60);
    assert_eq!(stats.side_a.multiplier, Decimal::new(167, 2));
    assert_eq!(stats.side_b.staked, 40);
    assert_eq!(stats.side_b.multiplier, Decimal::new(250, 2));
    assert_eq!(stats.side_b.wager_count, 2);

    // RESOLVE
    let out = h.gateway.resolve(&h.admin, m.id, "Team 1678").unwrap();
    assert_eq!(out.total_pot, 100);
    assert_eq!(out.winning_stakes, 40);
    assert_eq!(out.multiplier, Decimal::new(25, 1));
    assert_eq!(out.total_paid, 100);
    assert_eq!(out.forfeited, 0);
    assert!(h.gateway.active_match(&alice).unwrap().is_none());

    // LEDGER
    assert_eq!(h.gateway.my_ledger(&alice).unwrap().balance, 40);
    assert_eq!(h.gateway.my_ledger(&bob).unwrap().balance, 70 + 75);
    assert_eq!(h.gateway.my_ledger(&carol).unwrap().balance, 90 + 25);
    let bob_view = h.gateway.my_ledger(&bob).unwrap();
    assert_eq!(bob_view.wagers[0].status, WagerStatus::Won);
    assert_eq!(bob_view.wagers[0].payout, Some(75));

    // LEADERBOARDS
    let anon = Credentials::anonymous("192.0.2.1");
    let points = h.gateway.points_leaderboard(&anon).unwrap();
    assert_eq!(points[0].identity, Identity::from("bob"));
    assert_eq!(points[0].balance, 145);
    let predictions = h.gateway.predictions_leaderboard(&anon).unwrap();
    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions[2].identity, Identity::from("alice"));
    assert_eq!(predictions[2].correct, 0);

    // Next match can now be scheduled.
    let next = h.gateway.schedule(&h.admin, "Team 971", "Team 1323").unwrap();
    assert_eq!(next.id, MatchId(2));
    assert_eq!(h.gateway.list_matches(&anon).unwrap().len(), 2);
}

#[test]
fn stake_300_against_100_pays_399() {
    let engine = WagerEngine::default();
    let whale = Identity::from("whale");
    let minnow = Identity::from("minnow");
    engine.ledger_view(&whale);
    engine.ledger_view(&minnow);
    assert_eq!(engine.reset_all_balances(500), 2);

    let m = engine.schedule("A", "B").unwrap();
    engine.place_wager(&whale, m.id, "A", 300).unwrap();
    engine.place_wager(&minnow, m.id, "B", 100).unwrap();
    let out = engine.resolve(m.id, "A").unwrap();

    assert_eq!(out.total_pot, 400);
    let won = out.wagers.iter().find(|w| w.identity == whale).unwrap();
    assert_eq!(won.payout, Some(399), "floor(300 * 400/300) under decimal math");
    assert_eq!(out.forfeited, 1);
    assert_eq!(engine.balance_of(&whale), 200 + 399);
    assert_eq!(engine.balance_of(&minnow), 400);
}

// =========================================================================
// Settlement properties
// =========================================================================

#[test]
fn second_resolve_changes_nothing() {
    let h = Harness::new();
    let alice = h.login("alice");
    let bob = h.login("bob");
    let m = h.gateway.schedule(&h.admin, "A", "B").unwrap();
    h.gateway.place_wager(&alice, m.id, "A", 50).unwrap();
    h.gateway.place_wager(&bob, m.id, "B", 20).unwrap();

    let first = h.gateway.resolve(&h.admin, m.id, "A").unwrap();
    let ledger_after_first = (
        h.gateway.my_ledger(&alice).unwrap(),
        h.gateway.my_ledger(&bob).unwrap(),
    );
    let wagers_after_first = h.engine().wagers_for_match(m.id);

    for winner in ["A", "B"] {
        let err = h.gateway.resolve(&h.admin, m.id, winner).unwrap_err();
        assert_eq!(err, WagerpotError::AlreadyResolved(m.id));
        assert_eq!(err.kind(), ErrorKind::AlreadyResolved);
    }

    assert_eq!(
        (
            h.gateway.my_ledger(&alice).unwrap(),
            h.gateway.my_ledger(&bob).unwrap()
        ),
        ledger_after_first
    );
    assert_eq!(h.engine().wagers_for_match(m.id), wagers_after_first);
    assert_eq!(first.total_paid, 70);
}

#[test]
fn concurrent_resolves_settle_once() {
    let engine = Arc::new(WagerEngine::default());
    let m = engine.schedule("A", "B").unwrap();
    for i in 0..10 {
        let side = if i % 2 == 0 { "A" } else { "B" };
        engine
            .place_wager(&Identity::new(format!("user{i}")), m.id, side, 10)
            .unwrap();
    }
    let before = engine.total_points();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.resolve(m.id, if i % 2 == 0 { "A" } else { "B" }))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let settled: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(settled.len(), 1, "exactly one resolve wins");
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == WagerpotError::AlreadyResolved(m.id)));
    assert_eq!(engine.total_points(), before + u128::from(settled[0].total_paid));
}

#[test]
fn nobody_on_winner_forfeits_pot() {
    let engine = WagerEngine::default();
    let m = engine.schedule("A", "B").unwrap();
    engine.place_wager(&Identity::from("x"), m.id, "B", 40).unwrap();
    engine.place_wager(&Identity::from("y"), m.id, "B", 60).unwrap();

    let out = engine.resolve(m.id, "A").unwrap();
    assert_eq!(out.multiplier, Decimal::ZERO);
    assert_eq!(out.total_paid, 0);
    assert_eq!(out.forfeited, 100);
    assert!(out.wagers.iter().all(|w| w.status == WagerStatus::Lost && w.payout.is_none()));
    assert_eq!(engine.balance_of(&Identity::from("x")), 60);
    assert_eq!(engine.balance_of(&Identity::from("y")), 40);
}

#[test]
fn identical_labels_are_accepted() {
    let engine = WagerEngine::default();
    let m = engine.schedule("Same", "Same").unwrap();
    engine.place_wager(&Identity::from("x"), m.id, "Same", 10).unwrap();
    let out = engine.resolve(m.id, "Same").unwrap();
    assert_eq!(out.total_paid, 10);
}

#[test]
fn overdraft_rejected_and_balance_unchanged() {
    let h = Harness::new();
    let alice = h.login("alice");
    let m = h.gateway.schedule(&h.admin, "A", "B").unwrap();

    let err = h.gateway.place_wager(&alice, m.id, "A", 101).unwrap_err();
    assert_eq!(
        err,
        WagerpotError::InsufficientBalance {
            needed: 101,
            available: 100
        }
    );
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    let view = h.gateway.my_ledger(&alice).unwrap();
    assert_eq!(view.balance, 100);
    assert!(view.wagers.is_empty());
}

#[test]
fn placement_checks_run_in_order() {
    let h = Harness::new();
    let alice = h.login("alice");
    let m = h.gateway.schedule(&h.admin, "A", "B").unwrap();

    let kind = |id, side, stake| {
        h.gateway
            .place_wager(&alice, id, side, stake)
            .unwrap_err()
            .kind()
    };
    assert_eq!(kind(MatchId(99), "Z", 0), ErrorKind::ValidationError);
    assert_eq!(kind(MatchId(99), "Z", 500), ErrorKind::NotFound);
    assert_eq!(kind(m.id, "Z", 500), ErrorKind::InvalidSide);
    assert_eq!(kind(m.id, "A", 500), ErrorKind::InsufficientBalance);

    h.gateway.resolve(&h.admin, m.id, "A").unwrap();
    assert_eq!(
        h.gateway.place_wager(&alice, m.id, "A", 1).unwrap_err(),
        WagerpotError::MatchClosed(m.id)
    );
}

#[test]
fn random_pots_conserve_points() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let engine = WagerEngine::default();
    let users: Vec<Identity> = (0..12).map(|i| Identity::new(format!("u{i}"))).collect();
    for u in &users {
        engine.ledger_view(u);
    }

    for round in 0..40 {
        let m = engine.schedule("Red", "Blue").unwrap();
        let before = engine.total_points();

        let mut pot = 0u64;
        for u in &users {
            if rng.gen_bool(0.7) {
                let side = if rng.gen_bool(0.5) { "Red" } else { "Blue" };
                let stake = rng.gen_range(1..=40);
                if engine.place_wager(u, m.id, side, stake).is_ok() {
                    pot += stake;
                }
            }
        }
        assert_eq!(engine.total_points(), before - u128::from(pot));

        let winner = if round % 3 == 0 { "Blue" } else { "Red" };
        let out = engine.resolve(m.id, winner).unwrap();
        let winners = out.wagers.iter().filter(|w| w.status == WagerStatus::Won).count() as u64;

        assert_eq!(out.total_pot, pot);
        assert!(out.total_paid <= out.total_pot);
        assert_eq!(out.total_paid + out.forfeited, out.total_pot);
        if winners > 0 {
            assert!(out.forfeited <= winners, "at most one point lost per winner");
        } else {
            assert_eq!(out.total_paid, 0);
        }
        assert_eq!(
            out.wagers.iter().filter_map(|w| w.payout).sum::<u64>(),
            out.total_paid
        );
        assert_eq!(
            engine.total_points(),
            before - u128::from(pot) + u128::from(out.total_paid)
        );
    }

    let open = engine
        .list_matches()
        .iter()
        .filter(|m| m.is_open())
        .count();
    assert_eq!(open, 0);
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn concurrent_wagers_never_overdraft() {
    let engine = Arc::new(WagerEngine::default());
    let m = engine.schedule("A", "B").unwrap();
    let alice = Identity::from("alice");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let alice = alice.clone();
            thread::spawn(move || engine.place_wager(&alice, m.id, "A", 30))
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.is_ok())
        .count();

    assert_eq!(accepted, 3, "100 points cover three 30-point wagers");
    assert_eq!(engine.balance_of(&alice), 10);
    assert_eq!(engine.stats(m.id).unwrap().total_pot, 90);
}

#[test]
fn wagers_racing_a_resolve_are_settled_or_closed() {
    let engine = Arc::new(WagerEngine::default());
    let m = engine.schedule("A", "B").unwrap();
    let users: Vec<Identity> = (0..8).map(|i| Identity::new(format!("racer{i}"))).collect();
    for who in &users {
        engine.place_wager(who, m.id, "A", 1).unwrap();
    }
    let before = engine.total_points();
    let start = Arc::new(Barrier::new(users.len() + 1));

    let placers: Vec<_> = users
        .iter()
        .enumerate()
        .map(|(i, who)| {
            let engine = Arc::clone(&engine);
            let start = Arc::clone(&start);
            let who = who.clone();
            thread::spawn(move || {
                start.wait();
                (0..20)
                    .map(|n| {
                        let side = if (i + n) % 2 == 0 { "A" } else { "B" };
                        engine.place_wager(&who, m.id, side, 3)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let resolver = {
        let engine = Arc::clone(&engine);
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            engine.resolve(m.id, "B")
        })
    };

    let outcome = resolver.join().unwrap().unwrap();
    let placements: Vec<_> = placers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    let mut accepted_stakes = 0u128;
    for result in &placements {
        match result {
            Ok(placed) => {
                accepted_stakes += u128::from(placed.wager.stake);
                assert!(
                    outcome.wagers.iter().any(|w| w.id == placed.wager.id),
                    "accepted wager {} missing from the settlement",
                    placed.wager.id
                );
            }
            Err(e) => assert_eq!(*e, WagerpotError::MatchClosed(m.id)),
        }
    }
    assert!(engine
        .wagers_for_match(m.id)
        .iter()
        .all(|w| w.status != WagerStatus::Pending));
    assert_eq!(
        engine.total_points(),
        before - accepted_stakes + u128::from(outcome.total_paid)
    );
}

#[test]
fn concurrent_schedules_leave_one_open_match() {
    let engine = Arc::new(WagerEngine::default());
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.schedule(&format!("A{i}"), &format!("B{i}")))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.kind() == ErrorKind::Conflict));
    assert_eq!(engine.list_matches().len(), 1);
}

// =========================================================================
// Admission
// =========================================================================

#[test]
fn burst_of_five_then_denied() {
    let engine = WagerEngine::default();
    let now = Instant::now();
    for i in 0..5 {
        assert!(engine.admit_at("ip:198.51.100.7", now).is_ok(), "call {i}");
    }
    let err = engine.admit_at("ip:198.51.100.7", now).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(err.retry_after_secs(), Some(1));

    // Other callers have their own bucket.
    assert!(engine.admit_at("user:someone", now).is_ok());
    // A fifth of a second refills one token at 5/s.
    assert!(engine
        .admit_at("ip:198.51.100.7", now + Duration::from_millis(200))
        .is_ok());
}

#[test]
fn idle_buckets_are_swept_without_changing_decisions() {
    let engine = WagerEngine::default();
    let t0 = Instant::now();
    for i in 0..20 {
        engine.admit_at(&format!("ip:10.0.0.{i}"), t0).unwrap();
    }
    assert_eq!(engine.bucket_count(), 20);

    let later = t0 + Duration::from_secs(constants::DEFAULT_BUCKET_IDLE_TTL_SECS + 1);
    assert_eq!(engine.sweep_idle_buckets(later), 20);
    assert_eq!(engine.bucket_count(), 0);

    for _ in 0..5 {
        engine.admit_at("ip:10.0.0.1", later).unwrap();
    }
    assert!(engine.admit_at("ip:10.0.0.1", later).is_err());
}

// =========================================================================
// Feed
// =========================================================================

#[test]
fn feed_sync_and_auto_resolve() {
    let feed = Arc::new(StaticFeed::from_json(SCHEDULE).unwrap());
    let h = Harness::with_feed(Some(feed.clone()));
    let admin = h.admin.clone();
    h.gateway
        .configure_feed(&admin, Some("api-key"), Some("2024casj"))
        .unwrap();

    // No active match yet: nothing to resolve.
    assert_eq!(
        h.gateway.auto_resolve_from_feed(&admin).unwrap(),
        AutoResolveOutcome::NoActiveMatch
    );

    // SYNC
    let SyncOutcome::Scheduled { scheduled, remaining } = h.gateway.sync_from_feed(&admin).unwrap()
    else {
        panic!("expected a scheduled match");
    };
    assert_eq!(scheduled.side_a, "Team 254");
    assert_eq!(scheduled.side_b, "Team 1678");
    assert_eq!(scheduled.source.feed_key(), Some("2024casj_qm1"));
    assert_eq!(remaining, 1);
    assert_eq!(
        h.gateway.sync_from_feed(&admin).unwrap_err().kind(),
        ErrorKind::Conflict
    );

    let alice = h.login("alice");
    h.gateway
        .place_wager(&alice, scheduled.id, "Team 1678", 20)
        .unwrap();

    // Not played yet.
    assert_eq!(
        h.gateway.auto_resolve_from_feed(&admin).unwrap(),
        AutoResolveOutcome::NotPlayed {
            match_id: scheduled.id
        }
    );

    // Upstream outage leaves state alone.
    feed.set_outage(Some("503"));
    assert_eq!(
        h.gateway.auto_resolve_from_feed(&admin).unwrap_err().kind(),
        ErrorKind::FeedUnavailable
    );
    feed.set_outage(None);
    assert!(h.engine().get_match(scheduled.id).unwrap().is_open());

    // Blue wins upstream → side B.
    feed.record_result("2024casj_qm1", 1_711_900_000, "blue");
    let AutoResolveOutcome::Resolved(out) = h.gateway.auto_resolve_from_feed(&admin).unwrap()
    else {
        panic!("expected resolution");
    };
    assert_eq!(out.winning_side(), Some("Team 1678"));
    assert_eq!(h.gateway.my_ledger(&alice).unwrap().balance, 100);

    // Next sync picks up qm2, then a tie is undecidable.
    let SyncOutcome::Scheduled { scheduled, remaining } = h.gateway.sync_from_feed(&admin).unwrap()
    else {
        panic!("expected qm2");
    };
    assert_eq!(scheduled.side_a, "Team 971");
    assert_eq!(remaining, 0);
    feed.record_result("2024casj_qm2", 1_711_900_600, "");
    assert_eq!(
        h.gateway.auto_resolve_from_feed(&admin).unwrap_err(),
        WagerpotError::FeedResultUndecidable {
            reason: "2024casj_qm2 reported winning alliance \"\"".into()
        }
    );
    assert!(h.engine().get_match(scheduled.id).unwrap().is_open());

    h.gateway.resolve(&admin, scheduled.id, "Team 971").unwrap();
    assert_eq!(
        h.gateway.sync_from_feed(&admin).unwrap(),
        SyncOutcome::NoUpcoming
    );
}

#[test]
fn manual_match_cannot_auto_resolve() {
    let feed = Arc::new(StaticFeed::from_json(SCHEDULE).unwrap());
    let h = Harness::with_feed(Some(feed));
    h.gateway
        .configure_feed(&h.admin, Some("api-key"), Some("2024casj"))
        .unwrap();
    h.gateway.schedule(&h.admin, "Home", "Away").unwrap();

    assert_eq!(
        h.gateway.auto_resolve_from_feed(&h.admin).unwrap_err().kind(),
        ErrorKind::ValidationError
    );
}

#[test]
fn unconfigured_feed_is_reported() {
    let feed = Arc::new(StaticFeed::from_json(SCHEDULE).unwrap());
    let h = Harness::with_feed(Some(feed));
    h.gateway.configure_feed(&h.admin, Some("api-key"), None).unwrap();
    assert_eq!(
        h.gateway.sync_from_feed(&h.admin).unwrap_err(),
        WagerpotError::FeedUnconfigured
    );
    assert_eq!(
        h.gateway.sync_from_feed(&h.admin).unwrap_err().kind(),
        ErrorKind::FeedUnconfigured
    );
}
