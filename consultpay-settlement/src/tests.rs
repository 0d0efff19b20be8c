use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use consultpay_commission::CommissionError;
use consultpay_core::{
    AccountId, BookingId, BookingSnapshot, BookingStatus, CommissionOverrides, Consultant,
};
use consultpay_events::{Event, EventBus, PayoutRecordedEvent};
use consultpay_ledger::{
    CatalogRepository, LedgerRepository, SettlementBatch, SettlementCommit, SqliteStore,
    StoreOptions, TransactionKind, TransactionQuery, TransactionStatus,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::{tempdir, TempDir};

use super::*;

struct Harness {
    _dir: TempDir,
    store: Arc<SqliteStore>,
    bus: EventBus,
    engine: SettlementEngine,
    balances: BalanceAggregator,
    payouts: PayoutRecorder,
    admin: CommissionAdmin,
    wallets: WalletService,
    bookings: BookingLifecycle,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let store = Arc::new(
            SqliteStore::open(dir.path().join("consultpay.db"), StoreOptions::default()).unwrap(),
        );
        let bus = EventBus::new(64);
        let shared: Arc<dyn Store> = store.clone();
        let harness = Self {
            engine: SettlementEngine::new(shared.clone(), bus.clone()),
            balances: BalanceAggregator::new(shared.clone(), bus.clone()),
            payouts: PayoutRecorder::new(shared.clone(), bus.clone()),
            admin: CommissionAdmin::new(shared.clone()),
            wallets: WalletService::new(shared.clone()),
            bookings: BookingLifecycle::new(shared),
            _dir: dir,
            store,
            bus,
        };
        harness
            .admin
            .set_global_defaults(dec!(15), dec!(10))
            .unwrap();
        harness
    }

    /// Drop every service holding the bus so dispatchers see the channel close.
    fn into_store(self) -> (TempDir, Arc<SqliteStore>) {
        (self._dir, self.store)
    }

    fn consultant(&self, price: Decimal) -> Consultant {
        self.store
            .create_consultant("Asha", Some("asha@example.com"), price, CommissionOverrides::default())
            .unwrap()
    }

    fn funded_user(&self, funds: Decimal) -> AccountId {
        let user = self.store.create_account("Ravi", None).unwrap();
        if funds > Decimal::ZERO {
            self.wallets.top_up(user.id, funds, false).unwrap();
        }
        user.id
    }

    fn confirmed_booking(&self, user: AccountId, consultant: &Consultant) -> BookingId {
        let booking = self.bookings.create(user, consultant.id).unwrap();
        self.bookings.confirm(booking.id).unwrap();
        booking.id
    }
}

#[test]
fn settles_reference_session() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let user = h.funded_user(dec!(5000));
    let booking = h.confirmed_booking(user, &consultant);

    let outcome = h.engine.booking_completed(booking).unwrap();
    let SettlementOutcome::Settled {
        booking: settled,
        transactions,
        ..
    } = outcome
    else {
        panic!("expected settlement");
    };
    let snapshot = settled.snapshot.unwrap();
    assert_eq!(settled.status, BookingStatus::Settled);
    assert_eq!(snapshot.consultant_fee, dec!(1000));
    assert_eq!(snapshot.amount_deducted_from_user, dec!(1100.00));
    assert_eq!(snapshot.consultant_earning, dec!(850.00));
    assert_eq!(snapshot.commission_fee, dec!(250.00));

    let kinds: Vec<_> = transactions.iter().map(|row| row.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Debit,
            TransactionKind::Earning,
            TransactionKind::Commission
        ]
    );
    assert_eq!(h.balances.wallet_balance(user).unwrap(), dec!(3900));
    assert_eq!(h.balances.platform_commission_total().unwrap(), dec!(250));
}

#[test]
fn duplicate_trigger_is_a_no_op() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let user = h.funded_user(dec!(5000));
    let booking = h.confirmed_booking(user, &consultant);

    let first = h.engine.booking_completed(booking).unwrap();
    let second = h.engine.booking_completed(booking).unwrap();
    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
    assert_eq!(first.booking().snapshot, second.booking().snapshot);

    let rows = h.store.query(TransactionQuery::for_booking(booking)).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(h.balances.wallet_balance(user).unwrap(), dec!(3900));
}

#[test]
fn concurrent_triggers_settle_once() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let user = h.funded_user(dec!(5000));
    let booking = h.confirmed_booking(user, &consultant);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = h.engine.clone();
            thread::spawn(move || engine.booking_completed(booking).unwrap())
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outcomes.iter().filter(|o| !o.is_duplicate()).count(), 1);

    let earnings = h
        .store
        .query(TransactionQuery::for_booking(booking).with_kind(TransactionKind::Earning))
        .unwrap();
    assert_eq!(earnings.len(), 1);
    assert_eq!(h.balances.wallet_balance(user).unwrap(), dec!(3900));
}

#[test]
fn insufficient_funds_leaves_booking_confirmed() {
    let h = Harness::new();
    // 200 base with no markup: the user owes exactly 200
    let consultant = h.consultant(dec!(200));
    h.admin
        .set_commission(consultant.id, None, Some(dec!(0)))
        .unwrap();
    let user = h.funded_user(dec!(50));
    let booking = h.confirmed_booking(user, &consultant);
    let mut events = h.bus.subscribe();

    let err = h.engine.booking_completed(booking).unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InsufficientFunds { required, available }
            if required == dec!(200) && available == dec!(50)
    ));
    let stored = h.bookings.get(booking).unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert!(stored.snapshot.is_none());
    assert!(h
        .store
        .query(TransactionQuery::for_booking(booking))
        .unwrap()
        .is_empty());
    let envelope = events.try_recv().unwrap();
    assert!(matches!(envelope.event, Event::SettlementFailed(_)));

    // the collaborator tops up and retries
    h.wallets.top_up(user, dec!(150), false).unwrap();
    let retried = h.engine.booking_completed(booking).unwrap();
    assert!(!retried.is_duplicate());
    assert_eq!(h.balances.wallet_balance(user).unwrap(), Decimal::ZERO);
    assert!(retried.booking().settlement_error.is_none());
}

#[test]
fn global_default_applies_without_override() {
    let h = Harness::new();
    h.admin.set_global_defaults(dec!(20), dec!(10)).unwrap();
    let consultant = h.consultant(dec!(1000));
    let resolved = h.admin.effective_commission(consultant.id).unwrap();
    assert_eq!(resolved.consultant_pct.value(), dec!(20));

    let user = h.funded_user(dec!(5000));
    let booking = h.confirmed_booking(user, &consultant);
    let outcome = h.engine.booking_completed(booking).unwrap();
    assert_eq!(
        outcome.booking().snapshot.unwrap().consultant_earning,
        dec!(800.00)
    );
}

#[test]
fn snapshot_survives_policy_changes() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let user = h.funded_user(dec!(5000));
    let booking = h.confirmed_booking(user, &consultant);
    let settled = h.engine.booking_completed(booking).unwrap();
    let frozen = settled.booking().snapshot.unwrap();

    h.admin.set_global_defaults(dec!(40), dec!(30)).unwrap();
    h.admin
        .set_commission(consultant.id, Some(dec!(5)), Some(dec!(1)))
        .unwrap();
    h.store.set_hourly_price(consultant.id, dec!(2500)).unwrap();

    let again = h.engine.booking_completed(booking).unwrap();
    assert_eq!(again.booking().snapshot.unwrap(), frozen);
    let summary = h.balances.consultant_payout_summary(consultant.id).unwrap();
    assert_eq!(summary.total_earned, dec!(850));
}

#[test]
fn cancelled_bookings_never_settle() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let user = h.funded_user(dec!(5000));
    let pending = h.bookings.create(user, consultant.id).unwrap();
    assert!(matches!(
        h.engine.booking_completed(pending.id),
        Err(SettlementError::BookingNotSettleable { .. })
    ));
    h.bookings.reject(pending.id).unwrap();
    assert!(h.engine.booking_completed(pending.id).is_err());

    let booking = h.confirmed_booking(user, &consultant);
    h.bookings.cancel(booking).unwrap();
    assert!(matches!(
        h.engine.booking_completed(booking),
        Err(SettlementError::BookingNotSettleable {
            status: BookingStatus::Cancelled,
            ..
        })
    ));
    assert_eq!(h.balances.wallet_balance(user).unwrap(), dec!(5000));
}

#[test]
fn completed_calls_settle_from_completed_state() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(500));
    let user = h.funded_user(dec!(1000));
    let booking = h.confirmed_booking(user, &consultant);
    h.bookings.mark_completed(booking).unwrap();
    let outcome = h.engine.booking_completed(booking).unwrap();
    assert_eq!(outcome.booking().status, BookingStatus::Settled);
}

#[test]
fn payout_reduces_outstanding_exactly() {
    let h = Harness::new();
    // 0% consultant commission so each session earns the full 1000
    let consultant = h.consultant(dec!(1000));
    h.admin
        .set_commission(consultant.id, Some(dec!(0)), None)
        .unwrap();
    let user = h.funded_user(dec!(10000));
    for _ in 0..5 {
        let booking = h.confirmed_booking(user, &consultant);
        h.engine.booking_completed(booking).unwrap();
    }

    let before = h.balances.consultant_payout_summary(consultant.id).unwrap();
    assert_eq!(before.total_earned, dec!(5000));
    assert_eq!(before.outstanding, dec!(5000));
    assert_eq!(before.completed_bookings, 5);

    let receipt = h
        .payouts
        .record_payout(consultant.id, dec!(2000), Some("NEFT".into()))
        .unwrap();
    assert_eq!(receipt.new_outstanding, dec!(3000));
    assert!(receipt.warnings.is_empty());

    let after = h.balances.consultant_payout_summary(consultant.id).unwrap();
    assert_eq!(after.total_paid, before.total_paid + dec!(2000));
    assert_eq!(after.outstanding, before.outstanding - dec!(2000));
    assert_eq!(after.total_commission, dec!(500));
}

#[test]
fn payouts_within_outstanding_keep_it_non_negative() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(333.33));
    let user = h.funded_user(dec!(10000));
    let mut last_paid = Decimal::ZERO;
    for round in 0..4 {
        let booking = h.confirmed_booking(user, &consultant);
        h.engine.booking_completed(booking).unwrap();
        let summary = h.balances.consultant_payout_summary(consultant.id).unwrap();
        let amount = if round % 2 == 0 {
            summary.outstanding
        } else {
            (summary.outstanding / dec!(3)).round_dp(2)
        };
        let receipt = h
            .payouts
            .record(PayoutRequest::new(consultant.id, amount).expecting_outstanding(summary.outstanding))
            .unwrap();
        assert!(receipt.new_outstanding >= Decimal::ZERO);
        let summary = h.balances.consultant_payout_summary(consultant.id).unwrap();
        assert!(summary.outstanding >= Decimal::ZERO);
        assert!(summary.total_paid >= last_paid);
        assert!(summary.warnings.is_empty());
        last_paid = summary.total_paid;
    }
}

#[test]
fn overpayment_is_allowed_but_flagged() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(100));
    let user = h.funded_user(dec!(1000));
    let booking = h.confirmed_booking(user, &consultant);
    h.engine.booking_completed(booking).unwrap();

    let receipt = h
        .payouts
        .record_payout(consultant.id, dec!(100), None)
        .unwrap();
    assert_eq!(receipt.new_outstanding, dec!(-15.00));
    assert_eq!(receipt.warnings.len(), 1);

    let summary = h.balances.consultant_payout_summary(consultant.id).unwrap();
    assert_eq!(summary.outstanding, dec!(-15));
    assert!(matches!(
        summary.warnings.as_slice(),
        [IntegrityWarning::NegativeOutstanding { .. }]
    ));
    assert!(!h.balances.verify().unwrap().is_clean());
}

#[test]
fn invalid_payouts_write_nothing() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(100));
    for amount in [dec!(0), dec!(-5)] {
        assert!(matches!(
            h.payouts.record_payout(consultant.id, amount, None),
            Err(SettlementError::InvalidPayoutAmount(_))
        ));
    }
    assert!(h.payouts.history(consultant.id).unwrap().is_empty());
}

#[test]
fn concurrent_payouts_with_same_token_do_not_both_succeed() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let user = h.funded_user(dec!(5000));
    let booking = h.confirmed_booking(user, &consultant);
    h.engine.booking_completed(booking).unwrap();
    let seen = h
        .balances
        .consultant_payout_summary(consultant.id)
        .unwrap()
        .outstanding;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let recorder = h.payouts.clone();
            let id = consultant.id;
            thread::spawn(move || {
                recorder.record(PayoutRequest::new(id, seen).expecting_outstanding(seen))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, SettlementError::StaleOutstanding { .. })));
    let summary = h.balances.consultant_payout_summary(consultant.id).unwrap();
    assert_eq!(summary.outstanding, Decimal::ZERO);
}

#[test]
fn cached_wallets_match_full_replay() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(123.45));
    let user = h.funded_user(dec!(1000));
    let pending = h.wallets.top_up(user, dec!(250), true).unwrap();
    h.wallets
        .credit(user, TransactionKind::Subscription, dec!(19.99), None)
        .unwrap();
    h.wallets
        .credit(user, TransactionKind::ChatCredit, dec!(0.5), Some("chat pack".into()))
        .unwrap();
    for _ in 0..3 {
        let booking = h.confirmed_booking(user, &consultant);
        h.engine.booking_completed(booking).unwrap();
    }
    h.wallets
        .resolve_pending(pending.id, TransactionStatus::Success)
        .unwrap();

    let mut running = RunningBalance::default();
    for row in h.store.query(TransactionQuery::for_account(user)).unwrap() {
        running.apply(&row);
    }
    let check = h.balances.wallet_check(user).unwrap();
    assert!(check.is_consistent());
    assert_eq!(check.cached, Some(running.balance()));
    assert_eq!(check.replayed, running.balance());

    let consultant_check = h.balances.wallet_check(consultant.account).unwrap();
    assert!(consultant_check.is_consistent());

    let report = h.balances.verify().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.wallets.len(), 2);
    let rebuilt = h.wallets.rebuild_caches().unwrap();
    assert_eq!(rebuilt.len(), 2);
}

#[test]
fn reversal_appends_offsetting_row() {
    let h = Harness::new();
    let user = h.funded_user(Decimal::ZERO);
    let credit = h.wallets.top_up(user, dec!(75), false).unwrap();
    let reversal = h.wallets.reverse(credit.id, "duplicate gateway callback").unwrap();
    assert_eq!(reversal.kind, TransactionKind::Debit);
    assert_eq!(reversal.amount, dec!(75));
    assert!(reversal
        .description
        .as_deref()
        .unwrap()
        .starts_with(&format!("reversal of #{}:", credit.id)));
    assert_eq!(h.balances.wallet_balance(user).unwrap(), Decimal::ZERO);

    let original = h.store.transaction(credit.id).unwrap().unwrap();
    assert_eq!(original, credit);
    assert!(matches!(
        h.wallets.reverse(credit.id, "again"),
        Err(SettlementError::NotReversible(_))
    ));
}

#[test]
fn settlement_rows_cannot_be_reversed() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let user = h.funded_user(dec!(5000));
    let booking = h.confirmed_booking(user, &consultant);
    h.engine.booking_completed(booking).unwrap();

    let legs = h.store.query(TransactionQuery::for_booking(booking)).unwrap();
    assert_eq!(legs.len(), 3);
    for leg in &legs {
        assert!(
            matches!(
                h.wallets.reverse(leg.id, "refund"),
                Err(SettlementError::NotReversible(_))
            ),
            "{} leg was reversible",
            leg.kind
        );
    }
    assert_eq!(h.balances.wallet_balance(user).unwrap(), dec!(3900));
    let summary = h.balances.consultant_payout_summary(consultant.id).unwrap();
    assert_eq!(summary.total_earned, dec!(850));
    assert_eq!(h.balances.platform_commission_total().unwrap(), dec!(250));
    assert_eq!(
        h.store.query(TransactionQuery::for_booking(booking)).unwrap(),
        legs
    );
}

#[test]
fn concurrent_reversals_apply_once() {
    let h = Harness::new();
    let user = h.funded_user(Decimal::ZERO);
    let credit = h.wallets.top_up(user, dec!(75), false).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let wallets = h.wallets.clone();
            thread::spawn(move || wallets.reverse(credit.id, "chargeback"))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, SettlementError::NotReversible(_))));

    assert_eq!(h.balances.wallet_balance(user).unwrap(), Decimal::ZERO);
    assert!(h.balances.wallet_check(user).unwrap().is_consistent());
    let debits = h
        .store
        .query(TransactionQuery::for_account(user).with_kind(TransactionKind::Debit))
        .unwrap();
    assert_eq!(debits.len(), 1);
}

#[test]
fn subsidised_settlement_is_booked_against_platform() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(100));
    let user = h.funded_user(dec!(500));
    let booking = h.confirmed_booking(user, &consultant);
    let platform = h.store.platform_account();
    let batch = SettlementBatch {
        booking,
        user,
        consultant: consultant.id,
        consultant_account: consultant.account,
        platform_account: platform,
        snapshot: BookingSnapshot {
            consultant_fee: dec!(100),
            amount_deducted_from_user: dec!(90),
            commission_fee: dec!(-5),
            consultant_earning: dec!(95),
            subsidised: true,
        },
    };

    let SettlementCommit::Settled {
        booking: settled,
        transactions,
    } = h.store.commit_settlement(&batch).unwrap()
    else {
        panic!("expected a fresh settlement");
    };
    assert!(settled.snapshot.unwrap().subsidised);
    let legs: Vec<_> = transactions
        .iter()
        .map(|row| (row.kind, row.account, row.amount))
        .collect();
    assert_eq!(
        legs,
        vec![
            (TransactionKind::Debit, user, dec!(90)),
            (TransactionKind::Earning, consultant.account, dec!(95)),
            (TransactionKind::Debit, platform, dec!(5)),
        ]
    );

    assert_eq!(h.balances.wallet_balance(user).unwrap(), dec!(410));
    assert_eq!(h.balances.platform_commission_total().unwrap(), dec!(-5));
    let summary = h.balances.consultant_payout_summary(consultant.id).unwrap();
    assert_eq!(summary.total_earned, dec!(95));
    assert_eq!(summary.total_commission, dec!(-5));
    assert!(h.store.cached_wallet(platform).unwrap().is_none());
    assert!(matches!(
        h.store.commit_settlement(&batch).unwrap(),
        SettlementCommit::AlreadySettled { .. }
    ));
}

#[test]
fn oversized_price_fails_without_panicking() {
    let h = Harness::new();
    let consultant = h
        .admin
        .register_consultant("Asha", None, Decimal::MAX, None, None)
        .unwrap();
    assert!(matches!(
        h.admin.quote(consultant.id),
        Err(SettlementError::Configuration(CommissionError::PriceOverflow(_)))
    ));

    let user = h.funded_user(dec!(100));
    let booking = h.confirmed_booking(user, &consultant);
    assert!(h.engine.booking_completed(booking).is_err());
    assert!(h
        .store
        .query(TransactionQuery::for_booking(booking))
        .unwrap()
        .is_empty());
    assert_eq!(
        h.bookings.get(booking).unwrap().unwrap().status,
        BookingStatus::Confirmed
    );
}

#[test]
fn verify_reports_missing_wallet_cache() {
    let h = Harness::new();
    let user = h.funded_user(dec!(40));
    let conn = rusqlite::Connection::open(h.store.path()).unwrap();
    conn.execute("DELETE FROM wallets WHERE account_id = ?1", [user.get()])
        .unwrap();
    drop(conn);

    let report = h.balances.verify().unwrap();
    assert_eq!(
        report.warnings(),
        vec![IntegrityWarning::WalletDrift {
            account: user,
            cached: Decimal::ZERO,
            replayed: dec!(40),
        }]
    );

    let rebuilt = h.wallets.rebuild_caches().unwrap();
    assert_eq!(rebuilt.len(), 1);
    assert_eq!(rebuilt[0].balance, dec!(40));
    assert!(h.balances.verify().unwrap().is_clean());
}

#[test]
fn bookings_need_a_real_customer() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(100));
    assert!(h
        .bookings
        .create(h.store.platform_account(), consultant.id)
        .is_err());
    assert!(h.bookings.create(consultant.account, consultant.id).is_err());
}

#[test]
fn configuration_errors_are_rejected_on_write() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(100));
    assert!(matches!(
        h.admin.set_commission(consultant.id, Some(dec!(150)), None),
        Err(SettlementError::Configuration(_))
    ));
    assert!(h.admin.set_global_defaults(dec!(-1), dec!(10)).is_err());
    let defaults = h.admin.global_defaults().unwrap();
    assert_eq!(defaults.default_consultant_comm.value(), dec!(15));

    let quote = h.admin.quote(consultant.id).unwrap();
    assert_eq!(quote.amount_user_pays, dec!(110.00));
    assert_eq!(quote.consultant_earning, dec!(85.00));
}

#[test]
fn missing_defaults_block_settlement() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn Store> =
        Arc::new(SqliteStore::open(dir.path().join("bare.db"), StoreOptions::default()).unwrap());
    let engine = SettlementEngine::new(store.clone(), EventBus::default());
    let consultant = store
        .create_consultant("Asha", None, dec!(100), CommissionOverrides::default())
        .unwrap();
    let user = store.create_account("Ravi", None).unwrap();
    let booking = store.create_booking(user.id, consultant.id).unwrap();
    store
        .transition_booking(booking.id, BookingStatus::Confirmed)
        .unwrap();
    assert!(matches!(
        engine.booking_completed(booking.id),
        Err(SettlementError::MissingDefaults)
    ));
}

struct RecordingNotifier {
    seen: Mutex<Vec<PayoutRecordedEvent>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn payout_recorded(&self, event: &PayoutRecordedEvent) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn payout_recorded(&self, _event: &PayoutRecordedEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay down".into()))
    }
}

#[tokio::test]
async fn dispatcher_delivers_payout_notifications() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let notifier = Arc::new(RecordingNotifier {
        seen: Mutex::new(Vec::new()),
    });
    let dispatcher = NotificationDispatcher::new(notifier.clone()).spawn(h.bus.subscribe());

    h.payouts
        .record_payout(consultant.id, dec!(10), Some("advance".into()))
        .unwrap();
    let _kept = h.into_store();

    let stats = dispatcher.await.unwrap();
    assert_eq!(stats.delivered, 1);
    let seen = notifier.seen.lock().unwrap();
    assert_eq!(seen[0].consultant_email.as_deref(), Some("asha@example.com"));
    assert_eq!(seen[0].amount, dec!(10));
}

#[tokio::test]
async fn notification_failure_does_not_undo_payout() {
    let h = Harness::new();
    let consultant = h.consultant(dec!(1000));
    let dispatcher = NotificationDispatcher::new(Arc::new(FailingNotifier))
        .with_retry(2, Duration::from_millis(1))
        .spawn(h.bus.subscribe());

    let receipt = h
        .payouts
        .record_payout(consultant.id, dec!(40), None)
        .unwrap();
    let (_dir, store) = h.into_store();

    let stats = dispatcher.await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(
        store.payout(receipt.payout.id).unwrap().unwrap().amount,
        dec!(40)
    );
}
