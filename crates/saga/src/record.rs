//! Saga coordinator for single-account records (expenses and incomes).
//!
//! The record's entry kind fixes the sign of every balance adjustment: an
//! expense debits its account on create, an income credits it, and every
//! inverse flips accordingly. The two flows are otherwise identical, so one
//! coordinator serves both kinds.

use std::time::Instant;

use common::Money;
use domain::{EntryKind, FinancialRecord, RecordError};
use transport::{CommandEmitter, ResponseBroker};

use crate::commands;
use crate::compensation;
use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::services::RecordQueryService;
use crate::state::RecordSagaState;
use crate::step::{StepExecutor, StepFailure, finish_completed, finish_failed, resolve_failure};

/// Step name: create the record at the owning service.
pub const STEP_CREATE_RECORD: &str = "create_record";

/// Step name: apply the record's effect to the account balance.
pub const STEP_ADJUST_BALANCE: &str = "adjust_balance";

/// Step name: apply the record update at the owning service.
pub const STEP_UPDATE_RECORD: &str = "update_record";

/// Step name: confirm the delete via the existence probe.
pub const STEP_CONFIRM_DELETE: &str = "confirm_delete";

/// Step name: reverse the deleted record's effect on the account balance.
pub const STEP_REVERSE_BALANCE: &str = "reverse_balance";

/// Orchestrates create/update/delete sagas for expenses and incomes.
pub struct RecordSagaCoordinator<E, Q> {
    steps: StepExecutor<E>,
    query: Q,
    config: SagaConfig,
}

impl<E, Q> RecordSagaCoordinator<E, Q>
where
    E: CommandEmitter,
    Q: RecordQueryService,
{
    /// Creates a new coordinator.
    pub fn new(emitter: E, broker: ResponseBroker, query: Q, config: SagaConfig) -> Self {
        let steps = StepExecutor::new(emitter, broker, config.response_timeout);
        Self {
            steps,
            query,
            config,
        }
    }

    /// Runs the create saga: create the record, then adjust the balance.
    ///
    /// Returns the created record, or the terminal error after firing any
    /// compensations.
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id, kind = %record.kind))]
    pub async fn create(&self, record: FinancialRecord) -> Result<FinancialRecord, SagaError> {
        ensure_single(&record)?;
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let command = commands::create_record(&record);
        if let Err(failure) = self.steps.execute(STEP_CREATE_RECORD, command).await.applied() {
            return Err(self
                .fail_create(
                    &record,
                    RecordSagaState::Init,
                    RecordSagaState::RecordCreated,
                    STEP_CREATE_RECORD,
                    failure,
                    saga_start,
                )
                .await);
        }

        if let Some(command) = commands::adjustment(record.account_id, record.balance_effect()) {
            if let Err(failure) = self.steps.execute(STEP_ADJUST_BALANCE, command).await.applied()
            {
                return Err(self
                    .fail_create(
                        &record,
                        RecordSagaState::RecordCreated,
                        RecordSagaState::BalanceAdjusted,
                        STEP_ADJUST_BALANCE,
                        failure,
                        saga_start,
                    )
                    .await);
            }
        }

        finish_completed(saga_start);
        tracing::info!("record created");
        Ok(record)
    }

    /// Runs the update saga: adjust the balance by the delta (skipped when
    /// zero), then apply the record update.
    ///
    /// `updated` must carry the same identity (id, kind, account) as
    /// `original`; only the mutable fields differ.
    #[tracing::instrument(skip(self, original, updated), fields(record_id = %original.id, kind = %original.kind))]
    pub async fn update(
        &self,
        original: FinancialRecord,
        updated: FinancialRecord,
    ) -> Result<FinancialRecord, SagaError> {
        ensure_single(&original)?;
        debug_assert_eq!(original.id, updated.id);
        debug_assert_eq!(original.account_id, updated.account_id);
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let delta = updated.balance_effect() - original.balance_effect();
        let mut applied_delta = Money::zero();
        let mut reached = RecordSagaState::Init;

        if let Some(command) = commands::adjustment(original.account_id, delta) {
            if let Err(failure) = self.steps.execute(STEP_ADJUST_BALANCE, command).await.applied()
            {
                return Err(self
                    .fail_update(
                        &original,
                        (RecordSagaState::Init, Money::zero()),
                        (RecordSagaState::BalanceAdjusted, delta),
                        STEP_ADJUST_BALANCE,
                        failure,
                        saga_start,
                    )
                    .await);
            }
            applied_delta = delta;
            reached = RecordSagaState::BalanceAdjusted;
        }

        let command = commands::update_record(&updated);
        if let Err(failure) = self.steps.execute(STEP_UPDATE_RECORD, command).await.applied() {
            return Err(self
                .fail_update(
                    &original,
                    (reached, applied_delta),
                    (RecordSagaState::RecordUpdated, applied_delta),
                    STEP_UPDATE_RECORD,
                    failure,
                    saga_start,
                )
                .await);
        }

        finish_completed(saga_start);
        tracing::info!("record updated");
        Ok(updated)
    }

    /// Runs the delete saga: issue the DELETE, confirm it via the existence
    /// probe after a grace period, then reverse the record's balance effect.
    ///
    /// An unconfirmed delete aborts with no further side effects; the
    /// DELETE is idempotent at the target and is neither retried nor undone.
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id, kind = %record.kind))]
    pub async fn delete(&self, record: FinancialRecord) -> Result<(), SagaError> {
        ensure_single(&record)?;
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        self.steps.fire(commands::delete_record(record.id)).await;
        tokio::time::sleep(self.config.delete_confirm_delay).await;

        match self.query.find_record(record.id).await {
            Ok(None) => {
                tracing::info!(step = STEP_CONFIRM_DELETE, "delete confirmed");
            }
            Ok(Some(_)) => {
                let error = SagaError::DeleteUnconfirmed {
                    record_id: record.id,
                    reason: "record still present after delete".to_string(),
                };
                finish_failed(saga_start, &error);
                return Err(error);
            }
            Err(err) => {
                tracing::warn!(%err, "delete confirmation probe failed");
                let error = SagaError::DependencyUnavailable {
                    step: STEP_CONFIRM_DELETE,
                };
                finish_failed(saga_start, &error);
                return Err(error);
            }
        }

        if let Some(command) = commands::adjustment(record.account_id, -record.balance_effect()) {
            if let Err(failure) =
                self.steps.execute(STEP_REVERSE_BALANCE, command).await.applied()
            {
                return Err(self
                    .fail_delete(
                        &record,
                        RecordSagaState::RecordDeleted,
                        RecordSagaState::BalanceAdjusted,
                        STEP_REVERSE_BALANCE,
                        failure,
                        saga_start,
                    )
                    .await);
            }
        }

        finish_completed(saga_start);
        tracing::info!("record deleted");
        Ok(())
    }

    async fn fail_create(
        &self,
        record: &FinancialRecord,
        reached: RecordSagaState,
        advanced: RecordSagaState,
        step: &'static str,
        failure: StepFailure,
        saga_start: Instant,
    ) -> SagaError {
        let (anchor, error) = resolve_failure(step, failure, reached, advanced);
        if let Some(anchor) = anchor {
            let inverses = compensation::create_compensations(record, anchor);
            self.steps.fire_compensations(inverses, step).await;
        }
        finish_failed(saga_start, &error);
        error
    }

    async fn fail_update(
        &self,
        original: &FinancialRecord,
        reached: (RecordSagaState, Money),
        advanced: (RecordSagaState, Money),
        step: &'static str,
        failure: StepFailure,
        saga_start: Instant,
    ) -> SagaError {
        let (anchor, error) = resolve_failure(step, failure, reached, advanced);
        if let Some((state, applied_delta)) = anchor {
            let inverses = compensation::update_compensations(original, applied_delta, state);
            self.steps.fire_compensations(inverses, step).await;
        }
        finish_failed(saga_start, &error);
        error
    }

    async fn fail_delete(
        &self,
        record: &FinancialRecord,
        reached: RecordSagaState,
        advanced: RecordSagaState,
        step: &'static str,
        failure: StepFailure,
        saga_start: Instant,
    ) -> SagaError {
        let (anchor, error) = resolve_failure(step, failure, reached, advanced);
        if let Some(anchor) = anchor {
            let inverses = compensation::delete_compensations(record, anchor);
            self.steps.fire_compensations(inverses, step).await;
        }
        finish_failed(saga_start, &error);
        error
    }
}

fn ensure_single(record: &FinancialRecord) -> Result<(), SagaError> {
    if record.kind == EntryKind::Transfer {
        return Err(RecordError::UnexpectedTransfer(record.id).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AccountId;
    use domain::CommandPayload;
    use std::time::Duration;
    use transport::{CommandKind, InMemoryCommandBus, ReplyBehavior};

    use crate::services::InMemoryRecordQueryService;

    type TestCoordinator = RecordSagaCoordinator<InMemoryCommandBus, InMemoryRecordQueryService>;

    fn harness() -> (TestCoordinator, InMemoryCommandBus, InMemoryRecordQueryService) {
        let broker = ResponseBroker::new();
        let bus = InMemoryCommandBus::new(broker.clone());
        let query = InMemoryRecordQueryService::new();
        let config = SagaConfig {
            response_timeout: Duration::from_secs(2),
            delete_confirm_delay: Duration::from_millis(10),
        };
        let coordinator = RecordSagaCoordinator::new(bus.clone(), broker, query.clone(), config);
        (coordinator, bus, query)
    }

    fn expense(amount_cents: i64) -> FinancialRecord {
        FinancialRecord::expense(
            AccountId::new(),
            Money::from_cents(amount_cents),
            "groceries",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_expense_happy_path() {
        let (coordinator, bus, _) = harness();
        let record = expense(5000);

        let created = coordinator.create(record.clone()).await.unwrap();
        assert_eq!(created, record);

        let emitted = bus.emitted();
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Create, CommandKind::Withdraw]);
        assert!(emitted.iter().all(|command| command.expects_reply()));
        assert_eq!(emitted[0].subject_key, record.id.to_string());
        assert_eq!(emitted[1].subject_key, record.account_id.to_string());
    }

    #[tokio::test]
    async fn create_income_adjusts_with_a_deposit() {
        let (coordinator, bus, _) = harness();
        let record =
            FinancialRecord::income(AccountId::new(), Money::from_cents(10_000), "salary").unwrap();

        coordinator.create(record).await.unwrap();
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Create, CommandKind::Deposit]);
    }

    #[tokio::test]
    async fn create_rejected_at_first_step_fires_nothing() {
        let (coordinator, bus, _) = harness();
        bus.set_behavior(
            CommandKind::Create,
            ReplyBehavior::Reject {
                status: 400,
                message: "invalid record".to_string(),
            },
        );

        let error = coordinator.create(expense(5000)).await.unwrap_err();
        match error {
            SagaError::Rejected { status, ref message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid record");
            }
            ref other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(bus.emitted_count(), 1);
    }

    #[tokio::test]
    async fn create_rejected_at_balance_step_deletes_the_record() {
        let (coordinator, bus, _) = harness();
        bus.set_behavior(
            CommandKind::Withdraw,
            ReplyBehavior::Reject {
                status: 422,
                message: "insufficient funds".to_string(),
            },
        );

        let record = expense(5000);
        let error = coordinator.create(record.clone()).await.unwrap_err();
        assert_eq!(error.status_code(), 422);

        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![CommandKind::Create, CommandKind::Withdraw, CommandKind::Delete]
        );
        // The compensation is fire-and-forget.
        assert!(!emitted[2].expects_reply());
        assert_eq!(emitted[2].subject_key, record.id.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn create_timeout_at_balance_step_compensates_as_if_applied() {
        let (coordinator, bus, _) = harness();
        bus.set_behavior(CommandKind::Withdraw, ReplyBehavior::Silent);

        let record = expense(5000);
        let error = coordinator.create(record.clone()).await.unwrap_err();
        assert!(matches!(error, SagaError::DependencyUnavailable { .. }));
        assert_eq!(error.status_code(), 424);

        // The withdrawal may have landed: refund it, then delete the record.
        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![
                CommandKind::Create,
                CommandKind::Withdraw,
                CommandKind::Deposit,
                CommandKind::Delete,
            ]
        );
        assert_eq!(
            emitted[2].payload,
            CommandPayload::Balance(domain::BalanceChange {
                account_id: record.account_id,
                amount: record.amount,
            })
        );
    }

    #[tokio::test]
    async fn update_with_zero_delta_skips_the_adjustment() {
        let (coordinator, bus, _) = harness();
        let original = expense(5000);
        let mut updated = original.clone();
        updated.description = "weekly groceries".to_string();

        coordinator.update(original, updated).await.unwrap();
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Update]);
    }

    #[tokio::test]
    async fn update_rejected_at_balance_step_compensates_nothing() {
        let (coordinator, bus, _) = harness();
        // Shrinking an expense credits the account back.
        bus.set_behavior(
            CommandKind::Deposit,
            ReplyBehavior::Reject {
                status: 422,
                message: "balance would exceed limit".to_string(),
            },
        );

        let original = expense(5000);
        let updated = original.with_amount(Money::from_cents(3000)).unwrap();
        let error = coordinator.update(original, updated).await.unwrap_err();

        match error {
            SagaError::Rejected { status, ref message, .. } => {
                assert_eq!(status, 422);
                assert_eq!(message, "balance would exceed limit");
            }
            ref other => panic!("expected rejection, got {other:?}"),
        }
        // The record update was never sent and no compensations fired.
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Deposit]);
    }

    #[tokio::test(start_paused = true)]
    async fn update_timeout_at_record_step_restores_original_and_delta() {
        let (coordinator, bus, _) = harness();
        bus.set_behavior(CommandKind::Update, ReplyBehavior::Silent);

        // Growing an expense debits the account further.
        let original = expense(5000);
        let updated = original.with_amount(Money::from_cents(7000)).unwrap();
        let error = coordinator.update(original.clone(), updated).await.unwrap_err();
        assert!(matches!(error, SagaError::DependencyUnavailable { .. }));

        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![
                CommandKind::Withdraw,
                CommandKind::Update,
                CommandKind::Update,
                CommandKind::Deposit,
            ]
        );
        // The compensating update restores the original record.
        assert_eq!(emitted[2].payload, CommandPayload::Record(original));
        assert!(!emitted[2].expects_reply());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_happy_path_confirms_then_refunds() {
        let (coordinator, bus, _) = harness();
        let record = expense(5000);

        coordinator.delete(record.clone()).await.unwrap();

        let emitted = bus.emitted();
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Delete, CommandKind::Deposit]);
        // The DELETE itself is fire-and-forget; confirmation is the probe.
        assert!(!emitted[0].expects_reply());
        assert!(emitted[1].expects_reply());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_aborts_when_the_record_is_still_present() {
        let (coordinator, bus, query) = harness();
        let record = expense(5000);
        query.insert(record.clone());

        let error = coordinator.delete(record).await.unwrap_err();
        assert!(matches!(error, SagaError::DeleteUnconfirmed { .. }));
        assert_eq!(error.status_code(), 409);

        // Only the DELETE went out; no balance change, no compensations.
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Delete]);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_probe_failure_aborts_without_side_effects() {
        let (coordinator, bus, query) = harness();
        query.set_unavailable(true);

        let error = coordinator.delete(expense(5000)).await.unwrap_err();
        assert!(matches!(error, SagaError::DependencyUnavailable { .. }));
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Delete]);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_timeout_at_balance_step_reinstates_the_record() {
        let (coordinator, bus, _) = harness();
        bus.set_behavior(CommandKind::Deposit, ReplyBehavior::Silent);

        let record = expense(5000);
        let error = coordinator.delete(record.clone()).await.unwrap_err();
        assert!(matches!(error, SagaError::DependencyUnavailable { .. }));

        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![
                CommandKind::Delete,
                CommandKind::Deposit,
                CommandKind::Withdraw,
                CommandKind::Create,
            ]
        );
        assert_eq!(emitted[3].payload, CommandPayload::Record(record));
    }

    #[tokio::test]
    async fn protocol_violation_fires_no_compensations() {
        let (coordinator, bus, _) = harness();
        bus.set_behavior(CommandKind::Withdraw, ReplyBehavior::Malformed);

        let error = coordinator.create(expense(5000)).await.unwrap_err();
        assert!(matches!(error, SagaError::Protocol { .. }));
        assert_eq!(error.status_code(), 502);

        // The create applied, but the malformed adjustment response is fatal:
        // no table-driven compensation is attempted.
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Create, CommandKind::Withdraw]);
    }

    #[tokio::test]
    async fn transfer_records_are_refused() {
        let (coordinator, bus, _) = harness();
        let record = FinancialRecord::transfer(
            AccountId::new(),
            AccountId::new(),
            Money::from_cents(100),
            "misrouted",
        )
        .unwrap();

        let error = coordinator.create(record).await.unwrap_err();
        assert!(matches!(error, SagaError::Record(_)));
        assert_eq!(bus.emitted_count(), 0);
    }
}
