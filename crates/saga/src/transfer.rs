//! Saga coordinator for inter-account transfers.
//!
//! A transfer touches two accounts: the source is debited, the target
//! credited. Steps run strictly in that order on the forward path and are
//! unwound target-first on the compensation path.

use std::time::Instant;

use common::{AccountId, Money};
use domain::FinancialRecord;
use transport::{CommandEmitter, ResponseBroker};

use crate::commands;
use crate::compensation;
use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::services::RecordQueryService;
use crate::state::TransferSagaState;
use crate::step::{StepExecutor, StepFailure, finish_completed, finish_failed, resolve_failure};

/// Step name: create the transfer record at the owning service.
pub const STEP_CREATE_TRANSFER: &str = "create_transfer";

/// Step name: debit the source account.
pub const STEP_WITHDRAW_SOURCE: &str = "withdraw_source";

/// Step name: credit the target account.
pub const STEP_DEPOSIT_TARGET: &str = "deposit_target";

/// Step name: apply the amount delta to the source account.
pub const STEP_UPDATE_SOURCE_BALANCE: &str = "update_source_balance";

/// Step name: apply the amount delta to the target account.
pub const STEP_UPDATE_TARGET_BALANCE: &str = "update_target_balance";

/// Step name: apply the transfer record update at the owning service.
pub const STEP_UPDATE_TRANSFER: &str = "update_transfer";

/// Step name: confirm the delete via the existence probe.
pub const STEP_CONFIRM_DELETE: &str = "confirm_delete";

/// Step name: debit the transferred amount back out of the target account.
pub const STEP_WITHDRAW_TARGET: &str = "withdraw_target";

/// Step name: credit the transferred amount back to the source account.
pub const STEP_DEPOSIT_SOURCE: &str = "deposit_source";

/// Orchestrates create/update/delete sagas for transfers.
pub struct TransferSagaCoordinator<E, Q> {
    steps: StepExecutor<E>,
    query: Q,
    config: SagaConfig,
}

impl<E, Q> TransferSagaCoordinator<E, Q>
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

    /// Runs the create saga: create the record, debit the source account,
    /// credit the target account.
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn create(&self, record: FinancialRecord) -> Result<FinancialRecord, SagaError> {
        let to_account = record.to_account_id()?;
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let command = commands::create_record(&record);
        if let Err(failure) = self.steps.execute(STEP_CREATE_TRANSFER, command).await.applied() {
            return Err(self
                .fail_create(
                    &record,
                    to_account,
                    TransferSagaState::Init,
                    TransferSagaState::RecordCreated,
                    STEP_CREATE_TRANSFER,
                    failure,
                    saga_start,
                )
                .await);
        }

        let command = commands::withdraw(record.account_id, record.amount);
        if let Err(failure) = self.steps.execute(STEP_WITHDRAW_SOURCE, command).await.applied() {
            return Err(self
                .fail_create(
                    &record,
                    to_account,
                    TransferSagaState::RecordCreated,
                    TransferSagaState::FromWithdrawn,
                    STEP_WITHDRAW_SOURCE,
                    failure,
                    saga_start,
                )
                .await);
        }

        let command = commands::deposit(to_account, record.amount);
        if let Err(failure) = self.steps.execute(STEP_DEPOSIT_TARGET, command).await.applied() {
            return Err(self
                .fail_create(
                    &record,
                    to_account,
                    TransferSagaState::FromWithdrawn,
                    TransferSagaState::ToDeposited,
                    STEP_DEPOSIT_TARGET,
                    failure,
                    saga_start,
                )
                .await);
        }

        finish_completed(saga_start);
        tracing::info!("transfer created");
        Ok(record)
    }

    /// Runs the update saga: apply the amount delta to the source account,
    /// then to the target account (both skipped when the delta is zero),
    /// then apply the record update.
    ///
    /// The account pair is fixed for the life of a transfer; moving one
    /// between accounts is a delete followed by a create.
    #[tracing::instrument(skip(self, original, updated), fields(record_id = %original.id))]
    pub async fn update(
        &self,
        original: FinancialRecord,
        updated: FinancialRecord,
    ) -> Result<FinancialRecord, SagaError> {
        let to_account = original.to_account_id()?;
        debug_assert_eq!(original.id, updated.id);
        debug_assert_eq!(original.account_id, updated.account_id);
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        // A larger amount debits the source further and credits the target
        // further; a smaller amount flows the other way.
        let diff = updated.amount - original.amount;
        let from_delta = -diff;
        let to_delta = diff;
        let mut applied_from = Money::zero();
        let mut applied_to = Money::zero();
        let mut reached = TransferSagaState::Init;

        if let Some(command) = commands::adjustment(original.account_id, from_delta) {
            if let Err(failure) = self
                .steps
                .execute(STEP_UPDATE_SOURCE_BALANCE, command)
                .await
                .applied()
            {
                return Err(self
                    .fail_update(
                        &original,
                        to_account,
                        (TransferSagaState::Init, Money::zero(), Money::zero()),
                        (
                            TransferSagaState::FromAccountUpdated,
                            from_delta,
                            Money::zero(),
                        ),
                        STEP_UPDATE_SOURCE_BALANCE,
                        failure,
                        saga_start,
                    )
                    .await);
            }
            applied_from = from_delta;
            reached = TransferSagaState::FromAccountUpdated;
        }

        if let Some(command) = commands::adjustment(to_account, to_delta) {
            if let Err(failure) = self
                .steps
                .execute(STEP_UPDATE_TARGET_BALANCE, command)
                .await
                .applied()
            {
                return Err(self
                    .fail_update(
                        &original,
                        to_account,
                        (reached, applied_from, Money::zero()),
                        (TransferSagaState::ToAccountUpdated, applied_from, to_delta),
                        STEP_UPDATE_TARGET_BALANCE,
                        failure,
                        saga_start,
                    )
                    .await);
            }
            applied_to = to_delta;
            reached = TransferSagaState::ToAccountUpdated;
        }

        let command = commands::update_record(&updated);
        if let Err(failure) = self.steps.execute(STEP_UPDATE_TRANSFER, command).await.applied() {
            return Err(self
                .fail_update(
                    &original,
                    to_account,
                    (reached, applied_from, applied_to),
                    (TransferSagaState::RecordUpdated, applied_from, applied_to),
                    STEP_UPDATE_TRANSFER,
                    failure,
                    saga_start,
                )
                .await);
        }

        finish_completed(saga_start);
        tracing::info!("transfer updated");
        Ok(updated)
    }

    /// Runs the delete saga: issue the DELETE, confirm it via the existence
    /// probe after a grace period, then unwind the transfer target-first.
    #[tracing::instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn delete(&self, record: FinancialRecord) -> Result<(), SagaError> {
        let to_account = record.to_account_id()?;
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

        let command = commands::withdraw(to_account, record.amount);
        if let Err(failure) = self.steps.execute(STEP_WITHDRAW_TARGET, command).await.applied() {
            return Err(self
                .fail_delete(
                    &record,
                    to_account,
                    TransferSagaState::RecordDeleted,
                    TransferSagaState::ToWithdrawn,
                    STEP_WITHDRAW_TARGET,
                    failure,
                    saga_start,
                )
                .await);
        }

        let command = commands::deposit(record.account_id, record.amount);
        if let Err(failure) = self.steps.execute(STEP_DEPOSIT_SOURCE, command).await.applied() {
            return Err(self
                .fail_delete(
                    &record,
                    to_account,
                    TransferSagaState::ToWithdrawn,
                    TransferSagaState::FromDeposited,
                    STEP_DEPOSIT_SOURCE,
                    failure,
                    saga_start,
                )
                .await);
        }

        finish_completed(saga_start);
        tracing::info!("transfer deleted");
        Ok(())
    }

    async fn fail_create(
        &self,
        record: &FinancialRecord,
        to_account: AccountId,
        reached: TransferSagaState,
        advanced: TransferSagaState,
        step: &'static str,
        failure: StepFailure,
        saga_start: Instant,
    ) -> SagaError {
        let (anchor, error) = resolve_failure(step, failure, reached, advanced);
        if let Some(anchor) = anchor {
            let inverses = compensation::create_transfer_compensations(record, to_account, anchor);
            self.steps.fire_compensations(inverses, step).await;
        }
        finish_failed(saga_start, &error);
        error
    }

    #[allow(clippy::too_many_arguments)]
    async fn fail_update(
        &self,
        original: &FinancialRecord,
        to_account: AccountId,
        reached: (TransferSagaState, Money, Money),
        advanced: (TransferSagaState, Money, Money),
        step: &'static str,
        failure: StepFailure,
        saga_start: Instant,
    ) -> SagaError {
        let (anchor, error) = resolve_failure(step, failure, reached, advanced);
        if let Some((state, applied_from, applied_to)) = anchor {
            let inverses = compensation::update_transfer_compensations(
                original,
                to_account,
                applied_from,
                applied_to,
                state,
            );
            self.steps.fire_compensations(inverses, step).await;
        }
        finish_failed(saga_start, &error);
        error
    }

    async fn fail_delete(
        &self,
        record: &FinancialRecord,
        to_account: AccountId,
        reached: TransferSagaState,
        advanced: TransferSagaState,
        step: &'static str,
        failure: StepFailure,
        saga_start: Instant,
    ) -> SagaError {
        let (anchor, error) = resolve_failure(step, failure, reached, advanced);
        if let Some(anchor) = anchor {
            let inverses = compensation::delete_transfer_compensations(record, to_account, anchor);
            self.steps.fire_compensations(inverses, step).await;
        }
        finish_failed(saga_start, &error);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::CommandPayload;
    use std::time::Duration;
    use transport::{CommandKind, InMemoryCommandBus, ReplyBehavior};

    use crate::services::InMemoryRecordQueryService;

    type TestCoordinator = TransferSagaCoordinator<InMemoryCommandBus, InMemoryRecordQueryService>;

    fn harness() -> (TestCoordinator, InMemoryCommandBus, InMemoryRecordQueryService) {
        let broker = ResponseBroker::new();
        let bus = InMemoryCommandBus::new(broker.clone());
        let query = InMemoryRecordQueryService::new();
        let config = SagaConfig {
            response_timeout: Duration::from_secs(2),
            delete_confirm_delay: Duration::from_millis(10),
        };
        let coordinator = TransferSagaCoordinator::new(bus.clone(), broker, query.clone(), config);
        (coordinator, bus, query)
    }

    fn transfer(amount_cents: i64) -> FinancialRecord {
        FinancialRecord::transfer(
            AccountId::new(),
            AccountId::new(),
            Money::from_cents(amount_cents),
            "savings",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_happy_path_debits_source_then_credits_target() {
        let (coordinator, bus, _) = harness();
        let record = transfer(10_000);
        let to_account = record.to_account_id().unwrap();

        coordinator.create(record.clone()).await.unwrap();

        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![CommandKind::Create, CommandKind::Withdraw, CommandKind::Deposit]
        );
        assert_eq!(emitted[1].subject_key, record.account_id.to_string());
        assert_eq!(emitted[2].subject_key, to_account.to_string());
        assert!(emitted.iter().all(|command| command.expects_reply()));
    }

    #[tokio::test]
    async fn create_rejected_at_source_withdrawal_deletes_the_record() {
        let (coordinator, bus, _) = harness();
        bus.set_behavior(
            CommandKind::Withdraw,
            ReplyBehavior::Reject {
                status: 422,
                message: "insufficient funds".to_string(),
            },
        );

        let error = coordinator.create(transfer(10_000)).await.unwrap_err();
        assert_eq!(error.status_code(), 422);
        assert_eq!(
            bus.emitted_kinds(),
            vec![CommandKind::Create, CommandKind::Withdraw, CommandKind::Delete]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_timeout_at_target_deposit_unwinds_everything() {
        let (coordinator, bus, _) = harness();
        bus.set_behavior(CommandKind::Deposit, ReplyBehavior::Silent);

        let record = transfer(10_000);
        let to_account = record.to_account_id().unwrap();
        let error = coordinator.create(record.clone()).await.unwrap_err();
        assert!(matches!(error, SagaError::DependencyUnavailable { .. }));

        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![
                CommandKind::Create,
                CommandKind::Withdraw,
                CommandKind::Deposit,
                CommandKind::Withdraw,
                CommandKind::Deposit,
                CommandKind::Delete,
            ]
        );
        // Unwind order: target first, then source, then the record.
        assert_eq!(emitted[3].subject_key, to_account.to_string());
        assert_eq!(emitted[4].subject_key, record.account_id.to_string());
    }

    #[tokio::test]
    async fn update_increase_adjusts_source_then_target() {
        let (coordinator, bus, _) = harness();
        let original = transfer(10_000);
        let to_account = original.to_account_id().unwrap();
        let updated = original.with_amount(Money::from_cents(15_000)).unwrap();

        coordinator.update(original.clone(), updated).await.unwrap();

        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![CommandKind::Withdraw, CommandKind::Deposit, CommandKind::Update]
        );
        assert_eq!(emitted[0].subject_key, original.account_id.to_string());
        assert_eq!(emitted[1].subject_key, to_account.to_string());
        assert_eq!(
            emitted[0].payload,
            CommandPayload::Balance(domain::BalanceChange {
                account_id: original.account_id,
                amount: Money::from_cents(5000),
            })
        );
    }

    #[tokio::test]
    async fn update_decrease_flows_the_other_way() {
        let (coordinator, bus, _) = harness();
        let original = transfer(10_000);
        let updated = original.with_amount(Money::from_cents(8000)).unwrap();

        coordinator.update(original, updated).await.unwrap();
        assert_eq!(
            bus.emitted_kinds(),
            vec![CommandKind::Deposit, CommandKind::Withdraw, CommandKind::Update]
        );
    }

    #[tokio::test]
    async fn update_with_zero_delta_only_updates_the_record() {
        let (coordinator, bus, _) = harness();
        let original = transfer(10_000);
        let mut updated = original.clone();
        updated.description = "monthly savings".to_string();

        coordinator.update(original, updated).await.unwrap();
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Update]);
    }

    #[tokio::test]
    async fn update_rejected_at_target_unwinds_the_source() {
        let (coordinator, bus, _) = harness();
        // Increase: source is withdrawn first, target deposit is rejected.
        bus.set_behavior(
            CommandKind::Deposit,
            ReplyBehavior::Reject {
                status: 404,
                message: "account not found".to_string(),
            },
        );

        let original = transfer(10_000);
        let updated = original.with_amount(Money::from_cents(15_000)).unwrap();
        let error = coordinator.update(original.clone(), updated).await.unwrap_err();
        assert_eq!(error.status_code(), 404);

        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![CommandKind::Withdraw, CommandKind::Deposit, CommandKind::Deposit]
        );
        // The compensation re-credits the source account.
        assert_eq!(emitted[2].subject_key, original.account_id.to_string());
        assert!(!emitted[2].expects_reply());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_happy_path_unwinds_target_first() {
        let (coordinator, bus, _) = harness();
        let record = transfer(10_000);
        let to_account = record.to_account_id().unwrap();

        coordinator.delete(record.clone()).await.unwrap();

        let emitted = bus.emitted();
        assert_eq!(
            bus.emitted_kinds(),
            vec![CommandKind::Delete, CommandKind::Withdraw, CommandKind::Deposit]
        );
        assert!(!emitted[0].expects_reply());
        assert_eq!(emitted[1].subject_key, to_account.to_string());
        assert_eq!(emitted[2].subject_key, record.account_id.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_aborts_when_the_record_is_still_present() {
        let (coordinator, bus, query) = harness();
        let record = transfer(10_000);
        query.insert(record.clone());

        let error = coordinator.delete(record).await.unwrap_err();
        assert!(matches!(error, SagaError::DeleteUnconfirmed { .. }));
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Delete]);
    }

    #[tokio::test]
    async fn non_transfer_records_are_refused() {
        let (coordinator, bus, _) = harness();
        let record =
            FinancialRecord::expense(AccountId::new(), Money::from_cents(100), "misrouted")
                .unwrap();

        let error = coordinator.create(record).await.unwrap_err();
        assert!(matches!(error, SagaError::Record(_)));
        assert_eq!(bus.emitted_count(), 0);
    }
}
