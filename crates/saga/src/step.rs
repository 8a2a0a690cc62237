//! Step execution: emit one command, await its response, classify the result.

use std::time::Duration;

use common::CorrelationId;
use transport::{
    CommandEmitter, CommandEnvelope, Outcome, ResponseBroker, ResponseEnvelope, TransportError,
};

/// Classified result of one saga step.
#[derive(Debug)]
pub enum StepOutcome {
    /// The owning service acknowledged the command.
    Applied(ResponseEnvelope),

    /// The owning service rejected the command; the step did not apply.
    Rejected { status: u16, message: String },

    /// No acknowledgment within the wait window, or the transport refused
    /// the command. The remote effect may still have landed.
    Unavailable,

    /// The response violated the command/response contract.
    Protocol { detail: String },
}

/// A non-applied step outcome.
#[derive(Debug)]
pub enum StepFailure {
    /// See [`StepOutcome::Rejected`].
    Rejected { status: u16, message: String },

    /// See [`StepOutcome::Unavailable`].
    Unavailable,

    /// See [`StepOutcome::Protocol`].
    Protocol { detail: String },
}

impl StepOutcome {
    /// Splits the outcome into the applied response or the failure.
    pub fn applied(self) -> Result<ResponseEnvelope, StepFailure> {
        match self {
            StepOutcome::Applied(response) => Ok(response),
            StepOutcome::Rejected { status, message } => {
                Err(StepFailure::Rejected { status, message })
            }
            StepOutcome::Unavailable => Err(StepFailure::Unavailable),
            StepOutcome::Protocol { detail } => Err(StepFailure::Protocol { detail }),
        }
    }
}

/// Maps a step failure to its compensation anchor and terminal error.
///
/// A rejection compensates from the state actually reached; an unavailable
/// dependency compensates from the state the step would have reached had it
/// succeeded; a protocol violation has no anchor and nothing is fired.
pub(crate) fn resolve_failure<S: Copy>(
    step: &'static str,
    failure: StepFailure,
    reached: S,
    advanced: S,
) -> (Option<S>, crate::error::SagaError) {
    use crate::error::SagaError;

    match failure {
        StepFailure::Rejected { status, message } => (
            Some(reached),
            SagaError::Rejected {
                step,
                status,
                message,
            },
        ),
        StepFailure::Unavailable => (Some(advanced), SagaError::DependencyUnavailable { step }),
        StepFailure::Protocol { detail } => (None, SagaError::Protocol { step, detail }),
    }
}

/// Records metrics for a successfully finished run.
pub(crate) fn finish_completed(started: std::time::Instant) {
    metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
    metrics::counter!("saga_completed").increment(1);
}

/// Records metrics for a failed run.
pub(crate) fn finish_failed(started: std::time::Instant, error: &crate::error::SagaError) {
    metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
    metrics::counter!("saga_failed").increment(1);
    tracing::warn!(%error, status = error.status_code(), "saga failed");
}

/// Emits commands and awaits their correlated responses.
///
/// One executor is shared by all steps of a coordinator; per-step state
/// (the correlation ID) is created fresh inside [`StepExecutor::execute`].
pub struct StepExecutor<E> {
    emitter: E,
    broker: ResponseBroker,
    response_timeout: Duration,
}

impl<E: CommandEmitter> StepExecutor<E> {
    /// Creates a new step executor.
    pub fn new(emitter: E, broker: ResponseBroker, response_timeout: Duration) -> Self {
        Self {
            emitter,
            broker,
            response_timeout,
        }
    }

    /// Runs one step: stamps a fresh correlation ID, emits the command, and
    /// suspends until the matching response arrives or the wait times out.
    ///
    /// The wait is registered before emission so a response cannot arrive
    /// ahead of its waiter.
    pub async fn execute(&self, step: &'static str, mut command: CommandEnvelope) -> StepOutcome {
        let correlation_id = CorrelationId::new();
        command.correlation_id = Some(correlation_id);

        let pending = self.broker.register_wait(correlation_id, self.response_timeout);
        tracing::info!(step, %correlation_id, kind = %command.kind, "saga step started");

        if let Err(err) = self.emitter.emit(command).await {
            pending.cancel();
            tracing::warn!(step, %correlation_id, %err, "command emission failed");
            return StepOutcome::Unavailable;
        }

        match pending.wait().await {
            Ok(response) => classify(step, correlation_id, response),
            Err(TransportError::ResponseTimeout { .. }) => {
                tracing::warn!(step, %correlation_id, "no response within wait window");
                StepOutcome::Unavailable
            }
            Err(err) => StepOutcome::Protocol {
                detail: err.to_string(),
            },
        }
    }

    /// Emits a command without awaiting acknowledgment.
    ///
    /// Used for DELETE issuance and for compensations; an emission failure is
    /// logged and swallowed so the remaining commands still go out.
    pub async fn fire(&self, command: CommandEnvelope) {
        let kind = command.kind;
        if let Err(err) = self.emitter.emit(command).await {
            tracing::warn!(%kind, %err, "fire-and-forget emission failed");
        }
    }

    /// Fires an ordered list of compensation commands, without awaiting
    /// their acknowledgments.
    pub async fn fire_compensations(&self, commands: Vec<CommandEnvelope>, failed_step: &'static str) {
        if commands.is_empty() {
            return;
        }
        metrics::counter!("saga_compensations_total").increment(commands.len() as u64);
        tracing::warn!(
            step = failed_step,
            count = commands.len(),
            "firing compensations"
        );
        for command in commands {
            self.fire(command).await;
        }
    }
}

fn classify(
    step: &'static str,
    expected: CorrelationId,
    response: ResponseEnvelope,
) -> StepOutcome {
    if response.correlation_id != expected {
        return StepOutcome::Protocol {
            detail: format!(
                "correlation mismatch: expected {expected}, got {}",
                response.correlation_id
            ),
        };
    }

    match response.outcome {
        Outcome::Success if (200..300).contains(&response.status_code) => {
            tracing::info!(step, "saga step applied");
            StepOutcome::Applied(response)
        }
        Outcome::Success => StepOutcome::Protocol {
            detail: format!("success outcome with status {}", response.status_code),
        },
        Outcome::Error if response.status_code >= 400 => StepOutcome::Rejected {
            status: response.status_code,
            message: response.message,
        },
        Outcome::Error => StepOutcome::Protocol {
            detail: format!("error outcome with status {}", response.status_code),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use common::{AccountId, Money};
    use transport::{CommandKind, InMemoryCommandBus, ReplyBehavior};

    fn executor(timeout: Duration) -> (StepExecutor<InMemoryCommandBus>, InMemoryCommandBus) {
        let broker = ResponseBroker::new();
        let bus = InMemoryCommandBus::new(broker.clone());
        (StepExecutor::new(bus.clone(), broker, timeout), bus)
    }

    fn withdraw_command() -> CommandEnvelope {
        commands::withdraw(AccountId::new(), Money::from_cents(5000))
    }

    #[tokio::test]
    async fn acknowledged_step_is_applied() {
        let (executor, bus) = executor(Duration::from_secs(5));

        let outcome = executor.execute("withdraw", withdraw_command()).await;
        assert!(matches!(outcome, StepOutcome::Applied(_)));
        assert_eq!(bus.emitted_kinds(), vec![CommandKind::Withdraw]);
        assert!(bus.emitted()[0].expects_reply());
    }

    #[tokio::test]
    async fn rejection_carries_status_and_message() {
        let (executor, bus) = executor(Duration::from_secs(5));
        bus.set_behavior(
            CommandKind::Withdraw,
            ReplyBehavior::Reject {
                status: 422,
                message: "insufficient funds".to_string(),
            },
        );

        let outcome = executor.execute("withdraw", withdraw_command()).await;
        match outcome {
            StepOutcome::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "insufficient funds");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silence_classifies_as_unavailable() {
        let (executor, bus) = executor(Duration::from_secs(2));
        bus.set_behavior(CommandKind::Withdraw, ReplyBehavior::Silent);

        let outcome = executor.execute("withdraw", withdraw_command()).await;
        assert!(matches!(outcome, StepOutcome::Unavailable));
    }

    #[tokio::test]
    async fn emit_failure_classifies_as_unavailable_and_cleans_up() {
        let (executor, bus) = executor(Duration::from_secs(5));
        bus.set_behavior(CommandKind::Withdraw, ReplyBehavior::EmitError);

        let outcome = executor.execute("withdraw", withdraw_command()).await;
        assert!(matches!(outcome, StepOutcome::Unavailable));
        assert_eq!(bus.emitted_count(), 0);
    }

    #[tokio::test]
    async fn malformed_response_classifies_as_protocol() {
        let (executor, bus) = executor(Duration::from_secs(5));
        bus.set_behavior(CommandKind::Withdraw, ReplyBehavior::Malformed);

        let outcome = executor.execute("withdraw", withdraw_command()).await;
        assert!(matches!(outcome, StepOutcome::Protocol { .. }));
    }

    #[tokio::test]
    async fn each_execution_uses_a_fresh_correlation_id() {
        let (executor, bus) = executor(Duration::from_secs(5));

        executor.execute("withdraw", withdraw_command()).await;
        executor.execute("withdraw", withdraw_command()).await;

        let emitted = bus.emitted();
        assert_ne!(emitted[0].correlation_id, emitted[1].correlation_id);
    }

    #[tokio::test]
    async fn fire_compensations_emits_without_correlation() {
        let (executor, bus) = executor(Duration::from_secs(5));
        let account_id = AccountId::new();

        executor
            .fire_compensations(
                vec![
                    commands::deposit(account_id, Money::from_cents(100)),
                    commands::withdraw(account_id, Money::from_cents(100)),
                ],
                "withdraw",
            )
            .await;

        let emitted = bus.emitted();
        assert_eq!(emitted.len(), 2);
        assert!(emitted.iter().all(|command| !command.expects_reply()));
    }
}
