//! Operator gate: cooperative suspension points for manual steps.
//!
//! The login surface (CAPTCHA, 2FA) cannot be driven programmatically, so
//! the pipeline suspends and hands control to a human. The gate is modeled
//! as an explicit state machine advanced by [`GateCommand`]s; the actual
//! operator surface (a terminal prompt, or a scripted fake in tests) lives
//! behind the [`OperatorGate`] trait, so the automation driver never touches
//! stdin directly.
//!
//! Gates block indefinitely by design — there is no timeout on a CAPTCHA.

/// State of a manual-step gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for the operator to finish the manual step.
    AwaitingManualStep,
    /// Operator reported done; the caller is verifying the result.
    Verifying,
    /// Manual step complete and verified (or overridden).
    Ready,
    /// Operator gave up.
    Aborted,
}

/// Commands that advance a [`GateState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCommand {
    /// Operator typed `done`.
    Done,
    /// Operator typed `abort`.
    Abort,
    /// Caller verified the manual step succeeded.
    VerifyOk,
    /// Caller could not verify the manual step.
    VerifyFailed,
    /// Operator chose to proceed despite failed verification.
    Override,
}

impl GateState {
    /// Advance the state machine. Commands that make no sense in the current
    /// state leave it unchanged; terminal states absorb everything.
    pub fn advance(self, command: GateCommand) -> GateState {
        use GateCommand::*;
        use GateState::*;

        match (self, command) {
            (AwaitingManualStep, Done) => Verifying,
            (AwaitingManualStep, Abort) => Aborted,
            (AwaitingManualStep, Override) => Ready,
            (Verifying, VerifyOk) => Ready,
            (Verifying, VerifyFailed) => AwaitingManualStep,
            (Verifying, Abort) => Aborted,
            (state, _) => state,
        }
    }

    /// Whether the gate reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, GateState::Ready | GateState::Aborted)
    }
}

/// The operator-facing surface of a gate.
///
/// Implementations must block until they have an answer and must accept only
/// the closed vocabulary, re-prompting on anything else. They must never
/// time out on their own.
pub trait OperatorGate: Send + Sync {
    /// Print `instructions`, then block until the operator answers `done`
    /// (→ [`GateCommand::Done`]) or `abort` (→ [`GateCommand::Abort`]).
    fn await_manual_step(&self, instructions: &str) -> GateCommand;

    /// Ask whether to proceed despite a problem. `yes` means proceed;
    /// anything else means stop.
    fn confirm_continue(&self, warning: &str) -> bool;
}

/// A gate that never suspends: manual steps are treated as complete and
/// continue-questions answered "no". Used with `--no-interactive`.
pub struct NonInteractiveGate;

impl OperatorGate for NonInteractiveGate {
    fn await_manual_step(&self, _instructions: &str) -> GateCommand {
        GateCommand::Done
    }

    fn confirm_continue(&self, _warning: &str) -> bool {
        false
    }
}
