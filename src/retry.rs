//! Validation-gated copy generation.
//!
//! Each retry carries the blocking errors of the previous attempt into the
//! next prompt. Transport and parse failures are never retried here.

use tracing::{info, warn};

use crate::document::DetailPage;
use crate::llm::{CopyGenerator, CopyRequest, LlmError};
use crate::models::SellerInput;
use crate::validation::{validate, CategoryKey, ValidationReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    Validating { attempt: u32 },
    Retrying { attempt: u32, feedback: Vec<String> },
    Succeeded { attempt: u32 },
    ExhaustedInvalid { attempt: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Done,
    Retry(Vec<String>),
}

/// Bounded attempt counter driven by validation outcomes.
#[derive(Debug, Clone)]
pub struct RetryMachine {
    max_attempts: u32,
    state: RetryState,
}

impl RetryMachine {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), state: RetryState::Attempting { attempt: 1 } }
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempt(&self) -> u32 {
        match &self.state {
            RetryState::Attempting { attempt }
            | RetryState::Validating { attempt }
            | RetryState::Retrying { attempt, .. }
            | RetryState::Succeeded { attempt }
            | RetryState::ExhaustedInvalid { attempt } => *attempt,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RetryState::Succeeded { .. } | RetryState::ExhaustedInvalid { .. })
    }

    /// A draft arrived for the current attempt.
    pub fn drafted(&mut self) {
        if let RetryState::Attempting { attempt } = self.state {
            self.state = RetryState::Validating { attempt };
        }
    }

    pub fn validated(&mut self, report: &ValidationReport) -> Step {
        let attempt = self.attempt();
        if report.valid {
            self.state = RetryState::Succeeded { attempt };
            Step::Done
        } else if attempt >= self.max_attempts {
            self.state = RetryState::ExhaustedInvalid { attempt };
            Step::Done
        } else {
            self.state = RetryState::Retrying { attempt, feedback: report.errors.clone() };
            Step::Retry(report.errors.clone())
        }
    }

    /// Leave `Retrying` for the next attempt.
    pub fn next_attempt(&mut self) {
        if let RetryState::Retrying { attempt, .. } = self.state {
            self.state = RetryState::Attempting { attempt: attempt + 1 };
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedCopy {
    pub document: DetailPage,
    pub report: ValidationReport,
    pub attempts: u32,
    pub llm_time_ms: u64,
}

/// Returns the last document produced together with its report; the caller
/// decides what an invalid final document means.
pub async fn generate_validated_copy(
    generator: &dyn CopyGenerator,
    seller: &SellerInput,
    category: CategoryKey,
    max_attempts: u32,
) -> Result<ValidatedCopy, LlmError> {
    let mut machine = RetryMachine::new(max_attempts);
    let mut feedback = Vec::new();
    let mut llm_time_ms = 0;

    loop {
        let request = CopyRequest { seller: seller.clone(), category, feedback: std::mem::take(&mut feedback) };
        let draft = generator.generate_copy(&request).await?;
        llm_time_ms += draft.elapsed_ms;
        machine.drafted();

        let report = validate(&draft.document, category);
        match machine.validated(&report) {
            Step::Done => {
                info!(
                    "🧾 Copy gate finished after {}/{} attempt(s): valid={} errors={} warnings={}",
                    machine.attempt(),
                    machine.max_attempts(),
                    report.valid,
                    report.errors.len(),
                    report.warnings.len()
                );
                return Ok(ValidatedCopy {
                    document: draft.document,
                    report,
                    attempts: machine.attempt(),
                    llm_time_ms,
                });
            }
            Step::Retry(errors) => {
                warn!("🔁 Attempt {} failed validation, retrying with {} error(s)", machine.attempt(), errors.len());
                feedback = errors;
                machine.next_attempt();
            }
        }
    }
}
