//! Fixed-interval polling of a predicate over cluster state.
//!
//! A [`Validator`] evaluates a predicate until it passes, reports a fatal
//! condition, or the next attempt would land after the request's timeout.
//! Attempts scheduled exactly at the deadline still run, so a predicate that
//! costs nothing is evaluated `floor(timeout / interval) + 1` times.

use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::CoreError;
use chrono::{DateTime, Utc};
use plumb_driver::{ClusterStateProvider, ProviderError};
use plumb_schema::{UnclassifiedErrorPolicy, WindowSection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Verdict of one predicate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Pass,
    Retry(String),
    Fatal(String),
}

impl Check {
    pub fn retry(reason: impl Into<String>) -> Self {
        Check::Retry(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Check::Fatal(reason.into())
    }
}

/// What the predicate is validating, plus free-form options such as the
/// app's volume options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationContext {
    pub subject: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub name: String,
    pub context: ValidationContext,
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl ValidationRequest {
    pub fn new(name: impl Into<String>, timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            name: name.into(),
            context: ValidationContext::default(),
            timeout,
            retry_interval,
        }
    }

    pub fn from_window(name: impl Into<String>, window: &WindowSection) -> Self {
        Self::new(name, window.timeout(), window.retry_interval())
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.context.subject = subject.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: BTreeMap<String, String>) -> Self {
        self.context.options = options;
        self
    }

    /// A zero timeout or zero interval means exactly one evaluation.
    pub fn is_single_shot(&self) -> bool {
        self.timeout.is_zero() || self.retry_interval.is_zero()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Succeeded => write!(f, "succeeded"),
            ValidationStatus::Failed => write!(f, "failed"),
            ValidationStatus::TimedOut => write!(f, "timed out"),
            ValidationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum AttemptResult {
    Pass,
    Retry(String),
    Fatal(String),
    /// Provider error the predicate did not classify.
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    /// Offset from the start of the validation.
    pub offset: Duration,
    pub result: AttemptResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationOutcome {
    pub name: String,
    pub status: ValidationStatus,
    pub attempts: u32,
    pub elapsed: Duration,
    pub last_error: Option<String>,
    pub history: Vec<Attempt>,
    pub started_at: DateTime<Utc>,
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ValidationStatus::Succeeded
    }

    /// Turn anything but success into [`CoreError::ValidationFailed`].
    pub fn ensure(self) -> Result<Self, CoreError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(CoreError::ValidationFailed {
            name: self.name,
            status: self.status,
            attempts: self.attempts,
            reason: self
                .last_error
                .unwrap_or_else(|| "no attempt was made".to_owned()),
        })
    }
}

pub struct Validator {
    provider: Arc<dyn ClusterStateProvider>,
    clock: Arc<dyn Clock>,
    policy: UnclassifiedErrorPolicy,
}

impl Validator {
    pub fn new(provider: Arc<dyn ClusterStateProvider>) -> Self {
        Self {
            provider,
            clock: Arc::new(SystemClock::new()),
            policy: UnclassifiedErrorPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: UnclassifiedErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> UnclassifiedErrorPolicy {
        self.policy
    }

    pub fn validate<F>(
        &self,
        request: &ValidationRequest,
        cancel: &CancelToken,
        mut predicate: F,
    ) -> ValidationOutcome
    where
        F: FnMut(&dyn ClusterStateProvider, &ValidationContext) -> Result<Check, ProviderError>,
    {
        let started_at = Utc::now();
        let t0 = self.clock.now();
        let elapsed = || self.clock.now().saturating_sub(t0);

        let mut history: Vec<Attempt> = Vec::new();
        let mut last_error: Option<String> = None;
        let mut previous_unclassified: Option<String> = None;

        let finish = |status: ValidationStatus, history: Vec<Attempt>, last_error: Option<String>| {
            ValidationOutcome {
                name: request.name.clone(),
                status,
                attempts: history.len() as u32,
                elapsed: elapsed(),
                last_error,
                history,
                started_at,
            }
        };

        loop {
            if cancel.is_cancelled() {
                info!(validation = %request.name, "cancelled before attempt {}", history.len() + 1);
                return finish(ValidationStatus::Cancelled, history, last_error);
            }

            let number = history.len() as u32 + 1;
            let offset = elapsed();
            let (result, verdict) = match predicate(self.provider.as_ref(), &request.context) {
                Ok(check) => {
                    previous_unclassified = None;
                    let result = match &check {
                        Check::Pass => AttemptResult::Pass,
                        Check::Retry(reason) => AttemptResult::Retry(reason.clone()),
                        Check::Fatal(reason) => AttemptResult::Fatal(reason.clone()),
                    };
                    (result, check)
                }
                Err(err) => {
                    let message = err.to_string();
                    let verdict = match self.policy {
                        UnclassifiedErrorPolicy::Retry => {
                            warn!(
                                validation = %request.name,
                                attempt = number,
                                error = %message,
                                "unclassified predicate error, retrying"
                            );
                            Check::Retry(message.clone())
                        }
                        UnclassifiedErrorPolicy::Fatal => Check::Fatal(message.clone()),
                        UnclassifiedErrorPolicy::EscalateOnRepeat => {
                            if previous_unclassified.as_deref() == Some(message.as_str()) {
                                Check::Fatal(format!("repeated unclassified error: {message}"))
                            } else {
                                warn!(
                                    validation = %request.name,
                                    attempt = number,
                                    error = %message,
                                    "unclassified predicate error, retrying once"
                                );
                                Check::Retry(message.clone())
                            }
                        }
                    };
                    previous_unclassified = Some(message.clone());
                    (AttemptResult::Error(message), verdict)
                }
            };
            history.push(Attempt {
                number,
                offset,
                result,
            });

            match verdict {
                Check::Pass => {
                    info!(validation = %request.name, attempts = number, "validation succeeded");
                    return finish(ValidationStatus::Succeeded, history, last_error);
                }
                Check::Fatal(reason) => {
                    warn!(validation = %request.name, attempts = number, reason = %reason, "validation failed");
                    return finish(ValidationStatus::Failed, history, Some(reason));
                }
                Check::Retry(reason) => {
                    debug!(validation = %request.name, attempt = number, reason = %reason, "not ready");
                    last_error = Some(reason);
                }
            }

            if request.is_single_shot()
                || elapsed().saturating_add(request.retry_interval) > request.timeout
            {
                warn!(
                    validation = %request.name,
                    attempts = number,
                    timeout_secs = request.timeout.as_secs_f64(),
                    "validation timed out"
                );
                return finish(ValidationStatus::TimedOut, history, last_error);
            }

            if !self.clock.sleep(request.retry_interval, cancel) {
                info!(validation = %request.name, "cancelled while waiting to retry");
                return finish(ValidationStatus::Cancelled, history, last_error);
            }
        }
    }
}
