use crate::config::RetryPolicy;
use crate::error::{CapabilityError, IngestError};
use crate::models::{Degradation, Stage};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Result of one pipeline stage.
///
/// `Degraded` means the stage recovered by producing nothing (an upstream
/// capability failed, timed out, or answered with something unusable).
/// `Fault` means the pipeline itself broke and the ingestion must end in ERROR.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Ok(T),
    Degraded(String),
    Fault(String),
}

impl<T> StageOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// Collapses the outcome into a value, recording degradations and
    /// turning faults into an [`IngestError`].
    pub fn resolve(self, stage: Stage, notes: &mut Vec<Degradation>) -> Result<T, IngestError>
    where
        T: Default,
    {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Degraded(reason) => {
                warn!(stage = %stage, reason = %reason, "stage degraded to empty result");
                notes.push(Degradation { stage, reason });
                Ok(T::default())
            }
            Self::Fault(reason) => Err(IngestError::StageFault {
                stage: stage.to_string(),
                reason,
            }),
        }
    }
}

/// Runs an upstream call with a per-attempt timeout and the configured retry budget.
pub async fn call_bounded<T, F, Fut>(
    service: &str,
    timeout: Duration,
    retry: RetryPolicy,
    mut call: F,
) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let mut attempt = 0u32;

    loop {
        let result = match tokio::time::timeout(timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout {
                service: service.to_string(),
                seconds: timeout.as_secs_f64(),
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(error) if attempt < retry.max_retries => {
                let backoff = retry.backoff_for(attempt);
                warn!(
                    service,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "retrying upstream call"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
