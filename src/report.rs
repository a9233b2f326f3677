use crate::attendance::{PassengerId, Status};
use crate::config;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Point-in-time copy of the attendance of a ride, as handed to management.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub records: BTreeMap<PassengerId, Status>,
    pub present: usize,
    pub absent: usize,
    pub total: usize,
    pub taken_at: DateTime<Utc>,
}

impl AttendanceReport {
    pub fn new(records: impl IntoIterator<Item = (PassengerId, Status)>) -> Self {
        let records: BTreeMap<_, _> = records.into_iter().collect();
        let present = records.values().filter(|&&s| s == Status::Present).count();
        let total = records.len();

        AttendanceReport {
            records,
            present,
            absent: total - present,
            total,
            taken_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ack {
    pub acknowledged_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("report rejected: {0}")]
    Rejected(String),
}

/// The management side that receives attendance reports.
pub trait Reporter {
    fn submit(self: Arc<Self>, report: AttendanceReport) -> BoxFuture<'static, Result<Ack, ReportError>>;
}

/// Stand-in for the management backend: waits a fixed delay, logs the report and acknowledges it.
///
/// Reports without any passengers are rejected.
pub struct MockReporter {
    delay: Duration,
}

impl MockReporter {
    pub fn new(config: &config::Reporter) -> Self {
        MockReporter {
            delay: config.delay,
        }
    }
}

impl Reporter for MockReporter {
    #[instrument(skip_all, fields(report.total = report.total))]
    fn submit(self: Arc<Self>, report: AttendanceReport) -> BoxFuture<'static, Result<Ack, ReportError>> {
        Box::pin(async move {
            let payload = serde_json::to_string(&report)?;
            tokio::time::sleep(self.delay).await;
            if report.total == 0 {
                return Err(ReportError::Rejected("report has no passengers".to_string()));
            }
            info!("Attendance submitted: {}", payload);

            Ok(Ack {
                acknowledged_at: Utc::now(),
            })
        })
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    AlreadyInFlight,

    #[error("submission failed, retry: {0}")]
    Failed(#[from] ReportError),
}

struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Hands reports to a [`Reporter`], allowing at most one submission at a time.
#[derive(Clone)]
pub struct Submitter {
    reporter: Arc<dyn Reporter + Send + Sync>,
    in_flight: Arc<AtomicBool>,
}

impl Submitter {
    pub fn new(reporter: Arc<dyn Reporter + Send + Sync>) -> Self {
        Submitter {
            reporter,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claims the submission slot right away and returns the future that performs the submission.
    ///
    /// The slot is released when that future completes or is dropped.
    pub fn submit(
        &self,
        report: AttendanceReport,
    ) -> Result<impl Future<Output = Result<Ack, SubmitError>> + Send + 'static, SubmitError> {
        let guard = InFlight::acquire(&self.in_flight).ok_or_else(|| {
            warn!("Rejecting attendance submission, another one is still pending");
            SubmitError::AlreadyInFlight
        })?;
        let reporter = self.reporter.clone();

        Ok(async move {
            let _guard = guard;
            let total = report.total;
            let result = reporter.submit(report).await;
            match &result {
                Ok(_) => info!("Attendance report for {} passengers acknowledged", total),
                Err(e) => warn!("Attendance report failed: {}", e),
            }
            result.map_err(SubmitError::from)
        })
    }
}
