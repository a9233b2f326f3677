use crate::haptics::{Haptics, PULSE};
use crate::report::AttendanceReport;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, info, instrument, trace};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassengerId(String);

impl PassengerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PassengerId {
    fn from(s: &str) -> Self {
        PassengerId(s.to_string())
    }
}

impl From<String> for PassengerId {
    fn from(s: String) -> Self {
        PassengerId(s)
    }
}

impl Borrow<str> for PassengerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for PassengerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    #[default]
    Absent,
}

impl Status {
    /// Whether applying this status to the whole roster at once has to be confirmed first.
    pub fn bulk_requires_confirmation(self) -> bool {
        matches!(self, Status::Absent)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Present => write!(f, "present"),
            Status::Absent => write!(f, "absent"),
        }
    }
}

/// A roster entry as it is handed to the tracker when the check-in session opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: PassengerId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub present: usize,
    pub absent: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.present + self.absent
    }
}

impl Display for Counts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Present: {}  Absent: {}  Total: {}",
            self.present,
            self.absent,
            self.total()
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttendanceError {
    #[error("passenger {0} not found")]
    NotFound(PassengerId),
}

/// Attendance of every passenger of one ride session.
///
/// The set of passengers is fixed when the tracker is created; only their
/// statuses change afterwards.
pub struct AttendanceTracker {
    passengers: Vec<Passenger>,
    index: HashMap<PassengerId, usize>,
    haptics: Box<dyn Haptics + Send + Sync>,
}

impl AttendanceTracker {
    #[instrument(skip_all)]
    pub fn initialize(
        roster: impl IntoIterator<Item = Passenger>,
        haptics: Box<dyn Haptics + Send + Sync>,
    ) -> Self {
        let mut passengers: Vec<Passenger> = Vec::new();
        let mut index = HashMap::new();

        for passenger in roster {
            match index.get(&passenger.id).copied() {
                Some(i) => {
                    debug!("Duplicate roster entry for {}, keeping the last one", passenger.id);
                    passengers[i] = passenger;
                }
                None => {
                    index.insert(passenger.id.clone(), passengers.len());
                    passengers.push(passenger);
                }
            }
        }

        let tracker = AttendanceTracker {
            passengers,
            index,
            haptics,
        };
        info!(
            "Check-in session opened for {} passengers ({})",
            tracker.len(),
            tracker.aggregate_counts()
        );
        tracker
    }

    pub fn len(&self) -> usize {
        self.passengers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passengers.is_empty()
    }

    /// Passengers in roster order.
    pub fn passengers(&self) -> &[Passenger] {
        &self.passengers
    }

    pub fn passenger(&self, id: &str) -> Result<&Passenger, AttendanceError> {
        self.index
            .get(id)
            .map(|&i| &self.passengers[i])
            .ok_or_else(|| AttendanceError::NotFound(id.into()))
    }

    #[cfg(test)]
    pub fn status_of(&self, id: &str) -> Result<Status, AttendanceError> {
        self.passenger(id).map(|p| p.status)
    }

    #[instrument(skip(self))]
    pub fn mark_attendance(&mut self, id: &str, status: Status) -> Result<Counts, AttendanceError> {
        let &i = self
            .index
            .get(id)
            .ok_or_else(|| AttendanceError::NotFound(id.into()))?;

        self.passengers[i].status = status;
        trace!("Marked {} as {}", id, status);

        if let Err(e) = self.haptics.pulse(PULSE) {
            debug!("Haptic feedback unavailable: {}", e);
        }

        Ok(self.aggregate_counts())
    }

    #[instrument(skip(self))]
    pub fn mark_all(&mut self, status: Status) -> Counts {
        let ids: Vec<PassengerId> = self.passengers.iter().map(|p| p.id.clone()).collect();
        for id in ids {
            // every id comes from the roster itself
            if let Err(e) = self.mark_attendance(id.as_str(), status) {
                debug!("Skipping {}: {}", id, e);
            }
        }

        let counts = self.aggregate_counts();
        info!("Marked all passengers as {} ({})", status, counts);
        counts
    }

    pub fn aggregate_counts(&self) -> Counts {
        self.passengers
            .iter()
            .fold(Counts::default(), |mut counts, p| {
                match p.status {
                    Status::Present => counts.present += 1,
                    Status::Absent => counts.absent += 1,
                }
                counts
            })
    }

    pub fn snapshot(&self) -> AttendanceReport {
        AttendanceReport::new(self.passengers.iter().map(|p| (p.id.clone(), p.status)))
    }
}
