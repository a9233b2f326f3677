use super::{Command, PendingAction, Session, State};
use crate::attendance::Status;
use itertools::Itertools;
use tracing::{info, instrument, warn};

pub fn help() -> String {
    Command::descriptions().to_string()
}

pub fn counts(session: &Session) -> String {
    session.tracker.aggregate_counts().to_string()
}

pub fn list(session: &Session) -> String {
    if session.tracker.is_empty() {
        return format!("No passengers on {}", session.ride);
    }

    let rows = session
        .tracker
        .passengers()
        .iter()
        .map(|p| {
            let marker = match p.status {
                Status::Present => "[x]",
                Status::Absent => "[ ]",
            };
            format!("{} {} {} ({})", marker, p.id, p.name, p.status)
        })
        .join("\n");

    format!(
        "{}\n{}\n{}",
        session.ride,
        rows,
        session.tracker.aggregate_counts()
    )
}

#[instrument(skip(session))]
pub fn mark(session: &mut Session, id: &str, status: Status) -> String {
    match session.tracker.mark_attendance(id, status) {
        Ok(counts) => format!("{} is {}\n{}", id, status, counts),
        Err(e) => {
            warn!("Failed to mark attendance: {}", e);
            format!("Cannot mark attendance: {}. Type list to see passengers.", e)
        }
    }
}

#[instrument(skip(session))]
pub fn mark_all(session: &mut Session, status: Status) -> String {
    if status.bulk_requires_confirmation() {
        session.state = State::Confirm(PendingAction::MarkAllAbsent);
        return "Are you sure you want to mark all passengers as absent? (y/n)".to_string();
    }

    let counts = session.tracker.mark_all(status);
    format!("Everyone is {}\n{}", status, counts)
}

pub fn call(session: &Session, id: &str) -> String {
    match session.tracker.passenger(id) {
        Ok(p) => match &p.phone {
            Some(phone) => format!("Call {}: tel:{}", p.name, phone),
            None => format!("No phone number for {}", p.name),
        },
        Err(e) => format!("Cannot call: {}", e),
    }
}

pub fn request_submit(session: &mut Session) -> String {
    if session.submitter.is_in_flight() {
        return "A submission is already in progress, wait for it to finish.".to_string();
    }

    let counts = session.tracker.aggregate_counts();
    session.state = State::Confirm(PendingAction::Submit);
    format!(
        "Submit attendance report?\n\nPresent: {}\nAbsent: {}\nTotal: {}\n\n(y/n)",
        counts.present,
        counts.absent,
        counts.total()
    )
}

#[instrument(skip(session))]
pub fn confirm(session: &mut Session, action: PendingAction) -> String {
    match action {
        PendingAction::MarkAllAbsent => {
            let counts = session.tracker.mark_all(Status::Absent);
            format!("Everyone is absent\n{}", counts)
        }
        PendingAction::Submit => {
            let report = session.tracker.snapshot();
            let total = report.total;

            match session.submitter.submit(report) {
                Ok(submission) => {
                    info!("Submitting attendance report for {} passengers", total);
                    let outcomes = session.outcomes.clone();
                    session.submission = Some(tokio::spawn(async move {
                        // the session may be gone by the time the report is acknowledged
                        let _ = outcomes.send(submission.await);
                    }));
                    "Submitting...".to_string()
                }
                Err(e) => format!("Cannot submit: {}", e),
            }
        }
    }
}

pub fn cancel(action: PendingAction) -> String {
    info!("Driver cancelled {:?}", action);
    match action {
        PendingAction::MarkAllAbsent => "Nothing changed".to_string(),
        PendingAction::Submit => "Submission cancelled".to_string(),
    }
}
