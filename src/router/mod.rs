mod commands;

use crate::attendance::{AttendanceTracker, Status};
use crate::report::{Ack, SubmitError, Submitter};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use commands::{call, cancel, confirm, counts, help, list, mark, mark_all, request_submit};

static COMMAND_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?P<cmd>\S+)(?:\s+(?P<arg>\S+))?\s*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Counts,
    Mark { id: String, status: Status },
    MarkAll(Status),
    Call { id: String },
    Submit,
    Quit,
}

impl Command {
    pub fn parse(text: &str) -> Option<Command> {
        let cap = COMMAND_REGEX.captures(text)?;
        let cmd = cap.name("cmd")?.as_str().to_lowercase();
        let arg = cap.name("arg").map(|a| a.as_str());

        let command = match (cmd.as_str(), arg) {
            ("help", None) => Command::Help,
            ("list", None) => Command::List,
            ("counts", None) => Command::Counts,
            ("submit", None) => Command::Submit,
            ("quit", None) => Command::Quit,
            ("present", Some(id)) => Command::Mark {
                id: id.to_string(),
                status: Status::Present,
            },
            ("absent", Some(id)) => Command::Mark {
                id: id.to_string(),
                status: Status::Absent,
            },
            ("call", Some(id)) => Command::Call { id: id.to_string() },
            ("all", Some(status)) => match status.to_lowercase().as_str() {
                "present" => Command::MarkAll(Status::Present),
                "absent" => Command::MarkAll(Status::Absent),
                _ => return None,
            },
            _ => return None,
        };
        Some(command)
    }

    pub fn descriptions() -> &'static str {
        "These commands are supported:\n\
        list - show passengers and counters\n\
        present <id> - mark a passenger present\n\
        absent <id> - mark a passenger absent\n\
        all present - mark everyone present\n\
        all absent - mark everyone absent (asks for confirmation)\n\
        counts - show counters\n\
        call <id> - show the phone link of a passenger\n\
        submit - send the attendance report to management\n\
        help - display this text\n\
        quit - leave the check-in"
    }
}

/// An action waiting for the driver to confirm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    MarkAllAbsent,
    Submit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Idle,
    Confirm(PendingAction),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit(String),
}

pub type SubmitOutcome = Result<Ack, SubmitError>;

/// One driver's check-in session: owns the tracker and the dialogue state.
pub struct Session {
    ride: String,
    tracker: AttendanceTracker,
    submitter: Submitter,
    state: State,
    outcomes: mpsc::UnboundedSender<SubmitOutcome>,
    submission: Option<JoinHandle<()>>,
}

impl Session {
    /// Creates the session along with the receiving end on which finished submissions are reported.
    pub fn new(
        ride: String,
        tracker: AttendanceTracker,
        submitter: Submitter,
    ) -> (Self, mpsc::UnboundedReceiver<SubmitOutcome>) {
        let (outcomes, rx) = mpsc::unbounded_channel();
        (
            Session {
                ride,
                tracker,
                submitter,
                state: State::Idle,
                outcomes,
                submission: None,
            },
            rx,
        )
    }

    pub fn ride(&self) -> &str {
        &self.ride
    }

    pub fn tracker(&self) -> &AttendanceTracker {
        &self.tracker
    }

    #[cfg(test)]
    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.submission
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Waits for the last confirmed submission to finish.
    ///
    /// Its outcome is on the outcome channel once this returns.
    pub async fn wait_for_submission(&mut self) {
        if let Some(handle) = self.submission.take() {
            if let Err(e) = handle.await {
                warn!("Submission task failed: {}", e);
            }
        }
    }

    #[instrument(skip(self), fields(state = ?self.state))]
    pub fn handle_line(&mut self, line: &str) -> Reply {
        if let State::Confirm(action) = self.state {
            self.state = State::Idle;
            return if is_yes(line) {
                Reply::Text(confirm(self, action))
            } else {
                Reply::Text(cancel(action))
            };
        }

        let Some(command) = Command::parse(line) else {
            debug!("Unknown command: {:?}", line);
            return Reply::Text(
                "Unable to handle the command. Type help to see the usage.".to_string(),
            );
        };

        let text = match command {
            Command::Help => help(),
            Command::List => list(self),
            Command::Counts => counts(self),
            Command::Mark { id, status } => mark(self, &id, status),
            Command::MarkAll(status) => mark_all(self, status),
            Command::Call { id } => call(self, &id),
            Command::Submit => request_submit(self),
            Command::Quit => {
                return Reply::Quit(format!(
                    "Leaving check-in for {} ({})",
                    self.ride,
                    self.tracker.aggregate_counts()
                ))
            }
        };
        Reply::Text(text)
    }
}

fn is_yes(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "y" | "yes")
}

pub fn render_outcome(outcome: &SubmitOutcome) -> String {
    match outcome {
        Ok(ack) => format!(
            "Attendance report submitted successfully to management! (acknowledged at {})",
            ack.acknowledged_at.format("%H:%M:%S")
        ),
        Err(e) => format!("Attendance report was not submitted: {}. Type submit to try again.", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{Counts, Passenger};
    use crate::config;
    use crate::haptics::NoHaptics;
    use crate::report::{MockReporter, ReportError, Reporter};
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use std::time::Duration;

    struct OfflineReporter;

    impl Reporter for OfflineReporter {
        fn submit(self: Arc<Self>, _report: crate::report::AttendanceReport) -> BoxFuture<'static, Result<Ack, ReportError>> {
            Box::pin(async { Err(ReportError::Rejected("management is offline".to_string())) })
        }
    }

    fn session(roster: &[(&str, Status)]) -> (Session, mpsc::UnboundedReceiver<SubmitOutcome>) {
        let submitter = Submitter::new(Arc::new(MockReporter::new(&config::Reporter {
            delay: Duration::from_millis(1500),
        })));
        session_with(roster, submitter)
    }

    fn session_with(
        roster: &[(&str, Status)],
        submitter: Submitter,
    ) -> (Session, mpsc::UnboundedReceiver<SubmitOutcome>) {
        let tracker = AttendanceTracker::initialize(
            roster.iter().map(|&(id, status)| Passenger {
                id: id.into(),
                name: format!("Passenger {id}"),
                phone: Some(format!("+1555000{id}")),
                status,
            }),
            Box::new(NoHaptics),
        );
        Session::new("Route 12".to_string(), tracker, submitter)
    }

    fn text(reply: Reply) -> String {
        match reply {
            Reply::Text(t) => t,
            Reply::Quit(t) => panic!("unexpected quit: {t}"),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("help"), Some(Command::Help));
        assert_eq!(Command::parse("  LIST "), Some(Command::List));
        assert_eq!(
            Command::parse("present p1"),
            Some(Command::Mark {
                id: "p1".to_string(),
                status: Status::Present
            })
        );
        assert_eq!(
            Command::parse("Absent P1"),
            Some(Command::Mark {
                id: "P1".to_string(),
                status: Status::Absent
            })
        );
        assert_eq!(Command::parse("all absent"), Some(Command::MarkAll(Status::Absent)));
        assert_eq!(Command::parse("call p2"), Some(Command::Call { id: "p2".to_string() }));
        assert_eq!(Command::parse("all late"), None);
        assert_eq!(Command::parse("present"), None);
        assert_eq!(Command::parse("present a b"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[tokio::test]
    async fn marks_and_reports_counts() {
        let (mut session, _rx) = session(&[("A", Status::Absent), ("B", Status::Absent), ("C", Status::Present)]);
        let reply = text(session.handle_line("present A"));
        assert!(reply.contains("Present: 2  Absent: 1  Total: 3"), "{reply}");
    }

    #[tokio::test]
    async fn unknown_passenger_is_reported() {
        let (mut session, _rx) = session(&[("A", Status::Absent)]);
        let reply = text(session.handle_line("present Z"));
        assert!(reply.contains("not found"), "{reply}");
        assert_eq!(session.tracker().status_of("A"), Ok(Status::Absent));
    }

    #[tokio::test]
    async fn all_absent_needs_confirmation() {
        let (mut session, _rx) = session(&[("A", Status::Present), ("B", Status::Present)]);

        text(session.handle_line("all absent"));
        assert_eq!(session.state(), State::Confirm(PendingAction::MarkAllAbsent));
        text(session.handle_line("no"));
        assert_eq!(session.state(), State::Idle);
        assert_eq!(
            session.tracker().aggregate_counts(),
            Counts {
                present: 2,
                absent: 0
            }
        );

        text(session.handle_line("all absent"));
        text(session.handle_line("Y"));
        assert_eq!(
            session.tracker().aggregate_counts(),
            Counts {
                present: 0,
                absent: 2
            }
        );
    }

    #[tokio::test]
    async fn all_present_applies_immediately() {
        let (mut session, _rx) = session(&[("A", Status::Absent), ("B", Status::Absent), ("C", Status::Absent)]);
        text(session.handle_line("all present"));
        assert_eq!(session.state(), State::Idle);
        assert_eq!(session.tracker().aggregate_counts().present, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_flow() {
        let (mut session, mut rx) = session(&[("A", Status::Present), ("B", Status::Absent)]);

        let prompt = text(session.handle_line("submit"));
        assert!(prompt.contains("Present: 1"), "{prompt}");
        assert!(prompt.contains("Total: 2"), "{prompt}");

        let reply = text(session.handle_line("yes"));
        assert!(reply.contains("Submitting"), "{reply}");

        let rejected = text(session.handle_line("submit"));
        assert!(rejected.contains("already in progress"), "{rejected}");
        assert_eq!(session.state(), State::Idle);

        let outcome = rx.recv().await.unwrap();
        assert!(outcome.is_ok());
        assert!(render_outcome(&outcome).contains("successfully"));
        // submission leaves the attendance untouched
        assert_eq!(session.tracker().status_of("A"), Ok(Status::Present));
        assert_eq!(session.tracker().len(), 2);
    }

    #[tokio::test]
    async fn call_shows_phone_link() {
        let (mut session, _rx) = session(&[("A", Status::Absent)]);
        assert!(text(session.handle_line("call A")).contains("tel:+1555000A"));
    }

    #[tokio::test]
    async fn quit_leaves() {
        let (mut session, _rx) = session(&[("A", Status::Absent)]);
        assert!(matches!(session.handle_line("quit"), Reply::Quit(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn quitting_still_delivers_pending_submission() {
        let (mut session, mut rx) = session(&[("A", Status::Present), ("B", Status::Absent)]);

        text(session.handle_line("submit"));
        text(session.handle_line("y"));
        assert!(matches!(session.handle_line("quit"), Reply::Quit(_)));
        assert!(session.is_submitting());

        session.wait_for_submission().await;
        assert!(!session.is_submitting());
        let outcome = rx.try_recv().unwrap();
        assert!(render_outcome(&outcome).contains("successfully"));
    }

    #[tokio::test]
    async fn failed_submission_asks_for_retry() {
        let (mut session, mut rx) = session_with(
            &[("A", Status::Present)],
            Submitter::new(Arc::new(OfflineReporter)),
        );

        text(session.handle_line("submit"));
        text(session.handle_line("yes"));
        let outcome = rx.recv().await.unwrap();
        let message = render_outcome(&outcome);
        assert!(message.contains("not submitted"), "{message}");
        assert!(message.contains("Type submit to try again"), "{message}");

        // the slot is free again and the attendance is intact
        session.wait_for_submission().await;
        assert!(text(session.handle_line("submit")).contains("Submit attendance report?"));
        assert_eq!(session.tracker().status_of("A"), Ok(Status::Present));
    }

    #[tokio::test]
    async fn nothing_to_wait_for_without_submission() {
        let (mut session, mut rx) = session(&[("A", Status::Absent)]);
        assert!(!session.is_submitting());
        session.wait_for_submission().await;
        assert!(rx.try_recv().is_err());
    }
}
