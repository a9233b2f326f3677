mod attendance;
mod config;
mod haptics;
mod init_tracing;
mod report;
mod router;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use attendance::AttendanceTracker;
use report::{MockReporter, Submitter};
use router::{render_outcome, Command, Reply, Session};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing::init_tracing();
    info!("Starting ride check-in...");

    let config = config::Config::read().context("Reading configuration")?;

    let tracker = AttendanceTracker::initialize(config.session.passengers, config.haptics.build());
    let submitter = Submitter::new(Arc::new(MockReporter::new(&config.reporter)));
    let (mut session, mut outcomes) = Session::new(config.session.ride, tracker, submitter);

    println!("Check-in for {}\n\n{}\n", session.ride(), Command::descriptions());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Reading command")? else {
                    info!("Input closed, leaving check-in");
                    break;
                };
                match session.handle_line(&line) {
                    Reply::Text(text) => println!("{}\n", text),
                    Reply::Quit(text) => {
                        println!("{}", text);
                        break;
                    }
                }
            }
            Some(outcome) = outcomes.recv() => {
                println!("{}\n", render_outcome(&outcome));
            }
        }
    }

    if session.is_submitting() {
        println!("Waiting for the attendance report to be acknowledged...");
    }
    session.wait_for_submission().await;
    while let Ok(outcome) = outcomes.try_recv() {
        println!("{}\n", render_outcome(&outcome));
    }

    info!("Final attendance: {}", session.tracker().aggregate_counts());
    Ok(())
}
