//! Line printer mode: history and live entries go to stdout

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;

use dockscope_logs::plain_line;
use dockscope_stream::{ConnectionState, LogEntry, LogStreamManager, StreamEvent};

/// How often the connection state is checked for a terminal stop
const STATE_POLL: Duration = Duration::from_millis(500);

/// Stream `container` to stdout until Ctrl-C or the stream gives up
pub async fn run(manager: &LogStreamManager, container: String) -> Result<()> {
    let mut subscription = manager.subscribe();
    let mut out = io::stdout().lock();
    for entry in subscription.take_history() {
        print_entry(&mut out, &entry)?;
    }
    drop(out);

    manager.start_logging(container).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(STATE_POLL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut was_active = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::debug!("interrupted");
                manager.stop_logging().await?;
                break;
            }

            event = subscription.recv() => match event {
                Some(StreamEvent::Entry(entry)) => {
                    if !print_locked(&entry)? {
                        return Ok(());
                    }
                }
                Some(StreamEvent::ConnectionStatus(_)) => {}
                None => break,
            },

            _ = poll.tick() => {
                // Idle after activity means the stream stopped on its own
                if manager.state() == ConnectionState::Idle {
                    if was_active {
                        break;
                    }
                } else {
                    was_active = true;
                }
            }
        }
    }

    while let Some(event) = subscription.try_recv() {
        if let StreamEvent::Entry(entry) = event {
            if !print_locked(&entry)? {
                break;
            }
        }
    }
    Ok(())
}

/// Print one entry; `false` once stdout has gone away
fn print_locked(entry: &LogEntry) -> Result<bool> {
    match print_entry(&mut io::stdout().lock(), entry) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn print_entry(out: &mut impl Write, entry: &LogEntry) -> io::Result<()> {
    writeln!(out, "{}", plain_line(entry))?;
    out.flush()
}
