//! Read-eval loop: command lines in, notices out.
//!
//! Interleaves user input with frames arriving from the broker so that
//! receipts, messages and errors are reported while the user is idle.

use std::io::Write;

use anyhow::{Context, Result};
use stomp_client::{Outcome, Session};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// Run until `input` is exhausted, then log out if still logged in.
pub async fn run<R, W>(session: &mut Session, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read command line")? else {
                    debug!("end of input");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let outcome = session.execute(&line).await;
                print(out, &outcome)?;
            }
            inbound = session.next_inbound() => {
                let outcome = session.handle_inbound(inbound).await;
                print(out, &outcome)?;
            }
        }
    }

    let outcome = session.close().await;
    print(out, &outcome)
}

fn print<W: Write>(out: &mut W, outcome: &Outcome) -> Result<()> {
    for notice in &outcome.notices {
        writeln!(out, "{notice}").context("failed to write output")?;
    }
    out.flush().context("failed to flush output")
}
