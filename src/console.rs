use crate::dispatcher::EventDispatcher;
use crate::domain::commands::Command;
use crate::domain::events::BusEvent;
use crate::domain::state::ConversionError;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug, PartialEq)]
pub enum CommandLineError {
    #[error("expected '<item> <COMMAND>'")]
    Malformed,
    #[error(transparent)]
    Command(#[from] ConversionError),
}

/// Splits `lamp 50%` into the item name and its command.
pub fn parse_command_line(line: &str) -> Result<(&str, Command), CommandLineError> {
    let (item, command) = line.trim().split_once(char::is_whitespace).ok_or(CommandLineError::Malformed)?;
    Ok((item, Command::from_str(command.trim())?))
}

/// Sends a command for every `<item> <COMMAND>` line until the input ends. Returns the number of
/// acknowledged commands.
#[instrument(skip_all)]
pub async fn read_commands<R>(reader: R, dispatcher: &EventDispatcher) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut acknowledged = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("⚠️ Could not read command: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let (item, command) = match parse_command_line(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("⚠️ Ignoring '{}': {}", line.trim(), e);
                continue;
            }
        };

        match dispatcher.send_command(item, command).await {
            Ok(()) => acknowledged += 1,
            Err(e) => warn!(item, "⚠️ Command for '{}' failed: {}", item, e),
        }
    }

    info!("⌨️ Command input closed");
    acknowledged
}

/// Writes every received event as one JSON line.
#[instrument(skip_all)]
pub async fn print_events<W>(mut rx: Receiver<BusEvent>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        debug!(device_id = event.address(), "📣 Received {:?}", event);
        let mut line = match serde_json::to_vec(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!("⚠️ Could not serialize event: {}", e);
                continue;
            }
        };
        line.push(b'\n');

        if let Err(e) = write_line(&mut writer, &line).await {
            warn!("⚠️ Could not write event, stopped printing: {}", e);
            return;
        }
    }
}

async fn write_line<W>(writer: &mut W, line: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line).await?;
    writer.flush().await
}
