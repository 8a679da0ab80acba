use futures::StreamExt;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, error, info, instrument, warn};

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Clone, Debug)]
pub struct Config {
    pub address: String,
    pub retry_ms: u64,
    pub retry_max_delay: Duration,
    pub stale_connection_timeout: Duration,
}

/// Keeps a line connection to `config.address` open, reconnecting with exponential backoff.
/// Inbound lines go to `inbound`, frames from `outbound` are written with a trailing newline.
/// Returns once `outbound` is closed.
#[instrument(skip_all, fields(address = config.address))]
pub async fn listen(inbound: Sender<Vec<u8>>, outbound: Receiver<Vec<u8>>, config: &Config) -> Result<(), BoxError> {
    let strategy = ExponentialBackoff::from_millis(config.retry_ms)
        .factor(2)
        .max_delay(config.retry_max_delay)
        .map(jitter);
    let outbound = Arc::new(Mutex::new(outbound));

    info!("Connecting to {}...", config.address);
    Retry::spawn(strategy, || async {
        match connect(inbound.clone(), outbound.clone(), config).await {
            Ok(()) => {
                info!("✅ Outbound channel closed, disconnecting");
                Ok(())
            }
            Err(e) => {
                warn!("⚠️ Connection error: {}. Retrying...", e);
                Err("connection failed") // Triggers retry
            }
        }
    })
    .await?;

    Ok(())
}

async fn connect(inbound: Sender<Vec<u8>>, outbound: Arc<Mutex<Receiver<Vec<u8>>>>, config: &Config) -> Result<(), BoxError> {
    let stream = TcpStream::connect(&config.address).await?;
    info!("Connecting to {}... OK", config.address);

    let (reader, mut writer) = stream.into_split();
    let mut lines = LinesStream::new(BufReader::new(reader).lines());
    let mut outbound = outbound.lock().await;

    loop {
        tokio::select! {
            line = timeout(config.stale_connection_timeout, lines.next()) => match line {
                Ok(Some(Ok(line))) => {
                    debug!(frame = line.trim(), "🔸 Received frame");
                    inbound.send(line.into_bytes()).await?;
                }
                Ok(Some(Err(e))) => {
                    error!("❌ Connection error: {}", e);
                    return Err(Box::new(e));
                }
                Ok(None) => {
                    warn!("🔴 Connection closed by peer");
                    return Err("connection closed".into());
                }
                Err(_) => {
                    warn!("⏳ No data for {} seconds. Reconnecting...", config.stale_connection_timeout.as_secs());
                    return Err("timeout".into());
                }
            },
            frame = outbound.recv() => match frame {
                Some(mut frame) => {
                    frame.push(b'\n');
                    writer.write_all(&frame).await?;
                }
                None => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_log::test;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn config(address: String) -> Config {
        Config {
            address,
            retry_ms: 10,
            retry_max_delay: Duration::from_millis(50),
            stale_connection_timeout: Duration::from_secs(5),
        }
    }

    #[test(tokio::test)]
    async fn forwards_lines_in_both_directions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = config(listener.local_addr().unwrap().to_string());
        let (inbound_tx, mut inbound_rx) = mpsc::channel(8);
        let (outbound_tx, outbound_rx) = mpsc::channel(8);

        let client = tokio::spawn(async move { listen(inbound_tx, outbound_rx, &config).await.is_ok() });

        let (socket, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = socket.into_split();
        writer.write_all(b"+01 bulb\n01 BRIGHTNESS 128\n").await.unwrap();

        assert_eq!(inbound_rx.recv().await.unwrap(), b"+01 bulb".to_vec());
        assert_eq!(inbound_rx.recv().await.unwrap(), b"01 BRIGHTNESS 128".to_vec());

        outbound_tx.send(b"01 ON true".to_vec()).await.unwrap();
        let mut remote_lines = BufReader::new(reader).lines();
        assert_eq!(remote_lines.next_line().await.unwrap(), Some("01 ON true".to_string()));

        drop(outbound_tx);
        assert!(client.await.unwrap());
    }

    #[test(tokio::test)]
    async fn reconnects_after_the_peer_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = config(listener.local_addr().unwrap().to_string());
        let (inbound_tx, mut inbound_rx) = mpsc::channel(8);
        let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(8);

        tokio::spawn(async move { listen(inbound_tx, outbound_rx, &config).await.is_ok() });

        let (mut first, _) = listener.accept().await.unwrap();
        first.write_all(b"-01\n").await.unwrap();
        assert_eq!(inbound_rx.recv().await.unwrap(), b"-01".to_vec());
        drop(first);

        let (mut second, _) = listener.accept().await.unwrap();
        second.write_all(b"-02\n").await.unwrap();
        assert_eq!(inbound_rx.recv().await.unwrap(), b"-02".to_vec());

        drop(outbound_tx);
    }
}
