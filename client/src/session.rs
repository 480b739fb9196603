//! Transport session to the relay hub.
//!
//! `connect` retries a few times before giving up, then splits the
//! stream: the write half stays with the caller for whole-frame sends,
//! the read half is consumed by exactly one background receive loop that
//! feeds decoded messages into a channel the tick loop drains.

use log::{error, info, warn};
use shared::{encode, FrameDecoder, Message, NetError, READ_CHUNK};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

pub const CONNECT_ATTEMPTS: u32 = 3;
pub const CONNECT_RETRY: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum SessionEvent {
    Message(Message),
    /// The hub closed the connection or the read failed.
    Disconnected,
}

pub struct Session {
    writer: OwnedWriteHalf,
    local_key: String,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
    /// Connects to the hub, retrying a fixed number of times with a
    /// fixed delay in between.
    pub async fn connect(addr: &str) -> Result<Self, NetError> {
        let mut last_error = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Self::from_stream(stream),
                Err(err) => {
                    warn!(
                        "connection attempt {}/{} to {} failed: {}",
                        attempt, CONNECT_ATTEMPTS, addr, err
                    );
                    last_error = Some(err);
                    if attempt < CONNECT_ATTEMPTS {
                        sleep(CONNECT_RETRY).await;
                    }
                }
            }
        }
        Err(NetError::Transport(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no attempts made")
        })))
    }

    fn from_stream(stream: TcpStream) -> Result<Self, NetError> {
        let local_key = stream.local_addr()?.to_string();
        let (reader, writer) = stream.into_split();
        let (events_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(receive_loop(reader, events_tx));
        Ok(Self {
            writer,
            local_key,
            events,
        })
    }

    /// Local endpoint as `ip:port`. This is the peer key the hub files
    /// this session's roster entry under.
    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    /// Sends one message as one frame. Frames never interleave because
    /// every send goes through this one exclusive writer.
    pub async fn send(&mut self, message: &Message) -> Result<(), NetError> {
        let frame = encode(message)?;
        self.writer.write_all(&frame).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Non-blocking drain step for the tick loop.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }
}

async fn receive_loop(mut reader: OwnedReadHalf, events: mpsc::UnboundedSender<SessionEvent>) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                info!("hub closed the connection");
                break;
            }
            Ok(n) => {
                for message in decoder.push(&buf[..n]) {
                    if events.send(SessionEvent::Message(message)).is_err() {
                        // Session dropped; nobody is listening anymore.
                        return;
                    }
                }
            }
            Err(err) => {
                error!("receive failed: {}", err);
                break;
            }
        }
    }
    let _ = events.send(SessionEvent::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn local_hub() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_connect_and_send() {
        let (listener, addr) = local_hub().await;
        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = stream.read(&mut buf).await.unwrap();
            buf.truncate(n);
            buf
        });

        let mut session = Session::connect(&addr).await.unwrap();
        assert!(session.local_key().contains(':'));
        session
            .send(&Message::Leave {
                disconnect: true,
                id: 3,
            })
            .await
            .unwrap();

        let received = accept.await.unwrap();
        let text = String::from_utf8(received).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("\"disconnect\":true"));
    }

    #[tokio::test]
    async fn test_receive_loop_decodes_and_reports_eof() {
        let (listener, addr) = local_hub().await;
        let serve = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream
                .write_all(b"{\"server_shutdown\": true}\n")
                .await
                .unwrap();
            // Dropping the stream closes the connection.
        });

        let mut session = Session::connect(&addr).await.unwrap();
        match session.recv().await {
            Some(SessionEvent::Message(Message::Shutdown { server_shutdown })) => {
                assert!(server_shutdown)
            }
            other => panic!("expected shutdown notice, got {:?}", other),
        }
        match session.recv().await {
            Some(SessionEvent::Disconnected) => {}
            other => panic!("expected disconnect event, got {:?}", other),
        }
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_retries() {
        // Bind then drop to find a port with nothing listening.
        let (listener, addr) = local_hub().await;
        drop(listener);

        let started = tokio::time::Instant::now();
        let result = Session::connect(&addr).await;
        assert!(result.is_err());
        assert!(started.elapsed() >= CONNECT_RETRY * (CONNECT_ATTEMPTS - 1));
    }
}
