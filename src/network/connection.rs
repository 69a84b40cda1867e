//! Connection Abstraction
//!
//! The runtime only needs to push text frames, close, and ask whether the
//! peer is still there. The WebSocket transport implements this with a
//! channel feeding a per-connection writer task.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// A bidirectional, message-framed, persistent connection.
pub trait Connection: Send + Sync {
    /// Queue a text frame. Frames to a closed connection are dropped.
    fn send(&self, payload: String);

    /// Close the connection.
    fn close(&self);

    /// Check if the connection can still deliver frames.
    fn is_open(&self) -> bool;
}

/// Frames handed to a writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Text frame.
    Text(String),
    /// Close frame; the writer stops after sending it.
    Close,
}

/// Connection backed by an unbounded channel.
#[derive(Debug)]
pub struct ChannelConnection {
    tx: mpsc::UnboundedSender<Outgoing>,
    open: AtomicBool,
}

impl ChannelConnection {
    /// Create a connection and the receiver its writer task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, open: AtomicBool::new(true) }, rx)
    }
}

impl Connection for ChannelConnection {
    fn send(&self, payload: String) {
        if !self.is_open() {
            return;
        }
        if self.tx.send(Outgoing::Text(payload)).is_err() {
            self.open.store(false, Ordering::Release);
        }
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(Outgoing::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_close() {
        let (conn, mut rx) = ChannelConnection::new();
        assert!(conn.is_open());

        conn.send("a".to_string());
        conn.close();
        conn.send("b".to_string());
        conn.close();

        assert_eq!(rx.try_recv().unwrap(), Outgoing::Text("a".to_string()));
        assert_eq!(rx.try_recv().unwrap(), Outgoing::Close);
        assert!(rx.try_recv().is_err());
        assert!(!conn.is_open());
    }

    #[test]
    fn test_dropped_receiver_closes() {
        let (conn, rx) = ChannelConnection::new();
        drop(rx);
        assert!(!conn.is_open());
        conn.send("lost".to_string());
    }
}
