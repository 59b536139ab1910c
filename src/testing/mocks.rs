//! Mock implementations for testing
//!
//! [`MockStreamTransport`] replays scripted stream sessions so the connection
//! state machine can be driven without a device; [`EventRecorder`] collects
//! whatever the client publishes.

use crate::events::{listener, DeviceEvent, Listener};
use crate::transport::{ConnectionStatus, StreamConnection, StreamTransport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError};
use tokio::sync::{mpsc, Mutex};

/// One scripted step of a session
#[derive(Debug, Clone, PartialEq)]
pub enum MockFrame {
    /// Text frame delivered to the client
    Text(String),
    /// Transport error; ends the session
    Error(String),
    /// Clean close by the device
    Close,
}

impl MockFrame {
    pub fn text(payload: impl Into<String>) -> Self {
        MockFrame::Text(payload.into())
    }
}

/// What the next `open()` call does
#[derive(Debug)]
pub enum MockSession {
    /// Fail the open with this message
    Refuse(String),
    /// Open, replay the frames, then stay open silently
    Scripted(Vec<MockFrame>),
    /// Open and deliver frames pushed by the test
    Live(mpsc::UnboundedReceiver<MockFrame>),
}

/// Stream transport that replays queued sessions in order
///
/// When the queue is empty every `open()` is refused.
#[derive(Debug, Default)]
pub struct MockStreamTransport {
    sessions: Arc<Mutex<VecDeque<MockSession>>>,
    opened_urls: Arc<Mutex<Vec<String>>>,
}

impl MockStreamTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, session: MockSession) {
        self.sessions.lock().await.push_back(session);
    }

    pub async fn refuse(&self, message: impl Into<String>) {
        self.push(MockSession::Refuse(message.into())).await;
    }

    pub async fn accept(&self, frames: Vec<MockFrame>) {
        self.push(MockSession::Scripted(frames)).await;
    }

    /// Queue a session fed by the returned sender
    ///
    /// Dropping the sender closes the session cleanly.
    pub async fn live(&self) -> mpsc::UnboundedSender<MockFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(MockSession::Live(rx)).await;
        tx
    }

    /// Every URL passed to `open()`, refused or not
    pub async fn opened_urls(&self) -> Vec<String> {
        self.opened_urls.lock().await.clone()
    }

    pub async fn open_count(&self) -> usize {
        self.opened_urls.lock().await.len()
    }

    pub async fn pending_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl StreamTransport for MockStreamTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        self.opened_urls.lock().await.push(url.to_string());

        let refused = |message: String| TransportError::OpenFailed {
            url: url.to_string(),
            message,
        };

        match self.sessions.lock().await.pop_front() {
            None => Err(refused("connection refused".to_string())),
            Some(MockSession::Refuse(message)) => Err(refused(message)),
            Some(MockSession::Scripted(frames)) => Ok(Box::new(MockConnection {
                frames: frames.into(),
                live: None,
                closed: false,
            })),
            Some(MockSession::Live(rx)) => Ok(Box::new(MockConnection {
                frames: VecDeque::new(),
                live: Some(rx),
                closed: false,
            })),
        }
    }
}

struct MockConnection {
    frames: VecDeque<MockFrame>,
    live: Option<mpsc::UnboundedReceiver<MockFrame>>,
    closed: bool,
}

fn deliver(frame: MockFrame) -> Option<Result<String, TransportError>> {
    match frame {
        MockFrame::Text(text) => Some(Ok(text)),
        MockFrame::Error(message) => Some(Err(TransportError::Stream(message))),
        MockFrame::Close => None,
    }
}

#[async_trait]
impl StreamConnection for MockConnection {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        if self.closed {
            return None;
        }
        if let Some(frame) = self.frames.pop_front() {
            return deliver(frame);
        }
        match self.live.as_mut() {
            Some(rx) => deliver(rx.recv().await.unwrap_or(MockFrame::Close)),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Collects published events for later assertions
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<std::sync::Mutex<Vec<DeviceEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener that appends every event it sees
    pub fn listener(&self) -> Listener {
        let events = self.events.clone();
        listener(move |event| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
            Ok(())
        })
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status of every connection event, in order
    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.events()
            .iter()
            .filter_map(DeviceEvent::as_connection)
            .map(|event| event.status)
            .collect()
    }

    /// Poll until at least `count` events arrived or `timeout` elapsed
    pub async fn wait_for_len(&self, count: usize, timeout: std::time::Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.len() < count {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }
}
