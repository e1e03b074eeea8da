use std::error::Error as StdError;
use std::fmt;

/// Where the host consumer listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Inbound transport activity, delivered during [`Transport::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Closed,
    Ping,
    Pong,
    /// Text sent by the host.
    Message(String),
}

/// Receives transport events synchronously while the transport is polled.
pub trait EventSink {
    fn on_event(&mut self, event: TransportEvent);
}

#[derive(Debug)]
pub enum TransportError {
    /// Host could not be resolved or reached
    Connect(String),
    /// Protocol handshake was refused
    Handshake(String),
    /// Frame could not be written
    Send(String),
    /// No open connection
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(s) => write!(f, "Connect failed: {}", s),
            TransportError::Handshake(s) => write!(f, "Handshake failed: {}", s),
            TransportError::Send(s) => write!(f, "Send failed: {}", s),
            TransportError::Closed => write!(f, "Connection closed"),
        }
    }
}

impl StdError for TransportError {}

/// A reliable-attempt, unreliable-delivery text channel.
///
/// Every call must return within a bounded time: the control loop blocks on
/// `connect` and `send`, and integration accuracy depends on its cadence.
pub trait Transport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Drains pending inbound activity into `sink`.
    fn poll(&mut self, sink: &mut dyn EventSink);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        (**self).connect(endpoint)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        (**self).send(text)
    }

    fn poll(&mut self, sink: &mut dyn EventSink) {
        (**self).poll(sink)
    }
}
