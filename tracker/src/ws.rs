use crate::transport::{Endpoint, EventSink, Transport, TransportError, TransportEvent};
use log::{debug, warn};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tungstenite::error::Error as WsError;
use tungstenite::{Message, WebSocket};

/// WebSocket client over a plain TCP stream.
///
/// Connecting blocks for at most the connect timeout (TCP connect, then the
/// handshake under the same read/write timeout). Once open the stream is
/// switched to non-blocking so `poll` and `send` never stall the loop.
///
/// A host name is resolved on the first attempt only and the address is
/// reused for every reconnect. Name lookup has no timeout, so an IP literal
/// keeps even the first attempt bounded.
pub struct WsTransport {
    socket: Option<WebSocket<TcpStream>>,
    connect_timeout: Duration,
    resolved: Option<(String, u16, SocketAddr)>,
    opened_pending: bool,
    closed_pending: bool,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        WsTransport {
            socket: None,
            connect_timeout,
            resolved: None,
            opened_pending: false,
            closed_pending: false,
        }
    }

    /// Address of `endpoint`, looked up once per host and port.
    fn resolve(&mut self, endpoint: &Endpoint) -> Result<SocketAddr, TransportError> {
        if let Some((host, port, addr)) = &self.resolved {
            if *host == endpoint.host && *port == endpoint.port {
                return Ok(*addr);
            }
        }
        let addr = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect(format!("{}: {}", endpoint.host, e)))?
            .next()
            .ok_or_else(|| TransportError::Connect(format!("{} did not resolve", endpoint.host)))?;
        debug!("Resolved {} to {}", endpoint.host, addr);
        self.resolved = Some((endpoint.host.clone(), endpoint.port, addr));
        Ok(addr)
    }

    fn open_stream(&mut self, endpoint: &Endpoint) -> Result<TcpStream, TransportError> {
        let addr = self.resolve(endpoint)?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let io_err = |e: std::io::Error| TransportError::Connect(e.to_string());
        stream.set_read_timeout(Some(self.connect_timeout)).map_err(io_err)?;
        stream.set_write_timeout(Some(self.connect_timeout)).map_err(io_err)?;
        stream.set_nodelay(true).map_err(io_err)?;
        Ok(stream)
    }

    fn lose_socket(&mut self) {
        self.socket = None;
        self.opened_pending = false;
        self.closed_pending = true;
    }
}

fn would_block(err: &WsError) -> bool {
    matches!(err, WsError::Io(e) if e.kind() == ErrorKind::WouldBlock)
}

impl Transport for WsTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        let stream = self.open_stream(endpoint)?;
        let url = endpoint.to_string();
        let (socket, response) = tungstenite::client(url.as_str(), stream)
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        debug!("Handshake with {} answered {}", url, response.status());

        socket
            .get_ref()
            .set_nonblocking(true)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        self.socket = Some(socket);
        self.opened_pending = true;
        self.closed_pending = false;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            // Best effort; the peer may already be gone.
            let _ = socket.close(None);
            let _ = socket.flush();
        }
        self.opened_pending = false;
        self.closed_pending = false;
    }

    fn is_open(&self) -> bool {
        self.socket.as_ref().map_or(false, |s| s.can_write())
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::Closed)?;
        match socket.send(Message::Text(text.to_string())) {
            Ok(()) => Ok(()),
            // Frame is buffered and goes out with the next write or read.
            Err(e) if would_block(&e) => Ok(()),
            Err(e) => {
                self.lose_socket();
                Err(TransportError::Send(e.to_string()))
            }
        }
    }

    fn poll(&mut self, sink: &mut dyn EventSink) {
        if self.opened_pending {
            self.opened_pending = false;
            sink.on_event(TransportEvent::Opened);
        }

        while let Some(socket) = self.socket.as_mut() {
            match socket.read() {
                Ok(Message::Text(text)) => sink.on_event(TransportEvent::Message(text)),
                Ok(Message::Ping(_)) => sink.on_event(TransportEvent::Ping),
                Ok(Message::Pong(_)) => sink.on_event(TransportEvent::Pong),
                Ok(Message::Close(frame)) => debug!("Close frame received: {:?}", frame),
                Ok(Message::Binary(_)) | Ok(Message::Frame(_)) => {}
                Err(e) if would_block(&e) => break,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => self.lose_socket(),
                Err(e) => {
                    warn!("WebSocket read failed: {}", e);
                    self.lose_socket();
                }
            }
        }

        if self.closed_pending {
            self.closed_pending = false;
            sink.on_event(TransportEvent::Closed);
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}
