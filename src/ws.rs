use anyhow::{anyhow, Context, Result};
use log::debug;
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tungstenite::client::IntoClientRequest;
use tungstenite::{Message, WebSocket};

use crate::traits::Transport;

/// WebSocket link to the amplifier's `/ws` endpoint.
///
/// TCP connect and handshake are each bounded by `connect_timeout`; afterwards
/// the socket is switched to non-blocking so `recv_text` can be polled from the
/// event loop.
pub struct WsTransport {
    url: String,
    connect_timeout: Duration,
    socket: Option<WebSocket<TcpStream>>,
}

impl WsTransport {
    pub fn new(url: &str, connect_timeout: Duration) -> Self {
        WsTransport {
            url: url.to_string(),
            connect_timeout,
            socket: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn socket(&mut self) -> Result<&mut WebSocket<TcpStream>> {
        self.socket.as_mut().ok_or_else(|| anyhow!("WebSocket not open"))
    }

    /// First address of the URL's host that accepts within the timeout.
    fn connect_tcp(&self, host: &str, port: u16) -> Result<TcpStream> {
        let addrs = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("Cannot resolve {}", host))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("[WS] {} unreachable: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(anyhow!("Connect to {}:{} failed: {}", host, port, e)),
            None => Err(anyhow!("No address for {}", host)),
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self) -> Result<()> {
        self.socket = None;
        let request = self.url.as_str().into_client_request()?;
        let host = request
            .uri()
            .host()
            .ok_or_else(|| anyhow!("No host in {}", self.url))?
            .to_string();
        let port = request.uri().port_u16().unwrap_or(80);

        let stream = self.connect_tcp(&host, port)?;
        stream.set_read_timeout(Some(self.connect_timeout))?;
        stream.set_write_timeout(Some(self.connect_timeout))?;

        let (socket, response) =
            tungstenite::client(request, stream).map_err(|e| anyhow!("Handshake with {} failed: {}", self.url, e))?;
        debug!("[WS] Handshake with {}: {}", self.url, response.status());

        socket.get_ref().set_nonblocking(true)?;
        self.socket = Some(socket);
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let socket = self.socket()?;
        match socket.send(Message::Text(text.to_string())) {
            Ok(()) => Ok(()),
            // Queued in tungstenite's write buffer, flushed on the next read.
            Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn recv_text(&mut self) -> Result<Option<String>> {
        let socket = self.socket()?;
        loop {
            match socket.read() {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(bytes)) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Ok(Message::Close(frame)) => {
                    self.socket = None;
                    return Err(anyhow!("closed by peer: {:?}", frame));
                }
                // Ping/Pong are answered by tungstenite itself.
                Ok(_) => continue,
                Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok(None);
                }
                Err(e) => {
                    self.socket = None;
                    return Err(e.into());
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None) {
                debug!("[WS] Close handshake failed: {}", e);
            }
            if let Err(e) = socket.flush() {
                debug!("[WS] Flush after close failed: {}", e);
            }
        }
    }
}
