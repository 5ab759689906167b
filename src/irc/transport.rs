//! Byte-stream transports: plain TCP, TLS over TCP, and an in-memory stream.
//!
//! The engine only needs blocking reads, whole writes and a readability
//! probe with a timeout, so each transport is a thin wrapper.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A bidirectional byte stream owned by one connection.
pub trait Transport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Blocking read. `Ok(0)` means the peer closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Wait up to `timeout` for data. A zero timeout only checks.
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    fn shutdown(&mut self) -> io::Result<()>;
}

/// Open a plain or TLS stream to the configured server.
pub fn open(server: &ServerConfig) -> Result<Box<dyn Transport>> {
    info!(host = %server.host, port = server.port, tls = server.tls, "Connecting");
    let stream = TcpStream::connect((server.host.as_str(), server.port))?;
    stream.set_nodelay(true)?;
    if server.tls {
        let transport = TlsTransport::new(stream, &server.host, server.accept_invalid_certs)?;
        Ok(Box::new(transport))
    } else {
        Ok(Box::new(TcpTransport::new(stream)))
    }
}

fn peek_readable(sock: &TcpStream, timeout: Duration) -> io::Result<bool> {
    let mut probe = [0u8; 1];
    // set_read_timeout rejects a zero duration
    let result = if timeout.is_zero() {
        sock.set_nonblocking(true)?;
        let r = sock.peek(&mut probe);
        sock.set_nonblocking(false)?;
        r
    } else {
        sock.set_read_timeout(Some(timeout))?;
        let r = sock.peek(&mut probe);
        sock.set_read_timeout(None)?;
        r
    };
    match result {
        // A zero-length peek is EOF; report readable so the next read surfaces it.
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Transport for TcpTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        peek_readable(&self.stream, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

pub struct TlsTransport {
    stream: rustls::StreamOwned<rustls::ClientConnection, TcpStream>,
}

impl TlsTransport {
    pub fn new(sock: TcpStream, host: &str, accept_invalid_certs: bool) -> Result<Self> {
        let config = if accept_invalid_certs {
            rustls_insecure_config()
        } else {
            rustls_default_config()
        };
        let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
            .map_err(|_| Error::InvalidServerName(host.to_string()))?;
        let conn = rustls::ClientConnection::new(Arc::new(config), server_name)?;
        debug!(host, accept_invalid_certs, "TLS session created");
        Ok(Self {
            stream: rustls::StreamOwned::new(conn, sock),
        })
    }
}

impl Transport for TlsTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let state = self
            .stream
            .conn
            .process_new_packets()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if state.plaintext_bytes_to_read() > 0 {
            return Ok(true);
        }
        peek_readable(&self.stream.sock, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.stream.conn.send_close_notify();
        // Best effort: the peer may already be gone.
        let _ = self.stream.flush();
        match self.stream.sock.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

fn rustls_default_config() -> rustls::ClientConfig {
    install_crypto_provider();
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

fn rustls_insecure_config() -> rustls::ClientConfig {
    install_crypto_provider();
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
        .with_no_client_auth()
}

#[derive(Debug)]
struct InsecureVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::CryptoProvider::get_default()
            .map(|p| p.signature_verification_algorithms.supported_schemes())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<u8>,
    closed: bool,
}

/// Scripted in-memory stream.
///
/// Each [`MemoryHandle::feed`] call becomes one read result, so tests can
/// reproduce partial lines split across reads. Reading with nothing queued
/// reports end of stream instead of blocking.
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

/// Test-side handle for a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> (MemoryTransport, MemoryHandle) {
        let state = Arc::new(Mutex::new(MemoryState::default()));
        (
            MemoryTransport {
                state: state.clone(),
            },
            MemoryHandle { state },
        )
    }
}

impl MemoryHandle {
    pub fn feed(&self, data: impl AsRef<[u8]>) {
        self.state.lock().inbound.push_back(data.as_ref().to_vec());
    }

    /// Everything written so far, lossily decoded.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().outbound).into_owned()
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.written()
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Transport for MemoryTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "transport closed"));
        }
        state.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(0);
        }
        let Some(mut chunk) = state.inbound.pop_front() else {
            return Ok(0);
        };
        if chunk.len() > buf.len() {
            let rest = chunk.split_off(buf.len());
            state.inbound.push_front(rest);
        }
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    fn poll_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        let state = self.state.lock();
        Ok(!state.closed && !state.inbound.is_empty())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}
