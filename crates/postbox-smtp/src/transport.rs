//! Line-oriented transport with per-operation deadlines.
//!
//! SMTP is interactive and bounded: every read and write carries its own
//! deadline so a misbehaving peer can never wedge a session task. EOF,
//! timeouts and broken pipes all collapse into the same terminal
//! [`Error::ConnectionClosed`] signal; the distinction only survives in
//! logs.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Default read deadline for server sessions.
pub const SERVER_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default read deadline for client sessions.
pub const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default write deadline for both sides.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Buffered CRLF line transport over any byte stream.
///
/// Reads return logical lines normalised to end in CRLF; writes append a
/// CRLF when the caller did not provide one and push until every byte is
/// flushed. Deadlines are per call, not per session.
pub struct SmtpTransport<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<S> SmtpTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a transport with server-side deadlines (read 60 s, write 30 s).
    pub fn server(stream: S) -> Self {
        Self::with_timeouts(stream, SERVER_READ_TIMEOUT, WRITE_TIMEOUT)
    }

    /// Creates a transport with client-side deadlines (read 30 s, write 30 s).
    pub fn client(stream: S) -> Self {
        Self::with_timeouts(stream, CLIENT_READ_TIMEOUT, WRITE_TIMEOUT)
    }

    /// Creates a transport with explicit deadlines.
    pub fn with_timeouts(stream: S, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            read_timeout,
            write_timeout,
        }
    }

    /// Reads the next logical line, terminated by LF or CRLF.
    ///
    /// The returned value always ends in CRLF; the original delimiter is
    /// stripped first. Lines longer than the internal buffer are
    /// concatenated across underlying reads; no maximum length is
    /// enforced.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] on EOF, deadline expiry, or a
    /// connection-level I/O failure; [`Error::Io`] for anything else.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let read = timeout(self.read_timeout, self.reader.read_until(b'\n', &mut buf))
            .await
            .map_err(|_| {
                tracing::debug!("read deadline expired");
                Error::ConnectionClosed
            })?
            .map_err(classify_io)?;

        if read == 0 {
            tracing::debug!("peer closed the connection");
            return Err(Error::ConnectionClosed);
        }

        let line = String::from_utf8_lossy(&buf);
        let mut line = line.trim_end_matches(['\r', '\n']).to_string();
        line.push_str("\r\n");
        Ok(line)
    }

    /// Writes a line, appending CRLF when missing, flushing everything.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] on deadline expiry or a
    /// connection-level I/O failure; [`Error::Io`] for anything else.
    pub async fn write(&mut self, line: &str) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(line.as_bytes());
        if !line.ends_with("\r\n") {
            self.write_buffer.extend_from_slice(b"\r\n");
        }

        let write_buffer = &self.write_buffer;
        let stream = self.reader.get_mut();
        let io = async move {
            stream.write_all(write_buffer).await?;
            stream.flush().await
        };

        timeout(self.write_timeout, io)
            .await
            .map_err(|_| {
                tracing::debug!("write deadline expired");
                Error::ConnectionClosed
            })?
            .map_err(classify_io)
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the transport and returns the underlying stream.
    ///
    /// Any bytes sitting in the read buffer are discarded. That is the
    /// required behaviour for a STARTTLS upgrade: knowledge obtained
    /// before the handshake must not survive it (RFC 3207 §4.2).
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Folds connection-level failures into the terminal close signal.
fn classify_io(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::TimedOut => {
            tracing::debug!(kind = ?e.kind(), "connection-level I/O failure");
            Error::ConnectionClosed
        }
        _ => Error::Io(e),
    }
}
