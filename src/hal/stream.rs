//! [`Transport`] over `std::io` streams.
//!
//! Works with anything `Read + Write`: a TCP connection, a serial device
//! opened as a file, or stdin/stdout. Reads must time out for
//! `read_available` to stay bounded, so the constructors set that up:
//!
//! - [`StreamTransport::tcp`] sets a socket read timeout.
//! - [`StreamTransport::stdio`] pumps stdin through a helper thread and waits
//!   on the channel with a timeout.
//!
//! Timeouts, `WouldBlock` and `Interrupted` read as "no bytes"; end of stream
//! reads as [`TransportError::Closed`].

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::error::TransportError;
use crate::traits::Transport;

/// Size of a single read.
const READ_CHUNK: usize = 256;

type Closer = Box<dyn FnOnce() + Send>;

/// Transport built from a reader half and a writer half.
pub struct StreamTransport<R, W> {
    reader: Option<R>,
    writer: Option<W>,
    closer: Option<Closer>,
}

impl<R, W> StreamTransport<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    /// Wrap a reader and writer. The reader should time out on its own.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            closer: None,
        }
    }

    /// Run `closer` once when the transport is closed.
    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl StreamTransport<TcpStream, TcpStream> {
    /// Transport over a connected socket; reads wait at most `poll`.
    pub fn tcp(stream: TcpStream, poll: Duration) -> io::Result<Self> {
        stream.set_read_timeout(Some(poll))?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        let handle = stream.try_clone()?;
        Ok(Self::new(stream, writer).with_closer(move || {
            // Peer may already be gone
            let _ = handle.shutdown(Shutdown::Both);
        }))
    }
}

impl StreamTransport<ChannelReader, io::Stdout> {
    /// Transport over the process's stdin and stdout.
    pub fn stdio(poll: Duration) -> io::Result<Self> {
        let reader = ChannelReader::spawn("vfd-stdin", io::stdin(), poll)?;
        Ok(Self::new(reader, io::stdout()))
    }
}

impl<R, W> Transport for StreamTransport<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = [0u8; READ_CHUNK];
        match reader.read(&mut buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
        self.reader = None;
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl<R, W> core::fmt::Debug for StreamTransport<R, W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("open", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Channel Reader
// ============================================================================

/// `Read` adapter over a blocking source drained by a helper thread.
///
/// `read` waits at most the poll interval and then reports `TimedOut`. The
/// helper thread ends when the source reaches EOF or the reader is dropped
/// and the next chunk arrives.
#[derive(Debug)]
pub struct ChannelReader {
    rx: Receiver<io::Result<Vec<u8>>>,
    poll: Duration,
    pending: Vec<u8>,
}

impl ChannelReader {
    /// Spawn a thread named `name` that forwards `source` chunk by chunk.
    pub fn spawn<S>(name: &str, mut source: S, poll: Duration) -> io::Result<Self>
    where
        S: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new().name(name.into()).spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                let chunk = match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => Ok(buf[..n].to_vec()),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => Err(err),
                };
                let failed = chunk.is_err();
                if tx.send(chunk).is_err() || failed {
                    break;
                }
            }
        })?;
        Ok(Self {
            rx,
            poll,
            pending: Vec::new(),
        })
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.poll) {
                Ok(chunk) => self.pending = chunk?,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::from(io::ErrorKind::TimedOut))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;

    #[test]
    fn cursor_reads_then_closes() {
        let mut t = StreamTransport::new(Cursor::new(b"RUN\n".to_vec()), Vec::new());
        assert_eq!(t.read_available().unwrap(), b"RUN\n");
        assert!(matches!(t.read_available(), Err(TransportError::Closed)));
    }

    #[test]
    fn writes_reach_writer_and_close_is_idempotent() {
        let mut t = StreamTransport::new(io::empty(), Vec::new());
        t.write(b"OK\r\n").unwrap();
        assert_eq!(t.writer.as_deref(), Some(&b"OK\r\n"[..]));
        t.close();
        t.close();
        assert!(t.is_closed());
        assert!(matches!(t.write(b"x"), Err(TransportError::Closed)));
        assert!(matches!(t.read_available(), Err(TransportError::Closed)));
    }

    #[test]
    fn channel_reader_times_out_then_delivers() {
        let (pipe_tx, pipe_rx) = mpsc::channel::<Vec<u8>>();
        struct Source(Receiver<Vec<u8>>);
        impl Read for Source {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.0.recv() {
                    Ok(bytes) => {
                        buf[..bytes.len()].copy_from_slice(&bytes);
                        Ok(bytes.len())
                    }
                    Err(_) => Ok(0),
                }
            }
        }

        let reader =
            ChannelReader::spawn("test-source", Source(pipe_rx), Duration::from_millis(10))
                .unwrap();
        let mut t = StreamTransport::new(reader, Vec::new());
        assert!(t.read_available().unwrap().is_empty());

        pipe_tx.send(b"HELP\n".to_vec()).unwrap();
        let mut got = Vec::new();
        for _ in 0..100 {
            got.extend(t.read_available().unwrap());
            if !got.is_empty() {
                break;
            }
        }
        assert_eq!(got, b"HELP\n");

        drop(pipe_tx);
        let mut closed = false;
        for _ in 0..100 {
            if matches!(t.read_available(), Err(TransportError::Closed)) {
                closed = true;
                break;
            }
        }
        assert!(closed);
    }

    #[test]
    fn tcp_read_times_out_and_close_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();

        let mut t = StreamTransport::tcp(server, Duration::from_millis(20)).unwrap();
        assert!(t.read_available().unwrap().is_empty());

        client.write_all(b"STATUS\r\n").unwrap();
        let mut got = Vec::new();
        while got.len() < 8 {
            got.extend(t.read_available().unwrap());
        }
        assert_eq!(got, b"STATUS\r\n");

        t.close();
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }
}
