use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TransportError};
use crate::traits::SerialPort;

const INITIAL_BUFFER_CAPACITY: usize = 256;
const READ_CHUNK_SIZE: usize = 256;

/// Default time a stalled peer gets to drain output before a write fails.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Sleep between write attempts while the peer is not draining.
const WRITE_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Adapts any non-blocking `Read + Write` stream to [`SerialPort`].
///
/// Incoming bytes are drained into an internal buffer on every
/// [`SerialPort::available`] call. `WouldBlock` means "nothing more right
/// now"; end-of-stream means the peer hung up and is reported as
/// [`TransportError::Closed`].
///
/// Writes that hit `WouldBlock` are retried on the clock until
/// the write timeout runs out, then fail with
/// [`TransportError::WriteTimeout`].
pub struct StreamSerial<T, C = SystemClock> {
    inner: T,
    rx: BytesMut,
    clock: C,
    write_timeout: Duration,
}

impl<T: Read + Write> StreamSerial<T> {
    pub fn new(inner: T) -> Self {
        Self::with_clock(inner, SystemClock::new())
    }
}

impl<T: Read + Write, C: Clock> StreamSerial<T, C> {
    /// Wrap `inner`, bounding stalled writes on `clock`.
    pub fn with_clock(inner: T, clock: C) -> Self {
        Self {
            inner,
            rx: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            clock,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Replace the write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    warn!(buffered = self.rx.len(), "serial peer hung up");
                    return Err(TransportError::Closed);
                }
                Ok(n) => {
                    trace!(bytes = n, "serial rx");
                    self.rx.extend_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        return Ok(());
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Sleep one retry step, or fail once `start + write_timeout` is reached.
    fn backoff(&self, start: Duration, written: usize) -> Result<()> {
        let waited = self.clock.now().saturating_sub(start);
        if waited >= self.write_timeout {
            warn!(written, ?waited, "serial write stalled");
            return Err(TransportError::WriteTimeout { written, waited });
        }
        self.clock
            .sleep(WRITE_RETRY_INTERVAL.min(self.write_timeout - waited));
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the adapter and return the inner stream.
    ///
    /// Bytes already buffered but not yet read are dropped.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write, C: Clock> SerialPort for StreamSerial<T, C> {
    fn available(&mut self) -> Result<usize> {
        self.fill()?;
        Ok(self.rx.len())
    }

    fn read_byte(&mut self) -> Result<u8> {
        if self.rx.is_empty() {
            self.fill()?;
        }
        if self.rx.is_empty() {
            return Err(TransportError::NoData);
        }
        Ok(self.rx.get_u8())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let start = self.clock.now();
        let mut offset = 0usize;
        while offset < buf.len() {
            match self.inner.write(&buf[offset..]) {
                Ok(0) => return Err(TransportError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => self.backoff(start, offset)?,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let start = self.clock.now();
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => self.backoff(start, 0)?,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<T, C> std::fmt::Debug for StreamSerial<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSerial")
            .field("buffered", &self.rx.len())
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::clock::ManualClock;

    /// In-memory duplex: reads from `input`, appends writes to `output`.
    /// A drained input reports `WouldBlock`, like an idle device.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.input.read(buf)? {
                0 if !buf.is_empty() => Err(ErrorKind::WouldBlock.into()),
                n => Ok(n),
            }
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn buffers_and_reads_bytes() {
        let mut serial = StreamSerial::new(Duplex {
            input: Cursor::new(b"abc".to_vec()),
            output: Vec::new(),
        });

        assert_eq!(serial.available().unwrap(), 3);
        assert_eq!(serial.read_byte().unwrap(), b'a');
        assert_eq!(serial.available().unwrap(), 2);
        assert_eq!(serial.read_byte().unwrap(), b'b');
        assert_eq!(serial.read_byte().unwrap(), b'c');
        assert!(matches!(serial.read_byte(), Err(TransportError::NoData)));
    }

    #[test]
    fn writes_reach_inner_stream() {
        let mut serial = StreamSerial::new(Duplex {
            input: Cursor::new(Vec::new()),
            output: Vec::new(),
        });

        serial.write_all(b"-S-").unwrap();
        serial.send_sync_token(b"-S-").unwrap();

        assert_eq!(serial.get_ref().output, b"-S--S-");
    }

    #[test]
    fn would_block_is_not_an_error() {
        struct Blocking;

        impl Read for Blocking {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(ErrorKind::WouldBlock.into())
            }
        }

        impl Write for Blocking {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut serial = StreamSerial::new(Blocking);
        assert_eq!(serial.available().unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn works_over_nonblocking_socket_pair() {
        let (left, mut right) = std::os::unix::net::UnixStream::pair().unwrap();
        left.set_nonblocking(true).unwrap();
        let mut serial = StreamSerial::new(left);

        assert_eq!(serial.available().unwrap(), 0);
        right.write_all(b"xy").unwrap();
        assert_eq!(serial.available().unwrap(), 2);

        serial.write_all(b"ok").unwrap();
        let mut buf = [0u8; 2];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ok");
    }

    #[test]
    fn end_of_stream_is_a_hangup() {
        let mut serial = StreamSerial::new(Cursor::new(b"z".to_vec()));

        assert_eq!(serial.available().unwrap(), 1);
        assert_eq!(serial.read_byte().unwrap(), b'z');
        assert!(matches!(serial.available(), Err(TransportError::Closed)));
    }

    #[cfg(unix)]
    #[test]
    fn dropped_peer_reports_closed() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        left.set_nonblocking(true).unwrap();
        let mut serial = StreamSerial::new(left);

        assert_eq!(serial.available().unwrap(), 0);
        drop(right);
        assert!(matches!(serial.available(), Err(TransportError::Closed)));
        assert!(matches!(serial.read_byte(), Err(TransportError::Closed)));
    }

    #[cfg(unix)]
    #[test]
    fn stalled_peer_bounds_write() {
        let clock = ManualClock::new();
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        left.set_nonblocking(true).unwrap();
        let mut serial = StreamSerial::with_clock(left, clock.clone())
            .with_write_timeout(Duration::from_millis(35));

        let big = vec![0x55u8; 4 * 1024 * 1024];
        match serial.write_all(&big) {
            Err(TransportError::WriteTimeout { written, waited }) => {
                assert!(written > 0 && written < big.len());
                assert_eq!(waited, Duration::from_millis(35));
            }
            other => panic!("expected write timeout, got {other:?}"),
        }
        assert_eq!(clock.now(), Duration::from_millis(35));
    }

    #[test]
    fn write_recovers_when_peer_drains() {
        /// Accepts nothing on the first attempt, then everything.
        struct Sluggish {
            stalls: usize,
            output: Vec<u8>,
        }

        impl Read for Sluggish {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(ErrorKind::WouldBlock.into())
            }
        }

        impl Write for Sluggish {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.stalls > 0 {
                    self.stalls -= 1;
                    return Err(ErrorKind::WouldBlock.into());
                }
                self.output.extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let clock = ManualClock::new();
        let mut serial = StreamSerial::with_clock(
            Sluggish {
                stalls: 3,
                output: Vec::new(),
            },
            clock.clone(),
        );

        serial.write_all(b"-S-").unwrap();
        assert_eq!(serial.get_ref().output, b"-S-");
        assert_eq!(clock.now(), Duration::from_millis(3));
    }
}
