use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::StreamSerial;
use crate::traits::SerialPort;

/// Serial device node (e.g. `/dev/ttyUSB0`) in raw, non-blocking mode.
pub struct TtySerial {
    stream: StreamSerial<File>,
    path: PathBuf,
    baud: u32,
}

impl TtySerial {
    /// Default line rate used by the dongle firmware.
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Open `path` at [`TtySerial::DEFAULT_BAUD`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_baud(path, Self::DEFAULT_BAUD)
    }

    /// Open `path`, switch it to raw 8N1 and set the line rate.
    pub fn open_with_baud(path: impl AsRef<Path>, baud: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let speed = baud_constant(baud).ok_or_else(|| TransportError::Configure {
            path: path.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {baud}"),
            ),
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|e| TransportError::Open {
                path: path.clone(),
                source: e,
            })?;

        configure_raw(&file, speed).map_err(|e| TransportError::Configure {
            path: path.clone(),
            source: e,
        })?;

        info!(?path, baud, "opened serial device");

        Ok(Self {
            stream: StreamSerial::new(file),
            path,
            baud,
        })
    }

    /// The device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured line rate.
    pub fn baud(&self) -> u32 {
        self.baud
    }
}

impl SerialPort for TtySerial {
    fn available(&mut self) -> Result<usize> {
        self.stream.available()
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.stream.read_byte()
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()
    }
}

impl std::fmt::Debug for TtySerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtySerial")
            .field("path", &self.path)
            .field("baud", &self.baud)
            .finish()
    }
}

fn baud_constant(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        _ => return None,
    };
    Some(speed)
}

fn configure_raw(file: &File, speed: libc::speed_t) -> std::io::Result<()> {
    let fd = file.as_raw_fd();

    // SAFETY: an all-zero termios is a valid value to pass to tcgetattr,
    // which overwrites it.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor owned by `file` and `tio` is a valid
    // writable termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: `tio` was initialised by tcgetattr above.
    unsafe {
        libc::cfmakeraw(&mut tio);
        if libc::cfsetspeed(&mut tio, speed) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    // SAFETY: `fd` is open and `tio` is a fully initialised termios.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    debug!(fd, "serial line set to raw mode");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_baud_rates() {
        assert!(baud_constant(115_200).is_some());
        assert!(baud_constant(9_600).is_some());
        assert!(baud_constant(12_345).is_none());
    }

    #[test]
    fn test_open_missing_device() {
        let result = TtySerial::open("/dev/ntrp-does-not-exist");
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }

    #[test]
    fn test_unsupported_baud_rejected_before_open() {
        let result = TtySerial::open_with_baud("/dev/ntrp-does-not-exist", 1234);
        assert!(matches!(result, Err(TransportError::Configure { .. })));
    }

    #[test]
    fn test_regular_file_is_not_a_tty() {
        let path = std::env::temp_dir().join(format!("ntrp-tty-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let result = TtySerial::open(&path);
        assert!(matches!(result, Err(TransportError::Configure { .. })));

        let _ = std::fs::remove_file(&path);
    }
}
