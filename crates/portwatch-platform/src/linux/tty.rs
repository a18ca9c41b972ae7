//! Serial ports behind tty nodes.

use std::fs::File;

use nix::errno::Errno;
use nix::sys::termios::{
    self, BaudRate as TermiosRate, ControlFlags, InputFlags, SetArg, Termios,
};
use portwatch_core::{
    BaudRate, Channel, Error, FlowControl, Parity, Result, SerialSettings, Waitable,
};
use tracing::debug;

use super::fd;

/// Maps a supported rate onto the termios constant.
#[must_use]
pub const fn termios_rate(rate: BaudRate) -> TermiosRate {
    match rate {
        BaudRate::B110 => TermiosRate::B110,
        BaudRate::B134 => TermiosRate::B134,
        BaudRate::B150 => TermiosRate::B150,
        BaudRate::B200 => TermiosRate::B200,
        BaudRate::B300 => TermiosRate::B300,
        BaudRate::B600 => TermiosRate::B600,
        BaudRate::B1200 => TermiosRate::B1200,
        BaudRate::B1800 => TermiosRate::B1800,
        BaudRate::B2400 => TermiosRate::B2400,
        BaudRate::B4800 => TermiosRate::B4800,
        BaudRate::B9600 => TermiosRate::B9600,
        BaudRate::B19200 => TermiosRate::B19200,
        BaudRate::B38400 => TermiosRate::B38400,
        BaudRate::B57600 => TermiosRate::B57600,
        BaudRate::B115200 => TermiosRate::B115200,
    }
}

/// Writes `settings` into a raw-mode termios structure.
pub fn apply_settings(tio: &mut Termios, settings: &SerialSettings) -> nix::Result<()> {
    termios::cfmakeraw(tio);
    termios::cfsetspeed(tio, termios_rate(settings.baud))?;

    let cflag = &mut tio.control_flags;
    cflag.remove(ControlFlags::CSIZE | ControlFlags::PARENB | ControlFlags::PARODD);
    cflag.remove(ControlFlags::CSTOPB | ControlFlags::CRTSCTS | ControlFlags::HUPCL);
    cflag.insert(ControlFlags::CLOCAL | ControlFlags::CREAD);
    cflag.insert(match settings.data_bits {
        5 => ControlFlags::CS5,
        6 => ControlFlags::CS6,
        7 => ControlFlags::CS7,
        _ => ControlFlags::CS8,
    });
    match settings.parity {
        Parity::None => {}
        Parity::Odd => cflag.insert(ControlFlags::PARENB | ControlFlags::PARODD),
        Parity::Even => cflag.insert(ControlFlags::PARENB),
    }
    if settings.stop_bits == 2 {
        cflag.insert(ControlFlags::CSTOPB);
    }
    if settings.hangup_on_close {
        cflag.insert(ControlFlags::HUPCL);
    }

    tio.input_flags.remove(InputFlags::IXON | InputFlags::IXOFF);
    match settings.flow_control {
        FlowControl::None => {}
        FlowControl::XonXoff => tio.input_flags.insert(InputFlags::IXON | InputFlags::IXOFF),
        FlowControl::RtsCts => tio.control_flags.insert(ControlFlags::CRTSCTS),
    }
    Ok(())
}

/// Open tty node.
#[derive(Debug)]
pub struct TtyChannel {
    file: File,
    path: String,
}

impl TtyChannel {
    /// Opens the tty node at `path`.
    ///
    /// # Errors
    /// See [`fd::open_node`].
    pub fn open(path: &str) -> Result<Self> {
        let file = fd::open_node(path)?;
        Ok(Self {
            file,
            path: path.to_string(),
        })
    }

    fn termios_error(&self, call: &str, errno: Errno) -> Error {
        match errno {
            Errno::EIO | Errno::ENXIO => {
                Error::io(format!("I/O error while configuring '{}'", self.path))
            }
            _ => Error::system(format!("{call}('{}') failed: {}", self.path, errno.desc())),
        }
    }
}

impl Channel for TtyChannel {
    fn waitable(&self) -> Waitable {
        fd::waitable(&self.file)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        fd::read_timeout(&mut self.file, &self.path, buf, timeout_ms)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        fd::write_blocking(&mut self.file, &self.path, buf)
    }

    fn configure_serial(&mut self, settings: &SerialSettings) -> Result<()> {
        let mut tio =
            termios::tcgetattr(&self.file).map_err(|e| self.termios_error("tcgetattr", e))?;
        apply_settings(&mut tio, settings).map_err(|e| self.termios_error("cfsetspeed", e))?;
        termios::tcsetattr(&self.file, SetArg::TCSANOW, &tio)
            .map_err(|e| self.termios_error("tcsetattr", e))?;
        debug!(path = %self.path, %settings, "serial port configured");
        Ok(())
    }
}
