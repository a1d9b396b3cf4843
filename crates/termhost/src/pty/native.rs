//! Native PTY implementation over `portable-pty`.
//!
//! The master file descriptor is switched to non-blocking so a pending read
//! can be cancelled by `close`: reads poll under a short sleep and observe
//! the closed flag between attempts. After close, both pumps see
//! [`Error::Closed`] and exit.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize, SlavePty};

use crate::error::Error;
use crate::pty::{Child, Cmd, Session, Size, Terminal};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

struct State {
    master: Option<Box<dyn MasterPty + Send>>,
    slave: Option<Box<dyn SlavePty + Send>>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    session_open: bool,
}

struct Inner {
    state: Mutex<State>,
    closed: AtomicBool,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(err) => panic!("pty state poisoned: {err}"),
        }
    }
}

pub(crate) struct NativeTerminal {
    inner: Arc<Inner>,
}

struct NativeSession {
    inner: Arc<Inner>,
}

struct NativeChild {
    child: Box<dyn portable_pty::Child + Send + Sync>,
}

/// Allocate a PTY pair and prepare the master for cancellable reads.
pub(crate) fn open() -> Result<Arc<dyn Terminal>, Error> {
    let system = native_pty_system();
    let pair = system
        .openpty(PtySize::default())
        .map_err(|err| Error::TerminalOpen(err.into()))?;

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|err| Error::TerminalOpen(err.into()))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|err| Error::TerminalOpen(err.into()))?;

    #[cfg(unix)]
    set_nonblocking(pair.master.as_ref())?;

    Ok(Arc::new(NativeTerminal {
        inner: Arc::new(Inner {
            state: Mutex::new(State {
                master: Some(pair.master),
                slave: Some(pair.slave),
                reader: Some(reader),
                writer: Some(writer),
                session_open: false,
            }),
            closed: AtomicBool::new(false),
        }),
    }))
}

#[cfg(unix)]
fn set_nonblocking(master: &dyn MasterPty) -> Result<(), Error> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};

    if let Some(fd) = master.as_raw_fd() {
        let flags = OFlag::from_bits_truncate(
            fcntl(fd, FcntlArg::F_GETFL)
                .map_err(|err| Error::TerminalOpen(Box::new(err)))?,
        );
        fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
            .map_err(|err| Error::TerminalOpen(Box::new(err)))?;
    }
    Ok(())
}

impl Terminal for NativeTerminal {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        loop {
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(Error::Closed);
            }
            {
                let mut state = self.inner.lock();
                let Some(reader) = state.reader.as_mut() else {
                    return Err(Error::Closed);
                };
                match reader.read(buf) {
                    Ok(n) => return Ok(n),
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => return Err(map_stream_error(err)),
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        loop {
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(Error::Closed);
            }
            {
                let mut state = self.inner.lock();
                let Some(writer) = state.writer.as_mut() else {
                    return Err(Error::Closed);
                };
                match writer.write(buf) {
                    Ok(n) => return Ok(n),
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => return Err(map_stream_error(err)),
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn session(&self, size: Size) -> Result<Box<dyn Session>, Error> {
        size.validate()?;

        let mut state = self.inner.lock();
        assert!(!state.session_open, "pty session already open");
        {
            let Some(master) = state.master.as_ref() else {
                return Err(Error::Closed);
            };
            master
                .resize(pty_size(size))
                .map_err(|err| Error::SessionOpen(err.into()))?;
        }
        state.session_open = true;
        Ok(Box::new(NativeSession {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn close(&self) -> Result<(), Error> {
        let already = self.inner.closed.swap(true, Ordering::SeqCst);
        assert!(!already, "pty terminal double close");

        let mut state = self.inner.lock();
        // Dropping every handle closes the master and any leftover slave
        // descriptor, which hangs up the child's controlling terminal.
        state.reader = None;
        state.writer = None;
        state.master = None;
        state.slave = None;
        Ok(())
    }
}

impl Session for NativeSession {
    fn start_process(&self, cmd: &Cmd) -> Result<Box<dyn Child>, Error> {
        let state = self.inner.lock();
        assert!(state.session_open, "pty session not open");
        let Some(slave) = state.slave.as_ref() else {
            return Err(Error::Closed);
        };

        let mut builder = CommandBuilder::new(&cmd.path);
        builder.args(&cmd.args);
        let child = slave
            .spawn_command(builder)
            .map_err(|err| Error::StartProcess(err.into()))?;
        Ok(Box::new(NativeChild { child }))
    }

    fn get_size(&self) -> Result<Size, Error> {
        let state = self.inner.lock();
        assert!(state.session_open, "pty session not open");
        let Some(master) = state.master.as_ref() else {
            return Err(Error::Closed);
        };
        let size = master
            .get_size()
            .map_err(|err| Error::Io(std::io::Error::other(err.to_string())))?;
        Ok(Size::new(size.rows, size.cols))
    }

    fn set_size(&self, size: Size) -> Result<(), Error> {
        size.validate()?;

        let state = self.inner.lock();
        assert!(state.session_open, "pty session not open");
        let Some(master) = state.master.as_ref() else {
            return Err(Error::Closed);
        };
        master
            .resize(pty_size(size))
            .map_err(|err| Error::Io(std::io::Error::other(err.to_string())))
    }

    fn close(&self) -> Result<(), Error> {
        let mut state = self.inner.lock();
        assert!(state.session_open, "pty session not open");
        state.session_open = false;
        // Release the parent's slave descriptor; the child keeps its own.
        state.slave = None;
        Ok(())
    }
}

impl Child for NativeChild {
    fn try_wait(&mut self) -> Result<Option<u32>, Error> {
        self.child
            .try_wait()
            .map(|status| status.map(|s| s.exit_code()))
            .map_err(Error::Io)
    }

    fn kill(&mut self) -> Result<(), Error> {
        self.child.kill().map_err(Error::Io)
    }

    fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }
}

fn pty_size(size: Size) -> PtySize {
    PtySize {
        rows: size.row,
        cols: size.col,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// A master-side EIO means the slave side is gone: normal teardown on Linux,
/// not a fault.
fn map_stream_error(err: std::io::Error) -> Error {
    #[cfg(unix)]
    if err.raw_os_error() == Some(nix::errno::Errno::EIO as i32) {
        return Error::Closed;
    }
    if err.kind() == ErrorKind::BrokenPipe || err.kind() == ErrorKind::UnexpectedEof {
        return Error::Closed;
    }
    Error::Io(err)
}
