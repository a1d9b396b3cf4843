//! In-memory PTY for tests.
//!
//! [`MockTerminal`] implements the full capability set without touching the
//! platform. The far side of the wire is a [`MockComputer`]: what it writes,
//! the terminal reads, and vice versa. Each fallible operation can be
//! scripted to fail via [`MockFailures`], and misuse of the lifecycle
//! (double open, close with a live session) aborts, mirroring the contract
//! the native layer enforces.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::error::Error;
use crate::pty::{Child, Cmd, OpenFn, Session, Size, Terminal};

/// Which mock operations should fail.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockFailures {
    pub open: bool,
    pub session: bool,
    pub start_process: bool,
    pub get_size: bool,
    pub set_size: bool,
    pub close_session: bool,
    pub close_terminal: bool,
}

#[derive(Default)]
struct State {
    terminal_open: bool,
    session_open: bool,
    size: Size,
    cmd: Option<Cmd>,
    /// Computer -> terminal bytes, read by the input pump.
    input: VecDeque<u8>,
    input_closed: bool,
    /// Terminal -> computer bytes, written by the output pump.
    output: Vec<u8>,
}

struct Inner {
    failures: MockFailures,
    state: Mutex<State>,
    input_ready: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(err) => panic!("mock pty state poisoned: {err}"),
        }
    }
}

/// An in-memory stand-in for the platform PTY.
pub struct MockTerminal {
    inner: Arc<Inner>,
}

impl MockTerminal {
    pub fn new() -> Self {
        Self::with_failures(MockFailures::default())
    }

    pub fn with_failures(failures: MockFailures) -> Self {
        Self {
            inner: Arc::new(Inner {
                failures,
                state: Mutex::new(State::default()),
                input_ready: Condvar::new(),
            }),
        }
    }

    /// Constructor closure for [`crate::term::TermConfig`].
    pub fn opener(&self) -> OpenFn {
        let inner = Arc::clone(&self.inner);
        Arc::new(move || {
            if inner.failures.open {
                return Err(Error::TerminalOpen("mock terminal open failure".into()));
            }
            let mut state = inner.lock();
            assert!(!state.terminal_open, "mock terminal already open");
            *state = State {
                terminal_open: true,
                ..State::default()
            };
            drop(state);
            Ok(Arc::new(MockTerminal {
                inner: Arc::clone(&inner),
            }) as Arc<dyn Terminal>)
        })
    }

    /// The far side of the wire.
    pub fn computer(&self) -> MockComputer {
        MockComputer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Another handle onto the same terminal, sharing all state.
    pub fn handle(&self) -> Arc<dyn Terminal> {
        Arc::new(Self {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn is_terminal_open(&self) -> bool {
        self.inner.lock().terminal_open
    }

    pub fn is_session_open(&self) -> bool {
        self.inner.lock().session_open
    }

    pub fn size(&self) -> Size {
        self.inner.lock().size
    }

    /// The command most recently started on the session.
    pub fn command(&self) -> Option<Cmd> {
        self.inner.lock().cmd.clone()
    }
}

impl Default for MockTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for MockTerminal {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.inner.lock();
        loop {
            if !state.input.is_empty() {
                let n = buf.len().min(state.input.len());
                for slot in buf.iter_mut().take(n) {
                    if let Some(byte) = state.input.pop_front() {
                        *slot = byte;
                    }
                }
                return Ok(n);
            }
            if state.input_closed {
                return Err(Error::Closed);
            }
            state = match self.inner.input_ready.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        let mut state = self.inner.lock();
        state.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn session(&self, size: Size) -> Result<Box<dyn Session>, Error> {
        if self.inner.failures.session {
            return Err(Error::SessionOpen("mock session open failure".into()));
        }

        let mut state = self.inner.lock();
        assert!(state.terminal_open, "mock terminal not open");
        assert!(!state.session_open, "mock session already open");
        state.size = size;
        state.session_open = true;
        Ok(Box::new(MockSession {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn close(&self) -> Result<(), Error> {
        if self.inner.failures.close_terminal {
            return Err(Error::Io(std::io::Error::other(
                "mock terminal close failure",
            )));
        }

        let mut state = self.inner.lock();
        assert!(state.terminal_open, "mock terminal not open");
        assert!(!state.session_open, "mock session still open");
        state.terminal_open = false;
        state.input_closed = true;
        self.inner.input_ready.notify_all();
        Ok(())
    }
}

struct MockSession {
    inner: Arc<Inner>,
}

impl Session for MockSession {
    fn start_process(&self, cmd: &Cmd) -> Result<Box<dyn Child>, Error> {
        if self.inner.failures.start_process {
            return Err(Error::StartProcess("mock start process failure".into()));
        }

        let mut state = self.inner.lock();
        assert!(state.session_open, "mock session not open");
        state.cmd = Some(cmd.clone());
        Ok(Box::new(MockChild))
    }

    fn get_size(&self) -> Result<Size, Error> {
        if self.inner.failures.get_size {
            return Err(Error::Io(std::io::Error::other("mock get size failure")));
        }

        let state = self.inner.lock();
        assert!(state.session_open, "mock session not open");
        Ok(state.size)
    }

    fn set_size(&self, size: Size) -> Result<(), Error> {
        if self.inner.failures.set_size {
            return Err(Error::Io(std::io::Error::other("mock set size failure")));
        }

        let mut state = self.inner.lock();
        assert!(state.session_open, "mock session not open");
        state.size = size;
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        if self.inner.failures.close_session {
            return Err(Error::Io(std::io::Error::other(
                "mock session close failure",
            )));
        }

        let mut state = self.inner.lock();
        assert!(state.session_open, "mock session not open");
        state.session_open = false;
        Ok(())
    }
}

/// The mock child reports itself as already exited.
struct MockChild;

impl Child for MockChild {
    fn try_wait(&mut self) -> Result<Option<u32>, Error> {
        Ok(Some(0))
    }

    fn kill(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn process_id(&self) -> Option<u32> {
        None
    }
}

/// The far side of the mock wire: what the child process would see.
pub struct MockComputer {
    inner: Arc<Inner>,
}

impl MockComputer {
    /// Write bytes the terminal will read. Fails once the terminal closes.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, Error> {
        let mut state = self.inner.lock();
        if !state.terminal_open {
            return Err(Error::Closed);
        }
        state.input.extend(bytes.iter().copied());
        self.inner.input_ready.notify_all();
        Ok(bytes.len())
    }

    /// Drain bytes the terminal has written so far. Never blocks.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut state = self.inner.lock();
        let n = buf.len().min(state.output.len());
        buf[..n].copy_from_slice(&state.output[..n]);
        state.output.drain(..n);
        Ok(n)
    }

    /// Everything the terminal has written so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.lock().output)
    }
}
