//! Terminal session lifecycle.
//!
//! A [`Term`] owns one PTY pair, the child process started on its slave
//! side, the VT emulator, and the two pump threads copying bytes between
//! them: PTY master to emulator input, and emulator output back to the PTY
//! master. [`Term::close`] tears all of it down in a fixed order and is
//! idempotent.
//!
//! # Key Types
//!
//! - [`TermConfig`] - PTY constructor, window size, and command to run
//! - [`Term`] - One running terminal session
//! - [`TermSlot`] - Single-tenant, lazily-started holder of a [`Term`]

mod slot;

pub use slot::{Key, TermSlot};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Once};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Error;
use crate::pty::{Child, Cmd, OpenFn, Session, Size, Terminal};
use crate::vterm::{Color, Modifier, ScreenShot, Vt};

/// How long a child gets to exit on its own before the signal ladder starts.
const REAP_GRACE: Duration = Duration::from_millis(500);
const REAP_POLL: Duration = Duration::from_millis(10);
const PUMP_BUF_LEN: usize = 4096;

/// Unique identifier of one terminal session, for log correlation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TermId(Uuid);

impl TermId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TermId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Configuration for starting a [`Term`].
#[derive(Clone)]
pub struct TermConfig {
    /// PTY constructor; swap in [`crate::pty::MockTerminal::opener`] in
    /// tests.
    pub open: OpenFn,
    pub size: Size,
    pub cmd: Cmd,
}

impl fmt::Debug for TermConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermConfig")
            .field("size", &self.size)
            .field("cmd", &self.cmd)
            .finish_non_exhaustive()
    }
}

/// One running terminal session: PTY, child process, emulator, and pumps.
pub struct Term {
    id: TermId,
    pt: Arc<dyn Terminal>,
    session: Box<dyn Session>,
    child: Mutex<Box<dyn Child>>,
    vt: Arc<Vt>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    close_once: Once,
}

impl Term {
    /// Open the PTY, wire the emulator and pumps, and start the child.
    ///
    /// On any failure the partially built session is unwound: whatever was
    /// opened is closed, the emulator output is closed, and both pumps are
    /// joined before the error is returned.
    pub fn new(config: TermConfig) -> Result<Self, Error> {
        let pt = (config.open)()?;

        let vt = Arc::new(Vt::new(config.size.row, config.size.col));
        vt.set_altscreen(true);
        vt.set_reflow(false);
        vt.set_utf8(true);
        vt.set_default_color(Color::indexed(7), Color::indexed(0));

        let pumps = vec![
            spawn_input_pump(Arc::clone(&pt), Arc::clone(&vt)),
            spawn_output_pump(Arc::clone(&pt), Arc::clone(&vt)),
        ];

        let session = match pt.session(config.size) {
            Ok(session) => session,
            Err(err) => {
                unwind_setup(&pt, &vt, pumps);
                return Err(err);
            }
        };

        let child = match session.start_process(&config.cmd) {
            Ok(child) => child,
            Err(err) => {
                if let Err(close_err) = session.close() {
                    panic!("session close failed during unwind: {close_err}");
                }
                unwind_setup(&pt, &vt, pumps);
                return Err(err);
            }
        };

        let id = TermId::new();
        info!(%id, cmd = %config.cmd.path, rows = config.size.row, cols = config.size.col, "terminal session started");

        Ok(Self {
            id,
            pt,
            session,
            child: Mutex::new(child),
            vt,
            pumps: Mutex::new(pumps),
            close_once: Once::new(),
        })
    }

    pub fn id(&self) -> TermId {
        self.id
    }

    /// Deliver a key event to the emulator. Returns false when the key names
    /// neither a known named key nor a single rune.
    pub fn keyboard(&self, key: &Key, modifier: Modifier) -> bool {
        if let Some(vt_key) = key.vt_key() {
            self.vt.keyboard_key(vt_key, modifier);
            return true;
        }
        if let Some(rune) = key.rune() {
            self.vt.keyboard_rune(rune, modifier);
            return true;
        }
        false
    }

    /// Snapshot the emulator's screen.
    pub fn capture(&self) -> ScreenShot {
        self.vt.capture()
    }

    /// Tear the session down: session, PTY pair, emulator output, child,
    /// pumps, in that order. Safe to call more than once.
    pub fn close(&self) {
        self.close_once.call_once(|| self.close_impl());
    }

    fn close_impl(&self) {
        if let Err(err) = self.session.close() {
            panic!("session close failed: {err}");
        }
        if let Err(err) = self.pt.close() {
            panic!("terminal close failed: {err}");
        }
        self.vt.close_output();
        self.reap_child();

        let pumps = std::mem::take(&mut *lock(&self.pumps));
        for pump in pumps {
            if let Err(payload) = pump.join() {
                std::panic::resume_unwind(payload);
            }
        }
        debug!(id = %self.id, "terminal session closed");
    }

    /// Wait for the child to exit, escalating to signals when the hangup
    /// from the closed master is not enough.
    fn reap_child(&self) {
        let mut child = lock(&self.child);
        if wait_for_exit(child.as_mut(), REAP_GRACE) {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = child.process_id() {
            signal_process_group(pid, nix::sys::signal::Signal::SIGTERM);
            if wait_for_exit(child.as_mut(), REAP_GRACE) {
                return;
            }
        }

        if let Err(err) = child.kill() {
            debug!(id = %self.id, error = %err, "child kill failed");
        }
        wait_for_exit(child.as_mut(), REAP_GRACE);
    }
}

fn spawn_input_pump(pt: Arc<dyn Terminal>, vt: Arc<Vt>) -> JoinHandle<()> {
    spawn_named("termhost-input-pump", move || {
        let mut buf = [0u8; PUMP_BUF_LEN];
        loop {
            match pt.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(err) = vt.write(&buf[..n]) {
                        panic!("emulator write failed: {err}");
                    }
                }
                Err(err) if err.is_closed() => break,
                Err(err) => panic!("pty read failed: {err}"),
            }
        }
    })
}

fn spawn_output_pump(pt: Arc<dyn Terminal>, vt: Arc<Vt>) -> JoinHandle<()> {
    let mut reader = vt.output();
    spawn_named("termhost-output-pump", move || {
        use std::io::Read;

        let mut buf = [0u8; PUMP_BUF_LEN];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let mut written = 0;
            while written < n {
                match pt.write(&buf[written..n]) {
                    Ok(w) => written += w,
                    Err(err) if err.is_closed() => return,
                    Err(err) => panic!("pty write failed: {err}"),
                }
            }
        }
    })
}

fn spawn_named(name: &str, body: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    match std::thread::Builder::new().name(name.to_string()).spawn(body) {
        Ok(handle) => handle,
        Err(err) => panic!("failed to spawn {name}: {err}"),
    }
}

/// Failure unwind shared by the [`Term::new`] setup steps.
fn unwind_setup(pt: &Arc<dyn Terminal>, vt: &Arc<Vt>, pumps: Vec<JoinHandle<()>>) {
    if let Err(err) = pt.close() {
        panic!("terminal close failed during unwind: {err}");
    }
    vt.close_output();
    for pump in pumps {
        if let Err(payload) = pump.join() {
            std::panic::resume_unwind(payload);
        }
    }
}

fn wait_for_exit(child: &mut dyn Child, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(code)) => {
                debug!(code, "child process exited");
                return true;
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    return false;
                }
                std::thread::sleep(REAP_POLL);
            }
            Err(err) => panic!("failed to wait for child: {err}"),
        }
    }
}

#[cfg(unix)]
fn signal_process_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    // ESRCH means the process is already gone.
    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(err) => debug!(pid, error = %err, "failed to signal process group"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(err) => panic!("terminal state poisoned: {err}"),
    }
}
