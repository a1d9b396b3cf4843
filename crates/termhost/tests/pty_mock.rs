// Test module - relaxed lint rules
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! In-memory PTY mock: lifecycle, wiring, failure injection, misuse aborts.

use termhost::pty::{Cmd, MockFailures, MockTerminal, Size, Terminal};
use termhost::Error;

fn open(mock: &MockTerminal) -> std::sync::Arc<dyn Terminal> {
    (mock.opener())().expect("mock open should succeed")
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn open_session_start_and_close() {
    let mock = MockTerminal::new();
    assert!(!mock.is_terminal_open());

    let terminal = open(&mock);
    assert!(mock.is_terminal_open());

    let session = terminal.session(Size::new(10, 20)).expect("session");
    assert!(mock.is_session_open());
    assert_eq!(mock.size(), Size::new(10, 20));

    let cmd = Cmd {
        path: "sh".to_string(),
        args: vec!["-l".to_string()],
    };
    let mut child = session.start_process(&cmd).expect("start process");
    assert_eq!(mock.command(), Some(cmd));
    assert_eq!(child.try_wait().expect("try_wait"), Some(0));

    session.close().expect("session close");
    assert!(!mock.is_session_open());
    terminal.close().expect("terminal close");
    assert!(!mock.is_terminal_open());
}

#[test]
fn session_size_round_trips() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    let session = terminal.session(Size::new(5, 6)).expect("session");

    assert_eq!(session.get_size().expect("get size"), Size::new(5, 6));
    session.set_size(Size::new(7, 8)).expect("set size");
    assert_eq!(session.get_size().expect("get size"), Size::new(7, 8));

    session.close().expect("session close");
    terminal.close().expect("terminal close");
}

#[test]
fn reopen_after_close() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    terminal.close().expect("terminal close");

    let terminal = open(&mock);
    assert!(mock.is_terminal_open());
    terminal.close().expect("terminal close");
}

// =============================================================================
// Wiring
// =============================================================================

#[test]
fn computer_bytes_flow_both_ways() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    let computer = mock.computer();

    computer.write(b"input").expect("computer write");
    let mut buf = [0u8; 16];
    let n = terminal.read(&mut buf).expect("terminal read");
    assert_eq!(&buf[..n], b"input");

    terminal.write(b"output").expect("terminal write");
    let n = computer.read(&mut buf).expect("computer read");
    assert_eq!(&buf[..n], b"output");

    terminal.close().expect("terminal close");
}

#[test]
fn terminal_read_blocks_until_data() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    let computer = mock.computer();

    let handle = std::thread::spawn(move || {
        let mut buf = [0u8; 4];
        terminal.read(&mut buf).map(|n| buf[..n].to_vec())
    });
    std::thread::sleep(std::time::Duration::from_millis(20));
    computer.write(b"x").expect("computer write");

    let got = handle.join().expect("join").expect("read");
    assert_eq!(got, b"x");
}

#[test]
fn close_unblocks_pending_read_with_closed() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    let closer = open_handle(&mock);

    let handle = std::thread::spawn(move || {
        let mut buf = [0u8; 4];
        terminal.read(&mut buf)
    });
    std::thread::sleep(std::time::Duration::from_millis(20));
    closer.close().expect("terminal close");

    let result = handle.join().expect("join");
    assert!(matches!(result, Err(Error::Closed)));
}

/// A second handle onto the same mock terminal.
fn open_handle(mock: &MockTerminal) -> std::sync::Arc<dyn Terminal> {
    mock.handle()
}

#[test]
fn computer_write_fails_after_close() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    let computer = mock.computer();
    terminal.close().expect("terminal close");

    assert!(matches!(computer.write(b"x"), Err(Error::Closed)));
}

// =============================================================================
// Failure injection
// =============================================================================

#[test]
fn scripted_open_failure() {
    let mock = MockTerminal::with_failures(MockFailures {
        open: true,
        ..MockFailures::default()
    });
    let result = (mock.opener())();
    assert!(matches!(result, Err(Error::TerminalOpen(_))));
    assert!(!mock.is_terminal_open());
}

#[test]
fn scripted_session_failure() {
    let mock = MockTerminal::with_failures(MockFailures {
        session: true,
        ..MockFailures::default()
    });
    let terminal = open(&mock);
    assert!(matches!(
        terminal.session(Size::new(1, 1)),
        Err(Error::SessionOpen(_))
    ));
    assert!(!mock.is_session_open());
    terminal.close().expect("terminal close");
}

#[test]
fn scripted_start_process_failure() {
    let mock = MockTerminal::with_failures(MockFailures {
        start_process: true,
        ..MockFailures::default()
    });
    let terminal = open(&mock);
    let session = terminal.session(Size::new(1, 1)).expect("session");
    assert!(matches!(
        session.start_process(&Cmd::default()),
        Err(Error::StartProcess(_))
    ));
    assert_eq!(mock.command(), None);
    session.close().expect("session close");
    terminal.close().expect("terminal close");
}

#[test]
fn scripted_size_failures() {
    let mock = MockTerminal::with_failures(MockFailures {
        get_size: true,
        set_size: true,
        ..MockFailures::default()
    });
    let terminal = open(&mock);
    let session = terminal.session(Size::new(1, 1)).expect("session");

    assert!(session.get_size().is_err());
    assert!(session.set_size(Size::new(2, 2)).is_err());

    session.close().expect("session close");
    terminal.close().expect("terminal close");
}

// =============================================================================
// Misuse aborts
// =============================================================================

#[test]
#[should_panic(expected = "mock terminal already open")]
fn double_open_panics() {
    let mock = MockTerminal::new();
    let _first = open(&mock);
    let _second = (mock.opener())();
}

#[test]
#[should_panic(expected = "mock session already open")]
fn double_session_panics() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    let _first = terminal.session(Size::new(1, 1));
    let _second = terminal.session(Size::new(1, 1));
}

#[test]
#[should_panic(expected = "mock session still open")]
fn terminal_close_with_live_session_panics() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    let _session = terminal.session(Size::new(1, 1));
    let _ = terminal.close();
}

#[test]
#[should_panic(expected = "mock session not open")]
fn double_session_close_panics() {
    let mock = MockTerminal::new();
    let terminal = open(&mock);
    let session = terminal.session(Size::new(1, 1)).expect("session");
    session.close().expect("first close");
    let _ = session.close();
}
