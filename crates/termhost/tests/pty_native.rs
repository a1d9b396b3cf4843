// Test module - relaxed lint rules
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]
#![cfg(unix)]

//! Native PTY integration: a real child process on a real terminal pair.

use std::sync::Arc;
use std::time::{Duration, Instant};

use termhost::pty::{self, Cmd, Size};
use termhost::term::{Term, TermConfig};
use termhost::vterm::Pos;
use termhost::Error;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn native_child_output_reaches_the_master() {
    let terminal = pty::open().expect("open native pty");
    let session = terminal.session(Size::new(24, 80)).expect("session");
    session
        .start_process(&Cmd {
            path: "/bin/echo".to_string(),
            args: vec!["hello".to_string()],
        })
        .expect("start /bin/echo");

    let mut collected = Vec::new();
    let deadline = Instant::now() + WAIT;
    let mut buf = [0u8; 256];
    while !collected.windows(5).any(|w| w == b"hello") {
        assert!(Instant::now() < deadline, "timed out waiting for output");
        match terminal.read(&mut buf) {
            Ok(n) => collected.extend_from_slice(&buf[..n]),
            Err(err) => panic!("unexpected read error: {err}"),
        }
    }

    session.close().expect("session close");
    terminal.close().expect("terminal close");
}

#[test]
fn native_session_resize_round_trips() {
    let terminal = pty::open().expect("open native pty");
    let session = terminal.session(Size::new(10, 20)).expect("session");

    assert_eq!(session.get_size().expect("get size"), Size::new(10, 20));
    session.set_size(Size::new(12, 34)).expect("set size");
    assert_eq!(session.get_size().expect("get size"), Size::new(12, 34));

    assert!(matches!(
        session.set_size(Size::new(0, 10)),
        Err(Error::InvalidSize { .. })
    ));

    session.close().expect("session close");
    terminal.close().expect("terminal close");
}

#[test]
fn term_shows_native_child_output_on_screen() {
    let config = TermConfig {
        open: Arc::new(pty::open),
        size: Size::new(5, 40),
        cmd: Cmd {
            path: "/bin/echo".to_string(),
            args: vec!["hello".to_string()],
        },
    };
    let term = Term::new(config).expect("term should start");

    let deadline = Instant::now() + WAIT;
    loop {
        let shot = term.capture();
        let line: String = (0..5)
            .map(|col| {
                shot.at(Pos::new(0, col))
                    .runes
                    .first()
                    .copied()
                    .unwrap_or(' ')
            })
            .collect();
        if line == "hello" {
            break;
        }
        assert!(Instant::now() < deadline, "timed out waiting for screen");
        std::thread::sleep(Duration::from_millis(10));
    }

    term.close();
}
