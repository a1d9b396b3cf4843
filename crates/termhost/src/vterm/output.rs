//! Emulator output stream.
//!
//! Bytes the emulator wants to send to its peer (query responses, keyboard
//! encodings) accumulate in a producer/consumer FIFO. Producers never block;
//! the consumer blocks until bytes arrive or the stream is closed. After
//! close, further writes are discarded and the reader drains what remains
//! before reporting end of stream.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::{Arc, Condvar, Mutex};

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
}

/// The shared FIFO between the emulator (producer) and the output pump
/// (consumer).
#[derive(Default)]
pub(crate) struct OutputPipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl OutputPipe {
    /// Queue bytes for the reader. Never blocks; dropped after close.
    pub(crate) fn write(&self, bytes: &[u8]) {
        let mut state = lock_unpoisoned(&self.state);
        if state.closed {
            return;
        }
        state.buf.extend(bytes);
        self.ready.notify_all();
    }

    /// Signal end of stream to the reader.
    pub(crate) fn close(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.closed = true;
        self.ready.notify_all();
    }

    fn read_blocking(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }

        let mut state = lock_unpoisoned(&self.state);
        loop {
            if !state.buf.is_empty() {
                let n = buf.len().min(state.buf.len());
                for slot in buf.iter_mut().take(n) {
                    // Guarded by the length check above.
                    if let Some(byte) = state.buf.pop_front() {
                        *slot = byte;
                    }
                }
                return n;
            }
            if state.closed {
                return 0;
            }
            state = match self.ready.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

fn lock_unpoisoned(mutex: &Mutex<PipeState>) -> std::sync::MutexGuard<'_, PipeState> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Blocking reader over the emulator's output stream.
///
/// `read` returns `Ok(0)` only once the stream is closed and drained.
pub struct OutputReader {
    pipe: Arc<OutputPipe>,
}

impl OutputReader {
    pub(crate) fn new(pipe: Arc<OutputPipe>) -> Self {
        Self { pipe }
    }
}

impl Read for OutputReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.pipe.read_blocking(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn preserves_write_order() {
        let pipe = Arc::new(OutputPipe::default());
        pipe.write(b"ab");
        pipe.write(b"cd");
        pipe.close();

        let mut reader = OutputReader::new(pipe);
        let mut got = Vec::new();
        reader.read_to_end(&mut got).ok();
        assert_eq!(got, b"abcd");
    }

    #[test]
    fn writes_after_close_are_dropped() {
        let pipe = Arc::new(OutputPipe::default());
        pipe.close();
        pipe.write(b"a");

        let mut reader = OutputReader::new(Arc::clone(&pipe));
        let mut buf = [0u8; 1];
        let n = reader.read(&mut buf).ok();
        assert_eq!(n, Some(0));
    }

    #[test]
    fn close_unblocks_pending_reader() {
        let pipe = Arc::new(OutputPipe::default());
        let mut reader = OutputReader::new(Arc::clone(&pipe));

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            reader.read(&mut buf).ok()
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        pipe.close();

        assert_eq!(handle.join().ok().flatten(), Some(0));
    }
}
