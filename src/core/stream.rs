//! Stream readers for a child's redirected stdout/stderr.
//!
//! Each stream gets its own reader thread that blocks on `read`, decodes the
//! bytes as UTF-8 and forwards text to the session channel. Stdout text is
//! grouped into lines before it is sent; stderr text goes out as soon as it
//! is read.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::process::ProcessEvent;

/// Size of a single read from a child stream
pub const CHUNK_SIZE: usize = 1024;

/// Which standard stream a reader is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    fn thread_name(self) -> &'static str {
        match self {
            StreamSource::Stdout => "consolectl-stdout",
            StreamSource::Stderr => "consolectl-stderr",
        }
    }
}

/// Incremental UTF-8 decoder.
///
/// Keeps the tail of a multi-byte sequence that was split across two reads
/// and prepends it to the next chunk.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, holding back an incomplete trailing sequence
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + bad..];
                        }
                        None => {
                            // Incomplete sequence at the end, wait for more bytes
                            rest = &rest[valid..];
                            break;
                        }
                    }
                }
            }
        }

        let remaining = rest.to_vec();
        self.pending = remaining;
        out
    }

    /// Flush whatever is left once the stream is closed
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

/// Groups stdout chunks into complete lines.
///
/// A chunk is appended to the buffer; when the chunk itself ends with a
/// newline the whole buffer is released as one message.
#[derive(Debug, Default)]
pub struct LineCoalescer {
    buffer: String,
}

impl LineCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Option<String> {
        self.buffer.push_str(chunk);
        if chunk.ends_with('\n') {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Release a dangling partial line
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Shared switch that stops readers from delivering events.
///
/// Checking the flag and sending happen under one lock, so once `cancel`
/// returns no reader event can land behind anything sent afterwards.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    gate: Arc<Mutex<()>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let _gate = self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Send an event unless cancelled
    fn deliver(&self, tx: &Sender<ProcessEvent>, event: ProcessEvent) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_cancelled() {
            return false;
        }
        tx.send(event).is_ok()
    }
}

/// Pump a stream until EOF, a read fault, or cancellation.
///
/// Runs on the calling thread; `spawn_reader` wraps it in a named thread.
pub fn pump_stream<R: Read>(
    mut reader: R,
    source: StreamSource,
    tx: &Sender<ProcessEvent>,
    cancel: &CancelToken,
) {
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut decoder = Utf8Decoder::new();
    let mut lines = LineCoalescer::new();

    let emit = |text: String, lines: &mut LineCoalescer| -> bool {
        if text.is_empty() {
            return true;
        }
        match source {
            StreamSource::Stdout => match lines.push(&text) {
                Some(line) => cancel.deliver(tx, ProcessEvent::Output(line)),
                None => true,
            },
            StreamSource::Stderr => cancel.deliver(tx, ProcessEvent::Error(text)),
        }
    };

    loop {
        if cancel.is_cancelled() {
            debug!(?source, "reader cancelled");
            return;
        }

        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(&buffer[..n]);
                if !emit(text, &mut lines) {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(?source, error = %e, "read from child stream failed, closing stream");
                break;
            }
        }
    }

    // EOF: release anything still buffered
    let tail = decoder.finish();
    if !emit(tail, &mut lines) {
        return;
    }
    if let Some(rest) = lines.flush() {
        cancel.deliver(tx, ProcessEvent::Output(rest));
    }
    debug!(?source, "stream closed");
}

/// Spawn a named reader thread for one stream
pub fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    source: StreamSource,
    tx: Sender<ProcessEvent>,
    cancel: CancelToken,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(source.thread_name().to_string())
        .spawn(move || pump_stream(reader, source, &tx, &cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;

    /// Reader that hands out its data in fixed pieces
    struct Chunked {
        pieces: Vec<Vec<u8>>,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pieces.is_empty() {
                return Ok(0);
            }
            let piece = self.pieces.remove(0);
            buf[..piece.len()].copy_from_slice(&piece);
            Ok(piece.len())
        }
    }

    fn collect(reader: impl Read, source: StreamSource) -> Vec<ProcessEvent> {
        let (tx, rx) = mpsc::channel();
        pump_stream(reader, source, &tx, &CancelToken::new());
        drop(tx);
        rx.into_iter().collect()
    }

    #[test]
    fn test_decoder_split_sequence() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8Decoder::new();
        // 'é' is two bytes, split it
        let first = decoder.decode(&bytes[..2]);
        let second = decoder.decode(&bytes[2..]);
        assert_eq!(first, "h");
        assert_eq!(second, "éllo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_invalid_byte() {
        let mut decoder = Utf8Decoder::new();
        let out = decoder.decode(&[b'a', 0xFF, b'b']);
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn test_coalescer_waits_for_newline() {
        let mut lines = LineCoalescer::new();
        assert_eq!(lines.push("hel"), None);
        assert_eq!(lines.push("lo\n"), Some("hello\n".to_string()));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_coalescer_only_checks_chunk_end() {
        let mut lines = LineCoalescer::new();
        // A newline in the middle of a chunk does not release the buffer
        assert_eq!(lines.push("one\ntw"), None);
        assert_eq!(lines.push("o\n"), Some("one\ntwo\n".to_string()));
    }

    #[test]
    fn test_stdout_is_grouped_into_lines() {
        let reader = Chunked {
            pieces: vec![b"abc".to_vec(), b"def\n".to_vec(), b"tail".to_vec()],
        };
        let events = collect(reader, StreamSource::Stdout);
        assert_eq!(
            events,
            vec![
                ProcessEvent::Output("abcdef\n".to_string()),
                ProcessEvent::Output("tail".to_string()),
            ]
        );
    }

    #[test]
    fn test_stderr_is_forwarded_per_chunk() {
        let reader = Chunked {
            pieces: vec![b"bad ".to_vec(), b"thing".to_vec()],
        };
        let events = collect(reader, StreamSource::Stderr);
        assert_eq!(
            events,
            vec![
                ProcessEvent::Error("bad ".to_string()),
                ProcessEvent::Error("thing".to_string()),
            ]
        );
    }

    #[test]
    fn test_cancelled_reader_sends_nothing() {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        cancel.cancel();
        pump_stream(Cursor::new(b"hello\n".to_vec()), StreamSource::Stdout, &tx, &cancel);
        drop(tx);
        assert_eq!(rx.into_iter().count(), 0);
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let reader_side = cancel.clone();
        assert!(reader_side.deliver(&tx, ProcessEvent::Error("before".to_string())));

        cancel.cancel();
        assert!(!reader_side.deliver(&tx, ProcessEvent::Error("after".to_string())));
        drop(tx);
        assert_eq!(
            rx.into_iter().collect::<Vec<_>>(),
            vec![ProcessEvent::Error("before".to_string())]
        );
    }
}
