// src/output/multiplexer.rs

//! Shared, line-atomic output sink.
//!
//! Every command stream writes through its own [`OutputChannel`]. Channels
//! assemble lines locally and only take the sink lock to write one complete
//! (optionally prefixed) line, so lines from different commands never
//! interleave.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::line_buffer::LineBuffer;

type Sink = Box<dyn Write + Send>;

/// Cloneable handle to the single output sink of a run.
#[derive(Clone)]
pub struct OutputMultiplexer {
    sink: Arc<Mutex<Sink>>,
}

impl OutputMultiplexer {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Multiplexer writing to the process's stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Create a channel for one stream of one command.
    ///
    /// A non-empty `name` prefixes every line with `"[name] "`.
    pub fn channel(&self, name: &str, silence: bool) -> OutputChannel {
        let prefix = if name.is_empty() {
            Vec::new()
        } else {
            format!("[{name}] ").into_bytes()
        };

        OutputChannel {
            mux: self.clone(),
            prefix,
            silence,
            buffer: LineBuffer::new(),
        }
    }

    /// Write one line as a single locked `write_all`.
    ///
    /// Prefixed lines always end in `\n`. Unprefixed bytes are written
    /// exactly as the command produced them.
    fn write_line(&self, prefix: &[u8], line: &[u8]) -> io::Result<()> {
        let mut record = Vec::with_capacity(prefix.len() + line.len() + 1);
        record.extend_from_slice(prefix);
        record.extend_from_slice(line);
        if !prefix.is_empty() && record.last() != Some(&b'\n') {
            record.push(b'\n');
        }

        let mut sink = self
            .sink
            .lock()
            .map_err(|_| io::Error::other("output sink mutex poisoned"))?;
        sink.write_all(&record)?;
        sink.flush()
    }
}

impl std::fmt::Debug for OutputMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputMultiplexer").finish_non_exhaustive()
    }
}

/// Per-stream view onto the multiplexer.
#[derive(Debug)]
pub struct OutputChannel {
    mux: OutputMultiplexer,
    prefix: Vec<u8>,
    silence: bool,
    buffer: LineBuffer,
}

impl OutputChannel {
    pub fn is_silenced(&self) -> bool {
        self.silence
    }

    /// Feed raw bytes; complete lines are written immediately.
    pub fn feed(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.silence {
            return Ok(());
        }
        for line in self.buffer.push(chunk) {
            self.mux.write_line(&self.prefix, &line)?;
        }
        Ok(())
    }

    /// Flush a trailing partial line once the stream has closed.
    ///
    /// A named channel terminates it with `\n`; an unnamed one leaves it as is.
    pub fn finish(&mut self) -> io::Result<()> {
        if let Some(rest) = self.buffer.take_remainder() {
            self.mux.write_line(&self.prefix, &rest)?;
        }
        Ok(())
    }
}

/// Copy `reader` into `channel` until EOF, then flush the remainder.
///
/// Returns the number of bytes drained. Silenced channels are drained too so
/// the child never blocks on a full pipe.
pub async fn forward_stream<R>(mut reader: R, mut channel: OutputChannel) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; 8 * 1024];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "output stream read failed; flushing what was received");
                channel.finish()?;
                return Err(e);
            }
        };
        total += n as u64;
        channel.feed(&chunk[..n])?;
    }

    channel.finish()?;
    debug!(bytes = total, silenced = channel.is_silenced(), "output stream closed");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn prefixes_named_channels_only() {
        let capture = Capture::default();
        let mux = OutputMultiplexer::new(capture.clone());

        let mut named = mux.channel("api", false);
        let mut bare = mux.channel("", false);
        named.feed(b"up\n").unwrap();
        bare.feed(b"raw\n").unwrap();

        assert_eq!(capture.text(), "[api] up\nraw\n");
    }

    #[test]
    fn partial_lines_wait_for_newline_or_finish() {
        let capture = Capture::default();
        let mux = OutputMultiplexer::new(capture.clone());
        let mut ch = mux.channel("a", false);

        ch.feed(b"no newline yet").unwrap();
        assert_eq!(capture.text(), "");

        ch.finish().unwrap();
        assert_eq!(capture.text(), "[a] no newline yet\n");
    }

    #[test]
    fn unnamed_channel_keeps_partial_line_bytes() {
        let capture = Capture::default();
        let mux = OutputMultiplexer::new(capture.clone());
        let mut ch = mux.channel("", false);

        ch.feed(b"Password: ").unwrap();
        ch.finish().unwrap();

        assert_eq!(capture.0.lock().unwrap().as_slice(), b"Password: ");
    }

    #[test]
    fn long_lines_are_written_whole() {
        let capture = Capture::default();
        let mux = OutputMultiplexer::new(capture.clone());
        let mut bare = mux.channel("", false);
        let mut named = mux.channel("a", false);

        let mut line = vec![b'z'; 100 * 1024];
        line.push(b'\n');
        for chunk in line.chunks(4096) {
            bare.feed(chunk).unwrap();
        }
        assert_eq!(capture.0.lock().unwrap().as_slice(), line.as_slice());

        capture.0.lock().unwrap().clear();
        for chunk in line.chunks(4096) {
            named.feed(chunk).unwrap();
        }
        let text = capture.text();
        assert_eq!(text.lines().count(), 1);
        assert_eq!(text.len(), "[a] ".len() + line.len());
    }

    #[test]
    fn silenced_channel_writes_nothing() {
        let capture = Capture::default();
        let mux = OutputMultiplexer::new(capture.clone());
        let mut ch = mux.channel("quiet", true);

        ch.feed(b"one\ntwo\nthree").unwrap();
        ch.finish().unwrap();

        assert_eq!(capture.text(), "");
    }

    #[tokio::test]
    async fn forward_stream_drains_reader() {
        let capture = Capture::default();
        let mux = OutputMultiplexer::new(capture.clone());
        let input: &[u8] = b"first\nsecond";

        let n = forward_stream(input, mux.channel("s", false)).await.unwrap();

        assert_eq!(n, 12);
        assert_eq!(capture.text(), "[s] first\n[s] second\n");
    }
}
