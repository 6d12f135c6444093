// src/output/line_buffer.rs

//! Pure line assembly for one output stream.
//!
//! Subprocess output arrives in arbitrarily sized chunks. `LineBuffer` keeps
//! the bytes that are not yet terminated by `\n` and hands back complete
//! lines. It performs no IO, so it can be exercised without Tokio.
//!
//! A line is only ever emitted whole, however long it gets: a source line is
//! never split into two sink lines.

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completes.
    ///
    /// Returned lines keep their trailing `\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos + 1);
            self.pending.extend_from_slice(head);
            lines.push(std::mem::take(&mut self.pending));
            rest = tail;
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    /// Take whatever is left after the stream closed.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_only_terminated_lines() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"hel").is_empty());
        assert_eq!(buf.push(b"lo\nwor"), vec![b"hello\n".to_vec()]);
        assert_eq!(buf.pending_len(), 3);
        assert_eq!(buf.push(b"ld\n"), vec![b"world\n".to_vec()]);
        assert_eq!(buf.take_remainder(), None);
    }

    #[test]
    fn one_chunk_with_many_lines() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"a\nb\n\nc");
        assert_eq!(lines, vec![b"a\n".to_vec(), b"b\n".to_vec(), b"\n".to_vec()]);
        assert_eq!(buf.take_remainder(), Some(b"c".to_vec()));
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn very_long_line_stays_whole() {
        let mut buf = LineBuffer::new();
        let long = vec![b'x'; 200 * 1024];

        for chunk in long.chunks(8 * 1024) {
            assert!(buf.push(chunk).is_empty());
        }
        let lines = buf.push(b"\n");

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), long.len() + 1);
    }
}
