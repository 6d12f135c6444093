// tests/line_assembly_property.rs

use proptest::prelude::*;
use muxterm::output::{LineBuffer, OutputMultiplexer};
use muxterm_test_utils::SharedBuffer;

// Byte streams biased towards newlines so lines are short and frequent.
fn stream_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![3 => any::<u8>(), 1 => Just(b'\n')],
        0..400,
    )
}

/// Feed `input` split at `cuts`, returning emitted lines plus the remainder.
fn assemble(buf: &mut LineBuffer, input: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (input.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut out = Vec::new();
    let mut start = 0;
    for p in points.into_iter().chain(std::iter::once(input.len())) {
        if p < start {
            continue;
        }
        out.extend(buf.push(&input[start..p]));
        start = p;
    }
    out.extend(buf.take_remainder());
    out
}

proptest! {
    #[test]
    fn chunking_does_not_change_lines(
        input in stream_strategy(),
        cuts in proptest::collection::vec(any::<usize>(), 0..20),
    ) {
        let whole = assemble(&mut LineBuffer::new(), &input, &[]);
        let split = assemble(&mut LineBuffer::new(), &input, &cuts);

        prop_assert_eq!(&whole, &split);
        prop_assert_eq!(split.concat(), input.clone());

        // Every piece but the last ends at a newline and contains no other.
        for (i, line) in split.iter().enumerate() {
            let inner_newlines = line.iter().filter(|&&b| b == b'\n').count();
            if i + 1 < split.len() {
                prop_assert_eq!(line.last(), Some(&b'\n'));
            }
            prop_assert!(inner_newlines <= 1);
        }
    }

    #[test]
    fn unnamed_channel_reproduces_input_exactly(
        input in stream_strategy(),
        chunk in 1usize..64,
    ) {
        let sink = SharedBuffer::new();
        let mux = OutputMultiplexer::new(sink.clone());
        let mut channel = mux.channel("", false);

        for piece in input.chunks(chunk) {
            channel.feed(piece)?;
        }
        channel.finish()?;

        prop_assert_eq!(sink.contents(), input);
    }

    #[test]
    fn named_channel_prefixes_each_source_line_once(
        input in stream_strategy(),
        chunk in 1usize..64,
    ) {
        let sink = SharedBuffer::new();
        let mux = OutputMultiplexer::new(sink.clone());
        let mut channel = mux.channel("n", false);

        for piece in input.chunks(chunk) {
            channel.feed(piece)?;
        }
        channel.finish()?;

        let mut expected = Vec::new();
        for line in input.split_inclusive(|&b| b == b'\n') {
            expected.extend_from_slice(b"[n] ");
            expected.extend_from_slice(line);
            if line.last() != Some(&b'\n') {
                expected.push(b'\n');
            }
        }
        prop_assert_eq!(sink.contents(), expected);
    }
}
