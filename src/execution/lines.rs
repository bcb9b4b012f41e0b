//! Live line stream over a running command's stdout.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

/// Lines decoded incrementally as stdout arrives.
///
/// Single-pass and not restartable. An incomplete trailing fragment is held
/// back until a newline arrives; when stdout closes, a non-empty remainder
/// is yielded as the final line. Lines are split on `\n` only, exactly like
/// [`Output::lines`](crate::output::Output::lines).
#[derive(Debug)]
pub struct LineStream {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    partial: Vec<u8>,
    ready: VecDeque<String>,
    finished: bool,
}

impl LineStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            rx,
            partial: Vec::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Next line, or `None` once stdout has closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.next().await
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]).into_owned();
            self.ready.push_back(text);
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            self.ready
                .push_back(String::from_utf8_lossy(&rest).into_owned());
        }
    }
}

impl Stream for LineStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Poll::Ready(Some(line));
            }
            if self.finished {
                return Poll::Ready(None);
            }
            match ready!(self.rx.poll_recv(cx)) {
                Some(chunk) => self.push_chunk(&chunk),
                None => self.finish(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(chunks: &[&[u8]]) -> LineStream {
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in chunks {
            tx.send(chunk.to_vec()).unwrap();
        }
        LineStream::new(rx)
    }

    #[tokio::test]
    async fn test_lines_across_chunks() {
        let lines: Vec<String> = stream_of(&[b"fir", b"st\nsec", b"ond\n"]).collect().await;
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_residual_fragment_is_last_line() {
        let lines: Vec<String> = stream_of(&[b"a\nb"]).collect().await;
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_lines_kept() {
        let lines: Vec<String> = stream_of(&[b"\n\nx\n"]).collect().await;
        assert_eq!(lines, vec!["", "", "x"]);
    }

    #[tokio::test]
    async fn test_multibyte_split_between_chunks() {
        let bytes = "héllo\n".as_bytes();
        let lines: Vec<String> = stream_of(&[&bytes[..2], &bytes[2..]]).collect().await;
        assert_eq!(lines, vec!["héllo"]);
    }

    #[test]
    fn test_pending_until_newline() {
        use tokio_test::{assert_pending, assert_ready_eq};

        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = tokio_test::task::spawn(LineStream::new(rx));
        assert_pending!(stream.poll_next());

        tx.send(b"partial".to_vec()).unwrap();
        assert_pending!(stream.poll_next());

        tx.send(b" line\n".to_vec()).unwrap();
        assert_ready_eq!(stream.poll_next(), Some("partial line".to_string()));

        drop(tx);
        assert_ready_eq!(stream.poll_next(), None);
    }

    #[tokio::test]
    async fn test_next_line_ends_with_none() {
        let mut stream = stream_of(&[b"only\n"]);
        assert_eq!(stream.next_line().await.as_deref(), Some("only"));
        assert_eq!(stream.next_line().await, None);
        assert_eq!(stream.next_line().await, None);
    }
}
