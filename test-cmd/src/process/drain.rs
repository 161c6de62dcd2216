//! Concurrent draining of a child's output streams.
//!
//! Each stream gets its own reader task which forwards raw chunks over a
//! shared channel. A single aggregator appends every chunk to the buffer of
//! the stream it came from, so each buffer has exactly one writer and keeps
//! the child's write order. Reading both streams at once means a child that
//! fills one pipe while we are blocked on the other can never stall us.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Size of a single read from a stream.
const READ_CHUNK: usize = 8 * 1024;

/// One of the two captured output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A chunk of bytes read from one stream.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub stream: Stream,
    pub bytes: Vec<u8>,
}

/// Everything the child wrote to stdout and stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Captured {
    /// Buffer for the given stream.
    pub fn get(&self, stream: Stream) -> &[u8] {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    fn append(&mut self, chunk: StreamChunk) {
        match chunk.stream {
            Stream::Stdout => self.stdout.extend_from_slice(&chunk.bytes),
            Stream::Stderr => self.stderr.extend_from_slice(&chunk.bytes),
        }
    }
}

/// Drains any number of attached readers into a [`Captured`].
///
/// Readers start as soon as they are attached, so attach them right after
/// the child is spawned and before waiting on it.
pub struct StreamMultiplexer {
    tx: mpsc::Sender<StreamChunk>,
    rx: mpsc::Receiver<StreamChunk>,
    readers: Vec<JoinHandle<()>>,
}

impl StreamMultiplexer {
    /// Create a multiplexer whose channel holds up to `buffer_size` chunks.
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        Self {
            tx,
            rx,
            readers: Vec::new(),
        }
    }

    /// Spawn a reader task forwarding everything from `reader` as `stream`.
    pub fn attach<R>(&mut self, stream: Stream, reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let tx = self.tx.clone();
        self.readers.push(tokio::spawn(read_stream(stream, reader, tx)));
    }

    /// Collect chunks until every attached reader has reached end-of-file.
    ///
    /// `seed` is the starting content of the buffers; chunks are appended
    /// after it.
    pub async fn drain(self, seed: Captured) -> Captured {
        let Self {
            tx,
            mut rx,
            readers,
        } = self;

        // Drop our own sender so the channel closes when the readers finish
        drop(tx);

        let mut captured = seed;
        while let Some(chunk) = rx.recv().await {
            captured.append(chunk);
        }

        for reader in readers {
            if let Err(e) = reader.await {
                warn!(error = %e, "stream reader task did not finish cleanly");
            }
        }

        debug!(
            stdout_bytes = captured.stdout.len(),
            stderr_bytes = captured.stderr.len(),
            "output streams drained"
        );

        captured
    }
}

async fn read_stream<R>(stream: Stream, mut reader: R, tx: mpsc::Sender<StreamChunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = StreamChunk {
                    stream,
                    bytes: buf[..n].to_vec(),
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(?stream, error = %e, "error reading output stream");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn test_drain_two_streams() {
        let mut mux = StreamMultiplexer::new(4);
        mux.attach(Stream::Stdout, &b"hello\n"[..]);
        mux.attach(Stream::Stderr, &b"oops\n"[..]);

        let captured = mux.drain(Captured::default()).await;
        assert_eq!(captured.stdout, b"hello\n");
        assert_eq!(captured.stderr, b"oops\n");
    }

    #[tokio::test]
    async fn test_drain_appends_after_seed() {
        let mut mux = StreamMultiplexer::new(4);
        mux.attach(Stream::Stderr, &b"second\n"[..]);

        let seed = Captured {
            stdout: Vec::new(),
            stderr: b"first\n".to_vec(),
        };
        let captured = mux.drain(seed).await;
        assert_eq!(captured.stderr, b"first\nsecond\n");
        assert!(captured.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_drain_keeps_write_order_across_chunks() {
        let (mut writer, reader) = tokio::io::duplex(16);
        let mut mux = StreamMultiplexer::new(1);
        mux.attach(Stream::Stdout, reader);

        let writer_task = tokio::spawn(async move {
            for i in 0..100 {
                writer.write_all(format!("{i:03}\n").as_bytes()).await.unwrap();
                if i % 10 == 0 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        });

        let captured = mux.drain(Captured::default()).await;
        writer_task.await.unwrap();

        let expected: String = (0..100).map(|i| format!("{i:03}\n")).collect();
        assert_eq!(captured.stdout, expected.as_bytes());
    }

    #[tokio::test]
    async fn test_drain_with_no_readers() {
        let mux = StreamMultiplexer::new(8);
        let captured = mux.drain(Captured::default()).await;
        assert_eq!(captured, Captured::default());
    }

    #[test]
    fn test_captured_get() {
        let captured = Captured {
            stdout: b"out".to_vec(),
            stderr: b"err".to_vec(),
        };
        assert_eq!(captured.get(Stream::Stdout), b"out");
        assert_eq!(captured.get(Stream::Stderr), b"err");
    }
}
