//! Dedicated writer task for the socket's write half.
//!
//! Every frame leaving a connection goes through one task that owns the
//! write half and receives frames via an mpsc channel. Requests and
//! keepalive pings never interleave mid-frame, and frames queued together
//! are written with a single vectored write.
//!
//! ```text
//! send() caller 1 ─┐
//! send() caller N ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► TLS stream
//! keepalive loop ──┘
//! ```

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{BlazeError, Result};
use crate::protocol::{Header, HEADER_SIZE, PING_FRAME};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded 16-byte header.
    pub header: [u8; HEADER_SIZE],
    /// Encoded struct payload (empty for pings).
    pub payload: Bytes,
}

impl OutboundFrame {
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// The fixed keepalive frame.
    #[inline]
    pub fn ping() -> Self {
        Self {
            header: PING_FRAME,
            payload: Bytes::new(),
        }
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable; the task stops once every handle is dropped.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame, waiting for channel space.
    ///
    /// Fails with `ConnectionClosed` once the writer task has stopped.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| BlazeError::ConnectionClosed)
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The `JoinHandle` resolves when the channel closes or a write fails.
pub fn spawn_writer_task<W>(
    writer: W,
    channel_capacity: usize,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(channel_capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            None => {
                let _ = writer.shutdown().await;
                return Ok(());
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Write failed, stopping writer: {}", e);
            return Err(e);
        }
    }
}

/// Write a batch of frames using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(BlazeError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after a partial write.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        let parts: [&[u8]; 2] = [&frame.header, &frame.payload];
        for part in parts {
            let end = offset + part.len();
            if !part.is_empty() && skip_bytes < end {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start..]));
            }
            offset = end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameType;
    use std::io::Cursor;
    use tokio::io::{duplex, AsyncReadExt};

    fn result_header(id: u32, len: u64) -> Header {
        Header::new(FrameType::Result, 4, 0x19, id, len)
    }

    #[test]
    fn test_outbound_frame_sizes() {
        let frame = OutboundFrame::new(&result_header(42, 5), Bytes::from_static(b"hello"));
        assert_eq!(frame.size(), HEADER_SIZE + 5);

        let ping = OutboundFrame::ping();
        assert_eq!(ping.header, PING_FRAME);
        assert_eq!(ping.size(), HEADER_SIZE);
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, 16);

        handle
            .send(OutboundFrame::new(&result_header(42, 5), Bytes::from_static(b"hello")))
            .await
            .unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(Header::decode(&buf).unwrap().id, 42);
        assert_eq!(&buf[HEADER_SIZE..], b"hello");
    }

    #[tokio::test]
    async fn test_frames_written_in_order() {
        let (client, mut server) = duplex(64 * 1024);
        let (handle, _task) = spawn_writer_task(client, 16);

        for i in 0..10u32 {
            let payload = Bytes::copy_from_slice(&i.to_be_bytes());
            handle
                .send(OutboundFrame::new(&result_header(i, 4), payload))
                .await
                .unwrap();
        }

        let mut buf = vec![0u8; 10 * (HEADER_SIZE + 4)];
        server.read_exact(&mut buf).await.unwrap();
        for (i, chunk) in buf.chunks(HEADER_SIZE + 4).enumerate() {
            assert_eq!(Header::decode(chunk).unwrap().id, i as u32);
            assert_eq!(&chunk[HEADER_SIZE..], &(i as u32).to_be_bytes());
        }
    }

    #[test]
    fn test_build_remaining_slices_partial_header() {
        let batch = vec![OutboundFrame::new(
            &result_header(42, 5),
            Bytes::from_static(b"hello"),
        )];

        let slices = build_remaining_slices(&batch, 5);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), HEADER_SIZE - 5);
        assert_eq!(slices[1].len(), 5);
    }

    #[test]
    fn test_build_remaining_slices_skips_empty_payloads() {
        let batch = vec![
            OutboundFrame::ping(),
            OutboundFrame::new(&result_header(1, 3), Bytes::from_static(b"abc")),
        ];

        assert_eq!(build_remaining_slices(&batch, 0).len(), 3);

        let slices = build_remaining_slices(&batch, HEADER_SIZE + 2);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), HEADER_SIZE - 2);
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5)
            .map(|i| OutboundFrame::new(&result_header(i, 3), Bytes::from_static(b"abc")))
            .collect();

        write_batch(&mut buf, &batch).await.unwrap();
        assert_eq!(buf.into_inner().len(), 5 * (HEADER_SIZE + 3));
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, 16);

        drop(handle);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_send_after_writer_stopped() {
        let (client, server) = duplex(64);
        drop(server);
        let (handle, task) = spawn_writer_task(client, 16);

        // First write hits the closed pipe and stops the task
        let _ = handle.send(OutboundFrame::ping()).await;
        assert!(task.await.unwrap().is_err());
        assert!(handle.is_closed());
        assert!(matches!(
            handle.send(OutboundFrame::ping()).await,
            Err(BlazeError::ConnectionClosed)
        ));
    }
}
