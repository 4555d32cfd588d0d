//! Standalone frame transport over any async byte stream.
//!
//! A frame is a 4-byte big-endian length followed by exactly that many
//! bytes. [`FrameCodec`](super::codec::FrameCodec) applies the same rules to
//! a `Framed` connection; these functions are for callers that drive a raw
//! stream themselves, such as [`TestClient`](crate::testing::TestClient).

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{BrokerError, Result};

/// Size of the frame length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Fill `buf` from `reader`, stopping early only at end of stream.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read one frame payload.
///
/// Returns `Ok(None)` if the stream ends cleanly before a new frame starts.
///
/// # Errors
///
/// - [`BrokerError::TruncatedFrame`] if the stream ends inside a frame
/// - [`BrokerError::FrameTooLarge`] if the declared length exceeds `max_frame_size`
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    match read_full(reader, &mut prefix).await? {
        0 => return Ok(None),
        LENGTH_PREFIX_LEN => {}
        received => {
            return Err(BrokerError::TruncatedFrame {
                expected: LENGTH_PREFIX_LEN,
                received,
            })
        }
    }

    let length = u32::from_be_bytes(prefix) as usize;
    if length > max_frame_size {
        return Err(BrokerError::FrameTooLarge {
            size: length,
            max: max_frame_size,
        });
    }

    let mut payload = BytesMut::zeroed(length);
    let received = read_full(reader, &mut payload).await?;
    if received < length {
        return Err(BrokerError::TruncatedFrame {
            expected: length,
            received,
        });
    }

    Ok(Some(payload.freeze()))
}

/// Write one frame: the payload length, then the payload.
///
/// # Errors
///
/// Returns [`BrokerError::WriteFailure`] if the stream rejects the write.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let length = u32::try_from(payload.len()).map_err(|_| BrokerError::FrameTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    writer
        .write_all(&length.to_be_bytes())
        .await
        .map_err(BrokerError::WriteFailure)?;
    writer
        .write_all(payload)
        .await
        .map_err(BrokerError::WriteFailure)?;
    writer.flush().await.map_err(BrokerError::WriteFailure)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    const MAX: usize = 1024;

    #[tokio::test]
    async fn test_read_frame() {
        let data: &[u8] = &[0, 0, 0, 3, 7, 8, 9, 0xFF];
        let mut reader = data;
        let frame = read_frame(&mut reader, MAX).await.unwrap().unwrap();
        assert_eq!(&frame[..], &[7, 8, 9]);
        // Trailing byte belongs to the next frame
        assert_eq!(reader, &[0xFF]);
    }

    #[tokio::test]
    async fn test_read_frame_clean_eof() {
        let mut reader: &[u8] = &[];
        assert!(read_frame(&mut reader, MAX).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_truncated_prefix() {
        let mut reader: &[u8] = &[0, 0];
        let err = read_frame(&mut reader, MAX).await.unwrap_err();
        assert!(matches!(
            err,
            BrokerError::TruncatedFrame {
                expected: 4,
                received: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_read_frame_truncated_body() {
        let mut reader: &[u8] = &[0, 0, 0, 10, 1, 2, 3];
        let err = read_frame(&mut reader, MAX).await.unwrap_err();
        assert!(matches!(
            err,
            BrokerError::TruncatedFrame {
                expected: 10,
                received: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_read_frame_too_large() {
        let mut reader: &[u8] = &[0, 0, 0x10, 0];
        let err = read_frame(&mut reader, MAX).await.unwrap_err();
        assert!(matches!(err, BrokerError::FrameTooLarge { size: 4096, .. }));
    }

    #[tokio::test]
    async fn test_read_frame_across_partial_reads() {
        let (mut client, mut server) = tokio::io::duplex(8);
        let writer = tokio::spawn(async move {
            write_frame(&mut client, &[5u8; 20]).await.unwrap();
        });
        let frame = read_frame(&mut server, MAX).await.unwrap().unwrap();
        assert_eq!(frame.len(), 20);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_write_frame_prefix_matches_payload() {
        let mut out = Vec::new();
        write_frame(&mut out, b"hello").await.unwrap();
        assert_eq!(out, [0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_frame_failure() {
        let err = write_frame(&mut BrokenPipe, b"x").await.unwrap_err();
        assert!(matches!(err, BrokerError::WriteFailure(_)));
    }
}
