//! Message framing over the reliable control stream.
//!
//! There is no length prefix: a reader pulls the 2-byte header, then the
//! fixed prefix of that request code, then whatever variable part the prefix
//! announces. Unknown request codes cannot be framed and are reported as
//! `InvalidData`, since the stream can no longer be resynchronised.

use crate::protocol::{Message, MessageHeader, HEADER_SIZE};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads one complete frame, blocking until every byte has arrived.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; HEADER_SIZE];
    reader.read_exact(&mut buf).await?;

    let code = MessageHeader::from_bytes(&buf)
        .and_then(|header| header.request_code())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown request code in header {buf:02x?}"),
            )
        })?;

    let prefix_len = code.prefix_len();
    buf.resize(prefix_len, 0);
    reader.read_exact(&mut buf[HEADER_SIZE..]).await?;

    let frame_len = code.frame_len(&buf).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "truncated message prefix")
    })?;
    buf.resize(frame_len, 0);
    reader.read_exact(&mut buf[prefix_len..]).await?;

    Ok(buf)
}

/// Reads one frame and decodes it. A well-framed but invalid message yields
/// `Ok(None)` so the caller can drop it and keep reading.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let frame = read_frame(reader).await?;
    let message = Message::decode(&frame);
    if message.is_none() {
        log::debug!("Dropping malformed {} byte frame", frame.len());
    }
    Ok(message)
}

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Encodes and writes a message. Encoding failures surface as `InvalidInput`
/// and nothing is written.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = message
        .encode()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    write_frame(writer, &frame).await
}
