//! Frame-level I/O over an ordered byte stream (§6 "ordered, message-oriented
//! bidirectional stream"). Every frame is a one-byte kind tag, a little-endian u32
//! length, then the payload: kind 0 carries a JSON `ClientEnvelope`/`ServerEnvelope`,
//! kind 1 carries a binary `rkyv`-framed [`keepwatch::Packet`]. TCP already gives us
//! ordering and delivery, so this layer only has to delimit messages.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use keepwatch::MAX_PACKET_SIZE;

const TAG_ENVELOPE: u8 = 0;
const TAG_PACKET: u8 = 1;

/// A cap well above [`MAX_PACKET_SIZE`] (the binary hot-path budget) since JSON
/// envelopes — batches especially — run larger; still bounded so a corrupt length
/// prefix can't make us allocate unboundedly.
const MAX_FRAME_LEN: u32 = 64 * 1024;

#[derive(Debug)]
pub enum Frame {
    Envelope(Vec<u8>),
    Packet(Vec<u8>),
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Frame>> {
    let mut tag = [0u8; 1];
    if reader.read_exact(&mut tag).await.is_err() {
        return Ok(None);
    }

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds cap {MAX_FRAME_LEN}"),
        ));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;

    match tag[0] {
        TAG_ENVELOPE => Ok(Some(Frame::Envelope(payload))),
        TAG_PACKET => Ok(Some(Frame::Packet(payload))),
        other => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unknown frame tag {other}"),
        )),
    }
}

pub fn encode_envelope_frame(bytes: &[u8]) -> Vec<u8> {
    encode(TAG_ENVELOPE, bytes)
}

pub fn encode_packet_frame(bytes: &[u8]) -> Vec<u8> {
    encode(TAG_PACKET, bytes)
}

fn encode(tag: u8, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + bytes.len());
    out.push(tag);
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    out
}

pub async fn write_bytes<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn envelope_frame_roundtrips() {
        let payload = b"{\"kind\":\"leave\"}".to_vec();
        let framed = encode_envelope_frame(&payload);

        let mut cursor = std::io::Cursor::new(framed);
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        match frame {
            Frame::Envelope(bytes) => assert_eq!(bytes, payload),
            Frame::Packet(_) => panic!("expected envelope frame"),
        }
    }

    #[tokio::test]
    async fn eof_before_any_frame_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_length_rejected() {
        let mut buf = vec![TAG_PACKET];
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_le_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        assert!(read_frame(&mut cursor).await.is_err());
    }
}
