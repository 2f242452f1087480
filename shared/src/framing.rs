//! Message framing: timestamp header and greeting payload
//!
//! Application packets start with `[TIMESTAMP][send time: u64][message id]`.
//! Transport notifications carry no header and start directly with their id.

use crate::error::NetError;
use crate::message::MessageId;
use crate::stream::BitStream;
use crate::Time;

/// Width of the greeting payload. Shorter text is NUL padded.
pub const TEST_MESSAGE_LEN: usize = 32;

/// Writes the timestamp identifier followed by the sender's clock.
pub fn write_timestamp(stream: &mut BitStream, now: Time) -> Result<(), NetError> {
    stream.write(&MessageId::TIMESTAMP)?;
    stream.write(&now)?;
    Ok(())
}

/// Reads the optional timestamp header and the message identifier after it.
///
/// Returns the one-way delay `now - sent` (zero when there is no header or the
/// sender's clock runs ahead of ours) and the real message identifier.
pub fn read_timestamp(stream: &mut BitStream, now: Time) -> Result<(Time, MessageId), NetError> {
    let first: MessageId = stream.read()?;
    if first != MessageId::TIMESTAMP {
        return Ok((0, first));
    }

    let sent: Time = stream.read()?;
    let id: MessageId = stream.read()?;
    Ok((now.saturating_sub(sent), id))
}

/// Writes a fixed-width greeting. Text past [`TEST_MESSAGE_LEN`] bytes is cut.
pub fn write_test(stream: &mut BitStream, message: &str) -> Result<(), NetError> {
    let mut buffer = [0u8; TEST_MESSAGE_LEN];
    let bytes = message.as_bytes();
    let len = bytes.len().min(TEST_MESSAGE_LEN);
    buffer[..len].copy_from_slice(&bytes[..len]);
    stream.write(&buffer)
}

pub fn read_test(stream: &mut BitStream) -> Result<String, NetError> {
    let buffer: [u8; TEST_MESSAGE_LEN] = stream.read()?;
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(TEST_MESSAGE_LEN);
    Ok(String::from_utf8_lossy(&buffer[..end]).into_owned())
}
