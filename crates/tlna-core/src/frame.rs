//! Frame codec
//!
//! Turns logical [`Command`]s into wire frames and validates response frames
//! before their payload is trusted. See [`crate::protocol`] for the layout.

use crate::error::{Error, Result};
use crate::protocol::*;

/// Serial number as reported by the instrument
pub type SerialNumber = heapless::String<SERIAL_LEN>;

/// 16-bit wrapping sum of `bytes`
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Size on the wire of a frame carrying `payload_len` bytes
pub const fn frame_len(payload_len: usize) -> usize {
    payload_len + FRAME_OVERHEAD
}

/// Allocate a zeroed buffer for a frame with `payload_len` payload bytes
pub fn alloc_frame(payload_len: usize) -> Result<Vec<u8>> {
    let len = frame_len(payload_len);
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::SpiAlloc)?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Encode `payload` into `out`, replacing its contents
pub fn encode_into(payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::SpiBuffer);
    }

    out.clear();
    out.try_reserve_exact(frame_len(payload.len()))
        .map_err(|_| Error::SpiAlloc)?;

    out.extend_from_slice(&SYNC_MARKER);
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    let sum = checksum(out);
    out.extend_from_slice(&sum.to_le_bytes());
    Ok(())
}

/// Encode `payload` into a new frame
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(payload, &mut out)?;
    Ok(out)
}

/// Validate a complete frame and return its payload
///
/// Checks run in wire order: sync marker, checksum, then the length field.
/// The length field is covered by the checksum, so a corrupted length
/// surfaces as a checksum fault.
pub fn decode(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < FRAME_OVERHEAD {
        return Err(Error::SpiBuffer);
    }

    if frame[..2] != SYNC_MARKER {
        return Err(Error::Unsynced {
            found: [frame[0], frame[1]],
        });
    }

    let body_end = frame.len() - CHECKSUM_LEN;
    let expected = u16::from_le_bytes([frame[body_end], frame[body_end + 1]]);
    let actual = checksum(&frame[..body_end]);
    if expected != actual {
        return Err(Error::Checksum { expected, actual });
    }

    let declared = u16::from_le_bytes([frame[2], frame[3]]) as usize;
    if declared != body_end - HEADER_LEN {
        log::debug!(
            "frame declares {} payload bytes but carries {}",
            declared,
            body_end - HEADER_LEN
        );
        return Err(Error::SpiBuffer);
    }

    Ok(&frame[HEADER_LEN..body_end])
}

/// Host to device command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Query serial number
    GetSerial,
    /// Select input termination (deprecated)
    SetTermination(Termination),
    /// Arm an acquisition
    StartAcquisition(SignalSource),
    /// Fetch the next segment of the armed acquisition
    ReadSegment,
    /// Retransmit the previous response
    Resend,
}

impl Command {
    /// Opcode byte
    pub fn opcode(&self) -> u8 {
        match self {
            Command::GetSerial => CMD_GET_SERIAL,
            Command::SetTermination(_) => CMD_SET_TERMINATION,
            Command::StartAcquisition(_) => CMD_START_ACQUISITION,
            Command::ReadSegment => CMD_READ_SEGMENT,
            Command::Resend => CMD_RESEND,
        }
    }

    /// Request payload (opcode plus arguments)
    pub fn payload(&self) -> heapless::Vec<u8, 2> {
        core::iter::once(self.opcode()).chain(self.argument()).collect()
    }

    /// Argument byte following the opcode, if the command takes one
    pub fn argument(&self) -> Option<u8> {
        match self {
            Command::SetTermination(term) => Some(term.to_byte()),
            Command::StartAcquisition(source) => Some(source.to_byte()),
            _ => None,
        }
    }

    /// Encode as a request frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(&self.payload())
    }

    /// Parse a request payload (device side)
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match payload {
            [CMD_GET_SERIAL] => Some(Command::GetSerial),
            [CMD_SET_TERMINATION, term] => Termination::ALL
                .get(*term as usize)
                .copied()
                .map(Command::SetTermination),
            [CMD_START_ACQUISITION, source] => {
                SignalSource::from_byte(*source).map(Command::StartAcquisition)
            }
            [CMD_READ_SEGMENT] => Some(Command::ReadSegment),
            [CMD_RESEND] => Some(Command::Resend),
            _ => None,
        }
    }

    /// Payload length of this command's response
    ///
    /// `Resend` repeats whatever came before, so it has no length of its own.
    pub fn response_len(&self) -> Option<usize> {
        let data = match self {
            Command::GetSerial => SERIAL_LEN,
            Command::SetTermination(_) | Command::StartAcquisition(_) => 0,
            Command::ReadSegment => SEGMENT_SAMPLES * 4,
            Command::Resend => return None,
        };
        Some(RESPONSE_PREFIX_LEN + data)
    }

    /// Fault reported when the device NAKs this command
    pub fn rejection(&self) -> Error {
        match self {
            Command::GetSerial => Error::GetSerialNumber,
            Command::SetTermination(_) => Error::SetTermination,
            Command::StartAcquisition(_) | Command::ReadSegment => Error::Read,
            Command::Resend => Error::SpiRead,
        }
    }

    /// Validate a decoded response payload and return the data after the
    /// opcode/status prefix
    pub fn check_response<'a>(&self, payload: &'a [u8]) -> Result<&'a [u8]> {
        let Some(expected_len) = self.response_len() else {
            return Err(Error::SpiBuffer);
        };
        if payload.len() != expected_len {
            return Err(Error::SpiBuffer);
        }

        // An echo for a different command means we are reading someone
        // else's response: the stream has drifted.
        if payload[0] != self.opcode() {
            return Err(Error::Unsynced {
                found: [payload[0], payload[1]],
            });
        }

        match payload[1] {
            STATUS_ACK => Ok(&payload[RESPONSE_PREFIX_LEN..]),
            STATUS_NAK => {
                log::debug!("device NAKed command 0x{:02X}", self.opcode());
                Err(self.rejection())
            }
            other => {
                log::debug!(
                    "invalid status 0x{:02X} for command 0x{:02X}",
                    other,
                    self.opcode()
                );
                Err(Error::SpiRead)
            }
        }
    }
}

/// Build a response payload (device side)
pub fn response_payload(cmd: &Command, ack: bool, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(RESPONSE_PREFIX_LEN + data.len());
    payload.push(cmd.opcode());
    payload.push(if ack { STATUS_ACK } else { STATUS_NAK });
    payload.extend_from_slice(data);
    payload
}

/// Decode a NUL padded serial number field
pub fn decode_serial(data: &[u8]) -> Result<SerialNumber> {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let raw = &data[..end];

    if raw.is_empty() || !raw.iter().all(|b| b.is_ascii_graphic()) {
        return Err(Error::GetSerialNumber);
    }

    let text = core::str::from_utf8(raw).map_err(|_| Error::GetSerialNumber)?;
    SerialNumber::try_from(text).map_err(|_| Error::GetSerialNumber)
}

/// Encode a serial number into its fixed-width field (device side)
pub fn encode_serial(serial: &str) -> [u8; SERIAL_LEN] {
    let mut field = [0u8; SERIAL_LEN];
    let len = serial.len().min(SERIAL_LEN);
    field[..len].copy_from_slice(&serial.as_bytes()[..len]);
    field
}

/// Append little-endian `f32` samples from a segment payload
pub fn decode_samples(data: &[u8], out: &mut Vec<f32>) -> Result<()> {
    if data.len() % 4 != 0 {
        return Err(Error::SpiBuffer);
    }
    out.extend(
        data.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
    );
    Ok(())
}

/// Encode samples as little-endian `f32` (device side)
pub fn encode_samples(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = encode(&[0x11]).unwrap();
        assert_eq!(frame.len(), frame_len(1));
        assert_eq!(&frame[..2], &SYNC_MARKER);
        assert_eq!(&frame[2..4], &[1, 0]);
        assert_eq!(frame[4], 0x11);
        // 0xA5 + 0x5A + 0x01 + 0x00 + 0x11
        assert_eq!(&frame[5..], &0x0111u16.to_le_bytes());
    }

    #[test]
    fn test_round_trip() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let frame = encode(&payload).unwrap();
        assert_eq!(decode(&frame).unwrap(), payload.as_slice());

        let reencoded = encode(decode(&frame).unwrap()).unwrap();
        assert_eq!(reencoded, frame);
    }

    #[test]
    fn test_empty_payload() {
        let frame = encode(&[]).unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD);
        assert!(decode(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_single_byte_corruption_detected() {
        let payload: Vec<u8> = (0..64u8).collect();
        let frame = encode(&payload).unwrap();

        for idx in 0..frame.len() {
            for flip in [0x01u8, 0x80, 0xFF] {
                let mut bad = frame.clone();
                bad[idx] ^= flip;
                match decode(&bad) {
                    Err(Error::Unsynced { .. }) => assert!(idx < 2),
                    Err(Error::Checksum { .. }) => assert!(idx >= 2),
                    other => panic!("corruption at {} accepted: {:?}", idx, other),
                }
            }
        }
    }

    #[test]
    fn test_unsynced_reports_found_bytes() {
        let mut frame = encode(&[1, 2, 3]).unwrap();
        frame.insert(0, 0x00);
        frame.pop();
        assert_eq!(
            decode(&frame),
            Err(Error::Unsynced {
                found: [0x00, 0xA5]
            })
        );
    }

    #[test]
    fn test_short_frame() {
        assert_eq!(decode(&[0xA5, 0x5A, 0x00]), Err(Error::SpiBuffer));
    }

    #[test]
    fn test_length_field_mismatch() {
        // Valid checksum but the length field lies
        let mut frame = vec![0xA5, 0x5A, 0x05, 0x00, 0x01, 0x02];
        let sum = checksum(&frame);
        frame.extend_from_slice(&sum.to_le_bytes());
        assert_eq!(decode(&frame), Err(Error::SpiBuffer));
    }

    #[test]
    fn test_command_payloads() {
        assert_eq!(Command::GetSerial.payload().as_slice(), &[CMD_GET_SERIAL]);
        assert_eq!(Command::ReadSegment.argument(), None);
        assert_eq!(
            Command::SetTermination(Termination::R5K).payload().as_slice(),
            &[CMD_SET_TERMINATION, 2]
        );
        assert_eq!(
            Command::StartAcquisition(SignalSource::TestSignal)
                .payload()
                .as_slice(),
            &[CMD_START_ACQUISITION, 0x01]
        );
        for cmd in [
            Command::GetSerial,
            Command::SetTermination(Termination::R50),
            Command::StartAcquisition(SignalSource::Input),
            Command::ReadSegment,
            Command::Resend,
        ] {
            assert_eq!(Command::from_payload(&cmd.payload()), Some(cmd));
        }
        assert_eq!(Command::from_payload(&[CMD_SET_TERMINATION, 9]), None);
        assert_eq!(Command::from_payload(&[0x7F]), None);
    }

    #[test]
    fn test_check_response() {
        let cmd = Command::StartAcquisition(SignalSource::Input);
        let ack = response_payload(&cmd, true, &[]);
        assert!(cmd.check_response(&ack).unwrap().is_empty());

        let nak = response_payload(&cmd, false, &[]);
        assert_eq!(cmd.check_response(&nak), Err(Error::Read));

        let other = response_payload(&Command::GetSerial, true, &[]);
        assert!(matches!(
            cmd.check_response(&other),
            Err(Error::Unsynced { .. })
        ));

        let serial = response_payload(&Command::GetSerial, false, &[0; SERIAL_LEN]);
        assert_eq!(
            Command::GetSerial.check_response(&serial),
            Err(Error::GetSerialNumber)
        );
    }

    #[test]
    fn test_serial_field() {
        let field = encode_serial("NA0123456");
        assert_eq!(decode_serial(&field).unwrap().as_str(), "NA0123456");

        let full = encode_serial("ABCDEFGHIJKLMNOPQRS");
        assert_eq!(decode_serial(&full).unwrap().as_str(), "ABCDEFGHIJKLMNOP");

        assert_eq!(decode_serial(&[0; SERIAL_LEN]), Err(Error::GetSerialNumber));
        assert_eq!(decode_serial(b"AB\x01C"), Err(Error::GetSerialNumber));
    }

    #[test]
    fn test_samples() {
        let samples = [0.0f32, -1.5, 3.25, f32::MAX];
        let bytes = encode_samples(&samples);
        let mut out = Vec::new();
        decode_samples(&bytes, &mut out).unwrap();
        assert_eq!(out, samples);

        assert_eq!(decode_samples(&[0; 5], &mut out), Err(Error::SpiBuffer));
    }
}
