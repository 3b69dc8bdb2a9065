//! Field codec for component messages
//!
//! All multi-byte values are little-endian. Booleans are a single byte
//! (0 or 1). Vectors are `x, y, z` as `f32`; quaternions are `x, y, z, w`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use holosync_core::{HoloError, HoloResult, Quaternion, Vector3};

use crate::{ChangeFlags, MessageHeader, HEADER_SIZE};

/// Initial capacity for a component message buffer
pub const DEFAULT_MESSAGE_CAPACITY: usize = 64;

/// Builds one outgoing message
pub struct MessageWriter {
    buf: BytesMut,
}

impl MessageWriter {
    /// Start a message with its header already written
    pub fn new(header: &MessageHeader) -> Self {
        let mut buf = BytesMut::with_capacity(DEFAULT_MESSAGE_CAPACITY);
        buf.put_slice(&header.to_bytes());
        MessageWriter { buf }
    }

    pub fn put_flags<F: ChangeFlags>(&mut self, flags: F) {
        self.buf.put_u8(flags.bits());
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn put_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    pub fn put_vector3(&mut self, value: Vector3) {
        self.buf.put_f32_le(value.x);
        self.buf.put_f32_le(value.y);
        self.buf.put_f32_le(value.z);
    }

    pub fn put_quaternion(&mut self, value: Quaternion) {
        self.buf.put_f32_le(value.x);
        self.buf.put_f32_le(value.y);
        self.buf.put_f32_le(value.z);
        self.buf.put_f32_le(value.w);
    }

    /// Bytes written so far, header included
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish the message
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads fields from the body of an incoming message
pub struct MessageReader<'a> {
    buf: &'a [u8],
}

impl<'a> MessageReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        MessageReader { buf }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> HoloResult<()> {
        if self.buf.remaining() < needed {
            return Err(HoloError::BufferTooShort {
                expected: needed,
                actual: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_flags<F: ChangeFlags>(&mut self) -> HoloResult<F> {
        self.ensure(1)?;
        Ok(F::from_bits_truncate(self.buf.get_u8()))
    }

    pub fn read_u8(&mut self) -> HoloResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> HoloResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(HoloError::InvalidWireFormat(format!(
                "invalid bool byte {:#04x}",
                other
            ))),
        }
    }

    pub fn read_f32(&mut self) -> HoloResult<f32> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn read_vector3(&mut self) -> HoloResult<Vector3> {
        self.ensure(12)?;
        Ok(Vector3 {
            x: self.buf.get_f32_le(),
            y: self.buf.get_f32_le(),
            z: self.buf.get_f32_le(),
        })
    }

    pub fn read_quaternion(&mut self) -> HoloResult<Quaternion> {
        self.ensure(16)?;
        Ok(Quaternion {
            x: self.buf.get_f32_le(),
            y: self.buf.get_f32_le(),
            z: self.buf.get_f32_le(),
            w: self.buf.get_f32_le(),
        })
    }
}

/// Size of a delta message that carries only the flag byte
pub const MIN_DELTA_SIZE: usize = HEADER_SIZE + 1;

#[cfg(test)]
mod tests {
    use super::*;
    use holosync_core::{ComponentId, ServiceId};

    fn header() -> MessageHeader {
        MessageHeader::delta(ServiceId::new(*b"TEST"), ComponentId::new(3))
    }

    #[test]
    fn test_writer_starts_with_header() {
        let writer = MessageWriter::new(&header());
        assert_eq!(writer.len(), HEADER_SIZE);
        assert_eq!(&writer.freeze()[..], &header().to_bytes());
    }

    #[test]
    fn test_field_layout() {
        let mut writer = MessageWriter::new(&header());
        writer.put_bool(true);
        writer.put_f32(1.0);
        let bytes = writer.freeze();

        assert_eq!(&bytes[HEADER_SIZE..], &[1, 0x00, 0x00, 0x80, 0x3F]);
    }

    #[test]
    fn test_reader_pose_fields() {
        let mut writer = MessageWriter::new(&header());
        writer.put_vector3(Vector3::new(1.0, -2.0, 3.5));
        writer.put_quaternion(Quaternion::IDENTITY);
        let bytes = writer.freeze();

        let mut reader = MessageReader::new(&bytes[HEADER_SIZE..]);
        assert_eq!(reader.read_vector3().unwrap(), Vector3::new(1.0, -2.0, 3.5));
        assert_eq!(reader.read_quaternion().unwrap(), Quaternion::IDENTITY);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_short_buffer() {
        let mut reader = MessageReader::new(&[0u8; 8]);
        assert!(matches!(
            reader.read_vector3(),
            Err(HoloError::BufferTooShort { expected: 12, actual: 8 })
        ));
    }

    #[test]
    fn test_reader_rejects_bad_bool() {
        let mut reader = MessageReader::new(&[2]);
        assert!(matches!(reader.read_bool(), Err(HoloError::InvalidWireFormat(_))));
    }
}
