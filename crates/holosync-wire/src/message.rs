//! Incoming component messages

use holosync_core::{HoloError, HoloResult};

use crate::{ChangeFlags, MessageCommand, MessageHeader, MessageReader, HEADER_SIZE, MIN_DELTA_SIZE};

/// A parsed message borrowing its body from the receive buffer
#[derive(Clone, Copy, Debug)]
pub struct ComponentMessage<'a> {
    pub header: MessageHeader,
    body: &'a [u8],
}

impl<'a> ComponentMessage<'a> {
    /// Parse the header and keep the body for the owning service
    pub fn parse(buf: &'a [u8]) -> HoloResult<Self> {
        let header = MessageHeader::parse(buf)?;
        let body = &buf[HEADER_SIZE..];

        if header.command == MessageCommand::ComponentDelta && buf.len() < MIN_DELTA_SIZE {
            return Err(HoloError::InvalidWireFormat(
                "delta message without change flags".into(),
            ));
        }

        Ok(ComponentMessage { header, body })
    }

    /// Everything after the header
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// Split a delta body into its flags and a reader positioned at the
    /// first field
    pub fn delta<F: ChangeFlags>(&self) -> HoloResult<(F, MessageReader<'a>)> {
        if self.header.command != MessageCommand::ComponentDelta {
            return Err(HoloError::InvalidWireFormat(format!(
                "expected delta, got {:?}",
                self.header.command
            )));
        }

        let mut reader = MessageReader::new(self.body);
        let flags = reader.read_flags::<F>()?;
        Ok((flags, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{change_flags, MessageWriter};
    use holosync_core::{ComponentId, ServiceId};

    change_flags! {
        struct OneFlag {
            const ON = 0b0000_0001;
        }
    }

    #[test]
    fn test_delta_body() {
        let header = MessageHeader::delta(ServiceId::new(*b"TEST"), ComponentId::new(1));
        let mut writer = MessageWriter::new(&header);
        writer.put_flags(OneFlag::ON);
        writer.put_bool(false);
        let bytes = writer.freeze();

        let message = ComponentMessage::parse(&bytes).unwrap();
        assert_eq!(message.header, header);

        let (flags, mut reader) = message.delta::<OneFlag>().unwrap();
        assert_eq!(flags, OneFlag::ON);
        assert!(!reader.read_bool().unwrap());
    }

    #[test]
    fn test_delta_without_flags_rejected() {
        let header = MessageHeader::delta(ServiceId::new(*b"TEST"), ComponentId::new(1));
        let bytes = header.to_bytes();
        let result = ComponentMessage::parse(&bytes);
        assert!(matches!(result, Err(HoloError::InvalidWireFormat(_))));
    }

    #[test]
    fn test_removed_has_no_delta() {
        let header = MessageHeader::removed(ServiceId::new(*b"TEST"), ComponentId::new(1));
        let bytes = header.to_bytes();
        let message = ComponentMessage::parse(&bytes).unwrap();

        assert!(message.body().is_empty());
        assert!(message.delta::<OneFlag>().is_err());
    }
}
