//! Message header shared by all component services
//!
//! Header is 9 bytes:
//! - Byte 0: Command
//! - Bytes 1-4: Service tag (ASCII)
//! - Bytes 5-8: Component ID (LE)

use holosync_core::{ComponentId, HoloError, HoloResult, ServiceId};

/// Header size in bytes
pub const HEADER_SIZE: usize = 9;

/// What the message asks the remote service to do
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageCommand {
    /// Change-flag byte followed by field values
    ComponentDelta = 0x01,
    /// The component no longer exists on the host; no body
    ComponentRemoved = 0x02,
}

impl MessageCommand {
    /// Parse from wire byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MessageCommand::ComponentDelta),
            0x02 => Some(MessageCommand::ComponentRemoved),
            _ => None,
        }
    }

    /// Convert to wire byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Message header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub command: MessageCommand,
    pub service: ServiceId,
    pub component: ComponentId,
}

impl MessageHeader {
    pub fn new(command: MessageCommand, service: ServiceId, component: ComponentId) -> Self {
        MessageHeader {
            command,
            service,
            component,
        }
    }

    /// Header for a delta (or complete) state message
    pub fn delta(service: ServiceId, component: ComponentId) -> Self {
        Self::new(MessageCommand::ComponentDelta, service, component)
    }

    /// Header announcing that a component went away
    pub fn removed(service: ServiceId, component: ComponentId) -> Self {
        Self::new(MessageCommand::ComponentRemoved, service, component)
    }

    /// Parse header from bytes
    pub fn parse(buf: &[u8]) -> HoloResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(HoloError::BufferTooShort {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let command = MessageCommand::from_byte(buf[0]).ok_or(HoloError::UnknownCommand(buf[0]))?;
        let service = ServiceId::from_bytes([buf[1], buf[2], buf[3], buf[4]]);
        let component = ComponentId::from_bytes([buf[5], buf[6], buf[7], buf[8]]);

        Ok(MessageHeader {
            command,
            service,
            component,
        })
    }

    /// Wire form of the header
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.command.to_byte();
        buf[1..5].copy_from_slice(&self.service.to_bytes());
        buf[5..9].copy_from_slice(&self.component.to_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = MessageHeader::delta(ServiceId::new(*b"MASK"), ComponentId::new(7));
        let bytes = header.to_bytes();

        assert_eq!(bytes, [0x01, b'M', b'A', b'S', b'K', 7, 0, 0, 0]);
        assert_eq!(MessageHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_too_short() {
        let result = MessageHeader::parse(&[0x01, b'M', b'A']);
        assert!(matches!(result, Err(HoloError::BufferTooShort { expected: 9, actual: 3 })));
    }

    #[test]
    fn test_unknown_command() {
        let mut bytes = MessageHeader::delta(ServiceId::new(*b"MASK"), ComponentId::ZERO).to_bytes();
        bytes[0] = 0x7F;
        assert!(matches!(MessageHeader::parse(&bytes), Err(HoloError::UnknownCommand(0x7F))));
    }
}
