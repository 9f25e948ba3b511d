use crate::{Result, TsError};
use bytes::Bytes;

/// PAT PID (always 0x0000)
pub const PID_PAT: u16 = 0x0000;

/// Transport Stream packet structure
#[derive(Debug, Clone)]
pub struct TsPacket {
    /// Sync byte (should always be 0x47)
    pub sync_byte: u8,
    /// Transport Error Indicator
    pub transport_error_indicator: bool,
    /// Payload Unit Start Indicator
    pub payload_unit_start_indicator: bool,
    /// Transport Priority
    pub transport_priority: bool,
    /// Packet Identifier
    pub pid: u16,
    /// Transport Scrambling Control
    pub transport_scrambling_control: u8,
    /// Adaptation Field Control
    pub adaptation_field_control: u8,
    /// Continuity Counter
    pub continuity_counter: u8,
    /// Adaptation field data (if present)
    pub adaptation_field: Option<Bytes>,
    /// Payload data (if present)
    pub payload: Option<Bytes>,
}

impl TsPacket {
    /// Parse a TS packet from 188 bytes
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() != 188 {
            return Err(TsError::InvalidPacketSize(data.len()));
        }

        let sync_byte = data[0];
        if sync_byte != 0x47 {
            return Err(TsError::InvalidSyncByte(sync_byte));
        }

        let byte1 = data[1];
        let byte2 = data[2];
        let byte3 = data[3];

        let transport_error_indicator = (byte1 & 0x80) != 0;
        let payload_unit_start_indicator = (byte1 & 0x40) != 0;
        let transport_priority = (byte1 & 0x20) != 0;
        let pid = ((byte1 as u16 & 0x1F) << 8) | byte2 as u16;

        let transport_scrambling_control = (byte3 >> 6) & 0x03;
        let adaptation_field_control = (byte3 >> 4) & 0x03;
        let continuity_counter = byte3 & 0x0F;

        let mut offset = 4;
        let mut adaptation_field = None;
        let mut payload = None;

        // Parse adaptation field if present
        if adaptation_field_control == 0x02 || adaptation_field_control == 0x03 {
            if offset >= data.len() {
                return Err(TsError::InsufficientData {
                    expected: offset + 1,
                    actual: data.len(),
                });
            }

            let adaptation_field_length = data[offset] as usize;
            offset += 1;

            if adaptation_field_length > 0 {
                if offset + adaptation_field_length > data.len() {
                    return Err(TsError::InsufficientData {
                        expected: offset + adaptation_field_length,
                        actual: data.len(),
                    });
                }

                adaptation_field = Some(data.slice(offset..offset + adaptation_field_length));
                offset += adaptation_field_length;
            }
        }

        // Parse payload if present
        if (adaptation_field_control == 0x01 || adaptation_field_control == 0x03)
            && offset < data.len()
        {
            payload = Some(data.slice(offset..));
        }

        Ok(TsPacket {
            sync_byte,
            transport_error_indicator,
            payload_unit_start_indicator,
            transport_priority,
            pid,
            transport_scrambling_control,
            adaptation_field_control,
            continuity_counter,
            adaptation_field,
            payload,
        })
    }

    /// Check if this packet has a payload
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control == 0x01 || self.adaptation_field_control == 0x03
    }

    /// Check if this packet has an adaptation field
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control == 0x02 || self.adaptation_field_control == 0x03
    }

    /// Parse the adaptation field into a structured type.
    pub fn parse_adaptation_field(&self) -> Option<crate::adaptation_field::AdaptationField> {
        self.adaptation_field
            .as_ref()
            .and_then(|af| crate::adaptation_field::AdaptationField::parse(af))
    }
}
