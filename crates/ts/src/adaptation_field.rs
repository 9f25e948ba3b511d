/// Program Clock Reference (PCR) - 33-bit base @ 90kHz + 9-bit extension @ 27MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcr {
    /// 33-bit base value at 90 kHz
    pub base: u64,
    /// 9-bit extension value at 27 MHz
    pub extension: u16,
}

impl Pcr {
    /// Parse PCR from exactly 6 bytes.
    ///
    /// Layout: `[base32..25][base24..17][base16..9][base8..1][base0 | reserved(6) | ext_high][ext_low]`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 6 {
            return None;
        }
        let base = ((data[0] as u64) << 25)
            | ((data[1] as u64) << 17)
            | ((data[2] as u64) << 9)
            | ((data[3] as u64) << 1)
            | ((data[4] as u64) >> 7);
        let extension = (((data[4] & 0x01) as u16) << 8) | data[5] as u16;
        Some(Pcr { base, extension })
    }

    /// Full PCR value at 27 MHz resolution.
    pub fn as_27mhz(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }

    /// PCR as seconds (floating point).
    pub fn as_seconds(&self) -> f64 {
        self.as_27mhz() as f64 / 27_000_000.0
    }
}

/// Owned adaptation field with all parsed fields.
#[derive(Debug, Clone)]
pub struct AdaptationField {
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    pub elementary_stream_priority_indicator: bool,
    pub pcr: Option<Pcr>,
    pub opcr: Option<Pcr>,
    pub splice_countdown: Option<i8>,
    pub transport_private_data: Option<Vec<u8>>,
}

impl AdaptationField {
    /// Parse an adaptation field from its data bytes (after the length byte).
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let flags = data[0];
        let discontinuity_indicator = (flags & 0x80) != 0;
        let random_access_indicator = (flags & 0x40) != 0;
        let elementary_stream_priority_indicator = (flags & 0x20) != 0;
        let pcr_flag = (flags & 0x10) != 0;
        let opcr_flag = (flags & 0x08) != 0;
        let splicing_point_flag = (flags & 0x04) != 0;
        let transport_private_data_flag = (flags & 0x02) != 0;

        let mut offset = 1;

        let pcr = if pcr_flag && offset + 6 <= data.len() {
            let pcr = Pcr::parse(&data[offset..]);
            offset += 6;
            pcr
        } else {
            if pcr_flag {
                offset += 6;
            }
            None
        };

        let opcr = if opcr_flag && offset + 6 <= data.len() {
            let opcr = Pcr::parse(&data[offset..]);
            offset += 6;
            opcr
        } else {
            if opcr_flag {
                offset += 6;
            }
            None
        };

        let splice_countdown = if splicing_point_flag && offset < data.len() {
            let val = data[offset] as i8;
            offset += 1;
            Some(val)
        } else {
            if splicing_point_flag {
                offset += 1;
            }
            None
        };

        let transport_private_data = if transport_private_data_flag && offset < data.len() {
            let length = data[offset] as usize;
            offset += 1;
            if offset + length <= data.len() {
                let private_data = data[offset..offset + length].to_vec();
                Some(private_data)
            } else {
                None
            }
        } else {
            None
        };

        Some(AdaptationField {
            discontinuity_indicator,
            random_access_indicator,
            elementary_stream_priority_indicator,
            pcr,
            opcr,
            splice_countdown,
            transport_private_data,
        })
    }
}
