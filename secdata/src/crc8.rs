//! CRC-8 for the secure data records.
//!
//! Polynomial x^8 + x^2 + x + 1 (0x07), initial value 0, MSB first, no
//! reflection and no final XOR.

/// CRC-8 generator polynomial
pub const CRC8_POLY: u8 = 0x07;

const CRC8_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u8;
        let mut j = 0;
        while j < 8 {
            if c & 0x80 != 0 {
                c = (c << 1) ^ CRC8_POLY;
            } else {
                c <<= 1;
            }
            j += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
};

/// Calculate CRC-8 over `data`
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_check_value() {
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn test_crc8_matches_bitwise() {
        fn bitwise(data: &[u8]) -> u8 {
            let mut crc: u16 = 0;
            for &byte in data {
                crc ^= (byte as u16) << 8;
                for _ in 0..8 {
                    if crc & 0x8000 != 0 {
                        crc ^= 0x1070 << 3;
                    }
                    crc <<= 1;
                }
            }
            (crc >> 8) as u8
        }

        let data = [0x02, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(crc8(&data), bitwise(&data));
        assert_eq!(crc8(&[0xFF; 7]), bitwise(&[0xFF; 7]));
    }
}
