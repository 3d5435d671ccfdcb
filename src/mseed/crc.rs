//! CRC-32C (Castagnoli) for miniSEED v3 record integrity.
//!
//! The CRC field (bytes 28-31) is treated as zero while computing.

const CRC_FIELD: std::ops::Range<usize> = 28..32;

const CRC32C_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0x82F6_3B78;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

fn update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32C_TABLE[index];
    }
    crc
}

/// CRC-32C over `data`.
pub fn crc32c(data: &[u8]) -> u32 {
    update(0xFFFF_FFFF, data) ^ 0xFFFF_FFFF
}

/// CRC-32C of a v3 record with its CRC field taken as zero.
///
/// Returns `None` when the record is shorter than the fixed CRC field.
pub fn record_crc(record: &[u8]) -> Option<u32> {
    if record.len() < CRC_FIELD.end {
        return None;
    }
    let crc = update(0xFFFF_FFFF, &record[..CRC_FIELD.start]);
    let crc = update(crc, &[0; 4]);
    Some(update(crc, &record[CRC_FIELD.end..]) ^ 0xFFFF_FFFF)
}

/// Compute the CRC of a v3 record and store it (little-endian).
pub fn write_record_crc(record: &mut [u8]) -> Option<u32> {
    let crc = record_crc(record)?;
    record[CRC_FIELD].copy_from_slice(&crc.to_le_bytes());
    Some(crc)
}

/// (stored, computed) CRC pair of a v3 record.
pub fn stored_and_computed(record: &[u8]) -> Option<(u32, u32)> {
    let computed = record_crc(record)?;
    let stored = u32::from_le_bytes([record[28], record[29], record[30], record[31]]);
    Some((stored, computed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32c_empty() {
        assert_eq!(crc32c(&[]), 0x0000_0000);
    }

    #[test]
    fn test_crc32c_known_value() {
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn test_write_and_verify_record_crc() {
        let mut record = vec![0u8; 64];
        record[0] = b'M';
        record[1] = b'S';
        record[2] = 3;

        let crc = write_record_crc(&mut record).unwrap();
        let (stored, computed) = stored_and_computed(&record).unwrap();
        assert_eq!(stored, crc);
        assert_eq!(computed, crc);

        record[10] ^= 0xFF;
        let (stored, computed) = stored_and_computed(&record).unwrap();
        assert_ne!(stored, computed);
    }

    #[test]
    fn test_crc_field_ignored() {
        let mut a = vec![7u8; 48];
        let mut b = a.clone();
        a[28..32].copy_from_slice(&[1, 2, 3, 4]);
        b[28..32].copy_from_slice(&[9, 9, 9, 9]);
        assert_eq!(record_crc(&a), record_crc(&b));
    }

    #[test]
    fn test_short_record() {
        assert_eq!(record_crc(&[0; 16]), None);
    }
}
