//! The `com.apple.NuFX` extended attribute: NuFX fields with no host
//! counterpart, carried beside an extracted file. Attach it with
//! [`HostAttributes::with_nufx`](super::HostAttributes::with_nufx) and
//! [`Archive::add_item`](crate::archive::Archive::add_item) restores them.
//!
//! Fixed 64-byte little-endian layout:
//!
//! | offset | size | field                              |
//! |--------|------|------------------------------------|
//! | 0      | 2    | file_sys_id                        |
//! | 2      | 2    | file_sys_info (low byte separator) |
//! | 4      | 4    | access                             |
//! | 8      | 2    | storage_type                       |
//! | 10     | 8    | archive_when                       |
//! | 18     | 2    | option list size (full, untruncated) |
//! | 20     | 44   | leading option list bytes          |

use byteorder::{ByteOrder, LittleEndian};

use super::datetime::{NuDateTime, DATE_TIME_SIZE};
use super::ValidationError;
use crate::record::ArchiveRecord;

pub const XATTR_NUFX_NAME:   &str  = "com.apple.NuFX";
pub const XATTR_NUFX_LENGTH: usize = 64;

const OPTION_OFFSET:   usize = 20;
const OPTION_CAPACITY: usize = XATTR_NUFX_LENGTH - OPTION_OFFSET;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NufxXattr {
    pub file_sys_id:   u16,
    pub file_sys_info: u16,
    pub access:        u32,
    pub storage_type:  u16,
    pub archive_when:  NuDateTime,
    /// Size of the record's whole option list.
    pub option_size:   u16,
    /// At most 44 leading bytes of the option list.
    pub option_bytes:  Vec<u8>,
}

impl NufxXattr {
    pub fn from_record(record: &ArchiveRecord) -> Self {
        let kept = record.option_list.len().min(OPTION_CAPACITY);
        Self {
            file_sys_id:   record.file_sys_id.as_u16(),
            file_sys_info: (record.file_sys_info & 0xFF00) | record.separator as u16,
            access:        record.access,
            storage_type:  record.storage_type,
            archive_when:  record.archive_when,
            option_size:   u16::try_from(record.option_list.len()).unwrap_or(u16::MAX),
            option_bytes:  record.option_list[..kept].to_vec(),
        }
    }

    pub fn to_bytes(&self) -> [u8; XATTR_NUFX_LENGTH] {
        let mut buf = [0u8; XATTR_NUFX_LENGTH];
        LittleEndian::write_u16(&mut buf[0..2], self.file_sys_id);
        LittleEndian::write_u16(&mut buf[2..4], self.file_sys_info);
        LittleEndian::write_u32(&mut buf[4..8], self.access);
        LittleEndian::write_u16(&mut buf[8..10], self.storage_type);
        let when = &self.archive_when;
        buf[10..10 + DATE_TIME_SIZE].copy_from_slice(&[
            when.second, when.minute, when.hour, when.year,
            when.day, when.month, when.filler, when.week_day,
        ]);
        LittleEndian::write_u16(&mut buf[18..20], self.option_size);
        let kept = self.option_bytes.len().min(OPTION_CAPACITY);
        buf[OPTION_OFFSET..OPTION_OFFSET + kept].copy_from_slice(&self.option_bytes[..kept]);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, ValidationError> {
        if buf.len() != XATTR_NUFX_LENGTH {
            return Err(ValidationError::BadExtendedAttributes(buf.len()));
        }
        let option_size = LittleEndian::read_u16(&buf[18..20]);
        let kept = (option_size as usize).min(OPTION_CAPACITY);
        let d = &buf[10..10 + DATE_TIME_SIZE];
        Ok(Self {
            file_sys_id:   LittleEndian::read_u16(&buf[0..2]),
            file_sys_info: LittleEndian::read_u16(&buf[2..4]),
            access:        LittleEndian::read_u32(&buf[4..8]),
            storage_type:  LittleEndian::read_u16(&buf[8..10]),
            archive_when:  NuDateTime {
                second: d[0], minute: d[1], hour: d[2], year: d[3],
                day: d[4], month: d[5], filler: d[6], week_day: d[7],
            },
            option_size,
            option_bytes:  buf[OPTION_OFFSET..OPTION_OFFSET + kept].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::FileSysId;

    #[test]
    fn layout_matches_documented_offsets() {
        let record = ArchiveRecord {
            file_sys_id:  FileSysId::ProDos,
            separator:    b':',
            access:       0xE3,
            storage_type: 2,
            option_list:  vec![0xAA; 50],
            ..ArchiveRecord::default()
        };
        let blob = NufxXattr::from_record(&record).to_bytes();
        assert_eq!(&blob[0..2], &[1, 0]);
        assert_eq!(&blob[2..4], &[b':', 0]);
        assert_eq!(&blob[4..8], &[0xE3, 0, 0, 0]);
        assert_eq!(&blob[8..10], &[2, 0]);
        assert_eq!(&blob[18..20], &[50, 0]);
        assert!(blob[20..].iter().all(|&b| b == 0xAA));

        let back = NufxXattr::from_bytes(&blob).unwrap();
        assert_eq!(back.option_size, 50);
        assert_eq!(back.option_bytes.len(), 44);
        assert_eq!(back.access, 0xE3);
    }

    #[test]
    fn keeps_high_byte_of_file_sys_info() {
        let record = ArchiveRecord {
            file_sys_info: 0x7F00,
            separator:     b'/',
            ..ArchiveRecord::default()
        };
        let blob = NufxXattr::from_record(&record).to_bytes();
        assert_eq!(&blob[2..4], &[b'/', 0x7F]);
        assert_eq!(NufxXattr::from_bytes(&blob).unwrap().file_sys_info, 0x7F2F);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            NufxXattr::from_bytes(&[0u8; 10]),
            Err(ValidationError::BadExtendedAttributes(10))
        );
    }
}
