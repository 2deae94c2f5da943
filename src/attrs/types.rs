//! Filesystem identifiers and type-code tables.

use serde::Serialize;
use std::fmt;

// ── Filesystem identifiers ────────────────────────────────────────────────────

/// The `file_sys_id` stored in every record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum FileSysId {
    Reserved,
    #[default]
    ProDos,
    Dos33,
    Dos32,
    Pascal,
    MacHfs,
    MacMfs,
    Lisa,
    Cpm,
    CharFst,
    MsDos,
    HighSierra,
    Iso9660,
    AppleShare,
    Other(u16),
}

impl FileSysId {
    pub fn from_u16(v: u16) -> Self {
        match v {
            0  => FileSysId::Reserved,
            1  => FileSysId::ProDos,
            2  => FileSysId::Dos33,
            3  => FileSysId::Dos32,
            4  => FileSysId::Pascal,
            5  => FileSysId::MacHfs,
            6  => FileSysId::MacMfs,
            7  => FileSysId::Lisa,
            8  => FileSysId::Cpm,
            9  => FileSysId::CharFst,
            10 => FileSysId::MsDos,
            11 => FileSysId::HighSierra,
            12 => FileSysId::Iso9660,
            13 => FileSysId::AppleShare,
            n  => FileSysId::Other(n),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            FileSysId::Reserved   => 0,
            FileSysId::ProDos     => 1,
            FileSysId::Dos33      => 2,
            FileSysId::Dos32      => 3,
            FileSysId::Pascal     => 4,
            FileSysId::MacHfs     => 5,
            FileSysId::MacMfs     => 6,
            FileSysId::Lisa       => 7,
            FileSysId::Cpm        => 8,
            FileSysId::CharFst    => 9,
            FileSysId::MsDos      => 10,
            FileSysId::HighSierra => 11,
            FileSysId::Iso9660    => 12,
            FileSysId::AppleShare => 13,
            FileSysId::Other(n)   => n,
        }
    }

    /// Separator to use when `file_sys_info` carries none.
    pub fn default_separator(self) -> u8 {
        match self {
            FileSysId::MsDos => b'\\',
            FileSysId::Cpm | FileSysId::HighSierra | FileSysId::Iso9660 => b'/',
            _ => b':',
        }
    }

    /// Whether file type / aux type hold HFS type and creator codes.
    pub fn uses_hfs_codes(self) -> bool {
        matches!(self, FileSysId::MacHfs | FileSysId::MacMfs)
    }

    /// DOS 3.x and Pascal volumes have a single catalog and no directories.
    pub fn is_flat(self) -> bool {
        matches!(self, FileSysId::Dos33 | FileSysId::Dos32 | FileSysId::Pascal)
    }

    pub fn name(self) -> &'static str {
        match self {
            FileSysId::ProDos     => "ProDOS",
            FileSysId::Dos33      => "DOS 3.3",
            FileSysId::Dos32      => "DOS 3.2",
            FileSysId::Pascal     => "Pascal",
            FileSysId::MacHfs     => "HFS",
            FileSysId::MacMfs     => "MFS",
            FileSysId::Lisa       => "Lisa",
            FileSysId::Cpm        => "CP/M",
            FileSysId::CharFst    => "Char FST",
            FileSysId::MsDos      => "MS-DOS",
            FileSysId::HighSierra => "High Sierra",
            FileSysId::Iso9660    => "ISO 9660",
            FileSysId::AppleShare => "AppleShare",
            FileSysId::Reserved | FileSysId::Other(_) => "Unknown",
        }
    }
}

impl fmt::Display for FileSysId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── ProDOS file types ─────────────────────────────────────────────────────────

pub const TYPE_NON: u8 = 0x00;
pub const TYPE_BAD: u8 = 0x01;
pub const TYPE_PCD: u8 = 0x02;
pub const TYPE_PTX: u8 = 0x03;
pub const TYPE_TXT: u8 = 0x04;
pub const TYPE_PDA: u8 = 0x05;
pub const TYPE_BIN: u8 = 0x06;
pub const TYPE_DIR: u8 = 0x0F;
pub const TYPE_INT: u8 = 0xFA;
pub const TYPE_BAS: u8 = 0xFC;
pub const TYPE_REL: u8 = 0xFE;

/// Three-letter ProDOS abbreviations, indexed by file type.
/// Unassigned slots read `$xx`.
pub const PRODOS_TYPE_NAMES: [&str; 256] = [
    "NON", "BAD", "PCD", "PTX", "TXT", "PDA", "BIN", "FNT",
    "FOT", "BA3", "DA3", "WPF", "SOS", "$0D", "$0E", "DIR",
    "RPD", "RPI", "AFD", "AFM", "AFR", "SCL", "PFS", "$17",
    "$18", "ADB", "AWP", "ASP", "$1C", "$1D", "$1E", "$1F",
    "TDM", "IPS", "UPV", "$23", "$24", "$25", "$26", "$27",
    "$28", "3SD", "8SC", "8OB", "8IC", "8LD", "P8C", "$2F",
    "$30", "$31", "$32", "$33", "$34", "$35", "$36", "$37",
    "$38", "$39", "$3A", "$3B", "$3C", "$3D", "$3E", "$3F",
    "DIC", "OCR", "FTD", "$43", "$44", "$45", "$46", "$47",
    "$48", "$49", "$4A", "$4B", "$4C", "$4D", "$4E", "$4F",
    "GWP", "GSS", "GDB", "DRW", "GDP", "HMD", "EDU", "STN",
    "HLP", "COM", "CFG", "ANM", "MUM", "ENT", "DVU", "FIN",
    "$60", "$61", "$62", "$63", "$64", "$65", "$66", "$67",
    "$68", "$69", "$6A", "BIO", "$6C", "TDR", "PRE", "HDV",
    "$70", "$71", "$72", "$73", "$74", "$75", "$76", "$77",
    "$78", "$79", "$7A", "$7B", "$7C", "$7D", "$7E", "$7F",
    "$80", "$81", "$82", "$83", "$84", "$85", "$86", "$87",
    "$88", "$89", "$8A", "$8B", "$8C", "$8D", "$8E", "$8F",
    "$90", "$91", "$92", "$93", "$94", "$95", "$96", "$97",
    "$98", "$99", "$9A", "$9B", "$9C", "$9D", "$9E", "$9F",
    "WP ", "$A1", "$A2", "$A3", "$A4", "$A5", "$A6", "$A7",
    "$A8", "$A9", "$AA", "GSB", "TDF", "BDF", "$AE", "$AF",
    "SRC", "OBJ", "LIB", "S16", "RTL", "EXE", "PIF", "TIF",
    "NDA", "CDA", "TOL", "DVR", "LDF", "FST", "$BE", "DOC",
    "PNT", "PIC", "ANI", "PAL", "$C4", "OOG", "SCR", "CDV",
    "FON", "FND", "ICN", "$CB", "$CC", "$CD", "$CE", "$CF",
    "$D0", "$D1", "$D2", "$D3", "$D4", "MUS", "INS", "MDI",
    "SND", "$D9", "$DA", "DBM", "$DC", "DDD", "$DE", "$DF",
    "LBR", "$E1", "ATK", "$E3", "$E4", "$E5", "$E6", "$E7",
    "$E8", "$E9", "$EA", "$EB", "$EC", "$ED", "R16", "PAS",
    "CMD", "$F1", "$F2", "$F3", "$F4", "$F5", "$F6", "$F7",
    "$F8", "OS ", "INT", "IVR", "BAS", "VAR", "REL", "SYS",
];

/// Abbreviation shown for codes outside the ProDOS table.
pub const UNKNOWN_TYPE_NAME: &str = "???";

/// Coarse host-side classification of an archived item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileCategory {
    Directory,
    DiskImage,
    Text,
    Basic,
    Binary,
    System,
    Application,
    Source,
    Graphics,
    Sound,
    Font,
    Document,
    Unknown,
}

/// Classify a ProDOS type byte. Unassigned table slots are `Unknown`.
pub fn category_of(file_type: u8) -> FileCategory {
    match file_type {
        TYPE_DIR => FileCategory::Directory,
        TYPE_TXT | TYPE_PTX => FileCategory::Text,
        TYPE_BAS | TYPE_INT | 0xFD | 0x09 => FileCategory::Basic,
        TYPE_BIN | 0xB1 | 0xB2 | 0xB4 | 0xBA | 0xBB | TYPE_REL => FileCategory::Binary,
        0xFF | 0xF9 | 0xBD | 0xB7 | 0xB9 => FileCategory::System,
        0xB3 | 0xB5 | 0xB8 | 0xBC | 0x2E | TYPE_PCD => FileCategory::Application,
        0xB0 | 0xEF | 0x2A | 0x2B | 0x2C | 0x2D => FileCategory::Source,
        0x08 | 0xC0 | 0xC1 | 0xC2 | 0xC3 | 0x53 => FileCategory::Graphics,
        0xD5 | 0xD6 | 0xD7 | 0xD8 => FileCategory::Sound,
        0x07 | 0xC8 | 0xC9 => FileCategory::Font,
        0x1A | 0x50 | 0xA0 | 0x0B | 0xBF | 0x19 | 0x1B | TYPE_PDA => FileCategory::Document,
        t if PRODOS_TYPE_NAMES[t as usize].starts_with('$') => FileCategory::Unknown,
        _ => FileCategory::Document,
    }
}

/// ProDOS abbreviation for a 32-bit type field, `???` when it does not fit
/// the table.
pub fn prodos_type_name(file_type: u32) -> &'static str {
    u8::try_from(file_type)
        .map(|t| PRODOS_TYPE_NAMES[t as usize])
        .unwrap_or(UNKNOWN_TYPE_NAME)
}

// ── HFS four-character codes ──────────────────────────────────────────────────

pub const fn four_cc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

pub const CREATOR_PRODOS: u32 = four_cc(b"pdos");
pub const TYPE_TEXT:      u32 = four_cc(b"TEXT");
pub const TYPE_BINA:      u32 = four_cc(b"BINA");
pub const TYPE_DISK_IMG:  u32 = four_cc(b"dImg");
pub const CREATOR_DISK:   u32 = four_cc(b"dCpy");

/// Render a four-char code, escaping non-printable bytes.
pub fn four_cc_string(code: u32) -> String {
    code.to_be_bytes()
        .iter()
        .map(|&b| if (0x20..0x7F).contains(&b) { (b as char).to_string() } else { format!("\\x{b:02x}") })
        .collect()
}

/// HFS type/creator for a ProDOS type and aux type, the way ProDOS FST and
/// AppleShare present ProDOS files to the Finder.
pub fn hfs_codes_for_prodos(file_type: u8, aux_type: u16) -> (u32, u32) {
    match (file_type, aux_type) {
        (TYPE_TXT, 0) => (TYPE_TEXT, CREATOR_PRODOS),
        (TYPE_BIN, 0) => (TYPE_BINA, CREATOR_PRODOS),
        _ => {
            let [hi, lo] = aux_type.to_be_bytes();
            (u32::from_be_bytes([b'p', file_type, hi, lo]), CREATOR_PRODOS)
        }
    }
}

/// Inverse of [`hfs_codes_for_prodos`]; `None` when the codes do not
/// describe a ProDOS file.
pub fn prodos_for_hfs_codes(type_code: u32, creator: u32) -> Option<(u8, u16)> {
    if creator != CREATOR_PRODOS {
        return None;
    }
    match type_code {
        TYPE_TEXT => Some((TYPE_TXT, 0)),
        TYPE_BINA => Some((TYPE_BIN, 0)),
        t => {
            let [p, file_type, hi, lo] = t.to_be_bytes();
            (p == b'p').then(|| (file_type, u16::from_be_bytes([hi, lo])))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sys_ids_map_both_ways() {
        for raw in 0..=20u16 {
            assert_eq!(FileSysId::from_u16(raw).as_u16(), raw);
        }
        assert_eq!(FileSysId::from_u16(5), FileSysId::MacHfs);
        assert_eq!(FileSysId::from_u16(99), FileSysId::Other(99));
    }

    #[test]
    fn table_lookups() {
        assert_eq!(prodos_type_name(0x04), "TXT");
        assert_eq!(prodos_type_name(0xFF), "SYS");
        assert_eq!(prodos_type_name(0x1234), UNKNOWN_TYPE_NAME);
        assert_eq!(category_of(0x0D), FileCategory::Unknown);
        assert_eq!(category_of(TYPE_DIR), FileCategory::Directory);
        assert_eq!(category_of(0xB3), FileCategory::Application);
    }

    #[test]
    fn prodos_hfs_codes() {
        assert_eq!(hfs_codes_for_prodos(TYPE_TXT, 0), (TYPE_TEXT, CREATOR_PRODOS));
        let (t, c) = hfs_codes_for_prodos(0xB3, 0xDB07);
        assert_eq!(four_cc_string(t), "p\\xb3\\xdb\\x07");
        assert_eq!(prodos_for_hfs_codes(t, c), Some((0xB3, 0xDB07)));
        assert_eq!(prodos_for_hfs_codes(TYPE_TEXT, four_cc(b"ttxt")), None);
    }
}
