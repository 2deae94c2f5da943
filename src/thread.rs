use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const THREAD_HEADER_SIZE: usize = 16;

pub const CLASS_MESSAGE:  u16 = 0x0000;
pub const CLASS_CONTROL:  u16 = 0x0001;
pub const CLASS_DATA:     u16 = 0x0002;
pub const CLASS_FILENAME: u16 = 0x0003;

/// What a thread carries, from its (class, kind) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadId {
    /// Obsolete plain-text message.
    AsciiText,
    Comment,
    Icon,
    CreateDirectory,
    DataFork,
    DiskImage,
    ResourceFork,
    Filename,
    Other { class: u16, kind: u16 },
}

impl ThreadId {
    pub fn from_parts(class: u16, kind: u16) -> Self {
        match (class, kind) {
            (CLASS_MESSAGE, 0x0000)  => ThreadId::AsciiText,
            (CLASS_MESSAGE, 0x0001)  => ThreadId::Comment,
            (CLASS_MESSAGE, 0x0002)  => ThreadId::Icon,
            (CLASS_CONTROL, 0x0000)  => ThreadId::CreateDirectory,
            (CLASS_DATA, 0x0000)     => ThreadId::DataFork,
            (CLASS_DATA, 0x0001)     => ThreadId::DiskImage,
            (CLASS_DATA, 0x0002)     => ThreadId::ResourceFork,
            (CLASS_FILENAME, 0x0000) => ThreadId::Filename,
            (class, kind)            => ThreadId::Other { class, kind },
        }
    }

    pub fn parts(self) -> (u16, u16) {
        match self {
            ThreadId::AsciiText       => (CLASS_MESSAGE, 0x0000),
            ThreadId::Comment         => (CLASS_MESSAGE, 0x0001),
            ThreadId::Icon            => (CLASS_MESSAGE, 0x0002),
            ThreadId::CreateDirectory => (CLASS_CONTROL, 0x0000),
            ThreadId::DataFork        => (CLASS_DATA, 0x0000),
            ThreadId::DiskImage       => (CLASS_DATA, 0x0001),
            ThreadId::ResourceFork    => (CLASS_DATA, 0x0002),
            ThreadId::Filename        => (CLASS_FILENAME, 0x0000),
            ThreadId::Other { class, kind } => (class, kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHeader {
    pub class:    u16,
    pub format:   u16,
    pub kind:     u16,
    pub crc:      u16,
    /// Uncompressed length.
    pub eof:      u32,
    /// Length of the stored (compressed) payload that follows the headers.
    pub comp_eof: u32,
}

impl ThreadHeader {
    pub fn new(id: ThreadId, format: u16, eof: u32, comp_eof: u32) -> Self {
        let (class, kind) = id.parts();
        Self { class, format, kind, crc: 0, eof, comp_eof }
    }

    pub fn id(&self) -> ThreadId {
        ThreadId::from_parts(self.class, self.kind)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(self.class)?;
        writer.write_u16::<LittleEndian>(self.format)?;
        writer.write_u16::<LittleEndian>(self.kind)?;
        writer.write_u16::<LittleEndian>(self.crc)?;
        writer.write_u32::<LittleEndian>(self.eof)?;
        writer.write_u32::<LittleEndian>(self.comp_eof)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            class:    reader.read_u16::<LittleEndian>()?,
            format:   reader.read_u16::<LittleEndian>()?,
            kind:     reader.read_u16::<LittleEndian>()?,
            crc:      reader.read_u16::<LittleEndian>()?,
            eof:      reader.read_u32::<LittleEndian>()?,
            comp_eof: reader.read_u32::<LittleEndian>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_cover_known_pairs() {
        for id in [
            ThreadId::AsciiText, ThreadId::Comment, ThreadId::Icon, ThreadId::CreateDirectory,
            ThreadId::DataFork, ThreadId::DiskImage, ThreadId::ResourceFork, ThreadId::Filename,
        ] {
            let (class, kind) = id.parts();
            assert_eq!(ThreadId::from_parts(class, kind), id);
        }
        assert_eq!(ThreadId::from_parts(7, 3), ThreadId::Other { class: 7, kind: 3 });
    }

    #[test]
    fn header_is_sixteen_bytes_little_endian() {
        let header = ThreadHeader::new(ThreadId::ResourceFork, 2, 0x0102_0304, 9);
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), THREAD_HEADER_SIZE);
        assert_eq!(&buf[..6], &[2, 0, 2, 0, 2, 0]);
        assert_eq!(&buf[8..12], &[4, 3, 2, 1]);
        assert_eq!(ThreadHeader::read(&buf[..]).unwrap(), header);
    }
}
