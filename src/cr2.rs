//! CR2 header inspection.
//!
//! A CR2 file is a TIFF container with a Canon twist: bytes 8..12 carry the
//! `CR` signature plus version, and the 32-bit offset at 0x0C points at the
//! fourth IFD, the losslessly-compressed RAW section. That offset is what
//! `inspect` is for: it tells a RAW converter where the sensor data starts.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub const HEADER_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum Cr2Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("file too short for a CR2 header")]
    TooShort,
    #[error("unknown byte-order mark {0:02X?}")]
    ByteOrder([u8; 2]),
    #[error("TIFF magic mismatch (got {0:#06X})")]
    Magic(u16),
    #[error("missing CR signature; not a CR2 file")]
    NotCr2,
    #[error("RAW section offset {offset:#X} is outside the file ({len} bytes)")]
    RawOutOfBounds { offset: u32, len: u64 },
}

/// Parsed fixed-size CR2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cr2Header {
    pub little_endian: bool,
    /// Offset of IFD#0 (the preview chain).
    pub first_ifd_offset: u32,
    /// CR2 version, major.minor.
    pub version: (u8, u8),
    /// Offset of the RAW IFD, read from 0x0C.
    pub raw_ifd_offset: u32,
}

/// Parse the 16-byte header prefix.
pub fn parse_header(bytes: &[u8]) -> Result<Cr2Header, Cr2Error> {
    if bytes.len() < HEADER_LEN {
        return Err(Cr2Error::TooShort);
    }
    let little_endian = match [bytes[0], bytes[1]] {
        [b'I', b'I'] => true,
        [b'M', b'M'] => false,
        other => return Err(Cr2Error::ByteOrder(other)),
    };
    let read_u16 = |b: &[u8]| -> u16 {
        if little_endian {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        }
    };
    let read_u32 = |b: &[u8]| -> u32 {
        if little_endian {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        }
    };

    let magic = read_u16(&bytes[2..4]);
    if magic != 42 {
        return Err(Cr2Error::Magic(magic));
    }
    if &bytes[8..10] != b"CR" {
        return Err(Cr2Error::NotCr2);
    }
    Ok(Cr2Header {
        little_endian,
        first_ifd_offset: read_u32(&bytes[4..8]),
        version: (bytes[10], bytes[11]),
        raw_ifd_offset: read_u32(&bytes[12..16]),
    })
}

/// Read and parse the header of the file at `path`.
pub fn read_header(path: &Path) -> Result<Cr2Header, Cr2Error> {
    let mut file = File::open(path)?;
    let mut prefix = [0u8; HEADER_LEN];
    file.read_exact(&mut prefix).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Cr2Error::TooShort
        } else {
            Cr2Error::Io(e)
        }
    })?;
    parse_header(&prefix)
}

/// First byte of the RAW section, for a quick sanity peek.
pub fn peek_raw_byte(path: &Path, header: &Cr2Header) -> Result<u8, Cr2Error> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if u64::from(header.raw_ifd_offset) >= len {
        return Err(Cr2Error::RawOutOfBounds {
            offset: header.raw_ifd_offset,
            len,
        });
    }
    file.seek(SeekFrom::Start(u64::from(header.raw_ifd_offset)))?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// Print the header report for `inspect`.
pub fn run_inspect(path: &Path) -> Result<(), Cr2Error> {
    let header = read_header(path)?;
    println!("{}", path.display());
    println!(
        "  byte order:     {}",
        if header.little_endian {
            "little-endian (II)"
        } else {
            "big-endian (MM)"
        }
    );
    println!(
        "  CR2 version:    {}.{}",
        header.version.0, header.version.1
    );
    println!("  first IFD:      {:#010X}", header.first_ifd_offset);
    println!("  RAW IFD:        {:#010X}", header.raw_ifd_offset);
    match peek_raw_byte(path, &header) {
        Ok(byte) => println!("  RAW first byte: {byte:#04X}"),
        Err(e) => println!("  RAW first byte: unavailable ({e})"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> Vec<u8> {
        // Little-endian TIFF, IFD#0 at 0x10, CR2 v2.0, RAW IFD at 0x3A4B.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"II");
        bytes.extend_from_slice(&42u16.to_le_bytes());
        bytes.extend_from_slice(&0x10u32.to_le_bytes());
        bytes.extend_from_slice(b"CR");
        bytes.push(2);
        bytes.push(0);
        bytes.extend_from_slice(&0x3A4Bu32.to_le_bytes());
        bytes
    }

    #[test]
    fn test_parse_little_endian_header() {
        let header = parse_header(&header_bytes()).expect("parse");
        assert!(header.little_endian);
        assert_eq!(header.first_ifd_offset, 0x10);
        assert_eq!(header.version, (2, 0));
        assert_eq!(header.raw_ifd_offset, 0x3A4B);
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert!(matches!(parse_header(&[0u8; 4]), Err(Cr2Error::TooShort)));
    }

    #[test]
    fn test_parse_rejects_bad_byte_order() {
        let mut bytes = header_bytes();
        bytes[0] = b'Q';
        assert!(matches!(
            parse_header(&bytes),
            Err(Cr2Error::ByteOrder([b'Q', b'I']))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut bytes = header_bytes();
        bytes[2..4].copy_from_slice(&41u16.to_le_bytes());
        assert!(matches!(parse_header(&bytes), Err(Cr2Error::Magic(41))));
    }

    #[test]
    fn test_parse_rejects_plain_tiff() {
        let mut bytes = header_bytes();
        bytes[8..10].copy_from_slice(b"\0\0");
        assert!(matches!(parse_header(&bytes), Err(Cr2Error::NotCr2)));
    }

    #[test]
    fn test_read_header_and_peek_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shot.CR2");
        let mut bytes = header_bytes();
        bytes[12..16].copy_from_slice(&19u32.to_le_bytes());
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0xFF, 0xD8]);
        std::fs::write(&path, &bytes).expect("write");

        let header = read_header(&path).expect("header");
        assert_eq!(header.raw_ifd_offset, 19);
        assert_eq!(peek_raw_byte(&path, &header).expect("peek"), 0xFF);
    }

    #[test]
    fn test_peek_out_of_bounds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("short.CR2");
        std::fs::write(&path, header_bytes()).expect("write");
        let header = read_header(&path).expect("header");
        assert!(matches!(
            peek_raw_byte(&path, &header),
            Err(Cr2Error::RawOutOfBounds { .. })
        ));
    }
}
