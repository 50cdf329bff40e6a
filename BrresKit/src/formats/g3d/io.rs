//! Big-endian read helpers shared by the MDL0 record readers.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use glam::Vec3;

use crate::error::{Error, Result};

/// Resolve `base + relative` and check that `size` bytes fit at the result.
pub(crate) fn resolve(data: &[u8], base: u64, relative: i64, size: usize) -> Result<u64> {
    let offset = base as i64 + relative;
    if offset < 0
        || (offset as u64)
            .checked_add(size as u64)
            .is_none_or(|end| end > data.len() as u64)
    {
        return Err(Error::OffsetOutOfRange {
            offset,
            len: data.len(),
        });
    }
    Ok(offset as u64)
}

/// Cursor positioned at an absolute offset after a bounds check.
pub(crate) fn cursor_at(data: &[u8], offset: u64) -> Result<Cursor<&[u8]>> {
    resolve(data, offset, 0, 0)?;
    let mut cursor = Cursor::new(data);
    cursor.set_position(offset);
    Ok(cursor)
}

/// Read a pooled name. `relative` points at the characters; the length
/// prefix sits in the four bytes before them. Zero means no name.
pub(crate) fn read_name(data: &[u8], base: u64, relative: i32) -> Result<String> {
    if relative == 0 {
        return Ok(String::new());
    }
    let chars = resolve(data, base, i64::from(relative), 0)?;
    let prefix = resolve(data, chars, -4, 4)?;
    let mut cursor = cursor_at(data, prefix)?;
    let len = cursor.read_u32::<BigEndian>()? as usize;
    let start = resolve(data, chars, 0, len)? as usize;
    Ok(String::from_utf8(data[start..start + len].to_vec())?)
}

pub(crate) fn read_vec3(reader: &mut Cursor<&[u8]>) -> Result<Vec3> {
    let x = reader.read_f32::<BigEndian>()?;
    let y = reader.read_f32::<BigEndian>()?;
    let z = reader.read_f32::<BigEndian>()?;
    Ok(Vec3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_name() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&5u32.to_be_bytes());
        data.extend_from_slice(b"hello\0\0\0");
        assert_eq!(read_name(&data, 0, 8).unwrap(), "hello");
        assert_eq!(read_name(&data, 4, 4).unwrap(), "hello");
        assert_eq!(read_name(&data, 0, 0).unwrap(), "");
    }

    #[test]
    fn test_name_out_of_range() {
        let data = [0u8; 8];
        assert!(read_name(&data, 0, 2).is_err());
        assert!(read_name(&data, 0, 64).is_err());
    }

    #[test]
    fn test_name_invalid_utf8() {
        let mut data = 2u32.to_be_bytes().to_vec();
        data.extend_from_slice(&[0xFF, 0xFE, 0, 0]);
        assert!(matches!(read_name(&data, 0, 4), Err(Error::Utf8Error(_))));
    }

    #[test]
    fn test_resolve_overflow() {
        let data = [0u8; 8];
        assert!(resolve(&data, 0, 4, usize::MAX).is_err());
    }

    #[test]
    fn test_resolve_negative() {
        let data = [0u8; 8];
        assert!(resolve(&data, 4, -8, 0).is_err());
        assert_eq!(resolve(&data, 4, -4, 4).unwrap(), 0);
    }
}
