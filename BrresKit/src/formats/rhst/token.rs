//! RHST token stream
//!
//! Every token starts with a little-endian s32 tag. Strings are stored as a
//! u32 length followed by the bytes, padded to a multiple of four.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Size of the `RHST` magic plus the s32 version that precede the tokens.
pub const HEADER_SIZE: u64 = 8;

/// Token tags.
pub mod tags {
    pub const NULL: i32 = 0;
    pub const DICT: i32 = 1;
    pub const ARRAY: i32 = 2;
    pub const ARRAY_DYNAMIC: i32 = 3;
    pub const END_DICT: i32 = 4;
    pub const END_ARRAY: i32 = 5;
    pub const END_ARRAY_DYNAMIC: i32 = 6;
    pub const STRING: i32 = 7;
    pub const S32: i32 = 8;
    pub const F32: i32 = 9;
}

/// One decoded token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of stream.
    Null,
    /// A dictionary of `size` children follows.
    DictBegin { name: String, size: u32 },
    DictEnd,
    /// An array of `size` children follows.
    ArrayBegin { size: u32 },
    ArrayEnd,
    String(String),
    S32(i32),
    F32(f32),
}

impl Token {
    /// Short name used in grammar errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Null => "null",
            Token::DictBegin { .. } => "dictionary",
            Token::DictEnd => "dictionary end",
            Token::ArrayBegin { .. } => "array",
            Token::ArrayEnd => "array end",
            Token::String(_) => "string",
            Token::S32(_) => "s32",
            Token::F32(_) => "f32",
        }
    }
}

/// Pull-style reader over an RHST byte stream.
pub struct TokenReader<'a> {
    cursor: Cursor<&'a [u8]>,
    token_offset: u64,
}

impl<'a> TokenReader<'a> {
    /// Start reading after the file header.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if (data.len() as u64) < HEADER_SIZE {
            return Err(Error::RhstGrammar {
                offset: 0,
                message: "file is too small for an RHST header".to_string(),
            });
        }
        let mut cursor = Cursor::new(data);
        cursor.set_position(HEADER_SIZE);
        Ok(Self {
            cursor,
            token_offset: HEADER_SIZE,
        })
    }

    /// Byte offset of the most recently read token.
    #[must_use]
    pub fn token_offset(&self) -> u64 {
        self.token_offset
    }

    /// Decode the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.token_offset = self.cursor.position();
        let tag = self.read_i32()?;
        let token = match tag {
            tags::NULL => Token::Null,
            tags::DICT => {
                let size = self.read_u32()?;
                let name = self.read_string()?;
                Token::DictBegin { name, size }
            }
            tags::ARRAY => {
                let size = self.read_u32()?;
                let _element_type = self.read_u32()?;
                Token::ArrayBegin { size }
            }
            tags::END_DICT => Token::DictEnd,
            tags::END_ARRAY => Token::ArrayEnd,
            tags::STRING => Token::String(self.read_string()?),
            tags::S32 => Token::S32(self.read_i32()?),
            tags::F32 => Token::F32(self.read_f32()?),
            tags::ARRAY_DYNAMIC | tags::END_ARRAY_DYNAMIC => {
                return Err(self.error("dynamic arrays are not supported"));
            }
            other => return Err(self.error(format!("unknown token tag {other}"))),
        };
        Ok(token)
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> Error {
        Error::RhstGrammar {
            offset: self.token_offset,
            message: message.into(),
        }
    }

    fn truncated(&self) -> Error {
        self.error("unexpected end of stream")
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    fn read_f32(&mut self) -> Result<f32> {
        self.cursor
            .read_f32::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let remaining = (self.cursor.get_ref().len() as u64).saturating_sub(self.cursor.position());
        let padded = (len as u64).next_multiple_of(4);
        if padded > remaining {
            return Err(self.truncated());
        }
        let mut bytes = vec![0u8; padded as usize];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|_| self.truncated())?;
        bytes.truncate(len);
        Ok(String::from_utf8(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(body: &[u8]) -> Vec<u8> {
        let mut data = b"RHST".to_vec();
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_read_tokens() {
        let mut body = Vec::new();
        body.extend_from_slice(&tags::DICT.to_le_bytes());
        body.extend_from_slice(&2u32.to_le_bytes());
        body.extend_from_slice(&5u32.to_le_bytes());
        body.extend_from_slice(b"bones\0\0\0");
        body.extend_from_slice(&tags::F32.to_le_bytes());
        body.extend_from_slice(&1.5f32.to_le_bytes());
        body.extend_from_slice(&tags::S32.to_le_bytes());
        body.extend_from_slice(&(-3i32).to_le_bytes());
        body.extend_from_slice(&tags::END_DICT.to_le_bytes());
        body.extend_from_slice(&tags::NULL.to_le_bytes());
        let data = stream(&body);

        let mut reader = TokenReader::new(&data).unwrap();
        assert_eq!(
            reader.next_token().unwrap(),
            Token::DictBegin {
                name: "bones".to_string(),
                size: 2
            }
        );
        assert_eq!(reader.next_token().unwrap(), Token::F32(1.5));
        assert_eq!(reader.token_offset(), 28);
        assert_eq!(reader.next_token().unwrap(), Token::S32(-3));
        assert_eq!(reader.next_token().unwrap(), Token::DictEnd);
        assert_eq!(reader.next_token().unwrap(), Token::Null);
    }

    #[test]
    fn test_dynamic_array_rejected() {
        let data = stream(&tags::ARRAY_DYNAMIC.to_le_bytes());
        let mut reader = TokenReader::new(&data).unwrap();
        assert!(matches!(
            reader.next_token(),
            Err(Error::RhstGrammar { offset: 8, .. })
        ));
    }

    #[test]
    fn test_truncated_string() {
        let mut body = tags::STRING.to_le_bytes().to_vec();
        body.extend_from_slice(&10u32.to_le_bytes());
        body.extend_from_slice(b"abc");
        let data = stream(&body);
        let mut reader = TokenReader::new(&data).unwrap();
        assert!(matches!(reader.next_token(), Err(Error::RhstGrammar { .. })));
    }

    #[test]
    fn test_string_length_exceeds_stream() {
        let mut body = tags::STRING.to_le_bytes().to_vec();
        body.extend_from_slice(&u32::MAX.to_le_bytes());
        body.extend_from_slice(b"abcd");
        let data = stream(&body);
        let mut reader = TokenReader::new(&data).unwrap();
        match reader.next_token() {
            Err(Error::RhstGrammar { offset, message }) => {
                assert_eq!(offset, 8);
                assert_eq!(message, "unexpected end of stream");
            }
            other => panic!("expected grammar error, got {other:?}"),
        }
    }
}
