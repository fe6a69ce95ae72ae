use thiserror::Error;

const U8_SIZE: usize = std::mem::size_of::<u8>();
const I32_SIZE: usize = std::mem::size_of::<i32>();

/// Reasons why bytes read from a page cannot be turned back into a page.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected a buffer of {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error("needed {needed} more bytes, but only {remaining} are left")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("text length {0} is out of range")]
    InvalidTextLength(i32),

    #[error("text is not valid utf-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

pub(crate) struct Serializer<'a> {
    buffer: &'a mut [u8],
    pos: usize,
}

impl<'a> Serializer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn serialize_i32(&mut self, val: i32) {
        self.buffer[self.pos..self.pos + I32_SIZE].copy_from_slice(val.to_be_bytes().as_slice());
        self.pos += I32_SIZE;
    }

    pub fn copy_bytes(&mut self, bytes: &[u8]) {
        self.buffer[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    pub fn zeroes(&mut self, count: usize) {
        self.buffer[self.pos..self.pos + count].fill(0);
        self.pos += count;
    }

    pub fn end(self) -> usize {
        self.pos
    }
}

pub(crate) struct Deserializer<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Deserializer<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.buffer.len() - self.pos;
        if count > remaining {
            return Err(DecodeError::UnexpectedEnd {
                needed: count,
                remaining,
            });
        }
        let bytes = &self.buffer[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    pub fn deserialize_u8(&mut self) -> Result<u8, DecodeError> {
        let bytes = self.take(U8_SIZE)?;
        Ok(bytes[0])
    }

    pub fn deserialize_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.take(I32_SIZE)?;
        let mut val = [0u8; I32_SIZE];
        val.copy_from_slice(bytes);
        Ok(i32::from_be_bytes(val))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        self.take(count)
    }

    /// Moves the read position forward without looking at the bytes
    pub fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        self.take(count).map(|_| ())
    }
}
