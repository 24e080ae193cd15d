//! A growable byte sequence with an absolute cursor and a write-scope stack.
//!
//! Reads consume little-endian primitives and LEB128 integers from the cursor.
//! Writes append to the innermost open *scope*: [`DataBuffer::push_scope`]
//! starts a fresh sibling buffer, [`DataBuffer::pop_scope`] returns its
//! contents, and the caller typically re-emits them length-prefixed. Every
//! size-prefixed Wasm section is written with that three-line idiom, without
//! a size-precomputation pass.

mod errors;

pub use errors::BufferError;

use crate::leb128;

#[derive(Debug, Default)]
pub struct DataBuffer {
    data: Vec<u8>,
    pos: usize,
    scopes: Vec<Vec<u8>>,
}

impl DataBuffer {
    pub fn new() -> Self {
        DataBuffer::default()
    }

    /// Wraps existing bytes for reading; the cursor starts at zero.
    pub fn of(data: Vec<u8>) -> Self {
        DataBuffer {
            data,
            pos: 0,
            scopes: Vec::new(),
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The accumulated bytes. Any open scopes are NOT included.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn require(&self, count: usize) -> Result<(), BufferError> {
        if self.remaining() < count {
            Err(BufferError::UnexpectedEnd(count - self.remaining()))
        } else {
            Ok(())
        }
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn get_u8(&mut self) -> Result<u8, BufferError> {
        self.require(1)?;
        let byte = self.data[self.pos];
        self.pos += 1;

        Ok(byte)
    }

    pub fn get_u16(&mut self) -> Result<u16, BufferError> {
        self.require(2)?;
        let bytes: [u8; 2] = self.data[self.pos..self.pos + 2].try_into().unwrap();
        self.pos += 2;

        Ok(u16::from_le_bytes(bytes))
    }

    pub fn get_u32(&mut self) -> Result<u32, BufferError> {
        self.require(4)?;
        let bytes: [u8; 4] = self.data[self.pos..self.pos + 4].try_into().unwrap();
        self.pos += 4;

        Ok(u32::from_le_bytes(bytes))
    }

    pub fn get_u64(&mut self) -> Result<u64, BufferError> {
        self.require(8)?;
        let bytes: [u8; 8] = self.data[self.pos..self.pos + 8].try_into().unwrap();
        self.pos += 8;

        Ok(u64::from_le_bytes(bytes))
    }

    pub fn get_f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    pub fn get_f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    pub fn get_bytes(&mut self, count: usize) -> Result<&[u8], BufferError> {
        self.require(count)?;
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;

        Ok(slice)
    }

    pub fn get_u32_leb(&mut self) -> Result<u32, BufferError> {
        let (value, size) = leb128::read_unsigned(&self.data[self.pos..], 32)?;
        self.pos += size;

        Ok(value as u32)
    }

    pub fn get_u64_leb(&mut self) -> Result<u64, BufferError> {
        let (value, size) = leb128::read_unsigned(&self.data[self.pos..], 64)?;
        self.pos += size;

        Ok(value)
    }

    pub fn get_i32_leb(&mut self) -> Result<i32, BufferError> {
        let (value, size) = leb128::read_signed(&self.data[self.pos..], 32)?;
        self.pos += size;

        Ok(value as i32)
    }

    pub fn get_i64_leb(&mut self) -> Result<i64, BufferError> {
        let (value, size) = leb128::read_signed(&self.data[self.pos..], 64)?;
        self.pos += size;

        Ok(value)
    }

    fn sink(&mut self) -> &mut Vec<u8> {
        self.scopes.last_mut().unwrap_or(&mut self.data)
    }

    pub fn put_u8(&mut self, value: u8) {
        self.sink().push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.sink().extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.sink().extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.sink().extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f32(&mut self, value: f32) {
        self.put_u32(value.to_bits());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.put_u64(value.to_bits());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.sink().extend_from_slice(bytes);
    }

    pub fn put_u32_leb(&mut self, value: u32) {
        leb128::write_unsigned(self.sink(), value as u64);
    }

    pub fn put_u64_leb(&mut self, value: u64) {
        leb128::write_unsigned(self.sink(), value);
    }

    pub fn put_i32_leb(&mut self, value: i32) {
        leb128::write_signed(self.sink(), value as i64);
    }

    pub fn put_i64_leb(&mut self, value: i64) {
        leb128::write_signed(self.sink(), value);
    }

    /// Starts a sibling buffer; subsequent writes land in it until the
    /// matching [`DataBuffer::pop_scope`].
    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Ends the innermost scope and hands its contents back. Scopes are
    /// strictly LIFO.
    pub fn pop_scope(&mut self) -> Vec<u8> {
        self.scopes.pop().expect("pop_scope without push_scope")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_round_trip() {
        let mut buffer = DataBuffer::new();

        buffer.put_u8(0xAB);
        buffer.put_u16(0x1234);
        buffer.put_u32(0xDEADBEEF);
        buffer.put_u64(0x0102030405060708);
        buffer.put_f32(1.5);
        buffer.put_f64(-2.25);

        let mut buffer = DataBuffer::of(buffer.into_vec());

        assert_eq!(buffer.get_u8(), Ok(0xAB));
        assert_eq!(buffer.get_u16(), Ok(0x1234));
        assert_eq!(buffer.get_u32(), Ok(0xDEADBEEF));
        assert_eq!(buffer.get_u64(), Ok(0x0102030405060708));
        assert_eq!(buffer.get_f32(), Ok(1.5));
        assert_eq!(buffer.get_f64(), Ok(-2.25));
        assert!(buffer.at_end());
    }

    #[test]
    fn little_endian_layout() {
        let mut buffer = DataBuffer::new();
        buffer.put_u32(1);

        assert_eq!(buffer.as_slice(), &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn reads_past_the_end_fail() {
        let mut buffer = DataBuffer::of(vec![0x01]);

        assert_eq!(buffer.get_u32(), Err(BufferError::UnexpectedEnd(3)));
    }

    #[test]
    fn scopes_nest_and_preserve_order() {
        let mut buffer = DataBuffer::new();

        buffer.put_u8(1);
        buffer.push_scope();
        buffer.put_u8(2);
        buffer.push_scope();
        buffer.put_u8(3);

        let inner = buffer.pop_scope();
        buffer.put_bytes(&inner);

        let outer = buffer.pop_scope();
        buffer.put_u32_leb(outer.len() as u32);
        buffer.put_bytes(&outer);

        assert_eq!(buffer.as_slice(), &[1, 2, 2, 3]);
    }

    #[test]
    fn leb_reads_advance_the_cursor() {
        let mut buffer = DataBuffer::of(vec![0xE5, 0x8E, 0x26, 0x7F]);

        assert_eq!(buffer.get_u32_leb(), Ok(624485));
        assert_eq!(buffer.get_i32_leb(), Ok(-1));
        assert!(buffer.at_end());
    }

    #[test]
    fn nan_bits_survive_float_round_trip() {
        let bits = 0x7FF0_0000_0000_0001u64;
        let mut buffer = DataBuffer::new();

        buffer.put_f64(f64::from_bits(bits));

        let mut buffer = DataBuffer::of(buffer.into_vec());

        assert_eq!(buffer.get_f64().map(f64::to_bits), Ok(bits));
    }
}
