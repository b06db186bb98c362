//! Byte sequences the overlay engine inserts into a generated PCL XL stream.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{
    ATTR_STREAM_DATA_LENGTH, ATTR_STREAM_NAME, OP_BEGIN_STREAM, OP_END_STREAM, OP_POP_GS, OP_PUSH_GS, OP_READ_STREAM, TAG_ATTR_UBYTE, TAG_EMBEDDED_DATA,
    TAG_UBYTE_ARRAY, TAG_UINT16, TAG_UINT32,
};

const HEADER_TEXT: &[u8] = b" HP-PCL XL;2;0;Comment overlay\r\n";

pub struct XlWriter {
    big_endian: bool,
}

impl XlWriter {
    pub fn new(big_endian: bool) -> Self {
        Self { big_endian }
    }

    fn u16(&self, out: &mut Vec<u8>, value: u16) {
        let mut tmp = [0; 2];
        if self.big_endian {
            BigEndian::write_u16(&mut tmp, value);
        } else {
            LittleEndian::write_u16(&mut tmp, value);
        }
        out.extend_from_slice(&tmp);
    }

    fn u32(&self, out: &mut Vec<u8>, value: u32) {
        let mut tmp = [0; 4];
        if self.big_endian {
            BigEndian::write_u32(&mut tmp, value);
        } else {
            LittleEndian::write_u32(&mut tmp, value);
        }
        out.extend_from_slice(&tmp);
    }

    /// Binding byte followed by the stream header line.
    pub fn stream_header(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_TEXT.len() + 1);
        out.push(if self.big_endian { b'(' } else { b')' });
        out.extend_from_slice(HEADER_TEXT);
        out
    }

    /// `StreamName` attribute and `BeginStream`.
    pub fn begin_stream(&self, name: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(name.len() + 8);
        out.push(TAG_UBYTE_ARRAY);
        out.push(TAG_UINT16);
        self.u16(&mut out, name.len().min(u16::MAX as usize) as u16);
        out.extend_from_slice(&name.as_bytes()[..name.len().min(u16::MAX as usize)]);
        out.push(TAG_ATTR_UBYTE);
        out.push(ATTR_STREAM_NAME as u8);
        out.push(OP_BEGIN_STREAM);
        out
    }

    /// `StreamDataLength` attribute, `ReadStream` and the embedded data introducer for `len` bytes.
    pub fn read_stream_prefix(&self, len: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(14);
        out.push(TAG_UINT32);
        self.u32(&mut out, len);
        out.push(TAG_ATTR_UBYTE);
        out.push(ATTR_STREAM_DATA_LENGTH as u8);
        out.push(OP_READ_STREAM);
        out.push(TAG_EMBEDDED_DATA);
        self.u32(&mut out, len);
        out
    }

    pub fn end_stream(&self) -> Vec<u8> {
        vec![OP_END_STREAM]
    }

    pub fn push_gs(&self) -> Vec<u8> {
        vec![OP_PUSH_GS]
    }

    pub fn pop_gs(&self) -> Vec<u8> {
        vec![OP_POP_GS]
    }
}
