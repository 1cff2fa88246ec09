// 字节编解码：大端序 payload 读写 + 封套校验码
// 采集棒封套与寄存器值全部按 big-endian 排布，序列号为定宽 ASCII（NUL 填充）

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// CRC-16/MODBUS：多项式 0xA001（反射），初值 0xFFFF
/// 校验向量见单元测试，勿改参数
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// 从字节切片顺序取值的解码器
pub struct PayloadDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Truncated {
                needed: n - self.remaining(),
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut s = self.take(2)?;
        Ok(s.read_u16::<BigEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut s = self.take(4)?;
        Ok(s.read_u32::<BigEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut s = self.take(8)?;
        Ok(s.read_u64::<BigEndian>()?)
    }

    /// 定宽字符串：按 latin-1 解释，去掉 NUL 填充
    pub fn read_string(&mut self, width: usize) -> Result<String> {
        let bytes = self.take(width)?;
        Ok(bytes
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| b as char)
            .collect())
    }

    pub fn read_u16_vec(&mut self, count: usize) -> Result<Vec<u16>> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_u16()?);
        }
        Ok(values)
    }
}

/// 顺序写入的编码器，`finish()` 取出缓冲
#[derive(Default)]
pub struct PayloadEncoder {
    buf: Vec<u8>,
}

impl PayloadEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        // Vec 写入不会失败
        self.buf.write_u16::<BigEndian>(value).unwrap();
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.write_u64::<BigEndian>(value).unwrap();
    }

    /// 定宽字符串：超长截断，不足 NUL 填充
    pub fn write_string(&mut self, value: &str, width: usize) {
        let bytes = value.as_bytes();
        for i in 0..width {
            self.buf.push(*bytes.get(i).unwrap_or(&0));
        }
    }

    pub fn write_u16_slice(&mut self, values: &[u16]) {
        for &v in values {
            self.write_u16(v);
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_check_vector() {
        // CRC-16/MODBUS 的标准校验值
        assert_eq!(crc16(b"123456789"), 0x4B37);
        assert_eq!(crc16(b""), 0xFFFF);
    }

    #[test]
    fn string_padding_and_truncation() {
        let mut enc = PayloadEncoder::new();
        enc.write_string("AB12", 10);
        enc.write_string("WF1234G567EXTRA", 10);
        let buf = enc.finish();
        assert_eq!(buf.len(), 20);
        assert_eq!(&buf[..4], b"AB12");
        assert_eq!(&buf[4..10], &[0u8; 6]);
        assert_eq!(&buf[10..], b"WF1234G567");

        let mut dec = PayloadDecoder::new(&buf);
        assert_eq!(dec.read_string(10).unwrap(), "AB12");
        assert_eq!(dec.read_string(10).unwrap(), "WF1234G567");
    }

    #[test]
    fn integer_round_trip() {
        let mut enc = PayloadEncoder::new();
        enc.write_u8(0x32);
        enc.write_u16(0x5959);
        enc.write_u64(0x8);
        enc.write_u16_slice(&[1, 0xFFFF]);
        let buf = enc.finish();

        let mut dec = PayloadDecoder::new(&buf);
        assert_eq!(dec.read_u8().unwrap(), 0x32);
        assert_eq!(dec.read_u16().unwrap(), 0x5959);
        assert_eq!(dec.read_u64().unwrap(), 0x8);
        assert_eq!(dec.read_u16_vec(2).unwrap(), vec![1, 0xFFFF]);
        assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn truncated_read_reports_shortfall() {
        let mut dec = PayloadDecoder::new(&[0x01]);
        match dec.read_u16() {
            Err(Error::Truncated { needed, available }) => {
                assert_eq!(needed, 1);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
