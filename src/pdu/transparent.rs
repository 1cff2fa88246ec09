// Transparent 封套：inner = 采集棒序列号(10) + 填充 u64 + 从机地址 + 功能码 + 正文 + 校验码
// 功能码因此固定落在 inner 偏移 19 处；校验码覆盖从机地址起到正文末尾的区间

use crate::codec::{crc16, PayloadDecoder, PayloadEncoder};
use crate::error::{Error, Result};
use crate::pdu::{wrap_frame, MAIN_FUNCTION_TRANSPARENT};

pub const FUNCTION_NULL: u8 = 0x00;
pub const FUNCTION_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FUNCTION_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FUNCTION_WRITE_HOLDING_REGISTER: u8 = 0x06;

/// 逆变器本尊地址；云端/手机 App 的别名地址由 Plant 归一到这里
pub const DEFAULT_SLAVE_ADDRESS: u8 = 0x32;
/// 请求侧默认的采集棒序列号占位
pub const DEFAULT_ADAPTER_SERIAL: &str = "AB1234G567";

const PADDING: u64 = 0x8;
/// inner 中从机地址的偏移（序列号 10 + 填充 8），校验区间从这里开始
const CHECKED_FROM: usize = 18;
/// 功能码之前的最短 inner 长度
const MIN_INNER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransparentRequestKind {
    ReadHoldingRegisters { base_register: u16, register_count: u16 },
    ReadInputRegisters { base_register: u16, register_count: u16 },
    WriteHoldingRegister { register: u16, value: u16 },
}

/// 客户端发出（或服务端收到）的 Transparent 请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransparentRequest {
    pub data_adapter_serial_number: String,
    pub slave_address: u8,
    pub kind: TransparentRequestKind,
}

impl TransparentRequest {
    fn new(kind: TransparentRequestKind) -> Self {
        Self {
            data_adapter_serial_number: DEFAULT_ADAPTER_SERIAL.to_string(),
            slave_address: DEFAULT_SLAVE_ADDRESS,
            kind,
        }
    }

    pub fn read_holding_registers(base_register: u16, register_count: u16) -> Self {
        Self::new(TransparentRequestKind::ReadHoldingRegisters {
            base_register,
            register_count,
        })
    }

    pub fn read_input_registers(base_register: u16, register_count: u16) -> Self {
        Self::new(TransparentRequestKind::ReadInputRegisters {
            base_register,
            register_count,
        })
    }

    pub fn write_holding_register(register: u16, value: u16) -> Self {
        Self::new(TransparentRequestKind::WriteHoldingRegister { register, value })
    }

    pub fn with_slave_address(mut self, slave_address: u8) -> Self {
        self.slave_address = slave_address;
        self
    }

    pub fn function_code(&self) -> u8 {
        match self.kind {
            TransparentRequestKind::ReadHoldingRegisters { .. } => FUNCTION_READ_HOLDING_REGISTERS,
            TransparentRequestKind::ReadInputRegisters { .. } => FUNCTION_READ_INPUT_REGISTERS,
            TransparentRequestKind::WriteHoldingRegister { .. } => FUNCTION_WRITE_HOLDING_REGISTER,
        }
    }

    /// 编码为完整帧（含封套头）
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = PayloadEncoder::new();
        enc.write_string(&self.data_adapter_serial_number, 10);
        enc.write_u64(PADDING);
        enc.write_u8(self.slave_address);
        enc.write_u8(self.function_code());
        match self.kind {
            TransparentRequestKind::ReadHoldingRegisters {
                base_register,
                register_count,
            }
            | TransparentRequestKind::ReadInputRegisters {
                base_register,
                register_count,
            } => {
                enc.write_u16(base_register);
                enc.write_u16(register_count);
            }
            TransparentRequestKind::WriteHoldingRegister { register, value } => {
                enc.write_u16(register);
                enc.write_u16(value);
            }
        }
        let check = crc16(&enc.as_slice()[CHECKED_FROM..]);
        enc.write_u16(check);
        wrap_frame(MAIN_FUNCTION_TRANSPARENT, &enc.finish())
    }

    /// 从 inner 载荷解码（服务端侧）
    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < MIN_INNER_LEN {
            return Err(Error::FrameTooShort(payload.len()));
        }
        let mut dec = PayloadDecoder::new(payload);
        let data_adapter_serial_number = dec.read_string(10)?;
        let _padding = dec.read_u64()?;
        let slave_address = dec.read_u8()?;
        let function_code = dec.read_u8()?;
        let kind = match function_code {
            FUNCTION_READ_HOLDING_REGISTERS => TransparentRequestKind::ReadHoldingRegisters {
                base_register: dec.read_u16()?,
                register_count: dec.read_u16()?,
            },
            FUNCTION_READ_INPUT_REGISTERS => TransparentRequestKind::ReadInputRegisters {
                base_register: dec.read_u16()?,
                register_count: dec.read_u16()?,
            },
            FUNCTION_WRITE_HOLDING_REGISTER => TransparentRequestKind::WriteHoldingRegister {
                register: dec.read_u16()?,
                value: dec.read_u16()?,
            },
            other => return Err(Error::UnknownFunction(other)),
        };
        verify_check(payload, &mut dec)?;
        Ok(Self {
            data_adapter_serial_number,
            slave_address,
            kind,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransparentResponseKind {
    /// 采集棒的占位应答，丢弃即可
    Null,
    ReadHoldingRegisters {
        base_register: u16,
        register_count: u16,
        values: Vec<u16>,
    },
    ReadInputRegisters {
        base_register: u16,
        register_count: u16,
        values: Vec<u16>,
    },
    WriteHoldingRegister {
        register: u16,
        value: u16,
    },
    /// 设备侧 Modbus 异常（原功能码高位置 1）
    Exception {
        function_code: u8,
        exception_code: u8,
    },
}

/// 采集棒转发回来的 Transparent 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransparentResponse {
    pub inverter_serial_number: String,
    pub data_adapter_serial_number: String,
    pub slave_address: u8,
    /// 透传错误标志；置位的响应不应进入寄存器镜像
    pub error: bool,
    pub kind: TransparentResponseKind,
}

impl TransparentResponse {
    pub fn function_code(&self) -> u8 {
        match &self.kind {
            TransparentResponseKind::Null => FUNCTION_NULL,
            TransparentResponseKind::ReadHoldingRegisters { .. } => {
                FUNCTION_READ_HOLDING_REGISTERS
            }
            TransparentResponseKind::ReadInputRegisters { .. } => FUNCTION_READ_INPUT_REGISTERS,
            TransparentResponseKind::WriteHoldingRegister { .. } => {
                FUNCTION_WRITE_HOLDING_REGISTER
            }
            TransparentResponseKind::Exception { function_code, .. } => function_code | 0x80,
        }
    }

    /// 编码为完整帧；测试与服务端模拟会用到
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = PayloadEncoder::new();
        enc.write_string(&self.data_adapter_serial_number, 10);
        enc.write_u64(PADDING);
        enc.write_u8(self.slave_address);
        enc.write_u8(self.function_code());
        match &self.kind {
            TransparentResponseKind::Null => {
                enc.write_string(&self.inverter_serial_number, 10);
                // 62 个空字，无校验码
                enc.write_u16_slice(&[0u16; 62]);
            }
            TransparentResponseKind::ReadHoldingRegisters {
                base_register,
                register_count,
                values,
            }
            | TransparentResponseKind::ReadInputRegisters {
                base_register,
                register_count,
                values,
            } => {
                enc.write_string(&self.inverter_serial_number, 10);
                enc.write_u16(*base_register);
                enc.write_u16(*register_count);
                enc.write_u16_slice(values);
                let check = crc16(&enc.as_slice()[CHECKED_FROM..]);
                enc.write_u16(check);
            }
            TransparentResponseKind::WriteHoldingRegister { register, value } => {
                enc.write_string(&self.inverter_serial_number, 10);
                enc.write_u16(*register);
                enc.write_u16(*value);
                let check = crc16(&enc.as_slice()[CHECKED_FROM..]);
                enc.write_u16(check);
            }
            TransparentResponseKind::Exception { exception_code, .. } => {
                enc.write_u8(*exception_code);
            }
        }
        wrap_frame(MAIN_FUNCTION_TRANSPARENT, &enc.finish())
    }

    /// 从 inner 载荷解码（客户端侧）
    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < MIN_INNER_LEN {
            return Err(Error::FrameTooShort(payload.len()));
        }
        let mut dec = PayloadDecoder::new(payload);
        let data_adapter_serial_number = dec.read_string(10)?;
        let _padding = dec.read_u64()?;
        let slave_address = dec.read_u8()?;
        let raw_function = dec.read_u8()?;

        if raw_function & 0x80 != 0 {
            let exception_code = dec.read_u8()?;
            return Ok(Self {
                inverter_serial_number: String::new(),
                data_adapter_serial_number,
                slave_address,
                error: true,
                kind: TransparentResponseKind::Exception {
                    function_code: raw_function & 0x7F,
                    exception_code,
                },
            });
        }

        let (inverter_serial_number, kind) = match raw_function {
            FUNCTION_NULL => {
                // 占位帧正文不可靠，尽力取序列号即可
                let serial = dec.read_string(10).unwrap_or_default();
                (serial, TransparentResponseKind::Null)
            }
            FUNCTION_READ_HOLDING_REGISTERS | FUNCTION_READ_INPUT_REGISTERS => {
                let serial = dec.read_string(10)?;
                let base_register = dec.read_u16()?;
                let register_count = dec.read_u16()?;
                let needed = usize::from(register_count) * 2 + 2;
                if dec.remaining() < needed {
                    return Err(Error::CountMismatch {
                        count: register_count,
                        bytes: dec.remaining(),
                    });
                }
                let values = dec.read_u16_vec(usize::from(register_count))?;
                verify_check(payload, &mut dec)?;
                let kind = if raw_function == FUNCTION_READ_HOLDING_REGISTERS {
                    TransparentResponseKind::ReadHoldingRegisters {
                        base_register,
                        register_count,
                        values,
                    }
                } else {
                    TransparentResponseKind::ReadInputRegisters {
                        base_register,
                        register_count,
                        values,
                    }
                };
                (serial, kind)
            }
            FUNCTION_WRITE_HOLDING_REGISTER => {
                let serial = dec.read_string(10)?;
                let register = dec.read_u16()?;
                let value = dec.read_u16()?;
                verify_check(payload, &mut dec)?;
                (
                    serial,
                    TransparentResponseKind::WriteHoldingRegister { register, value },
                )
            }
            other => return Err(Error::UnknownFunction(other)),
        };

        Ok(Self {
            inverter_serial_number,
            data_adapter_serial_number,
            slave_address,
            error: false,
            kind,
        })
    }
}

/// 读出校验码并与本地计算值比对
fn verify_check(payload: &[u8], dec: &mut PayloadDecoder<'_>) -> Result<()> {
    let checked_until = dec.position();
    let received = dec.read_u16()?;
    let computed = crc16(&payload[CHECKED_FROM..checked_until]);
    if computed != received {
        return Err(Error::CrcMismatch { computed, received });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::FRAME_HEADER_LEN;

    fn inner(frame: &[u8]) -> &[u8] {
        &frame[FRAME_HEADER_LEN..]
    }

    #[test]
    fn read_request_wire_layout() {
        let req = TransparentRequest::read_holding_registers(0, 60);
        let frame = req.encode();
        // 头 8 + 序列号 10 + 填充 8 + 从机 1 + 功能码 1 + 正文 4 + 校验 2
        assert_eq!(frame.len(), 34);
        assert_eq!(&frame[..8], &[0x59, 0x59, 0x00, 0x01, 0x00, 28, 0x01, 0x02]);
        assert_eq!(&frame[8..18], b"AB1234G567");
        assert_eq!(&frame[18..26], &[0, 0, 0, 0, 0, 0, 0, 8]);
        assert_eq!(frame[26], 0x32);
        assert_eq!(frame[27], 0x03);
        // 功能码固定出现在 inner 偏移 19
        assert_eq!(inner(&frame)[19], 0x03);
        assert_eq!(&frame[28..32], &[0x00, 0x00, 0x00, 60]);
        let check = crc16(&frame[26..32]);
        assert_eq!(&frame[32..], check.to_be_bytes());
    }

    #[test]
    fn request_decode_round_trip() {
        let cases = [
            TransparentRequest::read_holding_registers(60, 60),
            TransparentRequest::read_input_registers(180, 60).with_slave_address(0x33),
            TransparentRequest::write_holding_register(116, 65),
        ];
        for req in cases {
            let frame = req.encode();
            let decoded = TransparentRequest::decode(inner(&frame)).unwrap();
            assert_eq!(decoded, req);
        }
    }

    fn sample_read_response() -> TransparentResponse {
        TransparentResponse {
            inverter_serial_number: "SA1234G567".to_string(),
            data_adapter_serial_number: "WF1234G567".to_string(),
            slave_address: 0x32,
            error: false,
            kind: TransparentResponseKind::ReadInputRegisters {
                base_register: 0,
                register_count: 4,
                values: vec![1, 180, 178, 3885],
            },
        }
    }

    #[test]
    fn response_decode_round_trip() {
        let resp = sample_read_response();
        let frame = resp.encode();
        let decoded = TransparentResponse::decode(inner(&frame)).unwrap();
        assert_eq!(decoded, resp);

        let write = TransparentResponse {
            inverter_serial_number: "SA1234G567".to_string(),
            data_adapter_serial_number: "WF1234G567".to_string(),
            slave_address: 0x32,
            error: false,
            kind: TransparentResponseKind::WriteHoldingRegister {
                register: 116,
                value: 65,
            },
        };
        let decoded = TransparentResponse::decode(inner(&write.encode())).unwrap();
        assert_eq!(decoded, write);
    }

    #[test]
    fn corrupted_check_is_rejected() {
        let mut frame = sample_read_response().encode();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        match TransparentResponse::decode(inner(&frame)) {
            Err(Error::CrcMismatch { .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn count_inconsistent_with_body() {
        let resp = sample_read_response();
        let mut frame = resp.encode();
        // 把 register_count 改大：正文装不下，应报 CountMismatch
        frame[FRAME_HEADER_LEN + 32] = 0x00;
        frame[FRAME_HEADER_LEN + 33] = 60;
        match TransparentResponse::decode(inner(&frame)) {
            Err(Error::CountMismatch { count: 60, .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn exception_response_decoding() {
        let resp = TransparentResponse {
            inverter_serial_number: String::new(),
            data_adapter_serial_number: "WF1234G567".to_string(),
            slave_address: 0x32,
            error: true,
            kind: TransparentResponseKind::Exception {
                function_code: FUNCTION_READ_HOLDING_REGISTERS,
                exception_code: 0x02,
            },
        };
        let frame = resp.encode();
        assert_eq!(inner(&frame)[19], 0x83);
        let decoded = TransparentResponse::decode(inner(&frame)).unwrap();
        assert!(decoded.error);
        assert_eq!(decoded.kind, resp.kind);
    }

    #[test]
    fn unknown_function_code_rejected() {
        let req = TransparentRequest::read_holding_registers(0, 60);
        let mut frame = req.encode();
        frame[27] = 0x2B;
        match TransparentRequest::decode(inner(&frame)) {
            Err(Error::UnknownFunction(0x2B)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
