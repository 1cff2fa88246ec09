// PDU 模型：心跳帧 + Transparent 封套报文
// 封套头 8 字节固定：事务号 0x5959 / 协议号 0x0001 / 长度 / 单元号 0x01 / 主功能码
pub mod transparent;

pub use transparent::{
    TransparentRequest, TransparentRequestKind, TransparentResponse, TransparentResponseKind,
};

use crate::codec::{PayloadDecoder, PayloadEncoder};
use crate::error::Result;

pub const TRANSACTION_ID: u16 = 0x5959;
pub const PROTOCOL_ID: u16 = 0x0001;
pub const UNIT_ID: u8 = 0x01;

/// 主功能码：封套头最后一个字节
pub const MAIN_FUNCTION_HEARTBEAT: u8 = 0x01;
pub const MAIN_FUNCTION_TRANSPARENT: u8 = 0x02;

/// 封套头长度；完整帧 = 头 + inner，长度字段 = inner 长度 + 2
pub const FRAME_HEADER_LEN: usize = 8;

/// 把 inner 载荷包进封套
pub(crate) fn wrap_frame(main_function: u8, inner: &[u8]) -> Vec<u8> {
    let mut enc = PayloadEncoder::new();
    enc.write_u16(TRANSACTION_ID);
    enc.write_u16(PROTOCOL_ID);
    enc.write_u16((inner.len() + 2) as u16);
    enc.write_u8(UNIT_ID);
    enc.write_u8(main_function);
    let mut frame = enc.finish();
    frame.extend_from_slice(inner);
    frame
}

/// 心跳帧：采集棒定期下发 HeartbeatRequest，客户端需原样回 HeartbeatResponse，
/// 否则采集棒会断开连接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatFrame {
    pub data_adapter_serial_number: String,
    pub data_adapter_type: u8,
}

impl HeartbeatFrame {
    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        let mut dec = PayloadDecoder::new(payload);
        Ok(Self {
            data_adapter_serial_number: dec.read_string(10)?,
            data_adapter_type: dec.read_u8()?,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut enc = PayloadEncoder::new();
        enc.write_string(&self.data_adapter_serial_number, 10);
        enc.write_u8(self.data_adapter_type);
        wrap_frame(MAIN_FUNCTION_HEARTBEAT, &enc.finish())
    }

    pub fn encode_request(&self) -> Vec<u8> {
        self.encode()
    }

    /// 应答与请求同构，字段原样回显
    pub fn encode_response(&self) -> Vec<u8> {
        self.encode()
    }
}

/// 取帧后得到的完整报文
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    HeartbeatRequest(HeartbeatFrame),
    HeartbeatResponse(HeartbeatFrame),
    Request(TransparentRequest),
    Response(TransparentResponse),
}

impl Pdu {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Pdu::HeartbeatRequest(hb) => hb.encode_request(),
            Pdu::HeartbeatResponse(hb) => hb.encode_response(),
            Pdu::Request(req) => req.encode(),
            Pdu::Response(resp) => resp.encode(),
        }
    }
}
