// 流式取帧：缓冲 TCP 字节流，按封套头长度切出完整帧再分发解码
// 单帧失败只丢该帧并继续；残帧留在缓冲区等后续字节

use log::{debug, error, warn};

use crate::error::{Error, Result};
use crate::pdu::{
    HeartbeatFrame, Pdu, TransparentRequest, TransparentResponse, FRAME_HEADER_LEN,
    MAIN_FUNCTION_HEARTBEAT, MAIN_FUNCTION_TRANSPARENT, PROTOCOL_ID, TRANSACTION_ID, UNIT_ID,
};

/// 帧长度字段的合理上限；超出视为流已错位
const MAX_FRAME_LEN: usize = 4096;

/// 会话方向：决定 0x03/0x04/0x06 等功能码按请求还是响应解码。
/// 客户端收响应，服务端收请求；抓包分析可用 Sniffer 合并两张表。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientIncoming,
    ServerIncoming,
    Sniffer,
}

/// 有状态取帧器，每条连接一个
pub struct Framer {
    direction: Direction,
    buffer: Vec<u8>,
}

impl Framer {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            buffer: Vec::new(),
        }
    }

    /// 客户端侧取帧器
    pub fn client() -> Self {
        Self::new(Direction::ClientIncoming)
    }

    /// 服务端侧取帧器
    pub fn server() -> Self {
        Self::new(Direction::ServerIncoming)
    }

    /// 缓冲中尚未构成完整帧的字节数
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// 喂入一段字节，返回其中解出的全部报文。
    /// 坏帧按等级记日志后跳过，不会中断流。
    pub fn feed(&mut self, data: &[u8]) -> Vec<Pdu> {
        self.buffer.extend_from_slice(data);
        let mut decoded = Vec::new();

        loop {
            if self.buffer.len() < FRAME_HEADER_LEN {
                break;
            }
            let tid = u16::from_be_bytes([self.buffer[0], self.buffer[1]]);
            let pid = u16::from_be_bytes([self.buffer[2], self.buffer[3]]);
            let length = usize::from(u16::from_be_bytes([self.buffer[4], self.buffer[5]]));
            let uid = self.buffer[6];
            let main_function = self.buffer[7];

            if tid != TRANSACTION_ID || pid != PROTOCOL_ID || uid != UNIT_ID {
                // 流错位：丢一个字节重新对齐
                warn!(
                    "re-syncing stream: unexpected header {:02x}{:02x}/{:02x}{:02x}/{:02x}",
                    self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3], uid
                );
                self.buffer.remove(0);
                continue;
            }
            if length < 2 || length > MAX_FRAME_LEN {
                warn!("re-syncing stream: implausible frame length {}", length);
                self.buffer.remove(0);
                continue;
            }

            let total = 6 + length;
            if self.buffer.len() < total {
                // 残帧，等更多字节
                break;
            }

            let inner: Vec<u8> = self.buffer[FRAME_HEADER_LEN..total].to_vec();
            self.buffer.drain(..total);

            match self.decode_inner(main_function, &inner) {
                Ok(pdu) => {
                    debug!("decoded {:?}", pdu);
                    decoded.push(pdu);
                }
                Err(Error::UnknownFunction(code)) => {
                    warn!("skipping frame with unknown function code {:#04x}", code);
                }
                Err(e) => {
                    error!("dropping undecodable frame: {}", e);
                }
            }
        }

        decoded
    }

    fn decode_inner(&self, main_function: u8, inner: &[u8]) -> Result<Pdu> {
        match main_function {
            MAIN_FUNCTION_HEARTBEAT => {
                let hb = HeartbeatFrame::decode(inner)?;
                // 心跳由采集棒发起，客户端收到的是请求
                Ok(match self.direction {
                    Direction::ServerIncoming => Pdu::HeartbeatResponse(hb),
                    _ => Pdu::HeartbeatRequest(hb),
                })
            }
            MAIN_FUNCTION_TRANSPARENT => match self.direction {
                Direction::ClientIncoming => {
                    Ok(Pdu::Response(TransparentResponse::decode(inner)?))
                }
                Direction::ServerIncoming => Ok(Pdu::Request(TransparentRequest::decode(inner)?)),
                Direction::Sniffer => {
                    // 先按响应解，解不动再按请求解
                    TransparentResponse::decode(inner)
                        .map(Pdu::Response)
                        .or_else(|_| TransparentRequest::decode(inner).map(Pdu::Request))
                }
            },
            other => Err(Error::UnknownFunction(other)),
        }
    }
}
