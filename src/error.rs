// 错误类型：取帧 / PDU 解码 / 写入校验三类失败
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Transparent 帧不足 20 字节，取不到功能码
    #[error("frame too short to decode: {0} bytes")]
    FrameTooShort(usize),

    #[error("invalid frame header: {0}")]
    InvalidHeader(String),

    #[error("check code mismatch: computed {computed:#06x}, frame carries {received:#06x}")]
    CrcMismatch { computed: u16, received: u16 },

    #[error("unknown function code {0:#04x}")]
    UnknownFunction(u8),

    /// 报文正文比声明的长度短
    #[error("pdu body truncated: need {needed} more bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// 响应携带的寄存器数量与正文字节数对不上
    #[error("register count {count} inconsistent with remaining body of {bytes} bytes")]
    CountMismatch { count: u16, bytes: usize },

    #[error("unknown register name {0:?}")]
    UnknownRegister(String),

    /// 该命名寄存器没有 valid 范围，视为只读
    #[error("register {0:?} is not writable")]
    NotWritable(String),

    #[error("value {value} for {name:?} out of range [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: u16,
        min: u16,
        max: u16,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
