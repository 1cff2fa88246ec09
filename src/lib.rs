//! GivEnergy 逆变器 / 电池的 Transparent Modbus over TCP 客户端库。
//!
//! 采集棒把标准 Modbus 报文裹进厂商封套后经 TCP（默认 8899 端口）广播；
//! 本库负责从字节流里取帧解码（[`framer`]、[`pdu`]），把响应合并进
//! 按从机地址分片的寄存器镜像（[`model::plant`]），再通过命名属性表
//! 提供带换算的读视图与带校验的写命令（[`model::inverter`]、[`commands`]）。
//!
//! 核心部分（取帧、缓存、Plant）是单线程同步代码，由持有者串行驱动；
//! [`client`] 提供基于 tokio 的连接封装。

pub mod client;
pub mod codec;
pub mod commands;
pub mod error;
pub mod framer;
pub mod model;
pub mod pdu;

pub use error::{Error, Result};
pub use framer::{Direction, Framer};
pub use model::plant::Plant;
pub use model::TimeSlot;
pub use pdu::{Pdu, TransparentRequest, TransparentResponse};
