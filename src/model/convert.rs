// 寄存器换算：一条定义 = 裸寄存器组 + 预换算 + 后换算 + 可写范围
// 预换算把一组 u16 并成中间原语，后换算再给出语义值；valid 为 None 视为只读

use chrono::NaiveDate;

use crate::model::battery::BatteryUsbDevice;
use crate::model::inverter::{
    BatteryCalibrationStage, BatteryPowerMode, BatteryType, MeterType, Model, Status, UsbDevice,
};
use crate::model::register::{Register, RegisterCache};
use crate::model::{TimeSlot, Value};

/// 预换算：裸 u16 组 → 中间原语
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pre {
    /// 原样取单个寄存器
    Uint16,
    /// 按有符号 16 位解释
    Int16,
    /// 拆成两个字节取其一：0 = 高字节，1 = 低字节
    Duint8(u8),
    /// 两个寄存器并成 32 位：(高字, 低字)
    Uint32,
    Bool,
    /// 大端字节流按 latin-1 解码，去 NUL、转大写
    String,
    /// 两个寄存器按 HHMM 编码解释为时段
    TimeSlot,
    /// 六个寄存器：年(自 2000 偏移)/月/日/时/分/秒
    DateTime,
    /// 两个寄存器：DSP 与 ARM 固件号，渲染成面板同款格式
    FirmwareVersion,
}

/// 后换算：中间原语 → 语义值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Post {
    Raw,
    /// 千分位缩放（电芯电压等）
    Milli,
    /// 百分位缩放
    Centi,
    /// 十分位缩放
    Deci,
    /// 定宽十六进制文本
    Hex(usize),
    /// 百分位缩放后按两位小数渲染（modbus 协议版本号）
    Version,
    /// 字节值按 bool 解释（配合 Duint8）
    Bool,
    Status,
    Model,
    MeterType,
    BatteryType,
    PowerMode,
    CalibrationStage,
    UsbDevice,
    BatteryUsbDevice,
}

/// 命名属性的静态定义
#[derive(Debug, Clone, Copy)]
pub struct RegisterDef {
    pub registers: &'static [Register],
    pub pre: Pre,
    pub post: Post,
    pub valid: Option<(u16, u16)>,
}

/// 只读定义
pub const fn def(registers: &'static [Register], pre: Pre, post: Post) -> RegisterDef {
    RegisterDef {
        registers,
        pre,
        post,
        valid: None,
    }
}

/// 可写定义：写入前校验 [lo, hi]
pub const fn rw(
    registers: &'static [Register],
    pre: Pre,
    post: Post,
    lo: u16,
    hi: u16,
) -> RegisterDef {
    RegisterDef {
        registers,
        pre,
        post,
        valid: Some((lo, hi)),
    }
}

impl RegisterDef {
    /// 对着缓存执行定义。缺失的寄存器按 0 参与换算；
    /// 编码非法（无效时刻/日期）返回 None。
    pub fn resolve(&self, cache: &RegisterCache) -> Option<Value> {
        let raw: Vec<u16> = self.registers.iter().map(|&r| cache.get(r)).collect();

        let value = match self.pre {
            Pre::Uint16 => Value::U16(raw[0]),
            Pre::Int16 => Value::I16(raw[0] as i16),
            Pre::Duint8(idx) => {
                let byte = if idx == 0 { raw[0] >> 8 } else { raw[0] & 0xFF };
                Value::U16(byte)
            }
            Pre::Uint32 => Value::U32((u32::from(raw[0]) << 16) | u32::from(raw[1])),
            Pre::Bool => Value::Bool(raw[0] != 0),
            Pre::String => {
                let text: String = raw
                    .iter()
                    .flat_map(|v| v.to_be_bytes())
                    .filter(|&b| b != 0)
                    .map(|b| b as char)
                    .collect();
                Value::Text(text.to_uppercase())
            }
            Pre::TimeSlot => Value::Time(TimeSlot::from_repr(raw[0], raw[1])?),
            Pre::DateTime => {
                let date = NaiveDate::from_ymd_opt(
                    2000 + i32::from(raw[0]),
                    u32::from(raw[1]),
                    u32::from(raw[2]),
                )?;
                let time = date.and_hms_opt(
                    u32::from(raw[3]),
                    u32::from(raw[4]),
                    u32::from(raw[5]),
                )?;
                Value::DateTime(time)
            }
            Pre::FirmwareVersion => Value::Text(format!("D0.{}-A0.{}", raw[0], raw[1])),
        };

        Some(self.apply_post(value))
    }

    fn apply_post(&self, value: Value) -> Value {
        let scale = |v: &Value, k: f64| v.as_f64().map(|x| Value::F64(x / k));
        match self.post {
            Post::Raw => value,
            Post::Milli => scale(&value, 1000.0).unwrap_or(value),
            Post::Centi => scale(&value, 100.0).unwrap_or(value),
            Post::Deci => scale(&value, 10.0).unwrap_or(value),
            Post::Hex(width) => match value.as_u32() {
                Some(v) => Value::Text(format!("{:0width$x}", v, width = width)),
                None => value,
            },
            Post::Version => match value.as_u16() {
                Some(v) => Value::Text(format!("{:.2}", f64::from(v) / 100.0)),
                None => value,
            },
            Post::Bool => match value.as_u16() {
                Some(v) => Value::Bool(v != 0),
                None => value,
            },
            Post::Status => Self::enumerate(value, |v| Value::Status(Status::from_raw(v))),
            Post::Model => Self::enumerate(value, |v| Value::Model(Model::from_device_type_code(v))),
            Post::MeterType => Self::enumerate(value, |v| Value::MeterType(MeterType::from_raw(v))),
            Post::BatteryType => {
                Self::enumerate(value, |v| Value::BatteryType(BatteryType::from_raw(v)))
            }
            Post::PowerMode => {
                Self::enumerate(value, |v| Value::PowerMode(BatteryPowerMode::from_raw(v)))
            }
            Post::CalibrationStage => Self::enumerate(value, |v| {
                Value::CalibrationStage(BatteryCalibrationStage::from_raw(v))
            }),
            Post::UsbDevice => Self::enumerate(value, |v| Value::UsbDevice(UsbDevice::from_raw(v))),
            Post::BatteryUsbDevice => Self::enumerate(value, |v| {
                Value::BatteryUsbDevice(BatteryUsbDevice::from_raw(v))
            }),
        }
    }

    fn enumerate(value: Value, f: impl Fn(u16) -> Value) -> Value {
        match value.as_u16() {
            Some(v) => f(v),
            None => value,
        }
    }
}
