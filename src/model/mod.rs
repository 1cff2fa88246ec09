// 数据模型：时段/属性值等基础类型，寄存器查找表与 Plant 状态机
pub mod battery;
pub mod convert;
pub mod inverter;
pub mod plant;
pub mod register;

use std::fmt;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::model::battery::BatteryUsbDevice;
use crate::model::inverter::{
    BatteryCalibrationStage, BatteryPowerMode, BatteryType, MeterType, Model, Status, UsbDevice,
};

/// 充/放电时段。线上每端占一个保持寄存器，按 HHMM 十进制编码
/// （例如 0430 = 04:30）。start == end 表示空时段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn from_components(
        start_hour: u32,
        start_minute: u32,
        end_hour: u32,
        end_minute: u32,
    ) -> Option<Self> {
        Some(Self {
            start: NaiveTime::from_hms_opt(start_hour, start_minute, 0)?,
            end: NaiveTime::from_hms_opt(end_hour, end_minute, 0)?,
        })
    }

    /// 从寄存器编码恢复；小时/分钟越界返回 None
    pub fn from_repr(start: u16, end: u16) -> Option<Self> {
        Self::from_components(
            u32::from(start / 100),
            u32::from(start % 100),
            u32::from(end / 100),
            u32::from(end % 100),
        )
    }

    pub fn start_repr(&self) -> u16 {
        (self.start.hour() * 100 + self.start.minute()) as u16
    }

    pub fn end_repr(&self) -> u16 {
        (self.end.hour() * 100 + self.end.minute()) as u16
    }

    /// t 是否落在时段内。end < start 表示跨午夜时段
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start == self.end {
            return false;
        }
        if self.start < self.end {
            self.start <= t && t < self.end
        } else {
            !(self.end <= t && t < self.start)
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// 按名字解析寄存器得到的属性值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U16(u16),
    I16(i16),
    U32(u32),
    F64(f64),
    Bool(bool),
    Text(String),
    Time(TimeSlot),
    DateTime(NaiveDateTime),
    Status(Status),
    Model(Model),
    MeterType(MeterType),
    BatteryType(BatteryType),
    PowerMode(BatteryPowerMode),
    CalibrationStage(BatteryCalibrationStage),
    UsbDevice(UsbDevice),
    BatteryUsbDevice(BatteryUsbDevice),
}

impl Value {
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Value::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Value::I16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            Value::U16(v) => Some(u32::from(*v)),
            _ => None,
        }
    }

    /// 数值类型统一提升为 f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::U16(v) => Some(f64::from(*v)),
            Value::I16(v) => Some(f64::from(*v)),
            Value::U32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn as_timeslot(&self) -> Option<TimeSlot> {
        match self {
            Value::Time(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U16(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Status(v) => write!(f, "{:?}", v),
            Value::Model(v) => write!(f, "{:?}", v),
            Value::MeterType(v) => write!(f, "{:?}", v),
            Value::BatteryType(v) => write!(f, "{:?}", v),
            Value::PowerMode(v) => write!(f, "{:?}", v),
            Value::CalibrationStage(v) => write!(f, "{:?}", v),
            Value::UsbDevice(v) => write!(f, "{:?}", v),
            Value::BatteryUsbDevice(v) => write!(f, "{:?}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn timeslot_repr_round_trip() {
        let slot = TimeSlot::from_repr(30, 430).unwrap();
        assert_eq!(slot.start, t(0, 30));
        assert_eq!(slot.end, t(4, 30));
        assert_eq!(slot.start_repr(), 30);
        assert_eq!(slot.end_repr(), 430);
        assert_eq!(slot.to_string(), "00:30-04:30");

        // 小时或分钟越界不可表示
        assert!(TimeSlot::from_repr(2400, 0).is_none());
        assert!(TimeSlot::from_repr(1299, 0).is_none());
    }

    #[test]
    fn empty_slot_contains_nothing() {
        let slot = TimeSlot::from_repr(0, 0).unwrap();
        assert!(!slot.contains(t(0, 0)));
        assert!(!slot.contains(t(12, 0)));
    }

    #[test]
    fn daytime_slot_is_half_open() {
        let slot = TimeSlot::from_repr(930, 1700).unwrap();
        assert!(slot.contains(t(9, 30)));
        assert!(slot.contains(t(12, 0)));
        assert!(!slot.contains(t(17, 0)));
        assert!(!slot.contains(t(9, 29)));
    }

    #[test]
    fn slot_spanning_midnight() {
        // 16:00 起放电到次日 07:00
        let slot = TimeSlot::from_repr(1600, 700).unwrap();
        assert!(slot.contains(t(16, 0)));
        assert!(slot.contains(t(23, 59)));
        assert!(slot.contains(t(0, 0)));
        assert!(slot.contains(t(6, 59)));
        assert!(!slot.contains(t(7, 0)));
        assert!(!slot.contains(t(12, 0)));
    }
}
