// 逆变器侧寄存器语义：枚举、命名属性查找表（可写性的单一事实来源）与只读视图
// 保持寄存器 0-123 为配置区，输入寄存器 0-59 / 180+ 为遥测区；
// 序号与换算按原厂寄存器表逐位核对，勿凭直觉改动

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::convert::{def, rw, Post, Pre, RegisterDef};
use crate::model::register::{hr, ir, Register, RegisterCache, RegisterKind};
use crate::model::{TimeSlot, Value};

/// 逆变器运行状态（IR 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Waiting,
    Normal,
    Warning,
    Fault,
    FlashingFirmware,
    Unknown(u16),
}

impl Status {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Status::Waiting,
            1 => Status::Normal,
            2 => Status::Warning,
            3 => Status::Fault,
            4 => Status::FlashingFirmware,
            other => Status::Unknown(other),
        }
    }
}

/// 机型：设备类型码（HR 0，十六进制）最高一位十六进制数字
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    Hybrid,
    Ac,
    Hybrid3ph,
    AllInOne,
    Ac3ph,
    Unknown(u16),
}

impl Model {
    pub fn from_device_type_code(code: u16) -> Self {
        match code >> 12 {
            0x2 => Model::Hybrid,
            0x3 => Model::Ac,
            0x4 => Model::Hybrid3ph,
            0x6 => Model::AllInOne,
            0x8 => Model::Ac3ph,
            _ => Model::Unknown(code),
        }
    }
}

/// 电表类型（HR 47）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterType {
    CtOrEm418,
    Em115,
    Unknown(u16),
}

impl MeterType {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => MeterType::CtOrEm418,
            1 => MeterType::Em115,
            other => MeterType::Unknown(other),
        }
    }
}

/// 电池化学类型（HR 54）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryType {
    LeadAcid,
    Lithium,
    Unknown(u16),
}

impl BatteryType {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => BatteryType::LeadAcid,
            1 => BatteryType::Lithium,
            other => BatteryType::Unknown(other),
        }
    }
}

/// 放电策略（HR 27）：0 = 满功率放电（可向电网出口），1 = 跟随负载
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryPowerMode {
    MaxPower,
    SelfConsumption,
    Unknown(u16),
}

impl BatteryPowerMode {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => BatteryPowerMode::MaxPower,
            1 => BatteryPowerMode::SelfConsumption,
            other => BatteryPowerMode::Unknown(other),
        }
    }
}

/// SOC 标定流程所处阶段（HR 29）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryCalibrationStage {
    Off,
    Discharge,
    SetLowerLimit,
    Charge,
    SetUpperLimit,
    Unknown(u16),
}

impl BatteryCalibrationStage {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => BatteryCalibrationStage::Off,
            1 => BatteryCalibrationStage::Discharge,
            2 => BatteryCalibrationStage::SetLowerLimit,
            3 => BatteryCalibrationStage::Charge,
            4 => BatteryCalibrationStage::SetUpperLimit,
            other => BatteryCalibrationStage::Unknown(other),
        }
    }
}

/// USB 口插入的设备（HR 22）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsbDevice {
    None,
    Wifi,
    Disk,
    Unknown(u16),
}

impl UsbDevice {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => UsbDevice::None,
            1 => UsbDevice::Wifi,
            2 => UsbDevice::Disk,
            other => UsbDevice::Unknown(other),
        }
    }
}

/// 逆变器命名属性表。每条：名字 → (寄存器组, 预换算, 后换算, 可写范围)。
/// valid 存在才允许写入；时段写入走 `<name>_start` / `<name>_end` 成对寄存器。
pub static INVERTER_REGISTERS: &[(&str, RegisterDef)] = &[
    // 铭牌与版本
    ("device_type_code", def(&[hr(0)], Pre::Uint16, Post::Hex(4))),
    ("model", def(&[hr(0)], Pre::Uint16, Post::Model)),
    ("module", def(&[hr(1), hr(2)], Pre::Uint32, Post::Hex(8))),
    ("num_mppt", def(&[hr(3)], Pre::Duint8(0), Post::Raw)),
    ("num_phases", def(&[hr(3)], Pre::Duint8(1), Post::Raw)),
    ("enable_ammeter", def(&[hr(7)], Pre::Bool, Post::Raw)),
    (
        "first_battery_serial_number",
        def(&[hr(8), hr(9), hr(10), hr(11), hr(12)], Pre::String, Post::Raw),
    ),
    (
        "serial_number",
        def(&[hr(13), hr(14), hr(15), hr(16), hr(17)], Pre::String, Post::Raw),
    ),
    (
        "first_battery_bms_firmware_version",
        def(&[hr(18)], Pre::Uint16, Post::Raw),
    ),
    ("dsp_firmware_version", def(&[hr(19)], Pre::Uint16, Post::Raw)),
    (
        "enable_charge_target",
        rw(&[hr(20)], Pre::Bool, Post::Raw, 0, 1),
    ),
    ("arm_firmware_version", def(&[hr(21)], Pre::Uint16, Post::Raw)),
    (
        "firmware_version",
        def(&[hr(19), hr(21)], Pre::FirmwareVersion, Post::Raw),
    ),
    ("usb_device_inserted", def(&[hr(22)], Pre::Uint16, Post::UsbDevice)),
    ("select_arm_chip", def(&[hr(23)], Pre::Bool, Post::Raw)),
    ("variable_address", def(&[hr(24)], Pre::Uint16, Post::Raw)),
    ("variable_value", rw(&[hr(25)], Pre::Uint16, Post::Raw, 0, 65535)),
    (
        "grid_port_max_power_output",
        def(&[hr(26)], Pre::Uint16, Post::Raw),
    ),
    (
        "battery_power_mode",
        rw(&[hr(27)], Pre::Uint16, Post::PowerMode, 0, 1),
    ),
    ("enable_60hz_freq_mode", def(&[hr(28)], Pre::Bool, Post::Raw)),
    (
        "battery_calibration_stage",
        rw(&[hr(29)], Pre::Uint16, Post::CalibrationStage, 0, 10),
    ),
    ("modbus_address", def(&[hr(30)], Pre::Uint16, Post::Raw)),
    ("charge_slot_2", def(&[hr(31), hr(32)], Pre::TimeSlot, Post::Raw)),
    ("charge_slot_2_start", rw(&[hr(31)], Pre::Uint16, Post::Raw, 0, 2359)),
    ("charge_slot_2_end", rw(&[hr(32)], Pre::Uint16, Post::Raw, 0, 2359)),
    ("user_code", def(&[hr(33)], Pre::Uint16, Post::Raw)),
    ("modbus_version", def(&[hr(34)], Pre::Uint16, Post::Version)),
    (
        "system_time",
        def(
            &[hr(35), hr(36), hr(37), hr(38), hr(39), hr(40)],
            Pre::DateTime,
            Post::Raw,
        ),
    ),
    // 年按 2000 偏移存储
    ("system_time_year", rw(&[hr(35)], Pre::Uint16, Post::Raw, 0, 255)),
    ("system_time_month", rw(&[hr(36)], Pre::Uint16, Post::Raw, 1, 12)),
    ("system_time_day", rw(&[hr(37)], Pre::Uint16, Post::Raw, 1, 31)),
    ("system_time_hour", rw(&[hr(38)], Pre::Uint16, Post::Raw, 0, 23)),
    ("system_time_minute", rw(&[hr(39)], Pre::Uint16, Post::Raw, 0, 59)),
    ("system_time_second", rw(&[hr(40)], Pre::Uint16, Post::Raw, 0, 59)),
    ("enable_drm_rj45_port", def(&[hr(41)], Pre::Bool, Post::Raw)),
    ("enable_reversed_ct_clamp", def(&[hr(42)], Pre::Bool, Post::Raw)),
    ("charge_soc", def(&[hr(43)], Pre::Duint8(0), Post::Raw)),
    ("discharge_soc", def(&[hr(43)], Pre::Duint8(1), Post::Raw)),
    (
        "discharge_slot_2",
        def(&[hr(44), hr(45)], Pre::TimeSlot, Post::Raw),
    ),
    ("discharge_slot_2_start", rw(&[hr(44)], Pre::Uint16, Post::Raw, 0, 2359)),
    ("discharge_slot_2_end", rw(&[hr(45)], Pre::Uint16, Post::Raw, 0, 2359)),
    ("bms_firmware_version", def(&[hr(46)], Pre::Uint16, Post::Raw)),
    ("meter_type", def(&[hr(47)], Pre::Uint16, Post::MeterType)),
    ("enable_reversed_115_meter", def(&[hr(48)], Pre::Bool, Post::Raw)),
    ("enable_reversed_418_meter", def(&[hr(49)], Pre::Bool, Post::Raw)),
    ("active_power_rate", rw(&[hr(50)], Pre::Uint16, Post::Raw, 0, 100)),
    ("reactive_power_rate", rw(&[hr(51)], Pre::Uint16, Post::Raw, 0, 100)),
    ("power_factor", def(&[hr(52)], Pre::Uint16, Post::Raw)),
    (
        "enable_inverter_auto_restart",
        def(&[hr(53)], Pre::Duint8(0), Post::Bool),
    ),
    ("enable_inverter", def(&[hr(53)], Pre::Duint8(1), Post::Bool)),
    ("battery_type", def(&[hr(54)], Pre::Uint16, Post::BatteryType)),
    ("battery_capacity", def(&[hr(55)], Pre::Uint16, Post::Raw)),
    (
        "discharge_slot_1",
        def(&[hr(56), hr(57)], Pre::TimeSlot, Post::Raw),
    ),
    ("discharge_slot_1_start", rw(&[hr(56)], Pre::Uint16, Post::Raw, 0, 2359)),
    ("discharge_slot_1_end", rw(&[hr(57)], Pre::Uint16, Post::Raw, 0, 2359)),
    (
        "enable_auto_judge_battery_type",
        def(&[hr(58)], Pre::Bool, Post::Raw),
    ),
    ("enable_discharge", rw(&[hr(59)], Pre::Bool, Post::Raw, 0, 1)),
    // 保护参数区
    ("pv_start_voltage", def(&[hr(60)], Pre::Uint16, Post::Deci)),
    ("start_countdown_timer", def(&[hr(61)], Pre::Uint16, Post::Raw)),
    ("restart_delay_time", def(&[hr(62)], Pre::Uint16, Post::Raw)),
    ("v_ac_low_out", def(&[hr(63)], Pre::Uint16, Post::Deci)),
    ("v_ac_high_out", def(&[hr(64)], Pre::Uint16, Post::Deci)),
    ("f_ac_low_out", def(&[hr(65)], Pre::Uint16, Post::Centi)),
    ("f_ac_high_out", def(&[hr(66)], Pre::Uint16, Post::Centi)),
    ("v_ac_low_out_time", def(&[hr(67)], Pre::Uint16, Post::Raw)),
    ("v_ac_high_out_time", def(&[hr(68)], Pre::Uint16, Post::Raw)),
    ("f_ac_low_out_time", def(&[hr(69)], Pre::Uint16, Post::Raw)),
    ("f_ac_high_out_time", def(&[hr(70)], Pre::Uint16, Post::Raw)),
    ("v_ac_low_in", def(&[hr(71)], Pre::Uint16, Post::Deci)),
    ("v_ac_high_in", def(&[hr(72)], Pre::Uint16, Post::Deci)),
    ("f_ac_low_in", def(&[hr(73)], Pre::Uint16, Post::Centi)),
    ("f_ac_high_in", def(&[hr(74)], Pre::Uint16, Post::Centi)),
    ("v_ac_low_in_time", def(&[hr(75)], Pre::Uint16, Post::Raw)),
    ("v_ac_high_in_time", def(&[hr(76)], Pre::Uint16, Post::Raw)),
    ("f_ac_low_in_time", def(&[hr(77)], Pre::Uint16, Post::Raw)),
    ("f_ac_high_in_time", def(&[hr(78)], Pre::Uint16, Post::Raw)),
    ("v_ac_low_c", def(&[hr(79)], Pre::Uint16, Post::Deci)),
    ("v_ac_high_c", def(&[hr(80)], Pre::Uint16, Post::Deci)),
    ("f_ac_low_c", def(&[hr(81)], Pre::Uint16, Post::Centi)),
    ("f_ac_high_c", def(&[hr(82)], Pre::Uint16, Post::Centi)),
    ("v_10_min_protection", def(&[hr(83)], Pre::Uint16, Post::Deci)),
    ("iso1", def(&[hr(84)], Pre::Uint16, Post::Raw)),
    ("iso2", def(&[hr(85)], Pre::Uint16, Post::Raw)),
    ("gfci_1_i", def(&[hr(86)], Pre::Uint16, Post::Centi)),
    ("gfci_1_time", def(&[hr(87)], Pre::Uint16, Post::Raw)),
    ("gfci_2_i", def(&[hr(88)], Pre::Uint16, Post::Centi)),
    ("gfci_2_time", def(&[hr(89)], Pre::Uint16, Post::Raw)),
    ("dci_1_i", def(&[hr(90)], Pre::Uint16, Post::Centi)),
    ("dci_1_time", def(&[hr(91)], Pre::Uint16, Post::Raw)),
    ("dci_2_i", def(&[hr(92)], Pre::Uint16, Post::Centi)),
    ("dci_2_time", def(&[hr(93)], Pre::Uint16, Post::Raw)),
    // 充放电配置
    ("charge_slot_1", def(&[hr(94), hr(95)], Pre::TimeSlot, Post::Raw)),
    ("charge_slot_1_start", rw(&[hr(94)], Pre::Uint16, Post::Raw, 0, 2359)),
    ("charge_slot_1_end", rw(&[hr(95)], Pre::Uint16, Post::Raw, 0, 2359)),
    ("enable_charge", rw(&[hr(96)], Pre::Bool, Post::Raw, 0, 1)),
    (
        "battery_low_voltage_protection_limit",
        def(&[hr(97)], Pre::Uint16, Post::Centi),
    ),
    (
        "battery_high_voltage_protection_limit",
        def(&[hr(98)], Pre::Uint16, Post::Centi),
    ),
    (
        "battery_low_force_charge_time",
        def(&[hr(108)], Pre::Uint16, Post::Raw),
    ),
    ("enable_bms_read", rw(&[hr(109)], Pre::Bool, Post::Raw, 0, 1)),
    ("battery_soc_reserve", rw(&[hr(110)], Pre::Uint16, Post::Raw, 4, 100)),
    ("battery_charge_limit", rw(&[hr(111)], Pre::Uint16, Post::Raw, 0, 50)),
    ("battery_discharge_limit", rw(&[hr(112)], Pre::Uint16, Post::Raw, 0, 50)),
    ("enable_buzzer", rw(&[hr(113)], Pre::Bool, Post::Raw, 0, 1)),
    (
        "battery_discharge_min_power_reserve",
        rw(&[hr(114)], Pre::Uint16, Post::Raw, 4, 100),
    ),
    ("island_check_continue", def(&[hr(115)], Pre::Uint16, Post::Raw)),
    ("charge_target_soc", rw(&[hr(116)], Pre::Uint16, Post::Raw, 4, 100)),
    ("charge_soc_stop_2", def(&[hr(117)], Pre::Uint16, Post::Raw)),
    ("discharge_soc_stop_2", def(&[hr(118)], Pre::Uint16, Post::Raw)),
    ("charge_soc_stop_1", def(&[hr(119)], Pre::Uint16, Post::Raw)),
    ("discharge_soc_stop_1", def(&[hr(120)], Pre::Uint16, Post::Raw)),
    ("local_command_test", def(&[hr(121)], Pre::Bool, Post::Raw)),
    (
        "power_factor_function_model",
        def(&[hr(122)], Pre::Uint16, Post::Raw),
    ),
    (
        "frequency_load_limit_rate",
        def(&[hr(123)], Pre::Uint16, Post::Raw),
    ),
    (
        "enable_low_voltage_fault_ride_through",
        def(&[hr(124)], Pre::Bool, Post::Raw),
    ),
    ("enable_frequency_derating", def(&[hr(125)], Pre::Bool, Post::Raw)),
    ("enable_above_6kw_system", def(&[hr(126)], Pre::Bool, Post::Raw)),
    ("start_system_auto_test", def(&[hr(127)], Pre::Bool, Post::Raw)),
    ("enable_spi", def(&[hr(128)], Pre::Bool, Post::Raw)),
    ("pf_cmd_memory_state", def(&[hr(129)], Pre::Bool, Post::Raw)),
    ("battery_pause_mode", rw(&[hr(318)], Pre::Uint16, Post::Raw, 0, 3)),
    // 遥测区
    ("status", def(&[ir(0)], Pre::Uint16, Post::Status)),
    ("v_pv1", def(&[ir(1)], Pre::Uint16, Post::Deci)),
    ("v_pv2", def(&[ir(2)], Pre::Uint16, Post::Deci)),
    ("v_p_bus", def(&[ir(3)], Pre::Uint16, Post::Deci)),
    ("v_n_bus", def(&[ir(4)], Pre::Uint16, Post::Deci)),
    ("v_ac1", def(&[ir(5)], Pre::Uint16, Post::Deci)),
    (
        "e_battery_throughput_total",
        def(&[ir(6), ir(7)], Pre::Uint32, Post::Deci),
    ),
    ("i_pv1", def(&[ir(8)], Pre::Uint16, Post::Centi)),
    ("i_pv2", def(&[ir(9)], Pre::Uint16, Post::Centi)),
    ("i_ac1", def(&[ir(10)], Pre::Uint16, Post::Centi)),
    ("e_pv_total", def(&[ir(11), ir(12)], Pre::Uint32, Post::Deci)),
    ("f_ac1", def(&[ir(13)], Pre::Uint16, Post::Centi)),
    ("charge_status", def(&[ir(14)], Pre::Uint16, Post::Raw)),
    ("v_highbrigh_bus", def(&[ir(15)], Pre::Uint16, Post::Raw)),
    ("e_pv1_day", def(&[ir(17)], Pre::Uint16, Post::Deci)),
    ("p_pv1", def(&[ir(18)], Pre::Uint16, Post::Raw)),
    ("e_pv2_day", def(&[ir(19)], Pre::Uint16, Post::Deci)),
    ("p_pv2", def(&[ir(20)], Pre::Uint16, Post::Raw)),
    ("e_grid_out_total", def(&[ir(21), ir(22)], Pre::Uint32, Post::Deci)),
    ("e_solar_diverter", def(&[ir(23)], Pre::Uint16, Post::Deci)),
    ("p_inverter_out", def(&[ir(24)], Pre::Int16, Post::Raw)),
    ("e_grid_out_day", def(&[ir(25)], Pre::Uint16, Post::Deci)),
    ("e_grid_in_day", def(&[ir(26)], Pre::Uint16, Post::Deci)),
    (
        "e_inverter_in_total",
        def(&[ir(27), ir(28)], Pre::Uint32, Post::Deci),
    ),
    ("e_discharge_year", def(&[ir(29)], Pre::Uint16, Post::Deci)),
    ("p_grid_out", def(&[ir(30)], Pre::Int16, Post::Raw)),
    ("p_eps_backup", def(&[ir(31)], Pre::Uint16, Post::Raw)),
    ("e_grid_in_total", def(&[ir(32), ir(33)], Pre::Uint32, Post::Deci)),
    ("e_inverter_in_day", def(&[ir(35)], Pre::Uint16, Post::Deci)),
    ("e_battery_charge_day", def(&[ir(36)], Pre::Uint16, Post::Deci)),
    ("e_battery_discharge_day", def(&[ir(37)], Pre::Uint16, Post::Deci)),
    ("temp_inverter_heatsink", def(&[ir(41)], Pre::Uint16, Post::Deci)),
    ("p_load_demand", def(&[ir(42)], Pre::Uint16, Post::Raw)),
    ("p_grid_apparent", def(&[ir(43)], Pre::Uint16, Post::Raw)),
    ("e_inverter_out_day", def(&[ir(44)], Pre::Uint16, Post::Deci)),
    (
        "e_inverter_out_total",
        def(&[ir(45), ir(46)], Pre::Uint32, Post::Deci),
    ),
    ("work_time_total", def(&[ir(47), ir(48)], Pre::Uint32, Post::Raw)),
    ("system_mode", def(&[ir(49)], Pre::Uint16, Post::Raw)),
    ("v_battery", def(&[ir(50)], Pre::Uint16, Post::Centi)),
    ("i_battery", def(&[ir(51)], Pre::Uint16, Post::Centi)),
    ("p_battery", def(&[ir(52)], Pre::Int16, Post::Raw)),
    ("v_eps_backup", def(&[ir(53)], Pre::Uint16, Post::Deci)),
    ("f_eps_backup", def(&[ir(54)], Pre::Uint16, Post::Centi)),
    ("temp_charger", def(&[ir(55)], Pre::Uint16, Post::Deci)),
    ("temp_battery", def(&[ir(56)], Pre::Uint16, Post::Deci)),
    ("charger_warning_code", def(&[ir(57)], Pre::Uint16, Post::Raw)),
    ("i_grid_port", def(&[ir(58)], Pre::Uint16, Post::Centi)),
    ("battery_percent", def(&[ir(59)], Pre::Uint16, Post::Raw)),
    (
        "e_battery_discharge_total",
        def(&[ir(180)], Pre::Uint16, Post::Deci),
    ),
    ("e_battery_charge_total", def(&[ir(181)], Pre::Uint16, Post::Deci)),
    (
        "e_battery_discharge_day_2",
        def(&[ir(182)], Pre::Uint16, Post::Deci),
    ),
    ("e_battery_charge_day_2", def(&[ir(183)], Pre::Uint16, Post::Deci)),
];

/// 查逆变器属性定义
pub fn lookup(name: &str) -> Option<&'static RegisterDef> {
    INVERTER_REGISTERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| d)
}

/// 写入前置检查：命名寄存器必须可写、值必须落在 valid 范围内，
/// 通过后给出保持寄存器序号。任何失败都发生在构造请求之前。
pub fn lookup_writable_register(name: &str, value: u16) -> Result<u16> {
    let def = lookup(name).ok_or_else(|| Error::UnknownRegister(name.to_string()))?;
    let (min, max) = def.valid.ok_or_else(|| Error::NotWritable(name.to_string()))?;
    if value < min || value > max {
        return Err(Error::OutOfRange {
            name: name.to_string(),
            value,
            min,
            max,
        });
    }
    match def.registers {
        [Register {
            kind: RegisterKind::Holding,
            index,
        }] => Ok(*index),
        _ => Err(Error::NotWritable(name.to_string())),
    }
}

/// 逆变器只读视图：按名字对着缓存现场换算
#[derive(Debug, Clone, Copy)]
pub struct Inverter<'a> {
    cache: &'a RegisterCache,
}

impl<'a> Inverter<'a> {
    pub fn new(cache: &'a RegisterCache) -> Self {
        Self { cache }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        lookup(name)?.resolve(self.cache)
    }

    pub fn serial_number(&self) -> String {
        self.get("serial_number")
            .and_then(|v| v.as_text())
            .unwrap_or_default()
    }

    pub fn first_battery_serial_number(&self) -> String {
        self.get("first_battery_serial_number")
            .and_then(|v| v.as_text())
            .unwrap_or_default()
    }

    pub fn model(&self) -> Model {
        match self.get("model") {
            Some(Value::Model(m)) => m,
            _ => Model::Unknown(0),
        }
    }

    pub fn status(&self) -> Status {
        match self.get("status") {
            Some(Value::Status(s)) => s,
            _ => Status::Unknown(0),
        }
    }

    pub fn firmware_version(&self) -> String {
        self.get("firmware_version")
            .and_then(|v| v.as_text())
            .unwrap_or_default()
    }

    pub fn system_time(&self) -> Option<NaiveDateTime> {
        self.get("system_time").and_then(|v| v.as_datetime())
    }

    pub fn charge_slot_1(&self) -> Option<TimeSlot> {
        self.get("charge_slot_1").and_then(|v| v.as_timeslot())
    }

    pub fn charge_slot_2(&self) -> Option<TimeSlot> {
        self.get("charge_slot_2").and_then(|v| v.as_timeslot())
    }

    pub fn discharge_slot_1(&self) -> Option<TimeSlot> {
        self.get("discharge_slot_1").and_then(|v| v.as_timeslot())
    }

    pub fn discharge_slot_2(&self) -> Option<TimeSlot> {
        self.get("discharge_slot_2").and_then(|v| v.as_timeslot())
    }

    pub fn battery_power_mode(&self) -> BatteryPowerMode {
        match self.get("battery_power_mode") {
            Some(Value::PowerMode(m)) => m,
            _ => BatteryPowerMode::Unknown(0),
        }
    }

    fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn word(&self, name: &str) -> u16 {
        self.get(name).and_then(|v| v.as_u16()).unwrap_or(0)
    }

    pub fn enable_charge(&self) -> bool {
        self.flag("enable_charge")
    }

    pub fn enable_charge_target(&self) -> bool {
        self.flag("enable_charge_target")
    }

    pub fn enable_discharge(&self) -> bool {
        self.flag("enable_discharge")
    }

    pub fn charge_target_soc(&self) -> u16 {
        self.word("charge_target_soc")
    }

    pub fn battery_soc_reserve(&self) -> u16 {
        self.word("battery_soc_reserve")
    }

    pub fn battery_percent(&self) -> u16 {
        self.word("battery_percent")
    }

    pub fn p_battery(&self) -> i16 {
        self.get("p_battery").and_then(|v| v.as_i16()).unwrap_or(0)
    }

    pub fn p_grid_out(&self) -> i16 {
        self.get("p_grid_out").and_then(|v| v.as_i16()).unwrap_or(0)
    }

    pub fn p_load_demand(&self) -> u16 {
        self.word("p_load_demand")
    }

    pub fn v_battery(&self) -> f64 {
        self.get("v_battery").and_then(|v| v.as_f64()).unwrap_or(0.0)
    }

    pub fn e_pv_total(&self) -> f64 {
        self.get("e_pv_total").and_then(|v| v.as_f64()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::register::hr;

    /// 原厂设备导出的保持寄存器 0..60 实录
    const HOLDING_BLOCK: [u16; 60] = [
        8193, 3, 2098, 513, 0, 50000, 3600, 1, 16967, 12594, //
        13108, 18229, 13879, 21313, 12594, 13108, 18229, 13879, 3005, 449, //
        1, 449, 2, 0, 32768, 30235, 6000, 1, 0, 0, //
        17, 0, 4, 7, 140, 22, 4, 27, 23, 29, //
        18, 1, 2, 0, 0, 0, 101, 1, 0, 0, //
        100, 0, 0, 1, 1, 160, 0, 0, 1, 0,
    ];

    fn holding_cache() -> RegisterCache {
        let mut cache = RegisterCache::new();
        cache.update(
            HOLDING_BLOCK
                .iter()
                .enumerate()
                .map(|(i, &v)| (hr(i as u16), v)),
        );
        // 充电时段与目标 SOC 落在 90..120 区
        cache.update([
            (hr(94), 30),
            (hr(95), 430),
            (hr(96), 1),
            (hr(110), 4),
            (hr(111), 50),
            (hr(112), 50),
            (hr(114), 4),
            (hr(116), 100),
        ]);
        cache
    }

    #[test]
    fn nameplate_attributes() {
        let cache = holding_cache();
        let inv = Inverter::new(&cache);
        assert_eq!(inv.serial_number(), "SA1234G567");
        assert_eq!(inv.first_battery_serial_number(), "BG1234G567");
        assert_eq!(
            inv.get("device_type_code"),
            Some(Value::Text("2001".to_string()))
        );
        assert_eq!(inv.model(), Model::Hybrid);
        assert_eq!(inv.get("module"), Some(Value::Text("00030832".to_string())));
        assert_eq!(inv.get("num_mppt"), Some(Value::U16(2)));
        assert_eq!(inv.get("num_phases"), Some(Value::U16(1)));
        assert_eq!(inv.firmware_version(), "D0.449-A0.449");
        assert_eq!(
            inv.get("modbus_version"),
            Some(Value::Text("1.40".to_string()))
        );
        assert_eq!(inv.get("modbus_address"), Some(Value::U16(0x11)));
    }

    #[test]
    fn flags_and_enums() {
        let cache = holding_cache();
        let inv = Inverter::new(&cache);
        assert!(inv.get("enable_ammeter").unwrap().as_bool().unwrap());
        assert_eq!(
            inv.get("meter_type"),
            Some(Value::MeterType(MeterType::Em115))
        );
        assert_eq!(
            inv.get("battery_type"),
            Some(Value::BatteryType(BatteryType::Lithium))
        );
        assert_eq!(inv.battery_power_mode(), BatteryPowerMode::SelfConsumption);
        assert_eq!(
            inv.get("usb_device_inserted"),
            Some(Value::UsbDevice(UsbDevice::Disk))
        );
        // HR 53 = 0x0001：高字节自动重启关，低字节逆变器使能
        assert_eq!(
            inv.get("enable_inverter_auto_restart"),
            Some(Value::Bool(false))
        );
        assert_eq!(inv.get("enable_inverter"), Some(Value::Bool(true)));
        assert_eq!(inv.get("battery_capacity"), Some(Value::U16(160)));
    }

    #[test]
    fn slots_and_time() {
        let cache = holding_cache();
        let inv = Inverter::new(&cache);
        assert_eq!(inv.charge_slot_1(), TimeSlot::from_repr(30, 430));
        assert_eq!(inv.charge_slot_2(), TimeSlot::from_repr(0, 4));
        assert_eq!(inv.discharge_slot_1(), TimeSlot::from_repr(0, 0));
        let st = inv.system_time().unwrap();
        assert_eq!(st.to_string(), "2022-04-27 23:29:18");
        assert_eq!(inv.charge_target_soc(), 100);
        assert_eq!(inv.battery_soc_reserve(), 4);
    }

    #[test]
    fn unknown_enum_values_are_preserved() {
        let cache = RegisterCache::from_entries([(hr(47), 9), (hr(54), 7)]);
        let inv = Inverter::new(&cache);
        assert_eq!(
            inv.get("meter_type"),
            Some(Value::MeterType(MeterType::Unknown(9)))
        );
        assert_eq!(
            inv.get("battery_type"),
            Some(Value::BatteryType(BatteryType::Unknown(7)))
        );
        assert_eq!(Status::from_raw(17), Status::Unknown(17));
    }

    #[test]
    fn writable_lookup_enforces_range() {
        assert_eq!(lookup_writable_register("charge_target_soc", 65).unwrap(), 116);
        assert_eq!(lookup_writable_register("charge_target_soc", 4).unwrap(), 116);
        assert_eq!(lookup_writable_register("charge_target_soc", 100).unwrap(), 116);
        assert_eq!(lookup_writable_register("battery_soc_reserve", 4).unwrap(), 110);
        assert_eq!(lookup_writable_register("enable_charge", 1).unwrap(), 96);

        match lookup_writable_register("charge_target_soc", 3) {
            Err(Error::OutOfRange { min: 4, max: 100, value: 3, .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
        match lookup_writable_register("serial_number", 1) {
            Err(Error::NotWritable(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        match lookup_writable_register("no_such_register", 1) {
            Err(Error::UnknownRegister(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        // 时段组合属性本身不可直接写，要走 _start/_end
        match lookup_writable_register("charge_slot_1", 30) {
            Err(Error::NotWritable(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn telemetry_decoding() {
        let mut cache = RegisterCache::new();
        cache.update([
            (ir(0), 1),
            (ir(1), 180),
            (ir(13), 5006),
            (ir(24), 921),
            (ir(30), 65497),
            (ir(50), 5128),
            (ir(52), 1075),
            (ir(59), 57),
            (ir(11), 0),
            (ir(12), 11929),
        ]);
        let inv = Inverter::new(&cache);
        assert_eq!(inv.status(), Status::Normal);
        assert_eq!(inv.get("v_pv1"), Some(Value::F64(18.0)));
        assert_eq!(inv.get("f_ac1"), Some(Value::F64(50.06)));
        assert_eq!(inv.get("p_inverter_out"), Some(Value::I16(921)));
        assert_eq!(inv.p_grid_out(), -39);
        assert_eq!(inv.v_battery(), 51.28);
        assert_eq!(inv.p_battery(), 1075);
        assert_eq!(inv.battery_percent(), 57);
        assert_eq!(inv.e_pv_total(), 1192.9);
    }
}
