// 命令构造：把高层意图翻译成按序发送的写寄存器请求列表
// 纯函数，不做 IO；名字经查找表解析并做范围校验，不合法的值在出请求之前就被拒绝。
// 列表内的请求必须按给定顺序发送；协议不保证跨请求的原子性。

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::{Error, Result};
use crate::model::inverter::lookup_writable_register;
use crate::model::TimeSlot;
use crate::pdu::TransparentRequest;

/// 每次块读的寄存器数
const BLOCK_SIZE: u16 = 60;

/// 刷新数据：按上限挑出要读的块。
/// 参数是各类的最大基址；只要某类不需要可传负数。
pub fn refresh_plant_data(
    max_holding: i32,
    max_input: i32,
    max_battery_input: i32,
    num_batteries: usize,
) -> Vec<TransparentRequest> {
    let mut requests = Vec::new();

    for base in [0, 180] {
        if base <= max_input {
            requests.push(TransparentRequest::read_input_registers(
                base as u16,
                BLOCK_SIZE,
            ));
        }
    }
    for base in [0, 60, 120, 180, 300] {
        if base <= max_holding {
            requests.push(TransparentRequest::read_holding_registers(
                base as u16,
                BLOCK_SIZE,
            ));
        }
    }
    for battery in 0..num_batteries {
        for base in [60, 120] {
            if base <= max_battery_input {
                requests.push(
                    TransparentRequest::read_input_registers(base as u16, BLOCK_SIZE)
                        .with_slave_address(0x32 + battery as u8),
                );
            }
        }
    }
    requests
}

/// 按名字写保持寄存器，范围校验自动完成
pub fn write_named_register(name: &str, value: u16) -> Result<TransparentRequest> {
    let index = lookup_writable_register(name, value)?;
    Ok(TransparentRequest::write_holding_register(index, value))
}

/// 允许电池充电（具体行为还受模式与时段约束）
pub fn set_enable_charge(enabled: bool) -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("enable_charge", enabled.into())?])
}

/// 允许电池放电（具体行为还受模式与时段约束）
pub fn set_enable_discharge(enabled: bool) -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register(
        "enable_discharge",
        enabled.into(),
    )?])
}

/// 解除交流充电 SOC 上限：目标回 100%
pub fn disable_charge_target() -> Result<Vec<TransparentRequest>> {
    Ok(vec![
        write_named_register("enable_charge_target", 0)?,
        write_named_register("charge_target_soc", 100)?,
    ])
}

/// 充到指定 SOC 即停（即“冬季模式”）。100% 等价于解除上限
pub fn set_charge_target(target_soc: u16) -> Result<Vec<TransparentRequest>> {
    if !(4..=100).contains(&target_soc) {
        return Err(Error::OutOfRange {
            name: "charge_target_soc".to_string(),
            value: target_soc,
            min: 4,
            max: 100,
        });
    }
    let mut requests = set_enable_charge(true)?;
    if target_soc == 100 {
        requests.extend(disable_charge_target()?);
    } else {
        requests.push(write_named_register("enable_charge_target", 1)?);
        requests.push(write_named_register("charge_target_soc", target_soc)?);
    }
    Ok(requests)
}

/// 只改充电目标 SOC，不碰使能位
pub fn set_charge_target_only(target_soc: u16) -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("charge_target_soc", target_soc)?])
}

/// 满功率放电，超出负载的部分出口到电网
pub fn set_discharge_mode_max_power() -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("battery_power_mode", 0)?])
}

/// 跟随负载放电，不向电网出口
pub fn set_discharge_mode_to_match_demand() -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("battery_power_mode", 1)?])
}

/// 维持的最低电量
pub fn set_battery_soc_reserve(value: u16) -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("battery_soc_reserve", value)?])
}

/// 充电功率百分比上限；多数机型最大 50%（约 2.6 kW）
pub fn set_battery_charge_limit(value: u16) -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("battery_charge_limit", value)?])
}

/// 放电功率百分比上限；多数机型最大 50%（约 2.6 kW）
pub fn set_battery_discharge_limit(value: u16) -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("battery_discharge_limit", value)?])
}

/// 停机保电的功率储备
pub fn set_battery_power_reserve(value: u16) -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register(
        "battery_discharge_min_power_reserve",
        value,
    )?])
}

/// 电池暂停模式
pub fn set_battery_pause_mode(value: u16) -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("battery_pause_mode", value)?])
}

/// 触发电池 SOC 重新标定
pub fn set_calibrate_battery_soc() -> Result<Vec<TransparentRequest>> {
    Ok(vec![write_named_register("battery_calibration_stage", 1)?])
}

/// 时段写入：HHMM = 100 * 小时 + 分钟，两个寄存器成对写；
/// None 表示清空时段（首尾都写 0）
fn set_slot(prefix: &str, index: u8, slot: Option<TimeSlot>) -> Result<Vec<TransparentRequest>> {
    let start = format!("{}_slot_{}_start", prefix, index);
    let end = format!("{}_slot_{}_end", prefix, index);
    let (start_value, end_value) = match slot {
        Some(slot) => (slot.start_repr(), slot.end_repr()),
        None => (0, 0),
    };
    Ok(vec![
        write_named_register(&start, start_value)?,
        write_named_register(&end, end_value)?,
    ])
}

pub fn set_charge_slot_1(slot: TimeSlot) -> Result<Vec<TransparentRequest>> {
    set_slot("charge", 1, Some(slot))
}

pub fn reset_charge_slot_1() -> Result<Vec<TransparentRequest>> {
    set_slot("charge", 1, None)
}

pub fn set_charge_slot_2(slot: TimeSlot) -> Result<Vec<TransparentRequest>> {
    set_slot("charge", 2, Some(slot))
}

pub fn reset_charge_slot_2() -> Result<Vec<TransparentRequest>> {
    set_slot("charge", 2, None)
}

pub fn set_discharge_slot_1(slot: TimeSlot) -> Result<Vec<TransparentRequest>> {
    set_slot("discharge", 1, Some(slot))
}

pub fn reset_discharge_slot_1() -> Result<Vec<TransparentRequest>> {
    set_slot("discharge", 1, None)
}

pub fn set_discharge_slot_2(slot: TimeSlot) -> Result<Vec<TransparentRequest>> {
    set_slot("discharge", 2, Some(slot))
}

pub fn reset_discharge_slot_2() -> Result<Vec<TransparentRequest>> {
    set_slot("discharge", 2, None)
}

/// 写系统时间。年按 2000 偏移存储，只覆盖 [2000, 2255]
pub fn set_system_date_time(dt: NaiveDateTime) -> Result<Vec<TransparentRequest>> {
    let year = dt.year();
    if !(2000..=2255).contains(&year) {
        return Err(Error::Validation(format!(
            "system time year {} out of range [2000, 2255]",
            year
        )));
    }
    Ok(vec![
        write_named_register("system_time_year", (year - 2000) as u16)?,
        write_named_register("system_time_month", dt.month() as u16)?,
        write_named_register("system_time_day", dt.day() as u16)?,
        write_named_register("system_time_hour", dt.hour() as u16)?,
        write_named_register("system_time_minute", dt.minute() as u16)?,
        write_named_register("system_time_second", dt.second() as u16)?,
    ])
}

/// 动态（自发自用）模式：白天余电充电、不足时放电，尽量不与电网交换
pub fn set_mode_dynamic() -> Result<Vec<TransparentRequest>> {
    let mut requests = set_discharge_mode_to_match_demand()?;
    requests.extend(set_battery_soc_reserve(4)?);
    requests.extend(set_enable_discharge(false)?);
    Ok(requests)
}

/// 储能模式：白天存电，按时段放电；可选第二时段与出口放电。
/// 不传第二时段则清空它。
pub fn set_mode_storage(
    discharge_slot_1: TimeSlot,
    discharge_slot_2: Option<TimeSlot>,
    discharge_for_export: bool,
) -> Result<Vec<TransparentRequest>> {
    let mut requests = if discharge_for_export {
        set_discharge_mode_max_power()?
    } else {
        set_discharge_mode_to_match_demand()?
    };
    requests.extend(set_battery_soc_reserve(100)?);
    requests.extend(set_enable_discharge(true)?);
    requests.extend(set_discharge_slot_1(discharge_slot_1)?);
    match discharge_slot_2 {
        Some(slot) => requests.extend(set_discharge_slot_2(slot)?),
        None => requests.extend(reset_discharge_slot_2()?),
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::pdu::TransparentRequestKind;

    /// 期望一条对 (寄存器, 值) 的写请求
    fn expect_write(req: &TransparentRequest, register: u16, value: u16) {
        assert_eq!(
            req.kind,
            TransparentRequestKind::WriteHoldingRegister { register, value }
        );
        assert_eq!(req.slave_address, 0x32);
    }

    #[test]
    fn charge_target_compositions() {
        // 65%：使能充电 → 使能目标 → 写目标
        let requests = set_charge_target(65).unwrap();
        assert_eq!(requests.len(), 3);
        expect_write(&requests[0], 96, 1);
        expect_write(&requests[1], 20, 1);
        expect_write(&requests[2], 116, 65);

        // 100%：使能充电 → 解除目标 → 目标回 100
        let requests = set_charge_target(100).unwrap();
        assert_eq!(requests.len(), 3);
        expect_write(&requests[0], 96, 1);
        expect_write(&requests[1], 20, 0);
        expect_write(&requests[2], 116, 100);

        // 越界在构造前就被拒绝
        match set_charge_target(3) {
            Err(Error::OutOfRange { min: 4, max: 100, .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert!(set_charge_target(101).is_err());
    }

    #[test]
    fn enable_flags() {
        expect_write(&set_enable_charge(true).unwrap()[0], 96, 1);
        expect_write(&set_enable_charge(false).unwrap()[0], 96, 0);
        expect_write(&set_enable_discharge(true).unwrap()[0], 59, 1);
        expect_write(&set_enable_discharge(false).unwrap()[0], 59, 0);
    }

    #[test]
    fn slot_writes_use_hhmm_encoding() {
        let slot = TimeSlot::from_repr(30, 430).unwrap();
        let requests = set_charge_slot_1(slot).unwrap();
        assert_eq!(requests.len(), 2);
        expect_write(&requests[0], 94, 30);
        expect_write(&requests[1], 95, 430);

        let requests = reset_discharge_slot_2().unwrap();
        expect_write(&requests[0], 44, 0);
        expect_write(&requests[1], 45, 0);

        let slot = TimeSlot::from_repr(1600, 700).unwrap();
        let requests = set_discharge_slot_1(slot).unwrap();
        expect_write(&requests[0], 56, 1600);
        expect_write(&requests[1], 57, 700);
    }

    #[test]
    fn reserve_and_limit_validation() {
        expect_write(&set_battery_soc_reserve(100).unwrap()[0], 110, 100);
        assert!(set_battery_soc_reserve(3).is_err());
        expect_write(&set_battery_charge_limit(50).unwrap()[0], 111, 50);
        assert!(set_battery_charge_limit(51).is_err());
        expect_write(&set_battery_power_reserve(4).unwrap()[0], 114, 4);
        assert!(set_battery_power_reserve(101).is_err());
    }

    #[test]
    fn system_date_time_encoding() {
        let dt = NaiveDate::from_ymd_opt(2022, 4, 27)
            .unwrap()
            .and_hms_opt(23, 29, 18)
            .unwrap();
        let requests = set_system_date_time(dt).unwrap();
        assert_eq!(requests.len(), 6);
        expect_write(&requests[0], 35, 22);
        expect_write(&requests[1], 36, 4);
        expect_write(&requests[2], 37, 27);
        expect_write(&requests[3], 38, 23);
        expect_write(&requests[4], 39, 29);
        expect_write(&requests[5], 40, 18);

        let out_of_range = NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(set_system_date_time(out_of_range).is_err());
    }

    #[test]
    fn mode_dynamic_composition() {
        let requests = set_mode_dynamic().unwrap();
        assert_eq!(requests.len(), 3);
        expect_write(&requests[0], 27, 1); // 跟随负载
        expect_write(&requests[1], 110, 4); // 储备 4%
        expect_write(&requests[2], 59, 0); // 关放电
    }

    #[test]
    fn mode_storage_composition() {
        let slot1 = TimeSlot::from_repr(1600, 700).unwrap();
        let requests = set_mode_storage(slot1, None, false).unwrap();
        assert_eq!(requests.len(), 7);
        expect_write(&requests[0], 27, 1);
        expect_write(&requests[1], 110, 100);
        expect_write(&requests[2], 59, 1);
        expect_write(&requests[3], 56, 1600);
        expect_write(&requests[4], 57, 700);
        // 未指定第二时段则清空
        expect_write(&requests[5], 44, 0);
        expect_write(&requests[6], 45, 0);

        let slot2 = TimeSlot::from_repr(1200, 1400).unwrap();
        let requests = set_mode_storage(slot1, Some(slot2), true).unwrap();
        expect_write(&requests[0], 27, 0); // 出口放电用满功率
        expect_write(&requests[5], 44, 1200);
        expect_write(&requests[6], 45, 1400);
    }

    #[test]
    fn refresh_request_catalogue() {
        let requests = refresh_plant_data(300, 180, 120, 2);
        // IR 0/180 + HR 0/60/120/180/300 + 每块电池 IR 60/120
        assert_eq!(requests.len(), 2 + 5 + 4);
        assert_eq!(
            requests[0].kind,
            TransparentRequestKind::ReadInputRegisters {
                base_register: 0,
                register_count: 60
            }
        );
        assert_eq!(requests[7].slave_address, 0x32);
        assert_eq!(requests[9].slave_address, 0x33);

        // 只要输入寄存器
        let requests = refresh_plant_data(-1, 180, -1, 2);
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|r| matches!(r.kind, TransparentRequestKind::ReadInputRegisters { .. })));
    }
}
