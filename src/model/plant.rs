// Plant：整套系统（逆变器 + 若干电池）的寄存器镜像与更新状态机
// 每个从机地址一份缓存；云端/手机 App 会用别名地址 0x11/0x30/0x31 发响应，
// 统一归并到 0x32。首块电池与逆变器共用 0x32 的缓存。

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::model::battery::{cache_is_valid_battery, Battery};
use crate::model::inverter::Inverter;
use crate::model::register::{hr, ir, Register, RegisterCache, RegisterKind};
use crate::pdu::{Pdu, TransparentResponseKind};

/// 逆变器本尊地址
pub const INVERTER_ADDRESS: u8 = 0x32;
/// 云端与手机 App 的别名地址，归并到 0x32
const ALIAS_ADDRESSES: [u8; 3] = [0x11, 0x30, 0x31];
/// 电池页基址：IR 60 起一页 60 个输入寄存器
const BATTERY_PAGE_BASE: u16 = 60;

pub type OnRegistersUpdated = Arc<dyn Fn(Register, u16, &[u16]) + Send + Sync>;
pub type OnRegisterWritten = Arc<dyn Fn(Register, u16) + Send + Sync>;
pub type OnBatteryUpdated = Arc<dyn Fn(usize, &[u16]) + Send + Sync>;

pub struct Plant {
    /// 从机地址 → 寄存器镜像。只由 `update` 写入
    pub register_caches: HashMap<u8, RegisterCache>,
    /// 最近一次响应里见到的序列号
    pub inverter_serial_number: String,
    pub data_adapter_serial_number: String,
    /// 已发现的有效电池数量；只在发现时增长，读失败不回退
    pub number_batteries: usize,
    /// 见过的基址集合，整体刷新时逐块重读
    pub registers: HashSet<Register>,
    on_registers_updated: Option<OnRegistersUpdated>,
    on_register_written: Option<OnRegisterWritten>,
    on_battery_updated: Option<OnBatteryUpdated>,
}

impl Default for Plant {
    fn default() -> Self {
        Self::new()
    }
}

impl Plant {
    pub fn new() -> Self {
        Self::with_known(0, None)
    }

    /// 已知电池数/寄存器集时可以直接播种，否则靠探测发现。
    /// 初始基址集是所有机型都有的公共区。
    pub fn with_known(num_batteries: usize, registers: Option<HashSet<Register>>) -> Self {
        let registers = registers.unwrap_or_else(|| {
            HashSet::from([hr(0), hr(60), hr(120), hr(180), ir(0), ir(180)])
        });
        Self {
            register_caches: HashMap::from([(INVERTER_ADDRESS, RegisterCache::new())]),
            inverter_serial_number: String::new(),
            data_adapter_serial_number: String::new(),
            number_batteries: num_batteries,
            registers,
            on_registers_updated: None,
            on_register_written: None,
            on_battery_updated: None,
        }
    }

    // 观察者在持有 Plant 的线程上同步执行，必须立刻返回；
    // 回调里的 panic 被捕获记日志，不影响后续报文

    pub fn set_on_registers_updated(&mut self, hook: OnRegistersUpdated) {
        self.on_registers_updated = Some(hook);
    }

    pub fn set_on_register_written(&mut self, hook: OnRegisterWritten) {
        self.on_register_written = Some(hook);
    }

    pub fn set_on_battery_updated(&mut self, hook: OnBatteryUpdated) {
        self.on_battery_updated = Some(hook);
    }

    /// 入口：消化一条解码后的报文
    pub fn update(&mut self, pdu: &Pdu) {
        let resp = match pdu {
            Pdu::Response(resp) => resp,
            other => {
                debug!("ignoring non-transparent-response message {:?}", other);
                return;
            }
        };
        if matches!(resp.kind, TransparentResponseKind::Null) {
            debug!("ignoring null response from 0x{:02x}", resp.slave_address);
            return;
        }
        if resp.error {
            debug!("ignoring error response {:?}", resp);
            return;
        }

        self.inverter_serial_number = resp.inverter_serial_number.clone();
        self.data_adapter_serial_number = resp.data_adapter_serial_number.clone();

        let mut address = resp.slave_address;
        if address >= INVERTER_ADDRESS {
            // 真实地址，原样使用
        } else if matches!(
            resp.kind,
            TransparentResponseKind::ReadInputRegisters {
                base_register: BATTERY_PAGE_BASE,
                ..
            }
        ) {
            // 别名地址冒出来的电池页：归并会污染 0 号电池，只能丢弃
            info!(
                "ignoring battery page from alias address 0x{:02x}",
                address
            );
            return;
        } else if ALIAS_ADDRESSES.contains(&address) {
            address = INVERTER_ADDRESS;
        } else {
            debug!("discarding response from unexpected address 0x{:02x}", address);
            return;
        }

        if !self.register_caches.contains_key(&address) {
            info!("first time encountering address 0x{:02x}", address);
            self.register_caches.insert(address, RegisterCache::new());
        }

        match &resp.kind {
            TransparentResponseKind::ReadHoldingRegisters {
                base_register,
                values,
                ..
            } => self.process_read_response(address, RegisterKind::Holding, *base_register, values),
            TransparentResponseKind::ReadInputRegisters {
                base_register,
                values,
                ..
            } => self.process_read_response(address, RegisterKind::Input, *base_register, values),
            TransparentResponseKind::WriteHoldingRegister { register, value } => {
                self.process_write_response(address, *register, *value)
            }
            // Null 与 Exception 已在上面拦截
            _ => {}
        }
    }

    fn process_read_response(
        &mut self,
        address: u8,
        kind: RegisterKind,
        base: u16,
        values: &[u16],
    ) {
        let cache = self
            .register_caches
            .get_mut(&address)
            .expect("cache created in update");
        cache.update(values.iter().enumerate().map(|(i, &v)| {
            (
                Register {
                    kind,
                    index: base + i as u16,
                },
                v,
            )
        }));

        let base_register = Register { kind, index: base };
        if kind == RegisterKind::Input && base == BATTERY_PAGE_BASE {
            // 电池页，可能是新电池
            let index = (address - INVERTER_ADDRESS) as usize;
            if index >= self.number_batteries
                && cache_is_valid_battery(&self.register_caches[&address])
            {
                info!("new battery detected at address 0x{:02x}", address);
                self.number_batteries = (address - (INVERTER_ADDRESS - 1)) as usize;
            }
            self.emit_battery_updated(index, values);
        } else {
            // 块读按 60 对齐；云端偶尔单读一个寄存器，不当作已知基址
            if base % 60 == 0 {
                self.registers.insert(base_register);
            }
            self.emit_registers_updated(base_register, values.len() as u16, values);
        }
    }

    fn process_write_response(&mut self, address: u8, register: u16, value: u16) {
        if register == 0 {
            warn!("ignoring likely corrupt write response: HR_0 = {}", value);
            return;
        }
        let reg = hr(register);
        self.register_caches
            .get_mut(&address)
            .expect("cache created in update")
            .set(reg, value);
        self.emit_register_written(reg, value);
    }

    fn emit_registers_updated(&self, base: Register, count: u16, values: &[u16]) {
        if let Some(hook) = &self.on_registers_updated {
            if let Err(e) = catch_unwind(AssertUnwindSafe(|| hook(base, count, values))) {
                error!("registers_updated observer panicked: {}", panic_message(&*e));
            }
        }
    }

    fn emit_register_written(&self, register: Register, value: u16) {
        if let Some(hook) = &self.on_register_written {
            if let Err(e) = catch_unwind(AssertUnwindSafe(|| hook(register, value))) {
                error!("register_written observer panicked: {}", panic_message(&*e));
            }
        }
    }

    fn emit_battery_updated(&self, index: usize, values: &[u16]) {
        if let Some(hook) = &self.on_battery_updated {
            if let Err(e) = catch_unwind(AssertUnwindSafe(|| hook(index, values))) {
                error!("battery_updated observer panicked: {}", panic_message(&*e));
            }
        }
    }

    /// 刷新计划：给出应当重读的 (从机地址, 基址) 序列。
    /// full_refresh 为 false 时只读输入寄存器；显式寄存器集优先于已知集。
    pub fn refresh_plan(
        &self,
        full_refresh: bool,
        registers: Option<&HashSet<Register>>,
        max_batteries: Option<usize>,
    ) -> Vec<(u8, Register)> {
        let registers = registers.unwrap_or(&self.registers);
        let max_batteries = max_batteries.unwrap_or(self.number_batteries);

        let mut bases: Vec<Register> = registers
            .iter()
            .copied()
            .filter(|r| full_refresh || r.kind == RegisterKind::Input)
            .collect();
        bases.sort();

        let mut plan: Vec<(u8, Register)> =
            bases.into_iter().map(|r| (INVERTER_ADDRESS, r)).collect();
        for i in 0..max_batteries {
            plan.push((INVERTER_ADDRESS + i as u8, ir(BATTERY_PAGE_BASE)));
        }
        plan
    }

    /// 逆变器视图（0x32 的缓存）
    pub fn inverter(&self) -> Inverter<'_> {
        Inverter::new(&self.register_caches[&INVERTER_ADDRESS])
    }

    /// 第 i 块电池的视图；地址 0x32 + i
    pub fn battery(&self, index: usize) -> Option<Battery<'_>> {
        if index >= self.number_batteries {
            return None;
        }
        self.register_caches
            .get(&(INVERTER_ADDRESS + index as u8))
            .map(Battery::new)
    }

    pub fn batteries(&self) -> Vec<Battery<'_>> {
        (0..self.number_batteries)
            .filter_map(|i| self.battery(i))
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
