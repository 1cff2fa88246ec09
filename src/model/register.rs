// 寄存器标识与缓存：HR(保持，可读写)/IR(输入，只读) + 每从机地址一份 u16 镜像
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value as JsonValue};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterKind {
    Holding,
    Input,
}

impl RegisterKind {
    pub fn prefix(self) -> &'static str {
        match self {
            RegisterKind::Holding => "HR",
            RegisterKind::Input => "IR",
        }
    }
}

/// 单个寄存器的身份：(类别, 序号)，文本形式 `HR_<n>` / `IR_<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register {
    pub kind: RegisterKind,
    pub index: u16,
}

/// 保持寄存器
pub const fn hr(index: u16) -> Register {
    Register {
        kind: RegisterKind::Holding,
        index,
    }
}

/// 输入寄存器
pub const fn ir(index: u16) -> Register {
    Register {
        kind: RegisterKind::Input,
        index,
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.index)
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        let (prefix, index) = s.split_once('_').ok_or(())?;
        let index: u16 = index.parse().map_err(|_| ())?;
        match prefix {
            "HR" => Ok(hr(index)),
            "IR" => Ok(ir(index)),
            _ => Err(()),
        }
    }
}

/// 某个从机最近一次读到的寄存器镜像。
/// 未出现过的键按 0 读取（需要区分“从未读到”时用 `contains`）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterCache {
    registers: HashMap<Register, u16>,
}

impl RegisterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I: IntoIterator<Item = (Register, u16)>>(entries: I) -> Self {
        Self {
            registers: entries.into_iter().collect(),
        }
    }

    /// 读取寄存器值，缺失按 0
    pub fn get(&self, register: Register) -> u16 {
        self.registers.get(&register).copied().unwrap_or(0)
    }

    pub fn contains(&self, register: Register) -> bool {
        self.registers.contains_key(&register)
    }

    pub fn set(&mut self, register: Register, value: u16) {
        self.registers.insert(register, value);
    }

    /// 整块写入，由 Plant 在处理读响应时调用
    pub fn update<I: IntoIterator<Item = (Register, u16)>>(&mut self, entries: I) {
        self.registers.extend(entries);
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Register, &u16)> {
        self.registers.iter()
    }

    /// JSON 形式：{"HR_5": 100, "IR_60": 3221, ...}
    pub fn to_json(&self) -> String {
        let mut map = Map::new();
        for (reg, &value) in &self.registers {
            map.insert(reg.to_string(), JsonValue::from(value));
        }
        JsonValue::Object(map).to_string()
    }

    /// 从 JSON 恢复；识别不了的键静默丢弃
    pub fn from_json(data: &str) -> Result<Self> {
        let map: Map<String, JsonValue> = serde_json::from_str(data)?;
        let mut cache = Self::new();
        for (key, value) in map {
            let register = match key.parse::<Register>() {
                Ok(r) => r,
                Err(()) => continue,
            };
            let value = match value.as_u64() {
                Some(v) if v <= u64::from(u16::MAX) => v as u16,
                _ => continue,
            };
            cache.set(register, value);
        }
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_identity() {
        assert_eq!(hr(0), hr(0));
        assert_ne!(hr(0), hr(1));
        assert_ne!(hr(0), ir(0));
        assert_eq!(hr(22).to_string(), "HR_22");
        assert_eq!(ir(99).to_string(), "IR_99");
        assert_eq!("HR_22".parse::<Register>(), Ok(hr(22)));
        assert_eq!("IR_99".parse::<Register>(), Ok(ir(99)));
        assert!("XX_1".parse::<Register>().is_err());
        assert!("HR22".parse::<Register>().is_err());
    }

    #[test]
    fn cache_defaults_to_zero() {
        let mut cache = RegisterCache::new();
        assert_eq!(cache.get(hr(5)), 0);
        assert!(!cache.contains(hr(5)));
        cache.set(hr(5), 7);
        assert_eq!(cache.get(hr(5)), 7);
        assert!(cache.contains(hr(5)));
    }

    #[test]
    fn json_round_trip() {
        let cache = RegisterCache::from_entries([(hr(1), 2), (hr(116), 100), (ir(60), 3221)]);
        let restored = RegisterCache::from_json(&cache.to_json()).unwrap();
        assert_eq!(restored, cache);
    }

    #[test]
    fn from_json_discards_unknown_keys() {
        let data = r#"{"HR_1": 2, "bogus": 3, "QR_4": 5, "HR_x": 6, "HR_7": 99999, "IR_60": 3221}"#;
        let cache = RegisterCache::from_json(data).unwrap();
        assert_eq!(
            cache,
            RegisterCache::from_entries([(hr(1), 2), (ir(60), 3221)])
        );
    }
}
