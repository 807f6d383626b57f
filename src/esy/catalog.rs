use crate::prelude::*;

use crate::esy::bytes::{read_i16_be, read_i32_be, read_u16_be, read_u32_be};
use crate::esy::profile::Variant;
use crate::esy::segment::{HOLDING, INPUT};

use arc_swap::ArcSwap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::collections::HashMap;
use std::sync::Arc;

// {{{ DataType
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataType {
    Signed16,
    Unsigned16,
    // cumulative counters, high word first
    Signed32,
    Unsigned32,
}

/// Type codes as they appear in a protocol definition.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum WireType {
    Default = 0,
    Signed16 = 1,
    Unsigned16 = 2,
    Signed32 = 3,
    StringVar = 4,
    StringFixed = 5,
    ByteArray = 6,
    DateTime = 100,
}

impl DataType {
    /// How many 16-bit registers a value occupies.
    pub fn width(&self) -> usize {
        match self {
            Self::Signed16 | Self::Unsigned16 => 1,
            Self::Signed32 | Self::Unsigned32 => 2,
        }
    }

    fn widened(self, length: u8) -> Self {
        match (self, length) {
            (Self::Signed16, 2) => Self::Signed32,
            (Self::Unsigned16, 2) => Self::Unsigned32,
            (t, _) => t,
        }
    }

    pub fn from_wire(code: u8, length: u8) -> Option<Self> {
        match WireType::try_from(code).ok()? {
            WireType::Default | WireType::Signed16 => Some(Self::Signed16.widened(length)),
            WireType::Unsigned16 => Some(Self::Unsigned16.widened(length)),
            WireType::Signed32 => Some(Self::Signed32),
            _ => None,
        }
    }

    pub fn from_name(name: &str, length: u8) -> Option<Self> {
        let t = match name.to_ascii_lowercase().as_str() {
            "signed" | "int16" | "s16" => Self::Signed16,
            "unsigned" | "uint16" | "u16" => Self::Unsigned16,
            "int32" | "s32" => Self::Signed32,
            "uint32" | "u32" => Self::Unsigned32,
            _ => return None,
        };
        Some(t.widened(length))
    }
} // }}}

// {{{ RegisterDefinition
#[derive(Clone, Debug, PartialEq)]
pub struct RegisterDefinition {
    pub data_key: String,
    pub data_type: DataType,
    pub coefficient: f64,
}

impl RegisterDefinition {
    pub fn new(data_key: &str, data_type: DataType, coefficient: f64) -> Self {
        Self {
            data_key: data_key.to_owned(),
            data_type,
            coefficient,
        }
    }

    pub fn width(&self) -> usize {
        self.data_type.width()
    }

    /// Interprets `raw` (2 or 4 bytes) per data_type, then scales it.
    pub fn decode(&self, raw: &[u8]) -> Option<f64> {
        if raw.len() < self.width() * 2 {
            return None;
        }

        let value = match self.data_type {
            DataType::Signed16 => i64::from(read_i16_be(raw[0], raw[1])),
            DataType::Unsigned16 => i64::from(read_u16_be(raw[0], raw[1])),
            DataType::Signed32 => i64::from(read_i32_be(raw)),
            DataType::Unsigned32 => i64::from(read_u32_be(raw)),
        };

        Some(scale(value, self.coefficient))
    }
}

fn scale(value: i64, coefficient: f64) -> f64 {
    if coefficient == 1.0 {
        return value as f64;
    }
    // trims float noise, eg 2305 * 0.1 = 230.50000000000003
    (value as f64 * coefficient * 1e6).round() / 1e6
} // }}}

// {{{ static layout
type Entry = (u16, u16, &'static str, DataType, f64);

use DataType::{Signed16 as S16, Unsigned16 as U16, Unsigned32 as U32};

/// (segment id, offset, key, type, coefficient) as sent by legacy firmware.
/// Legacy segments carry no usable address, only their id.
const LEGACY_SEGMENTS: &[Entry] = &[
    // run information
    (1, 0, "systemRunMode", U16, 1.0),
    (1, 1, "systemRunStatus", U16, 1.0),
    // basic information
    (2, 0, "dcdcTemperature", S16, 1.0),
    (2, 1, "busVoltage", U16, 0.1),
    (2, 2, "dailyEnergyGeneration", U16, 0.1),
    (2, 3, "totalEnergyGeneration", U32, 0.1),
    (2, 5, "ratedPower", U16, 1.0),
    (2, 6, "outputRatedPower", U16, 1.0),
    // pv
    (3, 0, "pv1voltage", U16, 0.1),
    (3, 1, "pv1current", U16, 0.1),
    (3, 2, "pv1Power", U16, 1.0),
    (3, 3, "pv2voltage", U16, 0.1),
    (3, 4, "pv2current", U16, 0.1),
    (3, 5, "pv2Power", U16, 1.0),
    // battery
    (4, 0, "batteryStatus", U16, 1.0),
    (4, 1, "batteryVoltage", U16, 0.1),
    (4, 2, "batteryCurrent", S16, 0.1),
    (4, 3, "batteryPower", S16, 1.0),
    (4, 4, "battTotalSoc", U16, 1.0),
    (4, 5, "batterySoc", U16, 1.0),
    (4, 6, "battNum", U16, 1.0),
    (4, 7, "battEnergy", U16, 0.1),
    // grid
    (5, 0, "gridStatus", U16, 1.0),
    (5, 1, "gridFreq", U16, 0.01),
    (5, 2, "gridVolt", U16, 0.1),
    (5, 3, "gridActivePower", S16, 1.0),
    (5, 4, "ct1Curr", S16, 0.1),
    (5, 5, "ct1Power", S16, 1.0),
    (5, 6, "ct2Curr", S16, 0.1),
    (5, 7, "ct2Power", S16, 1.0),
    (5, 8, "onOffGridMode", U16, 1.0),
    // inverter
    (6, 0, "invTemperature", S16, 1.0),
    (6, 1, "invStatus", U16, 1.0),
    (6, 2, "invOutputFreq", U16, 0.01),
    (6, 3, "invOutputVolt", U16, 0.1),
    (6, 4, "invOutputCurr", U16, 0.1),
    (6, 5, "invApparentPower", S16, 1.0),
    (6, 6, "invActivePower", S16, 1.0),
    // energy flow
    (7, 0, "energyFlowPvTotalPower", S16, 1.0),
    (7, 1, "energyFlowBattPower", S16, 1.0),
    (7, 2, "energyFlowGridPower", S16, 1.0),
    (7, 3, "energyFlowLoadTotalPower", S16, 1.0),
    // load
    (8, 0, "loadVolt", U16, 0.1),
    (8, 1, "loadCurr", U16, 0.1),
    (8, 2, "loadActivePower", S16, 1.0),
    (8, 3, "loadRealTimePower", S16, 1.0),
    // statistics
    (9, 0, "dailyPowerConsumption", U16, 0.1),
    (9, 1, "totalEconsumption", U32, 0.1),
    (9, 3, "dailyGridConnectionPower", U16, 0.1),
    (9, 4, "totalOnGridElecGenerated", U32, 0.1),
    (9, 6, "dailyOnGridElecConsumption", U16, 0.1),
    (9, 7, "totalOnGridElecConsumption", U32, 0.1),
    (9, 9, "dailyBattChargeEnergy", U16, 0.1),
    (9, 10, "totalBattChargeEnergy", U32, 0.1),
    (9, 12, "dailyBattDischargeEnergy", U16, 0.1),
    (9, 13, "totalBattDischargeEnergy", U32, 0.1),
    // settings
    (10, 0, "antiBackflowPowerPercentage", U16, 1.0),
    (10, 1, "batteryChargingCurrent", U16, 0.1),
    (10, 2, "batteryDischargeCurrent", U16, 0.1),
    (10, 3, "onGridSocLimit", U16, 1.0),
    (10, 4, "offGridSocLimit", U16, 1.0),
];

/// (segment type, address, key, type, coefficient) for segmented firmware.
///
/// Only a fallback until a protocol definition is loaded; the vendor's
/// definition is authoritative for these addresses.
const SEGMENTED_LAYOUT: &[Entry] = &[
    // settings
    (HOLDING, 50, "antiBackflowPowerPercentage", U16, 1.0),
    (HOLDING, 51, "batteryChargingCurrent", U16, 0.1),
    (HOLDING, 52, "batteryDischargeCurrent", U16, 0.1),
    (HOLDING, 53, "onGridSocLimit", U16, 1.0),
    (HOLDING, 54, "offGridSocLimit", U16, 1.0),
    (HOLDING, 57, "patternMode", U16, 1.0),
    // run information
    (INPUT, 100, "systemRunMode", U16, 1.0),
    (INPUT, 101, "systemRunStatus", U16, 1.0),
    // basic information
    (INPUT, 110, "dcdcTemperature", S16, 1.0),
    (INPUT, 111, "busVoltage", U16, 0.1),
    (INPUT, 112, "dailyEnergyGeneration", U16, 0.1),
    (INPUT, 113, "totalEnergyGeneration", U32, 0.1),
    (INPUT, 115, "ratedPower", U16, 1.0),
    (INPUT, 116, "outputRatedPower", U16, 1.0),
    // pv
    (INPUT, 120, "pv1voltage", U16, 0.1),
    (INPUT, 121, "pv1current", U16, 0.1),
    (INPUT, 122, "pv1Power", U16, 1.0),
    (INPUT, 123, "pv2voltage", U16, 0.1),
    (INPUT, 124, "pv2current", U16, 0.1),
    (INPUT, 125, "pv2Power", U16, 1.0),
    // battery
    (INPUT, 130, "batteryStatus", U16, 1.0),
    (INPUT, 131, "batteryVoltage", U16, 0.1),
    (INPUT, 132, "batteryCurrent", S16, 0.1),
    (INPUT, 133, "batteryPower", S16, 1.0),
    (INPUT, 134, "battTotalSoc", U16, 1.0),
    (INPUT, 135, "batterySoc", U16, 1.0),
    (INPUT, 136, "battNum", U16, 1.0),
    (INPUT, 137, "battEnergy", U16, 0.1),
    // grid
    (INPUT, 140, "gridStatus", U16, 1.0),
    (INPUT, 141, "gridFreq", U16, 0.01),
    (INPUT, 142, "gridVolt", U16, 0.1),
    (INPUT, 143, "gridActivePower", S16, 1.0),
    (INPUT, 144, "ct1Curr", S16, 0.1),
    (INPUT, 145, "ct1Power", S16, 1.0),
    (INPUT, 146, "ct2Curr", S16, 0.1),
    (INPUT, 147, "ct2Power", S16, 1.0),
    (INPUT, 148, "onOffGridMode", U16, 1.0),
    // inverter
    (INPUT, 150, "invTemperature", S16, 1.0),
    (INPUT, 151, "invStatus", U16, 1.0),
    (INPUT, 152, "invOutputFreq", U16, 0.01),
    (INPUT, 153, "invOutputVolt", U16, 0.1),
    (INPUT, 154, "invOutputCurr", U16, 0.1),
    (INPUT, 155, "invApparentPower", S16, 1.0),
    (INPUT, 156, "invActivePower", S16, 1.0),
    // energy flow
    (INPUT, 160, "energyFlowPvTotalPower", S16, 1.0),
    (INPUT, 161, "energyFlowBattPower", S16, 1.0),
    (INPUT, 162, "energyFlowGridPower", S16, 1.0),
    (INPUT, 163, "energyFlowLoadTotalPower", S16, 1.0),
    (INPUT, 164, "gridLine", U16, 1.0),
    (INPUT, 165, "batteryLine", U16, 1.0),
    // load
    (INPUT, 170, "loadVolt", U16, 0.1),
    (INPUT, 171, "loadCurr", U16, 0.1),
    (INPUT, 172, "loadActivePower", S16, 1.0),
    (INPUT, 173, "loadRealTimePower", S16, 1.0),
    (INPUT, 174, "loadPowerPercentage", U16, 1.0),
    (INPUT, 175, "heatingState", U16, 1.0),
    // statistics
    (INPUT, 180, "dailyPowerConsumption", U16, 0.1),
    (INPUT, 181, "totalEconsumption", U32, 0.1),
    (INPUT, 183, "dailyGridConnectionPower", U16, 0.1),
    (INPUT, 184, "totalOnGridElecGenerated", U32, 0.1),
    (INPUT, 186, "dailyOnGridElecConsumption", U16, 0.1),
    (INPUT, 187, "totalOnGridElecConsumption", U32, 0.1),
    (INPUT, 189, "dailyBattChargeEnergy", U16, 0.1),
    (INPUT, 190, "totalBattChargeEnergy", U32, 0.1),
    (INPUT, 192, "dailyBattDischargeEnergy", U16, 0.1),
    (INPUT, 193, "totalBattDischargeEnergy", U32, 0.1),
];

/// Holding register written to change operating mode.
pub const MODE_REGISTER: u16 = 57;
// }}}

// {{{ RegisterTable
/// Where a register word sits in a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Slot {
    pub segment_id: u16,
    pub function_code: u16,
    pub address: u16,
    /// position of the word within its segment
    pub offset: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RegisterTable {
    /// keyed by (segment id, offset); addresses are ignored
    BySegment(HashMap<(u16, u16), RegisterDefinition>),
    /// keyed by (function code, address)
    ByFunction(HashMap<(u16, u16), RegisterDefinition>),
}

impl Default for RegisterTable {
    fn default() -> Self {
        Self::ByFunction(HashMap::new())
    }
}

impl RegisterTable {
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Legacy => Self::legacy(),
            Variant::Segmented => Self::segmented(),
        }
    }

    pub fn legacy() -> Self {
        Self::BySegment(build(LEGACY_SEGMENTS))
    }

    pub fn segmented() -> Self {
        Self::ByFunction(build(SEGMENTED_LAYOUT))
    }

    /// Definition for the word at `slot`, whichever way the table is keyed.
    pub fn locate(&self, slot: &Slot) -> Option<&RegisterDefinition> {
        match self {
            Self::BySegment(m) => m.get(&(slot.segment_id, slot.offset)),
            Self::ByFunction(m) => m.get(&(slot.function_code, slot.address)),
        }
    }

    /// Address lookup. Segment-keyed tables know no addresses and always
    /// answer None; use `locate` for those.
    pub fn lookup(&self, address: u16, function_code: u16) -> Option<&RegisterDefinition> {
        match self {
            Self::BySegment(_) => None,
            Self::ByFunction(m) => m.get(&(function_code, address)),
        }
    }

    /// Key an unmapped register's raw value is kept under.
    pub fn debug_key(&self, slot: &Slot) -> String {
        match self {
            Self::BySegment(_) => format!("reg_{}", slot.address),
            Self::ByFunction(_) => {
                format!("_unknown_fc{}_addr{}", slot.function_code, slot.address)
            }
        }
    }

    fn map(&self) -> &HashMap<(u16, u16), RegisterDefinition> {
        match self {
            Self::BySegment(m) | Self::ByFunction(m) => m,
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.map().values().map(|d| d.data_key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

fn build(layout: &[Entry]) -> HashMap<(u16, u16), RegisterDefinition> {
    layout
        .iter()
        .map(|&(a, b, key, t, c)| ((a, b), RegisterDefinition::new(key, t, c)))
        .collect()
} // }}}

// {{{ ProtocolDefinition
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    Code(u8),
    Name(String),
}

impl Default for TypeSpec {
    fn default() -> Self {
        Self::Code(WireType::Default.into())
    }
}

impl TypeSpec {
    pub fn data_type(&self, length: u8) -> Option<DataType> {
        match self {
            Self::Code(code) => DataType::from_wire(*code, length),
            Self::Name(name) => DataType::from_name(name, length),
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionEntry {
    pub address: u16,
    #[serde(default)]
    pub function_code: Option<u16>,
    pub key: String,
    #[serde(rename = "type", default)]
    pub data_type: TypeSpec,
    #[serde(default = "DefinitionEntry::default_length")]
    pub length: u8,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "DefinitionEntry::default_coefficient")]
    pub coefficient: f64,
}

impl DefinitionEntry {
    fn default_length() -> u8 {
        1
    }

    fn default_coefficient() -> f64 {
        1.0
    }
}

/// Register map supplied out-of-band, usually fetched from the vendor API.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ProtocolDefinition {
    #[serde(default)]
    pub version: Option<String>,
    pub registers: Vec<DefinitionEntry>,
}

impl ProtocolDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| file_error!("error parsing protocol definition: {}", err))
    }

    pub fn from_file(file: &str) -> Result<Self> {
        info!("Reading protocol definition from {}", file);
        let content = std::fs::read_to_string(file)
            .map_err(|err| file_error_with_source!(err, "error reading {}", file))?;

        Self::from_json(&content)
    }

    /// Entries without a function code apply to both register spaces.
    /// Entries with a type we can't decode, or a coefficient that isn't a
    /// finite number, are skipped.
    pub fn to_table(&self) -> RegisterTable {
        let mut map = HashMap::new();

        for entry in &self.registers {
            let Some(data_type) = entry.data_type.data_type(entry.length) else {
                warn!(
                    "skipping {} at {}: unsupported type {:?}",
                    entry.key, entry.address, entry.data_type
                );
                continue;
            };

            if !entry.coefficient.is_finite() {
                warn!(
                    "skipping {} at {}: coefficient {} is not a number",
                    entry.key, entry.address, entry.coefficient
                );
                continue;
            }

            let definition = RegisterDefinition::new(&entry.key, data_type, entry.coefficient);
            match entry.function_code {
                Some(fc) => {
                    map.insert((fc, entry.address), definition);
                }
                None => {
                    map.insert((HOLDING, entry.address), definition.clone());
                    map.insert((INPUT, entry.address), definition);
                }
            }
        }

        RegisterTable::ByFunction(map)
    }
} // }}}

// {{{ RegisterCatalog
/// The active register table, swappable while decoders are reading it.
///
/// A reader holding a `snapshot()` keeps seeing that table to the end,
/// whatever is swapped in meanwhile.
#[derive(Debug, Default)]
pub struct RegisterCatalog {
    table: ArcSwap<RegisterTable>,
}

impl RegisterCatalog {
    pub fn new(table: RegisterTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    pub fn for_variant(variant: Variant) -> Self {
        Self::new(RegisterTable::for_variant(variant))
    }

    pub fn lookup(&self, address: u16, function_code: u16) -> Option<RegisterDefinition> {
        self.table.load().lookup(address, function_code).cloned()
    }

    pub fn snapshot(&self) -> Arc<RegisterTable> {
        self.table.load_full()
    }

    pub fn swap(&self, table: RegisterTable) {
        self.table.store(Arc::new(table));
    }

    /// Builds a table from `definition` and installs it in one step.
    /// Returns how many registers the new table maps. A definition that
    /// maps nothing is refused and the current table stays.
    pub fn replace(&self, definition: &ProtocolDefinition) -> Result<usize> {
        let table = definition.to_table();
        let count = table.len();
        if count == 0 {
            bail!(
                "protocol definition (version {}) maps no registers, keeping current table",
                definition.version.as_deref().unwrap_or("unknown")
            );
        }
        self.swap(table);

        info!(
            "register catalog replaced: {} registers (definition version {})",
            count,
            definition.version.as_deref().unwrap_or("unknown")
        );

        Ok(count)
    }
} // }}}
