use crate::prelude::*;

use crate::esy::catalog::RegisterTable;
use crate::esy::profile::{CandidateRule, VariantProfile};

use serde::Serialize;
use std::collections::BTreeMap;

pub type RegisterValues = BTreeMap<String, f64>;

// {{{ labels
pub struct ModeString;
impl ModeString {
    pub fn from_value(code: u16) -> String {
        match code {
            1 => "Regular Mode".to_owned(),
            2 => "Emergency Mode".to_owned(),
            3 => "Electricity Sell Mode".to_owned(),
            5 => "Battery Energy Management".to_owned(),
            c => format!("Unknown ({})", c),
        }
    }

    pub fn is_known(code: u16) -> bool {
        matches!(code, 1 | 2 | 3 | 5)
    }
}

pub struct GridModeString;
impl GridModeString {
    pub fn from_value(code: u16) -> String {
        match code {
            0 => "Off-Grid".to_owned(),
            1 => "On-Grid".to_owned(),
            c => format!("Unknown ({})", c),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum BatteryStatus {
    #[default]
    Idle,
    Charging,
    Discharging,
}

impl BatteryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Charging => "Charging",
            Self::Discharging => "Discharging",
        }
    }

    fn from_power(power: f64) -> Self {
        if power > 0.0 {
            Self::Charging
        } else if power < 0.0 {
            Self::Discharging
        } else {
            Self::Idle
        }
    }
}
// }}}

// {{{ TelemetrySnapshot
/// Everything decoded from one frame.
///
/// Sign conventions: grid positive = importing, battery positive = charging.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub pv_power: f64,
    pub pv1_power: f64,
    pub pv2_power: f64,

    pub grid_power: f64,
    pub grid_import: f64,
    pub grid_export: f64,

    pub battery_power: f64,
    pub battery_import: f64,
    pub battery_export: f64,
    pub battery_status: BatteryStatus,
    pub battery_status_text: String,

    pub load_power: f64,
    pub battery_soc: f64,

    pub daily_energy_generation: f64,
    pub total_energy_generation: f64,
    pub daily_power_consumption: f64,
    pub total_power_consumption: f64,
    pub daily_batt_charge_energy: f64,
    pub daily_batt_discharge_energy: f64,
    pub daily_grid_import_energy: f64,
    pub daily_grid_export_energy: f64,

    pub rated_power: f64,

    pub mode_code: u16,
    pub mode_label: String,
    pub grid_mode: u16,
    pub grid_mode_label: String,

    pub grid_line: u8,
    pub battery_line: u8,
    pub pv_line: u8,
    pub load_line: u8,

    /// every resolved register, plus debug keys for unmapped ones
    pub registers: RegisterValues,
}

impl TelemetrySnapshot {
    /// Register value by key; absent keys read as 0.
    pub fn get(&self, key: &str) -> f64 {
        self.registers.get(key).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.registers.contains_key(key)
    }

    /// Derived fields as (key, value) pairs, for per-topic publishing.
    pub fn derived(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pvPower", self.pv_power.to_string()),
            ("gridPower", self.grid_power.to_string()),
            ("gridImport", self.grid_import.to_string()),
            ("gridExport", self.grid_export.to_string()),
            ("batteryPower", self.battery_power.to_string()),
            ("batteryImport", self.battery_import.to_string()),
            ("batteryExport", self.battery_export.to_string()),
            ("batteryStatusText", self.battery_status_text.clone()),
            ("loadPower", self.load_power.to_string()),
            ("batterySoc", self.battery_soc.to_string()),
            ("ratedPower", self.rated_power.to_string()),
            ("modeCode", self.mode_code.to_string()),
            ("modeLabel", self.mode_label.clone()),
            ("gridModeLabel", self.grid_mode_label.clone()),
        ]
    }
}
// }}}

// {{{ synthesis
fn value(values: &RegisterValues, key: &str) -> Option<f64> {
    values.get(key).copied()
}

fn first_present(values: &RegisterValues, keys: &[String]) -> Option<f64> {
    keys.iter().find_map(|k| value(values, k))
}

fn first_non_zero(values: &RegisterValues, keys: &[String]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| value(values, k))
        .find(|v| *v != 0.0)
}

/// None only when the frame carries none of `keys`.
fn candidate(rule: CandidateRule, values: &RegisterValues, keys: &[String]) -> Option<f64> {
    match rule {
        CandidateRule::FirstPresent => first_present(values, keys),
        CandidateRule::FirstNonZero => {
            first_non_zero(values, keys).or_else(|| first_present(values, keys))
        }
    }
}

fn code(values: &RegisterValues, key: Option<&str>) -> Option<u16> {
    key.and_then(|k| value(values, k))
        .filter(|v| *v >= 0.0 && *v <= f64::from(u16::MAX))
        .map(|v| v as u16)
}

fn pv_power(profile: &VariantProfile, values: &RegisterValues) -> f64 {
    let sum: f64 = profile
        .pv_string_keys
        .iter()
        .filter_map(|k| value(values, k))
        .sum();

    if profile.prefer_pv_total {
        if let Some(total) = profile
            .pv_total_key
            .as_deref()
            .and_then(|k| value(values, k))
            .filter(|v| *v != 0.0)
        {
            return total;
        }
    }

    sum
}

fn battery_power(profile: &VariantProfile, values: &RegisterValues) -> f64 {
    let raw = candidate(profile.power_candidates, values, &profile.battery_power_keys)
        .unwrap_or(0.0);

    if raw < 0.0 || (profile.battery_power_signed && raw != 0.0) {
        return raw;
    }
    if raw == 0.0 {
        return 0.0;
    }

    let magnitude = raw.abs();
    let line = code(values, profile.battery_line_key.as_deref());
    let status = code(values, profile.battery_status_key.as_deref());

    // line: 1=discharging 2=charging, status: 1=charging 2=discharging
    let discharging = match (line, status) {
        (Some(1), _) => true,
        (Some(2), _) => false,
        (_, Some(1)) => false,
        (_, Some(2)) => true,
        _ => false,
    };

    if discharging {
        -magnitude
    } else {
        magnitude
    }
}

fn load_power(profile: &VariantProfile, values: &RegisterValues) -> f64 {
    first_present(values, &profile.load_power_keys)
        .unwrap_or(0.0)
        .abs()
}

fn grid_power(profile: &VariantProfile, values: &RegisterValues, load: f64, pv: f64, battery: f64) -> f64 {
    // a meter reading 0 is a reading; balance only when no meter is there
    match candidate(profile.power_candidates, values, &profile.grid_power_keys) {
        Some(g) => g,
        None => load - pv + battery,
    }
}

fn battery_soc(profile: &VariantProfile, values: &RegisterValues) -> f64 {
    for key in &profile.soc_keys {
        match value(values, key) {
            Some(soc) if (0.0..=100.0).contains(&soc) => return soc,
            Some(soc) => warn!("ignoring {} = {}, outside 0..=100", key, soc),
            None => {}
        }
    }

    0.0
}

fn mode_code(profile: &VariantProfile, values: &RegisterValues) -> u16 {
    code(values, profile.pattern_mode_key.as_deref())
        .filter(|c| *c != 0)
        .or_else(|| code(values, Some(profile.run_mode_key.as_str())))
        .unwrap_or(0)
}

fn split(value: f64) -> (f64, f64) {
    if value >= 0.0 {
        (value, 0.0)
    } else {
        (0.0, -value)
    }
}

fn line(value: f64) -> u8 {
    if value > 0.0 {
        2
    } else if value < 0.0 {
        1
    } else {
        0
    }
}

/// Builds a snapshot from one frame's resolved register values.
///
/// Total: missing inputs count as zero. Every key in `table` ends up in
/// `registers`, defaulted to 0 when the frame didn't carry it.
pub fn synthesize(profile: &VariantProfile, table: &RegisterTable, mut values: RegisterValues) -> TelemetrySnapshot {
    let pv1_power = value(&values, "pv1Power").unwrap_or(0.0);
    let pv2_power = value(&values, "pv2Power").unwrap_or(0.0);
    let pv_power = pv_power(profile, &values);

    let load_power = load_power(profile, &values);
    let battery_power = battery_power(profile, &values);
    let grid_power = grid_power(profile, &values, load_power, pv_power, battery_power);

    let (grid_import, grid_export) = split(grid_power);
    let (battery_import, battery_export) = split(battery_power);
    let battery_status = BatteryStatus::from_power(battery_power);

    let battery_soc = battery_soc(profile, &values);

    let mode_code = mode_code(profile, &values);
    let grid_mode = code(&values, Some(profile.grid_mode_key.as_str())).unwrap_or(0);

    for rule in &profile.rescale {
        if let Some(v) = values.get_mut(&rule.key) {
            let scaled = rule.apply(*v);
            if scaled != *v {
                debug!("rescaled {} from {} to {}", rule.key, v, scaled);
                *v = scaled;
            }
        }
    }
    let rated_power = first_non_zero(&values, &profile.rated_power_keys).unwrap_or(0.0);

    for key in table.keys() {
        values.entry(key.to_owned()).or_insert(0.0);
    }

    let get = |key: &str| values.get(key).copied().unwrap_or(0.0);

    TelemetrySnapshot {
        pv_power,
        pv1_power,
        pv2_power,
        grid_power,
        grid_import,
        grid_export,
        battery_power,
        battery_import,
        battery_export,
        battery_status,
        battery_status_text: battery_status.as_str().to_owned(),
        load_power,
        battery_soc,
        daily_energy_generation: get("dailyEnergyGeneration"),
        total_energy_generation: get("totalEnergyGeneration"),
        daily_power_consumption: get("dailyPowerConsumption"),
        total_power_consumption: get("totalEconsumption"),
        daily_batt_charge_energy: get("dailyBattChargeEnergy"),
        daily_batt_discharge_energy: get("dailyBattDischargeEnergy"),
        daily_grid_import_energy: get("dailyOnGridElecConsumption"),
        daily_grid_export_energy: get("dailyGridConnectionPower"),
        rated_power,
        mode_code,
        mode_label: ModeString::from_value(mode_code),
        grid_mode,
        grid_mode_label: GridModeString::from_value(grid_mode),
        grid_line: line(grid_power),
        battery_line: line(battery_power),
        pv_line: u8::from(pv_power > 0.0),
        load_line: u8::from(load_power > 0.0),
        registers: values,
    }
}
// }}}
