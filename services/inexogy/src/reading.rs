use crate::meter::MeterType;
use metersign_core::time::{format_datetime, format_datetime_ms};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reading: a millisecond timestamp plus named numeric channels.
///
/// Which channels appear depends on the meter type: standard meters report
/// `power`, `energy`, `energyOut`; RLM meters report register codes such as
/// `1.8.0` or `21.25`. Use [`NormalizedReading::derive`] to get comparable
/// units out of either.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Reading {
    /// Measurement time, epoch milliseconds.
    pub time: i64,
    /// Channel name to raw value.
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl Reading {
    /// Measurement time as whole unix seconds.
    pub fn timestamp(&self) -> i64 {
        self.time.div_euclid(1000)
    }

    /// Measurement time formatted with second precision.
    pub fn datetime(&self) -> String {
        format_datetime(self.time)
    }

    /// Measurement time formatted with millisecond precision.
    pub fn datetime_ms(&self) -> String {
        format_datetime_ms(self.time)
    }

    /// Raw value of a named channel.
    pub fn channel(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// A reading normalized to comparable units.
///
/// Produced by one explicit transform over the raw record and the meter type
/// tag; nothing here is recomputed or persisted elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedReading {
    /// Measurement time, epoch milliseconds.
    pub time: i64,
    /// Raw power value: the `power` channel, or the three-phase register sum
    /// for RLM meters.
    pub power: Option<f64>,
    /// Power in watts.
    pub power_w: Option<f64>,
    /// Power in kilowatts.
    pub power_kw: Option<f64>,
    /// Raw consumed-energy value.
    pub energy: Option<f64>,
    /// Consumed energy in watt hours.
    pub energy_wh: Option<f64>,
    /// Consumed energy in kilowatt hours.
    pub energy_kwh: Option<f64>,
    /// Raw delivered-energy value.
    pub energy_out: Option<f64>,
    /// Delivered energy in watt hours.
    pub energy_out_wh: Option<f64>,
    /// Delivered energy in kilowatt hours.
    pub energy_out_kwh: Option<f64>,
}

/// A raw energy value with its per-source divisors down to Wh and kWh.
type EnergySource = (f64, f64, f64);

impl NormalizedReading {
    /// Normalize a reading for the given meter type.
    ///
    /// The tag decides which channel family is preferred; the other family
    /// still acts as a fallback, so a catalog that mislabels a meter does not
    /// turn its readings into empty views.
    pub fn derive(reading: &Reading, meter_type: MeterType) -> Self {
        let named_power = reading.channel("power");
        let phase_sum = match (
            reading.channel("21.25"),
            reading.channel("41.25"),
            reading.channel("61.25"),
        ) {
            (Some(l1), Some(l2), Some(l3)) => Some(l1 + l2 + l3),
            _ => None,
        };

        // Named energy channels carry 10 nWh resolution, registers carry mWh.
        let named_energy: Option<EnergySource> = reading.channel("energy").map(|e| (e, 1e7, 1e10));
        let register_energy: Option<EnergySource> =
            reading.channel("1.8.0").map(|e| (e, 1e3, 1e6));
        let named_energy_out: Option<EnergySource> =
            reading.channel("energyOut").map(|e| (e, 1e7, 1e10));
        let register_energy_out: Option<EnergySource> =
            reading.channel("2.8.0").map(|e| (e, 1e3, 1e6));

        let (power, energy, energy_out) = match meter_type {
            MeterType::Standard => (
                named_power.or(phase_sum),
                named_energy.or(register_energy),
                named_energy_out.or(register_energy_out),
            ),
            MeterType::Rlm => (
                phase_sum.or(named_power),
                register_energy.or(named_energy),
                register_energy_out.or(named_energy_out),
            ),
        };

        let (energy, energy_wh, energy_kwh) = scale(energy);
        let (energy_out, energy_out_wh, energy_out_kwh) = scale(energy_out);

        Self {
            time: reading.time,
            power,
            power_w: power.map(|p| p / 1e3),
            power_kw: power.map(|p| p / 1e6),
            energy,
            energy_wh,
            energy_kwh,
            energy_out,
            energy_out_wh,
            energy_out_kwh,
        }
    }
}

fn scale(source: Option<EnergySource>) -> (Option<f64>, Option<f64>, Option<f64>) {
    match source {
        Some((raw, wh_div, kwh_div)) => (Some(raw), Some(raw / wh_div), Some(raw / kwh_div)),
        None => (None, None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reading(pairs: &[(&str, f64)]) -> Reading {
        Reading {
            time: 1_634_704_029_042,
            values: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_reading_deserializes_provider_shape() {
        let reading: Reading = serde_json::from_str(
            r#"{"time": 1634704029042, "values": {"power": 2500000.0, "energy": 12340000000.0}}"#,
        )
        .unwrap();

        assert_eq!(reading.time, 1_634_704_029_042);
        assert_eq!(reading.channel("power"), Some(2_500_000.0));
        assert_eq!(reading.timestamp(), 1_634_704_029);
        assert_eq!(reading.datetime(), "2021-10-20 04:27:09");
        assert_eq!(reading.datetime_ms(), "2021-10-20 04:27:09.042");
    }

    #[test]
    fn test_normalize_standard_meter() {
        let normalized = NormalizedReading::derive(
            &reading(&[
                ("power", 2_500_000.0),
                ("energy", 12_340_000_000.0),
                ("energyOut", 98_700_000_000.0),
            ]),
            MeterType::Standard,
        );

        assert_eq!(normalized.power, Some(2_500_000.0));
        assert_eq!(normalized.power_w, Some(2_500.0));
        assert_eq!(normalized.power_kw, Some(2.5));
        assert_eq!(normalized.energy_wh, Some(1_234.0));
        assert_eq!(normalized.energy_kwh, Some(1.234));
        assert_eq!(normalized.energy_out_wh, Some(9_870.0));
        assert_eq!(normalized.energy_out_kwh, Some(9.87));
    }

    #[test]
    fn test_normalize_rlm_meter() {
        let normalized = NormalizedReading::derive(
            &reading(&[
                ("1.8.0", 5_000_000.0),
                ("2.8.0", 1_000_000.0),
                ("21.25", 1_000.0),
                ("41.25", 2_000.0),
                ("61.25", 3_000.0),
            ]),
            MeterType::Rlm,
        );

        // Three-phase power is the register sum, scaled as one value.
        assert_eq!(normalized.power, Some(6_000.0));
        assert_eq!(normalized.power_w, Some(6.0));
        assert_eq!(normalized.power_kw, Some(0.006));
        assert_eq!(normalized.energy, Some(5_000_000.0));
        assert_eq!(normalized.energy_wh, Some(5_000.0));
        assert_eq!(normalized.energy_kwh, Some(5.0));
        assert_eq!(normalized.energy_out_wh, Some(1_000.0));
        assert_eq!(normalized.energy_out_kwh, Some(1.0));
    }

    #[test]
    fn test_normalize_prefers_tagged_family() {
        let mixed = reading(&[("power", 1_000.0), ("21.25", 10.0), ("41.25", 10.0), ("61.25", 10.0)]);

        let standard = NormalizedReading::derive(&mixed, MeterType::Standard);
        assert_eq!(standard.power, Some(1_000.0));

        let rlm = NormalizedReading::derive(&mixed, MeterType::Rlm);
        assert_eq!(rlm.power, Some(30.0));
    }

    #[test]
    fn test_normalize_falls_back_across_families() {
        // An RLM-tagged meter with only named channels still normalizes.
        let named_only = reading(&[("power", 1_000.0)]);
        let rlm = NormalizedReading::derive(&named_only, MeterType::Rlm);
        assert_eq!(rlm.power, Some(1_000.0));

        // A partial register set never yields a phase sum.
        let partial = reading(&[("21.25", 10.0), ("41.25", 10.0)]);
        let rlm = NormalizedReading::derive(&partial, MeterType::Rlm);
        assert_eq!(rlm.power, None);
    }

    #[test]
    fn test_normalize_empty_reading() {
        let normalized = NormalizedReading::derive(&reading(&[]), MeterType::Standard);
        assert_eq!(normalized, NormalizedReading {
            time: 1_634_704_029_042,
            ..Default::default()
        });
    }
}
