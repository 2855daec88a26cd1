use metersign_core::time::format_datetime_ms;
use metersign_core::{Error, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// How a meter reports its channels.
///
/// Standard residential meters deliver named channels (`power`, `energy`,
/// `energyOut`); RLM commercial meters deliver raw register codes
/// (`1.8.0`, `21.25`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterType {
    /// Residential meter with named channels.
    Standard,
    /// Registered load profile meter reporting register codes.
    Rlm,
}

/// Street address of a metering location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    /// Street name.
    pub street: String,
    /// House number; the provider delivers both strings and numbers here.
    #[serde(deserialize_with = "string_or_number")]
    pub street_number: String,
    /// Postal code.
    #[serde(deserialize_with = "string_or_number")]
    pub zip: String,
    /// City, possibly carrying a district annotation.
    pub city: String,
    /// Country code.
    pub country: String,
}

/// One physical meter as delivered by the catalog endpoint.
///
/// The provider identifies a meter redundantly by `meterId`, `serialNumber`
/// and `fullSerialNumber`; [`Meter::matches`] accepts any of them. The raw
/// JSON record is kept alongside the typed fields so nothing the provider
/// sends is lost.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meter {
    /// Provider-assigned meter id, the canonical identifier for API calls.
    pub meter_id: String,
    /// Manufacturer code.
    pub manufacturer_id: Option<String>,
    /// Short serial number; delivered as string or number.
    #[serde(deserialize_with = "string_or_number")]
    pub serial_number: String,
    /// Full serial number including manufacturer prefix.
    pub full_serial_number: String,
    /// Grid operator administration number.
    pub administration_number: Option<String>,
    /// Meter hardware type.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Measurement type, `"RLM"` for registered load profile meters.
    pub measurement_type: Option<String>,
    /// Load profile type for RLM meters.
    pub load_profile_type: Option<String>,
    /// Value scaling factor.
    pub scaling_factor: Option<i64>,
    /// Current scaling factor.
    pub current_scaling_factor: Option<i64>,
    /// Voltage scaling factor.
    pub voltage_scaling_factor: Option<i64>,
    /// Number of internal meters.
    pub internal_meters: Option<i64>,
    /// Metering location; virtual meters have none.
    pub location: Option<Location>,
    /// First measurement, epoch milliseconds.
    pub first_measurement_time: Option<i64>,
    /// Last measurement, epoch milliseconds.
    pub last_measurement_time: Option<i64>,

    #[serde(skip)]
    raw: Value,
}

impl Meter {
    /// Build a meter from a raw catalog record, keeping the record.
    pub fn from_raw(raw: Value) -> Result<Self> {
        let mut meter: Meter = serde_json::from_value(raw.clone())
            .map_err(|e| Error::unexpected("undecodable meter record").with_source(e))?;

        if meter.meter_id.is_empty() {
            return Err(Error::unexpected("meter record without meterId"));
        }

        meter.raw = raw;
        Ok(meter)
    }

    /// The raw catalog record this meter was built from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// How this meter reports its channels.
    pub fn meter_type(&self) -> MeterType {
        match &self.measurement_type {
            Some(t) if t.eq_ignore_ascii_case("RLM") => MeterType::Rlm,
            _ => MeterType::Standard,
        }
    }

    /// City of the metering location, `VIRTUAL` for virtual meters.
    pub fn city(&self) -> String {
        match &self.location {
            Some(l) if !l.city.is_empty() => l.city.clone(),
            _ => "VIRTUAL".to_string(),
        }
    }

    /// Formatted address: `street number, country-zip city`.
    ///
    /// The city's district annotation (`... OT <district>` or a parenthesized
    /// suffix) is stripped. Virtual meters format as `VIRTUAL`.
    pub fn address(&self) -> String {
        match &self.location {
            Some(l) if !l.city.is_empty() => format!(
                "{} {}, {}-{} {}",
                l.street,
                l.street_number,
                l.country,
                l.zip,
                strip_district(&l.city)
            ),
            _ => "VIRTUAL".to_string(),
        }
    }

    /// Full serial number with characters 5 and 6 removed.
    ///
    /// EMH meters sometimes differ in position 6 (0 or 1) between the
    /// provider catalog and the printed serial; dropping the position pair
    /// gives a form that is stable across both.
    pub fn full_serial_number_short(&self) -> String {
        let s = &self.full_serial_number;
        let mut short: String = s.chars().take(4).collect();
        short.extend(s.chars().skip(6));
        short
    }

    /// First measurement, formatted with millisecond precision.
    pub fn first_measurement_datetime(&self) -> Option<String> {
        self.first_measurement_time.map(format_datetime_ms)
    }

    /// Last measurement, formatted with millisecond precision.
    pub fn last_measurement_datetime(&self) -> Option<String> {
        self.last_measurement_time.map(format_datetime_ms)
    }

    /// Whether `id` identifies this meter.
    ///
    /// Tries the full serial number, a trailing-8-characters match on it (a
    /// known vendor quirk makes short serials differ by one leading digit),
    /// the serial number and the meter id.
    pub fn matches(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }

        self.full_serial_number == id
            || (!self.full_serial_number.is_empty()
                && last_chars(&self.full_serial_number, 8) == last_chars(id, 8))
            || self.serial_number == id
            || self.meter_id == id
    }
}

/// Accept both JSON strings and numbers as a string field.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Strip a district annotation from a city name.
fn strip_district(city: &str) -> &str {
    let cut = [city.find(" OT "), city.find(" (")]
        .into_iter()
        .flatten()
        .min();

    match cut {
        Some(idx) => city[..idx].trim_end(),
        None => city,
    }
}

/// The trailing `n` characters, or the whole string if shorter.
fn last_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }

    let (idx, _) = s.char_indices().nth(count - n).unwrap_or((0, ' '));
    &s[idx..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Meter {
        Meter::from_raw(serde_json::json!({
            "meterId": "c0ffee1234",
            "manufacturerId": "ESY",
            "serialNumber": 12345678,
            "fullSerialNumber": "ABCD1234EFGH",
            "type": "EASYMETER",
            "measurementType": "ELECTRICITY",
            "scalingFactor": 1,
            "internalMeters": 1,
            "location": {
                "street": "Musterstraße",
                "streetNumber": 7,
                "zip": "04109",
                "city": "Leipzig OT Gohlis",
                "country": "DE"
            },
            "firstMeasurementTime": 1_634_704_029_042i64,
            "lastMeasurementTime": 1_634_790_429_042i64
        }))
        .unwrap()
    }

    #[test]
    fn test_from_raw_types() {
        let meter = sample();
        assert_eq!(meter.meter_id, "c0ffee1234");
        // Numeric serials are normalized to strings.
        assert_eq!(meter.serial_number, "12345678");
        assert_eq!(meter.meter_type(), MeterType::Standard);
        assert_eq!(meter.raw()["manufacturerId"], "ESY");
    }

    #[test]
    fn test_from_raw_rejects_missing_meter_id() {
        assert!(Meter::from_raw(serde_json::json!({"serialNumber": "1"})).is_err());
    }

    #[test]
    fn test_rlm_detection() {
        let meter = Meter::from_raw(serde_json::json!({
            "meterId": "m-rlm",
            "measurementType": "RLM"
        }))
        .unwrap();
        assert_eq!(meter.meter_type(), MeterType::Rlm);
    }

    #[test]
    fn test_address_strips_district() {
        let meter = sample();
        assert_eq!(meter.address(), "Musterstraße 7, DE-04109 Leipzig");
        assert_eq!(meter.city(), "Leipzig OT Gohlis");
    }

    #[test]
    fn test_virtual_meter_address() {
        let meter = Meter::from_raw(serde_json::json!({"meterId": "virtual-1"})).unwrap();
        assert_eq!(meter.address(), "VIRTUAL");
        assert_eq!(meter.city(), "VIRTUAL");
    }

    #[test]
    fn test_full_serial_number_short() {
        // Characters 5 and 6 are dropped.
        assert_eq!(sample().full_serial_number_short(), "ABCD34EFGH");
    }

    #[test]
    fn test_measurement_datetimes() {
        let meter = sample();
        assert_eq!(
            meter.first_measurement_datetime().unwrap(),
            "2021-10-20 04:27:09.042"
        );
        assert_eq!(
            meter.last_measurement_datetime().unwrap(),
            "2021-10-21 04:27:09.042"
        );
    }

    #[test]
    fn test_matches() {
        let meter = sample();

        assert!(meter.matches("ABCD1234EFGH"));
        assert!(meter.matches("12345678"));
        assert!(meter.matches("c0ffee1234"));
        // Trailing-8 match tolerates a differing manufacturer prefix.
        assert!(meter.matches("XYZ_1234EFGH"));

        assert!(!meter.matches("something-else"));
        assert!(!meter.matches(""));
    }

    #[test]
    fn test_strip_district() {
        assert_eq!(strip_district("Leipzig OT Gohlis"), "Leipzig");
        assert_eq!(strip_district("Berlin (Mitte)"), "Berlin");
        assert_eq!(strip_district("Dresden"), "Dresden");
    }
}
