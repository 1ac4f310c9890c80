//! Vital-sign snapshots and their boundary validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Canonical factor names, in evaluation order
pub mod factors {
    pub const SYSTOLIC_BP: &str = "systolic_bp";
    pub const DIASTOLIC_BP: &str = "diastolic_bp";
    pub const HEART_RATE: &str = "heart_rate";
    pub const BLOOD_GLUCOSE: &str = "blood_glucose";
    pub const TEMPERATURE: &str = "temperature";
    pub const WEIGHT: &str = "weight";
    pub const GESTATIONAL_WEEK: &str = "gestational_week";

    pub const ALL: [&str; 7] = [
        SYSTOLIC_BP,
        DIASTOLIC_BP,
        HEART_RATE,
        BLOOD_GLUCOSE,
        TEMPERATURE,
        WEIGHT,
        GESTATIONAL_WEEK,
    ];
}

/// Plausible measurement ranges (inclusive). Values outside are data-entry
/// errors, not clinical findings.
const PLAUSIBLE_RANGES: [(&str, f64, f64); 7] = [
    (factors::SYSTOLIC_BP, 0.0, 300.0),
    (factors::DIASTOLIC_BP, 0.0, 200.0),
    (factors::HEART_RATE, 0.0, 300.0),
    (factors::BLOOD_GLUCOSE, 0.0, 1000.0),
    (factors::TEMPERATURE, 25.0, 45.0),
    (factors::WEIGHT, 0.0, 400.0),
    (factors::GESTATIONAL_WEEK, 0.0, 45.0),
];

/// Field names used by older clients
const FIELD_ALIASES: [(&str, &str); 3] = [
    ("bp_systolic", factors::SYSTOLIC_BP),
    ("bp_diastolic", factors::DIASTOLIC_BP),
    ("glucose", factors::BLOOD_GLUCOSE),
];

/// One set of measurements for a patient. Absent fields are not evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalsSnapshot {
    pub patient_id: String,
    /// mmHg
    #[serde(default, alias = "bp_systolic")]
    pub systolic_bp: Option<f64>,
    /// mmHg
    #[serde(default, alias = "bp_diastolic")]
    pub diastolic_bp: Option<f64>,
    /// beats per minute
    #[serde(default)]
    pub heart_rate: Option<f64>,
    /// mg/dL
    #[serde(default, alias = "glucose")]
    pub blood_glucose: Option<f64>,
    /// kg
    #[serde(default)]
    pub weight: Option<f64>,
    /// °C
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub gestational_week: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl VitalsSnapshot {
    /// A snapshot with no measurements
    pub fn empty(patient_id: impl Into<String>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            patient_id: patient_id.into(),
            systolic_bp: None,
            diastolic_bp: None,
            heart_rate: None,
            blood_glucose: None,
            weight: None,
            temperature: None,
            gestational_week: None,
            recorded_at,
        }
    }

    /// Look up a measurement by canonical factor name
    pub fn get(&self, factor: &str) -> Option<f64> {
        match factor {
            factors::SYSTOLIC_BP => self.systolic_bp,
            factors::DIASTOLIC_BP => self.diastolic_bp,
            factors::HEART_RATE => self.heart_rate,
            factors::BLOOD_GLUCOSE => self.blood_glucose,
            factors::TEMPERATURE => self.temperature,
            factors::WEIGHT => self.weight,
            factors::GESTATIONAL_WEEK => self.gestational_week,
            _ => None,
        }
    }

    fn slot_mut(&mut self, factor: &str) -> Option<&mut Option<f64>> {
        match factor {
            factors::SYSTOLIC_BP => Some(&mut self.systolic_bp),
            factors::DIASTOLIC_BP => Some(&mut self.diastolic_bp),
            factors::HEART_RATE => Some(&mut self.heart_rate),
            factors::BLOOD_GLUCOSE => Some(&mut self.blood_glucose),
            factors::TEMPERATURE => Some(&mut self.temperature),
            factors::WEIGHT => Some(&mut self.weight),
            factors::GESTATIONAL_WEEK => Some(&mut self.gestational_week),
            _ => None,
        }
    }

    /// Present measurements in canonical factor order
    pub fn measurements(&self) -> Vec<(&'static str, f64)> {
        factors::ALL
            .iter()
            .filter_map(|name| self.get(name).map(|v| (*name, v)))
            .collect()
    }

    /// Build a snapshot from an untyped JSON object, rejecting non-numeric
    /// measurement values. `recorded_at` defaults to `now` when missing.
    pub fn from_json(value: &Value, now: DateTime<Utc>) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::validation("vitals payload must be a JSON object"))?;

        let patient_id = match object.get("patient_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::validation("patient_id is required")),
        };

        let recorded_at = match object.get("recorded_at") {
            None | Some(Value::Null) => now,
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::validation(format!("recorded_at: {}", e)))?,
            Some(_) => return Err(Error::validation("recorded_at must be an RFC 3339 string")),
        };

        let mut snapshot = Self::empty(patient_id, recorded_at);
        let mut malformed = Vec::new();
        let mut conflicts = Vec::new();
        // factor -> key that set it
        let mut set_by: Vec<(&str, &str)> = Vec::new();

        let keys = factors::ALL
            .iter()
            .map(|name| (*name, *name))
            .chain(FIELD_ALIASES.iter().copied());

        for (key, factor) in keys {
            let parsed = match object.get(key) {
                None | Some(Value::Null) => continue,
                Some(Value::Number(n)) => n.as_f64(),
                Some(_) => None,
            };
            match (parsed, snapshot.slot_mut(factor)) {
                (Some(v), Some(slot)) => match slot.as_ref().copied() {
                    Some(existing) if existing != v => {
                        let first = set_by
                            .iter()
                            .find(|(f, _)| *f == factor)
                            .map_or(factor, |(_, k)| *k);
                        conflicts.push(format!("{}={} vs {}={}", first, existing, key, v));
                    }
                    Some(_) => {}
                    None => {
                        *slot = Some(v);
                        set_by.push((factor, key));
                    }
                },
                _ => malformed.push(key),
            }
        }

        if !malformed.is_empty() {
            return Err(Error::validation(format!(
                "non-numeric vitals: {}",
                malformed.join(", ")
            )));
        }
        if !conflicts.is_empty() {
            return Err(Error::validation(format!(
                "conflicting vitals: {}",
                conflicts.join("; ")
            )));
        }

        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Reject non-finite and physiologically impossible values
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        for (name, low, high) in PLAUSIBLE_RANGES {
            if let Some(v) = self.get(name) {
                if !v.is_finite() {
                    problems.push(format!("{} is not a finite number", name));
                } else if v < low || v > high {
                    problems.push(format!("{}={} outside {}..={}", name, v, low, high));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(problems.join("; ")))
        }
    }
}
