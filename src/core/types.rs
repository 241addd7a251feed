use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to read reference table: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse reference table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid reference table: {0}")]
    Invalid(String),
}

/// Engine displacement as shipped in the CRSP data: either a cc count or a
/// free-text descriptor such as "Electric".
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EngineDisplacement {
    Cc(u32),
    Text(String),
}

impl EngineDisplacement {
    pub fn display(&self) -> String {
        match self {
            EngineDisplacement::Cc(cc) => format!("{cc}cc"),
            EngineDisplacement::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelVariant {
    pub model: String,
    pub crsp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<EngineDisplacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
}

impl ModelVariant {
    /// Descriptive parts rendered next to the model name, in fixed order:
    /// displacement, fuel (title-cased), transmission.
    pub fn meta_parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(cc) = &self.cc {
            parts.push(cc.display());
        }
        if let Some(fuel) = &self.fuel {
            if !fuel.is_empty() {
                parts.push(title_case(fuel));
            }
        }
        if let Some(tx) = &self.tx {
            if !tx.is_empty() {
                parts.push(tx.clone());
            }
        }
        parts
    }

    pub fn meta_line(&self) -> String {
        self.meta_parts().join(" · ")
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// The CRSP reference table: category → make → ordered model variants.
///
/// Loaded once at startup and never mutated. Model list order within a make
/// is significant: slug disambiguation appends list positions.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceTable {
    pub categories: Vec<String>,
    pub data: BTreeMap<String, BTreeMap<String, Vec<ModelVariant>>>,
}

impl ReferenceTable {
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, TableError> {
        let table: Self = serde_json::from_str(raw)?;
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), TableError> {
        if self.categories.is_empty() {
            return Err(TableError::Invalid("no categories".into()));
        }
        for (i, category) in self.categories.iter().enumerate() {
            if self.categories[..i].contains(category) {
                return Err(TableError::Invalid(format!(
                    "duplicate category {category:?}"
                )));
            }
        }
        for (category, makes) in &self.data {
            if !self.categories.contains(category) {
                return Err(TableError::Invalid(format!(
                    "data category {category:?} missing from categories list"
                )));
            }
            for (make, models) in makes {
                if models.is_empty() {
                    return Err(TableError::Invalid(format!(
                        "{category} / {make} has no models"
                    )));
                }
                for variant in models {
                    if !variant.crsp.is_finite() || variant.crsp <= 0.0 {
                        return Err(TableError::Invalid(format!(
                            "{category} / {make} / {} has non-positive reference price",
                            variant.model
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn makes(&self, category: &str) -> Option<&BTreeMap<String, Vec<ModelVariant>>> {
        self.data.get(category)
    }

    pub fn models(&self, category: &str, make: &str) -> Option<&[ModelVariant]> {
        self.data.get(category)?.get(make).map(Vec::as_slice)
    }
}

/// KRA policy parameters. Rates are fractions, the IDF floor is in KES.
/// All of these are configuration: the CLI can override any of them.
#[derive(Debug, Clone)]
pub struct DutyPolicy {
    pub current_year: i32,
    pub max_age: i32,
    pub valuation_divisor: f64,
    pub import_duty_rate: f64,
    pub excise_rate: f64,
    pub vat_rate: f64,
    pub idf_rate: f64,
    pub idf_floor: f64,
    pub rdl_rate: f64,
    /// Ordered (age ceiling, depreciation rate) pairs; first matching
    /// ceiling wins.
    pub depreciation_tiers: Vec<(i32, f64)>,
}

impl Default for DutyPolicy {
    fn default() -> Self {
        Self {
            current_year: 2026,
            max_age: 8,
            valuation_divisor: 2.4469,
            import_duty_rate: 0.25,
            excise_rate: 0.20,
            vat_rate: 0.16,
            idf_rate: 0.0225,
            idf_floor: 5_000.0,
            rdl_rate: 0.015,
            depreciation_tiers: vec![
                (1, 0.00),
                (2, 0.20),
                (3, 0.30),
                (4, 0.40),
                (5, 0.50),
                (6, 0.55),
                (7, 0.60),
                (8, 0.65),
            ],
        }
    }
}

impl DutyPolicy {
    /// Import-eligible manufacture years, newest first.
    pub fn eligible_years(&self) -> impl Iterator<Item = i32> + '_ {
        (self.current_year - self.max_age..=self.current_year).rev()
    }

    pub fn cutoff_year(&self) -> i32 {
        self.current_year - self.max_age
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyBreakdown {
    pub age: i32,
    pub depreciation_rate: f64,
    pub pre_depreciation_value: f64,
    pub customs_value: f64,
    pub import_duty: f64,
    pub excise_duty: f64,
    pub vat: f64,
    pub idf_levy: f64,
    pub railway_levy: f64,
    pub total_duty: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "categories": ["SUV", "Sedan"],
      "data": {
        "SUV": {
          "Toyota": [
            {"model": "RAV4", "cc": 1986, "fuel": "GASOLINE", "tx": "AT", "crsp": 4853000},
            {"model": "Harrier", "cc": 1986, "fuel": "HYBRID", "crsp": 5650000}
          ]
        },
        "Sedan": {
          "Nissan": [
            {"model": "Leaf", "cc": "Electric", "crsp": 3100000}
          ]
        }
      }
    }"#;

    #[test]
    fn parses_and_validates_sample_table() {
        let table = ReferenceTable::from_json(SAMPLE).expect("valid table");
        assert_eq!(table.categories, vec!["SUV", "Sedan"]);
        let models = table.models("SUV", "Toyota").expect("toyota models");
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].model, "RAV4");
        assert_eq!(models[0].cc, Some(EngineDisplacement::Cc(1986)));
    }

    #[test]
    fn displacement_accepts_text_descriptor() {
        let table = ReferenceTable::from_json(SAMPLE).expect("valid table");
        let leaf = &table.models("Sedan", "Nissan").expect("nissan models")[0];
        assert_eq!(
            leaf.cc,
            Some(EngineDisplacement::Text("Electric".to_string()))
        );
        assert_eq!(leaf.cc.as_ref().expect("cc").display(), "Electric");
    }

    #[test]
    fn rejects_category_missing_from_list() {
        let raw = r#"{
          "categories": ["SUV"],
          "data": {"Bus": {"Isuzu": [{"model": "NQR", "crsp": 5000000}]}}
        }"#;
        let err = ReferenceTable::from_json(raw).expect_err("must reject");
        assert!(matches!(err, TableError::Invalid(_)));
    }

    #[test]
    fn rejects_non_positive_reference_price() {
        let raw = r#"{
          "categories": ["SUV"],
          "data": {"SUV": {"Toyota": [{"model": "RAV4", "crsp": 0}]}}
        }"#;
        let err = ReferenceTable::from_json(raw).expect_err("must reject");
        assert!(matches!(err, TableError::Invalid(_)));
    }

    #[test]
    fn rejects_duplicate_category_names() {
        let raw = r#"{
          "categories": ["SUV", "SUV"],
          "data": {"SUV": {"Toyota": [{"model": "RAV4", "crsp": 1000000}]}}
        }"#;
        let err = ReferenceTable::from_json(raw).expect_err("must reject");
        assert!(matches!(err, TableError::Invalid(_)));
    }

    #[test]
    fn meta_line_orders_and_title_cases_parts() {
        let table = ReferenceTable::from_json(SAMPLE).expect("valid table");
        let rav4 = &table.models("SUV", "Toyota").expect("models")[0];
        assert_eq!(rav4.meta_line(), "1986cc · Gasoline · AT");
        let harrier = &table.models("SUV", "Toyota").expect("models")[1];
        assert_eq!(harrier.meta_line(), "1986cc · Hybrid");
    }

    #[test]
    fn eligible_years_run_newest_to_cutoff() {
        let policy = DutyPolicy::default();
        let years: Vec<i32> = policy.eligible_years().collect();
        assert_eq!(years.first(), Some(&2026));
        assert_eq!(years.last(), Some(&2018));
        assert_eq!(years.len(), 9);
    }
}
