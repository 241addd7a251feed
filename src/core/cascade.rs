use serde::Serialize;

use super::engine::{NotEligible, compute_duty};
use super::slug::slugify;
use super::types::{DutyBreakdown, DutyPolicy, ModelVariant, ReferenceTable};

/// The four-stage selection, held as one immutable value. Every transition
/// returns a replacement value with all deeper stages discarded, so stale
/// state cannot leak forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    Root,
    Category {
        category: String,
    },
    Make {
        category: String,
        make: String,
    },
    Model {
        category: String,
        make: String,
        index: usize,
    },
    Year {
        category: String,
        make: String,
        index: usize,
        year: i32,
    },
}

impl Selection {
    pub fn category(&self) -> Option<&str> {
        match self {
            Selection::Root => None,
            Selection::Category { category }
            | Selection::Make { category, .. }
            | Selection::Model { category, .. }
            | Selection::Year { category, .. } => Some(category),
        }
    }

    pub fn make(&self) -> Option<&str> {
        match self {
            Selection::Make { make, .. }
            | Selection::Model { make, .. }
            | Selection::Year { make, .. } => Some(make),
            _ => None,
        }
    }

    pub fn model_index(&self) -> Option<usize> {
        match self {
            Selection::Model { index, .. } | Selection::Year { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            Selection::Year { year, .. } => Some(*year),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOption {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOption {
    pub index: usize,
    pub label: String,
    pub reference_price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YearOption {
    pub year: i32,
    pub age: i32,
    pub eligible: bool,
}

/// Orchestration over the table and policy. Owns no arithmetic of its own;
/// every figure comes out of the duty engine.
pub struct Cascade<'a> {
    table: &'a ReferenceTable,
    policy: &'a DutyPolicy,
}

impl<'a> Cascade<'a> {
    pub fn new(table: &'a ReferenceTable, policy: &'a DutyPolicy) -> Self {
        Self { table, policy }
    }

    pub fn select_category(&self, name: &str) -> Option<Selection> {
        let category = self.table.categories.iter().find(|c| *c == name)?;
        Some(Selection::Category {
            category: category.clone(),
        })
    }

    pub fn select_make(&self, selection: &Selection, make: &str) -> Option<Selection> {
        let category = selection.category()?;
        self.table.makes(category)?.get(make)?;
        Some(Selection::Make {
            category: category.to_string(),
            make: make.to_string(),
        })
    }

    pub fn select_model(&self, selection: &Selection, index: usize) -> Option<Selection> {
        let category = selection.category()?;
        let make = selection.make()?;
        let models = self.table.models(category, make)?;
        if index >= models.len() {
            return None;
        }
        Some(Selection::Model {
            category: category.to_string(),
            make: make.to_string(),
            index,
        })
    }

    pub fn select_year(&self, selection: &Selection, year: i32) -> Option<Selection> {
        let index = selection.model_index()?;
        Some(Selection::Year {
            category: selection.category()?.to_string(),
            make: selection.make()?.to_string(),
            index,
            year,
        })
    }

    pub fn category_options(&self) -> Vec<CategoryOption> {
        self.table
            .categories
            .iter()
            .map(|name| CategoryOption {
                name: name.clone(),
                slug: slugify(name),
            })
            .collect()
    }

    pub fn make_options(&self, selection: &Selection) -> Option<Vec<String>> {
        let makes = self.table.makes(selection.category()?)?;
        // BTreeMap iteration is already alphabetical, the display order.
        Some(makes.keys().cloned().collect())
    }

    pub fn model_options(&self, selection: &Selection) -> Option<Vec<ModelOption>> {
        let models = self
            .table
            .models(selection.category()?, selection.make()?)?;
        Some(
            models
                .iter()
                .enumerate()
                .map(|(index, variant)| ModelOption {
                    index,
                    label: model_label(variant),
                    reference_price: variant.crsp,
                })
                .collect(),
        )
    }

    /// Year grid: newest first, down to two years past the cutoff so the
    /// blocked years are visible (disabled) rather than silently missing.
    pub fn year_options(&self, selection: &Selection) -> Option<Vec<YearOption>> {
        selection.model_index()?;
        let grid_floor = self.policy.cutoff_year() - 2;
        Some(
            (grid_floor..=self.policy.current_year)
                .rev()
                .map(|year| {
                    let age = self.policy.current_year - year;
                    YearOption {
                        year,
                        age,
                        eligible: age <= self.policy.max_age,
                    }
                })
                .collect(),
        )
    }

    pub fn variant(&self, selection: &Selection) -> Option<&'a ModelVariant> {
        let models = self
            .table
            .models(selection.category()?, selection.make()?)?;
        models.get(selection.model_index()?)
    }

    pub fn breakdown(&self, selection: &Selection) -> Option<Result<DutyBreakdown, NotEligible>> {
        let year = selection.year()?;
        let variant = self.variant(selection)?;
        Some(compute_duty(variant.crsp, year, self.policy))
    }
}

fn model_label(variant: &ModelVariant) -> String {
    let meta = variant.meta_line();
    if meta.is_empty() {
        variant.model.clone()
    } else {
        format!("{} ({meta})", variant.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ReferenceTable {
        ReferenceTable::from_json(
            r#"{
              "categories": ["SUV", "Sedan"],
              "data": {
                "SUV": {
                  "Toyota": [
                    {"model": "RAV4", "cc": 1986, "fuel": "GASOLINE", "tx": "AT", "crsp": 4853000},
                    {"model": "Harrier", "cc": 1986, "fuel": "HYBRID", "crsp": 5650000}
                  ],
                  "Mazda": [
                    {"model": "CX-5", "cc": 1998, "crsp": 4200000}
                  ]
                },
                "Sedan": {
                  "Honda": [
                    {"model": "Civic", "cc": 1496, "crsp": 3900000}
                  ]
                }
              }
            }"#,
        )
        .expect("valid table")
    }

    #[test]
    fn forward_cascade_reaches_a_breakdown() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let cascade = Cascade::new(&table, &policy);

        let sel = cascade.select_category("SUV").expect("category");
        let sel = cascade.select_make(&sel, "Toyota").expect("make");
        let sel = cascade.select_model(&sel, 1).expect("model");
        let sel = cascade.select_year(&sel, 2023).expect("year");

        let duty = cascade
            .breakdown(&sel)
            .expect("year stage")
            .expect("2023 is eligible");
        assert_eq!(duty.age, 3);
        assert_eq!(duty.depreciation_rate, 0.30);
    }

    #[test]
    fn reselecting_an_earlier_stage_discards_deeper_state() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let cascade = Cascade::new(&table, &policy);

        let sel = cascade.select_category("SUV").expect("category");
        let sel = cascade.select_make(&sel, "Toyota").expect("make");
        let sel = cascade.select_model(&sel, 0).expect("model");
        let sel = cascade.select_year(&sel, 2024).expect("year");

        let resel = cascade.select_make(&sel, "Mazda").expect("make again");
        assert_eq!(
            resel,
            Selection::Make {
                category: "SUV".to_string(),
                make: "Mazda".to_string(),
            }
        );
        assert_eq!(resel.model_index(), None);
        assert_eq!(resel.year(), None);

        let recat = cascade.select_category("Sedan").expect("category again");
        assert_eq!(recat.make(), None);
    }

    #[test]
    fn invalid_selections_are_rejected() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let cascade = Cascade::new(&table, &policy);

        assert_eq!(cascade.select_category("Bus"), None);

        let sel = cascade.select_category("SUV").expect("category");
        assert_eq!(cascade.select_make(&sel, "Honda"), None);
        assert_eq!(cascade.select_model(&sel, 0), None, "no make selected yet");

        let sel = cascade.select_make(&sel, "Toyota").expect("make");
        assert_eq!(cascade.select_model(&sel, 9), None, "index out of range");
        assert_eq!(cascade.select_year(&sel, 2024), None, "no model selected");
    }

    #[test]
    fn year_grid_marks_blocked_years_instead_of_omitting_them() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let cascade = Cascade::new(&table, &policy);

        let sel = cascade.select_category("SUV").expect("category");
        let sel = cascade.select_make(&sel, "Toyota").expect("make");
        let sel = cascade.select_model(&sel, 0).expect("model");

        let years = cascade.year_options(&sel).expect("model stage");
        assert_eq!(years.first().map(|y| y.year), Some(2026));
        assert_eq!(years.last().map(|y| y.year), Some(2016));
        assert_eq!(years.iter().filter(|y| y.eligible).count(), 9);
        assert!(years.iter().filter(|y| !y.eligible).all(|y| y.age > 8));

        assert_eq!(cascade.year_options(&Selection::Root), None);
    }

    #[test]
    fn blocked_year_selection_surfaces_engine_error() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let cascade = Cascade::new(&table, &policy);

        let sel = cascade.select_category("SUV").expect("category");
        let sel = cascade.select_make(&sel, "Toyota").expect("make");
        let sel = cascade.select_model(&sel, 0).expect("model");
        let sel = cascade.select_year(&sel, 2016).expect("year");

        assert_eq!(
            cascade.breakdown(&sel),
            Some(Err(NotEligible::OverAgeLimit { max_age: 8 }))
        );
    }

    #[test]
    fn model_options_carry_labels_and_prices() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let cascade = Cascade::new(&table, &policy);

        let sel = cascade.select_category("SUV").expect("category");
        let sel = cascade.select_make(&sel, "Toyota").expect("make");
        let options = cascade.model_options(&sel).expect("make stage");

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "RAV4 (1986cc · Gasoline · AT)");
        assert_eq!(options[0].reference_price, 4_853_000.0);
        assert_eq!(options[1].label, "Harrier (1986cc · Hybrid)");
    }

    #[test]
    fn make_options_are_alphabetical() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let cascade = Cascade::new(&table, &policy);

        let sel = cascade.select_category("SUV").expect("category");
        assert_eq!(
            cascade.make_options(&sel),
            Some(vec!["Mazda".to_string(), "Toyota".to_string()])
        );
    }
}
