mod cascade;
mod engine;
mod resolve;
mod slug;
mod types;

pub use cascade::{Cascade, CategoryOption, ModelOption, Selection, YearOption};
pub use engine::{NotEligible, compute_duty, depreciation_rate};
pub use resolve::{MODEL_SLUG_FALLBACK, ResolvedRoute, resolve, resolve_path};
pub use slug::{sibling_slugs, slugify};
pub use types::{
    DutyBreakdown, DutyPolicy, EngineDisplacement, ModelVariant, ReferenceTable, TableError,
};
