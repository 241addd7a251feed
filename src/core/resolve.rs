use super::slug::{sibling_slugs, slugify};
use super::types::{ModelVariant, ReferenceTable};

pub const MODEL_SLUG_FALLBACK: &str = "model";

/// A resolved route at the deepest depth the path reached.
///
/// Resolution says nothing about import eligibility: a year segment outside
/// the eligible range still resolves, and the duty engine reports the block.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedRoute<'a> {
    Category {
        category: &'a str,
    },
    Make {
        category: &'a str,
        make: &'a str,
    },
    Model {
        category: &'a str,
        make: &'a str,
        variant: &'a ModelVariant,
        model_slug: String,
    },
    ModelYear {
        category: &'a str,
        make: &'a str,
        variant: &'a ModelVariant,
        model_slug: String,
        year: i32,
    },
}

impl ResolvedRoute<'_> {
    pub fn canonical_path(&self) -> String {
        match self {
            ResolvedRoute::Category { category } => format!("/{}/", slugify(category)),
            ResolvedRoute::Make { category, make } => {
                format!("/{}/{}/", slugify(category), slugify(make))
            }
            ResolvedRoute::Model {
                category,
                make,
                model_slug,
                ..
            } => format!("/{}/{}/{}/", slugify(category), slugify(make), model_slug),
            ResolvedRoute::ModelYear {
                category,
                make,
                model_slug,
                year,
                ..
            } => format!(
                "/{}/{}/{}/{}/",
                slugify(category),
                slugify(make),
                model_slug,
                year
            ),
        }
    }
}

/// Resolve 1–4 path segments against the table by repeated slug lookup.
///
/// Categories and makes are matched by flat `slugify` comparison (the
/// curated lists are assumed slug-unique); model slugs run the full
/// sibling-collision pass so positional suffixes round-trip. A non-numeric
/// year segment fails closed to a miss.
pub fn resolve<'a>(table: &'a ReferenceTable, segments: &[&str]) -> Option<ResolvedRoute<'a>> {
    let (category_slug, rest) = segments.split_first()?;
    let category = table
        .categories
        .iter()
        .find(|name| slugify(name) == *category_slug)
        .map(String::as_str)?;

    let Some((make_slug, rest)) = rest.split_first() else {
        return Some(ResolvedRoute::Category { category });
    };
    let makes = table.makes(category)?;
    let make = makes
        .keys()
        .find(|name| slugify(name) == *make_slug)
        .map(String::as_str)?;

    let Some((model_slug, rest)) = rest.split_first() else {
        return Some(ResolvedRoute::Make { category, make });
    };
    let models = makes.get(make)?;
    let slugs = sibling_slugs(
        models.iter().map(|m| m.model.as_str()),
        MODEL_SLUG_FALLBACK,
    );
    let index = slugs.iter().position(|slug| slug == model_slug)?;
    let variant = &models[index];

    let Some((year_str, rest)) = rest.split_first() else {
        return Some(ResolvedRoute::Model {
            category,
            make,
            variant,
            model_slug: slugs[index].clone(),
        });
    };
    if !rest.is_empty() {
        return None;
    }
    let year: i32 = year_str.parse().ok()?;
    Some(ResolvedRoute::ModelYear {
        category,
        make,
        variant,
        model_slug: slugs[index].clone(),
        year,
    })
}

/// Resolve a URL path like `/suv/toyota/rav4/2024/`.
pub fn resolve_path<'a>(table: &'a ReferenceTable, path: &str) -> Option<ResolvedRoute<'a>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    resolve(table, &segments)
}
