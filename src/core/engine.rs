use thiserror::Error;

use super::types::{DutyBreakdown, DutyPolicy};

/// Policy-blocked computation: the vehicle exists but may not be imported.
/// Distinct from a route miss, which is an `Option::None` at the resolver.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotEligible {
    #[error("manufacture year is after the current policy year")]
    FutureYear,
    #[error("vehicle is over the {max_age}-year import age limit")]
    OverAgeLimit { max_age: i32 },
}

/// Depreciation for a vehicle age: first matching ceiling wins, ascending.
/// Callers must reject negative ages first; `None` means over-age.
pub fn depreciation_rate(age: i32, policy: &DutyPolicy) -> Option<f64> {
    debug_assert!(age >= 0);
    policy
        .depreciation_tiers
        .iter()
        .find(|(ceiling, _)| age <= *ceiling)
        .map(|(_, rate)| *rate)
}

/// The full KRA duty pipeline. Pure: the same inputs always produce the
/// same breakdown. No rounding happens here; presentation rounds.
pub fn compute_duty(
    reference_price: f64,
    manufacture_year: i32,
    policy: &DutyPolicy,
) -> Result<DutyBreakdown, NotEligible> {
    let age = policy.current_year - manufacture_year;
    if age < 0 {
        return Err(NotEligible::FutureYear);
    }
    if age > policy.max_age {
        return Err(NotEligible::OverAgeLimit {
            max_age: policy.max_age,
        });
    }
    let depreciation = depreciation_rate(age, policy).ok_or(NotEligible::OverAgeLimit {
        max_age: policy.max_age,
    })?;

    let pre_depreciation_value = reference_price / policy.valuation_divisor;
    let customs_value = pre_depreciation_value * (1.0 - depreciation);
    let import_duty = customs_value * policy.import_duty_rate;
    let excise_duty = (customs_value + import_duty) * policy.excise_rate;
    let vat = (customs_value + import_duty + excise_duty) * policy.vat_rate;
    let idf_levy = (customs_value * policy.idf_rate).max(policy.idf_floor);
    let railway_levy = customs_value * policy.rdl_rate;
    let total_duty = import_duty + excise_duty + vat + idf_levy + railway_levy;

    Ok(DutyBreakdown {
        age,
        depreciation_rate: depreciation,
        pre_depreciation_value,
        customs_value,
        import_duty,
        excise_duty,
        vat,
        idf_levy,
        railway_levy,
        total_duty,
    })
}
