use crate::core::{
    DutyBreakdown, DutyPolicy, MODEL_SLUG_FALLBACK, ModelVariant, NotEligible, ReferenceTable,
    ResolvedRoute, compute_duty, sibling_slugs, slugify,
};

/// Presentation-time rounding: whole shillings, thousands-separated.
pub fn kes(n: f64) -> String {
    format!("KES {}", group_thousands(n.round() as i64))
}

fn group_thousands(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn pct(rate: f64) -> String {
    format!("{}%", (rate * 100.0).round() as i64)
}

/// Like `pct` but keeps fractional digits (the IDF rate is 2.25%).
pub fn pct_precise(rate: f64) -> String {
    let value = rate * 100.0;
    if (value - value.round()).abs() < 1e-9 {
        format!("{}%", value.round() as i64)
    } else {
        format!("{value}%")
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn age_label(age: i32) -> String {
    match age {
        0 => "New".to_string(),
        1 => "1 yr".to_string(),
        n => format!("{n} yrs"),
    }
}

struct Crumb<'a> {
    label: &'a str,
    href: Option<String>,
}

fn breadcrumb(crumbs: &[Crumb<'_>]) -> String {
    let mut parts = Vec::with_capacity(crumbs.len() * 2);
    for (i, crumb) in crumbs.iter().enumerate() {
        let label = escape(crumb.label);
        match &crumb.href {
            Some(href) => parts.push(format!(r#"<a href="{href}">{label}</a>"#)),
            None => parts.push(format!("<span>{label}</span>")),
        }
        if i < crumbs.len() - 1 {
            parts.push("<span class=\"sep\">›</span>".to_string());
        }
    }
    format!(
        "<nav class=\"breadcrumb\">{}</nav>",
        parts.join(" ")
    )
}

struct Page<'a> {
    title: String,
    description: String,
    canonical: String,
    crumbs: Vec<Crumb<'a>>,
    body: String,
}

fn layout(page: Page<'_>) -> String {
    let title = escape(&page.title);
    let description = escape(&page.description);
    let canonical = &page.canonical;
    let breadcrumb = breadcrumb(&page.crumbs);
    let body = &page.body;
    format!(
        r#"<!DOCTYPE html>
<html lang="en-KE">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{title}</title>
  <meta name="description" content="{description}" />
  <link rel="canonical" href="{canonical}" />
  <meta property="og:title" content="{title}" />
  <meta property="og:description" content="{description}" />
  <link rel="stylesheet" href="/styles.css" />
</head>
<body>
  <header class="site-header">
    <a href="/" class="brand">Duty Check</a>
    <a href="/" class="back-link">← Calculator</a>
  </header>
  <main>
    {breadcrumb}
    {body}
    <footer>
      <p>CRSP reference prices per the official KRA schedule. For guidance only —
      verify with KRA or a licensed clearing agent before importing.</p>
    </footer>
  </main>
</body>
</html>"#
    )
}

/// Render the page for a resolved route. The server fallback and the static
/// emitter both come through here, so the two paths cannot drift apart.
pub fn render_route(table: &ReferenceTable, policy: &DutyPolicy, route: &ResolvedRoute<'_>) -> String {
    match route {
        ResolvedRoute::Category { category } => category_page(table, category),
        ResolvedRoute::Make { category, make } => make_page(table, policy, category, make),
        ResolvedRoute::Model {
            category,
            make,
            variant,
            model_slug,
        } => model_page(policy, category, make, variant, model_slug),
        ResolvedRoute::ModelYear {
            category,
            make,
            variant,
            model_slug,
            year,
        } => year_page(policy, category, make, variant, model_slug, *year),
    }
}

fn category_page(table: &ReferenceTable, category: &str) -> String {
    let cat_slug = slugify(category);
    let makes = table.makes(category);
    let make_entries: Vec<(&String, usize)> = makes
        .map(|m| m.iter().map(|(name, models)| (name, models.len())).collect())
        .unwrap_or_default();
    let total_models: usize = make_entries.iter().map(|(_, n)| n).sum();

    let cards: String = make_entries
        .iter()
        .map(|(make, count)| {
            let make_slug = slugify(make);
            let plural = if *count == 1 { "model" } else { "models" };
            format!(
                r#"<a class="card" href="/{cat_slug}/{make_slug}/">
  <p class="card-title">{}</p>
  <p class="card-sub">{count} {plural}</p>
</a>"#,
                escape(make)
            )
        })
        .collect();

    let body = format!(
        r#"<section class="hero">
  <p class="eyebrow">Vehicle Category</p>
  <h1>{}</h1>
  <p class="hero-sub">{} makes · {total_models} models in the KRA CRSP schedule</p>
</section>
<section class="card-grid">{cards}</section>"#,
        escape(category),
        make_entries.len(),
    );

    layout(Page {
        title: format!("{category} Import Duty Kenya — Duty Check"),
        description: format!(
            "Browse all {category} vehicles in the KRA CRSP schedule. {} makes, {total_models} models with instant duty figures.",
            make_entries.len()
        ),
        canonical: format!("/{cat_slug}/"),
        crumbs: vec![
            Crumb {
                label: "Home",
                href: Some("/".to_string()),
            },
            Crumb {
                label: category,
                href: None,
            },
        ],
        body,
    })
}

fn make_page(table: &ReferenceTable, policy: &DutyPolicy, category: &str, make: &str) -> String {
    let cat_slug = slugify(category);
    let make_slug = slugify(make);
    let models = table.models(category, make).unwrap_or(&[]);
    let slugs = sibling_slugs(
        models.iter().map(|m| m.model.as_str()),
        MODEL_SLUG_FALLBACK,
    );

    let mut indexed: Vec<(&ModelVariant, &String)> = models.iter().zip(slugs.iter()).collect();
    indexed.sort_by(|(a, _), (b, _)| a.model.cmp(&b.model));

    let cards: String = indexed
        .iter()
        .map(|(variant, slug)| {
            let duty_from = compute_duty(variant.crsp, policy.cutoff_year(), policy)
                .map(|d| format!("duty from {}", kes(d.total_duty)))
                .unwrap_or_default();
            format!(
                r#"<a class="card" href="/{cat_slug}/{make_slug}/{slug}/">
  <div>
    <p class="card-title">{}</p>
    <p class="card-sub">{}</p>
  </div>
  <div class="card-price">
    <p class="card-sub">CRSP</p>
    <p class="amount">{}</p>
    <p class="card-sub">{duty_from}</p>
  </div>
</a>"#,
                escape(&variant.model),
                escape(&variant.meta_line()),
                kes(variant.crsp),
            )
        })
        .collect();

    let plural = if models.len() == 1 { "model" } else { "models" };
    let body = format!(
        r#"<section class="hero">
  <p class="eyebrow">{}</p>
  <h1>{}</h1>
  <p class="hero-sub">{} {plural} in the KRA CRSP schedule</p>
</section>
<section class="card-grid">{cards}</section>"#,
        escape(category),
        escape(make),
        models.len(),
    );

    layout(Page {
        title: format!("{make} {category} Import Duty Kenya — Duty Check"),
        description: format!(
            "All {make} {category} models in the KRA CRSP schedule. {} variants with full duty breakdowns.",
            models.len()
        ),
        canonical: format!("/{cat_slug}/{make_slug}/"),
        crumbs: vec![
            Crumb {
                label: "Home",
                href: Some("/".to_string()),
            },
            Crumb {
                label: category,
                href: Some(format!("/{cat_slug}/")),
            },
            Crumb {
                label: make,
                href: None,
            },
        ],
        body,
    })
}

fn model_page(
    policy: &DutyPolicy,
    category: &str,
    make: &str,
    variant: &ModelVariant,
    model_slug: &str,
) -> String {
    let cat_slug = slugify(category);
    let make_slug = slugify(make);

    let rows: String = policy
        .eligible_years()
        .filter_map(|year| {
            let duty = compute_duty(variant.crsp, year, policy).ok()?;
            Some(format!(
                r#"<tr>
  <td><a href="/{cat_slug}/{make_slug}/{model_slug}/{year}/">{year}</a></td>
  <td>{}</td>
  <td>{}</td>
  <td>{}</td>
  <td class="amount">{}</td>
</tr>"#,
                age_label(duty.age),
                pct(duty.depreciation_rate),
                kes(duty.customs_value),
                kes(duty.total_duty),
            ))
        })
        .collect();

    let duty_from = compute_duty(variant.crsp, policy.cutoff_year(), policy)
        .map(|d| kes(d.total_duty))
        .unwrap_or_else(|_| "N/A".to_string());

    let body = format!(
        r#"<section class="hero">
  <p class="eyebrow">{}</p>
  <h1>{} {}</h1>
  <p class="hero-sub">{}</p>
  <p class="hero-price">CRSP {}</p>
</section>
<section class="panel">
  <h2>KRA Duty by Year of Manufacture</h2>
  <p class="panel-sub">Years valid under the {}-year rule. Vehicles from before {} cannot be imported.</p>
  <table>
    <thead>
      <tr><th>Year</th><th>Age</th><th>Depreciation</th><th>Customs Value</th><th>Total Duty</th></tr>
    </thead>
    <tbody>{rows}</tbody>
  </table>
</section>
<section class="panel formula">
  <h3>How KRA calculates this</h3>
  <p>CRSP ÷ {} = pre-depreciation value, × (1 − depreciation) = Customs Value.</p>
  <p>CV × {} = Import Duty · (CV + ID) × {} = Excise · (CV + ID + ED) × {} = VAT ·
  CV × {} = IDF (min {}) · CV × {} = RDL.</p>
</section>"#,
        escape(category),
        escape(make),
        escape(&variant.model),
        escape(&variant.meta_line()),
        kes(variant.crsp),
        policy.max_age,
        policy.cutoff_year(),
        policy.valuation_divisor,
        pct(policy.import_duty_rate),
        pct(policy.excise_rate),
        pct(policy.vat_rate),
        pct_precise(policy.idf_rate),
        kes(policy.idf_floor),
        pct(policy.rdl_rate),
    );

    layout(Page {
        title: format!("{make} {} Import Duty Kenya — Duty Check", variant.model),
        description: format!(
            "KRA import duty for {make} {}. CRSP: {}. Duty from {duty_from} depending on year of manufacture.",
            variant.model,
            kes(variant.crsp)
        ),
        canonical: format!("/{cat_slug}/{make_slug}/{model_slug}/"),
        crumbs: vec![
            Crumb {
                label: "Home",
                href: Some("/".to_string()),
            },
            Crumb {
                label: category,
                href: Some(format!("/{cat_slug}/")),
            },
            Crumb {
                label: make,
                href: Some(format!("/{cat_slug}/{make_slug}/")),
            },
            Crumb {
                label: &variant.model,
                href: None,
            },
        ],
        body,
    })
}

fn year_page(
    policy: &DutyPolicy,
    category: &str,
    make: &str,
    variant: &ModelVariant,
    model_slug: &str,
    year: i32,
) -> String {
    let cat_slug = slugify(category);
    let make_slug = slugify(make);
    let year_str = year.to_string();

    let (headline, body_main) = match compute_duty(variant.crsp, year, policy) {
        Ok(duty) => (kes(duty.total_duty), breakdown_section(policy, &duty)),
        Err(blocked) => ("Not importable".to_string(), blocked_section(policy, year, blocked)),
    };

    let body = format!(
        r#"<section class="hero">
  <p class="eyebrow">{} · {year}</p>
  <h1>{} {}</h1>
  <p class="hero-sub">{}</p>
  <p class="hero-price">{headline}</p>
</section>
{body_main}
<p class="cross-link"><a href="/{cat_slug}/{make_slug}/{model_slug}/">Compare all years for {} {}</a></p>"#,
        escape(category),
        escape(make),
        escape(&variant.model),
        escape(&variant.meta_line()),
        escape(make),
        escape(&variant.model),
    );

    layout(Page {
        title: format!(
            "{make} {} {year} Import Duty Kenya — Duty Check",
            variant.model
        ),
        description: format!(
            "KRA import duty for a {year} {make} {}. CRSP {}.",
            variant.model,
            kes(variant.crsp)
        ),
        canonical: format!("/{cat_slug}/{make_slug}/{model_slug}/{year_str}/"),
        crumbs: vec![
            Crumb {
                label: "Home",
                href: Some("/".to_string()),
            },
            Crumb {
                label: category,
                href: Some(format!("/{cat_slug}/")),
            },
            Crumb {
                label: make,
                href: Some(format!("/{cat_slug}/{make_slug}/")),
            },
            Crumb {
                label: &variant.model,
                href: Some(format!("/{cat_slug}/{make_slug}/{model_slug}/")),
            },
            Crumb {
                label: &year_str,
                href: None,
            },
        ],
        body,
    })
}

fn breakdown_section(policy: &DutyPolicy, duty: &DutyBreakdown) -> String {
    let floor_note = if duty.idf_levy == policy.idf_floor {
        format!(" · minimum {} applied", kes(policy.idf_floor))
    } else {
        String::new()
    };
    let reference_price = duty.pre_depreciation_value * policy.valuation_divisor;

    let rows = [
        (
            "CRSP Value".to_string(),
            "Official KRA reference price".to_string(),
            kes(reference_price),
            "",
        ),
        (
            format!("÷ {}", policy.valuation_divisor),
            "Strips built-in taxes → pre-depreciation value".to_string(),
            kes(duty.pre_depreciation_value),
            "",
        ),
        (
            format!("− {} depreciation", pct(duty.depreciation_rate)),
            format!("{} old · direct import", age_label(duty.age)),
            kes(duty.customs_value),
            "highlight",
        ),
        (
            format!("Import Duty ({})", pct(policy.import_duty_rate)),
            "Customs Value × rate".to_string(),
            kes(duty.import_duty),
            "",
        ),
        (
            format!("Excise Duty ({})", pct(policy.excise_rate)),
            "(CV + Import Duty) × rate".to_string(),
            kes(duty.excise_duty),
            "",
        ),
        (
            format!("VAT ({})", pct(policy.vat_rate)),
            "(CV + ID + Excise) × rate".to_string(),
            kes(duty.vat),
            "",
        ),
        (
            format!("IDF ({})", pct_precise(policy.idf_rate)),
            format!("Import Declaration Fee{floor_note}"),
            kes(duty.idf_levy),
            "",
        ),
        (
            format!("RDL ({})", pct(policy.rdl_rate)),
            "Railway Development Levy".to_string(),
            kes(duty.railway_levy),
            "",
        ),
        (
            "Total KRA Duty".to_string(),
            "Import Duty + Excise + VAT + IDF + RDL".to_string(),
            kes(duty.total_duty),
            "total",
        ),
    ];

    let rendered: String = rows
        .iter()
        .map(|(label, note, value, class)| {
            let class_attr = if class.is_empty() {
                String::new()
            } else {
                format!(" class=\"{class}\"")
            };
            format!(
                r#"<div{class_attr}><div><p class="row-label">{label}</p><p class="row-note">{note}</p></div><p class="amount">{value}</p></div>"#
            )
        })
        .collect();

    format!(
        r#"<section class="panel breakdown">
  <h2>Full Duty Breakdown</h2>
  <div class="rows">{rendered}</div>
</section>"#
    )
}

fn blocked_section(policy: &DutyPolicy, year: i32, blocked: NotEligible) -> String {
    let reason = match blocked {
        NotEligible::FutureYear => format!(
            "{year} is after the current policy year {}; a manufacture year in the future cannot be assessed.",
            policy.current_year
        ),
        NotEligible::OverAgeLimit { max_age } => format!(
            "Kenya's {max_age}-year rule prohibits importing vehicles manufactured before {}.",
            policy.cutoff_year()
        ),
    };
    format!(
        r#"<section class="panel notice">
  <h2>This vehicle cannot be imported</h2>
  <p>{reason}</p>
</section>"#
    )
}
