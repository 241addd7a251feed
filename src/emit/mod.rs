use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::core::{DutyPolicy, MODEL_SLUG_FALLBACK, ReferenceTable, resolve, sibling_slugs, slugify};
use crate::render::render_route;

#[derive(Debug, Clone)]
pub struct EmitConfig {
    pub out_dir: PathBuf,
    pub base_url: String,
    /// Stamped as `lastmod` on every sitemap entry; the only date-dependent
    /// content in the output, kept explicit so builds are reproducible.
    pub build_date: NaiveDate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitStats {
    pub category_pages: usize,
    pub make_pages: usize,
    pub model_pages: usize,
    pub year_pages: usize,
    pub sitemaps: usize,
}

impl EmitStats {
    pub fn total_pages(&self) -> usize {
        self.category_pages + self.make_pages + self.model_pages + self.year_pages
    }
}

/// Emit the full site: one page per resolvable route in the table ×
/// eligible-year cross product, a sitemap per category, and a root sitemap
/// index. Every page goes through the same resolver + renderer as the
/// server, so the static output cannot drift from the interactive path.
pub fn generate_site(
    table: &ReferenceTable,
    policy: &DutyPolicy,
    config: &EmitConfig,
) -> Result<EmitStats> {
    let mut stats = EmitStats::default();
    let base_url = config.base_url.trim_end_matches('/');
    let mut category_sitemaps: Vec<String> = Vec::new();

    for category in &table.categories {
        let Some(makes) = table.makes(category) else {
            warn!(category = %category, "category has no data; skipping");
            continue;
        };
        let cat_slug = slugify(category);
        let mut paths: Vec<String> = Vec::new();

        emit_route(table, policy, config, &[cat_slug.as_str()], &mut paths)?;
        stats.category_pages += 1;

        for (make, models) in makes {
            let make_slug = slugify(make);
            emit_route(
                table,
                policy,
                config,
                &[cat_slug.as_str(), make_slug.as_str()],
                &mut paths,
            )?;
            stats.make_pages += 1;

            let slugs = sibling_slugs(
                models.iter().map(|m| m.model.as_str()),
                MODEL_SLUG_FALLBACK,
            );
            for model_slug in &slugs {
                emit_route(
                    table,
                    policy,
                    config,
                    &[cat_slug.as_str(), make_slug.as_str(), model_slug.as_str()],
                    &mut paths,
                )?;
                stats.model_pages += 1;

                for year in policy.eligible_years() {
                    let year_str = year.to_string();
                    emit_route(
                        table,
                        policy,
                        config,
                        &[
                            cat_slug.as_str(),
                            make_slug.as_str(),
                            model_slug.as_str(),
                            year_str.as_str(),
                        ],
                        &mut paths,
                    )?;
                    stats.year_pages += 1;
                }
            }
        }

        let sitemap_name = format!("sitemap-{cat_slug}.xml");
        let sitemap = urlset_xml(base_url, &paths, config.build_date);
        write_file(&config.out_dir.join(&sitemap_name), &sitemap)?;
        stats.sitemaps += 1;
        category_sitemaps.push(sitemap_name);
        info!(category = %category, pages = paths.len(), "emitted category");
    }

    let index = sitemap_index_xml(base_url, &category_sitemaps, config.build_date);
    write_file(&config.out_dir.join("sitemap.xml"), &index)?;
    stats.sitemaps += 1;

    info!(
        pages = stats.total_pages(),
        sitemaps = stats.sitemaps,
        out = %config.out_dir.display(),
        "static generation complete"
    );
    Ok(stats)
}

fn emit_route(
    table: &ReferenceTable,
    policy: &DutyPolicy,
    config: &EmitConfig,
    segments: &[&str],
    paths: &mut Vec<String>,
) -> Result<()> {
    let Some(route) = resolve(table, segments) else {
        // A miss here means a slug the table itself cannot resolve.
        warn!(path = %segments.join("/"), "route did not resolve; skipping");
        return Ok(());
    };
    let html = render_route(table, policy, &route);
    let rel = format!("{}/index.html", segments.join("/"));
    write_file(&config.out_dir.join(&rel), &html)?;
    paths.push(route.canonical_path());
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn urlset_xml(base_url: &str, paths: &[String], build_date: NaiveDate) -> String {
    let lastmod = build_date.format("%Y-%m-%d");
    let entries: String = paths
        .iter()
        .map(|path| {
            format!("  <url><loc>{base_url}{path}</loc><lastmod>{lastmod}</lastmod></url>\n")
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{entries}</urlset>\n"
    )
}

fn sitemap_index_xml(base_url: &str, sitemaps: &[String], build_date: NaiveDate) -> String {
    let lastmod = build_date.format("%Y-%m-%d");
    let entries: String = sitemaps
        .iter()
        .map(|name| {
            format!(
                "  <sitemap><loc>{base_url}/{name}</loc><lastmod>{lastmod}</lastmod></sitemap>\n"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{entries}</sitemapindex>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ReferenceTable {
        ReferenceTable::from_json(
            r#"{
              "categories": ["SUV"],
              "data": {
                "SUV": {
                  "Toyota": [
                    {"model": "RAV4", "crsp": 4853000},
                    {"model": "RAV4", "crsp": 5120000}
                  ]
                }
              }
            }"#,
        )
        .expect("valid table")
    }

    fn temp_out(test: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dutycheck-{test}-{}", std::process::id()))
    }

    fn sample_config(test: &str) -> EmitConfig {
        EmitConfig {
            out_dir: temp_out(test),
            base_url: "https://dutycheck.co.ke".to_string(),
            build_date: NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date"),
        }
    }

    #[test]
    fn emits_page_tree_and_sitemaps() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let config = sample_config("tree");
        let _ = fs::remove_dir_all(&config.out_dir);

        let stats = generate_site(&table, &policy, &config).expect("generation succeeds");

        assert_eq!(stats.category_pages, 1);
        assert_eq!(stats.make_pages, 1);
        assert_eq!(stats.model_pages, 2);
        assert_eq!(stats.year_pages, 18);
        assert_eq!(stats.sitemaps, 2);
        assert_eq!(stats.total_pages(), 22);

        for rel in [
            "suv/index.html",
            "suv/toyota/index.html",
            "suv/toyota/rav4/index.html",
            "suv/toyota/rav4-1/index.html",
            "suv/toyota/rav4/2026/index.html",
            "suv/toyota/rav4-1/2018/index.html",
            "sitemap-suv.xml",
            "sitemap.xml",
        ] {
            assert!(
                config.out_dir.join(rel).exists(),
                "missing artifact {rel}"
            );
        }

        let sitemap = fs::read_to_string(config.out_dir.join("sitemap-suv.xml"))
            .expect("category sitemap readable");
        assert!(sitemap.contains("<loc>https://dutycheck.co.ke/suv/toyota/rav4/2020/</loc>"));
        assert!(sitemap.contains("<lastmod>2026-01-15</lastmod>"));

        let index = fs::read_to_string(config.out_dir.join("sitemap.xml"))
            .expect("root sitemap readable");
        assert!(index.contains("<loc>https://dutycheck.co.ke/sitemap-suv.xml</loc>"));

        let _ = fs::remove_dir_all(&config.out_dir);
    }

    #[test]
    fn output_is_reproducible_for_a_fixed_build_date() {
        let table = sample_table();
        let policy = DutyPolicy::default();
        let config = sample_config("repro");
        let _ = fs::remove_dir_all(&config.out_dir);

        generate_site(&table, &policy, &config).expect("first run");
        let first = fs::read_to_string(config.out_dir.join("sitemap-suv.xml")).expect("readable");
        let first_page =
            fs::read_to_string(config.out_dir.join("suv/toyota/rav4/2024/index.html"))
                .expect("readable");

        generate_site(&table, &policy, &config).expect("second run");
        let second = fs::read_to_string(config.out_dir.join("sitemap-suv.xml")).expect("readable");
        let second_page =
            fs::read_to_string(config.out_dir.join("suv/toyota/rav4/2024/index.html"))
                .expect("readable");

        assert_eq!(first, second);
        assert_eq!(first_page, second_page);

        let _ = fs::remove_dir_all(&config.out_dir);
    }
}
