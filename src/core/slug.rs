use std::collections::HashSet;

/// URL slug for a display name: lowercase, strip everything outside
/// `[a-z0-9\s-]`, collapse whitespace and hyphen runs to a single `-`,
/// trim edge hyphens. No transliteration; non-ASCII letters are dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.to_lowercase().chars() {
        match c {
            'a'..='z' | '0'..='9' => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c);
            }
            '-' => pending_dash = true,
            c if c.is_whitespace() => pending_dash = true,
            _ => {}
        }
    }
    slug
}

/// Collision-resolved slugs for one sibling list, aligned with input order.
///
/// An entry whose slug comes out empty falls back to
/// `{fallback_prefix}-{index}`; an entry whose slug was already assigned
/// earlier in the list gets `-{index}` appended (the original list position,
/// not a counter). Reordering the source list therefore changes suffixes;
/// callers treat the list order as part of the slug contract.
pub fn sibling_slugs<'a, I>(names: I, fallback_prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let mut slug = slugify(name);
            if slug.is_empty() {
                slug = format!("{fallback_prefix}-{index}");
            }
            // A suffixed slug can itself collide with a literal sibling
            // name ("GT 2" next to two "GT"s), so suffix until free.
            while seen.contains(&slug) {
                slug = format!("{slug}-{index}");
            }
            seen.insert(slug.clone());
            slug
        })
        .collect()
}
