//! Country/province canonicalization and the geocoding exclusion predicate

/// What an alias does to the province that came with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvinceRule {
    Keep,
    Clear,
    Set(&'static str),
}

/// Country alias table: raw name, canonical name, province rule.
///
/// Canonical names never appear as raw names, so applying the table twice
/// changes nothing.
pub const COUNTRY_ALIASES: &[(&str, &str, ProvinceRule)] = &[
    ("Mainland China", "China", ProvinceRule::Keep),
    ("Viet Nam", "Vietnam", ProvinceRule::Keep),
    ("Korea, South", "South Korea", ProvinceRule::Keep),
    ("Hong Kong SAR", "Hong Kong", ProvinceRule::Clear),
    ("Hong Kong", "Hong Kong", ProvinceRule::Clear),
    ("Macau SAR", "Macao", ProvinceRule::Clear),
    ("Macau", "Macao", ProvinceRule::Clear),
    ("Ivory Coast", "Côte d'Ivoire", ProvinceRule::Keep),
    ("North Ireland", "UK", ProvinceRule::Set("Northern Ireland")),
];

/// Case-insensitive substrings marking places that must never be geocoded
/// (cruise ships, catch-all rows).
pub const EXCLUDED_TERMS: &[&str] = &["diamond", "cruise", "others"];

/// Canonical place names
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Place {
    pub country: String,
    pub province: String,
}

impl Place {
    /// True when either name matches an excluded term.
    pub fn is_excluded(&self) -> bool {
        is_excluded(&self.country) || is_excluded(&self.province)
    }
}

/// Strip embedded quotes and apply the alias table. Total and idempotent.
pub fn canonicalize(country: &str, province: &str) -> Place {
    let country = country.replace('"', "");
    let province = province.replace('"', "");

    match COUNTRY_ALIASES
        .iter()
        .find(|(raw, _, _)| *raw == country.as_str())
    {
        Some((_, canonical, rule)) => Place {
            country: (*canonical).to_string(),
            province: match rule {
                ProvinceRule::Keep => province,
                ProvinceRule::Clear => String::new(),
                ProvinceRule::Set(p) => (*p).to_string(),
            },
        },
        None => Place { country, province },
    }
}

pub fn is_excluded(name: &str) -> bool {
    let lower = name.to_lowercase();
    EXCLUDED_TERMS.iter().any(|term| lower.contains(term))
}
