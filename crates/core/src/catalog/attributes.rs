//! Name-based attribute heuristics.
//!
//! Most of the catalog was entered by hand, so brand, scale, year and category
//! are often only present in the product name ("AUTOart 1:18 1967 Ford GT40").
//! These helpers pull them out. They are used both for filtering at request
//! time and by the CLI when backfilling metadata.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Model makers recognized in product names, longest names first so that
/// "Mini GT" wins over shorter overlaps.
pub const KNOWN_BRANDS: &[&str] = &[
    "Road Signature",
    "Tarmac Works",
    "Otto Mobile",
    "Hot Wheels",
    "Minichamps",
    "Greenlight",
    "Sun Star",
    "Matchbox",
    "Bburago",
    "Mini GT",
    "AUTOart",
    "Kyosho",
    "Maisto",
    "Schuco",
    "Tomica",
    "Solido",
    "Norev",
    "Spark",
    "Welly",
    "Jada",
    "CMC",
    "Ixo",
];

static SCALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b1\s*[:/]\s*(\d{1,3})\b").expect("scale pattern is valid")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year pattern is valid"));

/// Category keywords, checked in order. The first category with a matching
/// whole-word keyword wins; anything else is a car.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "racing",
        &[
            "f1", "formula", "le mans", "gt3", "gt4", "rally", "nascar", "dtm", "indy", "racing",
            "race car",
        ],
    ),
    (
        "trucks",
        &[
            "truck", "pickup", "lorry", "tanker", "kenworth", "peterbilt", "scania", "semi",
        ],
    ),
    (
        "motorcycles",
        &[
            "motorcycle", "motorbike", "ducati", "harley", "superbike", "motogp",
        ],
    ),
    ("vans-buses", &["bus", "van", "camper", "kombi", "minibus"]),
    (
        "construction",
        &["tractor", "excavator", "bulldozer", "crane", "loader", "construction"],
    ),
];

/// Category used when nothing more specific matches.
pub const DEFAULT_CATEGORY: &str = "cars";

/// All category slugs the storefront knows about.
pub const CATEGORIES: &[&str] = &[
    "cars",
    "racing",
    "trucks",
    "motorcycles",
    "vans-buses",
    "construction",
];

/// Model scale, stored as the denominator (`1:18` → 18).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scale(u16);

impl Scale {
    /// Create a scale from its denominator.
    #[must_use]
    pub const fn new(denominator: u16) -> Option<Self> {
        if denominator == 0 {
            None
        } else {
            Some(Self(denominator))
        }
    }

    /// The denominator (18 for `1:18`).
    #[must_use]
    pub const fn denominator(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1:{}", self.0)
    }
}

/// Error parsing a scale string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scale: {0}")]
pub struct InvalidScale(pub String);

impl FromStr for Scale {
    type Err = InvalidScale;

    /// Accepts `1:18`, `1/18`, `1-18` and a bare `18`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let denominator = trimmed
            .strip_prefix("1:")
            .or_else(|| trimmed.strip_prefix("1/"))
            .or_else(|| trimmed.strip_prefix("1-"))
            .unwrap_or(trimmed);
        denominator
            .trim()
            .parse::<u16>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvalidScale(s.to_owned()))
    }
}

impl TryFrom<String> for Scale {
    type Error = InvalidScale;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scale> for String {
    fn from(scale: Scale) -> Self {
        scale.to_string()
    }
}

/// Stock availability, as shown on product cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    InStock,
    PreOrder,
    SoldOut,
}

impl Availability {
    /// Keyword heuristics over the name and description.
    #[must_use]
    pub fn infer(name: &str, description: Option<&str>) -> Self {
        let text = format!("{name} {}", description.unwrap_or_default()).to_lowercase();
        if ["pre-order", "preorder", "pre order", "coming soon"]
            .iter()
            .any(|k| text.contains(k))
        {
            Self::PreOrder
        } else if ["sold out", "sold-out", "out of stock"]
            .iter()
            .any(|k| text.contains(k))
        {
            Self::SoldOut
        } else {
            Self::InStock
        }
    }

    /// Slug form used in query strings and metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "in-stock",
            Self::PreOrder => "pre-order",
            Self::SoldOut => "sold-out",
        }
    }
}

/// Error parsing an availability keyword.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid availability: {0}")]
pub struct InvalidAvailability(pub String);

impl FromStr for Availability {
    type Err = InvalidAvailability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "in-stock" | "instock" | "available" => Ok(Self::InStock),
            "pre-order" | "preorder" | "coming-soon" => Ok(Self::PreOrder),
            "sold-out" | "soldout" | "out-of-stock" => Ok(Self::SoldOut),
            _ => Err(InvalidAvailability(s.to_owned())),
        }
    }
}

/// First known model maker mentioned in the name, as canonically spelled.
#[must_use]
pub fn extract_brand(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    KNOWN_BRANDS
        .iter()
        .copied()
        .find(|brand| contains_word(&lower, &brand.to_lowercase()))
}

/// First `1:N` or `1/N` scale in the name.
#[must_use]
pub fn extract_scale(name: &str) -> Option<Scale> {
    SCALE_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .and_then(Scale::new)
}

/// First four-digit year (1900-2099) in the name.
#[must_use]
pub fn extract_year(name: &str) -> Option<u16> {
    YEAR_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Category slug inferred from keywords in the name.
#[must_use]
pub fn infer_category(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| contains_word(&lower, k)))
        .map_or(DEFAULT_CATEGORY, |(category, _)| category)
}

/// Whole-word containment: `needle` must not be glued to alphanumerics.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack.get(..start).and_then(|s| s.chars().next_back());
        let after = haystack
            .get(start + needle.len()..)
            .and_then(|s| s.chars().next());
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
