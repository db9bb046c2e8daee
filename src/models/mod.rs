use serde::{Deserialize, Serialize};

/// Property category from the price-paid dataset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyCategory {
    Detached,
    SemiDetached,
    Terraced,
    Flat,
    Other,
}

impl PropertyCategory {
    /// Map a property-type URI from the remote store to a category.
    /// Unknown URIs yield `None`; the mapper decides the fallback.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://landregistry.data.gov.uk/def/common/detached" => Some(Self::Detached),
            "http://landregistry.data.gov.uk/def/common/semi-detached" => Some(Self::SemiDetached),
            "http://landregistry.data.gov.uk/def/common/terraced" => Some(Self::Terraced),
            "http://landregistry.data.gov.uk/def/common/flat-maisonette" => Some(Self::Flat),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::SemiDetached => "semi-detached",
            Self::Terraced => "terraced",
            Self::Flat => "flat",
            Self::Other => "other",
        }
    }
}

/// One price-paid transaction, mapped fresh from a remote result row.
/// Duplicates are possible and preserved; there is no identity beyond
/// the field values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyTransaction {
    pub price: i64,
    /// ISO calendar date, e.g. "2021-03-15"
    pub date: String,
    pub category: PropertyCategory,
    pub paon: String,
    pub saon: String,
    pub street: String,
    pub town: String,
    pub county: String,
    pub postcode: String,
}

/// Field a property search can be sorted by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Date,
    Price,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Caller-supplied search parameters. Either `postcode` or both
/// `street` and `town` must be present; everything else is optional
/// and defaulted at the validation boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCriteria {
    pub postcode: Option<String>,
    pub street: Option<String>,
    pub town: Option<String>,
    /// Primary addressable object name (house number/name)
    pub paon: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// Category label, matched case-insensitively
    pub property_type: Option<String>,
    /// Inclusive ISO date bounds
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortDirection>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// Result of a property search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub properties: Vec<PropertyTransaction>,
    /// Count after filtering, before pagination
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// One row of the local postcode reference table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostcodeRecord {
    pub postcode: String,
    /// Positional quality indicator from the source dataset
    pub quality: i64,
    pub easting: i64,
    pub northing: i64,
    pub country: String,
    pub county: String,
    pub district: String,
    pub ward: String,
}

/// Caller-supplied parameters for a proximity lookup. Either `postcode`
/// or both `easting` and `northing` must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostcodeLookupCriteria {
    pub postcode: Option<String>,
    pub easting: Option<i64>,
    pub northing: Option<i64>,
    pub radius_meters: Option<f64>,
    pub limit: Option<usize>,
    pub include_self: bool,
    /// Administrative district code filter
    pub district: Option<String>,
}

/// A postcode ranked by planar distance from the query center
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostcodeDistance {
    #[serde(flatten)]
    pub record: PostcodeRecord,
    pub distance_meters: f64,
}

/// Result of a proximity lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    pub center: PostcodeRecord,
    pub postcodes: Vec<PostcodeDistance>,
    /// Count after distance/self filters, before truncation
    pub total: usize,
}

/// Canonical postcode form: uppercase, single space before the final
/// three characters ("pl68ru" -> "PL6 8RU").
pub fn normalize_postcode(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if compact.len() <= 3 {
        return compact;
    }
    let split = compact.len() - 3;
    if !compact.is_char_boundary(split) {
        return compact;
    }
    format!("{} {}", &compact[..split], &compact[split..])
}
