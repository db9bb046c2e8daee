use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{Result, ScoutError};
use crate::models::{
    normalize_postcode, PropertyTransaction, SearchCriteria, SearchResult, SortDirection,
    SortField,
};
use crate::sparql::{mapper, query, SparqlExecutor};

/// Page size when the caller does not supply one
pub const DEFAULT_LIMIT: usize = 10;

/// Check criteria before any I/O. The first failing check is reported;
/// invalid criteria never reach the query builder.
fn validate(endpoint: &str, criteria: &SearchCriteria) -> Result<()> {
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ScoutError::Validation(format!(
            "endpoint must be an HTTP(S) URL, got '{}'",
            endpoint
        )));
    }

    let has_postcode = criteria.postcode.is_some();
    let has_street_town = criteria.street.is_some() && criteria.town.is_some();
    if has_postcode && (criteria.street.is_some() || criteria.town.is_some()) {
        return Err(ScoutError::Validation(
            "supply either a postcode or street+town, not both".to_string(),
        ));
    }
    if !has_postcode && !has_street_town {
        return Err(ScoutError::Validation(
            "supply either a postcode or both street and town".to_string(),
        ));
    }

    if let Some(min) = criteria.min_price {
        if min < 0 {
            return Err(ScoutError::Validation(
                "min_price must be non-negative".to_string(),
            ));
        }
    }
    if let Some(max) = criteria.max_price {
        if max < 0 {
            return Err(ScoutError::Validation(
                "max_price must be non-negative".to_string(),
            ));
        }
    }
    if let (Some(min), Some(max)) = (criteria.min_price, criteria.max_price) {
        if min > max {
            return Err(ScoutError::Validation(format!(
                "min_price {} exceeds max_price {}",
                min, max
            )));
        }
    }

    if criteria.limit == Some(0) {
        return Err(ScoutError::Validation(
            "limit must be greater than zero".to_string(),
        ));
    }

    for date in [&criteria.date_from, &criteria.date_to].into_iter().flatten() {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(ScoutError::Validation(format!(
                "'{}' is not an ISO date (YYYY-MM-DD)",
                date
            )));
        }
    }

    Ok(())
}

fn build_query(criteria: &SearchCriteria) -> String {
    // The remote store matches addresses exactly, so normalize case here.
    let base = match &criteria.postcode {
        Some(postcode) => query::by_postcode(&normalize_postcode(postcode)),
        None => {
            let street = criteria.street.as_deref().unwrap_or_default().to_uppercase();
            let town = criteria.town.as_deref().unwrap_or_default().to_uppercase();
            let paon = criteria.paon.as_deref().map(str::to_uppercase);
            query::by_street_town(&street, &town, paon.as_deref(), None)
        }
    };
    query::with_date_bounds(
        &base,
        criteria.date_from.as_deref(),
        criteria.date_to.as_deref(),
    )
}

fn passes_filters(tx: &PropertyTransaction, criteria: &SearchCriteria) -> bool {
    if let Some(min) = criteria.min_price {
        if tx.price < min {
            return false;
        }
    }
    if let Some(max) = criteria.max_price {
        if tx.price > max {
            return false;
        }
    }
    if let Some(wanted) = &criteria.property_type {
        if !wanted.eq_ignore_ascii_case(tx.category.label()) {
            return false;
        }
    }
    true
}

/// Run a property search: validate, query the remote store, map every
/// row, then filter, sort and paginate in memory.
///
/// `total` in the result counts records after filtering and before
/// pagination; `offset` and `limit` echo the resolved request values.
/// When no sort is requested at all, the remote query's default order
/// (transaction date descending) is preserved.
pub async fn search_properties(
    endpoint: &str,
    executor: &dyn SparqlExecutor,
    criteria: &SearchCriteria,
) -> Result<SearchResult> {
    validate(endpoint, criteria)?;

    let offset = criteria.offset.unwrap_or(0);
    let limit = criteria.limit.unwrap_or(DEFAULT_LIMIT);

    let sparql = build_query(criteria);
    let rows = executor.select(endpoint, &sparql).await?;
    debug!("mapping {} rows", rows.len());

    // A single incomplete row aborts the whole search.
    let mut records = rows
        .iter()
        .map(mapper::map_row)
        .collect::<Result<Vec<_>>>()?;

    records.retain(|tx| passes_filters(tx, criteria));
    let total = records.len();

    if criteria.sort_by.is_some() || criteria.sort_order.is_some() {
        let field = criteria.sort_by.unwrap_or(SortField::Date);
        let direction = criteria.sort_order.unwrap_or(SortDirection::Desc);
        // sort_by is stable; ties keep their pre-sort relative order.
        records.sort_by(|a, b| {
            let ord = match field {
                SortField::Price => a.price.cmp(&b.price),
                SortField::Date => a.date.cmp(&b.date),
            };
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }

    let properties: Vec<PropertyTransaction> =
        records.into_iter().skip(offset).take(limit).collect();

    info!(
        "search matched {} records, returning {} from offset {}",
        total,
        properties.len(),
        offset
    );

    Ok(SearchResult {
        properties,
        total,
        offset,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparql::{Binding, SparqlValue};
    use async_trait::async_trait;

    const ENDPOINT: &str = "https://landregistry.example/sparql";

    /// Returns canned rows without touching the network
    struct StubExecutor {
        rows: Vec<Binding>,
    }

    #[async_trait]
    impl SparqlExecutor for StubExecutor {
        async fn select(&self, _endpoint: &str, _query: &str) -> Result<Vec<Binding>> {
            Ok(self.rows.clone())
        }
    }

    /// Fails the test if the pipeline reaches the network stage
    struct PanicExecutor;

    #[async_trait]
    impl SparqlExecutor for PanicExecutor {
        async fn select(&self, _endpoint: &str, _query: &str) -> Result<Vec<Binding>> {
            panic!("executor must not be called for invalid criteria");
        }
    }

    fn lit(value: &str) -> SparqlValue {
        SparqlValue {
            kind: "literal".to_string(),
            value: value.to_string(),
        }
    }

    fn row(price: i64, date: &str, type_slug: &str, street: &str) -> Binding {
        let mut row = Binding::new();
        row.insert("amount".into(), lit(&price.to_string()));
        row.insert("date".into(), lit(date));
        row.insert(
            "propertyType".into(),
            SparqlValue {
                kind: "uri".to_string(),
                value: format!("http://landregistry.data.gov.uk/def/common/{}", type_slug),
            },
        );
        row.insert("street".into(), lit(street));
        row.insert("postcode".into(), lit("PL6 8RU"));
        row
    }

    fn pattinson_rows() -> Vec<Binding> {
        vec![
            row(250000, "2021-03-15", "terraced", "PATTINSON DRIVE"),
            row(180000, "2020-07-01", "flat-maisonette", "PATTINSON DRIVE"),
            row(420000, "2022-01-20", "detached", "PATTINSON DRIVE"),
            row(310000, "2019-11-05", "semi-detached", "PATTINSON DRIVE"),
        ]
    }

    fn postcode_criteria() -> SearchCriteria {
        SearchCriteria {
            postcode: Some("PL6 8RU".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejects_non_http_endpoint() {
        let err = search_properties("ftp://x", &PanicExecutor, &postcode_criteria())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_missing_address_fields() {
        let err = search_properties(ENDPOINT, &PanicExecutor, &SearchCriteria::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_postcode_combined_with_street() {
        let criteria = SearchCriteria {
            postcode: Some("PL6 8RU".to_string()),
            street: Some("PATTINSON DRIVE".to_string()),
            ..Default::default()
        };
        let err = search_properties(ENDPOINT, &PanicExecutor, &criteria)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_inverted_price_bounds_before_any_network_call() {
        let criteria = SearchCriteria {
            postcode: Some("X".to_string()),
            min_price: Some(200000),
            max_price: Some(100000),
            ..Default::default()
        };
        let err = search_properties(ENDPOINT, &PanicExecutor, &criteria)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_zero_limit() {
        let criteria = SearchCriteria {
            limit: Some(0),
            ..postcode_criteria()
        };
        let err = search_properties(ENDPOINT, &PanicExecutor, &criteria)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Validation(_)));
    }

    #[tokio::test]
    async fn echoes_resolved_defaults_and_caps_page() {
        let executor = StubExecutor {
            rows: pattinson_rows(),
        };
        let result = search_properties(ENDPOINT, &executor, &postcode_criteria())
            .await
            .unwrap();
        assert_eq!(result.offset, 0);
        assert_eq!(result.limit, DEFAULT_LIMIT);
        assert_eq!(result.total, 4);
        assert!(result.properties.len() <= 10);
        assert!(result
            .properties
            .iter()
            .all(|p| p.street == "PATTINSON DRIVE"));
    }

    #[tokio::test]
    async fn total_counts_filtered_records_not_the_page() {
        let executor = StubExecutor {
            rows: pattinson_rows(),
        };
        let criteria = SearchCriteria {
            min_price: Some(200000),
            limit: Some(1),
            ..postcode_criteria()
        };
        let result = search_properties(ENDPOINT, &executor, &criteria)
            .await
            .unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.properties.len(), 1);
        assert_eq!(result.limit, 1);
    }

    #[tokio::test]
    async fn price_bounds_are_inclusive() {
        let executor = StubExecutor {
            rows: pattinson_rows(),
        };
        let criteria = SearchCriteria {
            min_price: Some(180000),
            max_price: Some(250000),
            ..postcode_criteria()
        };
        let result = search_properties(ENDPOINT, &executor, &criteria)
            .await
            .unwrap();
        assert_eq!(result.total, 2);
    }

    #[tokio::test]
    async fn category_filter_is_case_insensitive() {
        let executor = StubExecutor {
            rows: pattinson_rows(),
        };
        let criteria = SearchCriteria {
            property_type: Some("TERRACED".to_string()),
            ..postcode_criteria()
        };
        let result = search_properties(ENDPOINT, &executor, &criteria)
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.properties[0].price, 250000);
    }

    #[tokio::test]
    async fn sorts_by_price_descending() {
        let executor = StubExecutor {
            rows: pattinson_rows(),
        };
        let criteria = SearchCriteria {
            sort_by: Some(SortField::Price),
            sort_order: Some(SortDirection::Desc),
            ..postcode_criteria()
        };
        let result = search_properties(ENDPOINT, &executor, &criteria)
            .await
            .unwrap();
        for pair in result.properties.windows(2) {
            assert!(pair[0].price >= pair[1].price);
        }
    }

    #[tokio::test]
    async fn price_ties_keep_remote_relative_order() {
        let executor = StubExecutor {
            rows: vec![
                row(300000, "2021-06-01", "terraced", "EARLIER ROW"),
                row(500000, "2022-02-02", "detached", "TOP"),
                row(300000, "2020-01-01", "flat-maisonette", "LATER ROW"),
            ],
        };
        let criteria = SearchCriteria {
            sort_by: Some(SortField::Price),
            sort_order: Some(SortDirection::Desc),
            ..postcode_criteria()
        };
        let result = search_properties(ENDPOINT, &executor, &criteria)
            .await
            .unwrap();
        let streets: Vec<&str> = result.properties.iter().map(|p| p.street.as_str()).collect();
        // the tied 300000 pair stays in its pre-sort order
        assert_eq!(streets, vec!["TOP", "EARLIER ROW", "LATER ROW"]);
    }

    #[tokio::test]
    async fn direction_without_field_sorts_by_date() {
        let executor = StubExecutor {
            rows: pattinson_rows(),
        };
        let criteria = SearchCriteria {
            sort_order: Some(SortDirection::Asc),
            ..postcode_criteria()
        };
        let result = search_properties(ENDPOINT, &executor, &criteria)
            .await
            .unwrap();
        assert_eq!(result.properties[0].date, "2019-11-05");
        assert_eq!(result.properties[3].date, "2022-01-20");
    }

    #[tokio::test]
    async fn no_sort_preserves_remote_order() {
        let executor = StubExecutor {
            rows: pattinson_rows(),
        };
        let result = search_properties(ENDPOINT, &executor, &postcode_criteria())
            .await
            .unwrap();
        let prices: Vec<i64> = result.properties.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![250000, 180000, 420000, 310000]);
    }

    #[tokio::test]
    async fn offset_slices_after_filtering() {
        let executor = StubExecutor {
            rows: pattinson_rows(),
        };
        let criteria = SearchCriteria {
            sort_by: Some(SortField::Price),
            sort_order: Some(SortDirection::Asc),
            offset: Some(2),
            limit: Some(10),
            ..postcode_criteria()
        };
        let result = search_properties(ENDPOINT, &executor, &criteria)
            .await
            .unwrap();
        assert_eq!(result.total, 4);
        let prices: Vec<i64> = result.properties.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![310000, 420000]);
    }

    #[tokio::test]
    async fn incomplete_row_aborts_the_search() {
        let mut bad = row(100000, "2021-01-01", "terraced", "X");
        bad.remove("date");
        let executor = StubExecutor {
            rows: vec![row(200000, "2021-02-02", "flat-maisonette", "X"), bad],
        };
        let err = search_properties(ENDPOINT, &executor, &postcode_criteria())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::IncompleteRecord(_)));
    }
}
