//! SPARQL query templates for the price-paid dataset.
//!
//! Templates are plain string transforms. Literal values are escaped by
//! replacing embedded `"` with `\"`; there is no further injection
//! defense. Address matching in the remote store is case-sensitive, so
//! callers normalize case before building a query.

/// Cap applied at the query level, independent of caller pagination
pub const RESULT_CAP: usize = 100;

const PREFIXES: &str = "\
PREFIX lrppi: <http://landregistry.data.gov.uk/def/ppi/>
PREFIX lrcommon: <http://landregistry.data.gov.uk/def/common/>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
";

/// Escape a literal for embedding in query text
fn escape(value: &str) -> String {
    value.replace('"', "\\\"")
}

fn build(address_constraints: &str) -> String {
    format!(
        "{PREFIXES}
SELECT ?amount ?date ?propertyType ?estateType ?newBuild ?paon ?saon ?street ?town ?county ?postcode
WHERE {{
{address_constraints}
  ?transx lrppi:propertyAddress ?addr ;
          lrppi:pricePaid ?amount ;
          lrppi:transactionDate ?date ;
          lrppi:propertyType ?propertyType .
  OPTIONAL {{ ?transx lrppi:estateType ?estateType }}
  OPTIONAL {{ ?transx lrppi:newBuild ?newBuild }}
  OPTIONAL {{ ?addr lrcommon:paon ?paon }}
  OPTIONAL {{ ?addr lrcommon:saon ?saon }}
  OPTIONAL {{ ?addr lrcommon:street ?street }}
  OPTIONAL {{ ?addr lrcommon:town ?town }}
  OPTIONAL {{ ?addr lrcommon:county ?county }}
  OPTIONAL {{ ?addr lrcommon:postcode ?postcode }}
}}
ORDER BY DESC(?date)
LIMIT {RESULT_CAP}
"
    )
}

/// Query selecting all transactions at a single postcode.
pub fn by_postcode(postcode: &str) -> String {
    let constraint = format!("  ?addr lrcommon:postcode \"{}\" .", escape(postcode));
    build(&constraint)
}

/// Query selecting transactions matching street and town, optionally
/// narrowed by house number (PAON) and/or postcode.
pub fn by_street_town(
    street: &str,
    town: &str,
    paon: Option<&str>,
    postcode: Option<&str>,
) -> String {
    let mut constraints = format!(
        "  ?addr lrcommon:street \"{}\" .\n  ?addr lrcommon:town \"{}\" .",
        escape(street),
        escape(town)
    );
    if let Some(paon) = paon {
        constraints.push_str(&format!("\n  ?addr lrcommon:paon \"{}\" .", escape(paon)));
    }
    if let Some(postcode) = postcode {
        constraints.push_str(&format!(
            "\n  ?addr lrcommon:postcode \"{}\" .",
            escape(postcode)
        ));
    }
    build(&constraints)
}

/// Insert inclusive date-bound FILTER constraints into an already-built
/// query, just inside the final closing brace of the pattern block.
///
/// If the query has no `ORDER BY` clause, or no closing brace before
/// it, the structure is not what this transform expects and the input
/// is returned unchanged. That fallback skips the date filter rather
/// than failing the search.
pub fn with_date_bounds(query: &str, from: Option<&str>, to: Option<&str>) -> String {
    if from.is_none() && to.is_none() {
        return query.to_string();
    }

    let order_pos = match query.find("ORDER BY") {
        Some(pos) => pos,
        None => return query.to_string(),
    };
    let brace_pos = match query[..order_pos].rfind('}') {
        Some(pos) => pos,
        None => return query.to_string(),
    };

    let mut filters = String::new();
    if let Some(from) = from {
        filters.push_str(&format!(
            "  FILTER (?date >= \"{}\"^^xsd:date)\n",
            escape(from)
        ));
    }
    if let Some(to) = to {
        filters.push_str(&format!(
            "  FILTER (?date <= \"{}\"^^xsd:date)\n",
            escape(to)
        ));
    }

    format!(
        "{}{}{}",
        &query[..brace_pos],
        filters,
        &query[brace_pos..]
    )
}
