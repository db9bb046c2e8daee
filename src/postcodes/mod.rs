pub mod store;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::{Result, ScoutError};
use crate::models::{normalize_postcode, LookupResult, PostcodeLookupCriteria, PostcodeRecord};

pub use store::PostcodeStore;
use store::{DEFAULT_LIMIT, MAX_LIMIT, MAX_RADIUS_METERS};

/// Relative fallback when neither an override nor the environment
/// names a database file
const DEFAULT_DB_PATH: &str = "data/postcodes.db";
const DB_PATH_ENV: &str = "POSTCODE_DB_PATH";

// Single-assignment cache: the store is opened once per resolved path
// and reused across calls. Rebuilt only when the path changes.
static SHARED: Mutex<Option<(PathBuf, Arc<PostcodeStore>)>> = Mutex::new(None);

/// Resolve the database location: explicit override, else the
/// `POSTCODE_DB_PATH` environment variable, else a default relative path.
pub fn resolve_db_path(override_path: Option<&Path>) -> PathBuf {
    if let Some(path) = override_path {
        return path.to_path_buf();
    }
    match std::env::var(DB_PATH_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_DB_PATH),
    }
}

/// Process-wide read-only handle to the reference dataset.
pub fn shared_store(override_path: Option<&Path>) -> Result<Arc<PostcodeStore>> {
    let resolved = resolve_db_path(override_path);
    let mut guard = SHARED.lock().expect("shared store mutex poisoned");
    if let Some((path, store)) = guard.as_ref() {
        if *path == resolved {
            return Ok(Arc::clone(store));
        }
    }
    info!("opening postcode store at {}", resolved.display());
    let store = Arc::new(PostcodeStore::open(&resolved)?);
    *guard = Some((resolved, Arc::clone(&store)));
    Ok(store)
}

fn validate(criteria: &PostcodeLookupCriteria) -> Result<()> {
    let has_postcode = criteria.postcode.is_some();
    let has_point = criteria.easting.is_some() && criteria.northing.is_some();
    if has_postcode && (criteria.easting.is_some() || criteria.northing.is_some()) {
        return Err(ScoutError::Validation(
            "supply either a postcode or an easting/northing pair, not both".to_string(),
        ));
    }
    if !has_postcode && !has_point {
        return Err(ScoutError::Validation(
            "supply either a postcode or both easting and northing".to_string(),
        ));
    }

    if let Some(radius) = criteria.radius_meters {
        // written so NaN fails too
        if !(radius > 0.0 && radius <= MAX_RADIUS_METERS) {
            return Err(ScoutError::Validation(format!(
                "radius must be between 0 and {} meters",
                MAX_RADIUS_METERS
            )));
        }
    }
    if let Some(limit) = criteria.limit {
        if limit == 0 || limit > MAX_LIMIT {
            return Err(ScoutError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
    }
    Ok(())
}

/// Resolve the query center: a stored record when a postcode is given,
/// otherwise a synthetic record at the explicit coordinates with empty
/// metadata fields.
fn resolve_center(
    store: &PostcodeStore,
    criteria: &PostcodeLookupCriteria,
) -> Result<PostcodeRecord> {
    match &criteria.postcode {
        Some(postcode) => store.find_by_postcode(&normalize_postcode(postcode)),
        None => Ok(PostcodeRecord {
            postcode: String::new(),
            quality: 0,
            // validated present before this point
            easting: criteria.easting.unwrap_or_default(),
            northing: criteria.northing.unwrap_or_default(),
            country: String::new(),
            county: String::new(),
            district: String::new(),
            ward: String::new(),
        }),
    }
}

/// Nearest-neighbour postcode lookup against the local reference store.
pub fn lookup_postcodes(
    store: &PostcodeStore,
    criteria: &PostcodeLookupCriteria,
) -> Result<LookupResult> {
    validate(criteria)?;

    let center = resolve_center(store, criteria)?;
    let limit = criteria.limit.unwrap_or(DEFAULT_LIMIT);
    let (postcodes, total) = store.nearby(
        &center,
        criteria.radius_meters,
        limit,
        criteria.include_self,
        criteria.district.as_deref(),
    )?;

    Ok(LookupResult {
        center,
        postcodes,
        total,
    })
}
