use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Result, ScoutError};
use crate::models::{PostcodeDistance, PostcodeRecord};

/// Search radius when the caller does not supply one
pub const DEFAULT_RADIUS_METERS: f64 = 5_000.0;
/// Hard ceiling for both explicit radii and adaptive expansion
pub const MAX_RADIUS_METERS: f64 = 200_000.0;
/// Result count when the caller does not supply one
pub const DEFAULT_LIMIT: usize = 10;
/// Hard ceiling for the result count
pub const MAX_LIMIT: usize = 100;

/// Read-only reference store of geocoded postcodes, backed by SQLite
/// with an R*Tree index of degenerate per-point rectangles.
///
/// Populated once by the external ETL through [`PostcodeStore::insert_batch`];
/// queried concurrently afterwards. The connection is behind a mutex only
/// because SQLite handles are not `Sync`; no write happens at query time.
pub struct PostcodeStore {
    conn: Mutex<Connection>,
}

impl PostcodeStore {
    /// Open (or create) the store at the given file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!("opened postcode store at {}", path.as_ref().display());
        Self::init(conn)
    }

    /// Open an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS postcodes (
                id INTEGER PRIMARY KEY,
                postcode TEXT NOT NULL UNIQUE,
                quality INTEGER NOT NULL,
                easting INTEGER NOT NULL,
                northing INTEGER NOT NULL,
                country TEXT NOT NULL,
                county TEXT NOT NULL,
                district TEXT NOT NULL,
                ward TEXT NOT NULL
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS postcode_rtree USING rtree(
                id, min_easting, max_easting, min_northing, max_northing
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert one record and its zero-area index rectangle.
    pub fn insert(&self, record: &PostcodeRecord) -> Result<()> {
        let conn = self.conn.lock().expect("postcode store mutex poisoned");
        Self::insert_with(&conn, record)
    }

    /// Insert many records in a single transaction. Used by the ETL.
    pub fn insert_batch(&self, records: &[PostcodeRecord]) -> Result<()> {
        let mut conn = self.conn.lock().expect("postcode store mutex poisoned");
        let tx = conn.transaction()?;
        for record in records {
            Self::insert_with(&tx, record)?;
        }
        tx.commit()?;
        info!("loaded {} postcode records", records.len());
        Ok(())
    }

    fn insert_with(conn: &Connection, record: &PostcodeRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO postcodes
                (postcode, quality, easting, northing, country, county, district, ward)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.postcode,
                record.quality,
                record.easting,
                record.northing,
                record.country,
                record.county,
                record.district,
                record.ward,
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO postcode_rtree
                (id, min_easting, max_easting, min_northing, max_northing)
             VALUES (?1, ?2, ?2, ?3, ?3)",
            params![id, record.easting as f64, record.northing as f64],
        )?;
        Ok(())
    }

    /// Fetch one record by canonical postcode.
    pub fn find_by_postcode(&self, postcode: &str) -> Result<PostcodeRecord> {
        let conn = self.conn.lock().expect("postcode store mutex poisoned");
        conn.query_row(
            "SELECT postcode, quality, easting, northing, country, county, district, ward
             FROM postcodes WHERE postcode = ?1",
            params![postcode],
            row_to_record,
        )
        .optional()?
        .ok_or_else(|| ScoutError::NotFound(format!("postcode '{}'", postcode)))
    }

    /// All records whose point falls inside the axis-aligned box of side
    /// `2 * radius` centered on (cx, cy), optionally restricted to one
    /// administrative district. Ordered by rowid, so repeated queries
    /// return candidates in a stable order.
    fn box_candidates(
        &self,
        cx: f64,
        cy: f64,
        radius: f64,
        district: Option<&str>,
    ) -> Result<Vec<PostcodeRecord>> {
        let conn = self.conn.lock().expect("postcode store mutex poisoned");
        let sql = format!(
            "SELECT p.postcode, p.quality, p.easting, p.northing,
                    p.country, p.county, p.district, p.ward
             FROM postcodes p JOIN postcode_rtree r ON p.id = r.id
             WHERE r.min_easting >= ?1 AND r.max_easting <= ?2
               AND r.min_northing >= ?3 AND r.max_northing <= ?4
               {}
             ORDER BY p.id",
            if district.is_some() {
                "AND p.district = ?5"
            } else {
                ""
            }
        );
        let mut stmt = conn.prepare(&sql)?;
        let bounds = [cx - radius, cx + radius, cy - radius, cy + radius];
        let rows = match district {
            Some(district) => stmt.query_map(
                params![bounds[0], bounds[1], bounds[2], bounds[3], district],
                row_to_record,
            )?,
            None => stmt.query_map(
                params![bounds[0], bounds[1], bounds[2], bounds[3]],
                row_to_record,
            )?,
        };
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Nearest-neighbour search around `center`.
    ///
    /// With an explicit `radius` the bounding box is queried once and
    /// candidates beyond the true circular radius are dropped (the box
    /// pre-filter is necessary but not sufficient). Without one, the
    /// search starts at the default radius and doubles it about the same
    /// center until at least `limit` candidates are found or the ceiling
    /// is hit, then returns what was found.
    ///
    /// Returns the ranked neighbours (at most `limit`) and the total
    /// count after the distance/self filters, before truncation.
    pub fn nearby(
        &self,
        center: &PostcodeRecord,
        radius: Option<f64>,
        limit: usize,
        include_self: bool,
        district: Option<&str>,
    ) -> Result<(Vec<PostcodeDistance>, usize)> {
        let cx = center.easting as f64;
        let cy = center.northing as f64;

        let keep = |record: &PostcodeRecord| include_self || record.postcode != center.postcode;

        let explicit = radius.is_some();
        let mut current_radius = radius.unwrap_or(DEFAULT_RADIUS_METERS);
        let mut candidates = self.box_candidates(cx, cy, current_radius, district)?;

        // The self-match never counts towards filling the page.
        while !explicit
            && candidates.iter().filter(|r| keep(r)).count() < limit
            && current_radius < MAX_RADIUS_METERS
        {
            current_radius = (current_radius * 2.0).min(MAX_RADIUS_METERS);
            debug!(
                "expanding search box to radius {} ({} candidates so far)",
                current_radius,
                candidates.len()
            );
            candidates = self.box_candidates(cx, cy, current_radius, district)?;
        }

        let mut ranked: Vec<PostcodeDistance> = candidates
            .into_iter()
            .filter(|record| keep(record))
            .map(|record| {
                let de = record.easting as f64 - cx;
                let dn = record.northing as f64 - cy;
                PostcodeDistance {
                    record,
                    distance_meters: (de * de + dn * dn).sqrt(),
                }
            })
            .filter(|entry| !explicit || entry.distance_meters <= current_radius)
            .collect();

        // Stable sort; ties keep index-query order.
        ranked.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));

        let total = ranked.len();
        ranked.truncate(limit);
        Ok((ranked, total))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostcodeRecord> {
    Ok(PostcodeRecord {
        postcode: row.get(0)?,
        quality: row.get(1)?,
        easting: row.get(2)?,
        northing: row.get(3)?,
        country: row.get(4)?,
        county: row.get(5)?,
        district: row.get(6)?,
        ward: row.get(7)?,
    })
}
