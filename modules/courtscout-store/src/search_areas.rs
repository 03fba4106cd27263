use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use courtscout_common::{PopularArea, SearchArea, SearchAreaKey, Sport};

// AVG over INTEGER yields NUMERIC, which sqlx will not decode as f64;
// the cast keeps the column FLOAT8 so `row.get::<f64>` holds.
const POPULAR_SQL: &str = r#"
    SELECT latitude, longitude,
           COUNT(*) AS search_count,
           AVG(radius_m)::DOUBLE PRECISION AS avg_radius_m,
           MAX(last_discovered_at) AS last_discovered_at
    FROM search_areas
    WHERE last_discovered_at >= $1
    GROUP BY latitude, longitude
    HAVING COUNT(*) >= $2
    ORDER BY search_count DESC, last_discovered_at DESC
    LIMIT $3
"#;

/// Search-area recency cache over Postgres.
#[derive(Clone)]
pub struct PgSearchAreaStore {
    pool: PgPool,
}

impl PgSearchAreaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_key(&self, key: &SearchAreaKey) -> Result<Option<SearchArea>> {
        let row = sqlx::query(
            r#"
            SELECT latitude, longitude, radius_m, sport, last_discovered_at, total_found
            FROM search_areas
            WHERE latitude = $1 AND longitude = $2 AND radius_m = $3 AND sport = $4
            "#,
        )
        .bind(key.latitude)
        .bind(key.longitude)
        .bind(key.radius_m)
        .bind(key.sport.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_search_area))
    }

    /// Insert-or-touch: refresh the timestamp, leave `total_found` from the
    /// previous completed pass untouched when the row pre-exists.
    pub async fn touch(&self, key: &SearchAreaKey, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO search_areas (latitude, longitude, radius_m, sport, last_discovered_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (latitude, longitude, radius_m, sport)
            DO UPDATE SET last_discovered_at = EXCLUDED.last_discovered_at
            "#,
        )
        .bind(key.latitude)
        .bind(key.longitude)
        .bind(key.radius_m)
        .bind(key.sport.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a completed pass (success or failure) with its result count.
    pub async fn complete(&self, key: &SearchAreaKey, count: i32, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO search_areas (latitude, longitude, radius_m, sport, last_discovered_at, total_found)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (latitude, longitude, radius_m, sport)
            DO UPDATE SET last_discovered_at = EXCLUDED.last_discovered_at,
                          total_found = EXCLUDED.total_found
            "#,
        )
        .bind(key.latitude)
        .bind(key.longitude)
        .bind(key.radius_m)
        .bind(key.sport.as_str())
        .bind(now)
        .bind(count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Distinct (lat, lng) groups searched since the window start, ordered
    /// by search count then recency, carrying an average radius.
    pub async fn popular(
        &self,
        since: DateTime<Utc>,
        min_searches: i64,
        limit: i64,
    ) -> Result<Vec<PopularArea>> {
        let rows = sqlx::query(POPULAR_SQL)
        .bind(since)
        .bind(min_searches)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PopularArea {
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
                search_count: row.get("search_count"),
                avg_radius_m: row.get("avg_radius_m"),
                last_discovered_at: row.get("last_discovered_at"),
            })
            .collect())
    }

    /// Delete rows untouched since the cutoff. Returns rows removed.
    pub async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM search_areas WHERE last_discovered_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn row_to_search_area(row: sqlx::postgres::PgRow) -> SearchArea {
    let sport: String = row.get("sport");
    SearchArea {
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        radius_m: row.get("radius_m"),
        sport: Sport::new(&sport),
        last_discovered_at: row.get("last_discovered_at"),
        total_found: row.get("total_found"),
    }
}
