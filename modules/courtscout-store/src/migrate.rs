use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

/// Run idempotent schema migrations. Safe to run on every startup.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("Running schema migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courts (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            sport_types TEXT[] NOT NULL DEFAULT '{}',
            address TEXT,
            latitude DOUBLE PRECISION,
            longitude DOUBLE PRECISION,
            surface_type TEXT,
            lighting BOOLEAN,
            court_count INTEGER,
            external_place_id TEXT,
            external_rating DOUBLE PRECISION,
            external_rating_count INTEGER,
            phone_number TEXT,
            website_url TEXT,
            opening_hours JSONB,
            price_level INTEGER,
            photos JSONB,
            verification_status TEXT NOT NULL DEFAULT 'pending',
            discovery_source TEXT NOT NULL,
            created_by TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            CHECK ((latitude IS NULL) = (longitude IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // external_place_id is unique only when present.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS courts_external_place_id_key
        ON courts (external_place_id)
        WHERE external_place_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS courts_name_lower_idx ON courts (LOWER(name))")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS courts_lat_lng_idx ON courts (latitude, longitude)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_areas (
            latitude DOUBLE PRECISION NOT NULL,
            longitude DOUBLE PRECISION NOT NULL,
            radius_m INTEGER NOT NULL,
            sport TEXT NOT NULL,
            last_discovered_at TIMESTAMPTZ NOT NULL,
            total_found INTEGER,
            UNIQUE (latitude, longitude, radius_m, sport)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS search_areas_last_discovered_idx \
         ON search_areas (last_discovered_at)",
    )
    .execute(pool)
    .await?;

    info!("Schema migrations complete");
    Ok(())
}
