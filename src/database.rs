//! # SQLite
//!
//! Single-file database holding reports and discussion posts.
//!
//! ## Requirements
//!
//! - Point lookups by public id for retrieval and allocation probes
//! - Filtered scans feeding the proximity search
//! - Newest-first pagination in fixed pages of 10
//!
//! ## Implementation
//!
//! - One pool shared across request handlers, writes serialized by SQLite
//! - Public ids are the primary keys, so a duplicate insert surfaces as a
//!   unique constraint violation rather than silently overwriting
//! - Attribute filters compare `LOWER(animal_type)` to match regardless of
//!   how submitters capitalized the species

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{
    QueryBuilder, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::geo::GeoPoint;

pub const PAGE_SIZE: i64 = 10;

/// A stored wildlife report. Created once, never updated.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReportRecord {
    pub report_id: i64,
    pub user_id: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
    pub location_name: Option<String>,
    pub severity: i64,
    pub animal_type: String,
    pub description: String,
    pub date_reported: String,
    pub date_created: DateTime<Utc>,
    pub image_exists: bool,
}

impl ReportRecord {
    /// Both coordinates or nothing; reports submitted without a location
    /// are invisible to proximity search.
    pub fn geo_point(&self) -> Option<GeoPoint> {
        match (self.location_lat, self.location_lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
            _ => None,
        }
    }
}

/// A stored discussion post.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostRecord {
    pub post_id: i64,
    pub user_id: Option<String>,
    pub title: String,
    pub message: String,
    pub date_created: DateTime<Utc>,
}

/// Optional attribute filters shared by the scan, latest and page queries.
#[derive(Debug, Clone, Default)]
pub struct ScanFilters {
    pub animal_type: Option<String>,
    pub severity: Option<i64>,
}

pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

#[derive(Clone)]
pub struct ReportStore {
    pool: SqlitePool,
}

impl ReportStore {
    pub async fn connect(path: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    /// Private in-memory database, one connection so every query sees the
    /// same data.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reports (
                report_id INTEGER PRIMARY KEY,
                user_id TEXT,
                location_lat REAL,
                location_lon REAL,
                location_name TEXT,
                severity INTEGER NOT NULL,
                animal_type TEXT NOT NULL,
                description TEXT NOT NULL,
                date_reported TEXT NOT NULL,
                date_created TEXT NOT NULL,
                image_exists INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS discussion (
                post_id INTEGER PRIMARY KEY,
                user_id TEXT,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                date_created TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &ScanFilters) {
        if let Some(animal_type) = &filters.animal_type {
            builder
                .push(" AND LOWER(animal_type) = ")
                .push_bind(animal_type.to_lowercase());
        }

        if let Some(severity) = filters.severity {
            builder.push(" AND severity = ").push_bind(severity);
        }
    }

    pub async fn report_id_exists(&self, id: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT report_id FROM reports WHERE report_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    pub async fn get_report(&self, id: i64) -> Result<Option<ReportRecord>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM reports WHERE report_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_report(&self, report: &ReportRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO reports (report_id, user_id, location_lat, location_lon, location_name,
                severity, animal_type, description, date_reported, date_created, image_exists)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(report.report_id)
        .bind(&report.user_id)
        .bind(report.location_lat)
        .bind(report.location_lon)
        .bind(&report.location_name)
        .bind(report.severity)
        .bind(&report.animal_type)
        .bind(&report.description)
        .bind(&report.date_reported)
        .bind(report.date_created)
        .bind(report.image_exists)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All reports that carry coordinates, with attribute filters pushed
    /// down. Distance filtering happens in [`crate::geo`].
    pub async fn scan_located(
        &self,
        filters: &ScanFilters,
    ) -> Result<Vec<ReportRecord>, sqlx::Error> {
        let mut builder = QueryBuilder::new(
            "SELECT * FROM reports WHERE location_lat IS NOT NULL AND location_lon IS NOT NULL",
        );
        Self::push_filters(&mut builder, filters);

        builder
            .build_query_as::<ReportRecord>()
            .fetch_all(&self.pool)
            .await
    }

    pub async fn latest_reports(
        &self,
        filters: &ScanFilters,
        limit: i64,
    ) -> Result<Vec<ReportRecord>, sqlx::Error> {
        let mut builder = QueryBuilder::new("SELECT * FROM reports WHERE 1 = 1");
        Self::push_filters(&mut builder, filters);
        builder.push(" ORDER BY report_id DESC LIMIT ").push_bind(limit);

        builder
            .build_query_as::<ReportRecord>()
            .fetch_all(&self.pool)
            .await
    }

    pub async fn count_reports(&self, filters: &ScanFilters) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM reports WHERE 1 = 1");
        Self::push_filters(&mut builder, filters);

        let (count,): (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;

        Ok(count)
    }

    pub async fn page_reports(
        &self,
        filters: &ScanFilters,
        page: i64,
    ) -> Result<Vec<ReportRecord>, sqlx::Error> {
        let mut builder = QueryBuilder::new("SELECT * FROM reports WHERE 1 = 1");
        Self::push_filters(&mut builder, filters);
        builder
            .push(" ORDER BY report_id DESC LIMIT ")
            .push_bind(PAGE_SIZE)
            .push(" OFFSET ")
            .push_bind((page - 1) * PAGE_SIZE);

        builder
            .build_query_as::<ReportRecord>()
            .fetch_all(&self.pool)
            .await
    }

    /// Full table scan for the export endpoint.
    pub async fn dump_reports(&self) -> Result<Vec<ReportRecord>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM reports ORDER BY report_id")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn post_id_exists(&self, id: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT post_id FROM discussion WHERE post_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<PostRecord>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM discussion WHERE post_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_post(&self, post: &PostRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO discussion (post_id, user_id, title, message, date_created)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(post.post_id)
        .bind(&post.user_id)
        .bind(&post.title)
        .bind(&post.message)
        .bind(post.date_created)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_posts(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM discussion")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn page_posts(&self, page: i64) -> Result<Vec<PostRecord>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM discussion ORDER BY post_id DESC LIMIT ? OFFSET ?")
            .bind(PAGE_SIZE)
            .bind((page - 1) * PAGE_SIZE)
            .fetch_all(&self.pool)
            .await
    }
}
