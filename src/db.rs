use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{SchoolId, SubmissionRecord, SuspectEntry};
use crate::sequence;
use crate::store::SubmissionStore;

const RECORD_COLUMNS: &str = r#"
    "School ID" AS school_id,
    COALESCE("Class", '') AS class,
    COALESCE("Section", '') AS section,
    COALESCE(uploaded_by, '') AS uploaded_by,
    "Timestamp" AS timestamp,
    COALESCE("Class_pic", '') AS class_pic,
    "Film 1"::text AS film_1,
    "Film 2"::text AS film_2,
    "Film 3"::text AS film_3
"#;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn record_from_row(row: &PgRow) -> SubmissionRecord {
    let timestamp: NaiveDateTime = row.get("timestamp");
    SubmissionRecord {
        school_id: row.get("school_id"),
        class: row.get("class"),
        section: row.get("section"),
        uploaded_by: row.get("uploaded_by"),
        timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
        class_pic: row.get("class_pic"),
        films: [row.get("film_1"), row.get("film_2"), row.get("film_3")],
    }
}

pub async fn list_school_ids(pool: &PgPool, date: NaiveDate) -> Result<Vec<SchoolId>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT "School ID" AS school_id
        FROM kant.form_response_data
        WHERE DATE("Timestamp") = $1
        ORDER BY "School ID"
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("school_id")).collect())
}

pub async fn fetch_records(
    pool: &PgPool,
    school_id: SchoolId,
    date: NaiveDate,
) -> Result<Vec<SubmissionRecord>> {
    let query = format!(
        r#"SELECT {RECORD_COLUMNS}
        FROM kant.form_response_data
        WHERE "School ID" = $1 AND DATE("Timestamp") = $2
        ORDER BY "Timestamp""#
    );
    let rows = sqlx::query(&query)
        .bind(school_id)
        .bind(date)
        .fetch_all(pool)
        .await?;

    let fetched = rows.len();
    let records = sequence::order_and_dedup(rows.iter().map(record_from_row).collect());
    debug!(school_id, %date, fetched, kept = records.len(), "fetched records");
    Ok(records)
}

pub async fn lookup_school_name(pool: &PgPool, school_id: SchoolId) -> Result<Option<String>> {
    let row = sqlx::query(
        r#"SELECT "SCHOOL" AS school FROM kant.doe_school_list WHERE "SCHOOL ID" = $1"#,
    )
    .bind(school_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| row.get("school")))
}

/// Adds a record to the suspect list, then keeps only the latest entry for
/// each school.
pub async fn append_suspect(pool: &PgPool, record: &SubmissionRecord, issues: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO kant.suspect_list
        ("School ID", "Class", "Section", uploaded_by, "Timestamp", "Class_pic",
         "Film 1", "Film 2", "Film 3", "Issues")
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(record.school_id)
    .bind(&record.class)
    .bind(&record.section)
    .bind(&record.uploaded_by)
    .bind(record.timestamp)
    .bind(&record.class_pic)
    .bind(&record.films[0])
    .bind(&record.films[1])
    .bind(&record.films[2])
    .bind(issues)
    .execute(&mut *tx)
    .await?;

    let pruned = sqlx::query(
        r#"
        DELETE FROM kant.suspect_list
        WHERE ctid NOT IN (
            SELECT DISTINCT ON ("School ID") ctid
            FROM kant.suspect_list
            ORDER BY "School ID", "Timestamp" DESC
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(
        school_id = record.school_id,
        timestamp = %record.timestamp,
        pruned = pruned.rows_affected(),
        "record added to suspect list"
    );
    Ok(())
}

pub async fn remove_suspect(
    pool: &PgPool,
    school_id: SchoolId,
    timestamp: NaiveDateTime,
) -> Result<u64> {
    let result = sqlx::query(
        r#"DELETE FROM kant.suspect_list WHERE "School ID" = $1 AND "Timestamp" = $2"#,
    )
    .bind(school_id)
    .bind(timestamp)
    .execute(pool)
    .await?;

    info!(school_id, %timestamp, removed = result.rows_affected(), "suspect list delete");
    Ok(result.rows_affected())
}

pub async fn list_suspects(pool: &PgPool) -> Result<Vec<SuspectEntry>> {
    let query = format!(
        r#"SELECT {RECORD_COLUMNS}, COALESCE("Issues", '') AS issues
        FROM kant.suspect_list
        ORDER BY "School ID", "Timestamp" DESC"#
    );
    let rows = sqlx::query(&query).fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let record = record_from_row(row);
            SuspectEntry {
                school_id: record.school_id,
                class: record.class,
                section: record.section,
                uploaded_by: record.uploaded_by,
                timestamp: record.timestamp,
                class_pic: record.class_pic,
                issues: row.get("issues"),
            }
        })
        .collect())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        #[serde(rename = "School ID")]
        school_id: SchoolId,
        #[serde(rename = "Class")]
        class: String,
        #[serde(rename = "Section")]
        section: String,
        uploaded_by: String,
        #[serde(rename = "Timestamp")]
        timestamp: String,
        #[serde(rename = "Class_pic")]
        class_pic: String,
        #[serde(rename = "Film 1")]
        film_1: Option<String>,
        #[serde(rename = "Film 2")]
        film_2: Option<String>,
        #[serde(rename = "Film 3")]
        film_3: Option<String>,
        #[serde(rename = "School", default)]
        school_name: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let timestamp = NaiveDateTime::parse_from_str(row.timestamp.trim(), "%Y-%m-%d %H:%M:%S")
            .with_context(|| format!("row {}: bad timestamp {:?}", line + 1, row.timestamp))?;

        if let Some(name) = row.school_name.as_deref().filter(|name| !name.is_empty()) {
            sqlx::query(
                r#"
                INSERT INTO kant.doe_school_list ("SCHOOL ID", "SCHOOL")
                VALUES ($1, $2)
                ON CONFLICT ("SCHOOL ID") DO UPDATE SET "SCHOOL" = EXCLUDED."SCHOOL"
                "#,
            )
            .bind(row.school_id)
            .bind(name)
            .execute(pool)
            .await?;
        }

        let result = sqlx::query(
            r#"
            INSERT INTO kant.form_response_data
            ("School ID", "Class", "Section", uploaded_by, "Timestamp", "Class_pic",
             "Film 1", "Film 2", "Film 3")
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(row.school_id)
        .bind(&row.class)
        .bind(&row.section)
        .bind(&row.uploaded_by)
        .bind(timestamp)
        .bind(&row.class_pic)
        .bind(&row.film_1)
        .bind(&row.film_2)
        .bind(&row.film_3)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Postgres-backed submission store.
#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SubmissionStore for PgSubmissionStore {
    async fn list_school_ids(&self, date: NaiveDate) -> Result<Vec<SchoolId>> {
        list_school_ids(&self.pool, date).await
    }

    async fn fetch_records(
        &self,
        school_id: SchoolId,
        date: NaiveDate,
    ) -> Result<Vec<SubmissionRecord>> {
        fetch_records(&self.pool, school_id, date).await
    }

    async fn lookup_school_name(&self, school_id: SchoolId) -> Result<Option<String>> {
        lookup_school_name(&self.pool, school_id).await
    }
}
