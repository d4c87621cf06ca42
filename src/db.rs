use crate::dataset::{Dataset, FieldValue, FinancialRecord};
use crate::ratios::Ratio;
use crate::table::{RawField, RawTable};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// CSV BOUNDARY
// ============================================================================

/// Read a CSV file into a raw table. Short rows are allowed.
pub fn load_csv(csv_path: &Path) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;

    let headers = rdr
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.context("Failed to read CSV row")?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable::new(headers, rows))
}

/// Cell text for export; undefined numbers become empty cells
fn export_cell(record: &FinancialRecord, column: &str) -> String {
    match record.value(column) {
        Some(FieldValue::Number(Some(v))) if column == crate::table::YEAR_COLUMN => {
            format!("{}", v as i64)
        }
        Some(FieldValue::Number(Some(v))) => v.to_string(),
        Some(FieldValue::Number(None)) | None => String::new(),
        Some(FieldValue::Text(t)) => t.to_string(),
    }
}

/// Write the ratio-augmented table: original columns + derived columns,
/// same row order as the cleaned input
pub fn export_csv(dataset: &Dataset, csv_path: &Path) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create CSV file: {:?}", csv_path))?;

    wtr.write_record(dataset.columns())?;
    for record in dataset.records() {
        let row: Vec<String> = dataset
            .columns()
            .iter()
            .map(|c| export_cell(record, c))
            .collect();
        wtr.write_record(&row)?;
    }
    wtr.flush()?;

    Ok(dataset.len())
}

// ============================================================================
// SQLITE EXPORT
// ============================================================================

/// Idempotency hash on the record key: re-exporting the same dataset
/// inserts nothing new
pub fn compute_idempotency_hash(record: &FinancialRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}", record.company, record.year));
    format!("{:x}", hasher.finalize())
}

fn raw_sql_column(field: RawField) -> &'static str {
    match field {
        RawField::TotalRevenue => "total_revenue",
        RawField::NetIncome => "net_income",
        RawField::TotalLiabilities => "total_liabilities",
        RawField::TotalAssets => "total_assets",
        RawField::OperatingCashFlow => "operating_cash_flow",
        RawField::TotalCurrentAssets => "total_current_assets",
        RawField::TotalCurrentLiabilities => "total_current_liabilities",
    }
}

fn ratio_sql_column(ratio: Ratio) -> &'static str {
    match ratio {
        Ratio::NetProfitMargin => "net_profit_margin",
        Ratio::DebtRatio => "debt_ratio",
        Ratio::CfoToNetIncome => "cfo_to_net_income",
        Ratio::Roa => "roa",
    }
}

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Raw and derived columns are nullable: absent input columns and
    // undefined ratios are stored as NULL
    conn.execute(
        "CREATE TABLE IF NOT EXISTS financial_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            company TEXT NOT NULL,
            year INTEGER NOT NULL,
            total_revenue REAL,
            net_income REAL,
            total_liabilities REAL,
            total_assets REAL,
            operating_cash_flow REAL,
            total_current_assets REAL,
            total_current_liabilities REAL,
            net_profit_margin REAL,
            debt_ratio REAL,
            cfo_to_net_income REAL,
            roa REAL,
            extras TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_company_year ON financial_records(company, year)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert every record; rows already present (same key hash) are skipped.
/// Logs one `dataset_exported` event per call.
pub fn insert_records(conn: &Connection, dataset: &Dataset) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    let columns: Vec<&str> = RawField::ALL
        .iter()
        .map(|f| raw_sql_column(*f))
        .chain(Ratio::ALL.iter().map(|r| ratio_sql_column(*r)))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len() + 4).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO financial_records (idempotency_hash, company, year, {}, extras) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    for record in dataset.records() {
        let hash = compute_idempotency_hash(record);

        let mut values: Vec<rusqlite::types::Value> = vec![
            hash.clone().into(),
            record.company.clone().into(),
            i64::from(record.year).into(),
        ];
        for field in RawField::ALL {
            values.push(record.raw(field).into());
        }
        for ratio in Ratio::ALL {
            values.push(record.ratio(ratio).flatten().into());
        }

        let extras: BTreeMap<&str, &str> = dataset
            .columns()
            .iter()
            .filter_map(|c| record.extra(c).map(|v| (c.as_str(), v)))
            .collect();
        values.push(serde_json::to_string(&extras)?.into());

        match conn.execute(&sql, rusqlite::params_from_iter(values)) {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let event = Event::new(
        "dataset_exported",
        "dataset",
        "financial_records",
        serde_json::json!({
            "inserted": inserted,
            "duplicates": duplicates,
            "ratios": dataset.ratios().iter().map(|r| r.column_name()).collect::<Vec<_>>(),
        }),
        "ratio_pipeline",
    );
    insert_event(conn, &event)?;

    tracing::info!(inserted, duplicates, "records written to database");

    Ok(inserted)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM financial_records", [], |row| row.get(0))?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::run_pipeline;

    fn dataset() -> Dataset {
        let table = RawTable::from_strs(
            &["Company", "Year", "Net Income", "Total Revenue", "Total Assets", "Sector"],
            &[
                &["Apple", "2024", "50", "200", "0", "Tech"],
                &["Tesla", "2024", "10", "40", "80", ""],
            ],
        );
        run_pipeline(table).unwrap().dataset
    }

    #[test]
    fn test_export_csv_schema_and_undefined_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let written = export_csv(&dataset(), &path).unwrap();
        assert_eq!(written, 2);

        let table = load_csv(&path).unwrap();
        assert_eq!(
            table.headers,
            vec![
                "Company",
                "Year",
                "Net Income",
                "Total Revenue",
                "Total Assets",
                "Sector",
                "Net Profit Margin (%)",
                "ROA (%)",
            ]
        );
        assert_eq!(table.rows[0], vec!["Apple", "2024", "50", "200", "0", "Tech", "25", ""]);
        assert_eq!(table.rows[1][7], "12.5");
    }

    #[test]
    fn test_load_csv_round_trips_through_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, " Company ,Year,Net Income\nApple,2024,5\nApple,2024,6\nTesla,2023\n").unwrap();

        let out = run_pipeline(load_csv(&path).unwrap()).unwrap();
        assert_eq!(out.dataset.len(), 2);
        assert_eq!(out.normalization.duplicates_removed, 1);
        assert_eq!(out.dataset.get("Tesla", 2023).unwrap().raw(RawField::NetIncome), Some(0.0));
    }

    #[test]
    fn test_idempotency_export_twice() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let ds = dataset();

        let inserted1 = insert_records(&conn, &ds).unwrap();
        let inserted2 = insert_records(&conn, &ds).unwrap();

        assert_eq!(inserted1, 2, "First export should insert 2 records");
        assert_eq!(inserted2, 0, "Second export should insert nothing");
        assert_eq!(verify_count(&conn).unwrap(), 2);

        let events = get_events_for_entity(&conn, "dataset", "financial_records").unwrap();
        assert_eq!(events.len(), 2, "one audit event per export");
        assert_eq!(events[0].data["inserted"], 0, "newest export first");
        assert_eq!(events[0].data["duplicates"], 2);
        assert_eq!(events[1].data["inserted"], 2);
        assert_eq!(events[0].actor, "ratio_pipeline");
    }

    #[test]
    fn test_undefined_ratio_stored_as_null() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        insert_records(&conn, &dataset()).unwrap();

        let (roa, margin, assets_liab): (Option<f64>, Option<f64>, Option<f64>) = conn
            .query_row(
                "SELECT roa, net_profit_margin, total_liabilities FROM financial_records WHERE company = 'Apple'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();

        assert_eq!(roa, None, "zero assets → undefined ROA → NULL");
        assert_eq!(margin, Some(25.0));
        assert_eq!(assets_liab, None, "absent input column → NULL");
    }

    #[test]
    fn test_compute_idempotency_hash() {
        let a = FinancialRecord::new("Apple", 2024);
        let b = FinancialRecord::new("Apple", 2024).with_raw(RawField::NetIncome, 1.0);

        assert_eq!(compute_idempotency_hash(&a), compute_idempotency_hash(&b), "hash covers the key only");
        assert_eq!(compute_idempotency_hash(&a).len(), 64, "SHA-256 hash should be 64 hex characters");
        assert_ne!(
            compute_idempotency_hash(&a),
            compute_idempotency_hash(&FinancialRecord::new("Apple", 2023))
        );
    }
}
