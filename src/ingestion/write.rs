//! Write functions - replace PostgreSQL tables with cleaned datasets and read them back

use crate::ingestion::error::Result;
use crate::ingestion::types::{CellValue, Column, Dataset, WriteStats};
use crate::ingestion::utils::quote_ident;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Column as _, PgPool, Postgres, QueryBuilder, Row, TypeInfo};
use tracing::{debug, info};

/// PostgreSQL accepts at most this many bind parameters per statement
const MAX_BIND_PARAMS: usize = 65_535;

/// Column type chosen for a dataset column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    BigInt,
    Double,
    Boolean,
    Timestamp,
    Text,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Text => "TEXT",
        }
    }
}

/// Infer the narrowest SQL type holding every non-missing cell
pub fn infer_sql_type(column: &Column) -> SqlType {
    let present: Vec<&CellValue> = column.values.iter().filter(|v| !v.is_missing()).collect();

    if present.is_empty() {
        return SqlType::Text;
    }

    if present.iter().all(|v| matches!(v, CellValue::Int(_))) {
        SqlType::BigInt
    } else if present.iter().all(|v| v.is_numeric()) {
        SqlType::Double
    } else if present.iter().all(|v| matches!(v, CellValue::Bool(_))) {
        SqlType::Boolean
    } else if present.iter().all(|v| matches!(v, CellValue::DateTime(_))) {
        SqlType::Timestamp
    } else {
        SqlType::Text
    }
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table))
}

pub fn create_table_sql(table: &str, dataset: &Dataset) -> String {
    let columns: Vec<String> = dataset
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), infer_sql_type(c).as_sql()))
        .collect();

    format!("CREATE TABLE {} ({})", quote_ident(table), columns.join(", "))
}

/// Rows per INSERT so a batch stays under the bind-parameter limit
pub fn rows_per_batch(width: usize) -> usize {
    (MAX_BIND_PARAMS / width.max(1)).max(1)
}

/// Drop and recreate `table`, then insert every row of `dataset` (no index column).
/// Runs in one transaction: either the new table is complete or the old one is kept.
pub async fn replace_table(db: &PgPool, table: &str, dataset: &Dataset) -> Result<WriteStats> {
    info!(
        "Writing {} rows to table '{}' (replacing if it exists)",
        dataset.height(),
        table
    );

    let types: Vec<SqlType> = dataset.columns.iter().map(infer_sql_type).collect();
    let mut stats = WriteStats {
        columns: dataset.width(),
        ..WriteStats::default()
    };

    let mut tx = db.begin().await?;

    sqlx::query(&drop_table_sql(table)).execute(&mut *tx).await?;
    sqlx::query(&create_table_sql(table, dataset))
        .execute(&mut *tx)
        .await?;

    if dataset.width() > 0 && !dataset.is_empty() {
        let column_list = dataset
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_head = format!("INSERT INTO {} ({}) ", quote_ident(table), column_list);

        let rows: Vec<Vec<&CellValue>> = dataset.rows().collect();

        for batch in rows.chunks(rows_per_batch(dataset.width())) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(&insert_head);

            builder.push_values(batch, |mut values, row| {
                for (cell, sql_type) in row.iter().zip(&types) {
                    match sql_type {
                        SqlType::BigInt => match cell {
                            CellValue::Int(i) => values.push_bind(Some(*i)),
                            _ => values.push_bind(None::<i64>),
                        },
                        SqlType::Double => values.push_bind(cell.as_f64()),
                        SqlType::Boolean => match cell {
                            CellValue::Bool(b) => values.push_bind(Some(*b)),
                            _ => values.push_bind(None::<bool>),
                        },
                        SqlType::Timestamp => match cell {
                            CellValue::DateTime(dt) => values.push_bind(Some(*dt)),
                            _ => values.push_bind(None::<NaiveDateTime>),
                        },
                        SqlType::Text => match cell {
                            CellValue::Missing => values.push_bind(None::<String>),
                            other => values.push_bind(Some(other.to_string())),
                        },
                    };
                }
            });

            let result = builder.build().execute(&mut *tx).await?;
            stats.rows_written += result.rows_affected() as usize;
            stats.batches += 1;
            debug!("Inserted batch of {} rows into '{}'", batch.len(), table);
        }
    }

    tx.commit().await?;

    info!("Dataset written to table '{}': {}", table, stats);

    Ok(stats)
}

/// Read a whole table back with `SELECT *`
pub async fn read_table(db: &PgPool, table: &str) -> Result<Dataset> {
    let sql = format!("SELECT * FROM {}", quote_ident(table));
    info!("Executing query for table '{}'", table);
    debug!("{}", sql);

    let rows = sqlx::query(&sql).fetch_all(db).await?;

    let names: Vec<String> = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => table_columns(db, table).await?,
    };

    let mut rows_cells = Vec::with_capacity(rows.len());
    for row in &rows {
        let cells = (0..row.len())
            .map(|idx| decode_cell(row, idx))
            .collect::<Result<Vec<_>>>()?;
        rows_cells.push(cells);
    }

    Ok(Dataset::from_rows(names, rows_cells))
}

/// Column names of an empty table, in table order
async fn table_columns(db: &PgPool, table: &str) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(db)
    .await?;

    Ok(names)
}

fn decode_cell(row: &PgRow, idx: usize) -> Result<CellValue> {
    let type_name = row.columns()[idx].type_info().name().to_string();

    let cell = match type_name.as_str() {
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
            .try_get::<Option<String>, _>(idx)?
            .map(CellValue::Text),
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(|v| CellValue::Int(v.into())),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(|v| CellValue::Int(v.into())),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(CellValue::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| CellValue::Float(v.into())),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(CellValue::Float),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(idx)?
            .map(|d| CellValue::Text(d.to_string())),
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(CellValue::Bool),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(CellValue::DateTime),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|dt| CellValue::DateTime(dt.naive_utc())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(CellValue::DateTime),
        // Unknown types: text if the driver can give it, otherwise treated as missing
        _ => row.try_get::<Option<String>, _>(idx).ok().flatten().map(CellValue::Text),
    };

    Ok(cell.unwrap_or(CellValue::Missing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaned_dataset() -> Dataset {
        let when = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        Dataset::new(vec![
            Column::new("region", vec![CellValue::text("north"), CellValue::text(" ")]),
            Column::new("units", vec![CellValue::Int(12), CellValue::Int(7)]),
            Column::new("price", vec![CellValue::Int(3), CellValue::Float(2.5)]),
            Column::new("active", vec![CellValue::Bool(true), CellValue::Bool(false)]),
            Column::new("updated", vec![CellValue::DateTime(when), CellValue::DateTime(when)]),
            Column::new("margin", vec![CellValue::text("45.67%"), CellValue::text("5.0%")]),
        ])
    }

    #[test]
    fn test_infer_sql_types() {
        let dataset = cleaned_dataset();
        let types: Vec<SqlType> = dataset.columns.iter().map(infer_sql_type).collect();

        assert_eq!(
            types,
            vec![
                SqlType::Text,
                SqlType::BigInt,
                SqlType::Double,
                SqlType::Boolean,
                SqlType::Timestamp,
                SqlType::Text,
            ]
        );
    }

    #[test]
    fn test_infer_mixed_column_is_text() {
        let column = Column::new("mixed", vec![CellValue::Int(1), CellValue::text(" ")]);
        assert_eq!(infer_sql_type(&column), SqlType::Text);

        let empty = Column::new("empty", vec![CellValue::Missing]);
        assert_eq!(infer_sql_type(&empty), SqlType::Text);
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("jan_sales", &cleaned_dataset());

        assert_eq!(
            sql,
            "CREATE TABLE \"jan_sales\" (\"region\" TEXT, \"units\" BIGINT, \
             \"price\" DOUBLE PRECISION, \"active\" BOOLEAN, \"updated\" TIMESTAMP, \
             \"margin\" TEXT)"
        );
    }

    #[test]
    fn test_table_names_are_quoted() {
        assert_eq!(
            drop_table_sql("sales; DROP TABLE users"),
            "DROP TABLE IF EXISTS \"sales; DROP TABLE users\""
        );
    }

    #[test]
    fn test_rows_per_batch() {
        assert_eq!(rows_per_batch(1), 65_535);
        assert_eq!(rows_per_batch(6), 10_922);
        assert_eq!(rows_per_batch(0), 65_535);
        assert_eq!(rows_per_batch(100_000), 1);
    }

    #[tokio::test]
    #[ignore] // Needs a PostgreSQL instance at DATABASE_URL
    async fn test_replace_and_read_back() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let db = PgPool::connect(&url).await.unwrap();
        let table = "sheet_loader_write_test";

        let stats = replace_table(&db, table, &cleaned_dataset()).await.unwrap();
        assert_eq!(stats.rows_written, 2);

        // Second write replaces instead of appending
        let smaller = Dataset::new(vec![Column::new("only", vec![CellValue::text("x")])]);
        replace_table(&db, table, &smaller).await.unwrap();

        let read = read_table(&db, table).await.unwrap();
        assert_eq!(read, smaller);

        sqlx::query(&drop_table_sql(table)).execute(&db).await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    #[ignore] // Needs a PostgreSQL instance at DATABASE_URL
    async fn test_read_back_empty_table_keeps_columns() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let db = PgPool::connect(&url).await.unwrap();
        let table = "sheet_loader_empty_test";

        let empty = Dataset::new(vec![Column::new("a", vec![]), Column::new("b", vec![])]);
        replace_table(&db, table, &empty).await.unwrap();

        let read = read_table(&db, table).await.unwrap();
        assert_eq!(read.column_names(), vec!["a", "b"]);
        assert_eq!(read.height(), 0);

        sqlx::query(&drop_table_sql(table)).execute(&db).await.unwrap();
        db.close().await;
    }
}
