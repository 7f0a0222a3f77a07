use chrono::NaiveDate;
use sqlx::error::ErrorKind;
use sqlx::{Executor, Sqlite, SqliteConnection};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    Date(NaiveDate),
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    table: &'static str,
    id_column: &'static str,
    id_value: i64,
    columns: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl SqlUpdate {
    pub fn new(table: &'static str, id_column: &'static str, id_value: i64) -> Self {
        Self {
            table,
            id_column,
            id_value,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Column names are always compile-time constants, only values come from requests.
    pub fn set(&mut self, column: &'static str, value: SqlValue) -> &mut Self {
        self.columns.push(column);
        self.values.push(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn sql(&self) -> String {
        let set_clause = self
            .columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, set_clause, self.id_column
        )
    }
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'e, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    if update.is_empty() {
        return Ok(0);
    }

    let sql = update.sql();
    tracing::debug!(sql = %sql, values = ?update.values, "Executing update");

    let mut query = sqlx::query(&sql);
    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
        };
    }
    query = query.bind(update.id_value);

    let result = query.execute(executor).await?;
    Ok(result.rows_affected())
}

/// Whether `table` has a row with this primary key.
pub async fn row_exists(
    conn: &mut SqliteConnection,
    table: &'static str,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found = sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// A write rejected by a table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Columns named by the violated UNIQUE constraint, without table prefix.
    Unique(Vec<String>),
    ForeignKey,
}

pub fn constraint_violation(err: &sqlx::Error) -> Option<Constraint> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };

    match db_err.kind() {
        ErrorKind::UniqueViolation => Some(Constraint::Unique(unique_columns(db_err.message()))),
        ErrorKind::ForeignKeyViolation => Some(Constraint::ForeignKey),
        _ => None,
    }
}

// sqlite reports "UNIQUE constraint failed: attendance.employee_id, attendance.date"
fn unique_columns(message: &str) -> Vec<String> {
    let Some((_, columns)) = message.split_once(": ") else {
        return Vec::new();
    };

    columns
        .split(',')
        .map(|c| {
            let c = c.trim();
            c.rsplit_once('.').map_or(c, |(_, column)| column).to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_sql_lists_columns_in_order() {
        let mut update = SqlUpdate::new("employees", "id", 7);
        update
            .set("full_name", SqlValue::String("Ada".into()))
            .set("department", SqlValue::String("Eng".into()));

        assert_eq!(
            update.sql(),
            "UPDATE employees SET full_name = ?, department = ? WHERE id = ?"
        );
    }

    #[test]
    fn empty_update_reports_empty() {
        assert!(SqlUpdate::new("attendance", "id", 1).is_empty());
    }

    #[test]
    fn unique_columns_strip_table_prefix() {
        assert_eq!(
            unique_columns("UNIQUE constraint failed: attendance.employee_id, attendance.date"),
            vec!["employee_id".to_string(), "date".to_string()]
        );
        assert_eq!(
            unique_columns("UNIQUE constraint failed: employees.email"),
            vec!["email".to_string()]
        );
        assert!(unique_columns("garbage").is_empty());
    }

    #[test]
    fn non_database_errors_are_not_constraints() {
        assert_eq!(constraint_violation(&sqlx::Error::RowNotFound), None);
    }
}
