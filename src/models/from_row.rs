use rusqlite::{Row, Statement, ToSql};

/// Row mapping for types read straight out of a `SELECT`.
pub trait FromSqliteRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;

    /// Run a prepared query and map every row.
    fn query_all(stmt: &mut Statement<'_>, params: &[&dyn ToSql]) -> rusqlite::Result<Vec<Self>> {
        stmt.query_map(params, |row| Self::from_row(row))?
            .collect()
    }
}
