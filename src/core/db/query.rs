/// Query Decoding Module
///
/// Turns live result cursors into values. Two paths are kept apart:
///
/// - the **typed path** binds a row positionally into a [`FromRow`] tuple
/// - the **string path** coerces every column to text through the [`Cursor`]
///   and [`RawRow`] capabilities, for schema-agnostic reads
///
/// Every function takes its cursor by value, so the underlying statement is
/// reset as soon as decoding finishes or fails.

use crate::core::{Result, SqlError};
use rusqlite::types::{FromSql, ValueRef};
use rusqlite::{Row, Rows};
use serde::Serialize;
use std::borrow::Cow;

/// A fully materialized, string-coerced result set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names in result-set order
    pub columns: Vec<String>,
    /// Rows of data as string values
    pub rows: Vec<Vec<String>>,
    /// Number of rows returned
    pub row_count: usize,
}

impl QueryResult {
    /// Creates a new QueryResult from column names and row data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
        }
    }
}

/// The first row of a result set, string-coerced.
///
/// `values` is empty when the query matched nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowResult {
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

impl RowResult {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A destination that one row can be scanned into.
///
/// Implemented for tuples of up to eight [`FromSql`] values; the tuple width
/// must equal the column count of the result.
pub trait FromRow: Sized {
    /// Number of columns this destination binds
    const WIDTH: usize;

    /// Reads the columns positionally
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

macro_rules! impl_from_row_tuple {
    ($width:expr; $($idx:tt => $t:ident),+) => {
        impl<$($t: FromSql),+> FromRow for ($($t,)+) {
            const WIDTH: usize = $width;

            fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
                Ok(($(row.get::<_, $t>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(1; 0 => A);
impl_from_row_tuple!(2; 0 => A, 1 => B);
impl_from_row_tuple!(3; 0 => A, 1 => B, 2 => C);
impl_from_row_tuple!(4; 0 => A, 1 => B, 2 => C, 3 => D);
impl_from_row_tuple!(5; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
impl_from_row_tuple!(6; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);
impl_from_row_tuple!(7; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F, 6 => G);
impl_from_row_tuple!(8; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F, 6 => G, 7 => H);

/// Binds one row into a typed destination.
///
/// # Errors
///
/// Returns `SqlError::Scan` if the column count differs from `T::WIDTH` or a
/// value cannot be converted to the destination type.
pub fn scan_into<T: FromRow>(row: &Row<'_>) -> Result<T> {
    let columns = row.as_ref().column_count();
    if columns != T::WIDTH {
        return Err(SqlError::Scan(format!(
            "expected {} destination(s), result has {} column(s)",
            T::WIDTH,
            columns
        )));
    }
    T::from_row(row).map_err(SqlError::from_driver)
}

/// Scans the first row of `rows` into `T`.
///
/// # Errors
///
/// Returns `SqlError::NoRows` when the cursor is empty.
pub fn scan_one<T: FromRow>(mut rows: Rows<'_>) -> Result<T> {
    match rows.next().map_err(SqlError::from_driver)? {
        Some(row) => scan_into(row),
        None => Err(SqlError::NoRows),
    }
}

/// Iterates the whole cursor, calling `callback` once per scanned row.
///
/// Stops at the first scan or driver error without invoking the callback for
/// that row. Returns the number of rows delivered.
pub fn scan_with_callback<T, F>(mut rows: Rows<'_>, mut callback: F) -> Result<usize>
where
    T: FromRow,
    F: FnMut(T),
{
    let mut delivered = 0;
    while let Some(row) = rows.next().map_err(SqlError::from_driver)? {
        callback(scan_into(row)?);
        delivered += 1;
    }
    Ok(delivered)
}

/// Raw byte access to the columns of one row
pub trait RawRow {
    /// Number of columns in the row
    fn width(&self) -> usize;

    /// The column's bytes, or `None` for SQL NULL
    fn raw(&self, idx: usize) -> Result<Option<Cow<'_, [u8]>>>;
}

/// A live result set that can be advanced row by row
pub trait Cursor {
    type Row: RawRow + ?Sized;

    /// Column names in result-set order
    fn column_names(&self) -> Vec<String>;

    /// Moves to the next row; `None` once the cursor is drained
    fn advance(&mut self) -> Result<Option<&Self::Row>>;
}

/// Textual bytes of a SQLite value
pub fn raw_value(value: ValueRef<'_>) -> Option<Cow<'_, [u8]>> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(Cow::Owned(i.to_string().into_bytes())),
        ValueRef::Real(f) => Some(Cow::Owned(f.to_string().into_bytes())),
        ValueRef::Text(t) => Some(Cow::Borrowed(t)),
        ValueRef::Blob(b) => Some(Cow::Borrowed(b)),
    }
}

/// Coerces raw column bytes to a string.
///
/// NULL becomes the empty string, so a NULL is indistinguishable from an
/// empty text value on this path.
pub fn coerce_text(raw: Option<&[u8]>) -> String {
    raw.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

fn read_text_row<R: RawRow + ?Sized>(row: &R) -> Result<Vec<String>> {
    (0..row.width())
        .map(|idx| Ok(coerce_text(row.raw(idx)?.as_deref())))
        .collect()
}

/// Materializes every row as strings, preserving row and column order
pub fn scan_all_as_strings<C: Cursor>(mut cursor: C) -> Result<QueryResult> {
    let columns = cursor.column_names();
    let mut rows = Vec::new();
    while let Some(row) = cursor.advance()? {
        rows.push(read_text_row(row)?);
    }
    Ok(QueryResult::new(columns, rows))
}

/// Reads only the first row as strings.
///
/// An empty cursor is not an error: the result carries the column names and
/// no values. Only a failing cursor read is reported.
pub fn scan_first_as_strings<C: Cursor>(mut cursor: C) -> Result<RowResult> {
    let columns = cursor.column_names();
    let values = match cursor.advance()? {
        Some(row) => read_text_row(row)?,
        None => Vec::new(),
    };
    Ok(RowResult { columns, values })
}

impl RawRow for Row<'_> {
    fn width(&self) -> usize {
        self.as_ref().column_count()
    }

    fn raw(&self, idx: usize) -> Result<Option<Cow<'_, [u8]>>> {
        let value = self.get_ref(idx).map_err(SqlError::from_driver)?;
        Ok(raw_value(value))
    }
}

/// [`Cursor`] over a rusqlite result set
pub struct SqliteCursor<'stmt> {
    columns: Vec<String>,
    rows: Rows<'stmt>,
}

impl<'stmt> SqliteCursor<'stmt> {
    /// Wraps `rows`, whose statement produced `columns`
    pub fn new(columns: Vec<String>, rows: Rows<'stmt>) -> Self {
        SqliteCursor { columns, rows }
    }
}

impl<'stmt> Cursor for SqliteCursor<'stmt> {
    type Row = Row<'stmt>;

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn advance(&mut self) -> Result<Option<&Row<'stmt>>> {
        self.rows.next().map_err(SqlError::from_driver)
    }
}
