//! Row deserialization
//!
//! A record type declares its schema once by implementing [`FromRow`]:
//! the column count and an ordered sequence of [`Row::take`] calls, one
//! per field. Each field type is a codec implementing [`FromSql`], which
//! receives the raw column bytes (`None` for SQL NULL) and produces the
//! value. Foreign types (UUIDs, timestamps, ...) plug in by implementing
//! [`FromSql`]; the core never inspects them beyond invoking the trait.
//!
//! The select state machine validates the RowDescription column count
//! against [`FromRow::COLUMNS`] before any row is decoded, and a row
//! never yields more bytes to a codec than its declared column length.

mod from_sql;

pub use from_sql::{FixedChar, FromSql, MAX_TEXT_FIELD_LEN};

use crate::error::DecodeError;
use bytes::Bytes;

/// Sequential reader over one DataRow's columns
pub struct Row {
    cols: Vec<Option<Bytes>>,
    next: usize,
}

impl Row {
    pub(crate) fn new(cols: Vec<Option<Bytes>>) -> Self {
        Self { cols, next: 0 }
    }

    /// Number of columns in the row
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Decode the next column with the codec for `T`.
    ///
    /// Fails with [`DecodeError::IncompleteRead`] when the schema asks
    /// for more fields than the row carries.
    pub fn take<T: FromSql>(&mut self) -> Result<T, DecodeError> {
        let col = self
            .cols
            .get(self.next)
            .ok_or(DecodeError::IncompleteRead)?;
        self.next += 1;
        T::from_sql(col.as_deref())
    }
}

/// A record type deserializable from a DataRow.
///
/// Implemented once per record type; `COLUMNS` must equal the number of
/// [`Row::take`] calls in `from_row`.
pub trait FromRow: Sized {
    /// Expected column count, validated against the RowDescription
    const COLUMNS: usize;

    /// Decode one row, consuming its fields in schema order
    fn from_row(row: &mut Row) -> Result<Self, DecodeError>;
}

/// Unit record for statements that produce no rows
impl FromRow for () {
    const COLUMNS: usize = 0;

    fn from_row(_row: &mut Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! impl_from_row_tuple {
    ($count:expr; $($t:ident),+) => {
        impl<$($t: FromSql),+> FromRow for ($($t,)+) {
            const COLUMNS: usize = $count;

            fn from_row(row: &mut Row) -> Result<Self, DecodeError> {
                Ok(($(row.take::<$t>()?,)+))
            }
        }
    };
}

impl_from_row_tuple!(1; A);
impl_from_row_tuple!(2; A, B);
impl_from_row_tuple!(3; A, B, C);
impl_from_row_tuple!(4; A, B, C, D);
impl_from_row_tuple!(5; A, B, C, D, E);
impl_from_row_tuple!(6; A, B, C, D, E, F);
impl_from_row_tuple!(7; A, B, C, D, E, F, G);
impl_from_row_tuple!(8; A, B, C, D, E, F, G, H);
