//! Field codecs for the text result format

use crate::error::DecodeError;

/// Cap on owned text/byte fields (1 MiB). Longer columns fail with
/// [`DecodeError::StringTooLong`] instead of allocating unboundedly.
pub const MAX_TEXT_FIELD_LEN: usize = 1 << 20;

/// Codec turning one column's raw bytes into a field value.
///
/// `raw` is `None` for SQL NULL. Numeric codecs default NULL to zero;
/// every other codec rejects it unless wrapped in `Option<T>`.
pub trait FromSql: Sized {
    /// Decode the column
    fn from_sql(raw: Option<&[u8]>) -> Result<Self, DecodeError>;
}

fn invalid_number(raw: &[u8]) -> DecodeError {
    DecodeError::InvalidNumber(String::from_utf8_lossy(raw).into_owned())
}

macro_rules! impl_from_sql_number {
    ($($t:ty),+ $(,)?) => {
        $(
            impl FromSql for $t {
                fn from_sql(raw: Option<&[u8]>) -> Result<Self, DecodeError> {
                    match raw {
                        None => Ok(<$t>::default()),
                        Some(bytes) => std::str::from_utf8(bytes)
                            .ok()
                            .and_then(|s| s.parse::<$t>().ok())
                            .ok_or_else(|| invalid_number(bytes)),
                    }
                }
            }
        )+
    };
}

impl_from_sql_number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl FromSql for bool {
    fn from_sql(raw: Option<&[u8]>) -> Result<Self, DecodeError> {
        let bytes = raw.ok_or(DecodeError::UnexpectedNull)?;
        match bytes {
            b"t" | b"T" | b"1" | b"true" | b"TRUE" => Ok(true),
            b"f" | b"F" | b"0" | b"false" | b"FALSE" => Ok(false),
            other => Err(DecodeError::InvalidBoolean(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }
}

impl FromSql for String {
    fn from_sql(raw: Option<&[u8]>) -> Result<Self, DecodeError> {
        let bytes = raw.ok_or(DecodeError::UnexpectedNull)?;
        if bytes.len() > MAX_TEXT_FIELD_LEN {
            return Err(DecodeError::StringTooLong {
                len: bytes.len(),
                max: MAX_TEXT_FIELD_LEN,
            });
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(raw: Option<&[u8]>) -> Result<Self, DecodeError> {
        match raw {
            None => Ok(None),
            Some(bytes) => T::from_sql(Some(bytes)).map(Some),
        }
    }
}

/// CHAR(n) semantics: a fixed-length character field padded with spaces.
///
/// Shorter values are space-padded to `N`; longer values fail with
/// [`DecodeError::StringTooLong`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedChar<const N: usize>(pub [u8; N]);

impl<const N: usize> FixedChar<N> {
    /// The padded bytes
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// The value with trailing pad spaces removed
    pub fn trimmed(&self) -> &str {
        std::str::from_utf8(&self.0)
            .unwrap_or("")
            .trim_end_matches(' ')
    }
}

impl<const N: usize> FromSql for FixedChar<N> {
    fn from_sql(raw: Option<&[u8]>) -> Result<Self, DecodeError> {
        let bytes = raw.ok_or(DecodeError::UnexpectedNull)?;
        if bytes.len() > N {
            return Err(DecodeError::StringTooLong {
                len: bytes.len(),
                max: N,
            });
        }
        let mut out = [b' '; N];
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(FixedChar(out))
    }
}

impl<T: FromSql> FromSql for Vec<T> {
    fn from_sql(raw: Option<&[u8]>) -> Result<Self, DecodeError> {
        let bytes = raw.ok_or(DecodeError::UnexpectedNull)?;
        parse_array_elements(bytes)?
            .into_iter()
            .map(|el| T::from_sql(el.as_deref()))
            .collect()
    }
}

impl<T: FromSql, const N: usize> FromSql for [T; N] {
    fn from_sql(raw: Option<&[u8]>) -> Result<Self, DecodeError> {
        let bytes = raw.ok_or(DecodeError::UnexpectedNull)?;
        let elements = parse_array_elements(bytes)?;
        if elements.len() != N {
            return Err(DecodeError::ArrayLengthMismatch {
                expected: N,
                actual: elements.len(),
            });
        }
        let values: Vec<T> = elements
            .into_iter()
            .map(|el| T::from_sql(el.as_deref()))
            .collect::<Result<_, _>>()?;
        values
            .try_into()
            .map_err(|_| DecodeError::ArrayLengthMismatch {
                expected: N,
                actual: N,
            })
    }
}

/// Split a PostgreSQL array literal (`{a,"b c",NULL,{1,2}}`) into its
/// top-level elements. `None` marks the literal `NULL`; quoted elements
/// are unescaped; nested arrays are returned verbatim including braces.
fn parse_array_elements(raw: &[u8]) -> Result<Vec<Option<Vec<u8>>>, DecodeError> {
    if raw.len() < 2 || raw[0] != b'{' || raw[raw.len() - 1] != b'}' {
        return Err(DecodeError::InvalidArrayFormat(
            "missing enclosing braces".into(),
        ));
    }
    let inner = &raw[1..raw.len() - 1];

    let mut elements = Vec::new();
    if inner.is_empty() {
        return Ok(elements);
    }

    let mut i = 0;
    loop {
        if i >= inner.len() {
            return Err(DecodeError::InvalidArrayFormat(
                "dangling element separator".into(),
            ));
        }

        match inner[i] {
            b'"' => {
                // Quoted element; backslash escapes the next byte
                let mut value = Vec::new();
                i += 1;
                loop {
                    match inner.get(i) {
                        None => {
                            return Err(DecodeError::InvalidArrayFormat(
                                "unterminated quoted element".into(),
                            ))
                        }
                        Some(b'\\') => {
                            i += 1;
                            let escaped = inner.get(i).ok_or_else(|| {
                                DecodeError::InvalidArrayFormat(
                                    "dangling escape in quoted element".into(),
                                )
                            })?;
                            value.push(*escaped);
                            i += 1;
                        }
                        Some(b'"') => {
                            i += 1;
                            break;
                        }
                        Some(c) => {
                            value.push(*c);
                            i += 1;
                        }
                    }
                }
                elements.push(Some(value));
            }
            b'{' => {
                // Nested array; pass through balanced, quote-aware
                let start = i;
                let mut depth = 0usize;
                let mut in_quotes = false;
                loop {
                    let c = *inner.get(i).ok_or_else(|| {
                        DecodeError::InvalidArrayFormat("unterminated nested array".into())
                    })?;
                    if in_quotes {
                        if c == b'\\' {
                            i += 1;
                        } else if c == b'"' {
                            in_quotes = false;
                        }
                    } else {
                        match c {
                            b'"' => in_quotes = true,
                            b'{' => depth += 1,
                            b'}' => {
                                depth -= 1;
                                if depth == 0 {
                                    i += 1;
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    i += 1;
                }
                elements.push(Some(inner[start..i].to_vec()));
            }
            _ => {
                // Bare element up to the next separator
                let start = i;
                while i < inner.len() && inner[i] != b',' {
                    i += 1;
                }
                let bare = &inner[start..i];
                if bare == b"NULL" {
                    elements.push(None);
                } else {
                    elements.push(Some(bare.to_vec()));
                }
            }
        }

        if i == inner.len() {
            break;
        }
        if inner[i] != b',' {
            return Err(DecodeError::InvalidArrayFormat(
                "expected ',' between elements".into(),
            ));
        }
        i += 1;
    }

    Ok(elements)
}

/// Define an enum decoded from its PostgreSQL text label.
///
/// ```
/// pgcord::pg_enum! {
///     /// Order lifecycle state
///     pub enum OrderState {
///         Pending = "pending",
///         Shipped = "shipped",
///         Cancelled = "cancelled",
///     }
/// }
/// ```
///
/// Unknown labels fail with [`DecodeError::InvalidEnum`].
#[macro_export]
macro_rules! pg_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::FromSql for $name {
            fn from_sql(raw: Option<&[u8]>) -> Result<Self, $crate::DecodeError> {
                let bytes = raw.ok_or($crate::DecodeError::UnexpectedNull)?;
                $(
                    if bytes == $label.as_bytes() {
                        return Ok(Self::$variant);
                    }
                )+
                Err($crate::DecodeError::InvalidEnum(
                    String::from_utf8_lossy(bytes).into_owned(),
                ))
            }
        }
    };
}
