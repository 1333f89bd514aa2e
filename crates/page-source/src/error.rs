// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Result that is a wrapper of `Result<T, iceberg_page_source::Error>`
pub type Result<T> = std::result::Result<T, Error>;

/// ErrorKind is all kinds of Error of iceberg page sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The operation was rejected because the system is not in a state required for the operation's execution.
    PreconditionFailed,

    /// Page source don't know what happened here, and no actions other than
    /// just returning it back.
    Unexpected,

    /// Iceberg data is invalid.
    ///
    /// This error is returned when a data or delete file can't be decoded:
    /// a truncated footer, a corrupt stripe, an unreadable Avro header, or a
    /// physical column that doesn't honor the encoding its field id promises.
    DataInvalid,

    /// A split could not be opened or read from storage.
    ///
    /// The error always carries the split's `path`, `start` and `length` in
    /// its context.
    CannotOpenSplit,

    /// Iceberg feature is not supported.
    ///
    /// This error is returned when given iceberg feature is not supported.
    FeatureUnsupported,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::DataInvalid => "DataInvalid",
            ErrorKind::CannotOpenSplit => "CannotOpenSplit",
            ErrorKind::FeatureUnsupported => "FeatureUnsupported",
            ErrorKind::PreconditionFailed => "PreconditionFailed",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all page source functions.
///
/// ## Display
///
/// Error can be displayed in two ways:
///
/// - Via `Display`: like `err.to_string()` or `format!("{err}")`
///
/// Error will be printed in a single line:
///
/// ```shell
/// Unexpected, context: { path: /path/to/file, called: send_async } => something wrong happened, source: networking error"
/// ```
///
/// - Via `Debug`: like `format!("{err:?}")`
///
/// Error will be printed in multi lines with more details and backtraces (if captured):
///
/// ```shell
/// Unexpected => something wrong happened
///
/// Context:
///    path: /path/to/file
///    called: send_async
///
/// Source: networking error
///
/// Backtrace:
///    0: iceberg_page_source::error::Error::new
///              at ./src/error.rs:88:24
///    ...
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,

    context: Vec<(&'static str, String)>,

    source: Option<anyhow::Error>,
    backtrace: Backtrace,

    retryable: bool,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            de.field("backtrace", &self.backtrace);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }
        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source: {source:#}")?;
        }

        if self.backtrace.status() == BacktraceStatus::Captured {
            writeln!(f)?;
            writeln!(f, "Backtrace:")?;
            writeln!(f, "{}", self.backtrace)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),

            source: None,
            // `Backtrace::capture()` will check if backtrace has been enabled
            // internally. It's zero cost if backtrace is disabled.
            backtrace: Backtrace::capture(),

            retryable: false,
        }
    }

    /// Set retryable of the error.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set source for error.
    ///
    /// # Notes
    ///
    /// If the source has been set, we will raise a panic here.
    pub fn with_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");

        self.source = Some(src.into());
        self
    }

    /// Error raised when a split can't be opened or read.
    ///
    /// The split coordinates are recorded as context so they show up in both
    /// `Display` and `Debug` output.
    pub fn cannot_open_split(path: &str, start: u64, length: u64) -> Self {
        Self::new(
            ErrorKind::CannotOpenSplit,
            format!("Error opening Iceberg split {path} (offset={start}, length={length})"),
        )
        .with_context("path", path)
        .with_context("start", start.to_string())
        .with_context("length", length.to_string())
    }

    /// Set the backtrace for error.
    ///
    /// This function is served as testing purpose and not intended to be called
    /// by users.
    #[cfg(test)]
    fn with_backtrace(mut self, backtrace: Backtrace) -> Self {
        self.backtrace = backtrace;
        self
    }

    /// Return error's backtrace.
    ///
    /// If you just want to print error with backtrace, use `Debug`, like `format!("{err:?}")`.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Return error's kind.
    ///
    /// Users can use this method to check error's kind and take actions.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's retryable status
    pub fn retryable(&self) -> bool {
        self.retryable
    }

    /// Return error's message.
    #[inline]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

macro_rules! define_from_err {
    ($source: path, $error_kind: path, $msg: expr) => {
        impl std::convert::From<$source> for crate::error::Error {
            fn from(v: $source) -> Self {
                Self::new($error_kind, $msg).with_source(v)
            }
        }
    };
}

define_from_err!(
    std::str::Utf8Error,
    ErrorKind::DataInvalid,
    "handling invalid utf-8 characters"
);

define_from_err!(
    core::num::ParseIntError,
    ErrorKind::DataInvalid,
    "parsing integer from string"
);

define_from_err!(
    core::num::ParseFloatError,
    ErrorKind::DataInvalid,
    "parsing float from string"
);

define_from_err!(
    core::str::ParseBoolError,
    ErrorKind::DataInvalid,
    "parsing boolean from string"
);

define_from_err!(
    std::array::TryFromSliceError,
    ErrorKind::DataInvalid,
    "failed to convert byte slice to array"
);

define_from_err!(
    std::num::TryFromIntError,
    ErrorKind::DataInvalid,
    "failed to convert integer"
);

define_from_err!(
    uuid::Error,
    ErrorKind::DataInvalid,
    "Failed to convert between uuid und iceberg value"
);

define_from_err!(
    base64::DecodeError,
    ErrorKind::DataInvalid,
    "Failed to decode base64 value"
);

define_from_err!(
    apache_avro::Error,
    ErrorKind::DataInvalid,
    "Failure in reading an Avro file"
);

define_from_err!(
    orc_rust::error::OrcError,
    ErrorKind::DataInvalid,
    "Failed to read an ORC file"
);

define_from_err!(
    serde_json::Error,
    ErrorKind::DataInvalid,
    "Failed to parse json string"
);

define_from_err!(
    rust_decimal::Error,
    ErrorKind::DataInvalid,
    "Failed to convert decimal literal to rust decimal"
);

define_from_err!(
    parquet::errors::ParquetError,
    ErrorKind::DataInvalid,
    "Failed to read a Parquet file"
);

define_from_err!(
    arrow_schema::ArrowError,
    ErrorKind::Unexpected,
    "Arrow Schema Error"
);

define_from_err!(std::io::Error, ErrorKind::Unexpected, "IO Operation failed");

/// Returns a `DataInvalid` error from the enclosing function unless `$cond` holds.
///
/// ```ignore
/// ensure_data_valid!(bytes.len() == 16, "uuid value has {} bytes", bytes.len());
/// ```
#[macro_export]
macro_rules! ensure_data_valid {
    ($cond: expr, $fmt: literal, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::new($crate::error::ErrorKind::DataInvalid, format!($fmt, $($arg)*)))
        }
    };
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;

    use super::*;

    fn generate_error() -> Error {
        Error::new(ErrorKind::DataInvalid, "footer is truncated")
            .with_context("path", "/warehouse/t/data/00000.orc")
            .with_source(anyhow!("unexpected end of file"))
            .with_backtrace(Backtrace::disabled())
    }

    #[test]
    fn test_error_display_without_backtrace() {
        let s = format!("{}", generate_error());
        assert_eq!(
            s,
            r#"DataInvalid, context: { path: /warehouse/t/data/00000.orc } => footer is truncated, source: unexpected end of file"#
        )
    }

    #[test]
    fn test_error_debug_without_backtrace() {
        let s = format!("{:?}", generate_error());
        assert_eq!(
            s,
            r#"DataInvalid => footer is truncated

Context:
   path: /warehouse/t/data/00000.orc

Source: unexpected end of file
"#
        )
    }

    #[test]
    fn test_cannot_open_split_carries_coordinates() {
        let err = Error::cannot_open_split("s3://bucket/a.parquet", 4, 128)
            .with_backtrace(Backtrace::disabled());

        assert_eq!(err.kind(), ErrorKind::CannotOpenSplit);
        assert!(!err.retryable());
        assert_eq!(
            err.to_string(),
            "CannotOpenSplit, context: { path: s3://bucket/a.parquet, start: 4, length: 128 } => Error opening Iceberg split s3://bucket/a.parquet (offset=4, length=128)"
        );
    }

    #[test]
    fn test_third_party_errors_are_bad_data() {
        let err: Error = "not-a-number".parse::<i64>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);

        let err: Error = parquet::errors::ParquetError::EOF("footer".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }
}
