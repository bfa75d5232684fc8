//! configuration errors
//!
//! Parsing never stops at the first problem. Every phase returns the complete list of [Error]s it found (see
//! [Errors]) and callers concatenate them, so a user can fix many mistakes in one go.
use crate::info::SourceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    /// the grammar layer rejected a file
    Syntax,
    /// unrecognized blocks or attributes, label arity, missing or conflicting attributes
    Schema,
    /// an attribute or block was declared more than once
    MergeConflict,
    /// missing source, cycles, self imports, imports escaping the root, duplicated imports
    Import,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Syntax => f.write_str("HCL syntax error"),
            ErrorKind::Schema => f.write_str("terramate schema error"),
            ErrorKind::MergeConflict => f.write_str("merge conflict"),
            ErrorKind::Import => f.write_str("import error"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{kind}: {message}", location_prefix(.range))]
pub struct Error {
    pub kind: ErrorKind,
    pub range: Option<SourceRange>,
    pub message: String,
    #[source]
    pub cause: Option<Box<Error>>,
}

fn location_prefix(range: &Option<SourceRange>) -> String {
    range
        .as_ref()
        .map(|range| format!("{range}: "))
        .unwrap_or_default()
}

impl Error {
    pub fn new(kind: ErrorKind, range: impl Into<Option<SourceRange>>, message: impl Into<String>) -> Self {
        Self {
            kind,
            range: range.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn syntax(range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, range, message)
    }

    pub fn schema(range: impl Into<Option<SourceRange>>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, range, message)
    }

    pub fn conflict(range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MergeConflict, range, message)
    }

    pub fn import(range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, range, message)
    }

    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Ordered list of collected errors
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Errors {
    errors: Vec<Error>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, error: Error) {
        tracing::trace!(%error, "issue found");
        self.errors.push(error);
    }

    pub fn push(&mut self, error: Error) {
        self.log(error)
    }

    pub fn append(&mut self, mut other: Errors) {
        self.errors.append(&mut other.errors);
    }

    /// Keeps the errors of a failed result, returns the value of a successful one
    pub fn collect<T>(&mut self, result: Result<T, Errors>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(errors) => {
                self.append(errors);
                None
            }
        }
    }

    /// Same as [Errors::collect] for results carrying a single error
    pub fn collect_one<T>(&mut self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.log(error);
                None
            }
        }
    }

    pub fn into_result(self) -> Result<(), Errors> {
        self.into_result_with(())
    }

    pub fn into_result_with<T>(self, value: T) -> Result<T, Errors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(|error| error.kind).collect()
    }

    pub fn ranges(&self) -> Vec<Option<&SourceRange>> {
        self.errors.iter().map(|error| error.range.as_ref()).collect()
    }

    pub fn first(&self) -> Option<&Error> {
        self.errors.first()
    }

    pub fn map_each(self, f: impl FnMut(Error) -> Error) -> Errors {
        Self {
            errors: self.errors.into_iter().map(f).collect(),
        }
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Self { errors: vec![error] }
    }
}

impl Extend<Error> for Errors {
    fn extend<T: IntoIterator<Item = Error>>(&mut self, iter: T) {
        for error in iter {
            self.log(error);
        }
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl std::error::Error for Errors {}

impl std::fmt::Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;

            let mut cause = error.cause.as_deref();
            while let Some(inner) = cause {
                write!(f, "\n  caused by: {inner}")?;
                cause = inner.cause.as_deref();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::info::Pos;
    use pretty_assertions::assert_eq;

    fn range() -> SourceRange {
        SourceRange::new("/stack/cfg.tm", Pos::new(1, 1, 0), Pos::new(1, 6, 5))
    }

    #[test]
    fn display_with_and_without_range() {
        let error = Error::schema(range(), r#"unrecognized block "stak""#);
        insta::assert_snapshot!(error, @r###"/stack/cfg.tm:1,1-1,6: terramate schema error: unrecognized block "stak""###);

        let error = Error::schema(None, "missing source");
        insta::assert_snapshot!(error, @"terramate schema error: missing source");
    }

    #[test]
    fn display_list_with_causes() {
        let mut errors = Errors::new();
        errors.log(
            Error::import(range(), "conflicting import").with_cause(Error::conflict(range(), "attribute \"a\" redeclared")),
        );
        errors.log(Error::syntax(range(), "expected `=`"));

        insta::assert_snapshot!(errors, @r###"
        /stack/cfg.tm:1,1-1,6: import error: conflicting import
          caused by: /stack/cfg.tm:1,1-1,6: merge conflict: attribute "a" redeclared
        /stack/cfg.tm:1,1-1,6: HCL syntax error: expected `=`
        "###);
    }

    #[test]
    fn collect_keeps_going() {
        let mut errors = Errors::new();
        let ok: Result<u8, Errors> = Ok(1);
        let failed: Result<u8, Errors> = Err(Error::schema(None, "one").into());

        assert_eq!(errors.collect(ok), Some(1));
        assert_eq!(errors.collect(failed), None);
        assert_eq!(errors.collect_one::<u8>(Err(Error::schema(None, "two"))), None);
        assert_eq!(errors.kinds(), vec![ErrorKind::Schema, ErrorKind::Schema]);
        assert!(errors.into_result().is_err());
    }
}
