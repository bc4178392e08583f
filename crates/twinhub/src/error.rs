use alloc::borrow::Cow;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Errors encountered while serializing a value into a payload.
    Serialization,
    /// Errors encountered while deserializing a payload into a value.
    Deserialization,
    /// A patch or a document does not have the expected shape.
    InvalidPatch,
    /// A writable-property exchange was driven through a forbidden transition.
    InvalidTransition,
    /// An argument supplied by the caller is not valid.
    InvalidArgument,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Serialization => "Serialization",
            Self::Deserialization => "Deserialization",
            Self::InvalidPatch => "Invalid Patch",
            Self::InvalidTransition => "Invalid Transition",
            Self::InvalidArgument => "Invalid Argument",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.description().fmt(f)
    }
}

/// A property convention error.
#[derive(PartialEq, Eq, Clone)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.format(f)
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.format(f)
    }
}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[inline]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    fn format(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl core::error::Error for Error {}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::{Error, ErrorKind};

    #[test]
    fn convention_error() {
        let error = Error::new(ErrorKind::InvalidPatch, "Missing `$version`.");

        assert_eq!(error.to_string(), "Invalid Patch: Missing `$version`.");
        assert_eq!(error.kind(), ErrorKind::InvalidPatch);
    }
}
