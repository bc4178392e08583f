use std::borrow::Cow;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A patch or an acknowledgement could not be built.
    Convention,
    /// Errors encountered while serializing or deserializing a payload.
    Serialization,
    /// The reported properties could not be delivered.
    Report,
    /// A handler has been registered twice for the same name.
    DuplicateHandler,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Convention => "Convention",
            Self::Serialization => "Serialization",
            Self::Report => "Report",
            Self::DuplicateHandler => "Duplicate Handler",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A device error.
#[derive(PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
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

    fn format(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.kind)?;
        write!(f, "Cause: {}", self.description)
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, e.to_string())
    }
}

impl From<twinhub::error::Error> for Error {
    fn from(e: twinhub::error::Error) -> Self {
        use twinhub::error::ErrorKind as CoreKind;

        let kind = match e.kind() {
            CoreKind::Serialization | CoreKind::Deserialization => ErrorKind::Serialization,
            _ => ErrorKind::Convention,
        };
        Self::new(kind, e.description().to_owned())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
