use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ItemNotFound,
    DuplicateItem,
    PositionOutOfRange,
    BlankName,
    InvalidEnumValue,
    InvalidCommand,
    QueryFailed,
    SaveFailed,
    DeleteFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::ItemNotFound => "E2001",
            Self::DuplicateItem => "E2002",
            Self::PositionOutOfRange => "E2003",
            Self::BlankName => "E2004",
            Self::InvalidEnumValue => "E2005",
            Self::InvalidCommand => "E2006",
            Self::QueryFailed => "E5001",
            Self::SaveFailed => "E5002",
            Self::DeleteFailed => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ItemNotFound => "Item not found",
            Self::DuplicateItem => "Item already in the list",
            Self::PositionOutOfRange => "Position out of range",
            Self::BlankName => "Item name is blank",
            Self::InvalidEnumValue => "Invalid priority/sort/direction value",
            Self::InvalidCommand => "Unrecognized script command",
            Self::QueryFailed => "Store query failed",
            Self::SaveFailed => "Store save failed",
            Self::DeleteFailed => "Store delete failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .chores/config.toml and retry."),
            Self::ItemNotFound | Self::QueryFailed | Self::SaveFailed | Self::DeleteFailed => None,
            Self::DuplicateItem => Some("Use `edit` to change an item that is already listed."),
            Self::PositionOutOfRange => Some("Run `list` to see the current positions."),
            Self::BlankName => Some("Give the item a non-empty name."),
            Self::InvalidEnumValue => Some(
                "Use low/normal/high, created/priority/name and asc/desc.",
            ),
            Self::InvalidCommand => Some("Run `ch run --help` for the command list."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure reported by a store collaborator.
///
/// The reason is opaque at this layer; it is logged and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("save failed: {0}")]
    SaveFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::QueryFailed(_) => ErrorCode::QueryFailed,
            Self::SaveFailed(_) => ErrorCode::SaveFailed,
            Self::DeleteFailed(_) => ErrorCode::DeleteFailed,
        }
    }
}

/// Caller error against the local list state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    #[error("item {id} is already in the list")]
    Duplicate { id: String },
    #[error("position {position} is out of range for {len} items")]
    OutOfRange { position: usize, len: usize },
    #[error("no item with id {id}")]
    NotFound { id: String },
    #[error("item name must not be blank")]
    BlankName,
}

impl ListError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Duplicate { .. } => ErrorCode::DuplicateItem,
            Self::OutOfRange { .. } => ErrorCode::PositionOutOfRange,
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::BlankName => ErrorCode::BlankName,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, ListError, StoreError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::ItemNotFound,
            ErrorCode::DuplicateItem,
            ErrorCode::PositionOutOfRange,
            ErrorCode::BlankName,
            ErrorCode::InvalidEnumValue,
            ErrorCode::InvalidCommand,
            ErrorCode::QueryFailed,
            ErrorCode::SaveFailed,
            ErrorCode::DeleteFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::PositionOutOfRange.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn errors_map_to_codes() {
        assert_eq!(
            StoreError::SaveFailed("offline".into()).code(),
            ErrorCode::SaveFailed
        );
        assert_eq!(
            ListError::OutOfRange { position: 3, len: 1 }.code(),
            ErrorCode::PositionOutOfRange
        );
        assert_eq!(
            ListError::OutOfRange { position: 3, len: 1 }.to_string(),
            "position 3 is out of range for 1 items"
        );
    }
}
