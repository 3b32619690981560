//! Line-oriented command scripts for `ch run`.
//!
//! One command per line. Blank lines and lines starting with `#` are
//! skipped. Arguments are separated by whitespace; double quotes group words
//! and `\"` / `\\` escape inside them.
//!
//! ```text
//! add "Buy milk" high
//! check 0
//! sort priority desc
//! ```

use chores_core::ErrorCode;
use chores_core::model::{Direction, Priority, SortKey};
use chores_core::store::StoreOp;
use std::fmt;
use std::str::FromStr;

/// A row reference: a display position or an item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Position(usize),
    Id(String),
}

impl Target {
    fn parse(raw: &str) -> Self {
        raw.parse::<usize>()
            .map_or_else(|_| Self::Id(raw.to_string()), Self::Position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        name: String,
        priority: Priority,
    },
    Edit {
        target: Target,
        name: String,
        priority: Option<Priority>,
    },
    Check(Target),
    Uncheck(Target),
    /// Click the row's checkbox.
    Toggle(Target),
    /// Click the row's label.
    Open(Target),
    Delete(Target),
    Undo,
    ShowCompleted,
    HideCompleted,
    Sort {
        key: SortKey,
        direction: Direction,
    },
    Reload,
    List,
    /// Make the next store call of this kind fail.
    Fail(StoreOp),
    Latency(u64),
}

impl Command {
    /// Whether the command can change what the list displays.
    pub const fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::List | Self::Open(_) | Self::Fail(_) | Self::Latency(_)
        )
    }
}

/// A parsed command and the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub code: ErrorCode,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a whole script. Nothing runs unless every line parses.
pub fn parse(text: &str) -> Result<Vec<Line>, ParseError> {
    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let number = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fail = |code, message: String| ParseError {
            line: number,
            code,
            message,
        };
        let words =
            tokenize(trimmed).map_err(|msg| fail(ErrorCode::InvalidCommand, msg.into()))?;
        let command = parse_command(&words).map_err(|(code, msg)| fail(code, msg))?;
        lines.push(Line { number, command });
    }
    Ok(lines)
}

fn tokenize(line: &str) -> Result<Vec<String>, &'static str> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => current.push(escaped),
                            None => return Err("unterminated escape"),
                        },
                        Some(other) => current.push(other),
                        None => return Err("unterminated quote"),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

type CommandResult = Result<Command, (ErrorCode, String)>;

fn parse_command(words: &[String]) -> CommandResult {
    let (verb, args) = words
        .split_first()
        .ok_or((ErrorCode::InvalidCommand, "empty command".to_string()))?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match (verb.as_str(), args.as_slice()) {
        ("add", [name]) => Ok(Command::Add {
            name: (*name).to_string(),
            priority: Priority::default(),
        }),
        ("add", [name, priority]) => Ok(Command::Add {
            name: (*name).to_string(),
            priority: parse_enum(priority)?,
        }),
        ("edit", [target, name]) => Ok(Command::Edit {
            target: Target::parse(target),
            name: (*name).to_string(),
            priority: None,
        }),
        ("edit", [target, name, priority]) => Ok(Command::Edit {
            target: Target::parse(target),
            name: (*name).to_string(),
            priority: Some(parse_enum(priority)?),
        }),
        ("check", [target]) => Ok(Command::Check(Target::parse(target))),
        ("uncheck", [target]) => Ok(Command::Uncheck(Target::parse(target))),
        ("toggle", [target]) => Ok(Command::Toggle(Target::parse(target))),
        ("open", [target]) => Ok(Command::Open(Target::parse(target))),
        ("delete", [target]) => Ok(Command::Delete(Target::parse(target))),
        ("undo", []) => Ok(Command::Undo),
        ("show-completed", []) => Ok(Command::ShowCompleted),
        ("hide-completed", []) => Ok(Command::HideCompleted),
        ("sort", [key]) => Ok(Command::Sort {
            key: parse_enum(key)?,
            direction: Direction::default(),
        }),
        ("sort", [key, direction]) => Ok(Command::Sort {
            key: parse_enum(key)?,
            direction: parse_enum(direction)?,
        }),
        ("reload", []) => Ok(Command::Reload),
        ("list", []) => Ok(Command::List),
        ("fail", [op]) => parse_store_op(op).map(Command::Fail),
        ("latency", [ms]) => ms.parse::<u64>().map(Command::Latency).map_err(|_| {
            (
                ErrorCode::InvalidCommand,
                format!("latency expects milliseconds, got '{ms}'"),
            )
        }),
        (
            "add" | "edit" | "check" | "uncheck" | "toggle" | "open" | "delete" | "undo"
            | "show-completed" | "hide-completed" | "sort" | "reload" | "list" | "fail"
            | "latency",
            _,
        ) => Err((
            ErrorCode::InvalidCommand,
            format!("wrong number of arguments for '{verb}'"),
        )),
        _ => Err((
            ErrorCode::InvalidCommand,
            format!("unknown command '{verb}'"),
        )),
    }
}

fn parse_enum<T>(raw: &str) -> Result<T, (ErrorCode, String)>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|err| (ErrorCode::InvalidEnumValue, err.to_string()))
}

fn parse_store_op(raw: &str) -> Result<StoreOp, (ErrorCode, String)> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "query" => Ok(StoreOp::Query),
        "create" => Ok(StoreOp::Create),
        "update" => Ok(StoreOp::Update),
        "delete" => Ok(StoreOp::Delete),
        _ => Err((
            ErrorCode::InvalidEnumValue,
            format!("invalid store operation: '{raw}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(line: &str) -> Command {
        let mut lines = parse(line).unwrap();
        assert_eq!(lines.len(), 1);
        lines.remove(0).command
    }

    #[test]
    fn quoted_names_keep_spaces_and_escapes() {
        assert_eq!(
            one(r#"add "Call \"Mom\" back" high"#),
            Command::Add {
                name: "Call \"Mom\" back".into(),
                priority: Priority::High,
            }
        );
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let lines = parse("# setup\n\nadd milk\n  # indented comment\nlist\n").unwrap();
        assert_eq!(
            lines.iter().map(|l| l.number).collect::<Vec<_>>(),
            vec![3, 5]
        );
    }

    #[test]
    fn targets_are_positions_or_ids() {
        assert_eq!(one("check 2"), Command::Check(Target::Position(2)));
        assert_eq!(
            one("delete td-0a1b2c3d4e"),
            Command::Delete(Target::Id("td-0a1b2c3d4e".into()))
        );
    }

    #[test]
    fn sort_direction_defaults_to_ascending() {
        assert_eq!(
            one("sort name"),
            Command::Sort {
                key: SortKey::Name,
                direction: Direction::Ascending,
            }
        );
        assert_eq!(
            one("sort priority desc"),
            Command::Sort {
                key: SortKey::Priority,
                direction: Direction::Descending,
            }
        );
    }

    #[test]
    fn bad_enum_value_reports_line_and_code() {
        let err = parse("add ok\nadd x urgent\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.code, ErrorCode::InvalidEnumValue);
        assert_eq!(err.to_string(), "line 2: invalid priority: 'urgent'");
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let err = parse("add \"open ended").unwrap_err();
        assert_eq!(err.message, "unterminated quote");
    }

    #[test]
    fn arity_and_unknown_verbs_are_rejected() {
        assert!(
            parse("undo now")
                .unwrap_err()
                .message
                .contains("wrong number of arguments")
        );
        assert!(parse("frobnicate").unwrap_err().message.contains("unknown command"));
    }

    #[test]
    fn fail_accepts_store_operations() {
        assert_eq!(one("fail update"), Command::Fail(StoreOp::Update));
        assert_eq!(
            parse("fail observe").unwrap_err().code,
            ErrorCode::InvalidEnumValue
        );
    }

    #[test]
    fn read_only_commands_are_not_mutating() {
        assert!(!Command::List.is_mutating());
        assert!(!Command::Open(Target::Position(0)).is_mutating());
        assert!(Command::Undo.is_mutating());
    }

    #[test]
    fn empty_quoted_string_is_a_word() {
        assert_eq!(
            one(r#"add """#),
            Command::Add {
                name: String::new(),
                priority: Priority::Low,
            }
        );
    }
}
