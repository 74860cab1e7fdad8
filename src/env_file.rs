//! `.env` support.
//!
//! One `KEY=value` per line. Blank lines and `#` comments are skipped, a leading `export ` is
//! accepted, values may be single-quoted (literal) or double-quoted (`\n`, `\r`, `\t` escapes).
//! Variables already present in the process environment are never overwritten.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvFileError {
    NotFound(PathBuf),
    Io { path: PathBuf, message: String },
    Syntax { path: PathBuf, line: usize, message: String },
}

impl fmt::Display for EnvFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvFileError::NotFound(path) => write!(f, "env file not found: {}", path.display()),
            EnvFileError::Io { path, message } => write!(f, "failed to read {}: {}", path.display(), message),
            EnvFileError::Syntax { path, line, message } => {
                write!(f, "{}:{}: {}", path.display(), line, message)
            }
        }
    }
}

impl std::error::Error for EnvFileError {}

/// An env file picked for loading, and whether the user named it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFile {
    pub path: PathBuf,
    pub explicit: bool,
}

impl EnvFile {
    /// The explicit path, which must exist, or `./.env` when there is one.
    pub fn locate(explicit: Option<PathBuf>) -> Result<Option<EnvFile>, EnvFileError> {
        if let Some(path) = explicit {
            return if path.is_file() {
                Ok(Some(EnvFile { path, explicit: true }))
            } else {
                Err(EnvFileError::NotFound(path))
            };
        }

        let path = PathBuf::from(".env");
        Ok(path.is_file().then_some(EnvFile { path, explicit: false }))
    }

    /// Export every entry not already set. Returns the number of variables applied.
    pub fn apply(&self) -> Result<usize, EnvFileError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| EnvFileError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let entries = parse(&contents).map_err(|(line, message)| EnvFileError::Syntax {
            path: self.path.clone(),
            line,
            message,
        })?;

        let mut applied = 0;
        for (key, value) in entries {
            if std::env::var_os(&key).is_some() {
                continue;
            }
            // Mutating the process environment is unsafe once other threads may read it.
            unsafe {
                std::env::set_var(&key, value);
            }
            applied += 1;
        }
        Ok(applied)
    }
}

/// Parse a whole file. Errors carry the 1-based line number.
pub fn parse(contents: &str) -> Result<Vec<(String, String)>, (usize, String)> {
    let mut entries = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if let Some(entry) = parse_line(line).map_err(|e| (index + 1, e))? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn parse_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let Some((key, raw)) = line.split_once('=') else {
        return Err("expected KEY=value".to_string());
    };
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(format!("invalid variable name {:?}", key));
    }

    Ok(Some((key.to_string(), unquote(raw.trim())?)))
}

fn unquote(raw: &str) -> Result<String, String> {
    let quote = match raw.chars().next() {
        Some(q @ ('"' | '\'')) => q,
        Some('#') | None => return Ok(String::new()),
        Some(_) => {
            let value = raw.split_once(" #").map_or(raw, |(v, _)| v);
            return Ok(value.trim_end().to_string());
        }
    };

    let body = &raw[1..];
    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if quote == '"' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or_else(|| "dangling backslash".to_string())?;
                value.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
            }
            c if c == quote => {
                let rest = body[i + 1..].trim();
                return if rest.is_empty() || rest.starts_with('#') {
                    Ok(value)
                } else {
                    Err(format!("trailing text after closing {}", quote))
                };
            }
            c => value.push(c),
        }
    }
    Err(format!("missing closing {}", quote))
}
