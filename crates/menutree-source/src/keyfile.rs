//! Key-file reader shared by launcher and directory records.
//!
//! Format: `[Group]` headers followed by `Key=Value` lines. Blank lines and
//! lines starting with `#` are ignored. Localized keys (`Name[de]`) are kept
//! verbatim; choosing a locale is left to whoever resolved the strings.

use std::path::Path;

use crate::error::{SourceError, SourceResult};

/// A parsed key file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFile {
    groups: Vec<Group>,
}

/// One `[Group]` section of a key file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    name: String,
    entries: Vec<(String, String)>,
}

impl KeyFile {
    /// Load and parse a key file from disk
    pub fn load(path: &Path) -> SourceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
        Self::parse(&content)
    }

    /// Parse key-file text
    pub fn parse(content: &str) -> SourceResult<Self> {
        let mut groups: Vec<Group> = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header.strip_suffix(']').ok_or_else(|| SourceError::Malformed {
                    line: line_no,
                    reason: "unterminated group header".to_string(),
                })?;
                if name.is_empty() || name.contains(['[', ']']) {
                    return Err(SourceError::Malformed {
                        line: line_no,
                        reason: format!("invalid group name '{}'", name),
                    });
                }
                if groups.iter().any(|g| g.name == name) {
                    return Err(SourceError::Malformed {
                        line: line_no,
                        reason: format!("duplicate group [{}]", name),
                    });
                }
                groups.push(Group {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| SourceError::Malformed {
                line: line_no,
                reason: "expected 'Key=Value'".to_string(),
            })?;
            let key = key.trim_end();
            if key.is_empty() {
                return Err(SourceError::Malformed {
                    line: line_no,
                    reason: "empty key".to_string(),
                });
            }

            let group = groups.last_mut().ok_or_else(|| SourceError::Malformed {
                line: line_no,
                reason: "key outside of any group".to_string(),
            })?;

            let value = unescape(value.trim_start());
            // Later duplicates replace earlier ones
            match group.entries.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value,
                None => group.entries.push((key.to_string(), value)),
            }
        }

        Ok(Self { groups })
    }

    /// Look up a group by name
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// All groups in file order
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

impl Group {
    /// Group name without brackets
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw string value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Non-empty string value of a key, owned
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).map(str::to_string)
    }

    /// Boolean value; anything other than `true`/`1` reads as false
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some("true") | Some("1"))
    }

    /// Semicolon-separated list value
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(value) => value
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            // Leave unknown escapes (e.g. `\;` inside lists) untouched
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}
