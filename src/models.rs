use crate::config::{IDENTIFIER_COLUMN, LIST_SEPARATOR};
use anyhow::{bail, Result};
use rustc_hash::FxHashMap;

/// One person read from an input row, with every optional field defaulted to "".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    /// Index of the source row in the input table
    pub line: usize,
    pub identifier: String,
    pub name: String,
    pub login: String,
    pub email: String,
    pub mobile_phone: String,
    pub position: String,
    pub operational_authorities: String,
    pub electrical_safety_level: String,
    pub roles: String,
    pub groups: String,
    pub parent_energy: String,
    pub parent_access: String,
}

impl PersonRecord {
    pub fn role_refs(&self) -> Vec<&str> {
        split_list(&self.roles)
    }

    pub fn group_refs(&self) -> Vec<&str> {
        split_list(&self.groups)
    }

    pub fn authority_refs(&self) -> Vec<&str> {
        split_list(&self.operational_authorities)
    }

    pub fn name_parts(&self) -> NameParts<'_> {
        NameParts::split(&self.name)
    }
}

/// Entry of the unresolved-logins audit: the directory could not confirm this person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEntry {
    pub login: String,
    pub name: String,
    pub identifier: String,
}

/// Splits a `!`-separated list, trimming items and dropping empty ones.
pub fn split_list(value: &str) -> Vec<&str> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Display name split into last / first / middle name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NameParts<'a> {
    pub last: &'a str,
    pub first: &'a str,
    pub middle: &'a str,
}

impl<'a> NameParts<'a> {
    /// First token is the last name, then first, then middle; extra tokens are ignored.
    pub fn split(name: &'a str) -> Self {
        let mut tokens = name.split_whitespace();
        Self {
            last: tokens.next().unwrap_or(""),
            first: tokens.next().unwrap_or(""),
            middle: tokens.next().unwrap_or(""),
        }
    }

    /// Short form "Last F.M.", or just "Last" when there is no first name.
    pub fn abbreviation(&self) -> String {
        let mut abbr = self.last.to_string();
        if let Some(f) = self.first.chars().next() {
            abbr.push(' ');
            abbr.push(f);
            abbr.push('.');
            if let Some(m) = self.middle.chars().next() {
                abbr.push(m);
                abbr.push('.');
            }
        }
        abbr
    }
}

/// Column positions of the recognized fields, resolved once per file from the header row.
#[derive(Debug, Clone)]
pub struct FieldMap {
    name: usize,
    identifier: Option<usize>,
    login: Option<usize>,
    email: Option<usize>,
    mobile_phone: Option<usize>,
    position: Option<usize>,
    operational_authorities: Option<usize>,
    electrical_safety_level: Option<usize>,
    roles: Option<usize>,
    groups: Option<usize>,
    parent_energy: Option<usize>,
    parent_access: Option<usize>,
}

impl FieldMap {
    pub fn from_headers(headers: &[String]) -> Result<Self> {
        let index: FxHashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .rev() // first occurrence wins on duplicate headers
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        let col = |key: &str| index.get(key).copied();

        let name = match col("name") {
            Some(i) => i,
            None => match headers.iter().position(|h| h.ends_with("name")) {
                Some(i) => i,
                None => bail!("No name column in header: {:?}", headers),
            },
        };

        Ok(Self {
            name,
            identifier: col(IDENTIFIER_COLUMN),
            login: col("login"),
            email: col("email"),
            mobile_phone: col("mobilePhone"),
            position: col("position"),
            operational_authorities: col("OperationalAuthorities"),
            electrical_safety_level: col("electrical_safety_level"),
            roles: col("roles"),
            groups: col("groups"),
            parent_energy: col("parent_energy"),
            parent_access: col("parent_access").or_else(|| col("parent_sysconfig")),
        })
    }

    pub fn identifier_column(&self) -> Option<usize> {
        self.identifier
    }

    /// Maps one row; `None` when the display name is blank.
    pub fn record(&self, line: usize, row: &[String]) -> Option<PersonRecord> {
        let get = |col: Option<usize>| -> String {
            col.and_then(|i| row.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let name = get(Some(self.name));
        if name.is_empty() {
            return None;
        }

        Some(PersonRecord {
            line,
            identifier: get(self.identifier),
            name,
            login: get(self.login),
            email: get(self.email),
            mobile_phone: get(self.mobile_phone),
            position: get(self.position),
            operational_authorities: get(self.operational_authorities),
            electrical_safety_level: get(self.electrical_safety_level),
            roles: get(self.roles),
            groups: get(self.groups),
            parent_energy: get(self.parent_energy),
            parent_access: get(self.parent_access),
        })
    }
}
