//! Hierarchical settings tree
//!
//! A small typed node tree in the style of libconfig: named scalars, scalar
//! arrays, lists of groups and groups. Paths are dot separated and address
//! list elements with `[N]`, e.g. `sites.[0].buildings.[1].name`.
//!
//! Parsing and writing of concrete documents is delegated to `toml` and
//! `serde_json`; this module only converts between their value types and the
//! tree.

use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Setting Node
// ─────────────────────────────────────────────────────────────────────────────

/// A node of the settings tree
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    /// Ordered scalars
    Array(Vec<Setting>),
    /// Ordered aggregates, usually groups
    List(Vec<Setting>),
    Group(Group),
}

/// Ordered set of named settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    entries: Vec<(String, Setting)>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Setting> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Setting> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace a named setting, keeping the position of a replaced entry
    pub fn insert(&mut self, name: impl Into<String>, setting: Setting) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = setting,
            None => self.entries.push((name, setting)),
        }
    }

    /// Get the named list, creating an empty one if absent
    pub fn list_mut(&mut self, name: &str) -> Result<&mut Vec<Setting>, SettingError> {
        if !self.contains(name) {
            self.entries.push((name.to_string(), Setting::List(Vec::new())));
        }
        match self.get_mut(name) {
            Some(Setting::List(items)) | Some(Setting::Array(items)) => Ok(items),
            Some(other) => Err(SettingError::WrongKind {
                path: name.to_string(),
                expected: "list",
                actual: other.kind_name(),
            }),
            None => Err(SettingError::NotFound(name.to_string())),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Setting)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Paths
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Name(&'a str),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment<'_>>, SettingError> {
    path.split('.')
        .map(|seg| {
            if seg.is_empty() {
                return Err(SettingError::BadPath(path.to_string()));
            }
            match seg.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                Some(index) => index
                    .parse()
                    .map(Segment::Index)
                    .map_err(|_| SettingError::BadPath(path.to_string())),
                None => Ok(Segment::Name(seg)),
            }
        })
        .collect()
}

/// Join a parent path and a child segment
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree Access
// ─────────────────────────────────────────────────────────────────────────────

impl Setting {
    /// Node type name as printed by tree outlines
    pub fn kind_name(&self) -> &'static str {
        match self {
            Setting::Int(_) => "int",
            Setting::Float(_) => "float",
            Setting::Bool(_) => "bool",
            Setting::String(_) => "string",
            Setting::Array(_) => "array",
            Setting::List(_) => "list",
            Setting::Group(_) => "group",
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Setting::Array(_) | Setting::List(_) | Setting::Group(_))
    }

    /// Number of direct children (0 for scalars)
    pub fn len(&self) -> usize {
        match self {
            Setting::Array(items) | Setting::List(items) => items.len(),
            Setting::Group(group) => group.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Setting::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Setting::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Setting::String(s) => Some(s),
            _ => None,
        }
    }

    /// Direct children with their names (list and array elements are unnamed)
    pub fn children(&self) -> Vec<(Option<&str>, &Setting)> {
        match self {
            Setting::Array(items) | Setting::List(items) => {
                items.iter().map(|s| (None, s)).collect()
            }
            Setting::Group(group) => group.entries().map(|(n, s)| (Some(n), s)).collect(),
            _ => Vec::new(),
        }
    }

    /// Resolve a path relative to this node
    pub fn lookup(&self, path: &str) -> Option<&Setting> {
        let segments = parse_path(path).ok()?;
        let mut node = self;
        for segment in segments {
            node = match (segment, node) {
                (Segment::Name(name), Setting::Group(group)) => group.get(name)?,
                (Segment::Index(i), Setting::List(items) | Setting::Array(items)) => {
                    items.get(i)?
                }
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Assign a setting at `path`, creating intermediate groups and list slots
    pub fn set_path(&mut self, path: &str, value: Setting) -> Result<(), SettingError> {
        let segments = parse_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(SettingError::BadPath(path.to_string()));
        };

        let mut node = self;
        for (pos, segment) in parents.iter().enumerate() {
            let next_is_index = matches!(segments.get(pos + 1), Some(Segment::Index(_)));
            node = descend(node, *segment, next_is_index, path)?;
        }

        match (last, node) {
            (Segment::Name(name), Setting::Group(group)) => {
                group.insert(*name, value);
                Ok(())
            }
            (Segment::Index(i), Setting::List(items) | Setting::Array(items)) => {
                while items.len() <= *i {
                    items.push(Setting::Group(Group::new()));
                }
                items[*i] = value;
                Ok(())
            }
            (_, other) => Err(SettingError::WrongKind {
                path: path.to_string(),
                expected: "aggregate",
                actual: other.kind_name(),
            }),
        }
    }
}

fn descend<'a>(
    node: &'a mut Setting,
    segment: Segment<'_>,
    next_is_index: bool,
    path: &str,
) -> Result<&'a mut Setting, SettingError> {
    match (segment, node) {
        (Segment::Name(name), Setting::Group(group)) => {
            if !group.contains(name) {
                let fresh = if next_is_index {
                    Setting::List(Vec::new())
                } else {
                    Setting::Group(Group::new())
                };
                group.insert(name, fresh);
            }
            group
                .get_mut(name)
                .ok_or_else(|| SettingError::NotFound(path.to_string()))
        }
        (Segment::Index(i), Setting::List(items) | Setting::Array(items)) => {
            while items.len() <= i {
                items.push(Setting::Group(Group::new()));
            }
            Ok(&mut items[i])
        }
        (_, other) => Err(SettingError::WrongKind {
            path: path.to_string(),
            expected: "aggregate",
            actual: other.kind_name(),
        }),
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Int(i) => write!(f, "{i}"),
            Setting::Float(x) => write!(f, "{x}"),
            Setting::Bool(b) => write!(f, "{b}"),
            Setting::String(s) => write!(f, "{s:?}"),
            other => write!(f, "<{} of {}>", other.kind_name(), other.len()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TOML Interop
// ─────────────────────────────────────────────────────────────────────────────

impl From<toml::Value> for Setting {
    fn from(v: toml::Value) -> Self {
        match v {
            toml::Value::Integer(i) => Setting::Int(i),
            toml::Value::Float(f) => Setting::Float(f),
            toml::Value::Boolean(b) => Setting::Bool(b),
            toml::Value::String(s) => Setting::String(s),
            toml::Value::Datetime(d) => Setting::String(d.to_string()),
            toml::Value::Array(arr) => {
                let is_list = !arr.is_empty() && arr.iter().all(toml::Value::is_table);
                let items = arr.into_iter().map(Setting::from).collect();
                if is_list {
                    Setting::List(items)
                } else {
                    Setting::Array(items)
                }
            }
            toml::Value::Table(table) => Setting::Group(Group {
                entries: table
                    .into_iter()
                    .map(|(k, v)| (k, Setting::from(v)))
                    .collect(),
            }),
        }
    }
}

impl From<&Setting> for toml::Value {
    fn from(s: &Setting) -> Self {
        match s {
            Setting::Int(i) => toml::Value::Integer(*i),
            Setting::Float(f) => toml::Value::Float(*f),
            Setting::Bool(b) => toml::Value::Boolean(*b),
            Setting::String(s) => toml::Value::String(s.clone()),
            Setting::Array(items) | Setting::List(items) => {
                toml::Value::Array(items.iter().map(toml::Value::from).collect())
            }
            Setting::Group(group) => toml::Value::Table(
                group
                    .entries()
                    .map(|(k, v)| (k.to_string(), toml::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// serde_json Interop
// ─────────────────────────────────────────────────────────────────────────────

impl TryFrom<serde_json::Value> for Setting {
    type Error = SettingError;

    fn try_from(v: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match v {
            serde_json::Value::Null => {
                return Err(SettingError::Unsupported("null".to_string()));
            }
            serde_json::Value::Bool(b) => Setting::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Setting::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Setting::Float(f)
                } else {
                    return Err(SettingError::Unsupported(n.to_string()));
                }
            }
            serde_json::Value::String(s) => Setting::String(s),
            serde_json::Value::Array(arr) => {
                let is_list = !arr.is_empty() && arr.iter().all(serde_json::Value::is_object);
                let items = arr
                    .into_iter()
                    .map(Setting::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                if is_list {
                    Setting::List(items)
                } else {
                    Setting::Array(items)
                }
            }
            serde_json::Value::Object(obj) => Setting::Group(Group {
                entries: obj
                    .into_iter()
                    .map(|(k, v)| Setting::try_from(v).map(|s| (k, s)))
                    .collect::<Result<Vec<_>, _>>()?,
            }),
        })
    }
}

impl TryFrom<&Setting> for serde_json::Value {
    type Error = SettingError;

    /// Fails on non-finite floats, which JSON cannot represent
    fn try_from(s: &Setting) -> Result<Self, Self::Error> {
        Ok(match s {
            Setting::Int(i) => serde_json::Value::Number((*i).into()),
            Setting::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| SettingError::Unsupported(format!("non-finite float {f}")))?,
            Setting::Bool(b) => serde_json::Value::Bool(*b),
            Setting::String(s) => serde_json::Value::String(s.clone()),
            Setting::Array(items) | Setting::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(serde_json::Value::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Setting::Group(group) => serde_json::Value::Object(
                group
                    .entries()
                    .map(|(k, v)| serde_json::Value::try_from(v).map(|v| (k.to_string(), v)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────────────────────────

impl Setting {
    /// Parse a TOML document into a root group
    pub fn parse_toml(content: &str) -> Result<Setting, SettingError> {
        let table: toml::Table = toml::from_str(content)?;
        Ok(Setting::from(toml::Value::Table(table)))
    }

    /// Parse a JSON document; the top level must be an object
    pub fn parse_json(content: &str) -> Result<Setting, SettingError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        if !value.is_object() {
            return Err(SettingError::NotAGroup);
        }
        Setting::try_from(value)
    }

    pub fn to_toml_string(&self) -> Result<String, SettingError> {
        match toml::Value::from(self) {
            toml::Value::Table(table) => Ok(toml::to_string_pretty(&table)?),
            _ => Err(SettingError::NotAGroup),
        }
    }

    pub fn to_json_string(&self) -> Result<String, SettingError> {
        if self.as_group().is_none() {
            return Err(SettingError::NotAGroup);
        }
        Ok(serde_json::to_string_pretty(&serde_json::Value::try_from(self)?)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while navigating or (de)serializing a settings tree
#[derive(Debug, thiserror::Error)]
pub enum SettingError {
    #[error("malformed path: {0}")]
    BadPath(String),

    #[error("setting not found: {0}")]
    NotFound(String),

    #[error("setting {path} is a {actual}, expected {expected}")]
    WrongKind {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("document root must be a group")]
    NotAGroup,

    #[error("unsupported value: {0}")]
    Unsupported(String),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("failed to write TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
