//! # Graph Value Model
//!
//! The single value union every other subsystem trades in: query results,
//! expression evaluation, iterator cells, and the tabular [`DataSet`]
//! shape returned by storage RPCs.
//!
//! ## Null vs Empty
//!
//! The model distinguishes two "nothing" states:
//!
//! - [`Value::Empty`] — *absent*. A cell that was never produced.
//! - [`Value::Null`] — *present but null*, further qualified by a
//!   [`NullKind`]. Every kind except [`NullKind::Null`] is an
//!   **errorful null** (division by zero, overflow, bad data, ...) and is
//!   stickier than a plain null in logical operators: it survives
//!   short-circuiting where a plain null collapses.
//!
//! Operators across the crate short-circuit on one or the other, so the
//! distinction is load-bearing, not cosmetic.
//!
//! ## Tabular types
//!
//! A [`DataSet`] is a named-column table of [`Row`]s. Invariant: every
//! row is exactly `col_names.len()` values wide. Neighbor-response
//! datasets additionally follow the reserved column-name convention
//! (`_vid`, `_stats`, `_tag:...`, `_edge:...`, `_expr`) validated by the
//! neighbors iterator.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::fmt;

// ------------------------------------------------------------------------------------------------
// Reserved column names
// ------------------------------------------------------------------------------------------------

/// First column of every neighbor-response dataset: the vertex id.
pub const COL_VID: &str = "_vid";

/// Second column of every neighbor-response dataset: per-vertex stats.
pub const COL_STATS: &str = "_stats";

/// Last column of every neighbor-response dataset: expression results.
pub const COL_EXPR: &str = "_expr";

/// Source-vertex pseudo property of an edge.
pub const COL_SRC: &str = "_src";

/// Destination-vertex pseudo property of an edge.
pub const COL_DST: &str = "_dst";

/// Edge-type pseudo property of an edge.
pub const COL_TYPE: &str = "_type";

/// Rank pseudo property of an edge.
pub const COL_RANK: &str = "_rank";

/// Prefix of tag-property columns: `_tag:<tag>:<prop1>:<prop2>:...`.
pub const TAG_COL_PREFIX: &str = "_tag:";

/// Prefix of edge-property columns: `_edge:<+|-><name>:<prop1>:...`.
pub const EDGE_COL_PREFIX: &str = "_edge:";

// ------------------------------------------------------------------------------------------------
// Null kinds
// ------------------------------------------------------------------------------------------------

/// Subtype tag carried by [`Value::Null`].
///
/// [`NullKind::Null`] is the ordinary SQL-style null. Every other kind
/// records *why* the value degenerated and propagates through logical
/// operators even when a plain null would collapse to a definite result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullKind {
    /// Plain null — no error attached.
    Null,

    /// Division (or modulo) by zero.
    DivByZero,

    /// Value fell outside the representable range of its type.
    OutOfRange,

    /// Arithmetic overflow.
    Overflow,

    /// Operation applied to an operand of the wrong type.
    BadType,

    /// Malformed input data.
    BadData,

    /// Error accumulation itself overflowed.
    ErrOverflow,

    /// Reference to a property that does not exist.
    UnknownProp,
}

// ------------------------------------------------------------------------------------------------
// Temporal types
// ------------------------------------------------------------------------------------------------

/// Calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Date {
    pub year: i16,
    pub month: u8,
    pub day: u8,
}

/// Wall-clock time with microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub sec: u8,
    pub microsec: u32,
}

/// Combined date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    pub date: Date,
    pub time: Time,
}

// ------------------------------------------------------------------------------------------------
// Graph entity types
// ------------------------------------------------------------------------------------------------

/// A named tag attached to a vertex, carrying its property map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tag {
    pub name: String,
    pub props: BTreeMap<String, Value>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            props: BTreeMap::new(),
        }
    }
}

/// A vertex: an id plus zero or more tags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vertex {
    /// Vertex id. By convention a string value.
    pub vid: Value,
    pub tags: Vec<Tag>,
}

/// An edge between two vertices.
///
/// Convention: a positive `etype` is the edge as stored, outgoing from
/// `src`; a negative `etype` is the reverse view, with `src`/`dst`
/// logically swapped by consumers that normalize direction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Edge {
    pub src: Value,
    pub dst: Value,
    pub etype: i32,
    pub ranking: i64,
    pub name: String,
    pub props: BTreeMap<String, Value>,
}

/// One hop of a [`Path`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    pub dst: Vertex,
    pub etype: i32,
    pub name: String,
    pub ranking: i64,
    pub props: BTreeMap<String, Value>,
}

/// A traversal path: a source vertex and the steps taken from it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub src: Vertex,
    pub steps: Vec<Step>,
}

// ------------------------------------------------------------------------------------------------
// Tabular types
// ------------------------------------------------------------------------------------------------

/// One row of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// A named-column table of rows.
///
/// Invariant: every row is exactly `col_names.len()` values wide.
/// [`DataSet::append_row`] enforces the invariant; [`DataSet::is_uniform`]
/// re-checks it for tables received over the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    pub col_names: Vec<String>,
    pub rows: Vec<Row>,
}

impl DataSet {
    /// Creates an empty dataset with the given column names.
    pub fn new(col_names: Vec<String>) -> Self {
        Self {
            col_names,
            rows: Vec::new(),
        }
    }

    /// Appends a row, rejecting width mismatches.
    ///
    /// Returns `false` (and drops the row) if the row is not exactly as
    /// wide as the column list.
    pub fn append_row(&mut self, row: Row) -> bool {
        if row.len() != self.col_names.len() {
            return false;
        }
        self.rows.push(row);
        true
    }

    /// Index of a column by exact, case-sensitive name.
    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.col_names.iter().position(|c| c == name)
    }

    /// Whether every row matches the declared column width.
    pub fn is_uniform(&self) -> bool {
        let width = self.col_names.len();
        self.rows.iter().all(|r| r.len() == width)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ------------------------------------------------------------------------------------------------
// Value
// ------------------------------------------------------------------------------------------------

/// The tagged value union.
///
/// See the [module docs](self) for the null/empty distinction.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent — the cell was never produced.
    #[default]
    Empty,

    /// Present but null, qualified by [`NullKind`].
    Null(NullKind),

    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Vertex(Box<Vertex>),
    Edge(Box<Edge>),
    Path(Box<Path>),
    DataSet(Box<DataSet>),
}

impl Value {
    /// The plain null value.
    pub const NULL: Value = Value::Null(NullKind::Null);

    /// The division-by-zero null value.
    pub const DIV_BY_ZERO: Value = Value::Null(NullKind::DivByZero);

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// An errorful null: any null kind other than the plain one.
    pub fn is_bad_null(&self) -> bool {
        matches!(self, Value::Null(kind) if *kind != NullKind::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn is_dataset(&self) -> bool {
        matches!(self, Value::DataSet(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&DataSet> {
        match self {
            Value::DataSet(ds) => Some(ds),
            _ => None,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Conversions
// ------------------------------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<DataSet> for Value {
    fn from(v: DataSet) -> Self {
        Value::DataSet(Box::new(v))
    }
}

impl From<Vertex> for Value {
    fn from(v: Vertex) -> Self {
        Value::Vertex(Box::new(v))
    }
}

impl From<Edge> for Value {
    fn from(v: Edge) -> Self {
        Value::Edge(Box::new(v))
    }
}

impl From<NullKind> for Value {
    fn from(kind: NullKind) -> Self {
        Value::Null(kind)
    }
}

// ------------------------------------------------------------------------------------------------
// Display
// ------------------------------------------------------------------------------------------------

impl fmt::Display for NullKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NullKind::Null => "NULL",
            NullKind::DivByZero => "NULL(div by zero)",
            NullKind::OutOfRange => "NULL(out of range)",
            NullKind::Overflow => "NULL(overflow)",
            NullKind::BadType => "NULL(bad type)",
            NullKind::BadData => "NULL(bad data)",
            NullKind::ErrOverflow => "NULL(error overflow)",
            NullKind::UnknownProp => "NULL(unknown prop)",
        };
        f.write_str(text)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("__EMPTY__"),
            Value::Null(kind) => write!(f, "{kind}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Date(d) => write!(f, "{:04}-{:02}-{:02}", d.year, d.month, d.day),
            Value::Time(t) => write!(
                f,
                "{:02}:{:02}:{:02}.{:06}",
                t.hour, t.minute, t.sec, t.microsec
            ),
            Value::DateTime(dt) => write!(
                f,
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}",
                dt.date.year,
                dt.date.month,
                dt.date.day,
                dt.time.hour,
                dt.time.minute,
                dt.time.sec,
                dt.time.microsec
            ),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Set(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Vertex(v) => write!(f, "({})", v.vid),
            Value::Edge(e) => write!(f, "{}-[{}@{}]->{}", e.src, e.name, e.ranking, e.dst),
            Value::Path(p) => write!(f, "path({} +{} steps)", p.src.vid, p.steps.len()),
            Value::DataSet(ds) => {
                write!(f, "dataset({} cols, {} rows)", ds.col_names.len(), ds.rows.len())
            }
        }
    }
}
