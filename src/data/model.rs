use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell of the catalog table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the dtypes a catalog CSV carries.
/// Star identities are used as `BTreeMap` keys downstream, so `CellValue`
/// must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so star identities can be grouped in a BTreeMap --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

/// Canonical text form, the one exact-match filters compare against:
/// integers plain, floats shortest round-trip with a trailing `.0` when
/// integral, booleans capitalised.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{}", float_repr(*v)),
            CellValue::Bool(true) => write!(f, "True"),
            CellValue::Bool(false) => write!(f, "False"),
            CellValue::Null => write!(f, "nan"),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64`. Booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Null and NaN both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }
}

/// Shortest round-trip float text with scientific notation outside
/// `[1e-4, 1e16)`, e.g. `5.0`, `0.25`, `1e-07`, `1.5e+16`.
pub fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let sci = format!("{v:e}");
        let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(d) => ('-', d),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – inferred dtype of a whole column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Bool,
    Text,
    /// Every cell missing. Behaves as a numeric column.
    Empty,
}

impl ColumnKind {
    /// Whether range comparisons are meaningful on this column.
    pub fn is_numeric(self) -> bool {
        !matches!(self, ColumnKind::Text)
    }

    /// Infer the kind of a column from its cells.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> Self {
        let mut kind = ColumnKind::Empty;
        let mut saw_missing = false;
        for value in values {
            let cell_kind = match value {
                v if v.is_missing() => {
                    saw_missing = true;
                    continue;
                }
                CellValue::Integer(_) => ColumnKind::Integer,
                CellValue::Float(_) => ColumnKind::Float,
                CellValue::Bool(_) => ColumnKind::Bool,
                _ => ColumnKind::Text,
            };
            kind = match (kind, cell_kind) {
                (ColumnKind::Empty, k) => k,
                (a, b) if a == b => a,
                (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                    ColumnKind::Float
                }
                _ => ColumnKind::Text,
            };
        }
        if kind == ColumnKind::Integer && saw_missing {
            ColumnKind::Float
        } else {
            kind
        }
    }
}

// ---------------------------------------------------------------------------
// PlanetRow – one planet observation
// ---------------------------------------------------------------------------

/// A single planet (one row of the uploaded catalog).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanetRow {
    /// Dynamic columns: column_name → value.
    pub values: BTreeMap<String, CellValue>,
}

impl PlanetRow {
    /// Non-missing value of `column`, if any.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column).filter(|v| !v.is_missing())
    }

    /// Non-missing numeric value of `column`, if any.
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(CellValue::as_f64)
    }
}

// ---------------------------------------------------------------------------
// PlanetTable – one loaded dataset
// ---------------------------------------------------------------------------

/// A loaded catalog: ordered columns and rows in file order.
#[derive(Debug, Clone, Default)]
pub struct PlanetTable {
    /// Column names in file order; columns added later are appended.
    pub columns: Vec<String>,
    /// All planets (rows), in file order.
    pub rows: Vec<PlanetRow>,
    kinds: BTreeMap<String, ColumnKind>,
}

impl PlanetTable {
    /// Build a table from rows, inferring each column's kind and
    /// normalising every cell to it.
    pub fn from_rows(columns: Vec<String>, rows: Vec<PlanetRow>) -> Self {
        let mut table = PlanetTable {
            columns,
            rows,
            kinds: BTreeMap::new(),
        };
        for column in table.columns.clone() {
            table.refresh_kind(&column);
        }
        table
    }

    /// Number of planets.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.kinds.contains_key(column)
    }

    pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        self.kinds.get(column).copied()
    }

    /// Iterate over a column's cells in row order. Absent cells read as `Null`.
    pub fn column<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a CellValue> + 'a {
        self.rows
            .iter()
            .map(move |row| row.values.get(column).unwrap_or(&CellValue::Null))
    }

    /// Insert or overwrite a column. `values` must have one entry per row.
    pub fn set_column(&mut self, column: &str, values: Vec<CellValue>) {
        debug_assert_eq!(values.len(), self.rows.len());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.values.insert(column.to_string(), value);
        }
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
        self.refresh_kind(column);
    }

    /// Copy `source` into `target` (appending `target` if new).
    pub fn copy_column(&mut self, source: &str, target: &str) {
        let values: Vec<CellValue> = self.column(source).cloned().collect();
        self.set_column(target, values);
    }

    /// Replace missing cells of `column` with `fill`. No-op for absent columns.
    pub fn fill_missing(&mut self, column: &str, fill: CellValue) {
        if !self.has_column(column) {
            return;
        }
        for row in &mut self.rows {
            let cell = row.values.entry(column.to_string()).or_insert(CellValue::Null);
            if cell.is_missing() {
                *cell = fill.clone();
            }
        }
        self.refresh_kind(column);
    }

    /// Observed min and max over the numeric, non-missing cells of `column`.
    pub fn numeric_range(&self, column: &str) -> Option<(f64, f64)> {
        self.column(column)
            .filter(|v| !v.is_missing())
            .filter_map(CellValue::as_f64)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Re-infer a column's kind and promote its cells to match, so a column
    /// that mixes integers with floats or missing values reads as floats.
    fn refresh_kind(&mut self, column: &str) {
        let kind = ColumnKind::infer(self.column(column));
        if kind == ColumnKind::Float {
            for row in &mut self.rows {
                if let Some(cell) = row.values.get_mut(column) {
                    if let CellValue::Integer(i) = *cell {
                        *cell = CellValue::Float(i as f64);
                    }
                }
            }
        }
        self.kinds.insert(column.to_string(), kind);
    }
}
