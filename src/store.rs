use crate::types::{bool_token, FieldMap, PlaylistRow, RowKey};
use crate::{MatchError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Supplies playlist rows to process.
pub trait RowSource {
    /// Every row, in order.
    fn rows(&self) -> Vec<PlaylistRow>;

    /// Rows matching a predicate, e.g. [`PlaylistRow::needs_link`].
    fn rows_where(&self, predicate: impl Fn(&PlaylistRow) -> bool) -> Vec<PlaylistRow>
    where
        Self: Sized,
    {
        self.rows().into_iter().filter(|row| predicate(row)).collect()
    }
}

/// Receives field updates for processed rows.
pub trait ResultSink {
    /// Overwrite the given fields of an existing row.
    fn update(&mut self, row: RowKey, fields: &FieldMap) -> Result<()>;

    /// Add a new row at the end; returns its key.
    fn append(&mut self, fields: &FieldMap) -> Result<RowKey>;

    /// Persist pending changes.
    fn save(&mut self) -> Result<()>;
}

/// Rows held in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<PlaylistRow>,
    saves: usize,
}

impl MemoryStore {
    pub fn new(rows: Vec<PlaylistRow>) -> Self {
        Self { rows, saves: 0 }
    }

    pub fn row(&self, key: RowKey) -> Option<&PlaylistRow> {
        self.rows.get(key)
    }

    /// Number of times [`ResultSink::save`] was called.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl RowSource for MemoryStore {
    fn rows(&self) -> Vec<PlaylistRow> {
        self.rows.clone()
    }
}

impl ResultSink for MemoryStore {
    fn update(&mut self, row: RowKey, fields: &FieldMap) -> Result<()> {
        apply_update(&mut self.rows, row, fields)
    }

    fn append(&mut self, fields: &FieldMap) -> Result<RowKey> {
        Ok(append_row(&mut self.rows, fields))
    }

    fn save(&mut self) -> Result<()> {
        self.saves += 1;
        Ok(())
    }
}

/// Rows stored as a JSON array of `{"COLUMN": value}` objects.
///
/// This is the hand-off format for the playlist workbook: export the
/// `TITRES` sheet to JSON, run the tools, import it back. Numbers and
/// booleans are read as their cell text. On save, cells the tools did not
/// change are written back as their original JSON values (`null` included);
/// changed and new cells are written as strings.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    rows: Vec<PlaylistRow>,
    /// Cells as read from disk, one object per row
    cells: Vec<Map<String, Value>>,
    dirty: bool,
}

impl JsonFileStore {
    /// Open a row file; a missing file is an empty playlist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cells = if path.exists() {
            let json = fs::read_to_string(&path)?;
            parse_cells(&json)?
        } else {
            log::debug!("{} does not exist yet, starting empty", path.display());
            Vec::new()
        };
        let rows: Vec<PlaylistRow> = cells
            .iter()
            .enumerate()
            .map(|(key, object)| row_from_cells(key, object))
            .collect();

        log::debug!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(Self {
            path,
            rows,
            cells,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RowSource for JsonFileStore {
    fn rows(&self) -> Vec<PlaylistRow> {
        self.rows.clone()
    }
}

impl ResultSink for JsonFileStore {
    fn update(&mut self, row: RowKey, fields: &FieldMap) -> Result<()> {
        apply_update(&mut self.rows, row, fields)?;
        self.dirty = true;
        Ok(())
    }

    fn append(&mut self, fields: &FieldMap) -> Result<RowKey> {
        self.dirty = true;
        Ok(append_row(&mut self.rows, fields))
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target, then rename over it
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, render_rows(&self.rows, &self.cells)?)?;
        fs::rename(&tmp_path, &self.path)?;

        self.dirty = false;
        log::debug!("Saved {} rows to {}", self.rows.len(), self.path.display());
        Ok(())
    }
}

fn apply_update(rows: &mut [PlaylistRow], row: RowKey, fields: &FieldMap) -> Result<()> {
    let target = rows.get_mut(row).ok_or_else(|| MatchError::MalformedRow {
        row,
        reason: "no such row".to_string(),
    })?;
    target.apply(fields);
    Ok(())
}

fn append_row(rows: &mut Vec<PlaylistRow>, fields: &FieldMap) -> RowKey {
    let key = rows.len();
    let mut row = PlaylistRow::new(key);
    row.apply(fields);
    rows.push(row);
    key
}

fn parse_cells(json: &str) -> Result<Vec<Map<String, Value>>> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(items) = value else {
        return Err(MatchError::Parse(
            "row file must contain a JSON array".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(key, item)| match item {
            Value::Object(object) => Ok(object),
            _ => Err(MatchError::Parse(format!("row {key} is not a JSON object"))),
        })
        .collect()
}

#[cfg(test)]
fn parse_rows(json: &str) -> Result<Vec<PlaylistRow>> {
    Ok(parse_cells(json)?
        .iter()
        .enumerate()
        .map(|(key, object)| row_from_cells(key, object))
        .collect())
}

fn row_from_cells(key: RowKey, object: &Map<String, Value>) -> PlaylistRow {
    let mut row = PlaylistRow::new(key);
    for (column, cell) in object {
        if let Some(text) = cell_text(cell) {
            row.values.insert(column.clone(), text);
        }
    }
    row
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(bool_token(*b).to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn render_rows(rows: &[PlaylistRow], cells: &[Map<String, Value>]) -> Result<String> {
    let array: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut object = cells.get(row.key).cloned().unwrap_or_default();
            for (column, text) in &row.values {
                let unchanged = object
                    .get(column)
                    .and_then(cell_text)
                    .is_some_and(|original| original == *text);
                if !unchanged {
                    object.insert(column.clone(), Value::String(text.clone()));
                }
            }
            Value::Object(object)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&array)?)
}
