use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;

/// The grid model document could not be read as a network
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Model is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Model document must be a JSON object")]
    NotAnObject,
    #[error("Model has no '{0}' table")]
    MissingTable(&'static str),
    #[error("Table '{table}' is unreadable: {reason}")]
    BadTable { table: &'static str, reason: String },
    #[error("Invalid bus index entry: {0}")]
    BadBusId(Value),
}

/// Parsed grid model held for one invocation.
///
/// Keeps the scratch directory alive; it is removed once the last clone is dropped.
#[derive(Debug, Clone)]
pub struct NetworkModel {
    path: PathBuf,
    bus_ids: Vec<u64>,
    line_count: usize,
    trafo_count: usize,
    _scratch: Option<Arc<TempDir>>,
}

impl NetworkModel {
    /// Parse a serialized network document.
    ///
    /// Accepts the solver's envelope (`{"_module", "_class", "_object": {tables}}`) or a bare
    /// table map. Tables are frames in `split` orientation, optionally embedded as a JSON string.
    pub fn parse(bytes: &[u8], path: impl Into<PathBuf>) -> Result<Self, ParseError> {
        let root: Value = serde_json::from_slice(bytes)?;
        let root = root.as_object().ok_or(ParseError::NotAnObject)?;

        let tables = match root.get("_object") {
            Some(Value::Object(tables)) => tables,
            _ => root,
        };

        let bus = read_frame(tables, "bus")?.ok_or(ParseError::MissingTable("bus"))?;
        let bus_ids = frame_index(&bus, "bus")?
            .iter()
            .map(|v| v.as_u64().ok_or_else(|| ParseError::BadBusId(v.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let line_count = match read_frame(tables, "line")? {
            Some(frame) => frame_index(&frame, "line")?.len(),
            None => 0,
        };
        let trafo_count = match read_frame(tables, "trafo")? {
            Some(frame) => frame_index(&frame, "trafo")?.len(),
            None => 0,
        };

        Ok(Self {
            path: path.into(),
            bus_ids,
            line_count,
            trafo_count,
            _scratch: None,
        })
    }

    pub(crate) fn with_scratch(mut self, scratch: TempDir) -> Self {
        self._scratch = Some(Arc::new(scratch));
        self
    }

    /// Location of the local copy handed to the solver
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bus ids in the document's native order
    pub fn bus_ids(&self) -> &[u64] {
        &self.bus_ids
    }

    pub fn bus_count(&self) -> usize {
        self.bus_ids.len()
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn trafo_count(&self) -> usize {
        self.trafo_count
    }
}

fn read_frame(tables: &Map<String, Value>, table: &'static str) -> Result<Option<Value>, ParseError> {
    let Some(entry) = tables.get(table) else {
        return Ok(None);
    };

    let frame = match entry.get("_object") {
        Some(Value::String(embedded)) => {
            serde_json::from_str(embedded).map_err(|e| ParseError::BadTable {
                table,
                reason: e.to_string(),
            })?
        }
        Some(inline) => inline.clone(),
        None => entry.clone(),
    };

    if !frame.is_object() {
        return Err(ParseError::BadTable {
            table,
            reason: "frame is not an object".to_string(),
        });
    }
    Ok(Some(frame))
}

fn frame_index<'a>(frame: &'a Value, table: &'static str) -> Result<&'a Vec<Value>, ParseError> {
    frame
        .get("index")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::BadTable {
            table,
            reason: "missing 'index' array".to_string(),
        })
}
