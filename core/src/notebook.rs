//! Jupyter notebook reading and write-back.
//!
//! Only `code` cells are exposed for editing. Every other field of the
//! document, and every other cell, is carried through untouched so a saved
//! notebook differs from the original only in the sources that changed.

use crate::error::MigrateError;
use crate::error::Result;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use walkdir::DirEntry;
use walkdir::WalkDir;

const NOTEBOOK_EXTENSION: &str = "ipynb";
const CHECKPOINT_DIR: &str = ".ipynb_checkpoints";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
    Other(String),
}

impl CellKind {
    fn parse(cell_type: &str) -> Self {
        match cell_type {
            "code" => Self::Code,
            "markdown" => Self::Markdown,
            "raw" => Self::Raw,
            other => Self::Other(other.to_string()),
        }
    }
}

/// nbformat allows `source` as one string or as a list of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceShape {
    String,
    Lines,
}

#[derive(Debug, Clone)]
pub struct Cell {
    kind: CellKind,
    source: String,
    shape: SourceShape,
    raw: Map<String, Value>,
}

impl Cell {
    fn from_json(path: &Path, index: usize, value: Value) -> Result<Self> {
        let Value::Object(raw) = value else {
            return Err(MigrateError::InvalidNotebook {
                path: path.to_path_buf(),
                reason: format!("cell {index} is not an object"),
            });
        };

        let kind = raw
            .get("cell_type")
            .and_then(Value::as_str)
            .map(CellKind::parse)
            .ok_or_else(|| MigrateError::InvalidNotebook {
                path: path.to_path_buf(),
                reason: format!("cell {index} has no cell_type"),
            })?;

        let (source, shape) = match raw.get("source") {
            None => (String::new(), SourceShape::Lines),
            Some(Value::String(s)) => (s.clone(), SourceShape::String),
            Some(Value::Array(lines)) => {
                let mut joined = String::new();
                for line in lines {
                    let Some(line) = line.as_str() else {
                        return Err(MigrateError::InvalidNotebook {
                            path: path.to_path_buf(),
                            reason: format!("cell {index} has a non-string source line"),
                        });
                    };
                    joined.push_str(line);
                }
                (joined, SourceShape::Lines)
            }
            Some(_) => {
                return Err(MigrateError::InvalidNotebook {
                    path: path.to_path_buf(),
                    reason: format!("cell {index} has an unsupported source type"),
                });
            }
        };

        Ok(Self {
            kind,
            source,
            shape,
            raw,
        })
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn set_source(&mut self, text: String) {
        let encoded = match self.shape {
            SourceShape::String => Value::String(text.clone()),
            SourceShape::Lines => Value::Array(
                text.split_inclusive('\n')
                    .map(|line| Value::String(line.to_string()))
                    .collect(),
            ),
        };
        self.raw.insert("source".to_string(), encoded);
        self.source = text;
    }
}

/// A notebook document loaded from disk.
#[derive(Debug, Clone)]
pub struct Notebook {
    path: PathBuf,
    document: Map<String, Value>,
    cells: Vec<Cell>,
    dirty: bool,
}

impl Notebook {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| MigrateError::io(format!("failed to read {}", path.display()), e))?;
        Self::parse(path, &content)
    }

    pub fn parse(path: impl AsRef<Path>, content: &str) -> Result<Self> {
        let path = path.as_ref();
        let value: Value = serde_json::from_str(content).map_err(|source| MigrateError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let Value::Object(document) = value else {
            return Err(MigrateError::InvalidNotebook {
                path: path.to_path_buf(),
                reason: "top level is not an object".to_string(),
            });
        };

        let cells = match document.get("cells") {
            Some(Value::Array(cells)) => cells
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, cell)| Cell::from_json(path, index, cell))
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(MigrateError::InvalidNotebook {
                    path: path.to_path_buf(),
                    reason: "missing `cells` list".to_string(),
                });
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            document,
            cells,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Code cells in document order, with their index in [`Self::cells`].
    pub fn code_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells.iter().enumerate().filter(|(_, c)| c.is_code())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the text of code cell `index`. Returns whether anything changed.
    pub fn replace_source(&mut self, index: usize, text: impl Into<String>) -> Result<bool> {
        let path = self.path.clone();
        let cell = self
            .cells
            .get_mut(index)
            .ok_or_else(|| MigrateError::InvalidNotebook {
                path: path.clone(),
                reason: format!("no cell at index {index}"),
            })?;
        if !cell.is_code() {
            return Err(MigrateError::InvalidNotebook {
                path,
                reason: format!("cell {index} is not a code cell"),
            });
        }

        let text = text.into();
        if cell.source == text {
            return Ok(false);
        }
        cell.set_source(text);
        self.dirty = true;
        Ok(true)
    }

    /// Serialize with nbformat's layout: one-space indent, trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        let mut document = self.document.clone();
        let cells = self
            .cells
            .iter()
            .map(|c| Value::Object(c.raw.clone()))
            .collect();
        if let Some(slot) = document.get_mut("cells") {
            *slot = Value::Array(cells);
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        Value::Object(document)
            .serialize(&mut serializer)
            .map_err(|source| MigrateError::Json {
                path: self.path.clone(),
                source,
            })?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|e| MigrateError::InvalidNotebook {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write the notebook back to its path if any cell changed.
    ///
    /// Returns `false` without touching the file when nothing changed.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let content = self.to_json_string()?;

        // Write atomically
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);
        fs::write(&temp_path, content)
            .map_err(|e| MigrateError::io(format!("failed to write {}", temp_path.display()), e))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| MigrateError::io(format!("failed to replace {}", self.path.display()), e))?;

        self.dirty = false;
        Ok(true)
    }
}

/// All `*.ipynb` files under `root`, sorted, skipping hidden directories
/// and Jupyter checkpoint copies.
pub fn discover_notebooks(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

    for entry in walker {
        let entry = entry.map_err(|source| MigrateError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(NOTEBOOK_EXTENSION)
        {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == CHECKPOINT_DIR || name.starts_with('.')
}

/// Repository-relative path with forward slashes, as used in diff headers
/// and the run summary.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
