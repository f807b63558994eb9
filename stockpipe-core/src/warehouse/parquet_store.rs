//! Local Parquet-backed warehouse.
//!
//! Layout: `{root}/{project}/{dataset}/{table}/part-{NNNNN}.parquet`
//!
//! - Append writes one new part file; existing parts are never rewritten.
//! - The first append fixes the table's column layout; later appends with a
//!   different layout are rejected.
//! - Replace builds the new table in a sibling staging directory and swaps it in.
//! - Part writes are atomic (write to .tmp, rename into place).

use super::{TableRef, Warehouse, WarehouseError};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const PART_PREFIX: &str = "part-";
const PART_EXT: &str = "parquet";

pub struct ParquetWarehouse {
    root: PathBuf,
}

impl ParquetWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: &TableRef) -> PathBuf {
        self.root
            .join(&table.project)
            .join(&table.dataset)
            .join(&table.table)
    }

    /// Part files of a table, sorted by part number.
    fn parts(&self, table: &TableRef) -> Result<Vec<(u32, PathBuf)>, WarehouseError> {
        let dir = self.table_dir(table);
        let entries = fs::read_dir(&dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WarehouseError::TableNotFound(table.clone())
            } else {
                io_err(&dir, e)
            }
        })?;

        let mut parts = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_err(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PART_EXT) {
                continue;
            }
            let index = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix(PART_PREFIX))
                .and_then(|s| s.parse::<u32>().ok());
            if let Some(index) = index {
                parts.push((index, path));
            }
        }
        parts.sort_by_key(|(index, _)| *index);
        Ok(parts)
    }

    /// Number of rows currently in a table.
    pub fn row_count(&self, table: &TableRef) -> Result<u64, WarehouseError> {
        Ok(self.read_table(table)?.height() as u64)
    }

    /// Tables present under `project.dataset`, sorted by name.
    pub fn list_tables(&self, project: &str, dataset: &str) -> Result<Vec<TableRef>, WarehouseError> {
        let dir = self.root.join(project).join(dataset);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut tables = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && !name.ends_with(STAGING_SUFFIX) {
                tables.push(TableRef::new(project, dataset, name));
            }
        }
        tables.sort();
        Ok(tables)
    }
}

const STAGING_SUFFIX: &str = ".staging";

fn io_err(path: &Path, source: std::io::Error) -> WarehouseError {
    WarehouseError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn part_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{PART_PREFIX}{index:05}.{PART_EXT}"))
}

/// Column names and types, rendered for comparison and error messages.
fn layout(df: &DataFrame) -> String {
    let cols: Vec<String> = df
        .get_columns()
        .iter()
        .map(|c| format!("{}:{}", c.name(), c.dtype()))
        .collect();
    format!("[{}]", cols.join(", "))
}

fn write_part(table: &TableRef, df: &DataFrame, path: &Path) -> Result<(), WarehouseError> {
    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|source| WarehouseError::Frame {
            table: table.clone(),
            source,
        })?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(path, e)
    })
}

fn read_part(table: &TableRef, path: &Path) -> Result<DataFrame, WarehouseError> {
    let file = fs::File::open(path).map_err(|e| io_err(path, e))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|source| WarehouseError::Frame {
            table: table.clone(),
            source,
        })
}

impl Warehouse for ParquetWarehouse {
    fn append(&self, table: &TableRef, batch: &DataFrame) -> Result<u64, WarehouseError> {
        let dir = self.table_dir(table);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let parts = self.parts(table)?;
        if let Some((_, first)) = parts.first() {
            let expected = layout(&read_part(table, first)?);
            let actual = layout(batch);
            if expected != actual {
                return Err(WarehouseError::SchemaMismatch {
                    table: table.clone(),
                    expected,
                    actual,
                });
            }
        }

        let next = parts.last().map(|(index, _)| index + 1).unwrap_or(0);
        write_part(table, batch, &part_path(&dir, next))?;

        tracing::debug!(table = %table, part = next, rows = batch.height(), "appended part");
        Ok(batch.height() as u64)
    }

    fn replace_with_union_all(
        &self,
        target: &TableRef,
        sources: &[TableRef],
    ) -> Result<u64, WarehouseError> {
        let mut frames = Vec::with_capacity(sources.len());
        for source in sources {
            let df = self.read_table(source)?;
            if df.width() > 0 {
                frames.push((source, df));
            }
        }

        let mut frames = frames.into_iter();
        let mut union = match frames.next() {
            Some((_, df)) => df,
            None => DataFrame::empty(),
        };
        for (source, df) in frames {
            let (expected, actual) = (layout(&union), layout(&df));
            if expected != actual {
                return Err(WarehouseError::SchemaMismatch {
                    table: source.clone(),
                    expected,
                    actual,
                });
            }
            union.vstack_mut(&df).map_err(|e| WarehouseError::Frame {
                table: target.clone(),
                source: e,
            })?;
        }

        let dir = self.table_dir(target);
        let mut staging_name = dir.as_os_str().to_owned();
        staging_name.push(STAGING_SUFFIX);
        let staging = PathBuf::from(staging_name);

        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
        if union.width() > 0 {
            write_part(target, &union, &part_path(&staging, 0))?;
        }

        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
        fs::rename(&staging, &dir).map_err(|e| io_err(&dir, e))?;

        tracing::debug!(table = %target, sources = sources.len(), rows = union.height(), "replaced table");
        Ok(union.height() as u64)
    }

    fn read_table(&self, table: &TableRef) -> Result<DataFrame, WarehouseError> {
        let mut parts = self.parts(table)?.into_iter();
        let mut out = match parts.next() {
            Some((_, path)) => read_part(table, &path)?,
            None => return Ok(DataFrame::empty()),
        };
        for (_, path) in parts {
            let df = read_part(table, &path)?;
            out.vstack_mut(&df).map_err(|source| WarehouseError::Frame {
                table: table.clone(),
                source,
            })?;
        }
        Ok(out)
    }

    fn table_exists(&self, table: &TableRef) -> bool {
        self.table_dir(table).is_dir()
    }
}
