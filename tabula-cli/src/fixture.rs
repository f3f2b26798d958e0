//! TOML table fixtures
//!
//! A fixture carries a table schema, its rows, the columns to index and an
//! optional stored query.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tabula_core::{ColumnSpec, EngineSettings, QueryDescriptor, Table, Value};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    /// Table name
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    /// Column names to build search indexes on
    #[serde(default)]
    pub indexes: Vec<String>,
    /// Query used when a command gives no steps of its own
    #[serde(default)]
    pub query: QueryDescriptor,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse fixture: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build the table with every row inserted and every index established
    pub fn build(&self, settings: &EngineSettings) -> Result<Table> {
        let table = Table::with_config(&self.name, self.columns.clone(), settings);
        for (i, row) in self.rows.iter().enumerate() {
            table
                .add_row(row.clone())
                .with_context(|| format!("Invalid row {} in fixture", i))?;
        }
        for name in &self.indexes {
            let column = table
                .column_index(name)?
                .with_context(|| format!("Index on unknown column '{}'", name))?;
            table.add_search_index(column)?;
        }
        debug!(
            "Loaded fixture table {} with {} rows",
            self.name,
            self.rows.len()
        );
        Ok(table)
    }
}

/// Resolve a column name against a table
pub fn column(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)?
        .with_context(|| format!("Unknown column '{}'", name))
}
