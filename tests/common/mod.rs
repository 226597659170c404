#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tabular_insights::{
    component::ComponentSpec,
    frame::{Column, Table},
    normalize,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// Small sales extract with a European amount column and UTM coordinates.
pub const SALES_CSV: &str = "\
store,city,amount,status,x,y
Sants,Barcelona,\"1.234,50 €\",done,432000,4582000
Centre,Girona,\"980,00 €\",open,485000,4647000
Gracia,Barcelona,\"2.000,00 €\",done,431500,4581500
Horta,,\"15,25 €\",done,433000,4583000
";

pub fn text_column(name: &str, cells: &[Option<&str>]) -> Column {
    Column::text(name, cells)
}

pub fn table(columns: Vec<Column>) -> Table {
    Table::new(columns).expect("columns share a length")
}

/// Builds a table from text columns and runs the normalizer over it.
pub fn normalized(columns: Vec<Column>) -> Table {
    normalize::normalize(table(columns))
}

pub fn spec(value: serde_json::Value) -> ComponentSpec {
    ComponentSpec::from_json(&value)
}
