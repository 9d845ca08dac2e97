//! Fixture-based procedure testing
//!
//! Every run goes through the same steps for each selected component:
//!
//! 1. upload the `*.ndjson` input tables of the component's test folder
//! 2. call the procedure once per test case, with positional arguments built
//!    from the component's parameter list
//! 3. read back every output table
//! 4. compare the outputs against the golden fixtures, or capture them as
//!    the new fixtures
//!
//! [`FixtureEngine::deploy_and_run`] installs the extension into the run's
//! destination first, so the procedures under test are always the current
//! ones.
//!
//! The warehouse is only reached through [`WarehouseAdapter`], so the same
//! run works on BigQuery, Snowflake and the in-memory mock.

use extpack_core::{
    rows_match, Component, Extension, ExtensionLayout, LoadError, OutputTables, ParamType,
    Parameter, Row, TestCase,
};
use extpack_core::literal::quote_string;
use crate::deploy::{DeployError, Deployer};
use extpack_warehouse::{WarehouseAdapter, WarehouseError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What to do with the outputs of each test case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Compare against the stored fixtures
    Test,

    /// Overwrite the stored fixtures
    Capture,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Component '{0}' not found in extension")]
    UnknownComponent(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("Test '{test_id}' failed for component {component} and table {table}.")]
    Mismatch {
        test_id: String,
        component: String,
        table: String,
    },

    #[error("Failed to access fixture {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid fixture {path}: {message}")]
    Parse { path: String, message: String },
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub mode: RunMode,

    /// Components exercised, in metadata order
    pub components: Vec<String>,

    /// Input tables successfully uploaded
    pub tables_loaded: usize,

    /// Test cases executed
    pub test_cases: usize,

    /// Fixture files written in capture mode
    pub captured: Vec<PathBuf>,
}

/// A procedure invocation with the output tables it will write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureCall {
    pub sql: String,

    /// Output parameter name and the table allocated for it
    pub outputs: Vec<(String, String)>,
}

pub struct FixtureEngine<'a> {
    adapter: &'a dyn WarehouseAdapter,
    layout: &'a ExtensionLayout,
    destination: String,
}

impl<'a> FixtureEngine<'a> {
    /// `destination` is the dataset/schema holding the deployed procedures,
    /// already formatted for the provider
    pub fn new(
        adapter: &'a dyn WarehouseAdapter,
        layout: &'a ExtensionLayout,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            layout,
            destination: destination.into(),
        }
    }

    /// Deploy `extension` to the engine's destination, then [`run`](Self::run)
    pub async fn deploy_and_run(
        &self,
        extension: &Extension,
        component: Option<&str>,
        mode: RunMode,
    ) -> Result<RunReport, FixtureError> {
        Deployer::new(self.adapter)
            .deploy(extension, self.layout, &self.destination)
            .await?;

        self.run(extension, component, mode).await
    }

    /// Run every test case of one component, or of all components
    pub async fn run(
        &self,
        extension: &Extension,
        component: Option<&str>,
        mode: RunMode,
    ) -> Result<RunReport, FixtureError> {
        let selected: Vec<&Component> = match component {
            Some(name) => vec![extension
                .component(name)
                .ok_or_else(|| FixtureError::UnknownComponent(name.to_string()))?],
            None => extension.components.iter().collect(),
        };

        let mut report = RunReport {
            mode,
            components: Vec::with_capacity(selected.len()),
            tables_loaded: 0,
            test_cases: 0,
            captured: Vec::new(),
        };

        for component in selected {
            report.tables_loaded += self.load_tables(component).await;

            let cases = self.layout.load_test_cases(&component.name)?;
            tracing::info!(
                component = %component.name,
                cases = cases.len(),
                "Running test cases"
            );

            for case in &cases {
                let outputs = self.execute_case(component, case).await?;
                match mode {
                    RunMode::Test => self.compare(component, &case.id, &outputs)?,
                    RunMode::Capture => report.captured.push(self.capture(component, &case.id, &outputs)?),
                }
                report.test_cases += 1;
            }

            report.components.push(component.name.clone());
        }

        Ok(report)
    }

    /// Table name an input fixture of `component` is uploaded to
    pub fn test_table(&self, component: &str, base: &str) -> String {
        format!("{}._test_{}_{}", self.destination, component, base)
    }

    /// Upload the component's `*.ndjson` files, returning how many loaded.
    ///
    /// Unreadable files and failed loads are logged and skipped; the test
    /// cases that need them fail later with a clearer error.
    pub async fn load_tables(&self, component: &Component) -> usize {
        let test_dir = self.layout.test_dir(&component.name);
        let mut loaded = 0;

        for path in ndjson_files(&test_dir) {
            let Some(base) = table_base_name(&path) else {
                continue;
            };
            let table = self.test_table(&component.name, &base);

            let rows = match read_ndjson(&path) {
                Ok(rows) => rows,
                Err(message) => {
                    tracing::warn!(file = %path.display(), "Skipping test table: {}", message);
                    continue;
                }
            };

            match self.adapter.load_table(&rows, &table).await {
                Ok(()) => {
                    tracing::debug!(table = %table, rows = rows.len(), "Uploaded test table");
                    loaded += 1;
                }
                Err(e) => tracing::warn!(table = %table, "Failed to upload test table: {}", e),
            }
        }

        loaded
    }

    /// SQL literal for one input parameter
    pub fn argument(&self, component: &Component, param: &Parameter, value: Option<&Value>) -> String {
        let Some(value) = value else {
            return "null".to_string();
        };

        match param.param_type {
            ParamType::Table => quote_string(&self.test_table(&component.name, &value_text(value))),
            t if t.is_textual() => quote_string(&value_text(value)),
            _ => value_text(value),
        }
    }

    /// Build the `CALL` statement for a test case, allocating fresh output
    /// tables
    pub fn procedure_call(&self, component: &Component, case: &TestCase) -> ProcedureCall {
        let mut args: Vec<String> = component
            .inputs
            .iter()
            .map(|param| self.argument(component, param, case.input(&param.name)))
            .collect();

        let mut outputs = Vec::with_capacity(component.outputs.len());
        for param in &component.outputs {
            let table = format!("{}._table_{}", self.destination, uuid::Uuid::new_v4().simple());
            args.push(quote_string(&table));
            outputs.push((param.name.clone(), table));
        }

        // dry_run
        args.push("false".to_string());

        ProcedureCall {
            sql: format!(
                "CALL {}.{}({});",
                self.destination,
                component.procedure_name,
                args.join(",")
            ),
            outputs,
        }
    }

    /// Call the procedure for one test case and fetch its output tables
    pub async fn execute_case(&self, component: &Component, case: &TestCase) -> Result<OutputTables, FixtureError> {
        let call = self.procedure_call(component, case);
        tracing::debug!(test_id = %case.id, "{}", call.sql);

        self.adapter.execute(&call.sql).await?;

        let mut outputs = OutputTables::new();
        for (name, table) in call.outputs {
            let rows = self.adapter.execute(&format!("SELECT * FROM {}", table)).await?;
            outputs.insert(name, rows);
        }
        Ok(outputs)
    }

    /// Check outputs against `fixtures/<test_id>.json`, ignoring row order
    pub fn compare(&self, component: &Component, test_id: &str, outputs: &OutputTables) -> Result<(), FixtureError> {
        let path = self.layout.fixture_file(&component.name, test_id);
        let expected = read_fixture(&path)?;

        for (table, actual) in outputs {
            let matches = expected
                .get(table)
                .is_some_and(|rows| rows_match(rows, actual));

            if !matches {
                return Err(FixtureError::Mismatch {
                    test_id: test_id.to_string(),
                    component: component.name.clone(),
                    table: table.clone(),
                });
            }
        }

        tracing::info!(component = %component.name, test_id, "Test passed");
        Ok(())
    }

    /// Write outputs as the new `fixtures/<test_id>.json`
    pub fn capture(&self, component: &Component, test_id: &str, outputs: &OutputTables) -> Result<PathBuf, FixtureError> {
        let path = self.layout.fixture_file(&component.name, test_id);
        let io_error = |e: std::io::Error| FixtureError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_error)?;
        }

        let contents = serde_json::to_string_pretty(outputs).map_err(|e| FixtureError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, contents).map_err(io_error)?;

        tracing::info!(component = %component.name, test_id, file = %path.display(), "Captured fixture");
        Ok(path)
    }
}

/// Plain text of a test input: strings unquoted, anything else as JSON
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `*.ndjson` files directly inside `dir`, sorted by name
fn ndjson_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "ndjson"))
        .collect()
}

/// File name up to its first `.`
fn table_base_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.split('.').next().filter(|s| !s.is_empty()).map(str::to_string)
}

fn read_ndjson(path: &Path) -> Result<Vec<Row>, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<Row>(line).map_err(|e| format!("line {}: {}", i + 1, e))
        })
        .collect()
}

fn read_fixture(path: &Path) -> Result<OutputTables, FixtureError> {
    let contents = std::fs::read_to_string(path).map_err(|e| FixtureError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&contents).map_err(|e| FixtureError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
