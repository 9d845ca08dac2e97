//! Extension directory loading
//!
//! Reads `metadata.json` and the per-component metadata, inlines help text
//! and icons, and resolves the paths of procedure SQL and test assets.

use crate::metadata::{Component, Extension, Provider, TestCase};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Errors raised while reading extension assets
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Icon file '{0}' not found in icons folder")]
    IconNotFound(String),

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Top-level `metadata.json`: components are listed by directory name
#[derive(Debug, Deserialize)]
struct ExtensionFile {
    name: String,
    provider: Provider,
    #[serde(default)]
    icon: Option<String>,
    components: Vec<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// File layout of an extension rooted at one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionLayout {
    root: PathBuf,
}

impl ExtensionLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.root.join("icons")
    }

    pub fn component_dir(&self, component: &str) -> PathBuf {
        self.root.join("components").join(component)
    }

    pub fn procedure_file(&self, component: &str) -> PathBuf {
        self.component_dir(component).join("src").join("procedure.sql")
    }

    pub fn help_file(&self, component: &str) -> PathBuf {
        self.component_dir(component).join("doc").join("README.md")
    }

    pub fn test_dir(&self, component: &str) -> PathBuf {
        self.component_dir(component).join("test")
    }

    pub fn test_config_file(&self, component: &str) -> PathBuf {
        self.test_dir(component).join("test.json")
    }

    pub fn fixtures_dir(&self, component: &str) -> PathBuf {
        self.test_dir(component).join("fixtures")
    }

    /// Golden output file of one test case
    pub fn fixture_file(&self, component: &str, test_id: &str) -> PathBuf {
        self.fixtures_dir(component).join(format!("{}.json", test_id))
    }

    pub fn package_file(&self) -> PathBuf {
        self.root.join("extension.zip")
    }

    /// Load the extension with help text and icons inlined
    pub fn load(&self) -> Result<Extension, LoadError> {
        let metadata_path = self.metadata_file();
        let contents = read_file(&metadata_path)?;
        let file: ExtensionFile = parse_json(&metadata_path, &contents)?;

        let icon = match file.icon {
            Some(icon) if !icon.is_empty() => Some(self.encode_icon(&icon)?),
            other => other,
        };

        let mut components = Vec::with_capacity(file.components.len());
        for dir_name in &file.components {
            components.push(self.load_component(dir_name)?);
        }

        tracing::debug!(
            extension = %file.name,
            provider = %file.provider,
            components = components.len(),
            "Loaded extension metadata"
        );

        Ok(Extension {
            name: file.name,
            provider: file.provider,
            icon,
            components,
            extra: file.extra,
        })
    }

    fn load_component(&self, dir_name: &str) -> Result<Component, LoadError> {
        let metadata_path = self.component_dir(dir_name).join("metadata.json");
        let contents = read_file(&metadata_path)?;
        let mut component: Component = parse_json(&metadata_path, &contents)?;

        let help = read_file(&self.help_file(dir_name))?;
        component.help = Some(help.replace('\n', "\\n"));

        if let Some(icon) = component.icon.take() {
            component.icon = if icon.is_empty() {
                Some(icon)
            } else {
                Some(self.encode_icon(&icon)?)
            };
        }

        Ok(component)
    }

    /// Inline an icon from the icons folder as a base64 data URI
    pub fn encode_icon(&self, file_name: &str) -> Result<String, LoadError> {
        let path = self.icons_dir().join(file_name);
        if !path.exists() {
            let base = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file_name.to_string());
            return Err(LoadError::IconNotFound(base));
        }

        let bytes = std::fs::read(&path).map_err(|e| LoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mime = if file_name.ends_with(".svg") {
            "image/svg+xml"
        } else {
            "image/png"
        };
        Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
    }

    /// Raw procedure definition of a component
    pub fn read_procedure(&self, component: &str) -> Result<String, LoadError> {
        read_file(&self.procedure_file(component))
    }

    /// Declared test cases of a component
    pub fn load_test_cases(&self, component: &str) -> Result<Vec<TestCase>, LoadError> {
        let path = self.test_config_file(component);
        let contents = read_file(&path)?;
        parse_json(&path, &contents)
    }
}

fn read_file(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(path.display().to_string())
        } else {
            LoadError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        }
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path, contents: &str) -> Result<T, LoadError> {
    serde_json::from_str(contents).map_err(|e| LoadError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
