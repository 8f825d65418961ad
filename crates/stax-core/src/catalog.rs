//! Persistence collaborator: stacks, lists, elements and the ingestion history.
//!
//! The relational store lives outside this crate. [`Catalog`] is the surface
//! ingestion consumes; [`InMemoryCatalog`] implements it for the CLI and tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{IngestError, IngestResult};
use crate::pipeline::metadata::AssetType;

/// Top-level collection rooted at a directory on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub id: i64,
    pub name: String,
    pub path: PathBuf,
}

/// A list inside a stack. Lists nest through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementList {
    pub id: i64,
    pub stack_id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
}

/// Everything ingestion knows about an asset before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewElement {
    pub list_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub filepath_soft: Option<PathBuf>,
    pub filepath_hard: Option<PathBuf>,
    pub is_hard_copy: bool,
    pub frame_range: Option<String>,
    pub format: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub preview_path: Option<PathBuf>,
    pub gif_preview_path: Option<PathBuf>,
    pub video_preview_path: Option<PathBuf>,
    pub geometry_preview_path: Option<PathBuf>,
    pub file_size: Option<u64>,
}

/// A persisted element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: i64,
    #[serde(flatten)]
    pub fields: NewElement,
}

impl std::ops::Deref for Element {
    type Target = NewElement;

    fn deref(&self) -> &NewElement {
        &self.fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Success,
    Error,
}

/// One row of the ingestion history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionLogEntry {
    pub action: String,
    pub source_path: PathBuf,
    /// List name, or `#<id>` when the list could not be resolved
    pub target_list: String,
    pub status: IngestionStatus,
    pub message: String,
    pub element_id: Option<i64>,
}

/// Persistence operations ingestion depends on.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_list_by_id(&self, list_id: i64) -> Option<ElementList>;

    async fn get_stack_by_id(&self, stack_id: i64) -> Option<Stack>;

    /// Directory hard copies for `list_id` are placed under.
    async fn get_repository_path_for_list(&self, list_id: i64) -> Option<PathBuf>;

    /// Persist an element and return its id.
    async fn create_element(&self, element: NewElement) -> IngestResult<i64>;

    async fn log_ingestion(&self, entry: IngestionLogEntry) -> IngestResult<()>;
}

#[derive(Debug, Default)]
struct Tables {
    stacks: Vec<Stack>,
    lists: Vec<ElementList>,
    elements: Vec<Element>,
    history: Vec<IngestionLogEntry>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn list(&self, id: i64) -> Option<&ElementList> {
        self.lists.iter().find(|l| l.id == id)
    }
}

/// Thread-safe catalog held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: Mutex<Tables>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(&self, name: &str, path: impl AsRef<Path>) -> Stack {
        let mut tables = self.tables.lock();
        let stack = Stack {
            id: tables.next_id(),
            name: name.to_string(),
            path: path.as_ref().to_path_buf(),
        };
        tables.stacks.push(stack.clone());
        stack
    }

    pub fn add_list(&self, stack_id: i64, name: &str, parent_id: Option<i64>) -> ElementList {
        let mut tables = self.tables.lock();
        let list = ElementList {
            id: tables.next_id(),
            stack_id,
            parent_id,
            name: name.to_string(),
        };
        tables.lists.push(list.clone());
        list
    }

    pub fn elements(&self) -> Vec<Element> {
        self.tables.lock().elements.clone()
    }

    pub fn history(&self) -> Vec<IngestionLogEntry> {
        self.tables.lock().history.clone()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_list_by_id(&self, list_id: i64) -> Option<ElementList> {
        self.tables.lock().list(list_id).cloned()
    }

    async fn get_stack_by_id(&self, stack_id: i64) -> Option<Stack> {
        let tables = self.tables.lock();
        tables.stacks.iter().find(|s| s.id == stack_id).cloned()
    }

    async fn get_repository_path_for_list(&self, list_id: i64) -> Option<PathBuf> {
        let tables = self.tables.lock();
        let mut names = Vec::new();
        let mut current = tables.list(list_id)?;
        loop {
            names.push(current.name.as_str());
            match current.parent_id {
                // Guard against a malformed parent cycle.
                Some(parent) if names.len() <= tables.lists.len() => {
                    current = tables.list(parent)?;
                }
                Some(_) => return None,
                None => break,
            }
        }
        let stack = tables.stacks.iter().find(|s| s.id == current.stack_id)?;
        Some(names.iter().rev().fold(stack.path.clone(), |path, name| path.join(name)))
    }

    async fn create_element(&self, element: NewElement) -> IngestResult<i64> {
        let mut tables = self.tables.lock();
        if tables.list(element.list_id).is_none() {
            return Err(IngestError::Persistence(format!(
                "list {} does not exist",
                element.list_id
            )));
        }
        let id = tables.next_id();
        tables.elements.push(Element { id, fields: element });
        Ok(id)
    }

    async fn log_ingestion(&self, entry: IngestionLogEntry) -> IngestResult<()> {
        self.tables.lock().history.push(entry);
        Ok(())
    }
}
