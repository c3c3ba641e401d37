// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Knowledge base: vector index plus its row-aligned record table
//!
//! Row `i` of the vector index is the embedding of record `i` of the
//! metadata table. [`KnowledgeBase::new`] refuses to pair an index and a
//! table of different lengths, so every search hit maps to exactly one
//! record.

use super::errors::RagError;
use crate::vector::{DistanceMetric, SearchBackend, VectorIndex};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One retrievable question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Original question text
    pub input: String,
    /// Associated answer text
    pub response: String,
}

impl KnowledgeRecord {
    pub fn new(input: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            response: response.into(),
        }
    }

    /// Two-line block used when building generation context
    pub fn to_context_block(&self) -> String {
        format!("Question: {}\nAnswer: {}", self.input, self.response)
    }
}

/// Metadata table layouts accepted by [`load_records`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    Csv,
    JsonLines,
    Json,
}

impl MetadataFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(MetadataFormat::Csv),
            "jsonl" | "ndjson" => Ok(MetadataFormat::JsonLines),
            "json" => Ok(MetadataFormat::Json),
            other => anyhow::bail!(
                "Unsupported metadata file extension '{}' for {} (expected .csv, .jsonl or .json)",
                other,
                path.display()
            ),
        }
    }
}

/// Reads the record table, preserving row order
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<KnowledgeRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("Metadata file not found: {}", path.display());
    }

    let records = match MetadataFormat::from_path(path)? {
        MetadataFormat::Csv => {
            let mut reader = csv::Reader::from_path(path)
                .with_context(|| format!("Failed to open metadata CSV {}", path.display()))?;
            reader
                .deserialize::<KnowledgeRecord>()
                .enumerate()
                .map(|(row, rec)| {
                    rec.with_context(|| format!("Invalid metadata row {} in {}", row, path.display()))
                })
                .collect::<Result<Vec<_>>>()?
        }
        MetadataFormat::JsonLines => {
            let reader = BufReader::new(File::open(path)?);
            let mut records = Vec::new();
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: KnowledgeRecord = serde_json::from_str(&line).with_context(|| {
                    format!("Invalid metadata line {} in {}", line_no + 1, path.display())
                })?;
                records.push(record);
            }
            records
        }
        MetadataFormat::Json => {
            let reader = BufReader::new(File::open(path)?);
            serde_json::from_reader(reader)
                .with_context(|| format!("Invalid metadata JSON in {}", path.display()))?
        }
    };

    info!("Loaded {} knowledge records from {}", records.len(), path.display());
    Ok(records)
}

/// Writes records as JSON Lines (used by tests and tooling)
pub fn write_records_jsonl<P: AsRef<Path>>(path: P, records: &[KnowledgeRecord]) -> Result<()> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    std::fs::write(path.as_ref(), out)
        .with_context(|| format!("Failed to write {}", path.as_ref().display()))
}

/// Vector index and record table, validated to be row-aligned
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    index: VectorIndex,
    records: Arc<Vec<KnowledgeRecord>>,
}

impl KnowledgeBase {
    /// Pairs an index with its records
    ///
    /// # Errors
    /// Returns [`RagError::Configuration`] if the two differ in length.
    pub fn new(index: VectorIndex, records: Vec<KnowledgeRecord>) -> Result<Self, RagError> {
        if index.len() != records.len() {
            return Err(RagError::Configuration(format!(
                "Knowledge base misaligned: index has {} vectors but metadata has {} records",
                index.len(),
                records.len()
            )));
        }
        Ok(Self {
            index,
            records: Arc::new(records),
        })
    }

    /// Knowledge base with no rows
    pub fn empty(metric: DistanceMetric, dimension: usize) -> Result<Self, RagError> {
        let index = VectorIndex::new(metric, dimension, vec![]).map_err(RagError::configuration)?;
        Self::new(index, vec![])
    }

    /// Loads the index file and metadata table from disk
    pub fn load<P: AsRef<Path>>(
        index_path: P,
        metadata_path: P,
        backend: SearchBackend,
    ) -> Result<Self, RagError> {
        let index = VectorIndex::load(index_path.as_ref())
            .and_then(|index| index.with_backend(backend))
            .map_err(|e| {
                RagError::Configuration(format!(
                    "Failed to load vector index {}: {}",
                    index_path.as_ref().display(),
                    e
                ))
            })?;
        let records = load_records(metadata_path.as_ref())
            .map_err(|e| RagError::Configuration(format!("{:#}", e)))?;

        let kb = Self::new(index, records)?;
        info!(
            "Knowledge base ready: {} records, {}D, metric {}, backend {:?}",
            kb.len(),
            kb.dimension(),
            kb.metric(),
            kb.index.backend()
        );
        Ok(kb)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn records(&self) -> &[KnowledgeRecord] {
        &self.records
    }

    pub fn record(&self, position: usize) -> Option<&KnowledgeRecord> {
        self.records.get(position)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }
}
