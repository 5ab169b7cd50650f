//! Per-table field mappings and bulk propagation.
//!
//! A mapping links one source column (for example `title_fr`) to the
//! language-suffixed columns it should be translated into (`title_en`,
//! `title_ar`). `bulk_translate_table` fills every empty target column from
//! its source and never overwrites a populated one, so re-runs only do the
//! missing work.

use crate::error::TranslationError;
use crate::language;
use crate::models::TranslationRequest;
use crate::retry::{with_retry, with_retry_if, RetryConfig};
use crate::service::TranslationService;
use crate::storage::{self, RowStore};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Work items sent to the translator per round
const BULK_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMappingConfig {
    /// Column holding the source text; defaults to the mapping's field name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_field: Option<String>,
    #[serde(default)]
    pub target_fields: Vec<String>,
    #[serde(default = "default_auto_translate")]
    pub auto_translate: bool,
    /// Overrides the language derived from the source field's suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

fn default_auto_translate() -> bool {
    true
}

/// `{tableName: {fieldName: config}}`
pub type MappingTable = BTreeMap<String, BTreeMap<String, FieldMappingConfig>>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTranslateOptions {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub max_rows: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    pub field: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BulkReport {
    pub success: bool,
    pub translated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub details: Vec<BulkDetail>,
}

/// One empty target cell waiting for a translation
struct Pending {
    row_id: String,
    field: String,
    request: TranslationRequest,
}

pub struct FieldMappingService {
    mappings: RwLock<MappingTable>,
    persist_path: Option<PathBuf>,
    translator: Arc<TranslationService>,
    store: Arc<dyn RowStore>,
}

impl FieldMappingService {
    pub fn new(translator: Arc<TranslationService>, store: Arc<dyn RowStore>) -> Self {
        Self {
            mappings: RwLock::new(MappingTable::new()),
            persist_path: None,
            translator,
            store,
        }
    }

    /// Back the mappings with a JSON file, loading it if it exists.
    pub async fn with_persistence(mut self, path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read field mappings from {}", path.display()))?;
            let loaded: MappingTable = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid field mappings file {}", path.display()))?;
            let count: usize = loaded.values().map(BTreeMap::len).sum();
            info!("Loaded {} field mapping(s) from {}", count, path.display());
            self.mappings = RwLock::new(loaded);
        }
        self.persist_path = Some(path);
        Ok(self)
    }

    /// Upsert the mapping for `(table_name, field_name)`; last write wins.
    pub async fn set_field_mapping(
        &self,
        table_name: &str,
        field_name: &str,
        config: FieldMappingConfig,
    ) -> Result<(), TranslationError> {
        validate_name("tableName", table_name)?;
        validate_name("fieldName", field_name)?;
        if let Some(source) = &config.source_field {
            validate_name("sourceField", source)?;
        }
        if config.target_fields.is_empty() {
            return Err(TranslationError::validation(
                "config.targetFields must list at least one field",
            ));
        }
        for target in &config.target_fields {
            validate_name("targetFields", target)?;
        }
        if let Some(lang) = &config.source_language {
            language::normalize_target(lang)?;
        }

        let mut mappings = self.mappings.write().await;
        let mut updated = mappings.clone();
        updated
            .entry(table_name.to_string())
            .or_default()
            .insert(field_name.to_string(), config);
        self.persist(&updated).await?;
        *mappings = updated;

        info!("Field mapping set for {}.{}", table_name, field_name);
        Ok(())
    }

    /// Delete a mapping. Returns whether one existed; absence is not an error.
    pub async fn remove_field_mapping(
        &self,
        table_name: &str,
        field_name: &str,
    ) -> Result<bool, TranslationError> {
        let mut mappings = self.mappings.write().await;
        let mut updated = mappings.clone();

        let removed = match updated.get_mut(table_name) {
            Some(fields) => {
                let removed = fields.remove(field_name).is_some();
                if fields.is_empty() {
                    updated.remove(table_name);
                }
                removed
            }
            None => false,
        };
        if !removed {
            return Ok(false);
        }

        self.persist(&updated).await?;
        *mappings = updated;
        info!("Field mapping removed for {}.{}", table_name, field_name);
        Ok(true)
    }

    pub async fn get_all_mappings(&self) -> MappingTable {
        self.mappings.read().await.clone()
    }

    async fn persist(&self, mappings: &MappingTable) -> Result<(), TranslationError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        with_retry(&RetryConfig::storage_write(), "Persist field mappings", || {
            write_atomically(path, mappings)
        })
        .await
        .map_err(TranslationError::from)
    }

    /// Fill empty target fields of `table_name` from every auto-translate
    /// mapping whose source language is `source_language`.
    pub async fn bulk_translate_table(
        &self,
        table_name: &str,
        source_language: &str,
        options: &BulkTranslateOptions,
    ) -> Result<BulkReport, TranslationError> {
        if table_name.trim().is_empty() {
            return Err(TranslationError::validation("tableName is required"));
        }
        let source_language = language::normalize_target(source_language)?;
        let provider = options
            .provider
            .as_deref()
            .map(|p| self.translator.resolve_provider(p))
            .transpose()?;

        let selected: Vec<(String, FieldMappingConfig)> = self
            .mappings
            .read()
            .await
            .get(table_name)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(field, config)| {
                        config.auto_translate
                            && mapping_language(field, config)
                                .map_or(true, |lang| lang == source_language)
                    })
                    .map(|(field, config)| (field.clone(), config.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut report = BulkReport {
            success: true,
            ..Default::default()
        };
        if selected.is_empty() {
            info!(
                "No auto-translate mappings for {} in '{}'; nothing to do",
                table_name, source_language
            );
            return Ok(report);
        }

        let columns: Vec<String> = selected
            .iter()
            .flat_map(|(field, config)| {
                std::iter::once(source_field(field, config).to_string())
                    .chain(config.target_fields.iter().cloned())
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let rows = with_retry_if(
            &RetryConfig::storage_read(),
            "Fetch rows",
            || self.store.fetch_rows(table_name, &columns, options.max_rows),
            storage::is_transient,
        )
        .await?;
        info!(
            "Bulk translating {} row(s) of {} from '{}'",
            rows.len(),
            table_name,
            source_language
        );

        let mut pending = Vec::new();
        for row in &rows {
            for (field, config) in &selected {
                let source = source_field(field, config);
                let source_text = row.text(source);

                for target in &config.target_fields {
                    if row.text(target).is_some() {
                        report.skipped += 1;
                        continue;
                    }
                    let Some(text) = source_text else {
                        report.skipped += 1;
                        continue;
                    };
                    let Some(target_lang) = language::field_language(target) else {
                        report.failed += 1;
                        report.details.push(BulkDetail {
                            row_id: Some(row.id.clone()),
                            field: target.clone(),
                            error: format!("Cannot derive a language from field '{}'", target),
                        });
                        continue;
                    };
                    pending.push(Pending {
                        row_id: row.id.clone(),
                        field: target.clone(),
                        request: TranslationRequest::new(text, &source_language, &target_lang),
                    });
                }
            }
        }

        for chunk in pending.chunks(BULK_CHUNK_SIZE) {
            let requests: Vec<TranslationRequest> =
                chunk.iter().map(|p| p.request.clone()).collect();
            let outcomes = self
                .translator
                .translate_batch_internal(&requests, provider.as_deref())
                .await;

            for (item, outcome) in chunk.iter().zip(outcomes) {
                let result = match outcome {
                    Ok(result) => result,
                    Err(e) => {
                        report.failed += 1;
                        report.details.push(BulkDetail {
                            row_id: Some(item.row_id.clone()),
                            field: item.field.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                let write = with_retry_if(
                    &RetryConfig::storage_write(),
                    "Write translated field",
                    || {
                        self.store.write_field(
                            table_name,
                            &item.row_id,
                            &item.field,
                            &result.translated_text,
                        )
                    },
                    storage::is_transient,
                )
                .await;

                match write {
                    Ok(true) => report.translated += 1,
                    // Filled concurrently since we read it
                    Ok(false) => report.skipped += 1,
                    Err(e) => {
                        warn!(
                            "Failed to write {}.{} for row {}: {:#}",
                            table_name, item.field, item.row_id, e
                        );
                        report.failed += 1;
                        report.details.push(BulkDetail {
                            row_id: Some(item.row_id.clone()),
                            field: item.field.clone(),
                            error: format!("{:#}", e),
                        });
                    }
                }
            }
        }

        report.success = report.failed == 0;
        info!(
            "Bulk translate {}: {} translated, {} skipped, {} failed",
            table_name, report.translated, report.skipped, report.failed
        );
        Ok(report)
    }
}

fn source_field<'a>(field: &'a str, config: &'a FieldMappingConfig) -> &'a str {
    config.source_field.as_deref().unwrap_or(field)
}

/// Declared source language, else the source field's suffix
fn mapping_language(field: &str, config: &FieldMappingConfig) -> Option<String> {
    config
        .source_language
        .as_deref()
        .and_then(|l| language::normalize_target(l).ok())
        .or_else(|| language::field_language(source_field(field, config)))
}

fn validate_name(label: &str, value: &str) -> Result<(), TranslationError> {
    if value.trim().is_empty() {
        return Err(TranslationError::validation(format!("{} is required", label)));
    }
    storage::validate_identifier(value)
        .map(|_| ())
        .map_err(|e| TranslationError::validation(format!("{}: {}", label, e)))
}

/// Write through a sibling temp file so a crash never leaves half a file
async fn write_atomically(path: &Path, mappings: &MappingTable) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(mappings).context("Failed to serialize field mappings")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    debug!("Persisted field mappings to {}", path.display());
    Ok(())
}
