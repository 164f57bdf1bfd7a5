// perilgrid-core/src/runtime/lineage.rs
// ============================================================================
// Module: Perilgrid Lineage Builder
// Description: Read-only DAG traversal over entity references.
// Purpose: Produce nodes and edges for auditing artifact provenance.
// Dependencies: crate::{core, interfaces}, serde
// ============================================================================

//! ## Overview
//! Lineage walks the foreign-key references of an entity with an explicit
//! worklist (the entity graph is a DAG, so no cycle detection beyond the
//! visited set is needed) and emits `{nodes, edges}` with `DEPENDS_ON` and
//! `PRODUCED_BY` relations. An exposure-version root additionally gathers
//! the results that depend on it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::DriftRunId;
use crate::core::ExposureVersionId;
use crate::core::HazardDatasetVersionId;
use crate::core::OverlayResultId;
use crate::core::RollupResultId;
use crate::core::RunId;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::interfaces::Store;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Graph Types
// ============================================================================

/// Entity kinds addressable as lineage roots and nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageEntityType {
    /// Exposure version.
    ExposureVersion,
    /// Hazard dataset.
    HazardDataset,
    /// Hazard dataset version.
    HazardDatasetVersion,
    /// Hazard overlay result.
    HazardOverlayResult,
    /// Rollup configuration.
    RollupConfig,
    /// Rollup result.
    RollupResult,
    /// Threshold rule.
    ThresholdRule,
    /// Breach.
    Breach,
    /// Drift run.
    DriftRun,
    /// Orchestration run.
    Run,
}

impl LineageEntityType {
    /// Returns the stable wire string for this entity type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExposureVersion => "exposure_version",
            Self::HazardDataset => "hazard_dataset",
            Self::HazardDatasetVersion => "hazard_dataset_version",
            Self::HazardOverlayResult => "hazard_overlay_result",
            Self::RollupConfig => "rollup_config",
            Self::RollupResult => "rollup_result",
            Self::ThresholdRule => "threshold_rule",
            Self::Breach => "breach",
            Self::DriftRun => "drift_run",
            Self::Run => "run",
        }
    }

    /// Parses a stable wire string into an entity type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exposure_version" => Some(Self::ExposureVersion),
            "hazard_dataset" => Some(Self::HazardDataset),
            "hazard_dataset_version" => Some(Self::HazardDatasetVersion),
            "hazard_overlay_result" => Some(Self::HazardOverlayResult),
            "rollup_config" => Some(Self::RollupConfig),
            "rollup_result" => Some(Self::RollupResult),
            "threshold_rule" => Some(Self::ThresholdRule),
            "breach" => Some(Self::Breach),
            "drift_run" => Some(Self::DriftRun),
            "run" => Some(Self::Run),
            _ => None,
        }
    }
}

/// Edge relation in the lineage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineageRelation {
    /// The `from` entity depends on the `to` entity.
    DependsOn,
    /// The `from` entity was produced by the `to` run.
    ProducedBy,
}

/// One lineage node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    /// Stable node key `type:id`.
    pub key: String,
    /// Entity type.
    pub entity_type: LineageEntityType,
    /// Entity identifier.
    pub id: i64,
    /// Display label, when known.
    pub label: Option<String>,
    /// Artifact checksum, when the entity carries one.
    pub checksum: Option<String>,
    /// Creation time, when known.
    pub created_at: Option<Timestamp>,
}

/// One lineage edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    /// Source node key.
    pub from: String,
    /// Target node key.
    pub to: String,
    /// Relation kind.
    pub relation: LineageRelation,
}

/// Full lineage graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageGraph {
    /// Root node key.
    pub root: String,
    /// Nodes, deduplicated by key.
    pub nodes: Vec<LineageNode>,
    /// Edges in traversal order.
    pub edges: Vec<LineageEdge>,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Accumulating graph state during traversal.
struct GraphBuilder {
    /// Emitted nodes.
    nodes: Vec<LineageNode>,
    /// Keys already emitted.
    seen: BTreeSet<String>,
    /// Emitted edges.
    edges: Vec<LineageEdge>,
}

impl GraphBuilder {
    /// Creates an empty builder.
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            seen: BTreeSet::new(),
            edges: Vec::new(),
        }
    }

    /// Builds the stable node key.
    fn key(entity_type: LineageEntityType, id: i64) -> String {
        format!("{}:{id}", entity_type.as_str())
    }

    /// Adds a node unless already present; returns its key.
    fn add_node(
        &mut self,
        entity_type: LineageEntityType,
        id: i64,
        label: Option<String>,
        checksum: Option<String>,
        created_at: Option<Timestamp>,
    ) -> String {
        let key = Self::key(entity_type, id);
        if self.seen.insert(key.clone()) {
            self.nodes.push(LineageNode {
                key: key.clone(),
                entity_type,
                id,
                label,
                checksum,
                created_at,
            });
        }
        key
    }

    /// Adds an edge.
    fn add_edge(&mut self, from: &str, to: &str, relation: LineageRelation) {
        self.edges.push(LineageEdge {
            from: from.to_string(),
            to: to.to_string(),
            relation,
        });
    }
}

/// Worklist entry: an entity whose references still need expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WorkItem {
    /// Entity type.
    entity_type: LineageEntityType,
    /// Entity identifier.
    id: i64,
    /// True only for the traversal root.
    is_root: bool,
}

/// Builds the lineage graph for an entity, returning `None` when the root
/// does not exist within the tenant.
///
/// # Errors
///
/// Returns [`StoreError`] when a lookup fails.
#[allow(
    clippy::too_many_lines,
    reason = "One linear expansion arm per entity type keeps the walk auditable."
)]
pub fn build_lineage(
    store: &dyn Store,
    tenant_id: &TenantId,
    entity_type: LineageEntityType,
    entity_id: i64,
) -> Result<Option<LineageGraph>, StoreError> {
    let mut builder = GraphBuilder::new();
    let mut worklist = vec![WorkItem {
        entity_type,
        id: entity_id,
        is_root: true,
    }];
    let mut expanded = BTreeSet::new();
    let mut root_key = None;

    while let Some(item) = worklist.pop() {
        if !expanded.insert((item.entity_type, item.id)) {
            continue;
        }
        let node_key = match item.entity_type {
            LineageEntityType::RollupResult => {
                let Some(result) =
                    store.rollup_result(tenant_id, RollupResultId::new(item.id))?
                else {
                    if item.is_root {
                        return Ok(None);
                    }
                    continue;
                };
                let key = builder.add_node(
                    item.entity_type,
                    item.id,
                    None,
                    result.checksum.as_ref().map(|digest| digest.value.clone()),
                    Some(result.created_at),
                );
                if let Some(config) =
                    store.rollup_config(tenant_id, result.rollup_config_id)?
                {
                    let config_key = builder.add_node(
                        LineageEntityType::RollupConfig,
                        config.id.value(),
                        Some(config.name),
                        None,
                        Some(config.created_at),
                    );
                    builder.add_edge(&key, &config_key, LineageRelation::DependsOn);
                }
                let version_key = builder.add_node(
                    LineageEntityType::ExposureVersion,
                    result.exposure_version_id.value(),
                    None,
                    None,
                    None,
                );
                builder.add_edge(&key, &version_key, LineageRelation::DependsOn);
                for overlay_id in &result.overlay_result_ids {
                    let overlay_key = builder.add_node(
                        LineageEntityType::HazardOverlayResult,
                        overlay_id.value(),
                        None,
                        None,
                        None,
                    );
                    builder.add_edge(&key, &overlay_key, LineageRelation::DependsOn);
                    worklist.push(WorkItem {
                        entity_type: LineageEntityType::HazardOverlayResult,
                        id: overlay_id.value(),
                        is_root: false,
                    });
                }
                if let Some(run_id) = result.run_id {
                    let run_key = run_node(store, tenant_id, &mut builder, run_id)?;
                    builder.add_edge(&key, &run_key, LineageRelation::ProducedBy);
                }
                key
            }
            LineageEntityType::HazardOverlayResult => {
                let Some(overlay) =
                    store.overlay_result(tenant_id, OverlayResultId::new(item.id))?
                else {
                    if item.is_root {
                        return Ok(None);
                    }
                    continue;
                };
                let key = builder.add_node(
                    item.entity_type,
                    item.id,
                    None,
                    None,
                    Some(overlay.created_at),
                );
                let version_key = builder.add_node(
                    LineageEntityType::ExposureVersion,
                    overlay.exposure_version_id.value(),
                    None,
                    None,
                    None,
                );
                builder.add_edge(&key, &version_key, LineageRelation::DependsOn);
                let dataset_version_key = builder.add_node(
                    LineageEntityType::HazardDatasetVersion,
                    overlay.dataset_version_id.value(),
                    None,
                    None,
                    None,
                );
                builder.add_edge(&key, &dataset_version_key, LineageRelation::DependsOn);
                worklist.push(WorkItem {
                    entity_type: LineageEntityType::HazardDatasetVersion,
                    id: overlay.dataset_version_id.value(),
                    is_root: false,
                });
                if let Some(run_id) = overlay.run_id {
                    let run_key = run_node(store, tenant_id, &mut builder, run_id)?;
                    builder.add_edge(&key, &run_key, LineageRelation::ProducedBy);
                }
                key
            }
            LineageEntityType::HazardDatasetVersion => {
                let Some(version) = store
                    .hazard_dataset_version(tenant_id, HazardDatasetVersionId::new(item.id))?
                else {
                    if item.is_root {
                        return Ok(None);
                    }
                    continue;
                };
                let key = builder.add_node(
                    item.entity_type,
                    item.id,
                    Some(version.version_label.clone()),
                    Some(version.checksum.value.clone()),
                    Some(version.created_at),
                );
                if let Some(dataset) =
                    store.hazard_dataset(tenant_id, version.dataset_id)?
                {
                    let dataset_key = builder.add_node(
                        LineageEntityType::HazardDataset,
                        dataset.id.value(),
                        Some(dataset.name),
                        None,
                        Some(dataset.created_at),
                    );
                    builder.add_edge(&key, &dataset_key, LineageRelation::DependsOn);
                }
                key
            }
            LineageEntityType::Breach => {
                let Some(breach) =
                    store.breach(tenant_id, crate::core::BreachId::new(item.id))?
                else {
                    if item.is_root {
                        return Ok(None);
                    }
                    continue;
                };
                let key = builder.add_node(
                    item.entity_type,
                    item.id,
                    None,
                    None,
                    Some(breach.first_seen_at),
                );
                let rule_key = builder.add_node(
                    LineageEntityType::ThresholdRule,
                    breach.threshold_rule_id.value(),
                    None,
                    None,
                    None,
                );
                builder.add_edge(&key, &rule_key, LineageRelation::DependsOn);
                let rollup_key = builder.add_node(
                    LineageEntityType::RollupResult,
                    breach.rollup_result_id.value(),
                    None,
                    None,
                    None,
                );
                builder.add_edge(&key, &rollup_key, LineageRelation::DependsOn);
                worklist.push(WorkItem {
                    entity_type: LineageEntityType::RollupResult,
                    id: breach.rollup_result_id.value(),
                    is_root: false,
                });
                let version_key = builder.add_node(
                    LineageEntityType::ExposureVersion,
                    breach.exposure_version_id.value(),
                    None,
                    None,
                    None,
                );
                builder.add_edge(&key, &version_key, LineageRelation::DependsOn);
                if let Some(run_id) = breach.last_eval_run_id {
                    let run_key = run_node(store, tenant_id, &mut builder, run_id)?;
                    builder.add_edge(&key, &run_key, LineageRelation::ProducedBy);
                }
                key
            }
            LineageEntityType::DriftRun => {
                let Some(drift) = store.drift_run(tenant_id, DriftRunId::new(item.id))?
                else {
                    if item.is_root {
                        return Ok(None);
                    }
                    continue;
                };
                let key = builder.add_node(
                    item.entity_type,
                    item.id,
                    None,
                    drift.checksum.as_ref().map(|digest| digest.value.clone()),
                    Some(drift.created_at),
                );
                for version_id in
                    [drift.exposure_version_a_id, drift.exposure_version_b_id]
                {
                    let version_key = builder.add_node(
                        LineageEntityType::ExposureVersion,
                        version_id.value(),
                        None,
                        None,
                        None,
                    );
                    builder.add_edge(&key, &version_key, LineageRelation::DependsOn);
                }
                if let Some(run_id) = drift.run_id {
                    let run_key = run_node(store, tenant_id, &mut builder, run_id)?;
                    builder.add_edge(&key, &run_key, LineageRelation::ProducedBy);
                }
                key
            }
            LineageEntityType::ExposureVersion => {
                let Some(version) =
                    store.exposure_version(tenant_id, ExposureVersionId::new(item.id))?
                else {
                    if item.is_root {
                        return Ok(None);
                    }
                    continue;
                };
                let key = builder.add_node(
                    item.entity_type,
                    item.id,
                    Some(version.name.clone()),
                    None,
                    Some(version.created_at),
                );
                if item.is_root {
                    // Root versions gather the results that depend on them.
                    for result in store.rollup_results_for_version(
                        tenant_id,
                        version.id,
                    )? {
                        let result_key = builder.add_node(
                            LineageEntityType::RollupResult,
                            result.id.value(),
                            None,
                            result.checksum.as_ref().map(|digest| digest.value.clone()),
                            Some(result.created_at),
                        );
                        builder.add_edge(&result_key, &key, LineageRelation::DependsOn);
                    }
                    for overlay in store.overlay_results_for_version(
                        tenant_id,
                        version.id,
                    )? {
                        let overlay_key = builder.add_node(
                            LineageEntityType::HazardOverlayResult,
                            overlay.id.value(),
                            None,
                            None,
                            Some(overlay.created_at),
                        );
                        builder.add_edge(&overlay_key, &key, LineageRelation::DependsOn);
                    }
                    for drift in store.drift_runs_for_version(tenant_id, version.id)? {
                        let drift_key = builder.add_node(
                            LineageEntityType::DriftRun,
                            drift.id.value(),
                            None,
                            drift.checksum.as_ref().map(|digest| digest.value.clone()),
                            Some(drift.created_at),
                        );
                        builder.add_edge(&drift_key, &key, LineageRelation::DependsOn);
                    }
                }
                key
            }
            LineageEntityType::HazardDataset
            | LineageEntityType::RollupConfig
            | LineageEntityType::ThresholdRule
            | LineageEntityType::Run => {
                // Leaf entity types carry no outgoing references.
                builder.add_node(item.entity_type, item.id, None, None, None)
            }
        };
        if item.is_root {
            root_key = Some(node_key);
        }
    }

    Ok(root_key.map(|root| LineageGraph {
        root,
        nodes: builder.nodes,
        edges: builder.edges,
    }))
}

/// Adds a run node with its creation time when the run is loadable.
fn run_node(
    store: &dyn Store,
    tenant_id: &TenantId,
    builder: &mut GraphBuilder,
    run_id: RunId,
) -> Result<String, StoreError> {
    let created_at = store.run(tenant_id, run_id)?.map(|run| run.created_at);
    Ok(builder.add_node(LineageEntityType::Run, run_id.value(), None, None, created_at))
}
