//! Schematic Project Snapshot
//!
//! A serde description of a hierarchical schematic: sheet files, the sheet
//! instances linking them, symbols with per-occurrence reference data and
//! the unit counts of their library symbols.
//!
//! The same sheet file may be instantiated several times; every occurrence
//! has its own path (`/`, `/<uuid>`, `/<uuid>/<uuid>`) and its own sheet
//! number, and each symbol keeps one reference per path.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AnnotateOptions, RefdesError};
use crate::list::ReferenceList;
use crate::reference::{Position, Reference};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// File name of the top-level sheet
    pub root_sheet: String,
    #[serde(default)]
    pub sheets: Vec<SheetFile>,
    #[serde(default)]
    pub libraries: Vec<LibSymbol>,
    /// Annotation settings stored with the project
    #[serde(default)]
    pub settings: AnnotateOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetFile {
    pub file: String,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub children: Vec<SheetInstance>,
}

/// A sheet symbol placing `file` inside its parent sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetInstance {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibSymbol {
    pub lib_id: String,
    #[serde(default = "default_unit_count")]
    pub unit_count: i32,
    #[serde(default)]
    pub power: bool,
}

fn default_unit_count() -> i32 {
    1
}

fn default_unit() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub uuid: Uuid,
    pub lib_id: String,
    /// Reference used by occurrences without instance data
    #[serde(default)]
    pub reference: String,
    #[serde(default = "default_unit")]
    pub unit: i32,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub footprint: String,
    #[serde(default)]
    pub position: Position,
    /// Sheet path -> reference data of that occurrence
    #[serde(default)]
    pub instances: BTreeMap<String, SymbolInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInstance {
    pub reference: String,
    #[serde(default = "default_unit")]
    pub unit: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetOccurrence {
    pub path: String,
    pub sheet_number: i32,
    pub file: String,
}

/// Item name of a library id: `Device:R` -> `R`
pub fn lib_item_name(lib_id: &str) -> &str {
    lib_id.rsplit_once(':').map(|(_, name)| name).unwrap_or(lib_id)
}

impl Project {
    pub fn new(name: impl Into<String>, root_sheet: impl Into<String>) -> Self {
        let root_sheet = root_sheet.into();
        Self {
            name: name.into(),
            sheets: vec![SheetFile {
                file: root_sheet.clone(),
                ..Default::default()
            }],
            root_sheet,
            libraries: Vec::new(),
            settings: AnnotateOptions::default(),
            annotated_at: None,
        }
    }

    pub fn sheet(&self, file: &str) -> Option<&SheetFile> {
        self.sheets.iter().find(|s| s.file == file)
    }

    pub fn sheet_mut(&mut self, file: &str) -> Option<&mut SheetFile> {
        self.sheets.iter_mut().find(|s| s.file == file)
    }

    pub fn library(&self, lib_id: &str) -> Option<&LibSymbol> {
        self.libraries.iter().find(|l| l.lib_id == lib_id)
    }

    /// Walk the sheet hierarchy depth first. The root is `/` with sheet
    /// number 1; children follow in the order they were placed.
    pub fn sheet_occurrences(&self) -> Result<Vec<SheetOccurrence>, RefdesError> {
        let mut graph: DiGraph<&str, &SheetInstance> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for sheet in &self.sheets {
            nodes
                .entry(sheet.file.as_str())
                .or_insert_with(|| graph.add_node(sheet.file.as_str()));
        }

        let root = *nodes
            .get(self.root_sheet.as_str())
            .ok_or_else(|| RefdesError::MissingSheet(self.root_sheet.clone()))?;

        for sheet in &self.sheets {
            let parent = nodes[sheet.file.as_str()];
            for child in &sheet.children {
                let target = *nodes
                    .get(child.file.as_str())
                    .ok_or_else(|| RefdesError::MissingSheet(child.file.clone()))?;
                graph.add_edge(parent, target, child);
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(RefdesError::RecursiveSheet(graph[cycle.node_id()].to_string()));
        }

        let mut occurrences = Vec::new();
        walk_sheets(&graph, root, "/".to_string(), &mut occurrences);
        Ok(occurrences)
    }

    /// Flatten the hierarchy into one reference per symbol occurrence.
    ///
    /// Power symbols are skipped unless `include_power` is set.
    pub fn build_reference_list(&self, include_power: bool) -> Result<ReferenceList, RefdesError> {
        let mut list = ReferenceList::new();

        for occurrence in self.sheet_occurrences()? {
            let sheet = self
                .sheet(&occurrence.file)
                .ok_or_else(|| RefdesError::MissingSheet(occurrence.file.clone()))?;

            for symbol in &sheet.symbols {
                let lib = self.library(&symbol.lib_id);
                let instance = symbol.instances.get(&occurrence.path);

                let reference = instance
                    .map(|i| i.reference.clone())
                    .unwrap_or_else(|| symbol.reference.clone());

                let is_power = lib.map(|l| l.power).unwrap_or(false) || reference.starts_with('#');
                if is_power && !include_power {
                    continue;
                }

                let unit_count = match lib {
                    Some(lib) => lib.unit_count.max(1),
                    None => {
                        tracing::warn!(
                            "Library symbol {} not found for {}, assuming a single unit",
                            symbol.lib_id,
                            reference
                        );
                        1
                    }
                };

                let unit = instance.map(|i| i.unit).unwrap_or(symbol.unit);

                list.add_item(
                    Reference::new(reference, symbol.uuid)
                        .with_value(symbol.value.clone())
                        .with_footprint(symbol.footprint.clone())
                        .with_lib_name(lib_item_name(&symbol.lib_id))
                        .with_unit(unit, unit_count)
                        .with_position(symbol.position.x, symbol.position.y)
                        .with_sheet(occurrence.sheet_number, occurrence.path.clone()),
                );
            }
        }

        tracing::debug!("Flattened {} into {} references", self.name, list.len());
        Ok(list)
    }

    /// Store reference and unit of every record on its symbol occurrence.
    pub fn apply_references(&mut self, list: &ReferenceList) -> Result<usize, RefdesError> {
        let files: HashMap<String, String> = self
            .sheet_occurrences()?
            .into_iter()
            .map(|o| (o.path, o.file))
            .collect();

        let mut updated = 0;
        for r in list {
            let file = files
                .get(&r.sheet_path)
                .ok_or_else(|| RefdesError::UnknownSheetPath(r.sheet_path.clone()))?;

            let sheet = self
                .sheet_mut(file)
                .ok_or_else(|| RefdesError::MissingSheet(file.clone()))?;

            let Some(symbol) = sheet.symbols.iter_mut().find(|s| s.uuid == r.uuid) else {
                tracing::warn!("Symbol {} not found on sheet {}", r.uuid, file);
                continue;
            };

            symbol.instances.insert(
                r.sheet_path.clone(),
                SymbolInstance {
                    reference: r.full_ref(),
                    unit: r.unit,
                },
            );
            updated += 1;
        }

        self.annotated_at = Some(Utc::now());
        Ok(updated)
    }

    /// Reference data of a symbol on one sheet occurrence.
    pub fn instance(&self, uuid: Uuid, path: &str) -> Option<&SymbolInstance> {
        self.sheets
            .iter()
            .flat_map(|s| s.symbols.iter())
            .find(|s| s.uuid == uuid)
            .and_then(|s| s.instances.get(path))
    }
}

fn walk_sheets(
    graph: &DiGraph<&str, &SheetInstance>,
    node: NodeIndex,
    path: String,
    occurrences: &mut Vec<SheetOccurrence>,
) {
    let sheet_number = occurrences.len() as i32 + 1;
    occurrences.push(SheetOccurrence {
        path: path.clone(),
        sheet_number,
        file: graph[node].to_string(),
    });

    // petgraph yields edges newest first
    let mut edges: Vec<_> = graph.edges(node).collect();
    edges.sort_by_key(|e| e.id());

    for edge in edges {
        let child_path = if path == "/" {
            format!("/{}", edge.weight().uuid)
        } else {
            format!("{}/{}", path, edge.weight().uuid)
        };
        walk_sheets(graph, edge.target(), child_path, occurrences);
    }
}
