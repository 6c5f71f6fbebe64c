use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use forge_core::{ForgeError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{static_dependencies, ArtifactLink, ArtifactNode, LinkType, StalenessReport, UpstreamChange};

#[derive(Debug, Default, Serialize, Deserialize)]
struct GraphSnapshot {
    nodes: HashMap<String, ArtifactNode>,
    #[serde(default)]
    links: Vec<ArtifactLink>,
}

/// In-memory artifact dependency graph, persisted to a single JSON file via
/// write-to-temp-then-rename.
pub struct ArtifactGraph {
    nodes: RwLock<HashMap<String, ArtifactNode>>,
    links: RwLock<Vec<ArtifactLink>>,
    path: Option<PathBuf>,
}

impl ArtifactGraph {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            links: RwLock::new(Vec::new()),
            path: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                nodes: RwLock::new(HashMap::new()),
                links: RwLock::new(Vec::new()),
                path: Some(path),
            });
        }
        let content = std::fs::read_to_string(&path)?;
        let snapshot: GraphSnapshot = serde_json::from_str(&content)?;
        Ok(Self {
            nodes: RwLock::new(snapshot.nodes),
            links: RwLock::new(snapshot.links),
            path: Some(path),
        })
    }

    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        let snapshot = GraphSnapshot {
            nodes: self.nodes.read().clone(),
            links: self.links.read().clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Records a link between two artifact ids. Idempotent on `(source_id,
    /// target_id)`: a second call for the same pair is a no-op regardless of
    /// `link_type`, matching the single edge §4.8 models per ordered pair.
    pub fn add_link(
        &self,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        link_type: LinkType,
    ) -> Result<()> {
        let source_id = source_id.into();
        let target_id = target_id.into();
        {
            let mut links = self.links.write();
            if links
                .iter()
                .any(|l| l.source_id == source_id && l.target_id == target_id)
            {
                return Ok(());
            }
            links.push(ArtifactLink {
                source_id,
                target_id,
                link_type,
            });
        }
        self.persist()
    }

    pub fn links(&self) -> Vec<ArtifactLink> {
        self.links.read().clone()
    }

    /// Registers `node`. If `node.id` is new it is inserted as version 1;
    /// if a node with that id already exists and the content hash is
    /// unchanged, the existing node is left untouched (returned as-is); if
    /// the hash changed, version is incremented and `updated_at` advanced
    /// over the existing node rather than trusting whatever `node` carried
    /// in those fields, since a caller only ever constructs a fresh node
    /// with `ArtifactNode::new`'s version-1 defaults.
    pub fn register(&self, mut node: ArtifactNode) -> Result<ArtifactNode> {
        let mut nodes = self.nodes.write();
        if let Some(existing) = nodes.get(&node.id) {
            if existing.content_hash == node.content_hash {
                return Ok(existing.clone());
            }
            node.version = existing.version + 1;
        }
        nodes.insert(node.id.clone(), node.clone());
        drop(nodes);
        self.persist()?;
        Ok(node)
    }

    /// Back-compat alias for call sites that don't need the returned node.
    pub fn upsert(&self, node: ArtifactNode) -> Result<()> {
        self.register(node).map(|_| ())
    }

    pub fn get(&self, id: &str) -> Option<ArtifactNode> {
        self.nodes.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.nodes.write().remove(id);
        self.persist()
    }

    /// `true` if any recorded source hash no longer matches the source's
    /// current content hash, or a source node has vanished entirely.
    pub fn is_stale(&self, id: &str) -> bool {
        let nodes = self.nodes.read();
        let Some(node) = nodes.get(id) else {
            return false;
        };
        for (source_id, recorded_hash) in &node.source_hashes {
            match nodes.get(source_id) {
                Some(source) if &source.content_hash == recorded_hash => continue,
                _ => return true,
            }
        }
        false
    }

    /// Full staleness diagnosis for `id`: which upstream sources changed
    /// (with their new `version`/`updated_at`), the earliest point that made
    /// `id` stale, and a plain-language recommendation. A missing node or a
    /// node with no out-of-sync sources reports fresh.
    pub fn check_staleness(&self, id: &str) -> StalenessReport {
        let nodes = self.nodes.read();
        let Some(node) = nodes.get(id) else {
            return StalenessReport::fresh();
        };

        let mut upstream_changes = Vec::new();
        let mut vanished = 0usize;
        for (source_id, recorded_hash) in &node.source_hashes {
            match nodes.get(source_id) {
                Some(source) if &source.content_hash != recorded_hash => {
                    upstream_changes.push(UpstreamChange {
                        id: source.id.clone(),
                        artifact_type: source.artifact_type.clone(),
                        updated_at: source.updated_at,
                        version: source.version,
                    });
                }
                Some(_) => {}
                None => vanished += 1,
            }
        }

        if upstream_changes.is_empty() && vanished == 0 {
            return StalenessReport::fresh();
        }

        let stale_since = upstream_changes.iter().map(|c| c.updated_at).min();
        let mut reason_parts = Vec::new();
        if !upstream_changes.is_empty() {
            let names = upstream_changes
                .iter()
                .map(|c| c.id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            reason_parts.push(format!(
                "{} upstream source(s) changed since generation: {names}",
                upstream_changes.len()
            ));
        }
        if vanished > 0 {
            reason_parts.push(format!("{vanished} recorded source(s) no longer exist"));
        }

        StalenessReport {
            is_stale: true,
            reason: Some(reason_parts.join("; ")),
            stale_since,
            upstream_changes,
            recommendation: Some(format!("regenerate '{id}' to incorporate the upstream changes")),
        }
    }

    /// Transitive closure of artifacts that depend on `id`, either through a
    /// recorded node edge or the static category-level dependency table.
    /// Tolerates cycles via a visited set.
    pub fn impacted_by(&self, id: &str) -> Vec<String> {
        let nodes = self.nodes.read();
        let mut visited = HashSet::new();
        let mut queue = vec![id.to_string()];
        let mut out = Vec::new();

        while let Some(current) = queue.pop() {
            for (candidate_id, candidate) in nodes.iter() {
                if candidate_id == &current || visited.contains(candidate_id) {
                    continue;
                }
                let depends_via_edge = candidate.source_ids.iter().any(|s| s == &current);
                let depends_via_static = nodes.get(&current).is_some_and(|cur| {
                    static_dependencies(&candidate.artifact_type).contains(&cur.artifact_type)
                });
                if depends_via_edge || depends_via_static {
                    visited.insert(candidate_id.clone());
                    out.push(candidate_id.clone());
                    queue.push(candidate_id.clone());
                }
            }
        }
        out
    }

    /// Same traversal as [`Self::impacted_by`] but tags each affected node
    /// with its BFS depth from `id` (1 = directly depends on `id`).
    pub fn impact_analysis(&self, id: &str) -> Vec<(String, usize)> {
        let nodes = self.nodes.read();
        let mut visited = HashSet::new();
        let mut queue = vec![(id.to_string(), 0usize)];
        let mut out = Vec::new();

        while let Some((current, depth)) = queue.pop() {
            for (candidate_id, candidate) in nodes.iter() {
                if candidate_id == &current || visited.contains(candidate_id) {
                    continue;
                }
                let depends_via_edge = candidate.source_ids.iter().any(|s| s == &current);
                let depends_via_static = nodes.get(&current).is_some_and(|cur| {
                    static_dependencies(&candidate.artifact_type).contains(&cur.artifact_type)
                });
                if depends_via_edge || depends_via_static {
                    visited.insert(candidate_id.clone());
                    out.push((candidate_id.clone(), depth + 1));
                    queue.push((candidate_id.clone(), depth + 1));
                }
            }
        }
        out
    }

    /// Full dependency forest (`root = None`) or the subtree rooted at one
    /// node. Roots of the forest are nodes with no recorded sources of
    /// their own (nothing upstream of them); everything else hangs off a
    /// root as a child of whatever it was generated from. A node already on
    /// the current path is tagged circular and not recursed into again.
    pub fn dependency_tree(&self, root: Option<&str>) -> Vec<DependencyTreeNode> {
        let nodes = self.nodes.read();
        let roots: Vec<String> = match root {
            Some(id) => vec![id.to_string()],
            None => nodes
                .values()
                .filter(|n| n.source_ids.is_empty())
                .map(|n| n.id.clone())
                .collect(),
        };

        roots
            .into_iter()
            .filter_map(|id| build_tree_node(&nodes, &id, &mut Vec::new()))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }
}

/// One node in a [`ArtifactGraph::dependency_tree`] result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyTreeNode {
    pub id: String,
    pub version: u32,
    pub is_stale: bool,
    pub circular: bool,
    pub children: Vec<DependencyTreeNode>,
}

fn build_tree_node(
    nodes: &HashMap<String, ArtifactNode>,
    id: &str,
    path: &mut Vec<String>,
) -> Option<DependencyTreeNode> {
    let node = nodes.get(id)?;

    if path.contains(&id.to_string()) {
        return Some(DependencyTreeNode {
            id: id.to_string(),
            version: node.version,
            is_stale: false,
            circular: true,
            children: Vec::new(),
        });
    }

    let is_stale = node.source_hashes.iter().any(|(source_id, recorded)| {
        !nodes
            .get(source_id)
            .is_some_and(|source| &source.content_hash == recorded)
    });

    path.push(id.to_string());
    let children = nodes
        .values()
        .filter(|n| n.source_ids.iter().any(|s| s == id))
        .filter_map(|n| build_tree_node(nodes, &n.id, path))
        .collect();
    path.pop();

    Some(DependencyTreeNode {
        id: id.to_string(),
        version: node.version,
        is_stale,
        circular: false,
        children,
    })
}

impl Default for ArtifactGraph {
    fn default() -> Self {
        Self::new()
    }
}

pub fn not_found(id: &str) -> ForgeError {
    ForgeError::NotFound(format!("artifact node '{}' not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ArtifactType;
    use std::collections::HashMap as Map;

    fn node(id: &str, hash: &str, sources: Vec<(&str, &str)>) -> ArtifactNode {
        ArtifactNode::new(
            id,
            ArtifactType::MermaidErd,
            hash,
            sources.iter().map(|(id, _)| id.to_string()).collect(),
            sources
                .into_iter()
                .map(|(id, h)| (id.to_string(), h.to_string()))
                .collect::<Map<_, _>>(),
        )
    }

    #[test]
    fn fresh_node_with_no_sources_is_never_stale() {
        let graph = ArtifactGraph::new();
        graph.upsert(node("a", "h1", vec![])).unwrap();
        assert!(!graph.is_stale("a"));
    }

    #[test]
    fn node_is_stale_when_source_hash_changed() {
        let graph = ArtifactGraph::new();
        graph.upsert(node("source", "h1", vec![])).unwrap();
        graph
            .upsert(node("derived", "h2", vec![("source", "h1")]))
            .unwrap();
        assert!(!graph.is_stale("derived"));

        graph.upsert(node("source", "h1-changed", vec![])).unwrap();
        assert!(graph.is_stale("derived"));
    }

    #[test]
    fn impacted_by_follows_recorded_edges() {
        let graph = ArtifactGraph::new();
        graph.upsert(node("source", "h1", vec![])).unwrap();
        graph
            .upsert(node("derived", "h2", vec![("source", "h1")]))
            .unwrap();
        let impacted = graph.impacted_by("source");
        assert_eq!(impacted, vec!["derived".to_string()]);
    }

    #[test]
    fn cycles_do_not_infinite_loop() {
        let graph = ArtifactGraph::new();
        graph.upsert(node("a", "h1", vec![("b", "h2")])).unwrap();
        graph.upsert(node("b", "h2", vec![("a", "h1")])).unwrap();
        let impacted = graph.impacted_by("a");
        assert!(impacted.contains(&"b".to_string()));
    }

    #[test]
    fn register_bumps_version_only_on_hash_change() {
        let graph = ArtifactGraph::new();
        let first = graph.register(node("a", "h1", vec![])).unwrap();
        assert_eq!(first.version, 1);

        let unchanged = graph.register(node("a", "h1", vec![])).unwrap();
        assert_eq!(unchanged.version, 1);

        let changed = graph.register(node("a", "h2", vec![])).unwrap();
        assert_eq!(changed.version, 2);
    }

    #[test]
    fn impact_analysis_tags_transitive_depth() {
        let graph = ArtifactGraph::new();
        graph.upsert(node("a", "h1", vec![])).unwrap();
        graph.upsert(node("b", "h2", vec![("a", "h1")])).unwrap();
        graph.upsert(node("c", "h3", vec![("b", "h2")])).unwrap();

        let impact = graph.impact_analysis("a");
        assert!(impact.contains(&("b".to_string(), 1)));
        assert!(impact.contains(&("c".to_string(), 2)));
    }

    #[test]
    fn dependency_tree_builds_forest_from_roots() {
        let graph = ArtifactGraph::new();
        graph.upsert(node("a", "h1", vec![])).unwrap();
        graph.upsert(node("b", "h2", vec![("a", "h1")])).unwrap();

        let forest = graph.dependency_tree(None);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, "a");
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].id, "b");
    }

    #[test]
    fn dependency_tree_marks_cycles_without_recursing() {
        let graph = ArtifactGraph::new();
        graph.upsert(node("a", "h1", vec![("b", "h2")])).unwrap();
        graph.upsert(node("b", "h2", vec![("a", "h1")])).unwrap();

        let subtree = graph.dependency_tree(Some("a"));
        assert_eq!(subtree.len(), 1);
        assert!(!subtree[0].circular);
        let b = &subtree[0].children[0];
        assert_eq!(b.id, "b");
        assert!(b.children[0].circular);
        assert_eq!(b.children[0].id, "a");
    }

    #[test]
    fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        {
            let graph = ArtifactGraph::load(&path).unwrap();
            graph.upsert(node("a", "h1", vec![])).unwrap();
        }
        let reloaded = ArtifactGraph::load(&path).unwrap();
        assert_eq!(reloaded.node_count(), 1);
    }
}
