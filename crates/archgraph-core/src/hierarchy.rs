//! Group containment tree.
//!
//! Groups live in an arena indexed by position; `parentId` and `members` are only id lists, so a
//! cycle is just an edge the traversal declines to follow. The expansion is an explicit-stack DFS:
//! every group is entered at most once and every child edge is looked at once.

use crate::model::ParsedArchitecture;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    ids: Vec<String>,
    index: FxHashMap<String, usize>,
    order: Vec<usize>,
    parent: Vec<Option<usize>>,
    depth: Vec<usize>,
    roots: Vec<usize>,
    cycle_edges: Vec<(usize, usize)>,
    service_parent: FxHashMap<String, usize>,
}

impl Hierarchy {
    /// Resolves the tree for `arch`. Total for any input, including groups that list each other as
    /// members and parents, duplicate group ids, and dangling references.
    pub fn resolve(arch: &ParsedArchitecture) -> Self {
        let mut ids: Vec<String> = Vec::new();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        // First occurrence of each id; later duplicates are ignored.
        let mut groups = Vec::new();
        for group in &arch.groups {
            if index.contains_key(&group.id) {
                continue;
            }
            index.insert(group.id.clone(), ids.len());
            ids.push(group.id.clone());
            groups.push(group);
        }
        let n = ids.len();

        let declared_parent: Vec<Option<usize>> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| {
                g.parent_id
                    .as_deref()
                    .and_then(|p| index.get(p).copied())
                    .filter(|&p| p != i)
            })
            .collect();

        // Children: group members first (in listed order), then groups naming this one as parent.
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut edges: FxHashSet<(usize, usize)> = FxHashSet::default();
        for (i, g) in groups.iter().enumerate() {
            for m in &g.members {
                if let Some(&k) = index.get(m) {
                    if k != i && edges.insert((i, k)) {
                        children[i].push(k);
                    }
                }
            }
        }
        for (i, parent) in declared_parent.iter().enumerate() {
            if let Some(p) = *parent {
                if edges.insert((p, i)) {
                    children[p].push(i);
                }
            }
        }

        let mut out = Self {
            ids,
            index,
            order: Vec::with_capacity(n),
            parent: vec![None; n],
            depth: vec![0; n],
            ..Self::default()
        };

        let mut emitted = vec![false; n];
        let mut on_path = vec![false; n];
        let starts = (0..n)
            .filter(|&i| declared_parent[i].is_none())
            .chain(0..n)
            .collect::<Vec<_>>();
        for start in starts {
            if emitted[start] {
                continue;
            }
            out.roots.push(start);
            emitted[start] = true;
            on_path[start] = true;
            out.order.push(start);

            // (group, next child cursor)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            while let Some(top) = stack.last_mut() {
                let (node, cursor) = *top;
                let Some(&child) = children[node].get(cursor) else {
                    on_path[node] = false;
                    stack.pop();
                    continue;
                };
                top.1 += 1;

                if on_path[child] {
                    tracing::debug!(
                        from = %out.ids[node],
                        to = %out.ids[child],
                        "group cycle edge not followed"
                    );
                    out.cycle_edges.push((node, child));
                    continue;
                }
                if emitted[child] {
                    continue;
                }
                emitted[child] = true;
                on_path[child] = true;
                out.parent[child] = Some(node);
                out.depth[child] = out.depth[node] + 1;
                out.order.push(child);
                stack.push((child, 0));
            }
        }

        out.service_parent = innermost_groups(arch, &out);
        out
    }

    /// Group ids in traversal order: every parent precedes its children.
    pub fn order(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(|&i| self.ids[i].as_str())
    }

    pub fn roots(&self) -> impl Iterator<Item = &str> + '_ {
        self.roots.iter().map(|&i| self.ids[i].as_str())
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.index.contains_key(group_id)
    }

    pub fn parent_of(&self, group_id: &str) -> Option<&str> {
        let i = *self.index.get(group_id)?;
        self.parent[i].map(|p| self.ids[p].as_str())
    }

    pub fn depth_of(&self, group_id: &str) -> Option<usize> {
        self.index.get(group_id).map(|&i| self.depth[i])
    }

    /// Edges `(from, to)` that would have re-entered a group already being expanded.
    pub fn cycle_edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.cycle_edges
            .iter()
            .map(|&(a, b)| (self.ids[a].as_str(), self.ids[b].as_str()))
    }

    /// Innermost group containing `service_id`, if any.
    pub fn service_parent(&self, service_id: &str) -> Option<&str> {
        self.service_parent
            .get(service_id)
            .map(|&i| self.ids[i].as_str())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// For each service, the deepest group that contains it either through `members` or through the
/// service's own `groupIds`. Ties go to the service's `groupIds` order, then to table order.
fn innermost_groups(arch: &ParsedArchitecture, h: &Hierarchy) -> FxHashMap<String, usize> {
    let mut containing: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for service in &arch.services {
        if h.index.contains_key(&service.id) {
            continue;
        }
        let entry = containing.entry(service.id.as_str()).or_default();
        for gid in &service.group_ids {
            if let Some(&g) = h.index.get(gid) {
                entry.push(g);
            }
        }
    }
    let mut seen = vec![false; h.ids.len()];
    for group in &arch.groups {
        let Some(&i) = h.index.get(&group.id) else {
            continue;
        };
        if std::mem::replace(&mut seen[i], true) {
            continue;
        }
        for m in &group.members {
            if let Some(entry) = containing.get_mut(m.as_str()) {
                entry.push(i);
            }
        }
    }

    let mut out = FxHashMap::default();
    for (service, candidates) in containing {
        let mut best: Option<usize> = None;
        for g in candidates {
            if best.is_none_or(|b| h.depth[g] > h.depth[b]) {
                best = Some(g);
            }
        }
        if let Some(g) = best {
            out.insert(service.to_string(), g);
        }
    }
    out
}
