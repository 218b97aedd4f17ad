//! Circular-import detection with Tarjan's strongly connected components

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use super::is_direct;
use crate::cancel::CancelToken;
use crate::graph::{EdgeType, UniversalGraph};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportCycle {
    /// Node ids in import order, starting at the cycle's smallest id and ending with it again
    pub nodes: Vec<String>,
    /// Size of the strongly connected component the cycle was taken from
    pub component_size: usize,
    /// Every module of that component, sorted
    pub members: Vec<String>,
}

/// Import cycles, grouped by strongly connected component.
///
/// Only directly observed IMPORTS edges are followed. For every member of a
/// component the shortest cycle through it is taken; cycles are rotated to
/// start at their smallest id, deduplicated, and ordered by node sequence,
/// so each module of a component shows up in at least one reported cycle.
pub fn circular_imports(graph: &UniversalGraph, cancel: &CancelToken) -> (Vec<ImportCycle>, bool) {
    let adjacency = import_adjacency(graph);
    let (components, mut cancelled) = tarjan(&adjacency, cancel);
    let id_of = |idx: usize| graph.node_at(idx).id.clone();

    let mut cycles = Vec::new();
    'components: for component in components {
        let self_loop = component.len() == 1 && adjacency[component[0]].contains(&component[0]);
        if component.len() < 2 && !self_loop {
            continue;
        }
        let mut members: Vec<String> = component.iter().map(|&i| id_of(i)).collect();
        members.sort();
        let member_set: HashSet<usize> = component.iter().copied().collect();

        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut found: Vec<Vec<String>> = Vec::new();
        for &start in &component {
            if cancel.is_cancelled() {
                cancelled = true;
                break 'components;
            }
            let Some(path) = shortest_cycle(&adjacency, &member_set, start) else {
                continue;
            };
            let path = canonical_rotation(graph, path);
            if seen.insert(path.clone()) {
                found.push(path.into_iter().map(id_of).collect());
            }
        }
        cycles.extend(found.into_iter().map(|nodes| ImportCycle {
            nodes,
            component_size: component.len(),
            members: members.clone(),
        }));
    }
    cycles.sort_by(|a, b| a.nodes.cmp(&b.nodes));
    (cycles, cancelled)
}

/// Rotate a closed path (`[s, .., s]`) so it starts at its smallest node id
fn canonical_rotation(graph: &UniversalGraph, path: Vec<usize>) -> Vec<usize> {
    if path.len() < 2 {
        return path;
    }
    let body = &path[..path.len() - 1];
    let pivot = (0..body.len())
        .min_by(|&a, &b| graph.node_at(body[a]).id.cmp(&graph.node_at(body[b]).id))
        .unwrap_or(0);
    let mut rotated: Vec<usize> = body[pivot..].iter().chain(&body[..pivot]).copied().collect();
    rotated.push(body[pivot]);
    rotated
}

fn import_adjacency(graph: &UniversalGraph) -> Vec<Vec<usize>> {
    (0..graph.node_count())
        .map(|idx| {
            let mut targets: Vec<usize> = graph
                .out_edge_positions(idx)
                .iter()
                .map(|&pos| graph.edge_at(pos))
                .filter(|edge| is_direct(edge, EdgeType::Imports))
                .filter_map(|edge| graph.node_index(&edge.to_id))
                .collect();
            targets.sort_unstable();
            targets.dedup();
            targets
        })
        .collect()
}

/// Iterative Tarjan; components come out in reverse topological order
fn tarjan(adjacency: &[Vec<usize>], cancel: &CancelToken) -> (Vec<Vec<usize>>, bool) {
    let n = adjacency.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut counter = 0;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }
        if cancel.is_cancelled() {
            return (components, true);
        }
        index[root] = Some(counter);
        low[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if let Some(&w) = adjacency[v].get(frame.1) {
                frame.1 += 1;
                match index[w] {
                    None => {
                        index[w] = Some(counter);
                        low[w] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    }
                    Some(w_index) if on_stack[w] => low[v] = low[v].min(w_index),
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if Some(low[v]) == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    (components, false)
}

/// BFS from `start` back to itself inside one component
fn shortest_cycle(adjacency: &[Vec<usize>], members: &HashSet<usize>, start: usize) -> Option<Vec<usize>> {
    let mut parent: Vec<Option<usize>> = vec![None; adjacency.len()];
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(v) = queue.pop_front() {
        for &w in &adjacency[v] {
            if w == start {
                let mut tail = Vec::new();
                let mut cursor = v;
                while cursor != start {
                    tail.push(cursor);
                    cursor = parent[cursor]?;
                }
                tail.reverse();
                let mut path = Vec::with_capacity(tail.len() + 2);
                path.push(start);
                path.extend(tail);
                path.push(start);
                return Some(path);
            }
            if members.contains(&w) && visited.insert(w) {
                parent[w] = Some(v);
                queue.push_back(w);
            }
        }
    }
    None
}
