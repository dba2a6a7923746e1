// Class hierarchy index
//
// One node per class in the pool, with node index == class id, and an edge
// from each class to its superclass and to each interface it implements.

use super::{ClassId, Clazz};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Extends,
    Implements,
}

#[derive(Debug, Default)]
pub struct Hierarchy {
    graph: DiGraph<ClassId, Relation>,
    abstract_classes: HashSet<ClassId>,
}

impl Hierarchy {
    /// Build from linked classes
    pub fn build(classes: &[Clazz]) -> Self {
        let mut graph = DiGraph::with_capacity(classes.len(), classes.len() * 2);
        let mut abstract_classes = HashSet::new();

        for (i, class) in classes.iter().enumerate() {
            graph.add_node(ClassId(i as u32));
            if class.is_abstract_or_interface() {
                abstract_classes.insert(ClassId(i as u32));
            }
        }

        for (i, class) in classes.iter().enumerate() {
            let node = NodeIndex::new(i);
            if let Some(super_class) = class.super_class_id() {
                graph.add_edge(node, NodeIndex::new(super_class.index()), Relation::Extends);
            }
            for interface in class.interface_ids() {
                graph.add_edge(node, NodeIndex::new(interface.index()), Relation::Implements);
            }
        }

        Self {
            graph,
            abstract_classes,
        }
    }

    fn node(&self, id: ClassId) -> Option<NodeIndex> {
        let node = NodeIndex::new(id.index());
        self.graph.node_weight(node).map(|_| node)
    }

    pub fn super_class(&self, id: ClassId) -> Option<ClassId> {
        let node = self.node(id)?;
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|edge| *edge.weight() == Relation::Extends)
            .map(|edge| self.graph[edge.target()])
    }

    pub fn interfaces(&self, id: ClassId) -> Vec<ClassId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut interfaces: Vec<ClassId> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|edge| *edge.weight() == Relation::Implements)
            .map(|edge| self.graph[edge.target()])
            .collect();
        interfaces.sort();
        interfaces
    }

    /// Classes that directly extend or implement `id`
    pub fn direct_subclasses(&self, id: ClassId) -> Vec<ClassId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut subclasses: Vec<ClassId> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        subclasses.sort();
        subclasses.dedup();
        subclasses
    }

    /// Superclass chain, nearest first
    pub fn super_classes(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = id;

        while let Some(super_class) = self.super_class(current) {
            if !seen.insert(super_class) {
                break;
            }
            chain.push(super_class);
            current = super_class;
        }

        chain
    }

    /// All transitive superclasses and interfaces, excluding `id`
    pub fn super_types(&self, id: ClassId) -> Vec<ClassId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<NodeIndex> = self.graph.neighbors_directed(node, Direction::Outgoing).collect();

        while let Some(next) = stack.pop() {
            let class = self.graph[next];
            if !seen.insert(class) {
                continue;
            }
            result.push(class);
            stack.extend(self.graph.neighbors_directed(next, Direction::Outgoing));
        }

        result.sort();
        result
    }

    /// All transitive subclasses and implementations, excluding `id`
    pub fn subclasses(&self, id: ClassId) -> Vec<ClassId> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack = self.direct_subclasses(id);
        stack.reverse();

        while let Some(class) = stack.pop() {
            if !seen.insert(class) {
                continue;
            }
            result.push(class);
            let mut next = self.direct_subclasses(class);
            next.reverse();
            stack.extend(next);
        }

        result
    }

    /// The first concrete classes at or below `id`
    pub fn concrete_down(&self, id: ClassId) -> Vec<ClassId> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        self.collect_concrete(id, &mut seen, &mut result);
        result
    }

    fn collect_concrete(&self, id: ClassId, seen: &mut HashSet<ClassId>, result: &mut Vec<ClassId>) {
        if !seen.insert(id) {
            return;
        }
        if !self.abstract_classes.contains(&id) {
            result.push(id);
            return;
        }
        for subclass in self.direct_subclasses(id) {
            self.collect_concrete(subclass, seen, result);
        }
    }

    /// Classes whose methods can override or be overridden by a method of
    /// `id`: starting from each first concrete class at or below `id`, that
    /// class, its superclasses and all its subclasses
    pub fn method_hierarchy(&self, id: ClassId) -> Vec<ClassId> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();

        for concrete in self.concrete_down(id) {
            let related = std::iter::once(concrete)
                .chain(self.super_classes(concrete))
                .chain(self.subclasses(concrete));
            for class in related {
                if seen.insert(class) {
                    result.push(class);
                }
            }
        }

        result
    }
}
