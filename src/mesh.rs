//! Discretizations: nodes, elements and the coupling conditions selecting cutter elements.
use crate::element::{ElementGeometry, ElementShape};
use crate::Real;
use nalgebra::{Point3, Scalar, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

pub mod procedural;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// An element references a node that is not part of the discretization.
    MissingNode { element: usize, node: usize },
    /// A condition or query references an element that is not part of the discretization.
    MissingElement(usize),
    DuplicateElement(usize),
    /// The same node id was given two different positions.
    ConflictingNode(usize),
    NodeCountMismatch {
        shape: ElementShape,
        expected: usize,
        actual: usize,
    },
    /// An element is claimed by more than one coupling condition.
    ConditionConflict {
        element: usize,
        first: String,
        second: String,
    },
}

impl Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::MissingNode { element, node } => {
                write!(f, "Element {} references node {}, which does not exist.", element, node)
            }
            MeshError::MissingElement(element) => write!(f, "Element {} does not exist.", element),
            MeshError::DuplicateElement(element) => write!(f, "Element {} was inserted twice.", element),
            MeshError::ConflictingNode(node) => {
                write!(f, "Node {} was given two different positions.", node)
            }
            MeshError::NodeCountMismatch {
                shape,
                expected,
                actual,
            } => write!(f, "Shape {} needs {} nodes, but {} were given.", shape, expected, actual),
            MeshError::ConditionConflict { element, first, second } => write!(
                f,
                "Element {} is claimed by both coupling condition \"{}\" and \"{}\".",
                element, first, second
            ),
        }
    }
}

impl Error for MeshError {}

/// Topological description of a single element: its global id, its shape and the global ids
/// of its nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshElement {
    id: usize,
    shape: ElementShape,
    nodes: Vec<usize>,
}

impl MeshElement {
    pub fn new(id: usize, shape: ElementShape, nodes: Vec<usize>) -> Result<Self, MeshError> {
        if nodes.len() != shape.num_nodes() {
            return Err(MeshError::NodeCountMismatch {
                shape,
                expected: shape.num_nodes(),
                actual: nodes.len(),
            });
        }
        Ok(Self { id, shape, nodes })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Global node ids of the corner nodes of every line of the element.
    pub fn line_node_pairs(&self) -> impl '_ + Iterator<Item = [usize; 2]> {
        self.shape
            .lines()
            .iter()
            .map(move |line| [self.nodes[line[0]], self.nodes[line[1]]])
    }

    /// Index of a line (in the element's own numbering) shared with `other`, if any.
    ///
    /// Lines are compared by the global ids of their corner nodes, irrespective of orientation.
    pub fn common_line(&self, other: &MeshElement) -> Option<usize> {
        let sorted = |[a, b]: [usize; 2]| [a.min(b), a.max(b)];
        let other_lines: BTreeSet<[usize; 2]> = other.line_node_pairs().map(sorted).collect();
        self.line_node_pairs()
            .position(|pair| other_lines.contains(&sorted(pair)))
    }
}

/// A named subset of the elements of a cutter discretization that acts as an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingCondition {
    label: String,
    elements: BTreeSet<usize>,
}

impl CouplingCondition {
    pub fn new(label: impl Into<String>, elements: impl IntoIterator<Item = usize>) -> Self {
        Self {
            label: label.into(),
            elements: elements.into_iter().collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn elements(&self) -> &BTreeSet<usize> {
        &self.elements
    }
}

/// Nodes and elements addressed by global ids, plus optional coupling conditions.
///
/// Both xfem and cutter meshes are represented as a `Discretization`; on the cutter side the
/// coupling conditions select which elements take part in the intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Discretization<T: Scalar> {
    nodes: BTreeMap<usize, Point3<T>>,
    elements: BTreeMap<usize, MeshElement>,
    conditions: Vec<CouplingCondition>,
}

impl<T: Scalar> Default for Discretization<T> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            elements: BTreeMap::new(),
            conditions: Vec::new(),
        }
    }
}

impl<T: Scalar> Discretization<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, id: usize, position: Point3<T>) -> Option<Point3<T>> {
        self.nodes.insert(id, position)
    }

    pub fn insert_element(&mut self, element: MeshElement) -> Result<(), MeshError> {
        match self.elements.entry(element.id) {
            Entry::Occupied(_) => Err(MeshError::DuplicateElement(element.id)),
            Entry::Vacant(entry) => {
                entry.insert(element);
                Ok(())
            }
        }
    }

    pub fn add_condition(&mut self, condition: CouplingCondition) {
        self.conditions.push(condition);
    }

    pub fn nodes(&self) -> &BTreeMap<usize, Point3<T>> {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Option<&Point3<T>> {
        self.nodes.get(&id)
    }

    pub fn elements(&self) -> &BTreeMap<usize, MeshElement> {
        &self.elements
    }

    pub fn element(&self, id: usize) -> Result<&MeshElement, MeshError> {
        self.elements.get(&id).ok_or(MeshError::MissingElement(id))
    }

    pub fn conditions(&self) -> &[CouplingCondition] {
        &self.conditions
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Maps every element claimed by a coupling condition to the index of that condition.
    ///
    /// Fails if an element is claimed by two conditions or does not exist.
    pub fn condition_elements(&self) -> Result<BTreeMap<usize, usize>, MeshError> {
        let mut claimed: BTreeMap<usize, usize> = BTreeMap::new();
        for (condition_idx, condition) in self.conditions.iter().enumerate() {
            for &element in &condition.elements {
                if !self.elements.contains_key(&element) {
                    return Err(MeshError::MissingElement(element));
                }
                if let Some(&previous) = claimed.get(&element) {
                    if previous != condition_idx {
                        return Err(MeshError::ConditionConflict {
                            element,
                            first: self.conditions[previous].label.clone(),
                            second: condition.label.clone(),
                        });
                    }
                }
                claimed.insert(element, condition_idx);
            }
        }
        Ok(claimed)
    }

    /// The sub-discretization consisting of the given elements and the nodes they reference.
    ///
    /// Conditions are restricted to the kept elements; conditions left empty are kept so that
    /// their labels survive redistribution.
    pub fn restricted_to(&self, element_ids: &BTreeSet<usize>) -> Result<Self, MeshError> {
        let mut restricted = Self::new();
        for &id in element_ids {
            let element = self.element(id)?;
            for &node in &element.nodes {
                let position = self
                    .nodes
                    .get(&node)
                    .ok_or(MeshError::MissingNode { element: id, node })?;
                restricted.nodes.insert(node, position.clone());
            }
            restricted.elements.insert(id, element.clone());
        }
        restricted.conditions = self
            .conditions
            .iter()
            .map(|condition| CouplingCondition {
                label: condition.label.clone(),
                elements: condition.elements.intersection(element_ids).copied().collect(),
            })
            .collect();
        Ok(restricted)
    }

    /// Assigns the ids `offset, offset + 1, ...` to the elements in order of their current ids.
    ///
    /// Returns the renumbered discretization and the map from old to new ids.
    pub fn renumber_elements(&self, offset: usize) -> (Self, BTreeMap<usize, usize>) {
        let id_map: BTreeMap<usize, usize> = self
            .elements
            .keys()
            .enumerate()
            .map(|(local_idx, old_id)| (*old_id, offset + local_idx))
            .collect();
        let elements = self
            .elements
            .values()
            .map(|element| {
                let id = id_map[&element.id];
                (id, MeshElement { id, ..element.clone() })
            })
            .collect();
        let conditions = self
            .conditions
            .iter()
            .map(|condition| CouplingCondition {
                label: condition.label.clone(),
                elements: condition
                    .elements
                    .iter()
                    .filter_map(|old| id_map.get(old).copied())
                    .collect(),
            })
            .collect();
        let renumbered = Self {
            nodes: self.nodes.clone(),
            elements,
            conditions,
        };
        (renumbered, id_map)
    }
}

impl<T: Real> Discretization<T> {
    pub fn element_geometry(&self, id: usize) -> Result<ElementGeometry<T>, MeshError> {
        let element = self.element(id)?;
        let vertices = element
            .nodes
            .iter()
            .map(|node| {
                self.nodes
                    .get(node)
                    .copied()
                    .ok_or(MeshError::MissingNode { element: id, node: *node })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ElementGeometry::from_vertices(element.shape, vertices)
    }

    /// The discretization in its current configuration, with every node moved by its
    /// displacement. Nodes without a displacement keep their position.
    pub fn displaced(&self, displacements: &BTreeMap<usize, Vector3<T>>) -> Self {
        let nodes = self
            .nodes
            .iter()
            .map(|(id, x)| match displacements.get(id) {
                Some(u) => (*id, x + u),
                None => (*id, *x),
            })
            .collect();
        Self {
            nodes,
            elements: self.elements.clone(),
            conditions: self.conditions.clone(),
        }
    }

    /// Merges another discretization into this one.
    ///
    /// Nodes and elements present in both must agree. Conditions are merged by label.
    pub fn merge(&mut self, other: Discretization<T>) -> Result<(), MeshError> {
        for (id, position) in other.nodes {
            match self.nodes.entry(id) {
                Entry::Occupied(entry) => {
                    if *entry.get() != position {
                        return Err(MeshError::ConflictingNode(id));
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(position);
                }
            }
        }
        for (id, element) in other.elements {
            match self.elements.entry(id) {
                Entry::Occupied(entry) => {
                    if *entry.get() != element {
                        return Err(MeshError::DuplicateElement(id));
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(element);
                }
            }
        }
        for condition in other.conditions {
            match self.conditions.iter_mut().find(|c| c.label == condition.label) {
                Some(existing) => existing.elements.extend(condition.elements),
                None => self.conditions.push(condition),
            }
        }
        Ok(())
    }
}
