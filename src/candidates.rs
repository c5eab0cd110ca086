//! Candidate search: which cutter elements may intersect which xfem elements.
use crate::mesh::{Discretization, MeshError};
use crate::Real;
use log::debug;
use nalgebra::Vector3;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::{AxisAlignedBoundingBox3d, BoundedGeometry, TOL7};

mod communicator;
pub use communicator::*;

/// Maps every xfem element id to the ids of the cutter elements whose bounding boxes overlap it.
///
/// Xfem elements without any candidate are absent from the map.
pub type CandidateMap = BTreeMap<usize, BTreeSet<usize>>;

fn cutter_bounding_boxes<T: Real>(
    cutter: &Discretization<T>,
) -> Result<Vec<(usize, AxisAlignedBoundingBox3d<T>)>, MeshError> {
    cutter
        .condition_elements()?
        .keys()
        .map(|&id| Ok((id, cutter.element_geometry(id)?.bounding_box())))
        .collect()
}

fn xfem_bounding_boxes<T: Real>(
    xfem: &Discretization<T>,
) -> Result<Vec<(usize, AxisAlignedBoundingBox3d<T>)>, MeshError> {
    xfem.elements()
        .keys()
        .map(|&id| Ok((id, xfem.element_geometry(id)?.bounding_box())))
        .collect()
}

fn to_envelope<T: Real>(aabb: &AxisAlignedBoundingBox3d<T>, padding: f64) -> AABB<[f64; 3]> {
    let to_f64 = |x: T| x.to_subset().unwrap_or(f64::NAN);
    let min = aabb.min().map(to_f64);
    let max = aabb.max().map(to_f64);
    AABB::from_corners(
        [min.x - padding, min.y - padding, min.z - padding],
        [max.x + padding, max.y + padding, max.z + padding],
    )
}

/// Finds all pairs of xfem elements and cutter elements (the elements of all coupling
/// conditions) whose bounding boxes overlap, with touching boxes counted as overlapping.
///
/// Cutter boxes are stored in an R-tree over `f64`, which only serves to prune the exact
/// overlap test carried out in `T`.
pub fn compute_candidate_pairs<T: Real>(
    xfem: &Discretization<T>,
    cutter: &Discretization<T>,
) -> Result<CandidateMap, MeshError> {
    let tol = T::from_f64(TOL7).unwrap();
    let cutter_boxes = cutter_bounding_boxes(cutter)?;
    let geometries = cutter_boxes
        .iter()
        .enumerate()
        .map(|(i, (_, aabb))| GeomWithData::new(Rectangle::from_aabb(to_envelope(aabb, 0.0)), i))
        .collect();
    let tree = RTree::bulk_load(geometries);

    let mut candidates = CandidateMap::new();
    for (xfem_id, xfem_box) in xfem_bounding_boxes(xfem)? {
        // The query is padded beyond the tolerance to absorb the conversion to f64
        let query = to_envelope(&xfem_box, 2.0 * TOL7);
        let overlapping: BTreeSet<usize> = tree
            .locate_in_envelope_intersecting(&query)
            .map(|geom| &cutter_boxes[geom.data])
            .filter(|(_, cutter_box)| xfem_box.intersects_with_tolerance(cutter_box, tol))
            .map(|(cutter_id, _)| *cutter_id)
            .collect();
        if !overlapping.is_empty() {
            candidates.insert(xfem_id, overlapping);
        }
    }

    debug!(
        "Found {} xfem elements with cutter candidates among {} xfem and {} cutter elements",
        candidates.len(),
        xfem.num_elements(),
        cutter_boxes.len()
    );
    Ok(candidates)
}

/// Same as [`compute_candidate_pairs`], but tests every pair.
pub fn compute_candidate_pairs_brute_force<T: Real>(
    xfem: &Discretization<T>,
    cutter: &Discretization<T>,
) -> Result<CandidateMap, MeshError> {
    let tol = T::from_f64(TOL7).unwrap();
    let cutter_boxes = cutter_bounding_boxes(cutter)?;
    let mut candidates = CandidateMap::new();
    for (xfem_id, xfem_box) in xfem_bounding_boxes(xfem)? {
        let overlapping: BTreeSet<usize> = cutter_boxes
            .iter()
            .filter(|(_, cutter_box)| xfem_box.intersects_with_tolerance(cutter_box, tol))
            .map(|(cutter_id, _)| *cutter_id)
            .collect();
        if !overlapping.is_empty() {
            candidates.insert(xfem_id, overlapping);
        }
    }
    Ok(candidates)
}

/// Error raised while redistributing cutter elements.
#[derive(Debug, Clone, PartialEq)]
pub enum RedistributionError {
    Communication(CommunicationError),
    Mesh(MeshError),
}

impl From<CommunicationError> for RedistributionError {
    fn from(err: CommunicationError) -> Self {
        RedistributionError::Communication(err)
    }
}

impl From<MeshError> for RedistributionError {
    fn from(err: MeshError) -> Self {
        RedistributionError::Mesh(err)
    }
}

impl std::fmt::Display for RedistributionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedistributionError::Communication(err) => write!(f, "Communication failed: {}", err),
            RedistributionError::Mesh(err) => write!(f, "Received inconsistent cutter data: {}", err),
        }
    }
}

impl std::error::Error for RedistributionError {}

/// The cutter data one rank contributes to the ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
struct CutterPacket<T: Real> {
    discretization: Discretization<T>,
    displacements: BTreeMap<usize, Vector3<T>>,
}

/// The union of the cutter elements of all ranks, together with their nodal displacements.
#[derive(Debug, Clone, PartialEq)]
pub struct RedistributedCutter<T: Real> {
    pub discretization: Discretization<T>,
    pub displacements: BTreeMap<usize, Vector3<T>>,
}

/// Gives every rank a copy of the cutter elements (and the nodes they reference) of all ranks.
///
/// Only the elements of coupling conditions are exchanged. The packet of every rank travels
/// once around the ring in `size - 1` rounds, each rank forwarding what it received in the
/// previous round. The result depends only on the union of the local cutters, not on how
/// the cutter is partitioned.
pub fn redistribute_cutter_elements<T, C>(
    comm: &C,
    local_cutter: &Discretization<T>,
    local_displacements: &BTreeMap<usize, Vector3<T>>,
) -> Result<RedistributedCutter<T>, RedistributionError>
where
    T: Real + Serialize + DeserializeOwned,
    C: Communicator + ?Sized,
{
    let condition_elements: BTreeSet<usize> = local_cutter.condition_elements()?.into_keys().collect();
    let discretization = local_cutter.restricted_to(&condition_elements)?;
    let displacements = local_displacements
        .iter()
        .filter(|(node, _)| discretization.node(**node).is_some())
        .map(|(node, u)| (*node, *u))
        .collect();
    let packet = CutterPacket {
        discretization,
        displacements,
    };

    let mut union = RedistributedCutter {
        discretization: packet.discretization.clone(),
        displacements: packet.displacements.clone(),
    };

    let mut payload =
        serde_json::to_vec(&packet).map_err(|err| CommunicationError::MalformedPayload(err.to_string()))?;
    for _ in 1..comm.size() {
        payload = comm.ring_exchange(payload)?;
        let received: CutterPacket<T> = serde_json::from_slice(&payload)
            .map_err(|err| CommunicationError::MalformedPayload(err.to_string()))?;
        union.discretization.merge(received.discretization)?;
        union.displacements.extend(received.displacements);
    }

    debug!(
        "Rank {} holds {} cutter elements after redistribution",
        comm.rank(),
        union.discretization.num_elements()
    );
    Ok(union)
}

/// Renumbers the local cutter elements so that ids are unique across all ranks.
///
/// Rank `p` assigns the ids `offset_p, offset_p + 1, ...` in order of the current ids, where
/// `offset_p` is the number of elements on the ranks below `p`. Returns the renumbered
/// discretization and the map from old to new ids.
pub fn renumber_cutter_elements<T, C>(
    local_cutter: &Discretization<T>,
    comm: &C,
) -> Result<(Discretization<T>, BTreeMap<usize, usize>), CommunicationError>
where
    T: Real,
    C: Communicator + ?Sized,
{
    let offset = comm.exclusive_prefix_sum(local_cutter.num_elements())?;
    Ok(local_cutter.renumber_elements(offset))
}
