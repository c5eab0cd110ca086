//! Basic procedural generation of xfem and cutter discretizations.
use crate::element::ElementShape;
use crate::mesh::{CouplingCondition, Discretization, MeshElement, MeshError};
use crate::Real;
use nalgebra::{Point3, Vector3};

pub fn create_unit_box_uniform_hex_discretization<T: Real>(cells_per_dim: usize) -> Discretization<T> {
    create_rectangular_uniform_hex_discretization(T::one(), 1, 1, 1, cells_per_dim, &Vector3::zeros())
}

/// Generates an axis-aligned box of hex8 elements given a unit length, dimensions as
/// multipliers of the unit length and the number of cells per unit length.
///
/// Node and element ids are consecutive, starting at zero, with `x` varying fastest.
pub fn create_rectangular_uniform_hex_discretization<T: Real>(
    unit_length: T,
    units_x: usize,
    units_y: usize,
    units_z: usize,
    cells_per_unit: usize,
    origin: &Vector3<T>,
) -> Discretization<T> {
    let mut discretization = Discretization::new();
    if cells_per_unit == 0 || units_x == 0 || units_y == 0 || units_z == 0 {
        return discretization;
    }

    let cell_size = unit_length / T::from_usize(cells_per_unit).expect("Must be able to fit usize in T");
    let [nx, ny, nz] = [units_x, units_y, units_z].map(|units| units * cells_per_unit);
    let vertex_index = |i: usize, j: usize, k: usize| (nx + 1) * (ny + 1) * k + (nx + 1) * j + i;

    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                let ijk = Vector3::new(i, j, k).map(|c| T::from_usize(c).expect("Must be able to fit usize in T"));
                discretization.insert_node(vertex_index(i, j, k), Point3::from(origin + ijk * cell_size));
            }
        }
    }

    let mut element_id = 0;
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let nodes = vec![
                    vertex_index(i, j, k),
                    vertex_index(i + 1, j, k),
                    vertex_index(i + 1, j + 1, k),
                    vertex_index(i, j + 1, k),
                    vertex_index(i, j, k + 1),
                    vertex_index(i + 1, j, k + 1),
                    vertex_index(i + 1, j + 1, k + 1),
                    vertex_index(i, j + 1, k + 1),
                ];
                let element = MeshElement::new(element_id, ElementShape::Hex8, nodes)
                    .expect("Hex8 elements always have 8 nodes");
                discretization
                    .insert_element(element)
                    .expect("Element ids are unique");
                element_id += 1;
            }
        }
    }

    discretization
}

/// Generates a cutter discretization by sampling the parametric surface `surface(u, v)` on a
/// uniform grid over `[0, 1]^2`.
///
/// Supported shapes are `Quad4`, `Quad9` (quadratic nodes sampled on the surface) and `Tri3`
/// (every grid cell split along its diagonal). All elements are collected in a single coupling
/// condition with the given label. Node ids start at `first_node_id` and element ids at
/// `first_element_id`, so that several cutters may be merged.
pub fn create_parametric_surface_cutter<T, F>(
    shape: ElementShape,
    cells_u: usize,
    cells_v: usize,
    surface: F,
    label: &str,
    first_node_id: usize,
    first_element_id: usize,
) -> Result<Discretization<T>, MeshError>
where
    T: Real,
    F: Fn(T, T) -> Point3<T>,
{
    // Quadratic elements need an additional node in the middle of every cell edge
    let refinement = match shape {
        ElementShape::Quad4 | ElementShape::Tri3 => 1,
        ElementShape::Quad9 => 2,
        other => {
            return Err(MeshError::NodeCountMismatch {
                shape: other,
                expected: ElementShape::Quad4.num_nodes(),
                actual: other.num_nodes(),
            })
        }
    };

    let num_u = refinement * cells_u + 1;
    let num_v = refinement * cells_v + 1;
    let node_id = |i: usize, j: usize| first_node_id + num_u * j + i;

    let mut discretization = Discretization::new();
    for j in 0..num_v {
        for i in 0..num_u {
            let u = T::from_usize(i).unwrap() / T::from_usize(num_u - 1).unwrap();
            let v = T::from_usize(j).unwrap() / T::from_usize(num_v - 1).unwrap();
            discretization.insert_node(node_id(i, j), surface(u, v));
        }
    }

    let mut element_ids = Vec::new();
    let mut next_element_id = first_element_id;
    let mut push_element = |discretization: &mut Discretization<T>, shape, nodes| -> Result<(), MeshError> {
        discretization.insert_element(MeshElement::new(next_element_id, shape, nodes)?)?;
        element_ids.push(next_element_id);
        next_element_id += 1;
        Ok(())
    };

    for j in 0..cells_v {
        for i in 0..cells_u {
            let (i0, j0) = (refinement * i, refinement * j);
            match shape {
                ElementShape::Quad4 => {
                    let nodes = vec![
                        node_id(i0, j0),
                        node_id(i0 + 1, j0),
                        node_id(i0 + 1, j0 + 1),
                        node_id(i0, j0 + 1),
                    ];
                    push_element(&mut discretization, shape, nodes)?;
                }
                ElementShape::Tri3 => {
                    let [a, b, c, d] = [
                        node_id(i0, j0),
                        node_id(i0 + 1, j0),
                        node_id(i0 + 1, j0 + 1),
                        node_id(i0, j0 + 1),
                    ];
                    push_element(&mut discretization, shape, vec![a, b, c])?;
                    push_element(&mut discretization, shape, vec![a, c, d])?;
                }
                _ => {
                    let nodes = vec![
                        node_id(i0, j0),
                        node_id(i0 + 2, j0),
                        node_id(i0 + 2, j0 + 2),
                        node_id(i0, j0 + 2),
                        node_id(i0 + 1, j0),
                        node_id(i0 + 2, j0 + 1),
                        node_id(i0 + 1, j0 + 2),
                        node_id(i0, j0 + 1),
                        node_id(i0 + 1, j0 + 1),
                    ];
                    push_element(&mut discretization, shape, nodes)?;
                }
            }
        }
    }

    discretization.add_condition(CouplingCondition::new(label, element_ids));
    Ok(discretization)
}

/// A cutter consisting of a single bilinear quad4 element with the given corners.
pub fn create_quad_cutter<T: Real>(corners: [Point3<T>; 4], label: &str) -> Discretization<T> {
    let mut discretization = Discretization::new();
    for (id, corner) in corners.into_iter().enumerate() {
        discretization.insert_node(id, corner);
    }
    let element = MeshElement::new(0, ElementShape::Quad4, vec![0, 1, 2, 3]).expect("Quad4 elements always have 4 nodes");
    discretization
        .insert_element(element)
        .expect("Element ids are unique");
    discretization.add_condition(CouplingCondition::new(label, [0]));
    discretization
}
