use crate::vtk_output_path;
use nalgebra::Point3;
use std::collections::BTreeMap;
use xcut::candidates::SelfCommunicator;
use xcut::cells::DomainIntCell;
use xcut::element::{ElementGeometry, ElementShape};
use xcut::interface::ElementAccumulator;
use xcut::intersection::{Intersection, IntersectionOutput, IntersectionSettings};
use xcut::io::vtk::{
    boundary_cells_data_set, domain_cells_data_set, export_data_set, plc_points_data_set, vtk_cell_type,
};
use xcut::mesh::procedural::{create_quad_cutter, create_unit_box_uniform_hex_discretization};
use xcut::tessellation::Plc;
use xcut::vtkio::model::{CellType, DataSet, Piece, UnstructuredGridPiece, VertexNumbers};

fn cut_cube(quadratic_cells: bool) -> IntersectionOutput<f64> {
    let xfem = create_unit_box_uniform_hex_discretization(1);
    let cutter = create_quad_cutter(
        [
            Point3::new(-0.5, -0.5, 0.5),
            Point3::new(1.5, -0.5, 0.5),
            Point3::new(1.5, 1.5, 0.5),
            Point3::new(-0.5, 1.5, 0.5),
        ],
        "interface",
    );
    let settings = IntersectionSettings {
        quadratic_cells,
        ..IntersectionSettings::default()
    };
    Intersection::new(settings)
        .compute(&xfem, &cutter, &BTreeMap::new(), &SelfCommunicator)
        .unwrap()
}

fn single_piece(data_set: &DataSet) -> &UnstructuredGridPiece {
    match data_set {
        DataSet::UnstructuredGrid { pieces, .. } => match pieces.as_slice() {
            [Piece::Inline(piece)] => &**piece,
            _ => panic!("Expected a single inline piece"),
        },
        _ => panic!("Expected an unstructured grid"),
    }
}

fn legacy_vertices(piece: &UnstructuredGridPiece) -> (u32, &[u32]) {
    match &piece.cells.cell_verts {
        VertexNumbers::Legacy { num_cells, vertices } => (*num_cells, vertices.as_slice()),
        _ => panic!("Expected legacy vertex numbers"),
    }
}

#[test]
fn cell_types() {
    assert_eq!(vtk_cell_type(ElementShape::Tet10), Some(CellType::QuadraticTetra));
    assert_eq!(vtk_cell_type(ElementShape::Tri3), Some(CellType::Triangle));
    assert_eq!(vtk_cell_type(ElementShape::Hex8), Some(CellType::Hexahedron));
}

#[test]
fn export_cells_of_cut_cube() {
    let output = cut_cube(false);
    let domain_cells = output
        .domain_cells
        .iter()
        .flat_map(|(id, cells)| cells.iter().map(move |cell| (*id, cell)));
    let domain = domain_cells_data_set(domain_cells).unwrap();
    let num_domain_cells = output.domain_cells[&0].len();
    {
        let piece = single_piece(&domain);
        assert_eq!(piece.cells.types.len(), num_domain_cells);
        assert!(piece.cells.types.iter().all(|t| *t == CellType::Tetra));
        let (num_cells, vertices) = legacy_vertices(piece);
        assert_eq!(num_cells as usize, num_domain_cells);
        assert_eq!(vertices.len(), 5 * num_domain_cells);
        assert_eq!(piece.data.cell.len(), 1);
    }
    export_data_set(domain, vtk_output_path("export_cells_of_cut_cube", "domain_cells"), None).unwrap();

    let boundary_cells = output
        .boundary_cells
        .iter()
        .flat_map(|(id, cells)| cells.iter().map(move |cell| (*id, cell)));
    let boundary = boundary_cells_data_set(boundary_cells).unwrap();
    {
        let piece = single_piece(&boundary);
        assert!(piece.cells.types.iter().all(|t| *t == CellType::Triangle));
        assert_eq!(piece.data.cell.len(), 2);
    }
    let path = vtk_output_path("export_cells_of_cut_cube", "boundary_cells");
    export_data_set(boundary, &path, Some("Boundary cells")).unwrap();
    let contents = std::fs::read(&path).unwrap();
    assert!(contents.starts_with(b"# vtk DataFile Version 4.1"));
}

#[test]
fn quadratic_tetrahedra_use_vtk_node_order() {
    let output = cut_cube(true);
    let cell = &output.domain_cells[&0][0];
    assert_eq!(cell.shape, ElementShape::Tet10);
    let domain = domain_cells_data_set([(0, cell)]).unwrap();
    let piece = single_piece(&domain);
    let (_, vertices) = legacy_vertices(piece);
    assert_eq!(vertices, &[10, 0, 1, 2, 3, 4, 5, 6, 7, 9, 8]);
    export_data_set(
        domain,
        vtk_output_path("quadratic_tetrahedra_use_vtk_node_order", "tet10"),
        None,
    )
    .unwrap();
}

#[test]
fn uncut_element_cell_and_plc_points() {
    let xfem = ElementGeometry::from_vertices(
        ElementShape::Hex8,
        ElementShape::Hex8
            .reference_nodes::<f64>()
            .into_iter()
            .map(|p| p * 2.0)
            .collect(),
    )
    .unwrap();
    let cell = DomainIntCell::whole_element(&xfem);
    let domain = domain_cells_data_set([(7, &cell)]).unwrap();
    assert_eq!(single_piece(&domain).cells.types, vec![CellType::Hexahedron]);

    let plc = Plc::from_accumulator(&ElementAccumulator::<f64>::new(ElementShape::Hex8));
    let points = plc_points_data_set(&plc, &xfem).unwrap();
    let piece = single_piece(&points);
    assert_eq!(piece.cells.types.len(), 8);
    assert!(piece.cells.types.iter().all(|t| *t == CellType::Vertex));
    export_data_set(points, vtk_output_path("uncut_element_cell_and_plc_points", "plc_points"), None).unwrap();
}
