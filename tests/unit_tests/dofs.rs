use crate::{fem_error, lagrange_space, vector_lagrange_space};
use galerkin::dofs::{allocate_dofs, DofOwner};
use galerkin::element::{ElementType, LagrangeElement};
use galerkin::mesh::procedural::create_unit_interval_mesh;
use galerkin::mesh::{Mesh, MeshEntity};
use galerkin::proptest::interval_mesh;
use galerkin::space::{ExteriorFace, FaceConnection, FunctionSpace, InteriorFace};
use galerkin::FemError;
use nalgebra::{DVector, Point1};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

#[test]
fn linear_dofs_follow_vertices() {
    let space = lagrange_space(create_unit_interval_mesh(3), 1);
    let dof_map = space.dof_map();
    assert_eq!(dof_map.num_dofs(), 4);
    assert_eq!(dof_map.num_entities(), 3);
    assert_eq!(dof_map.entity_dofs(0), Some(&[0, 1][..]));
    assert_eq!(dof_map.entity_dofs(1), Some(&[1, 2][..]));
    assert_eq!(dof_map.entity_dofs(2), Some(&[2, 3][..]));
    assert_eq!(dof_map.entity_dofs(3), None);
    assert_eq!(dof_map.vertex_dofs(2), Some(2..3));
    assert_eq!(dof_map.owner(3), Some(DofOwner::Vertex(3)));
    assert_eq!(dof_map.owner(4), None);
}

#[test]
fn quadratic_dofs_interleave_vertex_and_internal_dofs() {
    let space = lagrange_space(create_unit_interval_mesh(2), 2);
    let dof_map = space.dof_map();
    assert_eq!(dof_map.num_dofs(), 5);
    assert_eq!(dof_map.entity_dofs(0), Some(&[0, 1, 2][..]));
    assert_eq!(dof_map.entity_dofs(1), Some(&[1, 3, 4][..]));
    assert_eq!(dof_map.owner(2), Some(DofOwner::Entity(0)));
    assert_eq!(dof_map.owner(3), Some(DofOwner::Vertex(2)));
    assert_eq!(dof_map.owner(4), Some(DofOwner::Entity(1)));

    let rows: Vec<_> = dof_map.iter().map(|(cell, dofs)| (cell, dofs.to_vec())).collect();
    assert_eq!(rows, vec![(0, vec![0, 1, 2]), (1, vec![1, 3, 4])]);
}

#[test]
fn vector_valued_dofs_are_blocked_per_vertex() {
    let space = vector_lagrange_space(create_unit_interval_mesh(2), 1, 2);
    let dof_map = space.dof_map();
    assert_eq!(dof_map.num_dofs(), 6);
    assert_eq!(dof_map.vertex_dofs(0), Some(0..2));
    assert_eq!(dof_map.vertex_dofs(1), Some(2..4));
    assert_eq!(dof_map.entity_dofs(0), Some(&[0, 1, 2, 3][..]));
    assert_eq!(dof_map.entity_dofs(1), Some(&[2, 3, 4, 5][..]));
}

#[test]
fn piecewise_constant_dofs_are_internal() {
    let space = lagrange_space(create_unit_interval_mesh(3), 0);
    let dof_map = space.dof_map();
    assert_eq!(dof_map.num_dofs(), 3);
    for cell in 0..3 {
        assert_eq!(dof_map.entity_dofs(cell), Some(&[cell][..]));
        assert_eq!(dof_map.owner(cell), Some(DofOwner::Entity(cell)));
    }
    assert_eq!(dof_map.vertex_dofs(1), Some(0..0));
}

#[test]
fn inconsistent_vertex_dofs_are_rejected() {
    let mesh = create_unit_interval_mesh::<f64>(2);
    let scalar = LagrangeElement::<f64>::new(1);
    let vector = LagrangeElement::<f64>::vector_valued(1, 2);

    let err = allocate_dofs(&mesh, mesh.cells(), |cell| {
        if cell.index() == 0 {
            &scalar as &dyn ElementType<f64>
        } else {
            &vector
        }
    })
    .unwrap_err();

    assert_eq!(
        fem_error(&err),
        &FemError::InconsistentVertexDofs {
            vertex: 1,
            entity: 1,
            existing: 1,
            requested: 2
        }
    );
}

#[test]
fn allocation_visits_entities_once() {
    let mesh = create_unit_interval_mesh::<f64>(2);
    let element = LagrangeElement::<f64>::new(1);
    let cells = [&mesh.cells()[0], &mesh.cells()[0]];
    let err = allocate_dofs(&mesh, cells, |_| &element as &dyn ElementType<f64>).unwrap_err();
    assert!(matches!(fem_error(&err), FemError::InvalidMesh(_)));
}

fn two_subdomain_mesh() -> Mesh<f64> {
    let vertices = (0..4).map(|i| Point1::new(i as f64)).collect();
    let cells = vec![
        MeshEntity::line(0, 0, 1),
        MeshEntity::line(1, 1, 2),
        MeshEntity::line(2, 2, 3).with_domain_indicator(1),
    ];
    Mesh::from_vertices_and_cells(vertices, cells).unwrap()
}

#[test]
fn subdomain_spaces_only_cover_their_cells() {
    let mesh = Arc::new(two_subdomain_mesh());
    let element: Arc<dyn ElementType<f64>> = Arc::new(LagrangeElement::<f64>::new(1));
    let space = FunctionSpace::on_subdomain(mesh.clone(), element.clone(), 0).unwrap();

    assert_eq!(space.subdomain(), Some(0));
    assert_eq!(space.num_dofs(), 3);
    assert_eq!(space.cells().map(|cell| cell.index()).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(space.dof_map().vertex_dofs(3), None);

    let err = space.localize_cell(2).err().unwrap();
    assert_eq!(
        fem_error(&err),
        &FemError::SubdomainMismatch {
            entity: 2,
            expected: 0,
            found: 1
        }
    );

    let exterior: Vec<_> = space.exterior_faces().iter().map(|face| face.face).collect();
    assert_eq!(exterior, vec![0, 2]);

    let other = FunctionSpace::on_subdomain(mesh, element, 1).unwrap();
    assert_eq!(other.num_dofs(), 2);
    assert_eq!(other.interior_faces(), vec![]);
}

#[test]
fn face_connections_of_a_space() {
    let space = lagrange_space(create_unit_interval_mesh(2), 1);
    assert_eq!(
        space.exterior_faces(),
        vec![
            ExteriorFace {
                face: 0,
                cell: FaceConnection { cell: 0, local_face: 0 }
            },
            ExteriorFace {
                face: 2,
                cell: FaceConnection { cell: 1, local_face: 1 }
            },
        ]
    );
    assert_eq!(
        space.interior_faces(),
        vec![InteriorFace {
            face: 1,
            cells: [
                FaceConnection { cell: 0, local_face: 1 },
                FaceConnection { cell: 1, local_face: 0 }
            ]
        }]
    );
}

#[test]
fn localized_space_gathers_cell_values() {
    let space = lagrange_space(create_unit_interval_mesh(2), 2);
    let local = space.localize_cell(1).unwrap();
    assert_eq!(local.dofs(), &[1, 3, 4]);
    assert_eq!(local.num_dofs(), 3);
    assert_eq!(local.entity().index(), 1);

    let global = DVector::from_vec(vec![10.0, 11.0, 12.0, 13.0, 14.0]);
    assert_eq!(local.gather(global.as_view()), DVector::from_vec(vec![11.0, 13.0, 14.0]));

    let vertex = space.mesh().vertex_entity(1).unwrap();
    let err = space.localize(vertex).err().unwrap();
    assert!(matches!(fem_error(&err), FemError::InvalidMesh(_)));
}

#[test]
fn interpolation_uses_support_points() {
    let space = lagrange_space(create_unit_interval_mesh(2), 2);
    let values = space
        .interpolate(&|x| DVector::from_element(1, x.x * x.x))
        .unwrap();
    // Dofs: x = 0, 0.5, 0.25, 1, 0.75
    let expected = DVector::from_vec(vec![0.0, 0.25, 0.0625, 1.0, 0.5625]);
    assert_eq!(values, expected);
}

proptest! {
    #[test]
    fn dof_counts_match_element_layout(mesh in interval_mesh(12), degree in 0usize..=3) {
        let num_vertices = mesh.num_vertices();
        let num_cells = mesh.num_cells();
        let space = lagrange_space(mesh, degree);
        let expected = if degree == 0 {
            num_cells
        } else {
            num_vertices + (degree - 1) * num_cells
        };
        prop_assert_eq!(space.num_dofs(), expected);

        let dof_map = space.dof_map();
        let mut occurrences = vec![0usize; space.num_dofs()];
        for (cell, row) in dof_map.iter() {
            let vertices = space.mesh().cells()[cell].global_vertex_indices();
            let num_vertex_dofs = if degree == 0 { 0 } else { vertices.len() };
            let (vertex_part, internal_part) = row.split_at(num_vertex_dofs);

            // Vertex dofs are the shared per-vertex ranges, so neighbouring rows agree on them
            for (&vertex, &dof) in vertices.iter().zip(vertex_part) {
                prop_assert_eq!(dof_map.vertex_dofs(vertex), Some(dof..dof + 1));
                prop_assert_eq!(dof_map.owner(dof), Some(DofOwner::Vertex(vertex)));
            }
            for &dof in internal_part {
                prop_assert_eq!(dof_map.owner(dof), Some(DofOwner::Entity(cell)));
                occurrences[dof] += 1;
            }
        }
        for vertex in 0..num_vertices {
            if let Some(range) = dof_map.vertex_dofs(vertex) {
                for dof in range {
                    occurrences[dof] += 1;
                }
            }
        }
        // Every dof is owned exactly once, internal dofs never overlap
        prop_assert!(occurrences.iter().all(|&count| count == 1));
        let covered: BTreeSet<usize> = dof_map.iter().flat_map(|(_, row)| row.iter().copied()).collect();
        prop_assert_eq!(covered, (0..space.num_dofs()).collect::<BTreeSet<_>>());

        // Allocation is deterministic
        let again = lagrange_space(space.mesh().as_ref().clone(), degree);
        prop_assert_eq!(again.dof_map(), space.dof_map());
    }
}
