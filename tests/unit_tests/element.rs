use galerkin::element::{ElementType, FiniteElement, LagrangeElement, LagrangeLine};
use galerkin::mapping::{LineMapping, Mapping};
use galerkin::mesh::{Mesh, MeshEntity};
use galerkin::proptest::reference_point;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, Point1};
use proptest::prelude::*;

fn single_cell_mesh(a: f64, b: f64, reversed: bool) -> Mesh<f64> {
    let cell = if reversed {
        MeshEntity::line(0, 1, 0)
    } else {
        MeshEntity::line(0, 0, 1)
    };
    Mesh::from_vertices_and_cells(vec![Point1::new(a), Point1::new(b)], vec![cell]).unwrap()
}

#[test]
fn lagrange_line_node_layout() {
    let nodes = |degree| -> Vec<f64> {
        LagrangeLine::<f64>::new(degree)
            .nodes()
            .iter()
            .map(|p| p.x)
            .collect()
    };
    assert_eq!(nodes(0), vec![0.0]);
    assert_eq!(nodes(1), vec![-1.0, 1.0]);
    assert_eq!(nodes(2), vec![-1.0, 1.0, 0.0]);

    let cubic = nodes(3);
    assert_eq!(cubic.len(), 4);
    assert_scalar_eq!(cubic[2], -1.0 / 3.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(cubic[3], 1.0 / 3.0, comp = abs, tol = 1e-15);
}

#[test]
fn lagrange_basis_is_nodal() {
    for degree in 0..=4 {
        let line = LagrangeLine::<f64>::new(degree);
        let n = line.num_nodes();
        let mut values = vec![0.0; n];
        for (j, node) in line.nodes().iter().enumerate() {
            line.populate_basis(&mut values, node);
            for (i, &value) in values.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_scalar_eq!(value, expected, comp = abs, tol = 1e-13);
            }
        }
    }
}

proptest! {
    #[test]
    fn lagrange_basis_is_partition_of_unity(xi in reference_point(), degree in 0usize..=4) {
        let line = LagrangeLine::<f64>::new(degree);
        let mut values = vec![0.0; line.num_nodes()];
        let mut gradients = vec![0.0; line.num_nodes()];
        line.populate_basis(&mut values, &xi);
        line.populate_reference_gradients(&mut gradients, &xi);

        prop_assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        prop_assert!(gradients.iter().sum::<f64>().abs() < 1e-10);
    }

    #[test]
    fn line_mapping_inverts(mapping in any::<LineMapping<f64>>(), xi in reference_point()) {
        let x = mapping.map_point(&xi);
        let xi_back = mapping.map_physical_point(&x);
        prop_assert!((xi_back.x - xi.x).abs() < 1e-10);
        prop_assert!((mapping.jacobian_det(&xi) - 0.5 * mapping.length()).abs() < 1e-12);
    }

    #[test]
    fn quadratic_elements_reproduce_quadratics(
        a in -5.0..5.0,
        length in 0.1..3.0,
        reversed in any::<bool>(),
        xi in reference_point()
    ) {
        let f = |x: f64| 2.0 * x * x - 3.0 * x + 0.5;
        let df = |x: f64| 4.0 * x - 3.0;
        let mesh = single_cell_mesh(a, a + length, reversed);
        let element_type = LagrangeElement::<f64>::new(2);
        let element = element_type.bind(&mesh, &mesh.cells()[0]).unwrap();

        let dofs = element.interpolate(&|p| DVector::from_element(1, f(p.x))).unwrap();
        let x = element.physical_coords(&xi).x;
        prop_assert!((element.function_value(&xi, dofs.as_view())[0] - f(x)).abs() < 1e-9);
        prop_assert!((element.function_gradient(&xi, dofs.as_view())[0] - df(x)).abs() < 1e-8);
    }
}

#[test]
fn linear_element_gradients_are_physical() {
    let element_type = LagrangeElement::<f64>::new(1);
    let xi = Point1::new(0.3);

    let mesh = single_cell_mesh(2.0, 2.5, false);
    let element = element_type.bind(&mesh, &mesh.cells()[0]).unwrap();
    let expected = DMatrix::from_row_slice(1, 2, &[-2.0, 2.0]);
    assert_matrix_eq!(element.shape_function_gradients(&xi), expected, comp = abs, tol = 1e-14);
    assert_scalar_eq!(element.jacobian_det(&xi), 0.25, comp = abs, tol = 1e-15);

    // Local node 0 now sits at x = 2.5
    let mesh = single_cell_mesh(2.0, 2.5, true);
    let element = element_type.bind(&mesh, &mesh.cells()[0]).unwrap();
    let expected = DMatrix::from_row_slice(1, 2, &[2.0, -2.0]);
    assert_matrix_eq!(element.shape_function_gradients(&xi), expected, comp = abs, tol = 1e-14);
    assert_scalar_eq!(element.jacobian_det(&xi), 0.25, comp = abs, tol = 1e-15);
    assert_scalar_eq!(element.physical_coords(&Point1::new(-1.0)).x, 2.5, comp = abs, tol = 1e-15);
}

#[test]
fn vector_valued_shape_functions_interleave_components() {
    let mesh = single_cell_mesh(0.0, 1.0, false);
    let element_type = LagrangeElement::<f64>::vector_valued(1, 2);
    assert_eq!(element_type.dofs_per_vertex(), 2);
    assert_eq!(element_type.num_dofs(&mesh.cells()[0]), 4);

    let element = element_type.bind(&mesh, &mesh.cells()[0]).unwrap();
    assert_eq!(element.num_nodes(), 2);
    assert_eq!(element.num_dofs(), 4);

    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(2, 4, &[
        0.75, 0.0,  0.25, 0.0,
        0.0,  0.75, 0.0,  0.25,
    ]);
    assert_matrix_eq!(element.shape_function_values(&Point1::new(-0.5)), expected, comp = abs, tol = 1e-15);

    let dofs = element.interpolate(&|p| DVector::from_vec(vec![p.x, 1.0 - p.x])).unwrap();
    assert_matrix_eq!(dofs, DVector::from_vec(vec![0.0, 1.0, 1.0, 0.0]), comp = abs, tol = 1e-15);
}

#[test]
fn piecewise_constant_element() {
    let mesh = single_cell_mesh(0.0, 1.0, false);
    let element_type = LagrangeElement::<f64>::new(0);
    let cell = &mesh.cells()[0];
    assert_eq!(element_type.dofs_per_vertex(), 0);
    assert_eq!(element_type.non_vertex_dofs(cell), 1);

    let element = element_type.bind(&mesh, cell).unwrap();
    let xi = Point1::new(0.7);
    assert_matrix_eq!(element.shape_function_values(&xi), DMatrix::from_element(1, 1, 1.0));
    assert_matrix_eq!(element.shape_function_gradients(&xi), DMatrix::from_element(1, 1, 0.0));
    assert_eq!(element.index(), 0);
    assert_eq!(element.global_vertex_indices(), &[0, 1]);
}
