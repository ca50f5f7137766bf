use crate::{fem_error, lagrange_space};
use galerkin::assembly::local::{CellLinearFormContext, ExteriorFaceContext};
use galerkin::assembly::{EntityKind, Form, FormCollection, LinearForm, SystemAssembler};
use galerkin::element::FiniteElement;
use galerkin::forms::{DiffusionBilinearForm, DiffusionCoefficients, DiffusionResidual, InteriorPenalty};
use galerkin::function::FeFunction;
use galerkin::mesh::procedural::create_unit_interval_mesh;
use galerkin::mesh::{Mesh, MeshEntity};
use galerkin::proptest::interval_mesh;
use galerkin::quadrature::{Quadrature, QuadratureRule};
use galerkin::space::FunctionSpace;
use galerkin::FemError;
use matrixcompare::{assert_matrix_eq, prop_assert_matrix_eq};
use nalgebra::{DMatrix, DVector, DVectorViewMut, Point1};
use nalgebra_sparse::CsrMatrix;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn expected_p1_stiffness(num_cells: usize) -> DMatrix<f64> {
    let h = 1.0 / num_cells as f64;
    let mut expected = DMatrix::zeros(num_cells + 1, num_cells + 1);
    for i in 0..num_cells {
        expected[(i, i)] += 1.0 / h;
        expected[(i, i + 1)] -= 1.0 / h;
        expected[(i + 1, i)] -= 1.0 / h;
        expected[(i + 1, i + 1)] += 1.0 / h;
    }
    expected
}

#[test]
fn p1_sparsity_pattern_is_tridiagonal() {
    let space = lagrange_space(create_unit_interval_mesh(3), 1);
    let stiffness = DiffusionBilinearForm::new(space, QuadratureRule::gauss(2).unwrap());
    let forms: FormCollection<f64> = FormCollection::new().with_bilinear_form(&stiffness);
    let assembler = SystemAssembler::new();

    let sparsity = assembler.get_sparsity(&forms);
    let expected: BTreeSet<_> = [
        (0, 0),
        (0, 1),
        (1, 0),
        (1, 1),
        (1, 2),
        (2, 1),
        (2, 2),
        (2, 3),
        (3, 2),
        (3, 3),
    ]
    .into_iter()
    .collect();
    assert_eq!(sparsity, expected);

    let pattern = assembler.assemble_pattern(&forms).unwrap();
    assert_eq!(pattern.major_offsets(), &[0, 2, 5, 8, 10]);
    assert_eq!(pattern.minor_indices(), &[0, 1, 0, 1, 2, 1, 2, 3, 2, 3]);
}

#[test]
fn p1_stiffness_matrix() {
    let space = lagrange_space(create_unit_interval_mesh(4), 1);
    let stiffness = DiffusionBilinearForm::new(space, QuadratureRule::gauss(2).unwrap());
    let forms: FormCollection<f64> = FormCollection::new().with_bilinear_form(&stiffness);
    let assembler = SystemAssembler::new();

    let mut matrix = assembler.allocate_matrix(&forms).unwrap();
    assembler
        .assemble_bilinear_forms(&mut matrix, &forms, None, &())
        .unwrap();
    assert_matrix_eq!(DMatrix::from(&matrix), expected_p1_stiffness(4), comp = abs, tol = 1e-12);

    let mut dense = DMatrix::zeros(5, 5);
    assembler
        .assemble_bilinear_forms_dense(&mut dense, &forms, None, &())
        .unwrap();
    assert_matrix_eq!(dense, expected_p1_stiffness(4), comp = abs, tol = 1e-12);

    // Assembly accumulates into the target
    assembler
        .assemble_bilinear_forms(&mut matrix, &forms, None, &())
        .unwrap();
    assert_matrix_eq!(DMatrix::from(&matrix), 2.0 * expected_p1_stiffness(4), comp = abs, tol = 1e-12);
}

#[test]
fn p1_mass_matrix() {
    let space = lagrange_space(create_unit_interval_mesh(2), 1);
    let coefficients = DiffusionCoefficients::laplace()
        .with_kappa0(0.0)
        .with_reaction(1.0);
    let mass = DiffusionBilinearForm::new(space, QuadratureRule::gauss(2).unwrap()).with_coefficients(coefficients);
    let forms: FormCollection<f64> = FormCollection::new().with_bilinear_form(&mass);

    let mut dense = DMatrix::zeros(3, 3);
    SystemAssembler::new()
        .assemble_bilinear_forms_dense(&mut dense, &forms, None, &())
        .unwrap();

    let h = 0.5;
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(3, 3, &[
        2.0, 1.0, 0.0,
        1.0, 4.0, 1.0,
        0.0, 1.0, 2.0,
    ]) * (h / 6.0);
    assert_matrix_eq!(dense, expected, comp = abs, tol = 1e-14);
}

#[test]
fn load_vector_of_constant_source() {
    let space = lagrange_space(create_unit_interval_mesh(4), 1);
    let load = DiffusionResidual::new(space, QuadratureRule::gauss(2).unwrap()).with_constant_source(1.0);
    let forms: FormCollection<f64> = FormCollection::new().with_linear_form(&load);

    let mut rhs = DVector::zeros(5);
    SystemAssembler::new()
        .assemble_linear_forms(&mut rhs, &forms, None, &())
        .unwrap();
    let expected = DVector::from_vec(vec![0.125, 0.25, 0.25, 0.25, 0.125]);
    assert_matrix_eq!(rhs, expected, comp = abs, tol = 1e-14);
}

#[test]
fn residual_of_interpolated_state_matches_matrix_product() {
    let space = lagrange_space(create_unit_interval_mesh(5), 2);
    let quadrature = QuadratureRule::gauss(4).unwrap();
    let coefficients = DiffusionCoefficients::laplace().with_reaction(3.0);
    let jacobian = DiffusionBilinearForm::new(space.clone(), quadrature.clone()).with_coefficients(coefficients);
    let residual = DiffusionResidual::new(space.clone(), quadrature).with_coefficients(coefficients);
    let forms: FormCollection<f64> = FormCollection::new()
        .with_bilinear_form(&jacobian)
        .with_linear_form(&residual);
    let assembler = SystemAssembler::new();

    let state = FeFunction::interpolate(space.clone(), &|x| DVector::from_element(1, (3.0 * x.x).sin())).unwrap();
    let mut matrix = assembler.allocate_matrix(&forms).unwrap();
    assembler
        .assemble_bilinear_forms(&mut matrix, &forms, None, &())
        .unwrap();
    let mut rhs = DVector::zeros(space.num_dofs());
    assembler
        .assemble_linear_forms(&mut rhs, &forms, Some(&state), &())
        .unwrap();

    // For a linear operator without source the residual is -K u
    let expected = -(&matrix * state.dof_values());
    assert_matrix_eq!(rhs, expected, comp = abs, tol = 1e-12);
}

#[test]
fn assembling_outside_the_pattern_fails() {
    let space = lagrange_space(create_unit_interval_mesh(2), 1);
    let stiffness = DiffusionBilinearForm::new(space, QuadratureRule::gauss(2).unwrap());
    let forms: FormCollection<f64> = FormCollection::new().with_bilinear_form(&stiffness);

    let mut diagonal = CsrMatrix::identity(3);
    let err = SystemAssembler::new()
        .assemble_bilinear_forms(&mut diagonal, &forms, None, &())
        .unwrap_err();
    assert!(matches!(fem_error(&err), FemError::SparsityViolation { .. }));
}

#[test]
fn assembling_into_wrong_size_fails() {
    let space = lagrange_space(create_unit_interval_mesh(2), 1);
    let load = DiffusionResidual::new(space, QuadratureRule::gauss(2).unwrap()).with_constant_source(1.0);
    let forms: FormCollection<f64> = FormCollection::new().with_linear_form(&load);

    let mut rhs = DVector::zeros(4);
    let err = SystemAssembler::new()
        .assemble_linear_forms(&mut rhs, &forms, None, &())
        .unwrap_err();
    assert!(matches!(fem_error(&err), FemError::DimensionMismatch { .. }));
}

#[test]
fn forms_on_different_spaces_are_rejected() {
    let first = lagrange_space(create_unit_interval_mesh(2), 1);
    let second = lagrange_space(create_unit_interval_mesh(2), 1);
    let quadrature = QuadratureRule::gauss(2).unwrap();
    let a = DiffusionBilinearForm::new(first, quadrature.clone());
    let b = DiffusionBilinearForm::new(second, quadrature);
    let forms: FormCollection<f64> = FormCollection::new()
        .with_bilinear_form(&a)
        .with_bilinear_form(&b);

    let err = forms.test_space().unwrap_err();
    assert!(matches!(fem_error(&err), FemError::MismatchedSpaces(_)));
    let err = SystemAssembler::new().allocate_matrix(&forms).unwrap_err();
    assert!(matches!(fem_error(&err), FemError::MismatchedSpaces(_)));
}

#[test]
fn pattern_requires_bilinear_forms() {
    let forms: FormCollection<f64> = FormCollection::new();
    assert!(forms.is_empty());
    let err = SystemAssembler::new().assemble_pattern(&forms).unwrap_err();
    assert!(matches!(fem_error(&err), FemError::MismatchedSpaces(_)));
}

/// A source term scaled by the assembly parameters, declared on all entity kinds but only
/// implemented on cells.
struct ScaledSource {
    space: Arc<FunctionSpace<f64>>,
    quadrature: QuadratureRule<f64>,
    kinds: Vec<EntityKind>,
}

impl Form<f64> for ScaledSource {
    fn implements_quadrature_on(&self, kind: EntityKind) -> bool {
        self.kinds.contains(&kind)
    }

    fn quadrature(&self) -> &QuadratureRule<f64> {
        &self.quadrature
    }
}

impl LinearForm<f64, f64> for ScaledSource {
    fn test_space(&self) -> &Arc<FunctionSpace<f64>> {
        &self.space
    }

    fn local_cell_linear_form(
        &self,
        mut output: DVectorViewMut<f64>,
        context: &CellLinearFormContext<f64, f64>,
    ) -> eyre::Result<()> {
        let element = context.test.element();
        for (&w, xi) in context.quadrature.iter() {
            let phi = element.shape_function_values(xi);
            output.axpy(*context.params * w * element.jacobian_det(xi), &phi.row(0).transpose(), 1.0);
        }
        Ok(())
    }
}

#[test]
fn parameters_reach_local_kernels() {
    let space = lagrange_space(create_unit_interval_mesh(2), 1);
    let source = ScaledSource {
        space,
        quadrature: QuadratureRule::gauss(1).unwrap(),
        kinds: vec![EntityKind::Cells],
    };
    let forms: FormCollection<f64, f64> = FormCollection::new().with_linear_form(&source);

    let mut rhs = DVector::zeros(3);
    SystemAssembler::new()
        .assemble_linear_forms(&mut rhs, &forms, None, &4.0)
        .unwrap();
    assert_matrix_eq!(rhs, DVector::from_vec(vec![1.0, 2.0, 1.0]), comp = abs, tol = 1e-14);
}

#[test]
fn missing_contributions_are_reported() {
    let space = lagrange_space(create_unit_interval_mesh(2), 1);
    let source = ScaledSource {
        space,
        quadrature: QuadratureRule::gauss(1).unwrap(),
        kinds: EntityKind::ALL.to_vec(),
    };
    let forms: FormCollection<f64, f64> = FormCollection::new().with_linear_form(&source);

    let mut rhs = DVector::zeros(3);
    let err = SystemAssembler::new()
        .assemble_linear_forms(&mut rhs, &forms, None, &1.0)
        .unwrap_err();
    match fem_error(&err) {
        FemError::UnsupportedContribution { form, kind } => {
            assert!(form.contains("ScaledSource"));
            assert_eq!(*kind, EntityKind::ExteriorFaces);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn exterior_face_normals_point_outwards() {
    let space = lagrange_space(create_unit_interval_mesh(2), 1);
    let mesh = space.mesh();
    let expected = [(0, -1.0, 0.0), (2, 1.0, 1.0)];

    for (face, (vertex, normal, x)) in space.exterior_faces().into_iter().zip(expected) {
        assert_eq!(face.face, vertex);
        let face_entity = mesh.vertex_entity(face.face).unwrap();
        let context = ExteriorFaceContext::build(&space, None, face_entity, face.cell, None, &()).unwrap();
        assert_eq!(context.side.normal, normal);
        assert_eq!(context.side.physical_coords().x, x);
        assert!(context.side.trial.is_none());
        assert!(context.side.field_value().is_none());
    }
}

#[test]
fn interior_penalty_couples_piecewise_constants() {
    let space = lagrange_space(create_unit_interval_mesh(3), 0);
    let penalty = InteriorPenalty::new(space.clone(), 1.0);
    let forms: FormCollection<f64> = FormCollection::new()
        .with_functional(&penalty)
        .with_linear_form(&penalty)
        .with_bilinear_form(&penalty);
    let assembler = SystemAssembler::new();

    let mut matrix = assembler.allocate_matrix(&forms).unwrap();
    assert_eq!(matrix.nnz(), 7);
    assembler
        .assemble_bilinear_forms(&mut matrix, &forms, None, &())
        .unwrap();
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(3, 3, &[
        1.0, -1.0, 0.0,
        -1.0, 2.0, -1.0,
        0.0, -1.0, 1.0,
    ]);
    assert_matrix_eq!(DMatrix::from(&matrix), expected, comp = abs, tol = 1e-14);

    let state = FeFunction::from_dof_values(space.clone(), DVector::from_vec(vec![0.0, 1.0, 3.0])).unwrap();
    let energy = assembler
        .assemble_functionals(0.0, &forms, Some(&state), &())
        .unwrap();
    assert_eq!(energy, 2.5);

    let mut rhs = DVector::zeros(3);
    assembler
        .assemble_linear_forms(&mut rhs, &forms, Some(&state), &())
        .unwrap();
    assert_matrix_eq!(rhs, DVector::from_vec(vec![1.0, 1.0, -2.0]), comp = abs, tol = 1e-14);
}

#[test]
fn linear_assembly_is_reproducible_and_accumulates() {
    let space = lagrange_space(create_unit_interval_mesh(5), 2);
    let residual = DiffusionResidual::new(space.clone(), QuadratureRule::gauss(5).unwrap())
        .with_coefficients(DiffusionCoefficients::laplace().with_kappa1(0.5))
        .with_source(|x| DVector::from_element(1, x.x.sin()));
    let forms: FormCollection<f64> = FormCollection::new().with_linear_form(&residual);
    let state = FeFunction::interpolate(space.clone(), &|x| DVector::from_element(1, x.x * x.x)).unwrap();
    let assembler = SystemAssembler::new();

    let assemble = |target: &mut DVector<f64>| {
        assembler
            .assemble_linear_forms(target, &forms, Some(&state), &())
            .unwrap()
    };
    let mut first = DVector::zeros(space.num_dofs());
    let mut second = DVector::zeros(space.num_dofs());
    assemble(&mut first);
    assemble(&mut second);
    assert_eq!(first, second);

    // Assembly adds to the target instead of overwriting it
    assemble(&mut second);
    assert_matrix_eq!(second, &first * 2.0, comp = abs, tol = 1e-14);
}

proptest! {
    #[test]
    fn assembled_entries_lie_in_sparsity(mesh in interval_mesh(8), degree in 0usize..=3, kappa1 in -0.5..0.5) {
        let space = lagrange_space(mesh, degree);
        let coefficients = DiffusionCoefficients::laplace()
            .with_kappa1(kappa1)
            .with_reaction(1.0);
        let diffusion = DiffusionBilinearForm::new(space.clone(), QuadratureRule::gauss(2 * degree + 1).unwrap())
            .with_coefficients(coefficients);
        let penalty = InteriorPenalty::new(space.clone(), 2.0);
        let forms: FormCollection<f64> = FormCollection::new()
            .with_bilinear_form(&diffusion)
            .with_bilinear_form(&penalty);
        let state = FeFunction::interpolate(space.clone(), &|x| DVector::from_element(1, x.x.sin())).unwrap();
        let assembler = SystemAssembler::new();

        let sparsity = assembler.get_sparsity(&forms);
        prop_assert_eq!(&sparsity, &assembler.get_sparsity(&forms));

        // CSR assembly fails on any entry outside the pattern
        let mut csr = assembler.allocate_matrix(&forms).unwrap();
        assembler
            .assemble_bilinear_forms(&mut csr, &forms, Some(&state), &())
            .unwrap();

        let n = space.num_dofs();
        let mut dense = DMatrix::zeros(n, n);
        assembler
            .assemble_bilinear_forms_dense(&mut dense, &forms, Some(&state), &())
            .unwrap();
        for i in 0..n {
            for j in 0..n {
                if dense[(i, j)] != 0.0 {
                    prop_assert!(sparsity.contains(&(i, j)), "entry ({}, {}) outside sparsity", i, j);
                }
            }
        }
        prop_assert_matrix_eq!(DMatrix::from(&csr), dense, comp = abs, tol = 1e-12);
    }

    #[test]
    fn single_element_stiffness_stencil(a in -5.0..5.0, length in 0.01..3.0, reversed in any::<bool>()) {
        let cell = if reversed {
            MeshEntity::line(0, 1, 0)
        } else {
            MeshEntity::line(0, 0, 1)
        };
        let b = a + length;
        let mesh = Mesh::from_vertices_and_cells(vec![Point1::new(a), Point1::new(b)], vec![cell]).unwrap();
        let space = lagrange_space(mesh, 1);
        let stiffness = DiffusionBilinearForm::new(space, QuadratureRule::gauss(2).unwrap());
        let forms: FormCollection<f64> = FormCollection::new().with_bilinear_form(&stiffness);

        let mut matrix = DMatrix::zeros(2, 2);
        SystemAssembler::new()
            .assemble_bilinear_forms_dense(&mut matrix, &forms, None, &())
            .unwrap();
        let h = b - a;
        let expected = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0]);
        prop_assert!((matrix * h - expected).amax() < 1e-12);
    }
}
