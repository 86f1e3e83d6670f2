//! Integration tests for the data kinds and the accuracy layer.
//!
//! Purpose
//! -------
//! - Drive `Woa`, `Wod` and `WodTmm` end to end against a deterministic,
//!   call-counting model in a temporary cache root.
//! - Check that caching, reconciliation and filtering compose the way a
//!   cost function relies on.
//!
//! Coverage
//! --------
//! - `database`:
//!   - Persistent site outputs shared across instances.
//!   - Jacobian truncation and recompute of narrow cached Jacobians.
//!   - Time averaging of box outputs from the canonical resolution.
//!   - WOA monthly/annual measurement layout.
//!   - Near-water filtering, `init_data_base` and `Family` sharing.
//! - `accuracy`:
//!   - Block and threshold GLS information against a dense `JᵀΣ⁻¹J`.
//!   - Legacy GLS through frozen Cholesky factors.
//!   - OLS parameter confidences and model confidence shapes.
//!   - Average model confidence increase over masked candidate boxes.
//!
//! Exclusions
//! ----------
//! - Payload format details, template rendering and the correlation algebra
//!   in isolation; those are covered by unit tests.
use approx::assert_abs_diff_eq;
use nalgebra::{DMatrix, DVector};
use ndarray::{array, s, Array1, Array2, ArrayD, IxDyn};
use ndop_db::{
    accuracy::{
        information::cost_function_value, information_matrix, AccuracyError, Asymptotic,
        ConfidenceSettings, CostFunctionKind, ExecutionMode, MatrixType,
    },
    cache::{EntryKey, FilenameTemplate, ParameterKey, PersistOptions},
    correlation::Precision,
    database::{
        init_data_base,
        options::{CORRELATION_PARAMETER_FILENAME, WOD_DF_FILENAME},
        AnnualThreshold, AnyDataBase, BoxMeasurements, Collaborators, CorrelationSpec, DataBase,
        DataBaseError, DeviationBoxes, DataBaseOptions, DataKind, Family, FamilyRegistry, LegacyArtifacts,
        ModelEvaluator, NearWaterFilter, OldWodTmm, PointCorrelationProvider, PointDataBase,
        PointMeasurements, PointSets, Woa, Wod, WodTmm,
    },
};
use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

const STEP_SIZE: f64 = 1e-7;
const BOX_SHAPE: [usize; 5] = [2, 12, 2, 1, 2];

/// Linear test model `f = p0·g0 + p1·g1 (+ offset)` with known Jacobians.
///
/// Boxes: `f[tr, t, x, y, z] = p0·(tr + 1) + p1·t + x + z`.
/// Points: DOP `p0·c0 + p1·c1`, PO4 `2·p0·c0 + p1·c1` for coordinates `c`.
/// Jacobians carry `extra_columns` trailing zero columns.
#[derive(Default)]
struct CountingModel {
    f_boxes_calls: Cell<usize>,
    df_boxes_calls: Cell<usize>,
    f_points_calls: Cell<usize>,
    df_points_calls: Cell<usize>,
    extra_columns: Cell<usize>,
}

impl CountingModel {
    fn bump(counter: &Cell<usize>) {
        counter.set(counter.get() + 1);
    }
}

impl ModelEvaluator for CountingModel {
    fn f_boxes(&self, parameters: &[f64], time_dim: usize) -> anyhow::Result<ArrayD<f64>> {
        Self::bump(&self.f_boxes_calls);
        let shape = [BOX_SHAPE[0], time_dim, BOX_SHAPE[2], BOX_SHAPE[3], BOX_SHAPE[4]];
        Ok(ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
            parameters[0] * (idx[0] + 1) as f64 + parameters[1] * idx[1] as f64
                + (idx[2] + idx[4]) as f64
        }))
    }

    fn df_boxes(&self, parameters: &[f64], time_dim: usize) -> anyhow::Result<ArrayD<f64>> {
        Self::bump(&self.df_boxes_calls);
        let width = parameters.len() + self.extra_columns.get();
        let shape = [BOX_SHAPE[0], time_dim, BOX_SHAPE[2], BOX_SHAPE[3], BOX_SHAPE[4], width];
        Ok(ArrayD::from_shape_fn(IxDyn(&shape), |idx| match idx[5] {
            0 => (idx[0] + 1) as f64,
            1 => idx[1] as f64,
            _ => 0.0,
        }))
    }

    fn f_points(
        &self, parameters: &[f64], points: &PointSets,
    ) -> anyhow::Result<(Array1<f64>, Array1<f64>)> {
        Self::bump(&self.f_points_calls);
        let (p0, p1) = (parameters[0], parameters[1]);
        let dop = points.dop.rows().into_iter().map(|c| p0 * c[0] + p1 * c[1]).collect();
        let po4 = points.po4.rows().into_iter().map(|c| 2.0 * p0 * c[0] + p1 * c[1]).collect();
        Ok((dop, po4))
    }

    fn df_points(
        &self, parameters: &[f64], points: &PointSets,
    ) -> anyhow::Result<(Array2<f64>, Array2<f64>)> {
        Self::bump(&self.df_points_calls);
        let width = parameters.len() + self.extra_columns.get();
        let jacobian = |coords: &Array2<f64>, scale: f64| {
            Array2::from_shape_fn((coords.nrows(), width), |(i, j)| match j {
                0 => scale * coords[[i, 0]],
                1 => coords[[i, 1]],
                _ => 0.0,
            })
        };
        Ok((jacobian(&points.dop, 1.0), jacobian(&points.po4, 2.0)))
    }

    fn derivative_step_size(&self) -> f64 {
        STEP_SIZE
    }
}

/// Three DOP and two PO4 sites.
struct FixedPoints;

impl PointMeasurements for FixedPoints {
    fn points(&self) -> anyhow::Result<PointSets> {
        Ok(PointSets::new(array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]], array![[1.0, 2.0], [0.5, 1.0]]))
    }

    fn results(&self) -> anyhow::Result<(Array1<f64>, Array1<f64>)> {
        // Model at (1, 0.5) plus fixed noise.
        Ok((array![1.1, 0.4, 1.55], array![3.2, 1.4]))
    }

    fn deviations(&self) -> anyhow::Result<(Array1<f64>, Array1<f64>)> {
        Ok((Array1::from_elem(3, 0.5), Array1::from_elem(2, 0.25)))
    }
}

/// Keeps DOP sites 0 and 2 and PO4 site 1.
struct FixedNearWater;

impl NearWaterFilter for FixedNearWater {
    fn points_near_water_mask(
        &self, _max_land_boxes: usize,
    ) -> anyhow::Result<(Array1<bool>, Array1<bool>)> {
        Ok((array![true, false, true], array![false, true]))
    }
}

/// Constant off-diagonal correlation sized for the filtered or full sites.
///
/// The off-diagonal value depends on the thresholds: 0.2 for at least ten
/// samples, 0.4 below, minus 0.1 when a year limit applies.
struct UniformCorrelation;

impl UniformCorrelation {
    fn off_diagonal(spec: &CorrelationSpec) -> f64 {
        let base = if spec.min_measurements >= 10 { 0.2 } else { 0.4 };
        if spec.max_year_diff.is_finite() {
            base - 0.1
        } else {
            base
        }
    }

    fn dense(n: usize, off_diagonal: f64) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| if i == j { 1.0 } else { off_diagonal })
    }
}

impl PointCorrelationProvider for UniformCorrelation {
    fn correlation_matrix(&self, spec: &CorrelationSpec) -> anyhow::Result<DMatrix<f64>> {
        let n = if spec.max_land_boxes.is_some() { 3 } else { 5 };
        Ok(Self::dense(n, Self::off_diagonal(spec)))
    }
}

/// Frozen deviations equal to those of [`FixedPoints`] and identity
/// correlation factors sized for the near-water or full sites.
struct IdentityArtifacts;

impl LegacyArtifacts for IdentityArtifacts {
    fn base_dir(&self) -> &Path {
        Path::new("/frozen")
    }

    fn dop_point_deviations(&self) -> anyhow::Result<Array1<f64>> {
        Ok(Array1::from_elem(3, 0.5))
    }

    fn load_vector(&self, _path: &Path) -> anyhow::Result<Array1<f64>> {
        Ok(Array1::from_elem(2, 0.25))
    }

    fn load_cholesky_factor(&self, path: &Path) -> anyhow::Result<DMatrix<f64>> {
        let n = if path.to_string_lossy().contains("pw_nearest_lsm_tmm") { 3 } else { 5 };
        Ok(DMatrix::identity(n, n))
    }
}

/// Unit variances, one observation everywhere except tracer 1 at `x = 1`.
struct FixedBoxes;

impl FixedBoxes {
    fn nobs_array() -> ArrayD<f64> {
        ArrayD::from_shape_fn(IxDyn(&BOX_SHAPE), |idx| if idx[0] == 1 && idx[2] == 1 { 0.0 } else { 1.0 })
    }
}

impl BoxMeasurements for FixedBoxes {
    fn means(&self) -> anyhow::Result<ArrayD<f64>> {
        Ok(ArrayD::from_elem(IxDyn(&BOX_SHAPE), 2.0))
    }

    fn variances(&self) -> anyhow::Result<ArrayD<f64>> {
        Ok(ArrayD::from_elem(IxDyn(&BOX_SHAPE), 1.0))
    }

    fn nobs(&self) -> anyhow::Result<ArrayD<f64>> {
        Ok(Self::nobs_array())
    }
}

/// Box deviation 0.5 everywhere except NaN for tracer 1 at `z = 1`.
struct HalfDeviations;

impl DeviationBoxes for HalfDeviations {
    fn deviation_boxes(&self, time_dim: usize) -> anyhow::Result<ArrayD<f64>> {
        let shape = [BOX_SHAPE[0], time_dim, BOX_SHAPE[2], BOX_SHAPE[3], BOX_SHAPE[4]];
        Ok(ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
            if idx[0] == 1 && idx[4] == 1 { f64::NAN } else { 0.5 }
        }))
    }
}

fn wod(model: &Rc<CountingModel>, root: &Path) -> Wod {
    Wod::new(model.clone(), Rc::new(FixedPoints), Rc::new(UniformCorrelation), &DataBaseOptions::new(root))
}

/// Dense `JᵀΣ⁻¹J` and `rᵀΣ⁻¹r` for `Σ = D C D` on the five-site `Wod`.
fn dense_gls(data_base: &dyn DataBase, p: &[f64], correlation: &DMatrix<f64>) -> (DMatrix<f64>, f64) {
    let sigma = [0.5, 0.5, 0.5, 0.25, 0.25];
    let covariance = DMatrix::from_fn(5, 5, |i, j| sigma[i] * correlation[(i, j)] * sigma[j]);
    let inverse = covariance.try_inverse().unwrap();
    let df = data_base.df(p).unwrap();
    let jacobian = DMatrix::from_fn(5, 2, |i, j| df[[i, j]]);
    let residuals = &*data_base.results().unwrap() - &data_base.f(p).unwrap();
    let r = DMatrix::from_iterator(5, 1, residuals.iter().copied());
    let information = jacobian.transpose() * &inverse * &jacobian;
    let cost = (r.transpose() * &inverse * &r)[(0, 0)];
    (information, cost)
}

fn write_correlation_parameters(data_base: &dyn DataBase, parameters: &[f64], text: &str) {
    let dir = data_base
        .core()
        .boxes_cache()
        .persistent()
        .parameter_set_dir_or_create(&ParameterKey::new(parameters))
        .unwrap()
        .join("data_base");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(CORRELATION_PARAMETER_FILENAME), text).unwrap();
}

#[test]
// Purpose
// -------
// Site outputs are computed once per parameter vector and found again by a
// fresh instance on the same cache root.
//
// Given
// -----
// - Two `Wod` instances over one temp root.
//
// Expect
// ------
// - One model call each for F and DF in the first instance; none in the
//   second; identical values.
fn wod_outputs_are_computed_once_and_persisted() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let first_model = Rc::new(CountingModel::default());
    let second_model = Rc::new(CountingModel::default());
    let first = wod(&first_model, dir.path());

    // Act
    let f = first.f(&p).unwrap();
    let f_again = first.f(&p).unwrap();
    let df = first.df(&p).unwrap();
    let second = wod(&second_model, dir.path());
    let f_reloaded = second.f(&p).unwrap();
    let df_reloaded = second.df(&p).unwrap();

    // Assert
    assert_eq!(f, array![1.0, 0.5, 1.5, 3.0, 1.5]);
    assert_eq!(f, f_again);
    assert_eq!(f, f_reloaded);
    assert_eq!(df, df_reloaded);
    assert_eq!(first_model.f_points_calls.get(), 1);
    assert_eq!(first_model.df_points_calls.get(), 1);
    assert_eq!(second_model.f_points_calls.get(), 0);
    assert_eq!(second_model.df_points_calls.get(), 0);
}

#[test]
fn wider_jacobians_are_truncated_to_the_parameter_count() {
    let dir = tempfile::tempdir().unwrap();
    let model = Rc::new(CountingModel::default());
    model.extra_columns.set(2);
    let data_base = wod(&model, dir.path());

    let df = data_base.df(&[1.0, 0.5]).unwrap();

    assert_eq!(df.dim(), (5, 2));
    assert_eq!(df.row(3), array![2.0, 2.0]);
    assert_eq!(model.df_points_calls.get(), 1);
}

#[test]
// Purpose
// -------
// A cached Jacobian narrower than the parameter vector is recomputed and
// the stored entry replaced.
//
// Given
// -----
// - A one-column DF seeded under the DF file of `p = (1, 0.5)`.
//
// Expect
// ------
// - `df` calls the model once and returns two columns; a fresh instance
//   reads the replaced two-column entry without calling the model.
fn narrow_cached_jacobians_are_recomputed_and_replaced() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let data_base = wod(&model, dir.path());
    let filename =
        FilenameTemplate::new(WOD_DF_FILENAME).render(&[("step_size", STEP_SIZE.into())]).unwrap();
    data_base
        .core()
        .boxes_cache()
        .save_value(
            &ParameterKey::new(&p),
            &filename,
            &EntryKey::df(),
            Array2::<f64>::zeros((5, 1)).into_dyn(),
            PersistOptions::default(),
        )
        .unwrap();

    // Act
    let df = data_base.df(&p).unwrap();
    let fresh_model = Rc::new(CountingModel::default());
    let reloaded = wod(&fresh_model, dir.path()).df(&p).unwrap();

    // Assert
    assert_eq!(df.dim(), (5, 2));
    assert_eq!(df.column(0), array![1.0, 0.0, 1.0, 2.0, 1.0]);
    assert_eq!(model.df_points_calls.get(), 1);
    assert_eq!(reloaded, df);
    assert_eq!(fresh_model.df_points_calls.get(), 0);
}

#[test]
// Purpose
// -------
// Coarser box resolutions are averaged from the canonical 12-step series
// without a second model run.
//
// Given
// -----
// - `f = p0·(tr+1) + p1·t + x + z` at 12 steps, requested at 12 and 4.
//
// Expect
// ------
// - Quarterly bins average `t ∈ {3k, 3k+1, 3k+2}`, i.e. `t = 3k + 1`.
// - One model call per quantity; DF keeps its parameter axis.
fn box_outputs_are_averaged_from_the_canonical_resolution() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let data_base = wod(&model, dir.path());

    // Act
    let monthly = data_base.f_boxes(&p, 12, false).unwrap();
    let quarterly = data_base.f_boxes(&p, 4, false).unwrap();
    let df_quarterly = data_base.df_boxes(&p, 4, true).unwrap();

    // Assert
    assert_eq!(monthly.shape(), &BOX_SHAPE);
    assert_eq!(quarterly.shape(), &[2, 4, 2, 1, 2]);
    for k in 0..4 {
        let expected = 1.0 * 2.0 + 0.5 * (3 * k + 1) as f64 + 1.0;
        assert_abs_diff_eq!(quarterly.view()[[1, k, 1, 0, 0]], expected, epsilon = 1e-12);
    }
    assert_eq!(df_quarterly.shape(), &[2, 4, 2, 1, 2, 2]);
    assert_abs_diff_eq!(df_quarterly.view()[[0, 2, 0, 0, 0, 1]], 7.0, epsilon = 1e-12);
    assert_eq!(model.f_boxes_calls.get(), 1);
    assert_eq!(model.df_boxes_calls.get(), 1);
}

#[test]
// Purpose
// -------
// WOA measurements are the observed shallow boxes per month followed by
// the observed deep boxes as time means, with scaled annual deviations.
//
// Given
// -----
// - Layers at depths 0 and 100 with threshold 50 (index 1).
// - No observations for tracer 1 at `x = 1`.
//
// Expect
// ------
// - `m = 24 + 12 + 2 + 1 = 39`.
// - First row `p0`; last row `2·p0 + 5.5·p1 + 1`.
// - Monthly deviations 1, annual deviations 1/12.
fn woa_measurements_split_monthly_and_annual_boxes() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let threshold = AnnualThreshold::new(vec![0.0, 100.0], 50.0);
    let woa = Woa::new(model.clone(), Rc::new(FixedBoxes), &threshold, &DataBaseOptions::new(dir.path()));

    // Act
    let f = woa.f(&p).unwrap();
    let df = woa.df(&p).unwrap();
    let deviations = woa.deviations().unwrap();
    let diff = woa.diff_boxes(&p, false, -9999.0).unwrap();

    // Assert
    assert_eq!(woa.annual_threshold_index(), 1);
    assert_eq!(woa.m().unwrap(), 39);
    assert_abs_diff_eq!(f[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(f[38], 2.0 + 5.5 * 0.5 + 1.0, epsilon = 1e-12);
    assert_eq!(df.row(38), array![2.0, 5.5]);
    assert_abs_diff_eq!(deviations[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(deviations[38], 1.0 / 12.0, epsilon = 1e-12);
    assert_eq!(diff[[1, 0, 1, 0, 0]], -9999.0);
    assert_abs_diff_eq!(diff[[0, 0, 0, 0, 0]], 2.0 - 1.0, epsilon = 1e-12);
    assert_eq!(model.f_boxes_calls.get(), 1);
    assert_eq!(woa.mask().unwrap().iter().filter(|&&m| m).count(), 2 * 12 * 2 * 2 - 12 * 2);
}

#[test]
// Purpose
// -------
// `WodTmm` exposes the near-water subset of the inner `Wod`, sharing its
// model outputs.
//
// Given
// -----
// - DOP sites 0, 2 and PO4 site 1 kept.
//
// Expect
// ------
// - Name `WOD_TMM_1`; results, deviations, F and DF are the selected rows.
// - Group sizes (2, 1); correlation matrices of the filtered size.
fn wod_tmm_selects_near_water_rows() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let tmm = WodTmm::new(
        model.clone(),
        Rc::new(FixedPoints),
        Rc::new(FixedNearWater),
        Rc::new(UniformCorrelation),
        1,
        &DataBaseOptions::new(dir.path()),
    );

    // Act
    let results = tmm.results().unwrap();
    let f = tmm.f(&p).unwrap();
    let df = tmm.df(&p).unwrap();
    let spec = CorrelationSpec::new(40);
    let correlation = tmm.correlation_matrix(&spec).unwrap();
    let cholesky = tmm.correlation_matrix_cholesky_decomposition(&spec).unwrap();

    // Assert
    assert_eq!(tmm.name(), "WOD_TMM_1");
    assert_eq!(*results, array![1.1, 1.55, 1.4]);
    assert_eq!(*tmm.deviations().unwrap(), array![0.5, 0.5, 0.25]);
    assert_eq!(f, array![1.0, 1.5, 1.5]);
    assert_eq!(df, array![[1.0, 0.0], [1.0, 1.0], [1.0, 1.0]]);
    assert_eq!((tmm.m_dop().unwrap(), tmm.m_po4().unwrap()), (2, 1));
    assert_eq!(correlation.nrows(), 3);
    let product = &*cholesky * cholesky.transpose();
    assert_abs_diff_eq!(product[(0, 1)], 0.2, epsilon = 1e-12);
    assert_eq!(model.f_points_calls.get(), 1);
    assert_eq!(tmm.points_near_water_mask_concatenated().unwrap().len(), 5);
}

#[test]
// Purpose
// -------
// The block GLS information matrix equals the dense `JᵀΣ⁻¹J` with
// `Σ = D C D`, `D = diag(σ)` and `C` the block correlation matrix.
//
// Given
// -----
// - `(a, b, c) = (0.3, 0.2, 0.1)` stored for `p`; three DOP and two PO4 sites.
//
// Expect
// ------
// - Agreement to 1e-10 with the nalgebra inverse.
// - GLS on gridded data is rejected.
fn gls_information_matches_dense_inverse() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let data_base = AnyDataBase::Wod(wod(&model, dir.path()));
    write_correlation_parameters(data_base.as_data_base(), &p, "0.3\n0.2\n0.1\n");
    let kind: CostFunctionKind = "GLS".parse().unwrap();

    // Act
    let information = information_matrix(&kind, &data_base, &p, Precision::Extended).unwrap();

    // Assert
    let (a, b, c) = (0.3, 0.2, 0.1);
    let correlation = DMatrix::from_fn(5, 5, |i, j| match (i < 3, j < 3) {
        _ if i == j => 1.0,
        (true, true) => a,
        (false, false) => b,
        _ => c,
    });
    let (expected, _) = dense_gls(data_base.as_data_base(), &p, &correlation);
    for i in 0..2 {
        for j in 0..2 {
            assert_abs_diff_eq!(information[[i, j]], expected[(i, j)], epsilon = 1e-10);
        }
    }

    let woa = AnyDataBase::Woa(Woa::new(
        model.clone(),
        Rc::new(FixedBoxes),
        &AnnualThreshold::new(vec![0.0, 100.0], 50.0),
        &DataBaseOptions::new(dir.path()),
    ));
    assert!(matches!(
        information_matrix(&kind, &woa, &p, Precision::Standard),
        Err(AccuracyError::RequiresPointData { .. })
    ));
}

#[test]
// Purpose
// -------
// `GLS.<min>.<years>` whitens with the estimated correlation matrix of
// exactly those thresholds.
//
// Given
// -----
// - The five-site `Wod`; "GLS.40.-1" (off-diagonal 0.2) and "GLS.1.5"
//   (off-diagonal 0.3).
//
// Expect
// ------
// - Information and cost agree with the dense `JᵀΣ⁻¹J` and `rᵀΣ⁻¹r` of each
//   matrix; the two configurations give different information matrices.
fn gls_thresholds_select_the_correlation_matrix() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let data_base = AnyDataBase::Wod(wod(&model, dir.path()));
    let unlimited: CostFunctionKind = "GLS.40.-1".parse().unwrap();
    let limited: CostFunctionKind = "GLS.1.5".parse().unwrap();

    // Act
    let information_unlimited =
        information_matrix(&unlimited, &data_base, &p, Precision::Standard).unwrap();
    let information_limited = information_matrix(&limited, &data_base, &p, Precision::Standard).unwrap();
    let cost_unlimited = cost_function_value(&unlimited, &data_base, &p, Precision::Standard).unwrap();

    // Assert
    let db = data_base.as_data_base();
    let (expected_unlimited, expected_cost) = dense_gls(db, &p, &UniformCorrelation::dense(5, 0.2));
    let (expected_limited, _) = dense_gls(db, &p, &UniformCorrelation::dense(5, 0.3));
    for i in 0..2 {
        for j in 0..2 {
            assert_abs_diff_eq!(information_unlimited[[i, j]], expected_unlimited[(i, j)], epsilon = 1e-10);
            assert_abs_diff_eq!(information_limited[[i, j]], expected_limited[(i, j)], epsilon = 1e-10);
        }
    }
    assert_abs_diff_eq!(cost_unlimited, expected_cost, epsilon = 1e-10);
    assert!((information_unlimited[[0, 1]] - information_limited[[0, 1]]).abs() > 1e-3);
}

#[test]
// Purpose
// -------
// Legacy kinds read their frozen factors for GLS with the legacy diagonal
// floor and reject configurations without artifacts.
//
// Given
// -----
// - `OldWodTmm` over one land box with identity factors and the `Wod`
//   deviations.
//
// Expect
// ------
// - "GLS.40.-1" equals the WLS information of the same sites.
// - "GLS.40.5" fails with a legacy parameter mismatch on the year limit.
// - The historical display name "OLDWOD_TMM_1".
fn legacy_gls_uses_frozen_factors() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let options = DataBaseOptions::new(dir.path());
    let old = AnyDataBase::OldWodTmm(OldWodTmm::legacy(
        model.clone(),
        Rc::new(FixedPoints),
        Rc::new(FixedNearWater),
        Rc::new(UniformCorrelation),
        Rc::new(IdentityArtifacts),
        1,
        &options,
    ));
    let gls: CostFunctionKind = "GLS.40.-1".parse().unwrap();
    let year_limited: CostFunctionKind = "GLS.40.5".parse().unwrap();

    // Act
    let information = information_matrix(&gls, &old, &p, Precision::Standard).unwrap();
    let weighted = information_matrix(&CostFunctionKind::Wls, &old, &p, Precision::Standard).unwrap();
    let rejected = information_matrix(&year_limited, &old, &p, Precision::Standard);

    // Assert
    assert_eq!(old.as_data_base().name(), "OLDWOD_TMM_1");
    for (a, b) in information.iter().zip(weighted.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-10);
    }
    assert!(matches!(
        rejected,
        Err(AccuracyError::DataBase(DataBaseError::LegacyParameterMismatch { name: "max_year_diff", .. }))
    ));
}

#[test]
// Purpose
// -------
// OLS parameter confidences follow `t · sqrt(diag((JᵀJ / σ̄²)⁻¹))` and
// model confidences cover the box grid.
//
// Given
// -----
// - The five-site `Wod`, `alpha = 0.95`, matrix type `F`.
//
// Expect
// ------
// - Hand-computed half-widths with three degrees of freedom.
// - Model confidence shaped like `f_boxes`; serial equals parallel.
fn ols_confidences_follow_the_information_matrix() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let data_base = AnyDataBase::Wod(wod(&model, dir.path()));
    let settings =
        ConfidenceSettings { matrix_type: MatrixType::F, include_variance_factor: false, alpha: 0.95 };
    let serial = Asymptotic::new(&data_base, CostFunctionKind::Ols);
    let parallel =
        Asymptotic::new(&data_base, CostFunctionKind::Ols).with_execution_mode(ExecutionMode::Parallel);

    // Act
    let confidence = serial.parameter_confidence(&p, &settings, None, false).unwrap();
    let model_serial = serial.model_confidence(&p, &settings, None, 12, false).unwrap();
    let model_parallel = parallel.model_confidence(&p, &settings, None, 12, false).unwrap();
    let average = serial.average_model_confidence(&p, &settings, None, 12, true, false).unwrap();

    // Assert
    let jacobian = DMatrix::<f64>::from_row_slice(5, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 1.0, 1.0]);
    let average_variance = (3.0 * 0.25 + 2.0 * 0.0625) / 5.0;
    let covariance = (jacobian.transpose() * &jacobian / average_variance).try_inverse().unwrap();
    let t = ndop_db::accuracy::t_quantile(0.95, 3).unwrap();
    for i in 0..2 {
        assert_abs_diff_eq!(confidence[i], t * covariance[(i, i)].sqrt(), epsilon = 1e-10);
    }
    assert_eq!(model_serial.shape(), &BOX_SHAPE);
    assert_eq!(model_serial, model_parallel);
    assert_eq!(average.len(), 2);
    assert!(average.iter().all(|v| v.is_finite() && *v > 0.0));
    assert_eq!(serial.degrees_of_freedom(&p).unwrap(), 3);
    assert_eq!(
        serial.covariance_matrix(&p, MatrixType::FH, false, None),
        Err(AccuracyError::MissingHessian)
    );
}

#[test]
// Purpose
// -------
// Each candidate box reports how much one added observation there shrinks
// the overall average model confidence; serial and parallel agree.
//
// Given
// -----
// - The five-site `Wod` under WLS, box deviations 0.5 with NaN for tracer 1
//   at `z = 1`, candidates on a 4-step grid, model confidence at 12 steps.
// - A value mask excluding tracer 0 at `x = 1`.
//
// Expect
// ------
// - Shape `(2, 4, 2, 1, 2)`; NaN exactly at masked or NaN-deviation boxes.
// - The candidate with gradient `(1, 1)` matches a dense recomputation with
//   `I + 4·g gᵀ` and one more degree of freedom.
// - Every other candidate is a strictly positive increase.
fn confidence_increase_ranks_candidate_boxes() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let p = [1.0, 0.5];
    let model = Rc::new(CountingModel::default());
    let data_base =
        AnyDataBase::Wod(wod(&model, dir.path()).with_deviation_boxes(Rc::new(HalfDeviations)));
    let settings =
        ConfidenceSettings { matrix_type: MatrixType::F, include_variance_factor: false, alpha: 0.95 };
    let mask = ArrayD::from_shape_fn(IxDyn(&[2, 4, 2, 1, 2]), |idx| !(idx[0] == 0 && idx[2] == 1));
    let serial = Asymptotic::new(&data_base, CostFunctionKind::Wls);
    let parallel =
        Asymptotic::new(&data_base, CostFunctionKind::Wls).with_execution_mode(ExecutionMode::Parallel);

    // Act
    let increase_serial = serial
        .average_model_confidence_increase(&p, &settings, None, 1, 4, 12, Some(mask.view()), false, false)
        .unwrap();
    let increase_parallel = parallel
        .average_model_confidence_increase(&p, &settings, None, 1, 4, 12, Some(mask.view()), false, false)
        .unwrap();

    // Assert
    assert_eq!(increase_serial.shape(), &[2, 4, 2, 1, 2]);
    for (s, q) in increase_serial.iter().zip(increase_parallel.iter()) {
        assert_eq!(s.to_bits(), q.to_bits());
    }
    for (idx, value) in increase_serial.indexed_iter() {
        let excluded = (idx[0] == 0 && idx[2] == 1) || (idx[0] == 1 && idx[4] == 1);
        assert_eq!(value.is_nan(), excluded, "box {idx:?}");
        assert!(excluded || *value > 0.0, "box {idx:?}");
    }

    let jacobian = DMatrix::<f64>::from_row_slice(5, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 1.0, 1.0]);
    let weights = DMatrix::from_diagonal(&DVector::from_vec(vec![4.0, 4.0, 4.0, 16.0, 16.0]));
    let information = jacobian.transpose() * weights * &jacobian;
    let average = |information: &DMatrix<f64>, dof: usize| {
        let covariance = information.clone().try_inverse().unwrap();
        let t = ndop_db::accuracy::t_quantile(0.95, dof).unwrap();
        let mut sum = 0.0;
        for tracer in 0..2 {
            for step in 0..12 {
                let g = DVector::from_vec(vec![(tracer + 1) as f64, step as f64]);
                sum += t * (g.transpose() * &covariance * &g)[(0, 0)].sqrt();
            }
        }
        sum / 24.0
    };
    let g = DVector::from_vec(vec![1.0, 1.0]);
    let updated = &information + &g * g.transpose() * 4.0;
    let expected = average(&information, 3) - average(&updated, 4);
    assert_abs_diff_eq!(increase_serial[[0, 0, 0, 0, 0]], expected, epsilon = 1e-9);
}

#[test]
// Purpose
// -------
// Family members built from a registry share one database, so the model
// runs once for all of them.
//
// Given
// -----
// - Two members registered for "WOD" scaling `sum(F)` by 1 and 2.
//
// Expect
// ------
// - Results `[s, 2s]`, one model call; unknown kinds list the registered ones.
fn family_members_share_cached_outputs() {
    // Arrange
    struct Member {
        data_base: Rc<Wod>,
        scale: f64,
    }
    let dir = tempfile::tempdir().unwrap();
    let model = Rc::new(CountingModel::default());
    let mut registry: FamilyRegistry<Wod, Member> = FamilyRegistry::new();
    registry.register("WOD", |data_base| Member { data_base, scale: 1.0 });
    registry.register("wod", |data_base| Member { data_base, scale: 2.0 });
    let shared = Rc::new(wod(&model, dir.path()));

    // Act
    let family = Family::from_registry("Wod", &registry, shared.clone()).unwrap();
    let sums = family.apply(|member| Ok(member.data_base.f(&[1.0, 0.5])?.sum() * member.scale)).unwrap();
    let unknown = Family::from_registry("WOA", &registry, shared);

    // Assert
    assert_eq!(family.len(), 2);
    assert_abs_diff_eq!(sums[0], 7.5, epsilon = 1e-12);
    assert_abs_diff_eq!(sums[1], 15.0, epsilon = 1e-12);
    assert_eq!(model.f_points_calls.get(), 1);
    assert!(Rc::ptr_eq(&family.members()[1].data_base, family.data_base()));
    match unknown {
        Err(DataBaseError::UnknownDataKind { value, allowed }) => {
            assert_eq!(value, "WOA");
            assert_eq!(allowed, "WOD");
        }
        _ => panic!("expected an unknown data kind"),
    }
}

#[test]
fn init_data_base_builds_configured_kinds_and_reports_missing_sources() {
    let dir = tempfile::tempdir().unwrap();
    let options = DataBaseOptions::new(dir.path());
    let model = Rc::new(CountingModel::default());
    let mut collaborators = Collaborators::new(model.clone());
    collaborators.point_measurements = Some(Rc::new(FixedPoints));
    collaborators.correlations = Some(Rc::new(UniformCorrelation));

    let missing = init_data_base("WOD.1".parse::<DataKind>().unwrap(), &collaborators, &options);
    assert!(matches!(
        missing,
        Err(DataBaseError::MissingCollaborator { name: "near-water filter" })
    ));

    collaborators.near_water = Some(Rc::new(FixedNearWater));
    let tmm = init_data_base(DataKind::WodTmm { max_land_boxes: 1 }, &collaborators, &options).unwrap();
    assert_eq!(tmm.as_data_base().name(), "WOD_TMM_1");
    assert_eq!(tmm.as_point_data_base().unwrap().m_dop().unwrap(), 2);

    let wod = init_data_base(DataKind::Wod, &collaborators, &options).unwrap();
    assert_eq!(wod.as_data_base().m().unwrap(), 5);
    assert!(matches!(
        init_data_base(DataKind::Woa, &collaborators, &options),
        Err(DataBaseError::MissingCollaborator { name: "box measurements" })
    ));

    collaborators.box_measurements = Some(Rc::new(FixedBoxes));
    collaborators.annual_threshold = Some(AnnualThreshold::new(vec![0.0, 100.0], 50.0));
    let woa = init_data_base(DataKind::Woa, &collaborators, &options).unwrap();
    assert!(woa.as_point_data_base().is_none());
    assert_eq!(woa.as_data_base().f(&[1.0, 0.5]).unwrap().len(), 39);
    let shallow = woa.as_data_base().f_boxes(&[1.0, 0.5], 12, false).unwrap();
    assert_eq!(shallow.view().slice(s![0, .., 0, 0, 0]).len(), 12);
}
