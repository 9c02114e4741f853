//! Matched (periodic) Twiss parameters of a one-period transfer matrix.
//!
//! For a stable plane with one-period block `M`, the Courant-Snyder form is
//! `M = I cos(mu) + J sin(mu)` with `J = [[alpha, beta], [-gamma, -alpha]]`,
//! so the trace gives `mu` and the off-trace elements give the Twiss
//! parameters. The periodic dispersion is the fixed point of
//! `d -> M4 d + r`, i.e. the solution of `(I - M4) d = r`.

use crate::error::{Result, TwissError};
use crate::matrix::{Plane, RowSelector, TransferMatrix, TransferTable};
use crate::settings::TwissSettings;
use crate::twiss::{Dispersion, PeriodicPhase, PlaneTwiss, Stability, TwissParameters};
use nalgebra::{Matrix4, Vector4};
use tracing::{debug, warn};

/// Periodic Twiss parameters at the selected row, with default settings.
pub fn compute_periodic_twiss(
    matrix: &TransferTable,
    end: &RowSelector,
) -> Result<TwissParameters> {
    compute_periodic_twiss_with(matrix, end, &TwissSettings::default())
}

pub fn compute_periodic_twiss_with(
    matrix: &TransferTable,
    end: &RowSelector,
    settings: &TwissSettings,
) -> Result<TwissParameters> {
    settings.validate()?;
    let row = matrix.select(end)?;
    debug!(label = ?row.label, "computing periodic Twiss parameters");
    periodic_twiss_of(&row.matrix, settings)
}

/// Periodic Twiss parameters of a single one-period matrix.
pub fn periodic_twiss_of(m: &TransferMatrix, settings: &TwissSettings) -> Result<TwissParameters> {
    let (horizontal, horizontal_phase) = plane_periodic_twiss(m, Plane::Horizontal);
    let (vertical, vertical_phase) = plane_periodic_twiss(m, Plane::Vertical);
    let d = periodic_dispersion(m, settings.singularity_tolerance)?;
    let dispersion = Dispersion::from_si([d[0], d[1], d[2], d[3]]);

    Ok(TwissParameters::new(horizontal, vertical, dispersion)?
        .with_periodic_phase(horizontal_phase, vertical_phase))
}

/// Phase advance from `cos(mu)`, checking the stability condition first.
///
/// Outside `[-1, 1]` the motion is unstable: a warning is emitted and `mu` is
/// NaN. The boundary values give `0` and `pi`.
pub fn phase_from_cos_mu(cos_mu: f64, plane: Plane) -> PeriodicPhase {
    if (-1.0..=1.0).contains(&cos_mu) {
        PeriodicPhase {
            cos_mu,
            mu: cos_mu.acos(),
            stability: Stability::Stable,
        }
    } else {
        warn!("{plane} motion is unstable; proceed with caution (cos(mu) = {cos_mu}).");
        PeriodicPhase {
            cos_mu,
            mu: f64::NAN,
            stability: Stability::Unstable,
        }
    }
}

fn plane_periodic_twiss(m: &TransferMatrix, plane: Plane) -> (PlaneTwiss, PeriodicPhase) {
    let r = m.plane_block(plane);
    let mut phase = phase_from_cos_mu(r.half_trace(), plane);
    let mut beta = r.r12 / phase.mu.sin();
    if beta < 0.0 {
        beta = -beta;
        phase.mu = -phase.mu;
    }
    let sin_mu = phase.mu.sin();
    let alpha = (r.r11 - r.r22) / (2.0 * sin_mu);
    let gamma = -r.r21 / sin_mu;
    (PlaneTwiss::from_si(alpha, beta, gamma), phase)
}

/// Solves `(I - M4) d = r` for the periodic dispersion `(D_x, D'_x, D_y, D'_y)`.
pub fn periodic_dispersion(
    m: &TransferMatrix,
    singularity_tolerance: f64,
) -> Result<Vector4<f64>> {
    let system = Matrix4::identity() - m.transverse_block();
    let rhs = m.dispersion_column();
    let scale = system.amax().max(1.0);

    let lu = system.lu();
    let pivot = lu
        .u()
        .diagonal()
        .iter()
        .map(|p| p.abs())
        .fold(f64::INFINITY, f64::min);
    if !(pivot > singularity_tolerance * scale) {
        return Err(TwissError::SingularPeriodicSystem { pivot });
    }
    lu.solve(&rhs).ok_or(TwissError::SingularPeriodicSystem { pivot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::fixtures::{drift, thin_dipole, thin_quad, twiss_rotation};
    use nalgebra::Matrix6;
    use std::f64::consts::{FRAC_PI_3, PI};
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` under a subscriber that records warnings, returning its
    /// result and the formatted log lines.
    fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().expect("log buffer").clone();
        let lines = String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect();
        (result, lines)
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    /// Thin-lens FODO cell starting and ending in the middle of the focusing
    /// quadrupole; `focal` is the full-quadrupole focal length.
    fn fodo(half_cell: f64, focal: f64) -> TransferTable {
        TransferTable::accumulate([
            (Some("QF_HALF"), thin_quad(2.0 * focal)),
            (Some("D1"), drift(half_cell)),
            (Some("QD"), thin_quad(-focal)),
            (Some("D2"), drift(half_cell)),
            (Some("END"), thin_quad(2.0 * focal)),
        ])
    }

    #[test]
    fn fodo_cell_matches_analytic_solution() {
        let (l, f) = (1.0, 1.0);
        let table = fodo(l, f);
        let twiss = compute_periodic_twiss(&table, &RowSelector::Last).expect("periodic twiss");

        // sin(mu/2) = L / 2f
        let mu = 2.0 * (l / (2.0 * f)).asin();
        assert!((mu - FRAC_PI_3).abs() < 1e-12);
        let half = (mu / 2.0).sin();
        let beta_max = 2.0 * l * (1.0 + half) / mu.sin();
        let beta_min = 2.0 * l * (1.0 - half) / mu.sin();

        let h = twiss.periodic_phase(Plane::Horizontal).expect("phase");
        let v = twiss.periodic_phase(Plane::Vertical).expect("phase");
        assert!((h.mu - mu).abs() < 1e-12);
        assert!((v.mu - mu).abs() < 1e-12);
        assert!((h.cos_mu - 0.5).abs() < 1e-12);
        assert!((h.tune() - 1.0 / 6.0).abs() < 1e-12);

        assert!((twiss.beta(Plane::Horizontal).magnitude() - beta_max).abs() < 1e-12);
        assert!((twiss.beta(Plane::Vertical).magnitude() - beta_min).abs() < 1e-12);
        assert!(twiss.alpha(Plane::Horizontal).abs() < 1e-12);
        assert!(twiss.alpha(Plane::Vertical).abs() < 1e-12);
        twiss.check_courant_snyder(1e-9).expect("invariant");

        let d = twiss.dispersion();
        assert_eq!(d.horizontal.magnitude(), 0.0);
        assert_eq!(d.vertical_prime.magnitude(), 0.0);
    }

    #[test]
    fn label_selector_uses_last_match() {
        let mut table = fodo(1.0, 1.0);
        let cell = table.rows()[4].matrix;
        table.push(Some("END".into()), cell.then(&cell));
        table.push(Some("TAIL".into()), drift(100.0));

        let by_label =
            compute_periodic_twiss(&table, &RowSelector::Label("END".into())).expect("label");
        let mu = by_label.periodic_phase(Plane::Horizontal).expect("phase").mu;
        assert!((mu - 2.0 * FRAC_PI_3).abs() < 1e-12);

        let by_index = compute_periodic_twiss(&table, &RowSelector::Index(4)).expect("index");
        let mu = by_index.periodic_phase(Plane::Horizontal).expect("phase").mu;
        assert!((mu - FRAC_PI_3).abs() < 1e-12);

        assert_err_contains(
            compute_periodic_twiss(&table, &RowSelector::Label("QX".into())),
            "QX",
        );
        assert_err_contains(
            compute_periodic_twiss(&TransferTable::new(), &RowSelector::Last),
            "empty",
        );
    }

    #[test]
    fn periodic_dispersion_is_a_fixed_point() {
        let table = TransferTable::accumulate([
            (None::<String>, thin_quad(2.0)),
            (None, drift(1.0)),
            (None, thin_dipole(0.05)),
            (None, thin_quad(-1.0)),
            (None, drift(1.0)),
            (None, thin_dipole(0.05)),
            (None, thin_quad(2.0)),
        ]);
        let m = table.rows()[6].matrix;
        let twiss = compute_periodic_twiss(&table, &RowSelector::Last).expect("periodic twiss");
        let d = twiss.dispersion();
        let dv = Vector4::new(
            d.horizontal.magnitude(),
            d.horizontal_prime.magnitude(),
            d.vertical.magnitude(),
            d.vertical_prime.magnitude(),
        );
        let propagated = m.transverse_block() * dv + m.dispersion_column();
        assert!((propagated - dv).norm() < 1e-12);
        assert!(d.horizontal.magnitude() > 0.0);
        assert_eq!(twiss.get("DY"), twiss.get("DISP1"));
        assert_eq!(twiss.get("DZP"), twiss.get("DISP4"));
    }

    #[test]
    fn negative_r12_flips_beta_and_mu() {
        let m = twiss_rotation((0.5, 4.0, -FRAC_PI_3), (0.0, 2.0, FRAC_PI_3));
        assert!(m.element(1, 2) < 0.0);
        let twiss = periodic_twiss_of(&m, &TwissSettings::default()).expect("periodic twiss");

        let h = twiss.periodic_phase(Plane::Horizontal).expect("phase");
        assert!((h.mu + FRAC_PI_3).abs() < 1e-12);
        assert!((twiss.beta(Plane::Horizontal).magnitude() - 4.0).abs() < 1e-12);
        assert!((twiss.alpha(Plane::Horizontal) - 0.5).abs() < 1e-12);
        assert!((twiss.gamma(Plane::Horizontal).magnitude() - 1.25 / 4.0).abs() < 1e-12);

        let v = twiss.periodic_phase(Plane::Vertical).expect("phase");
        assert!((v.mu - FRAC_PI_3).abs() < 1e-12);
        assert!((twiss.beta(Plane::Vertical).magnitude() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn boundary_cos_mu_is_stable() {
        let ((zero, pi), warnings) = capture_warnings(|| {
            (
                phase_from_cos_mu(1.0, Plane::Horizontal),
                phase_from_cos_mu(-1.0, Plane::Vertical),
            )
        });
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert_eq!(zero.mu, 0.0);
        assert!(zero.is_stable());
        assert_eq!(pi.mu, PI);
        assert!(pi.is_stable());

        let (unstable, warnings) =
            capture_warnings(|| phase_from_cos_mu(1.0 + 1e-9, Plane::Horizontal));
        assert_eq!(unstable.stability, Stability::Unstable);
        assert!(unstable.mu.is_nan());
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("WARN"));
        assert!(warnings[0].contains("horizontal motion is unstable"));
        assert!(warnings[0].contains("cos(mu) = 1.000000001"));
    }

    #[test]
    fn below_minus_one_warns() {
        let (phase, warnings) = capture_warnings(|| phase_from_cos_mu(-1.5, Plane::Vertical));
        assert!(!phase.is_stable());
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("vertical motion is unstable"));
        assert!(warnings[0].contains("cos(mu) = -1.5"));
    }

    #[test]
    fn half_integer_plane_still_solves() {
        let mut m = Matrix6::identity();
        m[(0, 0)] = -1.0;
        m[(1, 1)] = -1.0;
        let rotation = twiss_rotation((0.0, 1.0, 0.0), (0.0, 3.0, 1.0));
        for i in 2..4 {
            for j in 2..4 {
                m[(i, j)] = rotation.as_matrix()[(i, j)];
            }
        }
        let twiss = periodic_twiss_of(&TransferMatrix::from_matrix(m), &TwissSettings::default())
            .expect("no error at the boundary");
        let h = twiss.periodic_phase(Plane::Horizontal).expect("phase");
        assert_eq!(h.mu, PI);
        assert!(h.is_stable());
        assert!((twiss.beta(Plane::Vertical).magnitude() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn unstable_plane_warns_and_continues() {
        let mut m = Matrix6::identity();
        let (ch, sh) = (1.0_f64.cosh(), 1.0_f64.sinh());
        m[(0, 0)] = ch;
        m[(0, 1)] = sh;
        m[(1, 0)] = sh;
        m[(1, 1)] = ch;
        let rotation = twiss_rotation((0.0, 1.0, 0.0), (0.2, 5.0, 0.7));
        for i in 2..4 {
            for j in 2..4 {
                m[(i, j)] = rotation.as_matrix()[(i, j)];
            }
        }
        let (result, warnings) = capture_warnings(|| {
            periodic_twiss_of(&TransferMatrix::from_matrix(m), &TwissSettings::default())
        });
        let twiss = result.expect("instability is not fatal");
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("horizontal motion is unstable"));

        let h = twiss.periodic_phase(Plane::Horizontal).expect("phase");
        assert_eq!(h.stability, Stability::Unstable);
        assert!((h.cos_mu - ch).abs() < 1e-15);
        assert!(h.mu.is_nan());
        assert!(twiss.beta(Plane::Horizontal).magnitude().is_nan());
        assert!(twiss.check_courant_snyder(1e-9).is_err());

        let v = twiss.periodic_phase(Plane::Vertical).expect("phase");
        assert!(v.is_stable());
        assert!((twiss.alpha(Plane::Vertical) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn unit_eigenvalue_is_singular() {
        let m = drift(2.0).then(&thin_dipole(0.01));
        let err = periodic_twiss_of(&m, &TwissSettings::default()).expect_err("singular");
        assert!(matches!(err, TwissError::SingularPeriodicSystem { .. }));

        let rotation = twiss_rotation((0.0, 1.0, 0.0), (0.0, 1.0, 0.5));
        assert_err_contains(
            periodic_twiss_of(&rotation, &TwissSettings::default()),
            "singular",
        );
    }

    #[test]
    fn invalid_settings_are_rejected_before_solving() {
        let settings = TwissSettings {
            singularity_tolerance: -1.0,
            ..TwissSettings::default()
        };
        assert_err_contains(
            compute_periodic_twiss_with(&fodo(1.0, 1.0), &RowSelector::Last, &settings),
            "singularity_tolerance",
        );
    }
}
