//! Property-based tests for the analyzer math.

#![cfg(feature = "analysis")]

use adau1401::analysis::impedance::{solve, ComplexReading, Reactance};
use adau1401::analysis::thd::{thd_ratio, ThdReport, HARMONICS};
use adau1401::analysis::ImpedanceCalibration;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// THD does not depend on the overall signal level.
    #[test]
    fn thd_is_scale_invariant(
        levels in prop::array::uniform7(1.0e-4f64..0.08f64),
        scale in 0.1f64..10.0f64,
    ) {
        let mut rms = levels;
        rms[0] = 1.0;
        let mut scaled = [0.0; HARMONICS];
        for (s, r) in scaled.iter_mut().zip(rms.iter()) {
            *s = r * scale;
        }
        let a = thd_ratio(&rms);
        let b = thd_ratio(&scaled);
        prop_assert!((a - b).abs() < 1e-9 * a.max(1.0));
    }

    /// Percent and dB views agree with the ratio.
    #[test]
    fn thd_views_agree(levels in prop::array::uniform7(1.0e-4f64..0.08f64)) {
        let mut rms = levels;
        rms[0] = 0.5;
        let report = ThdReport::from_rms(1000, rms, true);
        prop_assert!((report.percent - report.ratio * 100.0).abs() < 1e-12);
        prop_assert!((10f64.powf(report.db / 20.0) - report.ratio).abs() < 1e-9);
    }

    /// The sign of the parallel reactance decides the element type.
    #[test]
    fn reactance_sign(x in -1.0e6f64..1.0e6f64, f in 1.0f64..20000.0f64) {
        match Reactance::classify(x, f) {
            Reactance::Capacitive { farads } => {
                prop_assert!(x <= 0.0);
                prop_assert!(farads >= 0.0);
            }
            Reactance::Inductive { henries } => {
                prop_assert!(x > 0.0);
                prop_assert!(henries > 0.0);
            }
        }
    }

    /// When a series solution exists, R and X recombine to |Z|. Validity
    /// depends only on `Rp >= Z`, not on the series form existing.
    #[test]
    fn series_solution_is_consistent(
        real in 0.001f64..4.0f64,
        imag in 0.001f64..4.0f64,
        stimulus in 0.001f64..4.0f64,
    ) {
        let reading = ComplexReading { real, imag, stimulus, zoom: 10.0 };
        let report = solve(reading, 1000.0, &ImpedanceCalibration::default());
        if let Some(series) = report.series {
            let z_sq = series.resistance * series.resistance + series.reactance * series.reactance;
            let expected = report.impedance * report.impedance;
            prop_assert!((z_sq - expected).abs() <= 1e-6 * expected.max(1.0));
            prop_assert!(report.valid);
        }
        prop_assert_eq!(report.valid, report.parallel_resistance >= report.impedance);
    }
}
