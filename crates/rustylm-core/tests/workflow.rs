//! End-to-end checks: data -> formula -> fit -> summaries -> plots.

use approx::assert_abs_diff_eq;
use rustylm_core::diagnostics::jarque_bera;
use rustylm_core::simulate::{linspace, simulate, Deterministic, NormalErrors};
use rustylm_core::tidy::write_csv;
use rustylm_core::{
    compare_lm, diagnostic_plots, fit_plot, run_variance_study, DataFrame, GeneralizedLinearModel,
    GlmOptions, LikelihoodKind, Line, LinearModel, LmOptions, RustyLmError, StudyConfig, Tidy,
    VarianceMethod,
};

fn small() -> DataFrame {
    DataFrame::new()
        .with_numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])
        .unwrap()
        .with_numeric("y", vec![2.0, 4.0, 5.0, 4.0, 5.0])
        .unwrap()
}

#[test]
fn test_closed_form_simple_regression() {
    // Sxy = 6, Sxx = 10, RSS = 2.4, SST = 6
    let fit = LinearModel::fit("y ~ x", &small(), &LmOptions::default()).unwrap();
    assert_abs_diff_eq!(fit.coefficients()[0], 2.2, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.coefficients()[1], 0.6, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.rss(), 2.4, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.r_squared(), 0.6, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.sigma2_ml(), 2.4 / 5.0, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.sigma2_reml(), 2.4 / 3.0, epsilon = 1e-10);
    // se(slope) = sqrt(σ²_REML / Sxx)
    assert_abs_diff_eq!(fit.std_errors()[1], (0.8f64 / 10.0).sqrt(), epsilon = 1e-10);
    assert_abs_diff_eq!(fit.log_likelihood(LikelihoodKind::Ml), -5.259769728322863, epsilon = 1e-9);
    assert_abs_diff_eq!(fit.aic(), 16.519539456645724, epsilon = 1e-9);
}

#[test]
fn test_ols_equals_gaussian_maximum_likelihood() {
    let data = small();
    let ols = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();
    let ml = GeneralizedLinearModel::fit("y ~ x", &data, &GlmOptions::default()).unwrap();

    for j in 0..2 {
        assert_abs_diff_eq!(ols.coefficients()[j], ml.coefficients()[j], epsilon = 1e-8);
        assert_abs_diff_eq!(ols.std_errors()[j], ml.std_errors()[j], epsilon = 1e-8);
    }
    assert_abs_diff_eq!(ml.deviance(), ols.rss(), epsilon = 1e-8);
    assert_abs_diff_eq!(ml.dispersion(), ols.sigma2_reml(), epsilon = 1e-8);
    assert_abs_diff_eq!(
        ml.log_likelihood(),
        ols.log_likelihood(LikelihoodKind::Ml),
        epsilon = 1e-8
    );
    assert_abs_diff_eq!(ml.aic(), ols.aic(), epsilon = 1e-8);
}

#[test]
fn test_variance_method_changes_sigma_not_coefficients() {
    let data = small();
    let reml = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();
    let ml = LinearModel::fit(
        "y ~ x",
        &data,
        &LmOptions {
            variance_method: VarianceMethod::Ml,
            ..LmOptions::default()
        },
    )
    .unwrap();
    assert_eq!(reml.coefficients(), ml.coefficients());
    assert_abs_diff_eq!(ml.sigma2(), reml.sigma2() * 3.0 / 5.0, epsilon = 1e-12);
    assert!(ml.std_errors()[1] < reml.std_errors()[1]);
}

#[test]
fn test_deterministic_data_is_fitted_exactly() {
    let xs = linspace(0.0, 5.0, 11);
    let data = simulate(&Deterministic(Line::new(-1.0, 0.5)), &xs, 0).unwrap();
    let fit = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();
    assert_abs_diff_eq!(fit.coefficients()[0], -1.0, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.coefficients()[1], 0.5, epsilon = 1e-10);
    assert!(fit.rss() < 1e-20);
}

#[test]
fn test_stochastic_workflow_to_tables_and_plots() {
    let model = NormalErrors::new(Line::new(1.0, 2.0), 1.0).unwrap();
    let xs = linspace(0.0, 10.0, 60);
    let data = simulate(&model, &xs, 11).unwrap();

    let fit = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();
    assert_abs_diff_eq!(fit.coefficients()[1], 2.0, epsilon = 0.2);

    let rows = fit.tidy(0.95).unwrap();
    assert!(rows[1].conf_low < 2.0 && 2.0 < rows[1].conf_high);
    let mut csv = Vec::new();
    write_csv(&fit.augment(), &mut csv).unwrap();
    assert_eq!(String::from_utf8(csv).unwrap().lines().count(), 61);

    let text = fit.summary().unwrap().to_string();
    assert!(text.contains("Multiple R-squared"));

    let jb = jarque_bera(&fit.residuals().to_vec()).unwrap();
    assert!(jb.p_value > 0.001);

    let mut plots = vec![fit_plot(&fit, &data, "x").unwrap()];
    plots.extend(diagnostic_plots(&fit).unwrap());
    for plot in &plots {
        let svg = plot.to_svg(640, 480).unwrap();
        assert!(svg.contains(&plot.title.replace('<', "&lt;")));
    }
}

#[test]
fn test_nested_models_with_a_factor() {
    let data = DataFrame::new()
        .with_numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0])
        .unwrap()
        .with_factor("g", &["a", "b", "c", "a", "b", "c", "a", "b", "c"])
        .unwrap()
        .with_numeric("y", vec![1.1, 3.9, 6.2, 4.0, 7.1, 8.8, 7.2, 9.9, 12.1])
        .unwrap();
    let small = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();
    let full = LinearModel::fit("y ~ x + g", &data, &LmOptions::default()).unwrap();
    assert_eq!(
        full.coefficient_names(),
        &["(Intercept)", "x", "gb", "gc"]
    );

    let cmp = compare_lm(&[&small, &full]).unwrap();
    assert_eq!(cmp.rows.len(), 2);
    assert_abs_diff_eq!(cmp.rows[1].df.unwrap(), 2.0, epsilon = 1e-12);
    assert!(cmp.rows[1].p_value.unwrap() < 0.05);
}

#[test]
fn test_aliased_column_is_reported_by_name() {
    let data = DataFrame::new()
        .with_numeric("x", vec![1.0, 2.0, 3.0, 4.0])
        .unwrap()
        .with_numeric("x2", vec![2.0, 4.0, 6.0, 8.0])
        .unwrap()
        .with_numeric("y", vec![1.0, 3.0, 2.0, 5.0])
        .unwrap();
    match LinearModel::fit("y ~ x + x2", &data, &LmOptions::default()) {
        Err(RustyLmError::RankDeficient(cols)) => assert_eq!(cols, vec!["x2".to_string()]),
        other => panic!("expected rank deficiency, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_study_reproduces_ml_bias() {
    let report = run_variance_study(&StudyConfig {
        n: 8,
        replicates: 400,
        seed: 2024,
        ..StudyConfig::default()
    })
    .unwrap();
    assert_abs_diff_eq!(report.expected_sigma2_ml, 0.75, epsilon = 1e-12);
    assert!(report.mean_sigma2_ml < report.mean_sigma2_reml);
    assert_abs_diff_eq!(report.mean_sigma2_reml, 1.0, epsilon = 0.1);
}
