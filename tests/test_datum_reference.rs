use levsar::core::datum::{DatumParams, DatumReferencer};
use levsar::types::{BenchmarkSeries, GeoPoint, LevelValue};
use approx::assert_abs_diff_eq;
use chrono::NaiveDate;

fn ymd(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn survey_epochs() -> Vec<NaiveDate> {
    vec![
        ymd(2008, 11),
        ymd(2009, 11),
        ymd(2010, 11),
        ymd(2011, 11),
        ymd(2012, 11),
        ymd(2013, 10),
        ymd(2014, 11),
        ymd(2014, 12),
        ymd(2015, 11),
        ymd(2016, 11),
    ]
}

fn benchmark(name: &str, elevations: Vec<LevelValue>) -> BenchmarkSeries {
    BenchmarkSeries::new(
        name,
        GeoPoint::new(-115.5, 33.0),
        survey_epochs(),
        elevations,
        GeoPoint::new(-115.55, 33.0),
    )
    .unwrap()
}

#[test]
fn test_datum_step_keeps_series_continuous() {
    let _ = env_logger::builder().is_test(true).try_init();

    // the 2014 survey is reported twice: against the old datum (-60.070)
    // and re-reduced against the new one (-60.120)
    let elevations = vec![
        Some(-60.000),
        Some(-60.010),
        Some(-60.020),
        Some(-60.030),
        Some(-60.040),
        Some(-60.050),
        Some(-60.070),
        Some(-60.120),
        Some(-60.130),
        Some(-60.140),
    ];
    let out = DatumReferencer::new()
        .reference(&benchmark("A 1", elevations))
        .unwrap();

    let epochs: Vec<NaiveDate> = out.epochs.clone();
    assert_eq!(epochs.len(), 8);
    assert_eq!(epochs[0], ymd(2009, 11));
    assert!(!epochs.contains(&ymd(2008, 11)));
    assert!(!epochs.contains(&ymd(2014, 11)));

    // the re-reduced survey lands where the old-datum value would have been
    let at_post = out.displacements[5].unwrap();
    assert_abs_diff_eq!(at_post, -60.070 - -60.010, epsilon = 1e-9);

    // later surveys keep their spacing relative to the post-correction value
    let later = out.displacements[6].unwrap();
    assert_abs_diff_eq!(later - at_post, -0.010, epsilon = 1e-9);
}

#[test]
fn test_zero_step_is_plain_differencing() {
    let elevations: Vec<LevelValue> = (0..10).map(|i| Some(-60.0 - 0.01 * i as f64)).collect();
    let mut same = elevations.clone();
    same[7] = same[6];
    let series = benchmark("B 2", same.clone());

    let out = DatumReferencer::new().reference(&series).unwrap();
    let base = same[1].unwrap();
    let kept: Vec<usize> = (1..10).filter(|&j| j != 6).collect();
    for (k, &j) in kept.iter().enumerate() {
        assert_abs_diff_eq!(out.displacements[k].unwrap(), same[j].unwrap() - base, epsilon = 1e-12);
    }
}

#[test]
fn test_custom_analysis_start() {
    let elevations: Vec<LevelValue> = (0..10).map(|i| Some(-60.0 - 0.01 * i as f64)).collect();
    let params = DatumParams {
        analysis_start: ymd(2011, 1),
        ..DatumParams::default()
    };
    let out = DatumReferencer::with_params(params)
        .reference(&benchmark("C 3", elevations))
        .unwrap();

    // 2011-11 is now the reference epoch
    assert_eq!(out.epochs[2], ymd(2011, 11));
    assert_eq!(out.displacements[2], Some(0.0));
    assert_abs_diff_eq!(out.displacements[0].unwrap(), 0.02, epsilon = 1e-9);
}

#[test]
fn test_reference_all_keeps_order_and_flags_degenerate() {
    let good: Vec<LevelValue> = (0..10).map(|i| Some(-60.0 - 0.01 * i as f64)).collect();
    let mut lost = vec![None; 10];
    lost[0] = Some(-59.0);

    let survey = vec![benchmark("DATUM", good.clone()), benchmark("LOST 1", lost), benchmark("A 1", good)];
    let out = DatumReferencer::new().reference_all(&survey).unwrap();

    let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["DATUM", "LOST 1", "A 1"]);
    assert!(out[1].displacements.iter().all(|v| v.is_none()));
    assert_eq!(out[2].between(0, 1).unwrap().map(|v| (v * 1000.0).round()), Some(-10.0));
}
