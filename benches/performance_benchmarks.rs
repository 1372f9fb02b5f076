use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pitchrs::aggregator::{SessionMetricsAggregator, WindowPolicy};
use pitchrs::movement::MovementMetricsCalculator;
use pitchrs::risk::{FatigueScorer, FixedAsymmetrySignals, InjuryRiskScorer};
use pitchrs::{Biometrics, ImuData, Movement, Position, Sample, SessionMetrics, Vector3};

/// Performance benchmarks for the metrics pipeline
///
/// Sample windows grow from a few seconds of play to a full half at 10 Hz.

fn create_sample_window(size: usize) -> Vec<Sample> {
    let start = Utc.with_ymd_and_hms(2024, 11, 2, 15, 0, 0).unwrap();

    (0..size)
        .map(|i| {
            let phase = i as f64 / 25.0;
            Sample {
                player_id: "bench".to_string(),
                session_id: "bench-match".to_string(),
                timestamp: start + Duration::milliseconds(i as i64 * 100),
                position: Position {
                    latitude: 0.0005 + phase.sin() * 0.0002,
                    longitude: 0.0005 + phase.cos() * 0.0003,
                    altitude: 30.0,
                    accuracy: 2.0,
                    satellites: 12,
                },
                movement: Movement {
                    speed: 15.0 + phase.sin() * 14.0,
                    acceleration: phase.cos() * 4.0,
                    direction: (i % 360) as f64,
                    imu: Some(ImuData {
                        accelerometer: Vector3::new(0.4, 0.2, 9.8 + phase.sin() * 6.0),
                        gyroscope: Vector3::default(),
                        magnetometer: Vector3::default(),
                    }),
                },
                biometrics: Some(Biometrics {
                    heart_rate: 140 + (i % 40) as u16,
                    body_temperature: 37.5,
                    stress_level: 4,
                }),
                environmental: None,
            }
        })
        .collect()
}

fn bench_movement_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("Movement Metrics");
    let calculator = MovementMetricsCalculator::new();

    for &size in &[100, 1_000, 10_000, 27_000] {
        let samples = create_sample_window(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("calculate", size), &samples, |b, samples| {
            b.iter(|| calculator.calculate(black_box(samples)));
        });
    }

    group.finish();
}

fn bench_session_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Session Aggregation");
    let aggregator = SessionMetricsAggregator::default();
    let as_of = Utc.with_ymd_and_hms(2024, 11, 2, 16, 0, 0).unwrap();

    for &size in &[1_000, 10_000] {
        let samples = create_sample_window(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("full_session", size), &samples, |b, samples| {
            b.iter(|| {
                aggregator.aggregate(
                    "bench",
                    "bench-match",
                    samples.clone(),
                    WindowPolicy::FullSession,
                    &[],
                    as_of,
                )
            });
        });
    }

    group.finish();
}

fn bench_fatigue_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fatigue Scoring");
    let scorer = FatigueScorer::new();

    // Recovery-gap search is quadratic in the worst case
    for &size in &[100, 1_000, 5_000] {
        let samples = create_sample_window(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("score", size), &samples, |b, samples| {
            b.iter(|| scorer.score("bench", "bench-match", black_box(samples), None));
        });
    }

    group.finish();
}

fn bench_injury_scoring(c: &mut Criterion) {
    let aggregator = SessionMetricsAggregator::default();
    let as_of = Utc.with_ymd_and_hms(2024, 11, 2, 16, 0, 0).unwrap();
    let Some(template) = aggregator.aggregate(
        "bench",
        "bench-match",
        create_sample_window(600),
        WindowPolicy::FullSession,
        &[],
        as_of,
    ) else {
        return;
    };

    let history: Vec<SessionMetrics> = (0..30)
        .map(|day| {
            let mut record = template.clone();
            record.calculated_at = as_of - Duration::days(30 - day);
            record.load.acute_chronic_ratio = 0.9 + (day % 7) as f64 * 0.1;
            record
        })
        .collect();

    let signals = FixedAsymmetrySignals::default();
    let scorer = InjuryRiskScorer::new(&signals);

    c.bench_function("injury_score_30_days", |b| {
        b.iter(|| scorer.score("bench", black_box(&history)));
    });
}

criterion_group!(
    benches,
    bench_movement_metrics,
    bench_session_aggregation,
    bench_fatigue_scoring,
    bench_injury_scoring
);
criterion_main!(benches);
