use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use waveview_core::{Selection, TickLayout};

struct Scenario {
    name: &'static str,
    width: u32,
    sample_rate: u32,
    start_seconds: f64,
    duration_seconds: f64,
}

impl Scenario {
    fn selection(&self) -> Selection {
        let rate = f64::from(self.sample_rate);
        Selection {
            start_seconds: self.start_seconds,
            duration_seconds: self.duration_seconds,
            start_sample: (self.start_seconds * rate) as u64,
            sample_count: (self.duration_seconds * rate) as u64,
            start_ms: (self.start_seconds * 1_000.0) as u64,
            duration_ms: (self.duration_seconds * 1_000.0) as u64,
            clamped: false,
        }
    }
}

fn layout_benchmarks(c: &mut Criterion) {
    let scenarios = [
        Scenario {
            name: "song_1000px",
            width: 1_000,
            sample_rate: 44_100,
            start_seconds: 0.0,
            duration_seconds: 245.3,
        },
        Scenario {
            name: "zoomed_4000px",
            width: 4_000,
            sample_rate: 96_000,
            start_seconds: 61.25,
            duration_seconds: 1.5,
        },
        Scenario {
            name: "long_set_8000px",
            width: 8_000,
            sample_rate: 48_000,
            start_seconds: 0.0,
            duration_seconds: 3.0 * 3_600.0,
        },
    ];

    let mut group = c.benchmark_group("time_axis");

    for scenario in scenarios {
        let selection = scenario.selection();
        group.bench_with_input(
            BenchmarkId::from_parameter(scenario.name),
            &scenario,
            |b, scenario| {
                b.iter(|| {
                    let layout = TickLayout::compute(
                        black_box(scenario.width),
                        black_box(&selection),
                        scenario.sample_rate,
                    )
                    .expect("scenario has a valid layout");
                    layout.time_axis()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, layout_benchmarks);
criterion_main!(benches);
