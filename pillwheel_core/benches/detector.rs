use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use pillwheel_core::{DetectionCfg, SensorSample, classify};

// Resting distance with a small xorshift jitter and an optional dip in the middle.
fn synth_batch(n: usize, jitter_mm: i32, dip_mm: i32, seed: u32) -> Vec<SensorSample> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    let span = (2 * jitter_mm + 1).max(1) as u32;
    (0..n)
        .map(|seq| {
            let noise = (next() % span) as i32 - jitter_mm;
            let dip = if seq == n / 2 { dip_mm } else { 0 };
            SensorSample {
                distance_mm: 150 + noise - dip,
                seq,
            }
        })
        .collect()
}

pub fn bench_classify(c: &mut Criterion) {
    let mut g = c.benchmark_group("classify");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p pillwheel_core --bench detector
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let cfg = DetectionCfg::default();
    for &(name, dip) in &[("flat", 0), ("drop", 12)] {
        for &n in &[10usize, 1_000] {
            let batch = synth_batch(n, 2, dip, 0xC0FFEE);
            g.bench_function(format!("{name}_{n}"), |b| {
                b.iter_batched(
                    || batch.clone(),
                    |s| {
                        let v = classify(black_box(&s), black_box(150), &cfg);
                        black_box(v);
                    },
                    BatchSize::SmallInput,
                )
            });
        }
    }
    g.finish();
}

criterion_group!(detector, bench_classify);
criterion_main!(detector);
