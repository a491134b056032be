use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use seqanchor::rmq::Rmq;

fn bench_rmq(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let n = 100_000;
    let lcp: Vec<usize> = (0..n).map(|_| rng.gen_range(0..200)).collect();
    let lcp = Arc::new(lcp);

    c.bench_function("rmq_build_100k", |b| {
        b.iter(|| Rmq::new(black_box(Arc::clone(&lcp)), false))
    });

    let rmq = Rmq::new(Arc::clone(&lcp), false);
    let queries: Vec<(usize, usize)> = (0..1000)
        .map(|_| {
            let l = rng.gen_range(0..n);
            let r = rng.gen_range(l..n);
            (l, r)
        })
        .collect();

    c.bench_function("rmq_query_1k", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for &(l, r) in &queries {
                acc = acc.wrapping_add(rmq.query_min(black_box(l), black_box(r)));
            }
            acc
        })
    });
}

criterion_group!(benches, bench_rmq);
criterion_main!(benches);
