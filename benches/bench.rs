use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;

use bowtest::{Desc, Orb, Vocabulary};

/// Random three level ORB vocabulary with branching factor 10.
fn random_vocabulary(rng: &mut StdRng) -> Vocabulary<Orb> {
    let (k, levels) = (10, 3);
    let mut text = format!("{} {}  0 0\n", k, levels);
    let mut parents = vec![0usize];
    let mut next_id = 1;
    for level in 1..=levels {
        let mut children = Vec::new();
        for &p in parents.iter() {
            for _ in 0..k {
                let desc: Vec<String> = (0..32).map(|_| rng.gen::<u8>().to_string()).collect();
                let leaf = (level == levels) as u8;
                text += &format!("{} {} {} {}\n", p, leaf, desc.join(" "), rng.gen_range(0.1..2.0));
                children.push(next_id);
                next_id += 1;
            }
        }
        parents = children;
    }
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(text.as_bytes()).unwrap();
    Vocabulary::load_from_text_file(f.path()).unwrap()
}

/// Benchmark for Vocabulary::transform()
fn transform(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let voc = random_vocabulary(&mut rng);
    let features: Vec<Desc> = (0..1000)
        .map(|_| {
            let mut d = [0u8; 32];
            rng.fill(&mut d[..]);
            d
        })
        .collect();
    c.bench_function("transform 1000 ORB features", |b| {
        b.iter(|| voc.transform(black_box(&features)).unwrap())
    });
}

criterion_group!(benches, transform);
criterion_main!(benches);
