use contact_grid_rs::{Coordinate, SpatialGrid};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// CA-like trace along an alpha helix with a little thermal noise
fn synthetic_helix(n: usize, seed: u64) -> Vec<Coordinate> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let angle = (i as f64) * 100.0_f64.to_radians();
            Coordinate::new(
                2.3 * angle.cos() + rng.gen_range(-0.3..0.3),
                2.3 * angle.sin() + rng.gen_range(-0.3..0.3),
                i as f64 * 1.5 + rng.gen_range(-0.3..0.3),
            )
        })
        .collect()
}

fn brute_force_pairs(atoms: &[Coordinate], cutoff: f64) -> usize {
    let mut count = 0;
    for i in 0..atoms.len() {
        for j in i + 1..atoms.len() {
            if atoms[i].distance_to(&atoms[j]) <= cutoff {
                count += 1;
            }
        }
    }
    count
}

fn grid_pairs(atoms: &[Coordinate], cutoff: f64) -> usize {
    let mut grid = SpatialGrid::new(cutoff).unwrap();
    grid.add_atoms(atoms, atoms).unwrap();
    grid.contacts(false).unwrap().len()
}

fn bench_contacts(c: &mut Criterion) {
    let mut group = c.benchmark_group("contacts");

    for &n in &[500usize, 2000, 8000] {
        let atoms = synthetic_helix(n, 42);

        group.bench_with_input(BenchmarkId::new("grid", n), &atoms, |b, atoms| {
            b.iter(|| grid_pairs(black_box(atoms), 8.0))
        });

        // Quadratic reference, kept small
        if n <= 2000 {
            group.bench_with_input(BenchmarkId::new("brute_force", n), &atoms, |b, atoms| {
                b.iter(|| brute_force_pairs(black_box(atoms), 8.0))
            });
        }
    }

    group.finish();
}

fn bench_density(c: &mut Criterion) {
    let mut group = c.benchmark_group("density");

    let atoms = synthetic_helix(4000, 7);
    let mut grid = SpatialGrid::new(8.0).unwrap();
    grid.add_atoms(&atoms, &atoms).unwrap();

    group.bench_function("4k_atoms", |b| {
        b.iter(|| black_box(&grid).density_histogram().unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_contacts, bench_density);
criterion_main!(benches);
