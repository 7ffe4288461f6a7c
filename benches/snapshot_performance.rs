use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hades_backup::store::{restore, snapshot, Layout};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Fixture generator for save directories of varying size
mod fixtures {
    use super::*;

    /// Profile saves plus rotating backups, roughly what the game writes
    pub fn create_save_dir(base: &Path, profiles: usize, backups_per_profile: usize) -> std::io::Result<()> {
        fs::create_dir_all(base)?;
        let payload = vec![0x5Au8; 256 * 1024];

        for profile in 1..=profiles {
            fs::write(base.join(format!("Profile{profile}.sav")), &payload)?;

            let backups = base.join("Backups");
            fs::create_dir_all(&backups)?;
            for i in 0..backups_per_profile {
                fs::write(backups.join(format!("Profile{profile}_Temp{i}.sav")), &payload)?;
            }
        }

        fs::write(base.join("Profile1.sav.valid"), "")?;
        Ok(())
    }
}

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_snapshot");
    group.sample_size(20);

    for &backups in &[0usize, 4, 16] {
        let dir = TempDir::new().unwrap();
        let save = dir.path().join("Hades");
        fixtures::create_save_dir(&save, 4, backups).unwrap();
        let layout = Layout::new(&save, dir.path().join("backups"));
        let tags = vec!["bench".to_string()];

        let mut n = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(backups), &backups, |b, _| {
            b.iter(|| {
                n += 1;
                snapshot::create_named(&layout, &format!("snap-{n:08}"), &tags, None).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("restore_snapshot");
    group.sample_size(20);

    for &backups in &[0usize, 4, 16] {
        let dir = TempDir::new().unwrap();
        let save = dir.path().join("Hades");
        fixtures::create_save_dir(&save, 4, backups).unwrap();
        let layout = Layout::new(&save, dir.path().join("backups"));
        snapshot::create_named(&layout, "baseline", &[], None).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(backups), &backups, |b, _| {
            b.iter(|| restore::restore(&layout, "baseline").unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_create, bench_restore);
criterion_main!(benches);
