//! Benchmarks for the startup hot path.
//!
//! Measures dependency resolution over synthetic fragment sets and a full
//! startup against a warm persistent cache, which is what every new shell
//! pays for.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use tempfile::TempDir;

use profile_fragments::config::DisabledSet;
use profile_fragments::error::FragmentError;
use profile_fragments::fragment::Fragment;
use profile_fragments::parser::ParsingMode;
use profile_fragments::phases::orchestrator::{self, StartupOptions};
use profile_fragments::phases::ordering::resolve;

/// Builds `count` fragments where each depends on up to two earlier ones.
fn create_fragments(count: usize) -> Vec<Fragment> {
    (0..count)
        .map(|i| {
            let deps: Vec<String> = [i.checked_sub(1), i.checked_sub(7)]
                .into_iter()
                .flatten()
                .map(|d| format!("frag{}", d))
                .collect();
            Fragment::new(format!("frag{}", i), format!("/profile/{:03}-frag{}.sh", i, i))
                .with_dependencies(deps)
        })
        .rev()
        .collect()
}

/// Writes a realistic store of `count` fragments to a temporary directory.
fn create_store(count: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..count {
        let requires = if i > 0 {
            format!("# requires: frag{}\n", i - 1)
        } else {
            String::new()
        };
        let body = format!(
            "{}alias f{}=true\nfunc{}() {{\n  echo {}\n}}\nexport VAR{}=1\n",
            requires, i, i, i, i
        );
        fs::write(dir.path().join(format!("{:03}-frag{}.sh", i, i)), body).unwrap();
    }
    dir
}

fn noop(_: &Fragment) -> Result<(), FragmentError> {
    Ok(())
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    let disabled = DisabledSet::new(&["frag3".to_string(), "frag*9".to_string()]);

    for count in [10, 50, 200] {
        let fragments = create_fragments(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &fragments, |b, f| {
            b.iter(|| resolve(black_box(f.clone()), &disabled).unwrap())
        });
    }

    group.finish();
}

fn bench_warm_startup(c: &mut Criterion) {
    let mut group = c.benchmark_group("warm_startup");

    for mode in [ParsingMode::Regex, ParsingMode::Ast] {
        let store = create_store(40);
        let cache = TempDir::new().unwrap();
        let options = StartupOptions::new(store.path())
            .with_cache_dir(cache.path())
            .with_mode(mode);

        // Populate the persistent cache once
        let session = orchestrator::open_session(&options).unwrap();
        orchestrator::execute_startup(&session, &options, &noop).unwrap();

        group.bench_function(mode.as_str(), |b| {
            b.iter(|| {
                let session = orchestrator::open_session(&options).unwrap();
                black_box(orchestrator::execute_startup(&session, &options, &noop).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_warm_startup);
criterion_main!(benches);
