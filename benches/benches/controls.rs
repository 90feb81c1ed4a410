// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use understory_controls::{ControlsOptions, Store, use_controls};
use understory_schema::{Schema, Settings, folder, input};

/// `folders` folders of `per_folder` bounded number inputs each.
fn wide_schema(folders: usize, per_folder: usize) -> Schema {
    let mut schema = Schema::new();
    for f in 0..folders {
        let mut inner = Schema::new();
        for i in 0..per_folder {
            inner.push(
                format!("n{f}_{i}"),
                input(i).setting("min", 0).setting("max", 1_000),
            );
        }
        schema.push(format!("f{f}"), folder(inner));
    }
    schema
}

/// A gate input plus `n` inputs that are shown only while the gate is on.
fn gated_schema(n: usize) -> Schema {
    let mut schema = Schema::new().with("gate", json!(true));
    for i in 0..n {
        schema.push(
            format!("g{i}"),
            input(1).render(|s| s.get("gate") == Some(json!(true))),
        );
    }
    schema
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("understory_controls/registration");
    group.sample_size(50);

    for &(folders, per_folder) in &[(4_usize, 16_usize), (16, 64)] {
        let schema = wide_schema(folders, per_folder);
        group.bench_function(format!("acquire_release(f={folders},n={per_folder})"), |b| {
            b.iter_batched(
                Store::new,
                |store| {
                    let controls =
                        use_controls(None, &schema, ControlsOptions::new().store(store.clone()));
                    black_box(controls.values().len());
                    drop(controls);
                    store
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(format!("redeclare_unchanged(f={folders},n={per_folder})"), |b| {
            let store = Store::new();
            let mut controls = use_controls(
                None,
                &schema,
                ControlsOptions::new().store(store.clone()).deps([1]),
            );
            let deps = [json!(1)];
            b.iter(|| black_box(controls.redeclare(&schema, &deps)));
        });
    }

    group.finish();
}

fn bench_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("understory_controls/writes");
    group.sample_size(50);

    let store = Store::new();
    let _controls = use_controls(
        None,
        &wide_schema(16, 64),
        ControlsOptions::new().store(store.clone()),
    );
    let mut next = 0_u32;
    group.bench_function("set_value_at_path(1024 entries)", |b| {
        b.iter(|| {
            next = (next + 1) % 1_000;
            store
                .set_value_at_path("f7.n7_31", json!(next), false)
                .unwrap();
        });
    });

    let mut partial = Settings::new();
    group.bench_function("set_settings_at_path(fit)", |b| {
        b.iter(|| {
            next = (next + 1) % 1_000;
            partial.insert("max".into(), json!(next + 1));
            store
                .set_settings_at_path("f3.n3_3", partial.clone())
                .unwrap();
        });
    });

    group.finish();
}

fn bench_visibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("understory_controls/visibility");
    group.sample_size(50);

    for &n in &[64_usize, 1_024] {
        let store = Store::new();
        let _controls = use_controls(None, &gated_schema(n), ControlsOptions::new().store(store.clone()));
        let _bystander = use_controls(
            Some("other"),
            &Schema::new().with("x", json!(0)),
            ControlsOptions::new().store(store.clone()),
        );

        let mut on = true;
        group.bench_function(format!("flip_gate(n={n})"), |b| {
            b.iter(|| {
                on = !on;
                store.set_value_at_path("gate", json!(on), false).unwrap();
                black_box(store.visible_paths().len());
            });
        });

        let mut x = 0_u32;
        group.bench_function(format!("unrelated_write(n={n})"), |b| {
            b.iter(|| {
                x = x.wrapping_add(1);
                store.set_value_at_path("other.x", json!(x), false).unwrap();
                black_box(store.visible_paths().len());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_registration, bench_writes, bench_visibility);
criterion_main!(benches);
