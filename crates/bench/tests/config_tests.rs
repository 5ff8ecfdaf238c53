use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use attn_bench::{
    BenchContext, BenchmarkError, CliOverrides, DeviceSelection, Precision, ShapeOverrides,
    SweepFile, Variant, WorkloadShape,
};
use tempfile::tempdir;

const TOML_SWEEP: &str = r#"
[bench]
device = "cpu"
precision = "f32"
warmup_steps = 1
active_steps = 2

[sweep]
variants = ["prefill", "decode_paged"]
output = "results/latency.md"

[[sweep.shapes]]
batch_size = 1
context_length = 32
num_heads = 4
num_kv_heads = 2
head_dim = 16
block_size = 16
"#;

#[test]
fn loads_toml_and_resolves_output_against_config_dir() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.toml");
    fs::write(&path, TOML_SWEEP)?;

    let file = SweepFile::from_path(&path)?;
    file.validate()?;
    assert_eq!(file.bench.device, DeviceSelection::Cpu);
    assert_eq!(file.bench.precision, Precision::F32);
    assert_eq!(file.sweep.variants, vec![Variant::Prefill, Variant::DecodePaged]);
    assert_eq!(
        file.sweep.shapes,
        vec![WorkloadShape::new(1, 32, 4, 2, 16).with_block_size(16)]
    );
    assert_eq!(
        file.sweep.output.as_deref(),
        Some(dir.path().join("results/latency.md").as_path())
    );
    Ok(())
}

#[test]
fn loads_json_with_defaults() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.json");
    fs::write(
        &path,
        r#"{"sweep": {"shapes": [{"batch_size": 2, "context_length": 64,
            "num_heads": 8, "num_kv_heads": 8, "head_dim": 64}]}}"#,
    )?;

    let file = SweepFile::from_path(&path)?;
    file.validate()?;
    assert_eq!(file.bench.device, DeviceSelection::Auto);
    assert_eq!(file.bench.precision, Precision::F16);
    assert_eq!(file.sweep.variants, Variant::ALL.to_vec());
    assert_eq!(file.sweep.shapes[0].block_size, None);
    Ok(())
}

#[test]
fn rejects_unknown_extension() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.yaml");
    fs::write(&path, "bench: {}")?;
    let err = SweepFile::from_path(&path).unwrap_err();
    assert!(matches!(err, BenchmarkError::ConfigFormat(_)), "{err}");
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = SweepFile::from_path("/nonexistent/attn-bench/sweep.toml").unwrap_err();
    assert!(matches!(err, BenchmarkError::Io(_)));
}

#[test]
fn unknown_variant_fails_to_parse() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.toml");
    fs::write(&path, "[sweep]\nvariants = [\"prefill_sparse\"]\n")?;
    let err = SweepFile::from_path(&path).unwrap_err();
    assert!(matches!(err, BenchmarkError::Toml(_)), "{err}");
    Ok(())
}

#[test]
fn validation_reports_all_problems() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.toml");
    fs::write(
        &path,
        r#"
        [bench]
        active_steps = 0

        [[sweep.shapes]]
        batch_size = 0
        context_length = 16
        num_heads = 4
        num_kv_heads = 4
        head_dim = 8
        "#,
    )?;
    let file = SweepFile::from_path(&path)?;
    let err = file.validate().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("active_steps"), "{message}");
    assert!(message.contains("batch_size"), "{message}");
    Ok(())
}

#[test]
fn loaded_config_drives_a_context() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.toml");
    fs::write(&path, TOML_SWEEP)?;
    let file = SweepFile::from_path(&path)?;

    let ctx = BenchContext::from_config(&file.bench)?;
    assert!(ctx.device().is_cpu());
    assert_eq!((ctx.warmup_steps(), ctx.active_steps()), (1, 2));
    for variant in &file.sweep.variants {
        let latency = variant.latency(&ctx, &file.sweep.shapes[0]);
        assert!(latency >= 0.0);
    }
    Ok(())
}

#[test]
fn bench_types_are_thread_safe() {
    static_assertions::assert_impl_all!(BenchContext: Send, Sync, Clone);
    static_assertions::assert_impl_all!(BenchmarkError: Send, Sync);
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| {
        pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    }
}

#[test]
fn flags_beat_environment_beats_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.toml");
    fs::write(&path, TOML_SWEEP)?;

    let cli = CliOverrides {
        active_steps: Some(9),
        ..CliOverrides::default()
    };
    let env = env_from(&[
        ("ATTN_BENCH_WARMUP_STEPS", "5"),
        ("ATTN_BENCH_ACTIVE_STEPS", "6"),
        ("ATTN_BENCH_DTYPE", "bf16"),
    ]);
    let file = SweepFile::resolve(Some(&path), &cli, env)?;

    assert_eq!(file.bench.warmup_steps, 5);
    assert_eq!(file.bench.active_steps, 9);
    assert_eq!(file.bench.precision, Precision::Bf16);
    assert_eq!(file.bench.device, DeviceSelection::Cpu);
    assert_eq!(file.sweep.variants, vec![Variant::Prefill, Variant::DecodePaged]);
    assert_eq!(
        file.sweep.shapes,
        vec![WorkloadShape::new(1, 32, 4, 2, 16).with_block_size(16)]
    );
    Ok(())
}

#[test]
fn shape_flags_replace_file_shapes_with_defaults_filled() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.toml");
    fs::write(&path, TOML_SWEEP)?;

    let cli = CliOverrides {
        shape: ShapeOverrides {
            num_heads: Some(16),
            ..ShapeOverrides::default()
        },
        ..CliOverrides::default()
    };
    let file = SweepFile::resolve(Some(&path), &cli, |_| None)?;
    assert_eq!(file.sweep.shapes, vec![WorkloadShape::new(1, 128, 16, 16, 64)]);
    Ok(())
}

#[test]
fn output_and_variant_flags_override_the_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sweep.toml");
    fs::write(&path, TOML_SWEEP)?;

    let cli = CliOverrides {
        variants: vec![Variant::DecodeSingle],
        output: Some(PathBuf::from("elsewhere.json")),
        ..CliOverrides::default()
    };
    let file = SweepFile::resolve(Some(&path), &cli, |_| None)?;
    assert_eq!(file.sweep.variants, vec![Variant::DecodeSingle]);
    assert_eq!(file.sweep.output, Some(PathBuf::from("elsewhere.json")));
    Ok(())
}

#[test]
fn no_config_and_no_flags_runs_the_default_shape() -> Result<()> {
    let file = SweepFile::resolve(None, &CliOverrides::default(), |_| None)?;
    assert_eq!(file.sweep.variants, Variant::ALL.to_vec());
    assert_eq!(file.sweep.shapes, vec![WorkloadShape::new(1, 128, 8, 8, 64)]);
    assert_eq!(file.bench.active_steps, 100);
    Ok(())
}

#[test]
fn invalid_flag_values_fail_validation() {
    let cli = CliOverrides {
        active_steps: Some(0),
        shape: ShapeOverrides {
            head_dim: Some(0),
            ..ShapeOverrides::default()
        },
        ..CliOverrides::default()
    };
    match SweepFile::resolve(None, &cli, |_| None) {
        Err(BenchmarkError::Config(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected config error, got {other:?}"),
    }
}
