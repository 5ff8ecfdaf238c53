//! Benchmark configuration.
//!
//! A sweep file holds a `[bench]` table (device, precision, iteration counts)
//! and a `[sweep]` table (variants and workload shapes). Files are TOML or
//! JSON, chosen by extension. `ATTN_BENCH_*` environment variables override
//! the `[bench]` values.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use candle_core::DType;
use serde::{Deserialize, Serialize};

use crate::device::DeviceSelection;
use crate::errors::{BenchmarkError, Result};
use crate::kernels::Variant;
use crate::shape::WorkloadShape;

pub const ENV_DEVICE: &str = "ATTN_BENCH_DEVICE";
pub const ENV_PRECISION: &str = "ATTN_BENCH_DTYPE";
pub const ENV_WARMUP_STEPS: &str = "ATTN_BENCH_WARMUP_STEPS";
pub const ENV_ACTIVE_STEPS: &str = "ATTN_BENCH_ACTIVE_STEPS";

/// Element type of the synthetic tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F32,
    #[default]
    F16,
    Bf16,
}

impl Precision {
    pub fn dtype(&self) -> DType {
        match self {
            Precision::F32 => DType::F32,
            Precision::F16 => DType::F16,
            Precision::Bf16 => DType::BF16,
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "f32" | "fp32" | "float32" => Ok(Precision::F32),
            "f16" | "fp16" | "float16" | "half" => Ok(Precision::F16),
            "bf16" | "bfloat16" => Ok(Precision::Bf16),
            other => Err(format!("unsupported precision '{other}'")),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Precision::F32 => "f32",
            Precision::F16 => "f16",
            Precision::Bf16 => "bf16",
        })
    }
}

/// Process-wide settings shared by every benchmark in a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub device: DeviceSelection,
    #[serde(default)]
    pub precision: Precision,
    #[serde(default = "default_warmup_steps")]
    pub warmup_steps: usize,
    #[serde(default = "default_active_steps")]
    pub active_steps: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            device: DeviceSelection::default(),
            precision: Precision::default(),
            warmup_steps: default_warmup_steps(),
            active_steps: default_active_steps(),
        }
    }
}

impl BenchConfig {
    /// Apply `ATTN_BENCH_*` overrides looked up through `lookup`, usually
    /// the process environment. Unparseable values are ignored with a
    /// warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEVICE) {
            match value.parse() {
                Ok(device) => self.device = device,
                Err(err) => log::warn!("ignoring {ENV_DEVICE}: {err}"),
            }
        }
        if let Some(value) = lookup(ENV_PRECISION) {
            match value.parse() {
                Ok(precision) => self.precision = precision,
                Err(err) => log::warn!("ignoring {ENV_PRECISION}: {err}"),
            }
        }
        for (key, slot) in [
            (ENV_WARMUP_STEPS, &mut self.warmup_steps),
            (ENV_ACTIVE_STEPS, &mut self.active_steps),
        ] {
            if let Some(value) = lookup(key) {
                match value.trim().parse::<usize>() {
                    Ok(parsed) => *slot = parsed,
                    Err(err) => log::warn!("ignoring {key}={value}: {err}"),
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.active_steps == 0 {
            errors.push("bench.active_steps must be greater than 0".to_string());
        }
        if !errors.is_empty() {
            return Err(BenchmarkError::Config(errors));
        }
        Ok(())
    }
}

fn default_warmup_steps() -> usize {
    10
}

fn default_active_steps() -> usize {
    100
}

/// Variants and shapes to measure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_variants")]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub shapes: Vec<WorkloadShape>,
    /// Where to write the report. Relative paths resolve against the config
    /// file's directory.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            variants: default_variants(),
            shapes: Vec::new(),
            output: None,
        }
    }
}

fn default_variants() -> Vec<Variant> {
    Variant::ALL.to_vec()
}

/// Shape dimensions given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeOverrides {
    pub batch_size: Option<usize>,
    pub context_length: Option<usize>,
    pub num_heads: Option<usize>,
    pub num_kv_heads: Option<usize>,
    pub head_dim: Option<usize>,
    pub block_size: Option<usize>,
}

impl ShapeOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill unset dimensions with `bs=1 cl=128 heads=8 kv_heads=heads dim=64`.
    pub fn to_shape(&self) -> WorkloadShape {
        let num_heads = self.num_heads.unwrap_or(8);
        let shape = WorkloadShape::new(
            self.batch_size.unwrap_or(1),
            self.context_length.unwrap_or(128),
            num_heads,
            self.num_kv_heads.unwrap_or(num_heads),
            self.head_dim.unwrap_or(64),
        );
        match self.block_size {
            Some(block) => shape.with_block_size(block),
            None => shape,
        }
    }
}

/// Values given on the command line. They take precedence over the
/// environment and the sweep file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub device: Option<DeviceSelection>,
    pub precision: Option<Precision>,
    pub warmup_steps: Option<usize>,
    pub active_steps: Option<usize>,
    /// Replaces the sweep's variants when non-empty.
    pub variants: Vec<Variant>,
    pub shape: ShapeOverrides,
    pub output: Option<PathBuf>,
}

/// Contents of a sweep file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SweepFile {
    #[serde(default)]
    pub bench: BenchConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl SweepFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut file: SweepFile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(BenchmarkError::ConfigFormat(format!(
                    "unsupported configuration extension '{other}'"
                )));
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        file.apply_base_path(base_dir);
        Ok(file)
    }

    /// Load `config` (or start from defaults), then layer the `ATTN_BENCH_*`
    /// values from `env` and the command-line values on top, and validate.
    pub fn resolve<F>(config: Option<&Path>, cli: &CliOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file = match config {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        file.bench.apply_overrides_from(env);
        file.apply_cli_overrides(cli);
        file.validate()?;
        Ok(file)
    }

    /// Any shape flag replaces the sweep's shapes with a single shape. A
    /// sweep without shapes gets the default shape.
    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(device) = cli.device {
            self.bench.device = device;
        }
        if let Some(precision) = cli.precision {
            self.bench.precision = precision;
        }
        if let Some(steps) = cli.warmup_steps {
            self.bench.warmup_steps = steps;
        }
        if let Some(steps) = cli.active_steps {
            self.bench.active_steps = steps;
        }
        if !cli.variants.is_empty() {
            self.sweep.variants = cli.variants.clone();
        }
        if !cli.shape.is_empty() || self.sweep.shapes.is_empty() {
            self.sweep.shapes = vec![cli.shape.to_shape()];
        }
        if let Some(output) = &cli.output {
            self.sweep.output = Some(output.clone());
        }
    }

    fn apply_base_path(&mut self, base: &Path) {
        if let Some(output) = self.sweep.output.as_mut() {
            if output.is_relative() {
                *output = base.join(&*output);
            }
        }
    }

    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = match self.bench.validate() {
            Err(BenchmarkError::Config(errors)) => errors,
            Err(other) => return Err(other),
            Ok(()) => Vec::new(),
        };
        if self.sweep.variants.is_empty() {
            errors.push("sweep.variants must not be empty".to_string());
        }
        if self.sweep.shapes.is_empty() {
            errors.push("sweep.shapes must not be empty".to_string());
        }
        for (idx, shape) in self.sweep.shapes.iter().enumerate() {
            if let Err(err) = shape.validate() {
                errors.push(format!("sweep.shapes[{idx}]: {err}"));
            }
        }
        if !errors.is_empty() {
            return Err(BenchmarkError::Config(errors));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_to_empty_file() {
        let file: SweepFile = toml::from_str("").unwrap();
        assert_eq!(file.bench, BenchConfig::default());
        assert_eq!(file.bench.precision.dtype(), DType::F16);
        assert_eq!(file.sweep.variants.len(), 6);
        assert!(file.validate().is_err());
    }

    #[test]
    fn parses_bench_table() {
        let file: SweepFile = toml::from_str(
            r#"
            [bench]
            device = "cuda:1"
            precision = "bf16"
            warmup_steps = 3
            active_steps = 7
            "#,
        )
        .unwrap();
        assert_eq!(file.bench.device, DeviceSelection::Cuda(1));
        assert_eq!(file.bench.precision, Precision::Bf16);
        assert_eq!(file.bench.warmup_steps, 3);
        assert_eq!(file.bench.active_steps, 7);
    }

    #[test]
    fn unknown_device_fails_to_parse() {
        let err = toml::from_str::<SweepFile>("[bench]\ndevice = \"tpu\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown device"));
    }

    #[test]
    fn overrides_replace_valid_values_only() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DEVICE, "cpu"),
            (ENV_PRECISION, "f32"),
            (ENV_WARMUP_STEPS, "2"),
            (ENV_ACTIVE_STEPS, "many"),
        ]);
        let mut config = BenchConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.device, DeviceSelection::Cpu);
        assert_eq!(config.precision, Precision::F32);
        assert_eq!(config.warmup_steps, 2);
        assert_eq!(config.active_steps, default_active_steps());
    }

    #[test]
    fn validation_collects_every_problem() {
        let file = SweepFile {
            bench: BenchConfig {
                active_steps: 0,
                ..BenchConfig::default()
            },
            sweep: SweepConfig {
                variants: Vec::new(),
                shapes: vec![WorkloadShape::new(1, 0, 8, 8, 64)],
                output: None,
            },
        };
        match file.validate() {
            Err(BenchmarkError::Config(errors)) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors[2].starts_with("sweep.shapes[0]"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn default_shape_fills_unset_dimensions() {
        assert!(ShapeOverrides::default().is_empty());
        assert_eq!(
            ShapeOverrides::default().to_shape(),
            WorkloadShape::new(1, 128, 8, 8, 64)
        );
        let shape = ShapeOverrides {
            num_heads: Some(16),
            block_size: Some(16),
            ..ShapeOverrides::default()
        }
        .to_shape();
        assert_eq!(shape, WorkloadShape::new(1, 128, 16, 16, 64).with_block_size(16));
    }

    #[test]
    fn empty_cli_keeps_file_values() {
        let shape = WorkloadShape::new(2, 64, 4, 2, 32);
        let mut file = SweepFile {
            sweep: SweepConfig {
                shapes: vec![shape],
                ..SweepConfig::default()
            },
            ..SweepFile::default()
        };
        let before = file.clone();
        file.apply_cli_overrides(&CliOverrides::default());
        assert_eq!(file, before);
    }

    #[test]
    fn precision_parses_aliases() {
        assert_eq!("FP16".parse(), Ok(Precision::F16));
        assert_eq!("bfloat16".parse(), Ok(Precision::Bf16));
        assert!("int8".parse::<Precision>().is_err());
        assert_eq!(Precision::Bf16.to_string(), "bf16");
    }
}
