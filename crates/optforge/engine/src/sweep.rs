// Optforge
// Copyright (C) 2025 Optforge Contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Optimization-level sweep
//!
//! Measures every canonical optimization level once and recommends the
//! best per metric. The sweep is fail-soft: a level whose measurement
//! cannot be taken records sentinel values and the remaining levels
//! still run. Only a sandbox infrastructure failure aborts it.

use crate::context::AnalysisContext;
use crate::metrics::{is_compile_error, parse_count};
use crate::sandbox::SandboxError;
use crate::toolchain;
use crate::workspace::Scratch;
use futures::future::join_all;
use optforge_common::models::{Language, MetricSample, OptLevel, SweepReport, ToolchainKind};
use optforge_common::METRIC_SENTINEL;
use tracing::debug;

/// Sweep all optimization levels with the given toolchain.
///
/// Returns exactly one sample per level, in [`OptLevel::ALL`] order.
pub async fn run_sweep(
    ctx: &AnalysisContext,
    scratch: &Scratch,
    toolchain: ToolchainKind,
    language: Language,
) -> Result<SweepReport, SandboxError> {
    let measurements = OptLevel::ALL.iter().map(|&level| measure_level(ctx, scratch, toolchain, language, level));
    let samples = join_all(measurements).await.into_iter().collect::<Result<Vec<_>, _>>()?;

    let best_speed = argmin_label(&samples, |sample| sample.speed_metric);
    let best_size = argmin_label(&samples, |sample| sample.size_metric);
    let recommendation = recommend(&samples, best_speed.as_deref(), best_size.as_deref());

    Ok(SweepReport {
        samples,
        best_speed,
        best_size,
        recommendation,
    })
}

async fn measure_level(
    ctx: &AnalysisContext,
    scratch: &Scratch,
    toolchain: ToolchainKind,
    language: Language,
    level: OptLevel,
) -> Result<MetricSample, SandboxError> {
    let speed_output = ctx
        .dispatch(toolchain::measure_asm_lines(toolchain, language, level), scratch.path())
        .await?;
    // The line counter still prints 0 on an empty pipe when the compiler
    // fails, so a diagnostic in the output overrides the trailing number.
    if is_compile_error(&speed_output) {
        debug!(level = level.flag(), "compiler diagnostic during measurement, recording sentinels");
        return Ok(MetricSample::failed(level.flag()));
    }
    let speed_metric = parse_count(&speed_output);

    let object = toolchain::sweep_object_file(level);
    let size_output = ctx
        .dispatch(toolchain::measure_object_size(toolchain, language, level, &object), scratch.path())
        .await?;
    let size_metric = parse_count(&size_output);

    debug!(level = level.flag(), speed_metric, size_metric, "sweep measurement");

    Ok(MetricSample {
        label: level.flag().to_string(),
        speed_metric,
        size_metric,
    })
}

/// Label of the first-in-order sample with the smallest metric value.
///
/// Ties break toward the earlier level; sentinel-only sweeps yield None.
fn argmin_label(samples: &[MetricSample], metric: fn(&MetricSample) -> u64) -> Option<String> {
    let mut best: Option<&MetricSample> = None;
    for sample in samples {
        if metric(sample) == METRIC_SENTINEL {
            continue;
        }
        if best.map(|current| metric(sample) < metric(current)).unwrap_or(true) {
            best = Some(sample);
        }
    }
    best.map(|sample| sample.label.clone())
}

fn recommend(samples: &[MetricSample], best_speed: Option<&str>, best_size: Option<&str>) -> String {
    let (Some(speed_label), Some(size_label)) = (best_speed, best_size) else {
        return "Could not analyze optimizations.".to_string();
    };

    let speed_value = samples.iter().find(|s| s.label == speed_label).map(|s| s.speed_metric).unwrap_or(METRIC_SENTINEL);
    let size_value = samples.iter().find(|s| s.label == size_label).map(|s| s.size_metric).unwrap_or(METRIC_SENTINEL);

    format!(
        "For Speed: Use {speed_label} (metric: {speed_value} assembly lines).\nFor Size: Use {size_label} (metric: {size_value} bytes)."
    )
}
