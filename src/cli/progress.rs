// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pipeline progress rendered with `indicatif`

use crate::pipeline::{PipelineStep, StageEvent};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar with one tick per pipeline step
pub fn stage_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(PipelineStep::ALL.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Callback advancing `pb` on pipeline events, for [`crate::pipeline::HelmetPipeline::with_progress`]
pub fn stage_callback(pb: ProgressBar) -> impl Fn(&StageEvent) + Send + Sync + 'static {
    move |event| match event {
        StageEvent::Started(step) => pb.set_message(format!("{}...", step)),
        StageEvent::Finished { step, metrics } => {
            pb.println(format!(
                "  {} {:.0} ms, {} faces",
                step,
                metrics.duration_ms(),
                metrics.triangle_count
            ));
            pb.inc(1);
        }
        StageEvent::Skipped { step, reason } => {
            pb.println(format!("  {} skipped: {}", step, reason));
            pb.inc(1);
        }
        StageEvent::Warning(warning) => pb.println(format!("  warning: {}", warning)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;
    use crate::timing::StageMetrics;
    use std::time::Duration;

    #[test]
    fn test_callback_counts_finished_and_skipped() {
        let pb = stage_bar(false);
        let callback = stage_callback(pb.clone());
        callback(&StageEvent::Started(PipelineStep::Drape));
        callback(&StageEvent::Finished {
            step: PipelineStep::Drape,
            metrics: StageMetrics::new("drape", Duration::from_millis(3), &Mesh::new()),
        });
        callback(&StageEvent::Skipped {
            step: PipelineStep::Chin,
            reason: "no chin piece".to_string(),
        });
        assert_eq!(pb.position(), 2);
    }
}
