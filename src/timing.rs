// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Operation timing and per-stage metrics

use crate::geometry::Mesh;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, Span};

/// Metrics for one completed pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMetrics {
    pub name: String,
    pub duration: Duration,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

impl StageMetrics {
    pub fn new(name: impl Into<String>, duration: Duration, mesh: &Mesh) -> Self {
        Self {
            name: name.into(),
            duration,
            vertex_count: mesh.vertex_count(),
            triangle_count: mesh.triangle_count(),
        }
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Logs the elapsed time of an operation at debug level when dropped
pub struct OperationTimer {
    name: &'static str,
    span: Span,
    start: Instant,
}

impl OperationTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            span: tracing::debug_span!("operation", name),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Stop the timer and record the stage result
    pub fn finish(self, mesh: &Mesh) -> StageMetrics {
        StageMetrics::new(self.name, self.elapsed(), mesh)
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        self.span.in_scope(|| {
            debug!(operation = self.name, elapsed_ms, "operation finished");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    #[test]
    fn test_finish_records_counts() {
        let mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let timer = OperationTimer::new("clean");
        let metrics = timer.finish(&mesh);
        assert_eq!(metrics.name, "clean");
        assert_eq!(metrics.triangle_count, 12);
        assert!(metrics.duration_ms() >= 0.0);
    }
}
