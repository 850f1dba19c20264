// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI output reporter with colored formatting

use crate::error::QualityWarning;
use crate::geometry::GeometryStats;
use crate::integrity::{BatchReport, IntegrityReport};
use crate::timing::StageMetrics;
use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    /// Report the integrity check of one file
    pub fn report_check(file: &Path, report: &IntegrityReport, stats: &GeometryStats) {
        println!("\n{}", "━".repeat(80).bright_black());
        println!("{} {}", "File:".bold(), file.display().to_string().cyan());
        println!("{}", "━".repeat(80).bright_black());

        if report.manifold && report.watertight {
            println!("{} {}", "✅".green(), "Closed manifold".green().bold());
        } else {
            println!(
                "{} {}",
                "❌".red(),
                "Mesh has topological defects".red().bold()
            );
        }

        println!("\n{}", "Topology:".bold());
        Self::print_flag("Manifold", report.manifold);
        Self::print_flag("Watertight", report.watertight);
        Self::print_count("Vertices", report.vertex_count, false);
        Self::print_count("Triangles", report.triangle_count, false);
        Self::print_count("Boundary edges", report.boundary_edges, true);
        Self::print_count("Boundary loops", report.boundary_loops, true);
        Self::print_count("Non-manifold edges", report.non_manifold_edges, true);
        Self::print_count("Flipped edges", report.inconsistent_edges, true);
        Self::print_count("Non-manifold vertices", report.non_manifold_vertices, true);
        Self::print_count("Degenerate faces", report.degenerate_faces, true);

        println!("\n{}", "Geometry:".bold());
        println!(
            "  {} {}",
            "Volume:".bright_black(),
            format!("{:.3}", stats.volume).cyan()
        );
        println!(
            "  {} {}",
            "Surface area:".bright_black(),
            format!("{:.3}", stats.surface_area).cyan()
        );
        let b = stats.bounds;
        println!(
            "  {} x [{:.2}, {:.2}]  y [{:.2}, {:.2}]  z [{:.2}, {:.2}]",
            "Bounds:".bright_black(),
            b[0],
            b[1],
            b[2],
            b[3],
            b[4],
            b[5]
        );

        if !report.defects.is_empty() {
            let defects: Vec<String> = report.defects.iter().map(|d| d.to_string()).collect();
            println!("\n{} {}", "Defects:".bold(), defects.join(", ").yellow());
        }
        println!("{}", "━".repeat(80).bright_black());
    }

    /// Report a directory scan
    pub fn report_scan(dir: &Path, report: &BatchReport) {
        println!("\n{}", "═".repeat(80).bright_black());
        println!("{} {}", "Scanned:".bold(), dir.display().to_string().cyan());
        println!("{}", "═".repeat(80).bright_black());
        println!(
            "  {} {}",
            "Checked:".bright_black(),
            report.checked.len().to_string().cyan()
        );
        println!(
            "  {} {}",
            "Closed manifold:".bright_black(),
            report.closed_count().to_string().green()
        );
        Self::print_paths("Non-manifold", &report.non_manifold);
        Self::print_paths("Not watertight", &report.non_watertight);
        if !report.skipped.is_empty() {
            println!("\n  {}", "Skipped:".yellow().bold());
            for (path, reason) in &report.skipped {
                println!("    {} {}", path.display(), reason.bright_black());
            }
        }
        println!("{}", "═".repeat(80).bright_black());
    }

    /// Report per-stage timings and the files a command produced
    pub fn report_stages(stages: &[StageMetrics], written: &[PathBuf]) {
        println!("\n{}", "Stages:".bold());
        for stage in stages {
            println!(
                "  {:<14} {:>10} {} {}",
                stage.name.cyan(),
                Self::format_duration(stage.duration).yellow(),
                format!("{} faces", stage.triangle_count).bright_black(),
                format!("{} vertices", stage.vertex_count).bright_black()
            );
        }
        let total: Duration = stages.iter().map(|s| s.duration).sum();
        println!(
            "  {:<14} {:>10}",
            "total".bold(),
            Self::format_duration(total).yellow().bold()
        );
        if !written.is_empty() {
            println!("\n{}", "Output:".bold());
            for path in written {
                println!("  {}", path.display().to_string().cyan());
            }
        }
    }

    /// Report quality warnings attached to a result
    pub fn report_warnings(warnings: &[QualityWarning]) {
        for warning in warnings {
            Self::report_warning(&warning.to_string());
        }
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Print success message
    pub fn success(message: &str) {
        println!("{} {}", "✅".green(), message.green());
    }

    /// Print any serializable report as pretty JSON on stdout
    pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn print_flag(name: &str, ok: bool) {
        let value = if ok { "yes".green() } else { "no".red() };
        println!("  {} {}", format!("{}:", name).bright_black(), value);
    }

    /// Defect counters are red when nonzero
    fn print_count(name: &str, count: usize, defect: bool) {
        let value = if defect && count > 0 {
            count.to_string().red()
        } else {
            count.to_string().cyan()
        };
        println!("  {} {}", format!("{}:", name).bright_black(), value);
    }

    fn print_paths(title: &str, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }
        println!("\n  {}", format!("{}:", title).red().bold());
        for path in paths {
            println!("    {}", path.display());
        }
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }
}
