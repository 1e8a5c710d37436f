// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `costwise report` command implementation.
//!
//! Prints per-scope usage, pool spend, projections, and recommendations.
//! `--json` emits the report as structured JSON for scripting; `--plain`
//! or a non-TTY stdout disables colors.

use std::fmt::{self, Write as _};
use std::io::IsTerminal;

use colored::Colorize;
use costwise_core::CostwiseError;
use costwise_cost::CostReport;

use crate::context::Context;
use crate::select::render_failed;

/// Run the `costwise report` command.
pub async fn run_report(ctx: &Context, json: bool, plain: bool) -> Result<(), CostwiseError> {
    let report = ctx.reporter.report().await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print!("{}", render_report(&report, use_color).map_err(render_failed)?);
    }
    Ok(())
}

fn render_report(report: &CostReport, use_color: bool) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out)?;
    writeln!(out, "  costwise report ({})", report.generated_on)?;
    writeln!(out, "  {}", "-".repeat(35))?;

    for line in &report.scopes {
        let spend = line
            .spend_usd
            .map(|s| format!("  ${s:.2}"))
            .unwrap_or_default();
        writeln!(
            out,
            "    {:<6} {:<26} {:>6}/{:<6} {:>6} left{}",
            line.layer.to_string(),
            line.scope,
            line.used,
            line.cap,
            line.remaining,
            spend
        )?;
    }

    if !report.pools.is_empty() {
        writeln!(out)?;
        for pool in &report.pools {
            writeln!(
                out,
                "    Pool {:<12} ${:.2} of ${:.2} spent, ${:.2} left",
                pool.pool, pool.spent_usd, pool.budget_usd, pool.remaining_usd
            )?;
        }
        writeln!(
            out,
            "    Total:     ${:.2} spent, ${:.2} left, ${:.2} projected this month",
            report.total_spend_usd,
            report.total_remaining_usd,
            report.projected_monthly_spend_usd
        )?;
    }

    if !report.quality_distribution.is_empty() {
        let parts: Vec<String> = report
            .quality_distribution
            .iter()
            .map(|(tier, count)| format!("{tier} {count}"))
            .collect();
        writeln!(out, "    Usage:     {}", parts.join(", "))?;
    }

    if !report.warnings.is_empty() {
        writeln!(out)?;
        for warning in &report.warnings {
            if use_color {
                writeln!(out, "    {} {}", "!".yellow(), warning.yellow())?;
            } else {
                writeln!(out, "    [WARN] {warning}")?;
            }
        }
    }

    if !report.recommendations.is_empty() {
        writeln!(out)?;
        for recommendation in &report.recommendations {
            if use_color {
                writeln!(out, "    {} {recommendation}", "→".cyan())?;
            } else {
                writeln!(out, "    - {recommendation}")?;
            }
        }
    }
    writeln!(out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use chrono::NaiveDate;
    use costwise_core::{LayerKind, PeriodKind, QualityTier};
    use costwise_cost::{PoolLine, ScopeLine};

    fn sample() -> CostReport {
        CostReport {
            generated_on: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            scopes: vec![ScopeLine {
                layer: LayerKind::Paid,
                scope: "flash_monthly_spend".into(),
                period: PeriodKind::Monthly,
                used: 20,
                cap: 233,
                remaining: 213,
                spend_usd: Some(0.30),
                pool: Some("gemini".into()),
            }],
            pools: vec![PoolLine {
                pool: "gemini".into(),
                budget_usd: 5.0,
                spent_usd: 0.30,
                remaining_usd: 4.70,
            }],
            total_spend_usd: 0.30,
            total_remaining_usd: 9.70,
            projected_monthly_spend_usd: 0.93,
            quality_distribution: BTreeMap::from([(QualityTier::Premium, 20)]),
            warnings: vec!["gemini budget low: $0.50 of $5.00 remaining".into()],
            recommendations: vec!["use premium models for complex tasks".into()],
        }
    }

    #[test]
    fn plain_report_has_no_escape_codes() {
        let text = render_report(&sample(), false).unwrap();
        assert!(!text.contains('\u{1b}'));
        assert!(text.contains("costwise report (2026-03-10)"));
        assert!(text.contains("flash_monthly_spend"));
        assert!(text.contains("$0.30 of $5.00 spent"));
        assert!(text.contains("$0.93 projected"));
        assert!(text.contains("Usage:     premium 20"));
        assert!(text.contains("[WARN] gemini budget low"));
        assert!(text.contains("- use premium models"));
    }

    #[test]
    fn free_only_report_skips_pool_section() {
        let mut report = sample();
        report.pools.clear();
        let text = render_report(&report, false).unwrap();
        assert!(!text.contains("Pool "));
        assert!(!text.contains("Total:"));
    }

    #[test]
    fn report_serializes() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["generated_on"], "2026-03-10");
        assert_eq!(json["pools"][0]["pool"], "gemini");
        assert_eq!(json["quality_distribution"]["premium"], 20);
    }
}
