// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `costwise select`, `costwise estimate` and `costwise categories`.

use std::fmt::{self, Write as _};
use std::io::IsTerminal;

use colored::Colorize;
use costwise_core::{CostwiseError, Selection, TaskCategory};
use costwise_cost::TokenEstimate;
use costwise_router::{TaskCatalog, TaskCost};
use strum::IntoEnumIterator;

use crate::context::Context;

pub async fn run_select(
    ctx: &Context,
    category: TaskCategory,
    image: bool,
    json: bool,
) -> Result<(), CostwiseError> {
    let selection = ctx.router.preview(category, image).await?;
    if json {
        println!("{}", to_json(&selection));
    } else {
        let use_color = std::io::stdout().is_terminal();
        let text = render_selection(&selection, use_color).map_err(render_failed)?;
        print!("{text}");
    }
    Ok(())
}

pub async fn run_estimate(
    ctx: &Context,
    category: TaskCategory,
    image: bool,
    tokens: Option<TokenEstimate>,
    json: bool,
) -> Result<(), CostwiseError> {
    let cost = ctx.router.estimate_task_cost(category, image, tokens).await?;
    if json {
        println!("{}", to_json(&cost));
    } else {
        let use_color = std::io::stdout().is_terminal();
        let text = render_estimate(&cost, use_color).map_err(render_failed)?;
        print!("{text}");
    }
    Ok(())
}

pub fn print_categories() -> Result<(), CostwiseError> {
    print!("{}", render_categories().map_err(render_failed)?);
    Ok(())
}

pub(crate) fn render_failed(e: fmt::Error) -> CostwiseError {
    CostwiseError::Internal(format!("failed to render output: {e}"))
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn limits_label(within_limits: bool, use_color: bool) -> String {
    match (within_limits, use_color) {
        (true, true) => format!("{} within limits", "✓".green()),
        (false, true) => format!("{} over limits", "✗".red()),
        (true, false) => "[OK] within limits".to_string(),
        (false, false) => "[OVER] over limits".to_string(),
    }
}

fn render_selection(selection: &Selection, use_color: bool) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out)?;
    writeln!(out, "  costwise select {}", selection.category)?;
    writeln!(out, "  {}", "-".repeat(35))?;
    match &selection.model {
        Some(model) => {
            writeln!(
                out,
                "    Model:    {} ({}/{})",
                model.key, model.provider, model.model_id
            )?;
        }
        None => {
            writeln!(out, "    Model:    none")?;
        }
    }
    writeln!(out, "    Tier:     {}", selection.quality_tier)?;
    writeln!(
        out,
        "    Limits:   {}",
        limits_label(selection.within_limits, use_color)
    )?;
    writeln!(
        out,
        "    Cost:     ${:.4} {}",
        selection.estimated_cost, selection.cost_unit
    )?;
    writeln!(out, "    Reason:   {}", selection.reason)?;
    writeln!(out)?;
    Ok(out)
}

fn render_estimate(cost: &TaskCost, use_color: bool) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out)?;
    writeln!(out, "  costwise estimate {}", cost.category)?;
    writeln!(out, "  {}", "-".repeat(35))?;
    writeln!(
        out,
        "    Model:    {}",
        cost.model_key.as_deref().unwrap_or("none")
    )?;
    writeln!(out, "    Tier:     {}", cost.quality_tier)?;
    writeln!(
        out,
        "    Limits:   {}",
        limits_label(cost.within_limits, use_color)
    )?;
    writeln!(
        out,
        "    Unit:     ${:.4} {}",
        cost.unit_cost_usd, cost.cost_unit
    )?;
    if let Some(tokens) = cost.token_cost_usd {
        writeln!(out, "    Tokens:   ${tokens:.6}")?;
    }
    let total = format!("${:.6}", cost.total_usd);
    if use_color {
        writeln!(out, "    Total:    {}", total.bold())?;
    } else {
        writeln!(out, "    Total:    {total}")?;
    }
    writeln!(out)?;
    Ok(out)
}

fn render_categories() -> Result<String, fmt::Error> {
    let mut out = String::new();
    for category in TaskCategory::iter() {
        let profile = TaskCatalog::profile(category);
        let required: Vec<String> = profile.required.iter().map(ToString::to_string).collect();
        let mut flags = Vec::new();
        if profile.complex {
            flags.push("complex");
        }
        if profile.current_info {
            flags.push("current-info");
        }
        writeln!(
            out,
            "{:<24} {:<12} {}{}",
            category.to_string(),
            profile.unit.to_string(),
            required.join(", "),
            if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            }
        )?;
    }
    Ok(out)
}
