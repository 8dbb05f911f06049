//! Console rendering of the end-of-run report

use colored::Colorize;
use gcheck_core::{Report, RunStatus};
use std::fmt::Write;

/// Render a report for the terminal
pub fn report(report: &Report) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &Report) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{}", "Summary".bold().underline())?;
    writeln!(
        out,
        "  Strategies: {}/{} evaluated, {}",
        report.completed_strategies,
        report.total_strategies,
        status_label(&report.status)
    )?;
    writeln!(out, "  Targets: {}", report.total_targets)?;

    if !report.unreachable.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Targets without a single success:".bold())?;
        for target in &report.unreachable {
            match target.pinned {
                Some(ip) => writeln!(out, "  {} ({})", target.address.red(), ip)?,
                None => writeln!(out, "  {}", target.address.red())?,
            }
        }
    }

    if !report.reachable.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Best strategy per target:".bold())?;
        for target in &report.reachable {
            match (&target.best, target.best_score) {
                (Some(best), Some(score)) => writeln!(
                    out,
                    "  {} [{}/{}] {}",
                    target.address.green(),
                    score,
                    report.total_targets,
                    best.command_line()
                )?,
                _ => writeln!(out, "  {} {}", target.address.green(), "no clear winner".dimmed())?,
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", "Strategies by score:".bold())?;
    if report.by_score.is_empty() {
        writeln!(out, "  {}", "none".dimmed())?;
    }
    for (score, strategies) in report.ranked() {
        let header = format!("{}/{}", score, report.total_targets);
        let header = if *score == 0 {
            header.red()
        } else if *score == report.total_targets {
            header.green()
        } else {
            header.yellow()
        };
        writeln!(out, "  {} ({} strategies)", header.bold(), strategies.len())?;
        for strategy in strategies {
            writeln!(out, "    #{} {}", strategy.index + 1, strategy.command_line())?;
        }
    }

    if let Some(ref strategy) = report.interrupted {
        writeln!(out)?;
        writeln!(
            out,
            "{} #{} {}",
            "Interrupted during strategy".yellow().bold(),
            strategy.index + 1,
            strategy.command_line()
        )?;
    }

    Ok(())
}

fn status_label(status: &RunStatus) -> String {
    match status {
        RunStatus::Completed => "completed".green().to_string(),
        RunStatus::Interrupted { .. } => "interrupted".yellow().to_string(),
        RunStatus::Aborted { strategy, reason } => {
            format!("aborted at #{}: {}", strategy + 1, reason).red().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcheck_core::report::{ReachableTarget, StrategySummary, UnreachableTarget};
    use std::collections::BTreeMap;

    fn summary(index: usize, tokens: &[&str]) -> StrategySummary {
        StrategySummary {
            index,
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn sample(status: RunStatus) -> Report {
        let mut by_score = BTreeMap::new();
        by_score.insert(2, vec![summary(0, &["-e1", "-q"])]);
        by_score.insert(0, vec![summary(1, &["-e2"])]);

        Report {
            status,
            total_strategies: 3,
            completed_strategies: 2,
            total_targets: 2,
            unreachable: vec![UnreachableTarget {
                address: "https://blocked.example".into(),
                pinned: None,
            }],
            reachable: vec![ReachableTarget {
                address: "https://open.example".into(),
                pinned: None,
                best: Some(summary(0, &["-e1", "-q"])),
                best_score: Some(2),
            }],
            by_score,
            interrupted: None,
        }
    }

    #[test]
    fn test_render_lists_targets_and_scores() {
        let text = report(&sample(RunStatus::Completed));
        assert!(text.contains("https://blocked.example"));
        assert!(text.contains("https://open.example"));
        assert!(text.contains("#1 -e1 -q"));
        assert!(text.contains("#2 -e2"));
        assert!(text.contains("2/3 evaluated"));
    }

    #[test]
    fn test_render_best_score_first() {
        let text = report(&sample(RunStatus::Completed));
        let best = text.find("#1 -e1 -q").unwrap();
        let worst = text.find("#2 -e2").unwrap();
        assert!(best < worst);
    }

    #[test]
    fn test_render_interrupted_marker() {
        let mut sample = sample(RunStatus::Interrupted { strategy: Some(2) });
        sample.interrupted = Some(summary(2, &["-e3"]));
        let text = report(&sample);
        assert!(text.contains("#3 -e3"));
    }
}
