// SPDX-License-Identifier: Apache-2.0

use console::style;
use guardrail_core::{ChangeKind, Finding, Report, Revision, SarifReport, Severity, Verdict};
use std::io::{self, Write};

use crate::cli::OutputContext;

use super::Renderable;

fn heading(severity: Option<Severity>) -> &'static str {
    severity.map_or("CAPABILITY (tests required)", Severity::label)
}

fn location(finding: &Finding) -> String {
    let suffix = match finding.location {
        Revision::Old => " (old)",
        Revision::New => "",
    };
    format!(
        "{}:{}{suffix}",
        finding.file_path, finding.pattern.line_range
    )
}

fn styled_change(kind: ChangeKind) -> String {
    let label = format!("{:<8}", kind.label());
    match kind {
        ChangeKind::Added => style(label).green().to_string(),
        ChangeKind::Modified => style(label).yellow().to_string(),
        ChangeKind::Removed => style(label).red().to_string(),
    }
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

impl Renderable for Report {
    fn render_text(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()> {
        if self.findings.is_empty() {
            writeln!(
                w,
                "{} No security-relevant changes detected",
                style("✓").green()
            )?;
        } else {
            writeln!(
                w,
                "{}",
                style(format!(
                    "Security-relevant changes: {} finding(s) in {} file(s)",
                    self.findings.len(),
                    self.files.len()
                ))
                .bold()
            )?;

            let mut current: Option<Option<Severity>> = None;
            for finding in &self.findings {
                let severity = finding.severity();
                if current != Some(severity) {
                    writeln!(w)?;
                    writeln!(w, "{}", style(heading(severity)).bold().underlined())?;
                    current = Some(severity);
                }

                let blocking = if finding.blocking {
                    format!(" {}", style("[BLOCKING]").red().bold())
                } else {
                    String::new()
                };
                writeln!(
                    w,
                    "  {} {}  {}{blocking}",
                    styled_change(finding.change_kind),
                    style(finding.pattern.pattern_type.label()).cyan(),
                    location(finding),
                )?;
                writeln!(w, "      {}", style(&finding.pattern.snippet).dim())?;
                writeln!(w, "      {}", finding.pattern.context)?;
                if ctx.verbose && !finding.pattern.anchors.is_empty() {
                    writeln!(w, "      Anchors: {}", finding.pattern.anchors.join(", "))?;
                }
                if let Some(previous) = finding.previous_range {
                    writeln!(w, "      Previously at line {previous}")?;
                }
                if finding.change_kind != ChangeKind::Removed && !finding.has_test_evidence {
                    writeln!(w, "      {}", style("No test evidence found").yellow())?;
                }
                if !ctx.quiet {
                    writeln!(
                        w,
                        "      Impact: {}",
                        finding.pattern.pattern_type.implication()
                    )?;
                }
                if !ctx.quiet || finding.blocking {
                    writeln!(w, "      Fix: {}", finding.remediation.hint())?;
                }
            }
        }

        if !self.warnings.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", style("Warnings:").yellow().bold())?;
            for warning in &self.warnings {
                writeln!(w, "  - {warning}")?;
            }
        }

        writeln!(w)?;
        match self.verdict {
            Verdict::Pass => writeln!(w, "Verdict: {}", style("PASS").green().bold())?,
            Verdict::Block => writeln!(
                w,
                "Verdict: {} ({} blocking finding(s))",
                style("BLOCK").red().bold(),
                self.blocking().count()
            )?,
        }
        Ok(())
    }

    fn render_markdown(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        let verdict = match self.verdict {
            Verdict::Pass => "PASS",
            Verdict::Block => "BLOCK",
        };
        writeln!(w, "## Guardrail: {verdict}\n")?;

        if self.findings.is_empty() {
            writeln!(w, "No security-relevant changes detected.")?;
        } else {
            writeln!(w, "| Severity | Change | Pattern | Location | Tests | Blocking |")?;
            writeln!(w, "|---|---|---|---|---|---|")?;
            for finding in &self.findings {
                writeln!(
                    w,
                    "| {} | {} | {} | `{}` | {} | {} |",
                    finding.severity().map_or("-", Severity::label),
                    finding.change_kind.label(),
                    finding.pattern.pattern_type.label(),
                    markdown_cell(&location(finding)),
                    if finding.has_test_evidence { "yes" } else { "no" },
                    if finding.blocking { "**yes**" } else { "no" },
                )?;
            }

            writeln!(w, "\n### Details\n")?;
            for finding in &self.findings {
                writeln!(
                    w,
                    "- **{}** at `{}`: {}. {}",
                    finding.pattern.pattern_type.label(),
                    location(finding),
                    markdown_cell(&finding.pattern.context),
                    finding.remediation.hint()
                )?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(w, "\n### Warnings\n")?;
            for warning in &self.warnings {
                writeln!(w, "- {warning}")?;
            }
        }
        Ok(())
    }

    fn to_sarif(&self) -> Option<SarifReport> {
        Some(SarifReport::from(self))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use guardrail_core::{AppConfig, Engine, MemoryRevisionProvider, MemoryTestCorpus};

    use super::*;
    use crate::cli::OutputFormat;

    const OLD: &str = "def update_employee(emp_id, data, state):\n    log_event(\"employee_update\", state.session_id)\n    if state.role != \"hr\":\n        raise PermissionError(\"HR only\")\n    employee.update(data)\n";
    const NEW: &str = "def update_employee(emp_id, data, state):\n    employee.update(data)\n";

    async fn report() -> Report {
        report_with(AppConfig::default()).await
    }

    async fn report_with(config: AppConfig) -> Report {
        let engine = Engine::builder()
            .config(config)
            .provider(Arc::new(
                MemoryRevisionProvider::new().with_file("app/api.py", Some(OLD), Some(NEW)),
            ))
            .corpus(Arc::new(MemoryTestCorpus::default()))
            .build();
        engine.run(&["app/api.py".to_string()]).await.unwrap()
    }

    fn ctx(format: OutputFormat) -> OutputContext {
        OutputContext {
            format,
            quiet: false,
            verbose: false,
            is_tty: false,
        }
    }

    #[tokio::test]
    async fn test_text_groups_by_severity() {
        let mut out = Vec::new();
        report()
            .await
            .render_text(&mut out, &ctx(OutputFormat::Text))
            .unwrap();
        let text = console::strip_ansi_codes(&String::from_utf8(out).unwrap()).to_string();

        let critical = text.find("CRITICAL").unwrap();
        let high = text.find("HIGH").unwrap();
        assert!(critical < high);
        assert!(text.contains("app/api.py:3-4 (old)"));
        assert!(text.contains("Verdict: PASS"));
    }

    #[tokio::test]
    async fn test_quiet_keeps_fix_for_blocking_findings() {
        let quiet = OutputContext {
            quiet: true,
            ..ctx(OutputFormat::Text)
        };

        let mut out = Vec::new();
        report().await.render_text(&mut out, &quiet).unwrap();
        let advisory = console::strip_ansi_codes(&String::from_utf8(out).unwrap()).to_string();
        assert!(!advisory.contains("Fix:"));
        assert!(!advisory.contains("Impact:"));

        let mut config = AppConfig::default();
        config.policy.escalate_deletions = true;
        let mut out = Vec::new();
        report_with(config)
            .await
            .render_text(&mut out, &quiet)
            .unwrap();
        let blocking = console::strip_ansi_codes(&String::from_utf8(out).unwrap()).to_string();
        assert!(blocking.contains("[BLOCKING]"));
        assert!(blocking.contains("Fix: "));
        assert!(!blocking.contains("Impact:"));
    }

    #[tokio::test]
    async fn test_markdown_table() {
        let mut out = Vec::new();
        report()
            .await
            .render_markdown(&mut out, &ctx(OutputFormat::Markdown))
            .unwrap();
        let md = String::from_utf8(out).unwrap();
        assert!(md.starts_with("## Guardrail: PASS"));
        assert!(md.contains("| CRITICAL | REMOVED | Role check |"));
    }
}
