// SPDX-License-Identifier: Apache-2.0

//! Output rendering for CLI commands.
//!
//! Command handlers return data; this module handles presentation in text,
//! JSON, YAML, Markdown and SARIF.

use anyhow::{Context, Result};
use guardrail_core::SarifReport;
use serde::Serialize;
use std::io::{self, Write};

use crate::cli::{OutputContext, OutputFormat};

mod patterns;
mod report;

/// Trait for types that can be rendered in multiple output formats.
pub trait Renderable: Serialize {
    /// Render as human-readable text to the given writer.
    fn render_text(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()>;

    /// Render as markdown. Defaults to text rendering.
    fn render_markdown(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()> {
        self.render_text(w, ctx)
    }

    /// SARIF view of the result. Types without one are emitted as JSON.
    fn to_sarif(&self) -> Option<SarifReport> {
        None
    }
}

/// Generic render function - handles JSON/YAML/SARIF via serde, delegates text/markdown to trait.
pub fn render<T: Renderable>(result: &T, ctx: &OutputContext) -> Result<()> {
    let mut stdout = io::stdout().lock();
    render_to(result, ctx, &mut stdout)
}

fn render_to<T: Renderable>(result: &T, ctx: &OutputContext, w: &mut dyn Write) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(result).context("Failed to serialize to JSON")?;
            writeln!(w, "{json}")?;
        }
        OutputFormat::Yaml => {
            let yaml = serde_saphyr::to_string(result).context("Failed to serialize to YAML")?;
            writeln!(w, "{yaml}")?;
        }
        OutputFormat::Sarif => {
            let json = match result.to_sarif() {
                Some(sarif) => serde_json::to_string_pretty(&sarif),
                None => serde_json::to_string_pretty(result),
            }
            .context("Failed to serialize to SARIF")?;
            writeln!(w, "{json}")?;
        }
        OutputFormat::Markdown => {
            result
                .render_markdown(w, ctx)
                .context("Failed to render markdown")?;
        }
        OutputFormat::Text => {
            result
                .render_text(w, ctx)
                .context("Failed to render text")?;
        }
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Plain {
        name: &'static str,
    }

    impl Renderable for Plain {
        fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
            writeln!(w, "name: {}", self.name)
        }
    }

    fn ctx(format: OutputFormat) -> OutputContext {
        OutputContext {
            format,
            quiet: true,
            verbose: false,
            is_tty: false,
        }
    }

    #[test]
    fn test_sarif_falls_back_to_json() {
        let mut out = Vec::new();
        render_to(&Plain { name: "x" }, &ctx(OutputFormat::Sarif), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["name"], "x");
    }

    #[test]
    fn test_markdown_defaults_to_text() {
        let mut out = Vec::new();
        render_to(&Plain { name: "x" }, &ctx(OutputFormat::Markdown), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "name: x\n");
    }
}
