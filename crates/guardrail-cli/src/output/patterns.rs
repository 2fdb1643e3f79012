// SPDX-License-Identifier: Apache-2.0

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use guardrail_core::Severity;
use std::io::{self, Write};

use crate::cli::OutputContext;
use crate::commands::patterns::PatternCatalog;

use super::Renderable;

impl Renderable for PatternCatalog {
    fn render_text(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()> {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Pattern", "Severity", "Source", "Trigger"]);
        if !ctx.is_tty {
            table.force_no_tty();
        }
        for p in &self.patterns {
            table.add_row(vec![
                p.id,
                p.severity.map_or("capability", Severity::label),
                p.source_kind.label(),
                p.trigger,
            ]);
        }
        writeln!(w, "{table}")
    }

    fn render_markdown(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        writeln!(w, "## Security patterns\n")?;
        writeln!(w, "| Pattern | Severity | Source | Trigger | Implication |")?;
        writeln!(w, "|---|---|---|---|---|")?;
        for p in &self.patterns {
            writeln!(
                w,
                "| `{}` | {} | {} | {} | {} |",
                p.id,
                p.severity.map_or("capability", Severity::label),
                p.source_kind.label(),
                p.trigger.replace('|', "\\|"),
                p.implication.replace('|', "\\|"),
            )?;
        }
        Ok(())
    }
}
