//! Handles all user-facing output for the CLI.
//!
//! Colored traces and listings go through `termcolor`; everything else is
//! plain text on stdout.

use difference::{Changeset, Difference};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::macros::{MacroBinding, MacroExpansionStep, MacroProvenance};

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints a macro expansion trace with colored diffs between steps.
pub fn print_trace(trace: &[MacroExpansionStep]) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    write_trace(&mut stdout, trace)
}

pub fn write_trace<W: WriteColor>(out: &mut W, trace: &[MacroExpansionStep]) -> io::Result<()> {
    if trace.is_empty() {
        writeln!(out, "no macro expansions")?;
        return Ok(());
    }

    for (i, step) in trace.iter().enumerate() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
        writeln!(
            out,
            "--- Step {}: {} ({}) ---",
            i,
            step.macro_name,
            provenance_label(step.provenance)
        )?;
        out.reset()?;

        let before = step.input.value.pretty();
        let after = step.output.value.pretty();
        let changeset = Changeset::new(&before, &after, " ");
        write_diff(out, &changeset.diffs)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Prints macro names with their origin and documentation.
pub fn print_macros<'a, I>(entries: I) -> io::Result<()>
where
    I: IntoIterator<Item = (MacroProvenance, &'a MacroBinding)>,
{
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for (provenance, binding) in entries {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
        write!(stdout, "{}", binding.name)?;
        stdout.reset()?;
        writeln!(stdout, "  [{} from {}]", provenance_label(provenance), binding.module)?;
        if let Some(doc) = &binding.doc {
            writeln!(stdout, "    {doc}")?;
        }
    }
    Ok(())
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn provenance_label(provenance: MacroProvenance) -> &'static str {
    match provenance {
        MacroProvenance::Local => "local",
        MacroProvenance::Module => "module",
        MacroProvenance::Core => "core",
    }
}

fn write_diff<W: WriteColor>(out: &mut W, diffs: &[Difference]) -> io::Result<()> {
    for diff in diffs {
        match diff {
            Difference::Same(x) => {
                out.reset()?;
                write!(out, "{x} ")?;
            }
            Difference::Add(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                write!(out, "{x} ")?;
            }
            Difference::Rem(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                write!(out, "{x} ")?;
            }
        }
    }
    out.reset()?;
    writeln!(out)
}
