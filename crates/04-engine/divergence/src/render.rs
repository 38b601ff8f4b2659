//! Human-readable divergence report.

use crate::Divergence;

/// Formats the report printed when a step diverges.
///
/// The header names the step and both PCs. It is followed by one
/// `<FIELD>: Got: <hex>, Expected: <hex>` line per register pair, suffixed
/// with ` *` when that pair differs, and a final `Flags:` line.
pub fn render(step: u64, divergence: &Divergence) -> String {
    let pc = divergence.field(register_snapshot::Reg16::Pc);
    let mut out = format!(
        "Divergence at step {step} (subject PC {:04x}, reference PC {:04x})\n",
        pc.got, pc.expected
    );
    for field in &divergence.fields {
        let marker = if field.is_mismatch() { " *" } else { "" };
        out.push_str(&format!(
            "{}: Got: {:04x}, Expected: {:04x}{marker}\n",
            field.reg, field.got, field.expected
        ));
    }
    out.push_str(&format!(
        "Flags: Got: {}, Expected: {}\n",
        divergence.got_flags, divergence.expected_flags
    ));
    out
}
