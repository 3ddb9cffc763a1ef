use anyhow::Result;
use astrocron_core::recurrence::Recurrence;
use owo_colors::OwoColorize;

use crate::render::{Render, describe_days};

/// Explain a recurrence string.
pub fn run(expression: &str, order: &[u8; 7]) -> Result<()> {
    println!("{}", explain(expression, order)?);
    Ok(())
}

fn explain(expression: &str, order: &[u8; 7]) -> Result<String> {
    let recurrence: Recurrence = expression
        .parse()
        .map_err(|e| anyhow::anyhow!("Cannot read '{}': {}", expression, e))?;

    let mut lines = vec![
        format!(
            "{} at {} (server time)",
            recurrence.period().render(),
            recurrence.time()
        ),
        format!("  {}", describe_days(&recurrence, order)),
    ];

    let canonical = recurrence.to_string();
    if canonical != expression.trim() {
        lines.push(format!("  {}", format!("stored as: {}", canonical).dimmed()));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUNDAY_FIRST: [u8; 7] = [0, 1, 2, 3, 4, 5, 6];

    #[test]
    fn explains_workdays() {
        let text = explain("0 8 ? * 1-5", &SUNDAY_FIRST).unwrap();
        assert!(text.contains("at 08:00"));
        assert!(text.contains("Mon, Tue, Wed, Thu, Fri"));
        assert!(!text.contains("stored as"));
    }

    #[test]
    fn shows_canonical_form() {
        let text = explain("30 6 * * *", &SUNDAY_FIRST).unwrap();
        assert!(text.contains("stored as: 30 6 ? * 0-6"));
    }

    #[test]
    fn rejects_garbage() {
        let err = explain("0 8 ? *", &SUNDAY_FIRST).unwrap_err();
        assert!(err.to_string().contains("expected 5 fields"));
    }
}
