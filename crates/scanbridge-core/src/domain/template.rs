//! Template-to-action expansion.
//!
//! [`expand_template`] turns the settings template plus one received scan into
//! the ordered list of concrete actions the output worker executes.  The
//! expansion is pure: it reads an immutable settings snapshot and never
//! observes a half-updated template even while the UI replaces settings
//! concurrently.
//!
//! # Variable expressions
//!
//! `Variable` components evaluate a small closed field-path grammar against
//! the scan instead of running arbitrary code:
//!
//! | expression        | result                          |
//! |-------------------|---------------------------------|
//! | `barcode`         | the scan text                   |
//! | `scan.text`       | the scan text                   |
//! | `scan.meta.<key>` | the metadata value for `<key>`  |
//!
//! Anything else evaluates to the empty string and logs a warning.  Earlier
//! releases of the product family evaluated these expressions with a general
//! scripting engine, which let any device on the LAN execute code on the host;
//! the closed grammar is the supported replacement.

use tracing::warn;

use crate::protocol::messages::Scan;

use super::settings::TemplateComponent;

/// A single concrete output action, executed in order by the output worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputAction {
    /// Type the string as literal keystrokes.
    TypeText(String),
    /// Press and release a single named key.
    KeyTap(String),
}

/// Expands `template` against `scan`, producing one action per component in
/// template order.
pub fn expand_template(template: &[TemplateComponent], scan: &Scan) -> Vec<OutputAction> {
    template
        .iter()
        .map(|component| match component {
            TemplateComponent::Barcode => OutputAction::TypeText(scan.text.clone()),
            TemplateComponent::Literal { value } => OutputAction::TypeText(value.clone()),
            TemplateComponent::Key { value } => OutputAction::KeyTap(value.clone()),
            TemplateComponent::Variable { value } => {
                OutputAction::TypeText(evaluate_variable(value, scan))
            }
        })
        .collect()
}

/// Evaluates a variable expression against a scan.
///
/// Unknown paths yield `""` so one misconfigured component cannot abort the
/// rest of the template.
fn evaluate_variable(expression: &str, scan: &Scan) -> String {
    match expression.trim() {
        "barcode" | "scan.text" => scan.text.clone(),
        path => {
            if let Some(key) = path.strip_prefix("scan.meta.") {
                match scan.metadata.get(key) {
                    Some(value) => value.clone(),
                    None => {
                        warn!("variable {path:?}: scan has no metadata key {key:?}");
                        String::new()
                    }
                }
            } else {
                warn!("unsupported variable expression {path:?}");
                String::new()
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
