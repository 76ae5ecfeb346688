//! `${name}` substitution against a store.

use std::collections::BTreeMap;

use ikp_types::document::Widget;
use ikp_types::Template;

use crate::store::Lookup;

/// Substitute every `${name}` span in `template` with the current value
/// of `name`.
///
/// Unset variables and `null` render as the empty string; malformed spans
/// are kept verbatim and substituted text is never re-scanned.
pub fn interpolate(template: &str, store: &impl Lookup) -> String {
    if !template.contains("${") {
        return template.to_string();
    }
    render_template(&Template::parse(template), store)
}

/// Render a pre-scanned template.
pub fn render_template(template: &Template, store: &impl Lookup) -> String {
    template.render(|name| store.lookup(name))
}

/// The widget's main text (its first present text property), interpolated.
/// Empty when the widget has no text property.
pub fn interpolated_text(widget: &Widget, store: &impl Lookup) -> String {
    widget
        .primary_text_prop()
        .and_then(|prop| widget.template(prop))
        .map(|template| render_template(template, store))
        .unwrap_or_default()
}

/// Every string property of the widget, interpolated, keyed by name.
pub fn interpolated_props(widget: &Widget, store: &impl Lookup) -> BTreeMap<String, String> {
    widget
        .templates
        .iter()
        .map(|(prop, template)| (prop.clone(), render_template(template, store)))
        .collect()
}
