use std::collections::BTreeSet;

use serde::{
    Deserialize,
    Serialize,
};

use super::variables::{
    parse_type_of,
    VariableMap,
};
use crate::core::{
    utils::EscapeHtml,
    ParseType,
};

pub const MISSING_VALUE: &str = "?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TemplateItem {
    Text {
        #[serde(default)]
        text: String,
    },
    Icon {
        #[serde(default)]
        icon: String,
    },
    Variable {
        variable: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
}

impl TemplateItem {
    pub fn text(text: &str) -> Self {
        TemplateItem::Text { text: text.to_string() }
    }

    pub fn variable(variable: &str) -> Self {
        TemplateItem::Variable { variable: variable.to_string(), icon: None }
    }
}

pub fn default_template() -> Vec<TemplateItem> {
    vec![
        TemplateItem::variable("need"),
        TemplateItem::text(" | "),
        TemplateItem::variable("owner"),
        TemplateItem::text(" | "),
        TemplateItem::variable("trade"),
    ]
}

/// Parse types the template's variables draw from.
pub fn required_parse_types(items: &[TemplateItem]) -> BTreeSet<ParseType> {
    items
        .iter()
        .filter_map(|item| match item {
            TemplateItem::Variable { variable, .. } => parse_type_of(variable),
            _ => None,
        })
        .collect()
}

fn icon_markup(icon: &str) -> String {
    let icon = icon.trim();
    if icon.is_empty() {
        String::new()
    } else {
        format!(r#"<i class="{}"></i>"#, icon.escape_html())
    }
}

/// What a variable without a value shows.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub pending: &'a BTreeSet<ParseType>,
    pub loading_token: &'a str,
}

impl Placeholders<'_> {
    fn for_variable(&self, variable: &str) -> String {
        match parse_type_of(variable) {
            Some(parse_type) if self.pending.contains(&parse_type) => self.loading_token.escape_html(),
            _ => MISSING_VALUE.to_string(),
        }
    }
}

/// Renders template items to markup. Text and values are escaped; only icon
/// segments produce tags.
pub fn render_template(items: &[TemplateItem], values: &VariableMap, placeholders: Option<Placeholders<'_>>) -> String {
    let mut out = String::new();
    for item in items {
        match item {
            TemplateItem::Text { text } => out.push_str(&text.escape_html()),
            TemplateItem::Icon { icon } => out.push_str(&icon_markup(icon)),
            TemplateItem::Variable { variable, icon } => match values.get(variable) {
                Some(value) => {
                    if let Some(icon) = icon {
                        out.push_str(&icon_markup(icon));
                    }
                    out.push_str(&value.escape_html());
                }
                None => match placeholders {
                    Some(placeholders) => out.push_str(&placeholders.for_variable(variable)),
                    None => out.push_str(MISSING_VALUE),
                },
            },
        }
    }
    out
}
