use std::collections::BTreeSet;

use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};
use serde_json::Value;

use super::template::{
    default_template,
    required_parse_types,
    TemplateItem,
};
use crate::core::ParseType;

pub const DEFAULT_POSITION: &str = "bottom-right";
pub const CUSTOM_POSITION: &str = "custom";
pub const DEFAULT_STYLE: &str = "default";
pub const DEFAULT_SIZE: &str = "medium";
pub const DEFAULT_HOVER_ACTION: &str = "none";
pub const DEFAULT_OPACITY: f64 = 80.0;
pub const LEGACY_WIDGET_ID: &str = "user-count";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Eq,
    Neq,
}

/// Colour override applied when a card element attribute matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetCondition {
    /// Attribute name without the `data-` prefix.
    pub field: String,
    pub op: ConditionOp,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

/// One overlay configuration. Several can be shown on the same card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Widget {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub position: String,
    #[serde(deserialize_with = "lenient_number")]
    pub position_top_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub position_left_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub position_right_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub position_bottom_percent: Option<f64>,
    pub style: String,
    pub size: String,
    pub background_color: String,
    pub text_color: String,
    #[serde(deserialize_with = "lenient_opacity")]
    pub opacity: f64,
    pub hover_action: String,
    #[serde(default)]
    pub template_items: Vec<TemplateItem>,
    pub conditions: Vec<WidgetCondition>,
}

impl Default for Widget {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            enabled: true,
            position: DEFAULT_POSITION.to_string(),
            position_top_percent: None,
            position_left_percent: None,
            position_right_percent: None,
            position_bottom_percent: None,
            style: DEFAULT_STYLE.to_string(),
            size: DEFAULT_SIZE.to_string(),
            background_color: String::new(),
            text_color: String::new(),
            opacity: DEFAULT_OPACITY,
            hover_action: DEFAULT_HOVER_ACTION.to_string(),
            template_items: default_template(),
            conditions: Vec::new(),
        }
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_f64())
}

fn lenient_opacity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(lenient_number(deserializer)?.unwrap_or(DEFAULT_OPACITY))
}

fn or_default(value: &mut String, default: &str) {
    if value.trim().is_empty() {
        *value = default.to_string();
    }
}

impl Widget {
    pub fn is_custom_position(&self) -> bool {
        self.position == CUSTOM_POSITION
    }

    pub fn required_parse_types(&self) -> BTreeSet<ParseType> {
        required_parse_types(&self.template_items)
    }

    fn normalize(mut self, index: usize) -> Self {
        if self.id.trim().is_empty() {
            self.id = format!("w{}", index + 1);
        }
        or_default(&mut self.position, DEFAULT_POSITION);
        or_default(&mut self.style, DEFAULT_STYLE);
        or_default(&mut self.size, DEFAULT_SIZE);
        or_default(&mut self.hover_action, DEFAULT_HOVER_ACTION);
        if !self.opacity.is_finite() {
            self.opacity = DEFAULT_OPACITY;
        }
        self.opacity = self.opacity.clamp(0.0, 100.0);
        self
    }
}

/// Fills in ids and empty fields, keeping the order.
pub fn normalize_widgets(widgets: Vec<Widget>) -> Vec<Widget> {
    widgets.into_iter().enumerate().map(|(index, widget)| widget.normalize(index)).collect()
}

/// Widget list as stored: either a JSON array or a string holding one.
pub fn parse_widgets(raw: &Value) -> Vec<Widget> {
    let parsed = match raw {
        Value::String(json) => serde_json::from_str::<Vec<Widget>>(json),
        other => serde_json::from_value::<Vec<Widget>>(other.clone()),
    };
    match parsed {
        Ok(widgets) => normalize_widgets(widgets),
        Err(e) => {
            tracing::warn!("Ignoring unreadable widget list: {}", e);
            Vec::new()
        }
    }
}

/// Settings of the single overlay that predates widget lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyWidgetSettings {
    #[serde(rename = "card-user-count")]
    pub enabled: Option<bool>,
    #[serde(rename = "card-user-count-template-items")]
    pub template_items: Option<Value>,
    #[serde(rename = "card-user-count-position")]
    pub position: Option<String>,
    #[serde(rename = "card-user-count-style")]
    pub style: Option<String>,
    #[serde(rename = "card-user-count-size")]
    pub size: Option<String>,
    #[serde(rename = "card-user-count-background-color")]
    pub background_color: Option<String>,
    #[serde(rename = "card-user-count-text-color")]
    pub text_color: Option<String>,
    #[serde(rename = "card-user-count-opacity", deserialize_with = "lenient_number")]
    pub opacity: Option<f64>,
    #[serde(rename = "card-user-count-hover-action")]
    pub hover_action: Option<String>,
}

impl LegacyWidgetSettings {
    fn template_items(&self) -> Vec<TemplateItem> {
        let parsed = match &self.template_items {
            Some(Value::String(json)) => serde_json::from_str(json).ok(),
            Some(value @ Value::Array(_)) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        };
        parsed.unwrap_or_else(default_template)
    }

    pub fn into_widget(self) -> Widget {
        let widget = Widget {
            id: LEGACY_WIDGET_ID.to_string(),
            enabled: self.enabled.unwrap_or(true),
            template_items: self.template_items(),
            position: self.position.unwrap_or_default(),
            style: self.style.unwrap_or_default(),
            size: self.size.unwrap_or_default(),
            background_color: self.background_color.unwrap_or_default(),
            text_color: self.text_color.unwrap_or_default(),
            opacity: self.opacity.unwrap_or(DEFAULT_OPACITY),
            hover_action: self.hover_action.unwrap_or_default(),
            ..Widget::default()
        };
        widget.normalize(0)
    }
}

/// The configured widget list, or the legacy overlay migrated into one when the
/// list is missing or empty.
pub fn resolve_widgets(raw: Option<&Value>, legacy: &LegacyWidgetSettings) -> Vec<Widget> {
    let widgets = raw.map(parse_widgets).unwrap_or_default();
    if widgets.is_empty() {
        vec![legacy.clone().into_widget()]
    } else {
        widgets
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_normalize_fills_defaults() {
        let widgets = parse_widgets(&json!([
            {"enabled": true, "templateItems": [{"type": "variable", "variable": "trade"}]},
            {"id": "second", "position": "", "opacity": "half", "style": "minimal"}
        ]));

        assert_eq!(widgets.len(), 2);
        assert_eq!(widgets[0].id, "w1");
        assert!(widgets[0].enabled);
        assert_eq!(widgets[0].position, "bottom-right");
        assert_eq!(widgets[0].template_items, vec![TemplateItem::variable("trade")]);

        assert_eq!(widgets[1].id, "second");
        assert!(!widgets[1].enabled);
        assert_eq!(widgets[1].position, "bottom-right");
        assert_eq!(widgets[1].opacity, 80.0);
        assert_eq!(widgets[1].style, "minimal");
        assert!(widgets[1].template_items.is_empty());
    }

    #[test]
    fn test_widgets_stored_as_string() {
        let raw = json!(r#"[{"id":"a","enabled":true,"position":"custom","positionTopPercent":5}]"#);
        let widgets = parse_widgets(&raw);
        assert_eq!(widgets[0].id, "a");
        assert!(widgets[0].is_custom_position());
        assert_eq!(widgets[0].position_top_percent, Some(5.0));

        assert!(parse_widgets(&json!("not json")).is_empty());
    }

    #[test]
    fn test_legacy_migration() {
        let legacy: LegacyWidgetSettings = serde_json::from_value(json!({
            "card-user-count-position": "top-left",
            "card-user-count-opacity": 60,
            "card-user-count-template-items": "[{\"type\":\"variable\",\"variable\":\"owner\"}]"
        }))
        .unwrap();

        let widgets = resolve_widgets(Some(&json!([])), &legacy);
        assert_eq!(widgets.len(), 1);
        let widget = &widgets[0];
        assert_eq!(widget.id, LEGACY_WIDGET_ID);
        assert!(widget.enabled);
        assert_eq!(widget.position, "top-left");
        assert_eq!(widget.size, "medium");
        assert_eq!(widget.opacity, 60.0);
        assert_eq!(widget.template_items, vec![TemplateItem::variable("owner")]);
    }

    #[test]
    fn test_legacy_defaults_to_counts_template() {
        let widgets = resolve_widgets(None, &LegacyWidgetSettings::default());
        assert_eq!(widgets[0].template_items, default_template());
        assert_eq!(widgets[0].required_parse_types(), BTreeSet::from([ParseType::Counts]));
    }
}
