use std::{
    collections::BTreeMap,
    sync::LazyLock,
};

use regex::Regex;

use super::widget::{
    ConditionOp,
    Widget,
};

pub const BASE_CLASS: &str = "card-user-count";
pub const LOADING_CLASS: &str = "card-user-count-loading";

static RGB_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rgb\((\d+),\s*(\d+),\s*(\d+)\)").unwrap());

/// Class list for a widget, rebuilt from scratch on every call.
pub fn widget_classes(widget: &Widget, loading: bool) -> Vec<String> {
    let mut classes = vec![BASE_CLASS.to_string()];
    if !widget.is_custom_position() {
        classes.push(format!("position-{}", widget.position));
    }
    if widget.style != "default" {
        classes.push(format!("style-{}", widget.style));
    }
    if widget.size != "medium" {
        classes.push(format!("size-{}", widget.size));
    }
    if widget.hover_action != "none" {
        classes.push(format!("hover-{}", widget.hover_action));
    }
    if loading {
        classes.push(LOADING_CLASS.to_string());
    }
    classes
}

fn parse_rgb(color: &str) -> Option<(u8, u8, u8)> {
    if let Some(hex) = color.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let hex = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some((channel(0)?, channel(2)?, channel(4)?));
    }

    let caps = RGB_COLOR.captures(color)?;
    let channel = |i: usize| caps.get(i)?.as_str().parse::<u8>().ok();
    Some((channel(1)?, channel(2)?, channel(3)?))
}

/// Background with the widget opacity (0-100) applied. Colours that are neither
/// hex nor `rgb(...)` are used as given; no colour means translucent black.
pub fn background_color(color: &str, opacity: f64) -> String {
    let alpha = opacity / 100.0;
    if color.is_empty() {
        return format!("rgba(0, 0, 0, {})", opacity * 0.8 / 100.0);
    }
    match parse_rgb(color) {
        Some((r, g, b)) => format!("rgba({}, {}, {}, {})", r, g, b, alpha),
        None => color.to_string(),
    }
}

/// Colours after conditions: the last matching condition wins.
fn effective_colors<'a>(widget: &'a Widget, attributes: &BTreeMap<String, String>) -> (&'a str, &'a str) {
    let mut background = widget.background_color.as_str();
    let mut text = widget.text_color.as_str();

    for condition in &widget.conditions {
        let actual = attributes
            .get(&format!("data-{}", condition.field))
            .map(|v| v.to_lowercase())
            .unwrap_or_default();
        let expected = condition.value.to_lowercase();
        let matched = match condition.op {
            ConditionOp::Eq => actual == expected,
            ConditionOp::Neq => actual != expected,
        };
        if matched {
            if let Some(bg) = condition.background_color.as_deref().filter(|c| !c.is_empty()) {
                background = bg;
            }
            if let Some(color) = condition.text_color.as_deref().filter(|c| !c.is_empty()) {
                text = color;
            }
        }
    }

    (background, text)
}

/// Inline style declarations, in a fixed order.
pub fn widget_style(widget: &Widget, attributes: &BTreeMap<String, String>) -> Vec<(String, String)> {
    let (background, text) = effective_colors(widget, attributes);
    let mut style = vec![("background-color".to_string(), background_color(background, widget.opacity))];
    if !text.is_empty() {
        style.push(("color".to_string(), text.to_string()));
    }

    if widget.is_custom_position() {
        let offsets = [
            ("top", widget.position_top_percent),
            ("left", widget.position_left_percent),
            ("right", widget.position_right_percent),
            ("bottom", widget.position_bottom_percent),
        ];
        for (side, percent) in offsets {
            if let Some(percent) = percent {
                style.push((side.to_string(), format!("{}%", percent)));
            }
        }
    }
    style
}
