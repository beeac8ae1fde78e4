use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    fmt,
    str::FromStr,
};

use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};

use super::{
    style::{
        widget_classes,
        widget_style,
    },
    template::{
        render_template,
        Placeholders,
    },
    variables::{
        record_values,
        VariableMap,
        CARD_ID_VARIABLE,
    },
    widget::Widget,
};
use crate::{
    core::{
        utils::EscapeHtml,
        CardDataItem,
        CardId,
        CardStatRecord,
        ParseType,
    },
    websocket::{
        Broadcast,
        ClientMessage,
    },
};

pub const DEFAULT_LOADING_TOKEN: &str = "...";

/// Which interaction asks for fresh data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventTarget {
    /// As soon as the card shows up, and again on hover.
    #[default]
    Automatic,
    MouseOver,
    /// Press of the given mouse button.
    MouseDown(u8),
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTarget::Automatic => f.write_str("automatic"),
            EventTarget::MouseOver => f.write_str("mouseover"),
            EventTarget::MouseDown(button) => write!(f, "mousedown-{}", button),
        }
    }
}

impl FromStr for EventTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "automatic" => Ok(EventTarget::Automatic),
            "mouseover" => Ok(EventTarget::MouseOver),
            other => other
                .strip_prefix("mousedown-")
                .and_then(|button| button.parse().ok())
                .map(EventTarget::MouseDown)
                .ok_or_else(|| format!("Unknown event target: {}", other)),
        }
    }
}

impl Serialize for EventTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// The card element was added to the page.
    Appear,
    MouseOver,
    MouseDown(u8),
}

impl EventTarget {
    pub fn accepts(&self, event: TriggerEvent) -> bool {
        match (self, event) {
            (EventTarget::Automatic, TriggerEvent::Appear | TriggerEvent::MouseOver) => true,
            (EventTarget::MouseOver, TriggerEvent::MouseOver) => true,
            (EventTarget::MouseDown(wanted), TriggerEvent::MouseDown(button)) => *wanted == button,
            _ => false,
        }
    }
}

/// Rendered overlay for one widget on one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetNode {
    pub widget_id: String,
    pub classes: Vec<String>,
    pub style: Vec<(String, String)>,
    pub inner_html: String,
}

impl WidgetNode {
    pub fn class_attr(&self) -> String {
        self.classes.join(" ")
    }

    pub fn style_attr(&self) -> String {
        self.style.iter().map(|(k, v)| format!("{}: {};", k, v)).collect::<Vec<_>>().join(" ")
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<div class="{}" data-widget-id="{}" style="{}">{}</div>"#,
            self.class_attr().escape_html(),
            self.widget_id.escape_html(),
            self.style_attr().escape_html(),
            self.inner_html
        )
    }
}

/// A card on the page with whatever has been fetched for it so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardElement {
    pub card_id: CardId,
    /// `data-*` attributes of the card, used by widget conditions.
    pub attributes: BTreeMap<String, String>,
    data: BTreeMap<ParseType, CardStatRecord>,
    errors: BTreeMap<ParseType, String>,
    pending: BTreeSet<ParseType>,
    nodes: BTreeMap<String, WidgetNode>,
}

impl CardElement {
    pub fn new(card_id: CardId) -> Self {
        Self {
            card_id,
            attributes: BTreeMap::new(),
            data: BTreeMap::new(),
            errors: BTreeMap::new(),
            pending: BTreeSet::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn has_data(&self, parse_type: ParseType) -> bool {
        self.data.contains_key(&parse_type)
    }

    pub fn is_pending(&self, parse_type: ParseType) -> bool {
        self.pending.contains(&parse_type)
    }

    pub fn error(&self, parse_type: ParseType) -> Option<&str> {
        self.errors.get(&parse_type).map(String::as_str)
    }

    pub fn node(&self, widget_id: &str) -> Option<&WidgetNode> {
        self.nodes.get(widget_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &WidgetNode> {
        self.nodes.values()
    }

    pub fn variables(&self) -> VariableMap {
        let mut values = VariableMap::new();
        values.insert(CARD_ID_VARIABLE.to_string(), self.card_id.to_string());
        for record in self.data.values() {
            for (name, value) in record_values(record) {
                values.insert(name.to_string(), value);
            }
        }
        values
    }

    /// Returns whether the item was for this card. Username-scoped items only
    /// count when they belong to `username`.
    fn apply(&mut self, item: &CardDataItem, username: Option<&str>) -> bool {
        if item.card_id() != &self.card_id {
            return false;
        }
        let parse_type = item.parse_type();
        if parse_type.requires_username() && item.username() != username {
            return false;
        }
        self.pending.remove(&parse_type);
        match item {
            CardDataItem::Record(record) => {
                self.errors.remove(&parse_type);
                self.data.insert(parse_type, record.clone());
            }
            CardDataItem::Error { error, .. } => {
                self.errors.insert(parse_type, error.clone());
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub event_target: EventTarget,
    pub widgets: Vec<Widget>,
    pub loading_token: String,
    /// Site origin sent along with fetch requests.
    pub origin: String,
    pub username: Option<String>,
}

impl RendererConfig {
    pub fn new(origin: &str, widgets: Vec<Widget>) -> Self {
        Self {
            event_target: EventTarget::default(),
            widgets,
            loading_token: DEFAULT_LOADING_TOKEN.to_string(),
            origin: origin.to_string(),
            username: None,
        }
    }
}

/// Consumer side of the card data protocol: decides what to request for a card
/// and renders every enabled widget from the data received so far.
pub struct WidgetRenderer {
    config: RendererConfig,
}

impl WidgetRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn enabled_widgets(&self) -> impl Iterator<Item = &Widget> {
        self.config.widgets.iter().filter(|widget| widget.enabled)
    }

    /// Parse types referenced by enabled widgets. `duplicates` is left out when no
    /// username is known.
    pub fn required_parse_types(&self) -> BTreeSet<ParseType> {
        self.enabled_widgets()
            .flat_map(Widget::required_parse_types)
            .filter(|parse_type| !parse_type.requires_username() || self.config.username.is_some())
            .collect()
    }

    /// Marks what the card still lacks as pending and returns the single request
    /// covering it, if any.
    pub fn handle_event(&self, element: &mut CardElement, event: TriggerEvent) -> Option<ClientMessage> {
        if !self.config.event_target.accepts(event) {
            return None;
        }

        let missing: Vec<ParseType> = self
            .required_parse_types()
            .into_iter()
            .filter(|parse_type| !element.has_data(*parse_type) && !element.is_pending(*parse_type))
            .collect();
        if missing.is_empty() {
            return None;
        }

        element.pending.extend(missing.iter().copied());
        self.render(element);

        Some(ClientMessage::FetchCardDataQueue {
            card_ids: vec![element.card_id.clone()],
            origin: self.config.origin.clone(),
            parse_types: missing,
            username: self.config.username.clone(),
        })
    }

    /// Request for whatever is already cached for these cards.
    pub fn cached_request(&self, elements: &[CardElement]) -> Option<ClientMessage> {
        let parse_types: Vec<ParseType> = self.required_parse_types().into_iter().collect();
        let mut seen = BTreeSet::new();
        let card_ids: Vec<CardId> = elements
            .iter()
            .map(|element| element.card_id.clone())
            .filter(|card_id| !card_id.is_empty() && seen.insert(card_id.clone()))
            .collect();

        if card_ids.is_empty() || parse_types.is_empty() {
            return None;
        }
        Some(ClientMessage::FetchCachedCardData { card_ids, parse_types, username: self.config.username.clone() })
    }

    /// Applies updated items and re-renders the cards they touched. Returns how
    /// many cards changed.
    pub fn apply_update(&self, elements: &mut [CardElement], items: &[CardDataItem]) -> usize {
        let mut touched = 0;
        for element in elements.iter_mut() {
            let mut changed = false;
            for item in items {
                changed |= element.apply(item, self.config.username.as_deref());
            }
            if changed {
                self.render(element);
                touched += 1;
            }
        }
        touched
    }

    /// Nothing pending will arrive anymore; drop the loading state.
    pub fn apply_queue_cleared(&self, elements: &mut [CardElement]) {
        for element in elements.iter_mut().filter(|element| !element.pending.is_empty()) {
            element.pending.clear();
            self.render(element);
        }
    }

    pub fn handle_broadcast(&self, elements: &mut [CardElement], broadcast: &Broadcast) {
        match broadcast {
            Broadcast::CardDataUpdated { items } => {
                self.apply_update(elements, items);
            }
            Broadcast::CardDataQueueCleared => self.apply_queue_cleared(elements),
        }
    }

    fn render_widget(&self, widget: &Widget, element: &CardElement, values: &VariableMap) -> WidgetNode {
        let required = widget.required_parse_types();
        let loading = required.iter().any(|parse_type| element.is_pending(*parse_type));
        let error = required
            .iter()
            .filter(|parse_type| !element.has_data(**parse_type))
            .find_map(|parse_type| element.error(*parse_type));

        let inner_html = match error {
            Some(error) if !loading => error.escape_html(),
            _ => {
                let placeholders = Placeholders { pending: &element.pending, loading_token: &self.config.loading_token };
                render_template(&widget.template_items, values, Some(placeholders))
            }
        };

        WidgetNode {
            widget_id: widget.id.clone(),
            classes: widget_classes(widget, loading),
            style: widget_style(widget, &element.attributes),
            inner_html,
        }
    }

    /// Rebuilds every widget node of the element from its current state.
    pub fn render(&self, element: &mut CardElement) {
        let values = element.variables();
        let nodes: BTreeMap<String, WidgetNode> = self
            .enabled_widgets()
            .map(|widget| (widget.id.clone(), self.render_widget(widget, element, &values)))
            .collect();
        element.nodes = nodes;
    }
}
