//! Consumer side overlays: template evaluation, widget configuration and the
//! per-card state that decides what to fetch and what to show.

pub mod renderer;
pub mod style;
pub mod template;
pub mod variables;
pub mod widget;

pub use renderer::{
    CardElement,
    EventTarget,
    RendererConfig,
    TriggerEvent,
    WidgetNode,
    WidgetRenderer,
};
pub use template::{
    render_template,
    TemplateItem,
};
pub use widget::{
    resolve_widgets,
    LegacyWidgetSettings,
    Widget,
};

mod renderer_tests;
