#[cfg(test)]
mod tests {
    use crate::{
        core::{
            CardDataItem,
            CardId,
            CardStatRecord,
            Counts,
            DataSource,
            ParseType,
            StatPayload,
        },
        websocket::{
            Broadcast,
            ClientMessage,
        },
        widgets::{
            CardElement,
            EventTarget,
            RendererConfig,
            TemplateItem,
            TriggerEvent,
            Widget,
            WidgetRenderer,
        },
    };

    const ORIGIN: &str = "https://animestars.org";

    fn widget(id: &str, template_items: Vec<TemplateItem>) -> Widget {
        Widget { id: id.into(), enabled: true, template_items, ..Widget::default() }
    }

    fn renderer(widgets: Vec<Widget>) -> WidgetRenderer {
        WidgetRenderer::new(RendererConfig::new(ORIGIN, widgets))
    }

    fn counts_record(card_id: u64) -> CardDataItem {
        CardDataItem::Record(CardStatRecord::new(
            CardId::from(card_id),
            ParseType::Counts,
            None,
            StatPayload::Counts(Counts { trade: 46, need: 14, owner: 642 }),
            DataSource::Html,
        ))
    }

    fn requested_types(message: Option<ClientMessage>) -> Vec<ParseType> {
        match message {
            Some(ClientMessage::FetchCardDataQueue { parse_types, .. }) => parse_types,
            other => panic!("Expected fetch_card_data_queue, got {:?}", other),
        }
    }

    #[test]
    fn test_counts_widget_requests_only_counts() {
        let renderer = renderer(vec![widget(
            "w1",
            vec![TemplateItem::variable("need"), TemplateItem::variable("owner"), TemplateItem::variable("trade")],
        )]);
        let mut card = CardElement::new(CardId::from(4779));

        let message = renderer.handle_event(&mut card, TriggerEvent::Appear);
        assert_eq!(requested_types(message), vec![ParseType::Counts]);
        assert!(card.is_pending(ParseType::Counts));
        assert!(!card.is_pending(ParseType::Unlocked));
        assert!(!card.is_pending(ParseType::SiteDeck));

        // Already pending, nothing more to ask for.
        assert!(renderer.handle_event(&mut card, TriggerEvent::MouseOver).is_none());
    }

    #[test]
    fn test_two_widgets_share_one_request() {
        let renderer = renderer(vec![
            widget("counts", vec![TemplateItem::variable("need")]),
            widget("deck", vec![TemplateItem::variable("deckCountTotal")]),
        ]);
        let mut card = CardElement::new(CardId::from(12));

        let message = renderer.handle_event(&mut card, TriggerEvent::Appear);
        assert_eq!(
            message,
            Some(ClientMessage::FetchCardDataQueue {
                card_ids: vec![CardId::from(12)],
                origin: ORIGIN.into(),
                parse_types: vec![ParseType::Counts, ParseType::SiteDeck],
                username: None,
            })
        );
    }

    #[test]
    fn test_loading_then_values() {
        let renderer = renderer(vec![widget("w1", crate::widgets::template::default_template())]);
        let mut cards = vec![CardElement::new(CardId::from(4779))];

        renderer.handle_event(&mut cards[0], TriggerEvent::Appear);
        let loading = cards[0].node("w1").unwrap();
        assert_eq!(loading.inner_html, "... | ... | ...");
        assert!(loading.classes.contains(&"card-user-count-loading".to_string()));

        let touched = renderer.apply_update(&mut cards, &[counts_record(4779), counts_record(1)]);
        assert_eq!(touched, 1);

        let node = cards[0].node("w1").unwrap().clone();
        assert_eq!(node.inner_html, "14 | 642 | 46");
        assert_eq!(node.class_attr(), "card-user-count position-bottom-right");

        renderer.render(&mut cards[0]);
        assert_eq!(cards[0].node("w1").unwrap(), &node);

        // Data present: hovering again requests nothing.
        assert!(renderer.handle_event(&mut cards[0], TriggerEvent::MouseOver).is_none());
    }

    #[test]
    fn test_error_replaces_widget_content() {
        let renderer = renderer(vec![widget("w1", vec![TemplateItem::variable("owner")])]);
        let mut cards = vec![CardElement::new(CardId::from(5))];
        renderer.handle_event(&mut cards[0], TriggerEvent::Appear);

        let error = CardDataItem::Error {
            card_id: CardId::from(5),
            parse_type: ParseType::Counts,
            username: None,
            error: "Not found: Card not found".into(),
        };
        renderer.handle_broadcast(&mut cards, &Broadcast::CardDataUpdated { items: vec![error] });

        assert_eq!(cards[0].node("w1").unwrap().inner_html, "Not found: Card not found");
        assert!(!cards[0].is_pending(ParseType::Counts));
    }

    #[test]
    fn test_queue_cleared_drops_loading_state() {
        let renderer = renderer(vec![widget("w1", vec![TemplateItem::variable("need")])]);
        let mut cards = vec![CardElement::new(CardId::from(7))];
        renderer.handle_event(&mut cards[0], TriggerEvent::Appear);

        renderer.handle_broadcast(&mut cards, &Broadcast::CardDataQueueCleared);

        let node = cards[0].node("w1").unwrap();
        assert_eq!(node.inner_html, "?");
        assert!(!node.classes.iter().any(|c| c == "card-user-count-loading"));
    }

    #[test]
    fn test_event_targets() {
        let mut config = RendererConfig::new(ORIGIN, vec![widget("w1", vec![TemplateItem::variable("need")])]);
        config.event_target = "mousedown-1".parse().unwrap();
        let renderer = WidgetRenderer::new(config);
        let mut card = CardElement::new(CardId::from(3));

        assert!(renderer.handle_event(&mut card, TriggerEvent::Appear).is_none());
        assert!(renderer.handle_event(&mut card, TriggerEvent::MouseOver).is_none());
        assert!(renderer.handle_event(&mut card, TriggerEvent::MouseDown(0)).is_none());
        assert!(renderer.handle_event(&mut card, TriggerEvent::MouseDown(1)).is_some());

        assert!(EventTarget::Automatic.accepts(TriggerEvent::Appear));
        assert!(!EventTarget::MouseOver.accepts(TriggerEvent::Appear));
        assert_eq!(EventTarget::MouseDown(2).to_string(), "mousedown-2");
        assert!("mousedown-x".parse::<EventTarget>().is_err());
        assert_eq!(serde_json::from_str::<EventTarget>("\"mouseover\"").unwrap(), EventTarget::MouseOver);
    }

    #[test]
    fn test_disabled_widgets_are_ignored() {
        let disabled = Widget { enabled: false, ..widget("off", vec![TemplateItem::variable("deckCountS")]) };
        let renderer = renderer(vec![disabled, widget("on", vec![TemplateItem::variable("trade")])]);
        let mut card = CardElement::new(CardId::from(3));

        assert_eq!(requested_types(renderer.handle_event(&mut card, TriggerEvent::Appear)), vec![ParseType::Counts]);
        assert!(card.node("off").is_none());
        assert!(card.node("on").is_some());
    }

    #[test]
    fn test_duplicates_need_a_username() {
        let widgets = vec![widget("w1", vec![TemplateItem::variable("duplicates"), TemplateItem::variable("need")])];
        let anonymous = renderer(widgets.clone());
        assert_eq!(
            requested_types(anonymous.handle_event(&mut CardElement::new(CardId::from(1)), TriggerEvent::Appear)),
            vec![ParseType::Counts]
        );

        let mut config = RendererConfig::new(ORIGIN, widgets);
        config.username = Some("alice".into());
        let signed_in = WidgetRenderer::new(config);
        assert_eq!(
            requested_types(signed_in.handle_event(&mut CardElement::new(CardId::from(1)), TriggerEvent::Appear)),
            vec![ParseType::Counts, ParseType::Duplicates]
        );
    }

    #[test]
    fn test_other_users_duplicates_are_ignored() {
        let mut config = RendererConfig::new(ORIGIN, vec![widget("w1", vec![TemplateItem::variable("duplicates")])]);
        config.username = Some("alice".into());
        let renderer = WidgetRenderer::new(config);
        let mut cards = vec![CardElement::new(CardId::from(4779))];
        renderer.render(&mut cards[0]);

        let duplicates = |username: &str, count: u32| {
            CardDataItem::Record(CardStatRecord::new(
                CardId::from(4779),
                ParseType::Duplicates,
                Some(username.into()),
                StatPayload::Duplicates { duplicates: count },
                DataSource::Html,
            ))
        };

        assert_eq!(renderer.apply_update(&mut cards, &[duplicates("bob", 5)]), 0);
        assert_eq!(cards[0].node("w1").unwrap().inner_html, "?");
        assert!(!cards[0].has_data(ParseType::Duplicates));

        assert_eq!(renderer.apply_update(&mut cards, &[duplicates("alice", 2)]), 1);
        assert_eq!(cards[0].node("w1").unwrap().inner_html, "2");
    }

    #[test]
    fn test_cached_request_dedups_cards() {
        let renderer = renderer(vec![widget("w1", vec![TemplateItem::variable("cardName")])]);
        let cards = vec![
            CardElement::new(CardId::from(1)),
            CardElement::new(CardId::from(2)),
            CardElement::new(CardId::from(1)),
        ];

        assert_eq!(
            renderer.cached_request(&cards),
            Some(ClientMessage::FetchCachedCardData {
                card_ids: vec![CardId::from(1), CardId::from(2)],
                parse_types: vec![ParseType::SiteCard],
                username: None,
            })
        );
        assert!(renderer.cached_request(&[]).is_none());
    }

    #[test]
    fn test_card_id_variable_and_markup() {
        let renderer = renderer(vec![Widget {
            background_color: "#102030".into(),
            opacity: 50.0,
            ..widget("id", vec![TemplateItem::text("#"), TemplateItem::variable("cardId")])
        }]);
        let mut card = CardElement::new(CardId::from(4779)).with_attribute("data-rank", "s");

        assert!(renderer.handle_event(&mut card, TriggerEvent::Appear).is_none());
        renderer.render(&mut card);

        assert_eq!(
            card.node("id").unwrap().to_html(),
            r#"<div class="card-user-count position-bottom-right" data-widget-id="id" style="background-color: rgba(16, 32, 48, 0.5);">#4779</div>"#
        );
    }
}
