mod util;

use classified_sentences::model::types::ClassifiedSentenceStatus::{Inbox, Validated};
use classified_sentences::storage::filter::SentenceFilter;
use classified_sentences::storage::{ClassifiedSentenceDao, StoreError};
use util::{SentenceBuilder, temp_store};

#[test]
fn status_switch_resaves_each_sentence() {
    let (store, _dir) = temp_store();
    for text in ["a", "b", "c"] {
        store.save(&SentenceBuilder::new(text).build()).unwrap();
    }
    let inbox = store.get_sentences(None, None, Some(Inbox)).unwrap();
    store.switch_sentences_status(&inbox[..2], Validated).unwrap();

    let validated = store.get_sentences(None, None, Some(Validated)).unwrap();
    let texts: Vec<_> = validated.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["a", "b"]);
    assert_eq!(store.get_sentences(None, None, Some(Inbox)).unwrap().len(), 1);
}

#[test]
fn status_switch_stops_at_first_failure() {
    let (store, _dir) = temp_store();
    let a = SentenceBuilder::new("a").build();
    let c = SentenceBuilder::new("c").build();
    store.save(&a).unwrap();
    store.save(&c).unwrap();
    store
        .raw()
        .execute_batch(
            "CREATE TRIGGER reject_poison_insert BEFORE INSERT ON classified_sentences
                 WHEN NEW.full_text = 'poison'
                 BEGIN SELECT RAISE(ABORT, 'poisoned'); END;",
        )
        .unwrap();

    let poison = SentenceBuilder::new("poison").build();
    let err = store
        .switch_sentences_status(&[a, poison, c], Validated)
        .unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    let validated = store.get_sentences(None, None, Some(Validated)).unwrap();
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].text, "a");
    let inbox = store.get_sentences(None, None, Some(Inbox)).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].text, "c");
}

#[test]
fn intent_switch_only_touches_matching_app_and_intent() {
    let (store, _dir) = temp_store();
    let matching = SentenceBuilder::new("move me")
        .intent("old")
        .entity("city", "origin")
        .status(Validated)
        .build();
    let other_app = SentenceBuilder::new("other app")
        .app("other")
        .intent("old")
        .entity("city", "origin")
        .status(Validated)
        .build();
    let other_intent = SentenceBuilder::new("other intent")
        .intent("keep")
        .entity("city", "origin")
        .status(Validated)
        .build();
    for s in [&matching, &other_app, &other_intent] {
        store.save(s).unwrap();
    }

    assert_eq!(store.switch_sentences_intent("app", "old", "new").unwrap(), 1);

    let all = store.find(&SentenceFilter::new(), None).unwrap();
    let moved = all.iter().find(|s| s.text == "move me").unwrap();
    assert_eq!(moved.classification.intent_id, "new");
    assert!(moved.classification.entities.is_empty());
    assert_eq!(moved.status, Inbox);
    assert_eq!(moved.text, matching.text);
    assert_eq!(moved.update_date, matching.update_date);

    assert!(all.contains(&other_app));
    assert!(all.contains(&other_intent));
}

#[test]
fn intent_switch_keeps_denormalized_intent_in_sync() {
    let (store, _dir) = temp_store();
    store
        .save(&SentenceBuilder::new("x").language("fr").intent("old").build())
        .unwrap();
    store.switch_sentences_intent("app", "old", "new").unwrap();

    let intents = ["new".to_string()].into();
    let found = store.get_sentences(Some(&intents), Some("fr"), None).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].classification.intent_id, "new");
}

#[test]
fn entity_removal_only_touches_sentences_with_role() {
    let (store, _dir) = temp_store();
    let with_role = SentenceBuilder::new("from Paris to Lyon")
        .intent("travel")
        .entity("city", "origin")
        .entity("city", "destination")
        .status(Validated)
        .build();
    let without_role = SentenceBuilder::new("to Lyon")
        .intent("travel")
        .entity("city", "destination")
        .build();
    let other_intent = SentenceBuilder::new("weather in Paris")
        .intent("weather")
        .entity("city", "origin")
        .build();
    for s in [&with_role, &without_role, &other_intent] {
        store.save(s).unwrap();
    }

    let updated = store
        .remove_entity_from_sentences("app", "travel", "city", "origin")
        .unwrap();
    assert_eq!(updated, 1);

    let all = store.find(&SentenceFilter::new(), None).unwrap();
    let rewritten = all.iter().find(|s| s.text == with_role.text).unwrap();
    let roles: Vec<_> = rewritten
        .classification
        .entities
        .iter()
        .map(|e| e.role.as_str())
        .collect();
    assert_eq!(roles, vec!["destination"]);
    assert_eq!(rewritten.status, Validated);

    assert!(all.contains(&without_role));
    assert!(all.contains(&other_intent));
}

#[test]
fn entity_removal_drops_every_entity_with_role() {
    let (store, _dir) = temp_store();
    store
        .save(
            &SentenceBuilder::new("Paris, Lyon or Nice")
                .intent("travel")
                .entity("city", "stop")
                .entity("date", "when")
                .entity("city", "stop")
                .build(),
        )
        .unwrap();

    store
        .remove_entity_from_sentences("app", "travel", "city", "stop")
        .unwrap();
    let s = &store.find(&SentenceFilter::new(), None).unwrap()[0];
    assert_eq!(s.classification.entities.len(), 1);
    assert_eq!(s.classification.entities[0].role, "when");
}
