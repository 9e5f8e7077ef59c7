use shared::domain::Slide;

use super::*;

fn caps() -> Arc<Deck> {
    Arc::new(
        Deck::new(
            "Caps",
            vec![Slide::new("2+2", "4"), Slide::new("3+3", "6")],
        )
        .expect("deck"),
    )
}

fn numbered(count: usize) -> Arc<Deck> {
    let slides = (0..count)
        .map(|n| Slide::new(format!("q{n}"), format!("a{n}")))
        .collect();
    Arc::new(Deck::new("Numbers", slides).expect("deck"))
}

fn shown(bus: &EventBus) -> Arc<Mutex<Vec<Option<SlideView>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(Channel::SlideShown, move |value| {
        if let ChannelValue::Slide(view) = value {
            sink.lock().expect("sink").push(view.clone());
        }
    });
    seen
}

fn sequencer() -> (Arc<EventBus>, Arc<SlideSequencer>) {
    let bus = EventBus::new();
    let sequencer = SlideSequencer::with_rng(bus.clone(), StdRng::seed_from_u64(7));
    sequencer.attach();
    (bus, sequencer)
}

#[test]
fn deck_change_shows_first_slide() {
    let (bus, sequencer) = sequencer();
    let seen = shown(&bus);
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(Some(caps())));

    let view = sequencer.current().expect("current slide");
    assert_eq!(view.position, 0);
    assert_eq!(view.slide.question, "2+2");
    assert_eq!(*seen.lock().expect("seen"), vec![Some(view)]);
}

#[test]
fn clearing_the_deck_shows_nothing() {
    let (bus, sequencer) = sequencer();
    let seen = shown(&bus);
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(Some(caps())));
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(None));

    assert!(sequencer.current().is_none());
    assert_eq!(seen.lock().expect("seen").last(), Some(&None));
}

#[test]
fn caps_navigation_clamps_then_wraps_in_endless_mode() {
    let (bus, sequencer) = sequencer();
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(Some(caps())));

    bus.publish(Channel::Navigate, ChannelValue::Delta(1));
    assert_eq!(sequencer.snapshot().index, Some(1));

    bus.publish(Channel::Navigate, ChannelValue::Delta(1));
    assert_eq!(sequencer.snapshot().index, Some(1));

    bus.publish(Channel::EndlessToggled, ChannelValue::Flag(true));
    bus.publish(Channel::Navigate, ChannelValue::Delta(1));
    assert_eq!(sequencer.snapshot().index, Some(0));
}

#[test]
fn clamped_navigation_publishes_nothing() {
    let (bus, _sequencer) = sequencer();
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(Some(caps())));
    let seen = shown(&bus);

    bus.publish(Channel::Navigate, ChannelValue::Delta(-1));
    bus.publish(Channel::Navigate, ChannelValue::Delta(0));
    assert!(seen.lock().expect("seen").is_empty());
}

#[test]
fn navigation_on_empty_deck_is_a_no_op() {
    let (bus, sequencer) = sequencer();
    let empty = Arc::new(Deck::new("Empty", Vec::new()).expect("deck"));
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(Some(empty)));
    bus.publish(Channel::Navigate, ChannelValue::Delta(3));
    assert_eq!(sequencer.snapshot().index, None);
}

#[test]
fn step_index_stays_in_bounds_for_any_delta() {
    for len in 1..6 {
        for index in 0..len {
            for delta in [-100, -7, -1, 1, 2, 7, 100, i64::MIN, i64::MAX] {
                let clamped = step_index(index, delta, len, false);
                assert!(clamped < len, "clamp {index}+{delta} in {len}");
                let wrapped = step_index(index, delta, len, true);
                assert!(wrapped < len, "wrap {index}+{delta} in {len}");
            }
        }
    }
    assert_eq!(step_index(0, -1, 3, true), 2);
    assert_eq!(step_index(0, 5, 1, true), 0);
}

#[test]
fn shuffle_keeps_position_and_restores_canonical_order() {
    let (bus, sequencer) = sequencer();
    let deck = numbered(8);
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(Some(deck.clone())));
    bus.publish(Channel::Navigate, ChannelValue::Delta(3));

    bus.publish(Channel::ShuffleToggled, ChannelValue::Flag(true));
    let shuffled = sequencer.snapshot();
    assert!(shuffled.shuffled);
    assert_eq!(shuffled.index, Some(3));
    let mut sorted = shuffled.order.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..8).collect::<Vec<_>>());
    assert_eq!(deck.slides[0].question, "q0");

    bus.publish(Channel::ShuffleToggled, ChannelValue::Flag(false));
    let restored = sequencer.snapshot();
    assert_eq!(restored.order, (0..8).collect::<Vec<_>>());
    assert_eq!(restored.index, Some(3));
    assert_eq!(sequencer.current().expect("slide").slide_id, 3);
}

#[test]
fn shuffle_without_deck_is_ignored() {
    let (bus, sequencer) = sequencer();
    let seen = shown(&bus);
    bus.publish(Channel::ShuffleToggled, ChannelValue::Flag(true));
    assert!(!sequencer.snapshot().shuffled);
    assert!(seen.lock().expect("seen").is_empty());
}

#[test]
fn endless_survives_deck_switch_but_shuffle_does_not() {
    let (bus, sequencer) = sequencer();
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(Some(numbered(4))));
    bus.publish(Channel::EndlessToggled, ChannelValue::Flag(true));
    bus.publish(Channel::ShuffleToggled, ChannelValue::Flag(true));

    bus.publish(Channel::DeckChanged, ChannelValue::Deck(Some(caps())));
    let snapshot = sequencer.snapshot();
    assert!(snapshot.endless);
    assert!(!snapshot.shuffled);
    assert_eq!(snapshot.order, vec![0, 1]);
}

#[test]
fn fisher_yates_produces_every_permutation_of_three() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        seen.insert(shuffled_order(3, &mut rng));
    }
    assert_eq!(seen.len(), 6);
}
