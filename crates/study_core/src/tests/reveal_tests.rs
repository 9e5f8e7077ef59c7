use render::{MarkdownRenderer, PlainTextRenderer};
use shared::domain::Slide;

use super::*;

fn view(slide_id: usize, answer: &str) -> SlideView {
    SlideView {
        slide_id,
        position: slide_id,
        total: 3,
        slide: Slide::new(format!("q{slide_id}"), answer),
    }
}

fn reveal(animations: bool) -> (Arc<EventBus>, Arc<AnswerReveal>, Arc<Mutex<Vec<Option<RevealedAnswer>>>>) {
    let bus = EventBus::new();
    let reveal = AnswerReveal::new(bus.clone(), Arc::new(PlainTextRenderer), true, animations);
    reveal.attach();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(Channel::AnswerRevealed, move |value| {
        if let ChannelValue::Answer(answer) = value {
            sink.lock().expect("sink").push(answer.clone());
        }
    });
    (bus, reveal, seen)
}

fn answer(slide_id: usize, html: &str) -> Option<RevealedAnswer> {
    Some(RevealedAnswer {
        slide_id,
        html: html.to_string(),
    })
}

#[test]
fn static_reveal_is_immediate() {
    let (bus, reveal, seen) = reveal(false);
    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(0, "4"))));
    assert_eq!(*seen.lock().expect("seen"), vec![answer(0, "4")]);
    assert_eq!(reveal.revealed(), answer(0, "4"));
}

#[test]
fn slide_change_resets_flip() {
    let (bus, reveal, _seen) = reveal(false);
    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(0, "4"))));
    bus.publish(Channel::FlipToggled, ChannelValue::Flag(true));
    assert!(reveal.is_flipped());

    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(1, "6"))));
    assert!(!reveal.is_flipped());
    assert!(!reveal.transition_in_progress());
}

#[test]
fn deck_change_resets_flip() {
    let (bus, reveal, _seen) = reveal(false);
    bus.publish(Channel::FlipToggled, ChannelValue::Flag(true));
    bus.publish(Channel::DeckChanged, ChannelValue::Deck(None));
    assert!(!reveal.is_flipped());
}

#[test]
fn reveal_waits_for_flip_transition() {
    let (bus, reveal, seen) = reveal(true);
    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(0, "4"))));
    bus.publish(Channel::FlipToggled, ChannelValue::Flag(true));
    bus.publish(Channel::TransitionEnded, ChannelValue::Signal);

    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(1, "6"))));
    assert!(reveal.transition_in_progress());
    assert!(reveal.pending_ticket().is_some());
    assert!(reveal.revealed().is_none());
    assert_eq!(*seen.lock().expect("seen"), vec![answer(0, "4"), None]);

    bus.publish(Channel::TransitionEnded, ChannelValue::Signal);
    assert!(reveal.pending_ticket().is_none());
    assert_eq!(
        *seen.lock().expect("seen"),
        vec![answer(0, "4"), None, answer(1, "6")]
    );
}

#[test]
fn newer_slide_supersedes_pending_reveal() {
    let (bus, reveal, seen) = reveal(true);
    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(0, "4"))));
    bus.publish(Channel::FlipToggled, ChannelValue::Flag(true));

    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(1, "6"))));
    let first = reveal.pending_ticket().expect("pending");
    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(2, "8"))));
    let second = reveal.pending_ticket().expect("pending");
    assert!(second > first);

    bus.publish(Channel::TransitionEnded, ChannelValue::Signal);
    assert_eq!(
        *seen.lock().expect("seen"),
        vec![answer(0, "4"), None, None, answer(2, "8")]
    );

    // A stray completion signal has nothing left to release.
    bus.publish(Channel::TransitionEnded, ChannelValue::Signal);
    assert_eq!(seen.lock().expect("seen").len(), 4);
}

#[test]
fn hiding_the_slide_cancels_pending_reveal() {
    let (bus, reveal, seen) = reveal(true);
    bus.publish(Channel::FlipToggled, ChannelValue::Flag(true));
    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(0, "4"))));
    bus.publish(Channel::SlideShown, ChannelValue::Slide(None));
    assert!(reveal.pending_ticket().is_none());
    assert_eq!(*seen.lock().expect("seen"), vec![None, None]);

    bus.publish(Channel::TransitionEnded, ChannelValue::Signal);
    assert_eq!(*seen.lock().expect("seen"), vec![None, None]);
}

#[test]
fn flipping_during_a_pending_reveal_never_shows_the_old_answer() {
    let (bus, reveal, seen) = reveal(true);
    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(0, "4"))));
    bus.publish(Channel::FlipToggled, ChannelValue::Flag(true));
    bus.publish(Channel::TransitionEnded, ChannelValue::Signal);

    bus.publish(Channel::SlideShown, ChannelValue::Slide(Some(view(1, "6"))));
    bus.publish(Channel::FlipToggled, ChannelValue::Flag(true));
    assert!(reveal.is_flipped());
    assert!(reveal.revealed().is_none());
    assert_eq!(seen.lock().expect("seen").last(), Some(&None));

    bus.publish(Channel::TransitionEnded, ChannelValue::Signal);
    assert_eq!(reveal.revealed(), answer(1, "6"));
    assert_eq!(
        *seen.lock().expect("seen"),
        vec![answer(0, "4"), None, answer(1, "6")]
    );
}

#[test]
fn answers_render_as_untrusted_markdown() {
    let bus = EventBus::new();
    let reveal = AnswerReveal::new(bus.clone(), Arc::new(MarkdownRenderer), true, false);
    reveal.show(Some(view(0, "**4** <script>x</script>")));
    let html = reveal.revealed().expect("revealed").html;
    assert!(html.contains("<strong>4</strong>"), "{html}");
    assert!(!html.contains("<script>"), "{html}");
}
