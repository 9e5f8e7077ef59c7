use std::io::{self, Write};

use anyhow::Result;
use shared::protocol::{Channel, ChannelValue};
use study_core::{ControlId, SessionConfig, StudySession};
use tracing::warn;

use crate::{config::Settings, prompt::read_line};

const HELP: &str = "\
n next   p previous   f flip   c mark correct/incorrect
s shuffle   l endless   x remove deck   d NAME switch deck
ls list decks   h help   q quit";

/// Session knobs for the terminal. Nothing here ever ends a card transition,
/// so animations stay off whatever the settings ask for.
pub fn session_config(settings: &Settings, shuffle_seed: Option<u64>) -> SessionConfig {
    if settings.animations {
        warn!("the terminal has no card transitions; ignoring `animations`");
    }
    SessionConfig {
        animations: false,
        untrusted_content: settings.untrusted_content,
        shuffle_seed,
    }
}

/// Prints what the session publishes.
fn watch(session: &StudySession) {
    let progress = session.progress.clone();
    session.bus.subscribe(Channel::SlideShown, move |value| {
        match value {
            ChannelValue::Slide(Some(view)) => {
                let snapshot = progress.snapshot();
                let mark = if snapshot.current_correct { " (correct)" } else { "" };
                println!(
                    "\n[{}  {} correct] {}{mark}",
                    snapshot.label(),
                    snapshot.correct,
                    view.slide.question
                );
            }
            ChannelValue::Slide(None) => println!("\n(no slides)"),
            _ => {}
        }
    });

    let reveal = session.reveal.clone();
    session.bus.subscribe(Channel::FlipToggled, move |value| {
        if let ChannelValue::Flag(true) = value {
            match reveal.revealed() {
                Some(answer) => println!("  -> {}", answer.html.trim_end()),
                None => println!("  -> (answer not ready)"),
            }
        }
    });
    let reveal = session.reveal.clone();
    session.bus.subscribe(Channel::AnswerRevealed, move |value| {
        if let ChannelValue::Answer(Some(answer)) = value {
            if reveal.is_flipped() {
                println!("  -> {}", answer.html.trim_end());
            }
        }
    });

    let progress = session.progress.clone();
    session.bus.subscribe(Channel::CorrectnessMarked, move |value| {
        if let ChannelValue::Flag(correct) = value {
            let verdict = if *correct { "correct" } else { "not correct" };
            let snapshot = progress.snapshot();
            println!("  marked {verdict} ({} of {})", snapshot.correct, snapshot.total);
        }
    });

    session.bus.subscribe(Channel::DeckCompleted, |value| match value {
        ChannelValue::Flag(true) => println!("  deck complete!"),
        ChannelValue::Flag(false) => println!("  deck no longer complete"),
        _ => {}
    });
    for (channel, label) in [
        (Channel::ShuffleToggled, "shuffle"),
        (Channel::EndlessToggled, "endless"),
    ] {
        session.bus.subscribe(channel, move |value| {
            if let ChannelValue::Flag(on) = value {
                println!("  {label} {}", if *on { "on" } else { "off" });
            }
        });
    }
}

fn control_for(command: &str) -> Option<ControlId> {
    match command {
        "n" => Some(ControlId::Next),
        "p" => Some(ControlId::Prev),
        "f" => Some(ControlId::Flip),
        "c" => Some(ControlId::Correct),
        "s" => Some(ControlId::Shuffle),
        "l" => Some(ControlId::Endless),
        "x" => Some(ControlId::Remove),
        _ => None,
    }
}

/// Interactive study loop over stdin.
pub async fn run(mut session: StudySession, deck: Option<String>) -> Result<()> {
    watch(&session);

    let restored = session.selection.restore().await?;
    if let Some(name) = deck {
        if session.selection.select_deck(&name).await?.is_none() {
            eprintln!("no deck named \"{name}\"");
        }
    } else if restored.is_none() {
        println!(
            "no deck selected; decks: {}",
            session.selection.deck_names().join(", ")
        );
    }
    println!("{HELP}");

    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let Some(line) = read_line()? else {
            break;
        };
        let line = line.trim();
        let (command, argument) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" => continue,
            "q" => break,
            "h" | "?" => println!("{HELP}"),
            "ls" => println!("{}", session.selection.deck_names().join("\n")),
            "d" => {
                if session.selection.select_deck(argument.trim()).await?.is_none() {
                    println!("no deck named \"{}\"", argument.trim());
                }
            }
            other => match control_for(other) {
                Some(control) => {
                    if !session.controls.activate(control) {
                        println!("  {control} is not available right now");
                    }
                }
                None => println!("unknown command `{other}`; h for help"),
            },
        }
        session.process_requests().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use render::MarkdownRenderer;
    use shared::domain::{Deck, Slide};
    use storage::MemoryDeckStore;
    use study_core::{ControlLayout, FixedPrompt, MemorySelectionMarker, SessionDeps};

    use super::*;

    #[test]
    fn terminal_sessions_never_animate() {
        let settings = Settings {
            animations: true,
            untrusted_content: false,
            ..Settings::default()
        };
        let config = session_config(&settings, Some(3));
        assert!(!config.animations);
        assert!(!config.untrusted_content);
        assert_eq!(config.shuffle_seed, Some(3));
    }

    #[tokio::test]
    async fn every_flip_shows_the_current_slides_answer() {
        let slides = (1..=3)
            .map(|n| Slide::new(format!("q{n}"), n.to_string()))
            .collect();
        let deck = Deck::new("Numbers", slides).expect("deck");
        let settings = Settings {
            animations: true,
            ..Settings::default()
        };
        let session = StudySession::new(
            SessionDeps {
                store: Arc::new(MemoryDeckStore::with_decks([deck])),
                prompt: Arc::new(FixedPrompt(true)),
                marker: Arc::new(MemorySelectionMarker::default()),
                renderer: Arc::new(MarkdownRenderer),
            },
            session_config(&settings, None),
            &ControlLayout::full(),
        )
        .expect("session");
        session
            .selection
            .select_deck("Numbers")
            .await
            .expect("select");

        for expected in 0..3 {
            assert!(session.controls.activate(ControlId::Flip));
            let current = session.sequencer.current().expect("slide");
            let answer = session.reveal.revealed().expect("answer");
            assert_eq!(current.slide_id, expected);
            assert_eq!(answer.slide_id, expected);
            assert_eq!(answer.html, format!("<p>{}</p>\n", expected + 1));
            session.controls.activate(ControlId::Next);
        }
    }
}
