//! Plain-text views of the progress store.

use services::{DiagnosticPhase, ProgressError, ProgressStore};
use storage::StorageStatus;

fn choice_label(index: usize) -> char {
    char::from(b'A' + u8::try_from(index % 26).unwrap_or(0))
}

pub fn status(store: &ProgressStore) {
    diagnostic_progress(store);
    println!();
    println!("Mastery:");
    for topic in store.mastery().topics() {
        let name = store
            .catalog()
            .topic(topic.topic_id.as_str())
            .map_or(topic.topic_id.as_str(), |t| t.name());
        println!(
            "  {name:<32} {:>3}%  ({}/{} correct, {} questions)",
            topic.mastery, topic.correct, topic.answered, topic.total
        );
    }
    if !store.plan().is_empty() {
        println!();
        plan(store);
    }
    println!();
    settings(store);
    match store.storage_status() {
        StorageStatus::Available => {}
        StorageStatus::Unknown => println!("storage: not checked yet"),
        StorageStatus::Unavailable => {
            println!("storage: UNAVAILABLE, progress will not survive a restart");
        }
    }
    if let Some(at) = store.record().last_exported_at {
        println!("last export: {}", at.to_rfc3339());
    }
}

pub fn diagnostic_progress(store: &ProgressStore) {
    match store.diagnostic_phase() {
        DiagnosticPhase::NotStarted => println!("Diagnostic: not started"),
        DiagnosticPhase::InProgress { answered, total } => {
            println!("Diagnostic: {answered}/{total} answered");
            if let Some(question) = store.active_diagnostic_question() {
                println!("  next: {} {}", question.id(), question.prompt());
            }
        }
        DiagnosticPhase::Complete => println!("Diagnostic: complete"),
    }
}

pub fn questions(store: &ProgressStore) {
    for (position, (topic, question)) in store.catalog().diagnostic_questions().enumerate() {
        let answered = store.answers().get(question.id().as_str());
        let marker = if answered.is_some() { "x" } else { " " };
        println!(
            "[{marker}] {:>2}. {} ({}) {}",
            position + 1,
            question.id(),
            topic.name(),
            question.prompt()
        );
        for (index, choice) in question.choices().iter().enumerate() {
            let chosen = if answered == Some(index) { "*" } else { " " };
            println!("      {chosen}{}. {choice}", index + 1);
        }
    }
}

pub fn plan(store: &ProgressStore) {
    println!(
        "Plan ({}/{} days complete):",
        store.completed_days(),
        store.plan().len()
    );
    for (day, topic_id) in store.plan().iter().enumerate() {
        let cursor = if day == store.day_index() { ">" } else { " " };
        let progress = store.record().day(day);
        let name = store
            .catalog()
            .topic(topic_id.as_str())
            .map_or(topic_id.as_str(), |t| t.name());
        println!(
            "{cursor} day {:>2}: {name:<32} concept [{}] practice [{}]",
            day + 1,
            if progress.concept_done { "x" } else { " " },
            if progress.practice_done { "x" } else { " " },
        );
    }
}

pub fn practice(store: &ProgressStore, day: usize) -> Result<(), ProgressError> {
    let questions = store.practice_questions(day)?;
    if questions.is_empty() {
        println!("day {} has no practice questions", day + 1);
        return Ok(());
    }
    for question in questions {
        println!("{} {}", question.id(), question.prompt());
        for (index, choice) in question.choices().iter().enumerate() {
            println!("    {}. {choice}", choice_label(index));
        }
        if store.record().is_revealed(question.id().as_str()) {
            println!("    answer: {}", choice_label(question.correct()));
            if let Some(explanation) = question.explanation() {
                println!("    {explanation}");
            }
        }
    }
    let hidden = store.unrevealed_practice(day);
    if hidden > 0 {
        println!("{hidden} answer(s) still hidden");
    }
    Ok(())
}

pub fn settings(store: &ProgressStore) {
    let on_off = |flag: bool| if flag { "on" } else { "off" };
    println!(
        "auto-next: {}  shuffle practice: {}",
        on_off(store.record().auto_next),
        on_off(store.record().shuffle_practice)
    );
}
