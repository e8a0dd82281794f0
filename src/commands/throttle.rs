//! Crosspost and topic command handlers.

use super::{CrosspostAction, TopicsAction, print_json};
use crate::Engine;
use freshwire::models::TopicLabel;
use serde_json::json;

fn parse_topic(label: &str) -> Result<TopicLabel, Box<dyn std::error::Error>> {
    TopicLabel::parse(label).ok_or_else(|| {
        let known: Vec<&str> = TopicLabel::all().iter().map(TopicLabel::as_str).collect();
        format!("unknown topic '{label}' (expected one of {})", known.join(", ")).into()
    })
}

/// Crosspost command.
pub fn cmd_crosspost(
    engine: &Engine,
    action: CrosspostAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CrosspostAction::Check { destination } => {
            let state = engine.crosspost_state(&destination)?;
            print_json(&json!({ "destination": destination, "status": state }))
        },
        CrosspostAction::Mark { destination } => {
            engine.mark_crossposted(&destination)?;
            println!("Marked {destination}");
            Ok(())
        },
    }
}

/// Topics command.
pub fn cmd_topics(engine: &Engine, action: TopicsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TopicsAction::Record { label } => {
            let label = parse_topic(&label)?;
            engine.record_topic(label)?;
            println!("Recorded {label}");
            Ok(())
        },
        TopicsAction::Pressure { label } => {
            let label = parse_topic(&label)?;
            println!("{:.3}", engine.topic_pressure(label));
            Ok(())
        },
        TopicsAction::Show => {
            let distribution: serde_json::Map<String, serde_json::Value> = engine
                .topic_distribution()?
                .into_iter()
                .map(|(label, count)| (label.as_str().to_string(), count.into()))
                .collect();
            print_json(&distribution)
        },
    }
}
