//! Contract tests: formatted parameters parse back to the same value.
//!
//! `opi-ctl` and log output rely on `Display` producing wire tokens.

use opi_server::models::background::Background;
use opi_server::models::shape::Shape;
use opi_server::models::stimulus::{StimulusHeader, StimulusStep};
use opi_server::protocol::command::Command;

fn tokens(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

#[test]
fn background_display_parses_back() {
    let parsed =
        Background::parse(&tokens("0 0.35 0.2 0.4 0.6 1 1 maltese -3.5 2 1.25 0.75 359.5 1 1 0 0 0.5"))
            .expect("valid background");

    let line = parsed.to_string();
    assert_eq!(Background::parse(&tokens(&line)).expect("reparse"), parsed);
}

#[test]
fn default_background_display_parses_back() {
    let line = Background::default().to_string();
    assert!(line.contains(" none "), "no fixation is written as 'none'");
    assert_eq!(
        Background::parse(&tokens(&line)).expect("reparse"),
        Background::default()
    );
}

#[test]
fn every_shape_name_parses_back() {
    for shape in Shape::DRAWABLE {
        assert_eq!(Shape::from_name(shape.name()), shape);
    }
    assert_eq!(Shape::from_name(Shape::None.name()), Shape::None);
}

#[test]
fn step_display_parses_back() {
    let parsed = StimulusStep::parse(4, &tokens("1 square 12.5 -7 2 1 30 250 0.05 0.9 0.9 0.9 1"))
        .expect("valid step");

    let line = parsed.to_string();
    assert_eq!(StimulusStep::parse(4, &tokens(&line)).expect("reparse"), parsed);
}

#[test]
fn header_display_parses_back() {
    let parsed = StimulusHeader::parse(&["4", "200", "1500"]).expect("valid header");
    assert_eq!(parsed.to_string(), "4 200 1500");
    assert_eq!(
        StimulusHeader::parse(&tokens(&parsed.to_string())).expect("reparse"),
        parsed
    );
}

#[test]
fn command_display_parses_back() {
    for line in [
        "OPI_GET_METRICS",
        "OPI_CLOSE",
        "OPI_PRESENT 1 200 1000",
        "OPI_SET_BACKGROUND 2 0.1 1 1 1 1 2 none 0 0 0 0 0 0.5 0 1 0 1",
    ] {
        let command = Command::parse(line).expect("command");
        assert_eq!(command.to_string(), line);
        assert_eq!(Command::parse(&command.to_string()), Some(command));
    }
}
