//! Remote program grammar shared by the compiler (emission) and the agent
//! (parsing). A program is line-oriented directive text; any line that is
//! not a recognized directive travels as `Raw` and is handed to the host's
//! own script interpreter untouched.

use std::fmt;

use crate::scene::Vec3;

/// One line of a remote program.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Set both max and current health of the local player.
    SetHealth(f64),
    SetSpeed(f64),
    SetScale(Vec3),
    /// Collision on/off for every collidable avatar part.
    Collide(bool),
    /// Overlay engine enable/disable.
    Overlay(bool),
    /// Movement-exploit loop enable/disable.
    Fling(bool),
    /// Per-frame out-of-range health assignment.
    Crash,
    /// Opaque host-script text, forwarded verbatim.
    Raw(String),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::SetHealth(v) => write!(f, "set-health {}", v),
            Directive::SetSpeed(v) => write!(f, "set-speed {}", v),
            Directive::SetScale(v) => write!(f, "set-scale {} {} {}", v.x, v.y, v.z),
            Directive::Collide(on) => write!(f, "collide {}", on_off(*on)),
            Directive::Overlay(on) => write!(f, "overlay {}", on_off(*on)),
            Directive::Fling(on) => write!(f, "fling {}", on_off(*on)),
            Directive::Crash => write!(f, "crash"),
            Directive::Raw(text) => write!(f, "{}", text),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Parse a single program line. Total: anything unrecognized becomes `Raw`.
pub fn parse_line(line: &str) -> Directive {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let raw = || Directive::Raw(line.to_string());

    match tokens.as_slice() {
        ["set-health", v] => match v.parse() {
            Ok(v) => Directive::SetHealth(v),
            Err(_) => raw(),
        },
        ["set-speed", v] => match v.parse() {
            Ok(v) => Directive::SetSpeed(v),
            Err(_) => raw(),
        },
        ["set-scale", x, y, z] => match (x.parse(), y.parse(), z.parse()) {
            (Ok(x), Ok(y), Ok(z)) => Directive::SetScale(Vec3::new(x, y, z)),
            _ => raw(),
        },
        ["collide", state] => parse_switch(state).map(Directive::Collide).unwrap_or_else(raw),
        ["overlay", state] => parse_switch(state).map(Directive::Overlay).unwrap_or_else(raw),
        ["fling", state] => parse_switch(state).map(Directive::Fling).unwrap_or_else(raw),
        ["crash"] => Directive::Crash,
        _ => raw(),
    }
}

fn parse_switch(token: &str) -> Option<bool> {
    match token {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Parse a whole program into directives, skipping blank lines.
pub fn parse_program(text: &str) -> Vec<Directive> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

/// Render directives back to program text.
pub fn render_program(directives: &[Directive]) -> String {
    directives
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
