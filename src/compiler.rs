//! Command compiler — maps an operator command line to a remote program.
//!
//! Compilation is pure and total: it always yields some program text
//! (possibly empty) and never fails. Unknown verbs and malformed argument
//! lists fall through as the raw input line, the documented escape hatch
//! for typing ad-hoc host-script text through the same prompt.

use crate::scene::Vec3;
use crate::script::{render_program, Directive};

/// Result of compiling one command line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compiled {
    /// Remote program text; empty means nothing to send.
    pub program: String,
    /// Lines for the local console only (help output).
    pub console: Vec<String>,
}

impl Compiled {
    fn program_of(directives: &[Directive]) -> Self {
        Self {
            program: render_program(directives),
            console: Vec::new(),
        }
    }

    fn passthrough(line: &str) -> Self {
        Self {
            program: line.to_string(),
            console: Vec::new(),
        }
    }

    fn local(console: Vec<String>) -> Self {
        Self {
            program: String::new(),
            console,
        }
    }
}

const HELP: &[&str] = &[
    "Available Commands:",
    "- cmds (list commands)",
    "- health (amount)",
    "- speed (amount)",
    "- size (x) (y) (z)",
    "- invisible (true/false)",
    "- esp (true/false)",
    "- noclip (true/false)",
    "- walkfling (true/false)",
    "- crash",
];

/// `"true"` or `"1"` (case-insensitive) means true; anything else,
/// including an absent argument, means false.
fn parse_bool(token: Option<&&str>) -> bool {
    token.is_some_and(|t| t.eq_ignore_ascii_case("true") || *t == "1")
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse().ok()
}

/// Compile an operator command line into a remote program.
pub fn compile(line: &str) -> Compiled {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(verb) = tokens.first() else {
        return Compiled::default();
    };

    match verb.to_ascii_lowercase().as_str() {
        "cmds" => Compiled::local(HELP.iter().map(|l| l.to_string()).collect()),
        "health" => match tokens.get(1).and_then(|t| parse_number(t)) {
            Some(amount) => Compiled::program_of(&[Directive::SetHealth(amount)]),
            None => Compiled::passthrough(line),
        },
        "speed" => match tokens.get(1).and_then(|t| parse_number(t)) {
            Some(amount) => Compiled::program_of(&[Directive::SetSpeed(amount)]),
            None => Compiled::passthrough(line),
        },
        "size" => {
            let axes = (
                tokens.get(1).and_then(|t| parse_number(t)),
                tokens.get(2).and_then(|t| parse_number(t)),
                tokens.get(3).and_then(|t| parse_number(t)),
            );
            match axes {
                (Some(x), Some(y), Some(z)) => {
                    Compiled::program_of(&[Directive::SetScale(Vec3::new(x, y, z))])
                }
                _ => Compiled::passthrough(line),
            }
        }
        "invisible" => match tokens.get(1) {
            Some(_) => {
                let scale = if parse_bool(tokens.get(1)) {
                    Vec3::new(0.0, 1.0, 0.0)
                } else {
                    Vec3::new(1.0, 1.0, 1.0)
                };
                Compiled::program_of(&[Directive::SetScale(scale)])
            }
            // Unlike the toggles, a bare `invisible` forwards verbatim.
            None => Compiled::passthrough(line),
        },
        "noclip" => {
            // noclip true disables collision
            Compiled::program_of(&[Directive::Collide(!parse_bool(tokens.get(1)))])
        }
        "esp" => Compiled::program_of(&[Directive::Overlay(parse_bool(tokens.get(1)))]),
        "walkfling" => Compiled::program_of(&[Directive::Fling(parse_bool(tokens.get(1)))]),
        "unwalkfling" => Compiled::program_of(&[Directive::Fling(false)]),
        "crash" => Compiled::program_of(&[Directive::Crash]),
        _ => Compiled::passthrough(line),
    }
}
