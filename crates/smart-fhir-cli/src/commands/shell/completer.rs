use reedline::{Completer, Span, Suggestion};
use std::str::FromStr;

use super::command::ShellVerb;

/// Completes the command word at the start of the line
#[derive(Clone)]
pub struct ShellCompleter;

impl Completer for ShellCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let prefix = &line[..pos];
        if prefix.trim_start().contains(' ') {
            return Vec::new();
        }

        let start = prefix.len() - prefix.trim_start().len();
        let word = prefix.trim_start().trim_start_matches('/').to_lowercase();

        ShellVerb::all_names()
            .into_iter()
            .filter(|name| name.starts_with(&word))
            .filter_map(|name| ShellVerb::from_str(name).ok().map(|verb| (name, verb)))
            .map(|(name, verb)| Suggestion {
                value: name.to_string(),
                description: Some(verb.description().to_string()),
                style: None,
                extra: None,
                span: Span::new(start, pos),
                append_whitespace: true,
            })
            .collect()
    }
}
