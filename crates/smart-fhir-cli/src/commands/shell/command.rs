use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Words the shell understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ShellVerb {
    Login,
    Logout,
    Status,
    Patients,
    Patient,
    Observations,
    Help,
    #[strum(to_string = "quit", serialize = "exit")]
    Quit,
}

impl ShellVerb {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn usage(self) -> &'static str {
        match self {
            ShellVerb::Login => "login",
            ShellVerb::Logout => "logout",
            ShellVerb::Status => "status",
            ShellVerb::Patients => "patients [name | key=value ...]",
            ShellVerb::Patient => "patient [id]",
            ShellVerb::Observations => "observations [patient-id]",
            ShellVerb::Help => "help",
            ShellVerb::Quit => "quit (exit)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ShellVerb::Login => "Sign in through the browser",
            ShellVerb::Logout => "Forget the session and sign out at the provider",
            ShellVerb::Status => "Show the current session",
            ShellVerb::Patients => "Search Patient resources",
            ShellVerb::Patient => "Read a Patient (defaults to the patient in context)",
            ShellVerb::Observations => "List Observations for a patient",
            ShellVerb::Help => "Show available commands",
            ShellVerb::Quit => "Leave the shell",
        }
    }

    /// All names accepted on the command line, for completion
    pub fn all_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = ShellVerb::iter().map(ShellVerb::name).collect();
        names.push("exit");
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Login,
    Logout,
    Status,
    Patients(Vec<(String, String)>),
    Patient(Option<String>),
    Observations(Option<String>),
    Help,
    Quit,
    Unknown(String),
}

impl ShellCommand {
    /// Parse one input line; a leading `/` is accepted and ignored.
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let input = input.strip_prefix('/').unwrap_or(input);
        let mut words = input.split_whitespace();
        let word = words.next()?;
        let rest: Vec<&str> = words.collect();

        let Ok(verb) = ShellVerb::from_str(word) else {
            return Some(ShellCommand::Unknown(word.to_string()));
        };

        let first_arg = rest.first().map(|s| s.to_string());

        Some(match verb {
            ShellVerb::Login => ShellCommand::Login,
            ShellVerb::Logout => ShellCommand::Logout,
            ShellVerb::Status => ShellCommand::Status,
            ShellVerb::Patients => ShellCommand::Patients(search_params(&rest)),
            ShellVerb::Patient => ShellCommand::Patient(first_arg),
            ShellVerb::Observations => ShellCommand::Observations(first_arg),
            ShellVerb::Help => ShellCommand::Help,
            ShellVerb::Quit => ShellCommand::Quit,
        })
    }
}

/// `key=value` words become search parameters; bare words form a `name` search
fn search_params(words: &[&str]) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut name_words = Vec::new();

    for word in words {
        match word.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                params.push((key.to_string(), value.to_string()))
            }
            _ => name_words.push(*word),
        }
    }

    if !name_words.is_empty() {
        params.push(("name".to_string(), name_words.join(" ")));
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(ShellCommand::parse("login"), Some(ShellCommand::Login));
        assert_eq!(ShellCommand::parse("  LOGOUT "), Some(ShellCommand::Logout));
        assert_eq!(ShellCommand::parse("/status"), Some(ShellCommand::Status));
        assert_eq!(ShellCommand::parse("exit"), Some(ShellCommand::Quit));
        assert_eq!(ShellCommand::parse("quit"), Some(ShellCommand::Quit));
        assert_eq!(ShellCommand::parse(""), None);
        assert_eq!(ShellCommand::parse("   "), None);
    }

    #[test]
    fn test_parse_patient_arguments() {
        assert_eq!(
            ShellCommand::parse("patient 123"),
            Some(ShellCommand::Patient(Some("123".to_string())))
        );
        assert_eq!(ShellCommand::parse("patient"), Some(ShellCommand::Patient(None)));
        assert_eq!(
            ShellCommand::parse("observations 9"),
            Some(ShellCommand::Observations(Some("9".to_string())))
        );
    }

    #[test]
    fn test_parse_patient_search() {
        assert_eq!(
            ShellCommand::parse("patients John Smith"),
            Some(ShellCommand::Patients(vec![(
                "name".to_string(),
                "John Smith".to_string()
            )]))
        );
        assert_eq!(
            ShellCommand::parse("patients family=Smith birthdate=1970-01-01"),
            Some(ShellCommand::Patients(vec![
                ("family".to_string(), "Smith".to_string()),
                ("birthdate".to_string(), "1970-01-01".to_string()),
            ]))
        );
        assert_eq!(
            ShellCommand::parse("patients"),
            Some(ShellCommand::Patients(Vec::new()))
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            ShellCommand::parse("frobnicate now"),
            Some(ShellCommand::Unknown("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_all_names_cover_every_verb() {
        let names = ShellVerb::all_names();
        for verb in ShellVerb::iter() {
            assert!(names.contains(&verb.name()));
            assert_eq!(ShellVerb::from_str(verb.name()), Ok(verb));
        }
        assert!(names.contains(&"exit"));
    }
}
