mod command;
mod completer;
mod prompt;

use anyhow::{Result, anyhow};
use clap::Args;
use owo_colors::OwoColorize;
use reedline::{
    ColumnarMenu, DefaultHinter, Emacs, FileBackedHistory, KeyCode, KeyModifiers, MenuBuilder,
    Reedline, ReedlineEvent, ReedlineMenu, Signal, Vi, default_emacs_keybindings,
    default_vi_insert_keybindings, default_vi_normal_keybindings,
};
use serde_json::Value;
use smart_fhir_core::{BrowserLauncher, FhirClient, SharedSession, SmartAuth, SmartError};
use std::path::Path;
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;

use crate::args::CliConfig;
use crate::browser::SystemBrowser;
use crate::commands::login::login_with_feedback;
use crate::commands::{build_auth, print_json, print_session, report_error};
use crate::constants::HISTORY_FILE_NAME;
use crate::output::{self, OutputLevel};

pub use command::{ShellCommand, ShellVerb};
pub use completer::ShellCompleter;
pub use prompt::ShellPrompt;

#[derive(Args)]
pub struct ShellArgs {
    /// Use vi key bindings (overrides the config file)
    #[arg(long)]
    pub vi: bool,

    /// Print authorization URLs instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,
}

impl ShellArgs {
    pub async fn run(&self, output_level: OutputLevel, cli_config: &CliConfig) -> Result<()> {
        let auth = build_auth(cli_config, None)?;
        let browser = SystemBrowser::new(
            cli_config.config.open_browser && !self.no_browser,
            output_level,
        );
        let mut line_editor = setup_reedline(
            self.vi || cli_config.config.vi_mode,
            &cli_config.data_base_path,
        )?;

        let shell = Shell {
            fhir: auth.fhir_client().ok(),
            auth,
            session: SharedSession::new(),
            browser,
            federated_logout: cli_config.config.federated_logout,
            output_level,
        };

        println!(
            "{} {}",
            "SMART-on-FHIR shell for".green(),
            shell.auth.config().issuer_base().blue().bold(),
        );
        println!(
            "{} Type {} to sign in, {} for all commands, {} to leave.",
            "Tip:".green(),
            "login".yellow(),
            "help".yellow(),
            "quit".yellow()
        );
        println!();

        let mut prompt = ShellPrompt::default();
        let mut last_ctrl_c: Option<Instant> = None;
        const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_secs(2);

        loop {
            let sig = line_editor.read_line(&prompt)?;
            match sig {
                Signal::Success(input) => {
                    last_ctrl_c = None;
                    let Some(command) = ShellCommand::parse(&input) else {
                        continue;
                    };
                    if command == ShellCommand::Quit {
                        break;
                    }

                    shell.handle(command).await?;

                    let snapshot = shell.session.snapshot().await;
                    prompt.signed_in = snapshot.is_authenticated();
                    prompt.patient = snapshot.patient_ref().map(str::to_string);
                }
                Signal::CtrlC => {
                    let now = Instant::now();
                    if let Some(last_time) = last_ctrl_c {
                        if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                            println!("{}", "Goodbye!".green());
                            break;
                        }
                    }
                    last_ctrl_c = Some(now);
                    println!(
                        "{}",
                        "(To exit, press Ctrl+C again or Ctrl+D or enter \"quit\")".dimmed()
                    );
                }
                Signal::CtrlD => {
                    println!("\n{}", "Goodbye!".green());
                    break;
                }
            }
        }

        Ok(())
    }
}

struct Shell {
    auth: SmartAuth,
    fhir: Option<FhirClient>,
    session: SharedSession,
    browser: SystemBrowser,
    federated_logout: bool,
    output_level: OutputLevel,
}

impl Shell {
    async fn handle(&self, command: ShellCommand) -> Result<()> {
        match command {
            ShellCommand::Login => {
                match login_with_feedback(&self.auth, &self.session, &self.browser, self.output_level)
                    .await
                {
                    Ok(session) => print_session(&session, self.output_level),
                    Err(e) => report_error(&e, self.output_level),
                }
            }
            ShellCommand::Logout => {
                let was_signed_in = self.session.is_authenticated().await;
                self.auth.logout(&self.session).await;
                output::success("Local session cleared.", self.output_level);

                if was_signed_in {
                    let opened = self
                        .auth
                        .logout_url(self.federated_logout)
                        .and_then(|url| self.browser.open(&url));
                    if let Err(e) = opened {
                        tracing::debug!("Provider logout page not opened: {e}");
                    }
                }
            }
            ShellCommand::Status => {
                print_session(&self.session.snapshot().await, self.output_level);
            }
            ShellCommand::Patients(params) => {
                let Some((fhir, token)) = self.reader().await else {
                    return Ok(());
                };
                match fhir.search_patients(&params, &token).await {
                    Ok(patients) => {
                        output::note(
                            &format!("{} patient(s) found", patients.len()),
                            self.output_level,
                        );
                        print_json(&Value::Array(patients))?;
                    }
                    Err(e) => report_error(&e, self.output_level),
                }
            }
            ShellCommand::Patient(id) => {
                let Some(id) = self.patient_id(id).await else {
                    return Ok(());
                };
                let Some((fhir, token)) = self.reader().await else {
                    return Ok(());
                };
                match fhir.get_patient(&id, &token).await {
                    Ok(patient) => print_json(&patient)?,
                    Err(e) => report_error(&e, self.output_level),
                }
            }
            ShellCommand::Observations(id) => {
                let Some(id) = self.patient_id(id).await else {
                    return Ok(());
                };
                let Some((fhir, token)) = self.reader().await else {
                    return Ok(());
                };
                match fhir.observations_for_patient(&id, &token).await {
                    Ok(observations) => {
                        output::note(
                            &format!("{} observation(s) for Patient/{id}", observations.len()),
                            self.output_level,
                        );
                        print_json(&Value::Array(observations))?;
                    }
                    Err(e) => report_error(&e, self.output_level),
                }
            }
            ShellCommand::Help => print_help(),
            ShellCommand::Quit => {}
            ShellCommand::Unknown(word) => {
                output::error_with_suggestion(
                    &format!("Unknown command: {word}"),
                    &format!("Type {} for available commands", output::format_command("help")),
                    self.output_level,
                );
            }
        }
        Ok(())
    }

    /// FHIR client and bearer token, or a message explaining what is missing
    async fn reader(&self) -> Option<(FhirClient, String)> {
        let Some(fhir) = self.fhir.clone() else {
            report_error(
                &SmartError::config_missing(smart_fhir_core::config::env_keys::FHIR_BASE),
                self.output_level,
            );
            return None;
        };

        match self.session.bearer().await {
            Some(token) => Some((fhir, token)),
            None => {
                output::error_with_suggestion(
                    "Not signed in",
                    &format!("Run {} first", output::format_command("login")),
                    self.output_level,
                );
                None
            }
        }
    }

    async fn patient_id(&self, explicit: Option<String>) -> Option<String> {
        if explicit.is_some() {
            return explicit;
        }

        let from_session = self.session.patient_ref().await;
        if from_session.is_none() {
            output::error_with_suggestion(
                "No patient in context",
                "Pass a patient id, e.g. `patient 123`",
                self.output_level,
            );
        }
        from_session
    }
}

fn print_help() {
    println!("{}", "Available commands:".green().bold());
    for verb in ShellVerb::iter() {
        println!("  {} - {}", verb.usage().yellow(), verb.description());
    }
}

fn add_common_keybindings(keybindings: &mut reedline::Keybindings) {
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );
}

fn setup_reedline(vim_mode: bool, data_path: &Path) -> Result<Reedline> {
    std::fs::create_dir_all(data_path)?;

    let completer = Box::new(ShellCompleter);
    let completion_menu = Box::new(ColumnarMenu::default().with_name("completion_menu"));
    let edit_mode: Box<dyn reedline::EditMode> = if vim_mode {
        let mut vi_insert_keybindings = default_vi_insert_keybindings();
        let mut vi_normal_keybindings = default_vi_normal_keybindings();
        add_common_keybindings(&mut vi_insert_keybindings);
        add_common_keybindings(&mut vi_normal_keybindings);
        Box::new(Vi::new(vi_insert_keybindings, vi_normal_keybindings))
    } else {
        let mut emacs_keybindings = default_emacs_keybindings();
        add_common_keybindings(&mut emacs_keybindings);
        Box::new(Emacs::new(emacs_keybindings))
    };
    let history = Box::new(
        FileBackedHistory::with_file(100, data_path.join(HISTORY_FILE_NAME))
            .map_err(|e| anyhow!("Error configuring history with file: {e}"))?,
    );

    let line_editor = Reedline::create()
        .with_completer(completer)
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_hinter(Box::new(DefaultHinter::default()))
        .with_history(history)
        .with_edit_mode(edit_mode);
    Ok(line_editor)
}
