use smart_fhir_core::{BrowserLauncher, SmartError};

use crate::output::{self, OutputLevel};

/// Opens the authorization page in the desktop browser, or just prints it.
pub struct SystemBrowser {
    launch: bool,
    output_level: OutputLevel,
}

impl SystemBrowser {
    pub fn new(launch: bool, output_level: OutputLevel) -> Self {
        Self {
            launch,
            output_level,
        }
    }

    pub fn launches(&self) -> bool {
        self.launch
    }
}

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), SmartError> {
        if !self.launch {
            // Printed even in quiet mode; without it there is no way to log in
            eprintln!("Open this URL to sign in:\n  {}", output::format_url(url));
            return Ok(());
        }

        output::progress("Opening browser for sign-in", self.output_level);
        webbrowser::open(url).map_err(|e| {
            eprintln!(
                "Could not open a browser. Open this URL to sign in:\n  {}",
                output::format_url(url)
            );
            SmartError::browser(e.to_string())
        })
    }
}
