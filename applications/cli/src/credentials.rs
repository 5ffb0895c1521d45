/// Interactive credential prompting
use breeze_core::{CredentialSource, Credentials};
use std::io::{self, Write};

/// Prompts for service credentials on the terminal.
///
/// Only invoked by the orchestrator when upload is enabled and no valid
/// cached token exists; the password is read without echo and never stored.
pub struct TerminalCredentialSource;

impl CredentialSource for TerminalCredentialSource {
    fn get(&self) -> io::Result<Credentials> {
        println!("\nUpload service authentication required");

        print!("Username/email: ");
        io::stdout().flush()?;
        let mut username = String::new();
        io::stdin().read_line(&mut username)?;

        let password = rpassword::prompt_password("Password: ")?;

        Ok(Credentials {
            username: username.trim().to_string(),
            password,
        })
    }
}
