//! Launch-at-login registration. On Windows this goes through the per-user Run registry key;
//! other platforms have no registration and the commands say so instead of failing silently.

use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum AutostartCommand {
    #[command(about = "Register the daemon to start when you log in")]
    Enable,
    #[command(about = "Remove the login registration")]
    Disable,
    #[command(about = "Show whether launch at login is active")]
    Status,
}

pub fn process_autostart_command(command: AutostartCommand) -> Result<()> {
    match command {
        AutostartCommand::Enable => {
            enable()?;
            println!("Launch at login enabled");
        }
        AutostartCommand::Disable => {
            disable()?;
            println!("Launch at login disabled");
        }
        AutostartCommand::Status => {
            println!(
                "Launch at login is {}",
                if is_enabled() { "enabled" } else { "disabled" }
            );
        }
    }
    Ok(())
}

#[cfg(windows)]
const RUN_KEY_PATH: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";
#[cfg(windows)]
const RUN_VALUE_NAME: &str = "Keytally";

#[cfg(windows)]
pub fn enable() -> Result<()> {
    use winreg::{enums::*, RegKey};

    let exe_path = std::env::current_exe()?;
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let run_key = hkcu.open_subkey_with_flags(RUN_KEY_PATH, KEY_WRITE)?;
    run_key.set_value(
        RUN_VALUE_NAME,
        &format!("\"{}\" init", exe_path.display()),
    )?;
    Ok(())
}

#[cfg(windows)]
pub fn disable() -> Result<()> {
    use winreg::{enums::*, RegKey};

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let run_key = hkcu.open_subkey_with_flags(RUN_KEY_PATH, KEY_WRITE)?;
    // Removing a value that was never set is fine.
    let _ = run_key.delete_value(RUN_VALUE_NAME);
    Ok(())
}

#[cfg(windows)]
pub fn is_enabled() -> bool {
    use winreg::{enums::*, RegKey};

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    match hkcu.open_subkey(RUN_KEY_PATH) {
        Ok(run_key) => run_key.get_value::<String, _>(RUN_VALUE_NAME).is_ok(),
        Err(_) => false,
    }
}

#[cfg(not(windows))]
pub fn enable() -> Result<()> {
    Err(anyhow::anyhow!(
        "launch at login is only supported on Windows"
    ))
}

#[cfg(not(windows))]
pub fn disable() -> Result<()> {
    Err(anyhow::anyhow!(
        "launch at login is only supported on Windows"
    ))
}

#[cfg(not(windows))]
pub fn is_enabled() -> bool {
    false
}
