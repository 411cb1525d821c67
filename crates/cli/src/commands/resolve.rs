use anyhow::{Result, bail};
use shafu_core::VersionResolver;

pub fn resolve_command(version: &str, insecure: bool) -> Result<()> {
    match VersionResolver::default().resolve(Some(version), !insecure) {
        Some(locator) => {
            println!("{locator}");
            Ok(())
        }
        None => bail!("No distribution locator for Gradle version '{}'", version),
    }
}
