use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `ch completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to `out`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn run_completions(
    shell: Shell,
    command: &mut clap::Command,
    out: &mut dyn std::io::Write,
) -> Result<()> {
    generate(shell, command, "ch", out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_names_the_binary() {
        let mut command = clap::Command::new("ch").subcommand(clap::Command::new("run"));
        let mut buf = Vec::new();
        run_completions(Shell::Bash, &mut command, &mut buf).unwrap();
        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("_ch()"));
    }
}
