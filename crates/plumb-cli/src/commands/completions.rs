use super::EXIT_SUCCESS;
use clap::CommandFactory;
use clap_complete::Shell;
use std::io::Write;

const BIN_NAME: &str = "plumb";

/// Completion script for every subcommand of `C`, written to `out`.
pub fn generate<C: CommandFactory>(shell: Shell, out: &mut dyn Write) {
    clap_complete::generate(shell, &mut C::command(), BIN_NAME, out);
}

#[allow(clippy::unnecessary_wraps)]
pub fn run<C: CommandFactory>(shell: Shell) -> Result<u8, String> {
    let mut stdout = std::io::stdout().lock();
    generate::<C>(shell, &mut stdout);
    Ok(EXIT_SUCCESS)
}
