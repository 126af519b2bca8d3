//! `aimeta shell`: a line-oriented loop where every command shares one
//! session, so `--session-only` values live until the shell exits.

use anyhow::{bail, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use tracing::{debug, warn};

use super::{run, Context};
use crate::cli::{Cli, Commands};
use crate::prefs::Session;

const PROMPT: &str = "aimeta> ";

/// Reads command lines from `input` until EOF, `exit` or `quit`.
///
/// A failing command prints its error and the loop continues.
pub fn run_shell(
    ctx: &mut Context,
    session: &mut Session,
    input: impl BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    ctx.interactive = true;
    write!(out, "{}", PROMPT)?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        match trimmed {
            "" => {}
            "exit" | "quit" => break,
            _ => {
                if let Err(e) = run_line(ctx, session, trimmed, out) {
                    writeln!(out, "Error: {:#}", e)?;
                }
            }
        }
        write!(out, "{}", PROMPT)?;
        out.flush()?;
    }

    writeln!(out)?;
    Ok(())
}

fn run_line(ctx: &Context, session: &mut Session, line: &str, out: &mut dyn Write) -> Result<()> {
    let words = split_line(line)?;
    debug!("shell: {:?}", words);
    let startup_only = names_startup_option(&words);

    let cli = match Cli::try_parse_from(std::iter::once("aimeta".to_string()).chain(words)) {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too
            write!(out, "{}", e.render())?;
            return Ok(());
        }
    };
    // the env fallbacks fill these in on every line, so look at what was typed
    if startup_only {
        warn!("--config and --preferences-db are ignored inside the shell");
        writeln!(out, "note: --config and --preferences-db only apply when starting the shell")?;
    }
    if matches!(cli.command, Commands::Shell) {
        bail!("already running inside the aimeta shell");
    }

    run(cli.command, ctx, session, out)
}

/// Whether `words` spell out `--config` or `--preferences-db`.
fn names_startup_option(words: &[String]) -> bool {
    words.iter().any(|w| {
        let name = w.split('=').next().unwrap_or(w);
        let short_config = w.starts_with("-c") && !w.starts_with("--");
        matches!(name, "--config" | "--preferences-db") || short_config
    })
}

/// Splits a command line into words. Single and double quotes group words;
/// a backslash escapes the next character outside single quotes.
pub fn split_line(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => match chars.next() {
                Some(escaped) => {
                    current.push(escaped);
                    in_word = true;
                }
                None => bail!("line ends with a lone backslash"),
            },
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        bail!("unterminated {} quote", q);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
