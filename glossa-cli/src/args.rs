//! Command-line arguments.

use std::path::PathBuf;

use crate::error::CliError;

pub const USAGE: &str = "usage: glossa [--config <path>] [--inspect] <uri>...";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    /// Print resolver internals to stderr after resolving.
    pub inspect: bool,
    pub help: bool,
    pub uris: Vec<String>,
}

impl Invocation {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut invocation = Invocation::default();
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args
                        .next()
                        .ok_or_else(|| CliError::Usage("--config needs a path".to_string()))?;
                    invocation.config_path = Some(PathBuf::from(path));
                }
                "--inspect" => invocation.inspect = true,
                "-h" | "--help" => invocation.help = true,
                flag if flag.starts_with("--") => {
                    return Err(CliError::Usage(format!("unknown option {}", flag)));
                }
                _ => invocation.uris.push(arg),
            }
        }
        if invocation.uris.is_empty() && !invocation.help {
            return Err(CliError::Usage("no URIs given".to_string()));
        }
        Ok(invocation)
    }
}
