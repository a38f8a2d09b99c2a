//! Interactive commands read from stdin.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chord_dht::Dht;

use crate::crypto::{CryptoError, Secret};

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("Unknown command {0:?}")]
    Unknown(String),
    #[error("{0} expects a file name")]
    MissingArgument(&'static str),
    #[error("{0:?} has no file name")]
    InvalidFileName(PathBuf),
    #[error(transparent)]
    Dht(#[from] chord_dht::Error),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve the owner of a file and print its decrypted content.
    LookUp(String),
    /// Store a local file on the node responsible for its name.
    StoreFile(PathBuf),
    PrintState,
    /// [Command::PrintState] and the stored values.
    Dump,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();

        let name = words.next().unwrap_or_default();
        let argument = words.next();

        let command = match name {
            "LookUp" => Command::LookUp(
                argument
                    .ok_or(CommandError::MissingArgument("LookUp"))?
                    .to_string(),
            ),
            "StoreFile" => Command::StoreFile(PathBuf::from(
                argument.ok_or(CommandError::MissingArgument("StoreFile"))?,
            )),
            "PrintState" => Command::PrintState,
            "dump" => Command::Dump,
            "quit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(command)
    }
}

impl Command {
    pub fn execute(&self, dht: &Dht, secret: Option<&Secret>) -> Result<Outcome, CommandError> {
        match self {
            Command::LookUp(name) => {
                let info = dht.info();
                let owner = dht.lookup(name)?;
                println!("{}", info.describe(&owner));

                let value = dht.get(name)?;
                println!("Stored content: {} bytes", value.len());

                let content = match secret {
                    Some(secret) => secret.decrypt(&value)?,
                    None => value.to_vec(),
                };
                println!("Content: {}", String::from_utf8_lossy(&content));
            }
            Command::StoreFile(path) => {
                let name = file_name(path)?;
                let content = fs::read(path)?;

                let sealed = match secret {
                    Some(secret) => secret.encrypt(&content)?,
                    None => content,
                };

                let owner = dht.put(&name, sealed)?;
                println!("Stored {name} on {}", dht.info().describe(&owner));
            }
            Command::PrintState => print!("{}", dht.info()),
            Command::Dump => print!("{}", dht.info().dump()),
            Command::Quit => return Ok(Outcome::Quit),
        }

        Ok(Outcome::Continue)
    }
}

/// Files are keyed by their name, not their full path.
fn file_name(path: &Path) -> Result<String, CommandError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CommandError::InvalidFileName(path.to_path_buf()))
}
