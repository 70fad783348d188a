//! Command definitions
//!
//! Represents commands from clients, parsed from RESP argument arrays.

use std::time::Duration;

use crate::error::{EmberError, Result};

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Health check, optionally echoing a message
    Ping(Option<Vec<u8>>),

    // -------------------------------------------------------------------------
    // Scalar
    // -------------------------------------------------------------------------
    Get { key: String },
    Set {
        key: String,
        value: Vec<u8>,
        expire: Option<Duration>,
    },

    // -------------------------------------------------------------------------
    // Keyspace (any kind)
    // -------------------------------------------------------------------------
    Del { keys: Vec<String> },
    Exists { keys: Vec<String> },
    /// `EXPIRE` / `PEXPIRE`; a non-positive lifetime deletes the key
    Expire { key: String, millis: i64 },
    Persist { key: String },
    /// `TTL` (seconds) or `PTTL` (milliseconds)
    Ttl { key: String, millis: bool },
    Type { key: String },
    DbSize,

    // -------------------------------------------------------------------------
    // List
    // -------------------------------------------------------------------------
    RPush { key: String, values: Vec<Vec<u8>> },
    /// Redis-style inclusive `stop`; negative indexes count from the tail
    LRange { key: String, start: i64, stop: i64 },
    LLen { key: String },

    // -------------------------------------------------------------------------
    // Hash
    // -------------------------------------------------------------------------
    HSet {
        key: String,
        pairs: Vec<(String, Vec<u8>)>,
    },
    HGet { key: String, field: String },
    HDel { key: String, fields: Vec<String> },
    HGetAll { key: String },
    HLen { key: String },

    /// Stop the server
    Shutdown,
}

impl Command {
    /// Parse a RESP argument array (`args[0]` is the command name)
    pub fn from_args(args: Vec<Vec<u8>>) -> Result<Command> {
        let mut args = args.into_iter();
        let name = match args.next() {
            Some(name) => String::from_utf8_lossy(&name).to_ascii_uppercase(),
            None => return Err(EmberError::Protocol("empty command".to_string())),
        };
        let rest: Vec<Vec<u8>> = args.collect();
        let mut args = Args::new(&name, rest);

        let command = match name.as_str() {
            "PING" => match args.remaining() {
                0 => Command::Ping(None),
                1 => Command::Ping(Some(args.bytes()?)),
                _ => return Err(args.arity_error()),
            },
            "GET" => Command::Get { key: args.string()? },
            "SET" => parse_set(&mut args)?,
            "DEL" => Command::Del { keys: args.strings_at_least(1)? },
            "EXISTS" => Command::Exists { keys: args.strings_at_least(1)? },
            "EXPIRE" | "PEXPIRE" => {
                let key = args.string()?;
                let amount = args.integer()?;
                let millis = if name == "EXPIRE" {
                    amount.saturating_mul(1000)
                } else {
                    amount
                };
                Command::Expire { key, millis }
            }
            "PERSIST" => Command::Persist { key: args.string()? },
            "TTL" => Command::Ttl {
                key: args.string()?,
                millis: false,
            },
            "PTTL" => Command::Ttl {
                key: args.string()?,
                millis: true,
            },
            "TYPE" => Command::Type { key: args.string()? },
            "DBSIZE" => Command::DbSize,
            "RPUSH" => {
                let key = args.string()?;
                let values = args.bytes_at_least(1)?;
                Command::RPush { key, values }
            }
            "LRANGE" => Command::LRange {
                key: args.string()?,
                start: args.integer()?,
                stop: args.integer()?,
            },
            "LLEN" => Command::LLen { key: args.string()? },
            "HSET" => {
                let key = args.string()?;
                if args.remaining() == 0 || args.remaining() % 2 != 0 {
                    return Err(args.arity_error());
                }
                let mut pairs = Vec::with_capacity(args.remaining() / 2);
                while args.remaining() > 0 {
                    pairs.push((args.string()?, args.bytes()?));
                }
                Command::HSet { key, pairs }
            }
            "HGET" => Command::HGet {
                key: args.string()?,
                field: args.string()?,
            },
            "HDEL" => {
                let key = args.string()?;
                let fields = args.strings_at_least(1)?;
                Command::HDel { key, fields }
            }
            "HGETALL" => Command::HGetAll { key: args.string()? },
            "HLEN" => Command::HLen { key: args.string()? },
            "SHUTDOWN" => Command::Shutdown,
            _ => {
                return Err(EmberError::Protocol(format!(
                    "unknown command '{}'",
                    name.to_ascii_lowercase()
                )))
            }
        };

        args.finish()?;
        Ok(command)
    }

    /// The RESP argument array for this command
    pub fn to_args(&self) -> Vec<Vec<u8>> {
        fn arg(value: impl AsRef<[u8]>) -> Vec<u8> {
            value.as_ref().to_vec()
        }

        match self {
            Command::Ping(None) => vec![arg("PING")],
            Command::Ping(Some(message)) => vec![arg("PING"), message.clone()],
            Command::Get { key } => vec![arg("GET"), arg(key)],
            Command::Set { key, value, expire } => {
                let mut args = vec![arg("SET"), arg(key), value.clone()];
                if let Some(ttl) = expire {
                    args.push(arg("PX"));
                    args.push(arg(ttl.as_millis().to_string()));
                }
                args
            }
            Command::Del { keys } => with_name("DEL", keys.iter().map(arg)),
            Command::Exists { keys } => with_name("EXISTS", keys.iter().map(arg)),
            Command::Expire { key, millis } => {
                vec![arg("PEXPIRE"), arg(key), arg(millis.to_string())]
            }
            Command::Persist { key } => vec![arg("PERSIST"), arg(key)],
            Command::Ttl { key, millis } => {
                vec![arg(if *millis { "PTTL" } else { "TTL" }), arg(key)]
            }
            Command::Type { key } => vec![arg("TYPE"), arg(key)],
            Command::DbSize => vec![arg("DBSIZE")],
            Command::RPush { key, values } => {
                let mut args = vec![arg("RPUSH"), arg(key)];
                args.extend(values.iter().cloned());
                args
            }
            Command::LRange { key, start, stop } => vec![
                arg("LRANGE"),
                arg(key),
                arg(start.to_string()),
                arg(stop.to_string()),
            ],
            Command::LLen { key } => vec![arg("LLEN"), arg(key)],
            Command::HSet { key, pairs } => {
                let mut args = vec![arg("HSET"), arg(key)];
                for (field, value) in pairs {
                    args.push(arg(field));
                    args.push(value.clone());
                }
                args
            }
            Command::HGet { key, field } => vec![arg("HGET"), arg(key), arg(field)],
            Command::HDel { key, fields } => {
                let mut args = vec![arg("HDEL"), arg(key)];
                args.extend(fields.iter().map(arg));
                args
            }
            Command::HGetAll { key } => vec![arg("HGETALL"), arg(key)],
            Command::HLen { key } => vec![arg("HLEN"), arg(key)],
            Command::Shutdown => vec![arg("SHUTDOWN")],
        }
    }
}

fn with_name(name: &str, rest: impl Iterator<Item = Vec<u8>>) -> Vec<Vec<u8>> {
    std::iter::once(name.as_bytes().to_vec()).chain(rest).collect()
}

fn parse_set(args: &mut Args) -> Result<Command> {
    let key = args.string()?;
    let value = args.bytes()?;

    let expire = match args.remaining() {
        0 => None,
        2 => {
            let unit = args.string()?.to_ascii_uppercase();
            let amount = args.integer()?;
            if amount <= 0 {
                return Err(EmberError::Protocol(
                    "invalid expire time in 'set' command".to_string(),
                ));
            }
            match unit.as_str() {
                "EX" => Some(Duration::from_secs(amount as u64)),
                "PX" => Some(Duration::from_millis(amount as u64)),
                _ => return Err(EmberError::Protocol("syntax error".to_string())),
            }
        }
        _ => return Err(EmberError::Protocol("syntax error".to_string())),
    };

    Ok(Command::Set { key, value, expire })
}

/// Cursor over a command's arguments with arity-aware errors
struct Args {
    name: String,
    items: std::vec::IntoIter<Vec<u8>>,
}

impl Args {
    fn new(name: &str, items: Vec<Vec<u8>>) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            items: items.into_iter(),
        }
    }

    fn remaining(&self) -> usize {
        self.items.len()
    }

    fn arity_error(&self) -> EmberError {
        EmberError::Protocol(format!(
            "wrong number of arguments for '{}' command",
            self.name
        ))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        self.items.next().ok_or_else(|| self.arity_error())
    }

    fn string(&mut self) -> Result<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw)
            .map_err(|_| EmberError::Protocol("keys and fields must be valid UTF-8".to_string()))
    }

    fn integer(&mut self) -> Result<i64> {
        let raw = self.bytes()?;
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| {
                EmberError::Protocol("value is not an integer or out of range".to_string())
            })
    }

    fn bytes_at_least(&mut self, min: usize) -> Result<Vec<Vec<u8>>> {
        if self.remaining() < min {
            return Err(self.arity_error());
        }
        Ok(self.items.by_ref().collect())
    }

    fn strings_at_least(&mut self, min: usize) -> Result<Vec<String>> {
        if self.remaining() < min {
            return Err(self.arity_error());
        }
        let mut out = Vec::with_capacity(self.remaining());
        while self.remaining() > 0 {
            out.push(self.string()?);
        }
        Ok(out)
    }

    /// Reject trailing arguments
    fn finish(&self) -> Result<()> {
        if self.remaining() > 0 {
            return Err(self.arity_error());
        }
        Ok(())
    }
}
