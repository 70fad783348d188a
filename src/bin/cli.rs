//! EmberKV CLI Client
//!
//! Command-line interface for interacting with an EmberKV server.

use std::io::BufWriter;
use std::net::TcpStream;
use std::process::ExitCode;
use std::time::Duration;

use bytes::BytesMut;
use clap::{Parser, Subcommand};
use emberkv::protocol::{read_reply, write_command, Command, Reply};

/// EmberKV CLI
#[derive(Parser, Debug)]
#[command(name = "emberkv-cli")]
#[command(about = "CLI for the EmberKV key-value server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Get a string value
    Get { key: String },

    /// Set a string value
    Set {
        key: String,
        value: String,
        /// Expire after this many seconds
        #[arg(long)]
        ex: Option<u64>,
    },

    /// Delete keys of any type
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Count how many of the keys exist
    Exists {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Expire a key after a number of seconds
    Expire { key: String, seconds: i64 },

    /// Remove the expiry of a key
    Persist { key: String },

    /// Remaining time to live in seconds
    Ttl { key: String },

    /// Type of the value stored at a key
    Type { key: String },

    /// Append values to a list
    Rpush {
        key: String,
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Read list elements (inclusive stop, negative counts from the tail)
    Lrange {
        key: String,
        #[arg(allow_hyphen_values = true)]
        start: i64,
        #[arg(allow_hyphen_values = true)]
        stop: i64,
    },

    /// Length of a list
    Llen { key: String },

    /// Set a hash field
    Hset { key: String, field: String, value: String },

    /// Get a hash field
    Hget { key: String, field: String },

    /// Delete hash fields
    Hdel {
        key: String,
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// All fields and values of a hash
    Hgetall { key: String },

    /// Number of fields in a hash
    Hlen { key: String },

    /// Number of live keys
    Dbsize,

    /// Stop the server
    Shutdown,
}

impl Commands {
    fn into_command(self) -> Command {
        match self {
            Commands::Ping => Command::Ping(None),
            Commands::Get { key } => Command::Get { key },
            Commands::Set { key, value, ex } => Command::Set {
                key,
                value: value.into_bytes(),
                expire: ex.map(Duration::from_secs),
            },
            Commands::Del { keys } => Command::Del { keys },
            Commands::Exists { keys } => Command::Exists { keys },
            Commands::Expire { key, seconds } => Command::Expire {
                key,
                millis: seconds.saturating_mul(1000),
            },
            Commands::Persist { key } => Command::Persist { key },
            Commands::Ttl { key } => Command::Ttl { key, millis: false },
            Commands::Type { key } => Command::Type { key },
            Commands::Rpush { key, values } => Command::RPush {
                key,
                values: values.into_iter().map(String::into_bytes).collect(),
            },
            Commands::Lrange { key, start, stop } => Command::LRange { key, start, stop },
            Commands::Llen { key } => Command::LLen { key },
            Commands::Hset { key, field, value } => Command::HSet {
                key,
                pairs: vec![(field, value.into_bytes())],
            },
            Commands::Hget { key, field } => Command::HGet { key, field },
            Commands::Hdel { key, fields } => Command::HDel { key, fields },
            Commands::Hgetall { key } => Command::HGetAll { key },
            Commands::Hlen { key } => Command::HLen { key },
            Commands::Dbsize => Command::DbSize,
            Commands::Shutdown => Command::Shutdown,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let command = args.command.into_command();

    match send(&args.server, &command) {
        Ok(reply) => {
            print_reply(&reply, 0);
            if reply.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Could not talk to {}: {}", args.server, e);
            ExitCode::FAILURE
        }
    }
}

fn send(server: &str, command: &Command) -> emberkv::Result<Reply> {
    let stream = TcpStream::connect(server)?;
    stream.set_nodelay(true)?;

    let mut writer = BufWriter::new(stream.try_clone()?);
    write_command(&mut writer, command)?;

    let mut reader = stream;
    let mut buf = BytesMut::with_capacity(4096);
    read_reply(&mut reader, &mut buf)
}

/// Print a reply the way redis-cli does
fn print_reply(reply: &Reply, depth: usize) {
    let pad = "   ".repeat(depth);
    match reply {
        Reply::Simple(text) => println!("{}{}", pad, text),
        Reply::Error(text) => println!("{}(error) {}", pad, text),
        Reply::Integer(n) => println!("{}(integer) {}", pad, n),
        Reply::Bulk(data) => println!("{}\"{}\"", pad, String::from_utf8_lossy(data)),
        Reply::Null => println!("{}(nil)", pad),
        Reply::Array(items) if items.is_empty() => println!("{}(empty array)", pad),
        Reply::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                print!("{}{}) ", pad, i + 1);
                match item {
                    Reply::Array(_) => {
                        println!();
                        print_reply(item, depth + 1);
                    }
                    _ => print_reply(item, 0),
                }
            }
        }
    }
}
