//! Protocol Module
//!
//! Defines the wire protocol for client-server communication: a subset of
//! RESP2, so `redis-cli` and other Redis clients can talk to the server.
//!
//! ## Request Format
//! ```text
//! *<argc>\r\n
//! $<len>\r\n<arg 0>\r\n
//! $<len>\r\n<arg 1>\r\n
//! ...
//! ```
//! Inline requests (`PING\r\n`, `GET key\r\n`) are also accepted.
//!
//! ## Reply Types
//! - `+OK\r\n`            simple string
//! - `-ERR message\r\n`   error
//! - `:42\r\n`            integer
//! - `$3\r\nfoo\r\n`      bulk string (`$-1\r\n` is null)
//! - `*2\r\n...`          array

mod codec;
mod command;
mod reply;

pub use codec::{
    decode_reply, decode_request, encode_command, encode_reply, encode_request, read_reply,
    write_command, write_reply, MAX_ARGS, MAX_BULK_SIZE,
};
pub use command::Command;
pub use reply::Reply;
