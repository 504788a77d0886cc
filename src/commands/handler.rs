//! Command Dispatch
//!
//! Resolves the first token of a request against the fixed command table,
//! validates arity and option tokens, drives the keyspace, and produces
//! exactly one reply per request.
//!
//! ## Command Surface
//!
//! ### Server
//! - `PING [message]`
//! - `DBSIZE`
//! - `FLUSHDB`
//!
//! ### Strings and keys
//! - `SET key value [EX seconds] [NX]`
//! - `GET key`
//! - `DEL key [key ...]`
//! - `EXISTS key [key ...]`
//! - `EXPIRE key seconds`
//! - `TTL key`
//!
//! ### Sorted sets
//! - `ZADD key score member [score member ...]`
//! - `ZREM key member [member ...]`
//! - `ZSCORE key member`
//! - `ZCARD key`
//! - `ZRANK key member`
//! - `ZRANGE key start stop [WITHSCORES]`
//! - `ZRANGEBYSCORE key min max [WITHSCORES]`
//!
//! Command names and option tokens are case-insensitive. Handlers run
//! synchronously; atomicity comes from the keyspace lock, one critical
//! section per command.

use crate::protocol::{format_score, Reply, Request};
use crate::storage::{Keyspace, WrongType};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Executes requests against the shared keyspace.
#[derive(Clone)]
pub struct CommandHandler {
    keyspace: Arc<Keyspace>,
}

impl CommandHandler {
    /// Creates a handler over the given keyspace.
    pub fn new(keyspace: Arc<Keyspace>) -> Self {
        Self { keyspace }
    }

    /// Executes one request and returns its reply.
    pub fn execute(&self, request: &Request) -> Reply {
        let name = match request.name() {
            Some(name) => name,
            None => return Reply::error("ERR empty command"),
        };

        let cmd = String::from_utf8_lossy(name).to_ascii_uppercase();
        let args = request.args();

        match cmd.as_str() {
            "PING" => self.cmd_ping(args),
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),
            "EXPIRE" => self.cmd_expire(args),
            "TTL" => self.cmd_ttl(args),
            "DBSIZE" => self.cmd_dbsize(args),
            "FLUSHDB" => self.cmd_flushdb(args),
            "ZADD" => self.cmd_zadd(args),
            "ZREM" => self.cmd_zrem(args),
            "ZSCORE" => self.cmd_zscore(args),
            "ZCARD" => self.cmd_zcard(args),
            "ZRANK" => self.cmd_zrank(args),
            "ZRANGE" => self.cmd_zrange(args),
            "ZRANGEBYSCORE" => self.cmd_zrangebyscore(args),
            _ => Reply::error(format!(
                "ERR unknown command '{}'",
                cmd.to_ascii_lowercase()
            )),
        }
    }

    // ========================================================================
    // Server commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, args: &[Bytes]) -> Reply {
        match args {
            [] => Reply::pong(),
            [msg] => Reply::status(String::from_utf8_lossy(msg).into_owned()),
            _ => arity_error("ping"),
        }
    }

    /// DBSIZE
    fn cmd_dbsize(&self, args: &[Bytes]) -> Reply {
        if !args.is_empty() {
            return arity_error("dbsize");
        }
        Reply::integer(self.keyspace.dbsize() as i64)
    }

    /// FLUSHDB
    fn cmd_flushdb(&self, args: &[Bytes]) -> Reply {
        if !args.is_empty() {
            return arity_error("flushdb");
        }
        self.keyspace.flush();
        Reply::ok()
    }

    // ========================================================================
    // String and key commands
    // ========================================================================

    /// SET key value [EX seconds] [NX]
    fn cmd_set(&self, args: &[Bytes]) -> Reply {
        if args.len() < 2 {
            return arity_error("set");
        }

        let key = args[0].clone();
        let value = args[1].clone();

        let mut ttl: Option<Duration> = None;
        let mut nx = false;

        let mut i = 2;
        while i < args.len() {
            let opt = String::from_utf8_lossy(&args[i]).to_ascii_uppercase();
            match opt.as_str() {
                "EX" => {
                    i += 1;
                    if i >= args.len() {
                        return Reply::error("ERR syntax error");
                    }
                    match parse_int(&args[i]) {
                        Some(secs) if secs > 0 => ttl = Some(Duration::from_secs(secs as u64)),
                        _ => return Reply::error("ERR invalid expire time in 'set' command"),
                    }
                }
                "NX" => nx = true,
                _ => return Reply::error("ERR syntax error"),
            }
            i += 1;
        }

        if nx {
            if self.keyspace.set_nx(key, value, ttl) {
                Reply::ok()
            } else {
                Reply::null()
            }
        } else {
            self.keyspace.set(key, value, ttl);
            Reply::ok()
        }
    }

    /// GET key
    fn cmd_get(&self, args: &[Bytes]) -> Reply {
        if args.len() != 1 {
            return arity_error("get");
        }
        match self.keyspace.get(&args[0]) {
            Ok(Some(value)) => Reply::bulk(value),
            Ok(None) => Reply::null(),
            Err(WrongType) => Reply::wrong_type(),
        }
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[Bytes]) -> Reply {
        if args.is_empty() {
            return arity_error("del");
        }
        Reply::integer(self.keyspace.del_many(args) as i64)
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[Bytes]) -> Reply {
        if args.is_empty() {
            return arity_error("exists");
        }
        Reply::integer(self.keyspace.exists_many(args) as i64)
    }

    /// EXPIRE key seconds
    fn cmd_expire(&self, args: &[Bytes]) -> Reply {
        if args.len() != 2 {
            return arity_error("expire");
        }
        let seconds = match parse_int(&args[1]) {
            Some(s) => s,
            None => return Reply::error("ERR invalid expire time in 'expire' command"),
        };

        // A non-positive TTL deletes the key right away.
        if seconds <= 0 {
            return if self.keyspace.del(&args[0]) {
                Reply::integer(1)
            } else {
                Reply::integer(0)
            };
        }

        if self
            .keyspace
            .expire(&args[0], Duration::from_secs(seconds as u64))
        {
            Reply::integer(1)
        } else {
            Reply::integer(0)
        }
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[Bytes]) -> Reply {
        if args.len() != 1 {
            return arity_error("ttl");
        }
        Reply::integer(self.keyspace.ttl(&args[0]))
    }

    // ========================================================================
    // Sorted-set commands
    // ========================================================================

    /// ZADD key score member [score member ...]
    fn cmd_zadd(&self, args: &[Bytes]) -> Reply {
        if args.len() < 3 || (args.len() - 1) % 2 != 0 {
            return arity_error("zadd");
        }

        // Validate every score up front so a bad pair cannot half-apply
        // the command.
        let mut pairs = Vec::with_capacity((args.len() - 1) / 2);
        for chunk in args[1..].chunks(2) {
            let score = match parse_score(&chunk[0]) {
                Some(score) => score,
                None => return Reply::error("ERR value is not a valid float"),
            };
            pairs.push((score, chunk[1].clone()));
        }

        match self.keyspace.zadd(&args[0], &pairs) {
            Ok(added) => Reply::integer(added as i64),
            Err(WrongType) => Reply::wrong_type(),
        }
    }

    /// ZREM key member [member ...]
    fn cmd_zrem(&self, args: &[Bytes]) -> Reply {
        if args.len() < 2 {
            return arity_error("zrem");
        }
        match self.keyspace.zrem(&args[0], &args[1..]) {
            Ok(removed) => Reply::integer(removed as i64),
            Err(WrongType) => Reply::wrong_type(),
        }
    }

    /// ZSCORE key member
    fn cmd_zscore(&self, args: &[Bytes]) -> Reply {
        if args.len() != 2 {
            return arity_error("zscore");
        }
        match self.keyspace.zscore(&args[0], &args[1]) {
            Ok(Some(score)) => Reply::bulk(format_score(score)),
            Ok(None) => Reply::null(),
            Err(WrongType) => Reply::wrong_type(),
        }
    }

    /// ZCARD key
    fn cmd_zcard(&self, args: &[Bytes]) -> Reply {
        if args.len() != 1 {
            return arity_error("zcard");
        }
        match self.keyspace.zcard(&args[0]) {
            Ok(card) => Reply::integer(card as i64),
            Err(WrongType) => Reply::wrong_type(),
        }
    }

    /// ZRANK key member
    fn cmd_zrank(&self, args: &[Bytes]) -> Reply {
        if args.len() != 2 {
            return arity_error("zrank");
        }
        match self.keyspace.zrank(&args[0], &args[1]) {
            Ok(Some(rank)) => Reply::integer(rank as i64),
            Ok(None) => Reply::null(),
            Err(WrongType) => Reply::wrong_type(),
        }
    }

    /// ZRANGE key start stop [WITHSCORES]
    fn cmd_zrange(&self, args: &[Bytes]) -> Reply {
        if args.len() < 3 || args.len() > 4 {
            return arity_error("zrange");
        }
        let start = match parse_int(&args[1]) {
            Some(n) => n,
            None => return Reply::error("ERR value is not an integer or out of range"),
        };
        let stop = match parse_int(&args[2]) {
            Some(n) => n,
            None => return Reply::error("ERR value is not an integer or out of range"),
        };
        let withscores = match parse_withscores(&args[3..]) {
            Ok(flag) => flag,
            Err(reply) => return reply,
        };

        match self.keyspace.zrange(&args[0], start, stop) {
            Ok(entries) => render_entries(entries, withscores),
            Err(WrongType) => Reply::wrong_type(),
        }
    }

    /// ZRANGEBYSCORE key min max [WITHSCORES]
    fn cmd_zrangebyscore(&self, args: &[Bytes]) -> Reply {
        if args.len() < 3 || args.len() > 4 {
            return arity_error("zrangebyscore");
        }
        let min = match parse_score(&args[1]) {
            Some(score) => score,
            None => return Reply::error("ERR value is not a valid float"),
        };
        let max = match parse_score(&args[2]) {
            Some(score) => score,
            None => return Reply::error("ERR value is not a valid float"),
        };
        let withscores = match parse_withscores(&args[3..]) {
            Ok(flag) => flag,
            Err(reply) => return reply,
        };

        match self.keyspace.zrange_by_score(&args[0], min, max) {
            Ok(entries) => render_entries(entries, withscores),
            Err(WrongType) => Reply::wrong_type(),
        }
    }
}

/// The wrong-arity error in the dialect's wording.
fn arity_error(name: &str) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{}' command",
        name
    ))
}

/// Parses a token as a signed 64-bit integer.
fn parse_int(token: &Bytes) -> Option<i64> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

/// Parses a token as a finite score. NaN and infinities are rejected, so
/// no non-finite value ever reaches the ordered index.
fn parse_score(token: &Bytes) -> Option<f64> {
    let score: f64 = std::str::from_utf8(token).ok()?.parse().ok()?;
    score.is_finite().then_some(score)
}

/// Interprets the optional trailing token of a range command. Anything
/// other than `WITHSCORES` is a syntax error.
fn parse_withscores(rest: &[Bytes]) -> Result<bool, Reply> {
    match rest {
        [] => Ok(false),
        [token] if token.eq_ignore_ascii_case(b"WITHSCORES") => Ok(true),
        _ => Err(Reply::error("ERR syntax error")),
    }
}

/// Renders a range result, interleaving formatted scores when requested.
fn render_entries(entries: Vec<(Bytes, f64)>, withscores: bool) -> Reply {
    let mut items = Vec::with_capacity(if withscores {
        entries.len() * 2
    } else {
        entries.len()
    });
    for (member, score) in entries {
        items.push(member);
        if withscores {
            items.push(Bytes::from(format_score(score)));
        }
    }
    Reply::array(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(Keyspace::new()))
    }

    fn make_request(tokens: &[&str]) -> Request {
        Request {
            tokens: tokens
                .iter()
                .map(|t| Bytes::from(t.to_string()))
                .collect(),
        }
    }

    fn exec(handler: &CommandHandler, tokens: &[&str]) -> Reply {
        handler.execute(&make_request(tokens))
    }

    #[test]
    fn ping() {
        let handler = create_handler();
        assert_eq!(exec(&handler, &["PING"]), Reply::pong());
        assert_eq!(exec(&handler, &["PING", "hello"]), Reply::status("hello"));
        assert!(exec(&handler, &["PING", "a", "b"]).is_error());
    }

    #[test]
    fn command_names_are_case_insensitive() {
        let handler = create_handler();
        assert_eq!(exec(&handler, &["ping"]), Reply::pong());
        assert_eq!(exec(&handler, &["set", "k", "v"]), Reply::ok());
        assert_eq!(exec(&handler, &["GeT", "k"]), Reply::bulk("v"));
    }

    #[test]
    fn set_and_get() {
        let handler = create_handler();
        assert_eq!(exec(&handler, &["SET", "key1", "value1"]), Reply::ok());
        assert_eq!(exec(&handler, &["GET", "key1"]), Reply::bulk("value1"));
        assert_eq!(exec(&handler, &["GET", "nonexistent"]), Reply::null());
    }

    #[test]
    fn set_nx_aborts_with_null() {
        let handler = create_handler();
        assert_eq!(exec(&handler, &["SET", "k", "v1", "NX"]), Reply::ok());
        assert_eq!(exec(&handler, &["SET", "k", "v2", "NX"]), Reply::null());
        assert_eq!(exec(&handler, &["GET", "k"]), Reply::bulk("v1"));
    }

    #[test]
    fn set_ex_with_nx_combined() {
        let handler = create_handler();
        assert_eq!(exec(&handler, &["SET", "k", "v", "EX", "100", "NX"]), Reply::ok());
        match exec(&handler, &["TTL", "k"]) {
            Reply::Integer(n) => assert!((0..=100).contains(&n)),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(
            exec(&handler, &["SET", "k", "v2", "NX", "EX", "5"]),
            Reply::null()
        );
    }

    #[test]
    fn set_without_ex_clears_ttl() {
        let handler = create_handler();
        exec(&handler, &["SET", "k", "v", "EX", "100"]);
        exec(&handler, &["SET", "k", "v2"]);
        assert_eq!(exec(&handler, &["TTL", "k"]), Reply::integer(-1));
    }

    #[test]
    fn set_rejects_bad_options() {
        let handler = create_handler();
        assert!(exec(&handler, &["SET", "k", "v", "EX", "0"]).is_error());
        assert!(exec(&handler, &["SET", "k", "v", "EX", "-5"]).is_error());
        assert!(exec(&handler, &["SET", "k", "v", "EX", "abc"]).is_error());
        assert!(exec(&handler, &["SET", "k", "v", "EX"]).is_error());
        assert!(exec(&handler, &["SET", "k", "v", "BOGUS"]).is_error());
        assert!(exec(&handler, &["SET", "k"]).is_error());
        // None of the rejected forms may have written the key.
        assert_eq!(exec(&handler, &["EXISTS", "k"]), Reply::integer(0));
    }

    #[test]
    fn del_returns_live_count() {
        let handler = create_handler();
        exec(&handler, &["SET", "key1", "v"]);
        exec(&handler, &["SET", "key2", "v"]);
        assert_eq!(
            exec(&handler, &["DEL", "key1", "key2", "nonexistent"]),
            Reply::integer(2)
        );
        assert_eq!(exec(&handler, &["GET", "key1"]), Reply::null());
    }

    #[test]
    fn exists_counts_duplicates() {
        let handler = create_handler();
        exec(&handler, &["SET", "key1", "v"]);
        assert_eq!(
            exec(&handler, &["EXISTS", "key1", "key1", "nope"]),
            Reply::integer(2)
        );
    }

    #[test]
    fn expire_and_ttl() {
        let handler = create_handler();
        exec(&handler, &["SET", "key1", "v"]);

        assert_eq!(exec(&handler, &["EXPIRE", "key1", "5"]), Reply::integer(1));
        match exec(&handler, &["TTL", "key1"]) {
            Reply::Integer(n) => assert!((0..=5).contains(&n)),
            other => panic!("unexpected reply: {:?}", other),
        }

        assert_eq!(exec(&handler, &["EXPIRE", "missing", "5"]), Reply::integer(0));
        assert_eq!(exec(&handler, &["TTL", "missing"]), Reply::integer(-2));

        exec(&handler, &["SET", "forever", "v"]);
        assert_eq!(exec(&handler, &["TTL", "forever"]), Reply::integer(-1));
    }

    #[test]
    fn expire_nonpositive_deletes() {
        let handler = create_handler();
        exec(&handler, &["SET", "k", "v"]);
        assert_eq!(exec(&handler, &["EXPIRE", "k", "0"]), Reply::integer(1));
        assert_eq!(exec(&handler, &["EXISTS", "k"]), Reply::integer(0));
        assert_eq!(exec(&handler, &["EXPIRE", "k", "-1"]), Reply::integer(0));
    }

    #[test]
    fn expire_rejects_garbage_seconds() {
        let handler = create_handler();
        exec(&handler, &["SET", "k", "v"]);
        assert!(exec(&handler, &["EXPIRE", "k", "soon"]).is_error());
    }

    #[test]
    fn dbsize_and_flushdb() {
        let handler = create_handler();
        assert_eq!(exec(&handler, &["DBSIZE"]), Reply::integer(0));
        exec(&handler, &["SET", "key1", "v"]);
        exec(&handler, &["ZADD", "zset1", "1", "one"]);
        assert_eq!(exec(&handler, &["DBSIZE"]), Reply::integer(2));

        assert_eq!(exec(&handler, &["FLUSHDB"]), Reply::ok());
        assert_eq!(exec(&handler, &["DBSIZE"]), Reply::integer(0));
    }

    #[test]
    fn zadd_counts_new_members() {
        let handler = create_handler();
        assert_eq!(
            exec(&handler, &["ZADD", "zset1", "1", "one", "2", "two", "3", "three"]),
            Reply::integer(3)
        );
        // Update contributes 0, the new pair contributes 1.
        assert_eq!(
            exec(&handler, &["ZADD", "zset1", "10", "one", "4", "four"]),
            Reply::integer(1)
        );
        assert_eq!(
            exec(&handler, &["ZSCORE", "zset1", "one"]),
            Reply::bulk("10.000000")
        );
    }

    #[test]
    fn zadd_rejects_bad_scores() {
        let handler = create_handler();
        assert!(exec(&handler, &["ZADD", "z", "abc", "m"]).is_error());
        assert!(exec(&handler, &["ZADD", "z", "nan", "m"]).is_error());
        assert!(exec(&handler, &["ZADD", "z", "inf", "m"]).is_error());
        // A bad second pair must not apply the first one.
        assert!(exec(&handler, &["ZADD", "z", "1", "a", "oops", "b"]).is_error());
        assert_eq!(exec(&handler, &["ZCARD", "z"]), Reply::integer(0));
        // Odd pair tail is an arity error.
        assert!(exec(&handler, &["ZADD", "z", "1", "a", "2"]).is_error());
    }

    #[test]
    fn zscore_formats_six_decimals() {
        let handler = create_handler();
        exec(&handler, &["ZADD", "zset1", "1", "one", "-3.5", "neg"]);
        assert_eq!(
            exec(&handler, &["ZSCORE", "zset1", "one"]),
            Reply::bulk("1.000000")
        );
        assert_eq!(
            exec(&handler, &["ZSCORE", "zset1", "neg"]),
            Reply::bulk("-3.500000")
        );
        assert_eq!(exec(&handler, &["ZSCORE", "zset1", "missing"]), Reply::null());
        assert_eq!(exec(&handler, &["ZSCORE", "missing", "one"]), Reply::null());
    }

    #[test]
    fn zrem_and_collapse() {
        let handler = create_handler();
        exec(&handler, &["ZADD", "zset1", "1", "one", "2", "two"]);
        assert_eq!(
            exec(&handler, &["ZREM", "zset1", "one", "ghost"]),
            Reply::integer(1)
        );
        assert_eq!(exec(&handler, &["ZCARD", "zset1"]), Reply::integer(1));

        assert_eq!(exec(&handler, &["ZREM", "zset1", "two"]), Reply::integer(1));
        assert_eq!(exec(&handler, &["ZCARD", "zset1"]), Reply::integer(0));
        assert_eq!(exec(&handler, &["EXISTS", "zset1"]), Reply::integer(0));
    }

    #[test]
    fn zrank_and_missing() {
        let handler = create_handler();
        exec(&handler, &["ZADD", "zset1", "1", "one", "2", "two", "3", "three"]);
        assert_eq!(exec(&handler, &["ZRANK", "zset1", "one"]), Reply::integer(0));
        assert_eq!(exec(&handler, &["ZRANK", "zset1", "three"]), Reply::integer(2));
        assert_eq!(exec(&handler, &["ZRANK", "zset1", "nope"]), Reply::null());
        assert_eq!(exec(&handler, &["ZRANK", "nokey", "one"]), Reply::null());
    }

    #[test]
    fn zrange_plain_and_negative() {
        let handler = create_handler();
        exec(&handler, &["ZADD", "zset1", "1", "one", "2", "two", "3", "three"]);
        assert_eq!(
            exec(&handler, &["ZRANGE", "zset1", "0", "1"]),
            Reply::array(vec![Bytes::from("one"), Bytes::from("two")])
        );
        assert_eq!(
            exec(&handler, &["ZRANGE", "zset1", "0", "-1"]),
            Reply::array(vec![
                Bytes::from("one"),
                Bytes::from("two"),
                Bytes::from("three")
            ])
        );
        assert_eq!(
            exec(&handler, &["ZRANGE", "zset1", "5", "9"]),
            Reply::array(vec![])
        );
        assert_eq!(exec(&handler, &["ZRANGE", "missing", "0", "-1"]), Reply::array(vec![]));
    }

    #[test]
    fn zrange_withscores_interleaves() {
        let handler = create_handler();
        exec(&handler, &["ZADD", "zset1", "1", "one", "2", "two", "3", "three"]);
        assert_eq!(
            exec(&handler, &["ZRANGE", "zset1", "0", "1", "WITHSCORES"]),
            Reply::array(vec![
                Bytes::from("one"),
                Bytes::from("1.000000"),
                Bytes::from("two"),
                Bytes::from("2.000000"),
            ])
        );
        // Option token is case-insensitive; anything else is a syntax
        // error.
        assert_eq!(
            exec(&handler, &["ZRANGE", "zset1", "0", "0", "withscores"]),
            Reply::array(vec![Bytes::from("one"), Bytes::from("1.000000")])
        );
        assert!(exec(&handler, &["ZRANGE", "zset1", "0", "1", "SCORES"]).is_error());
        assert!(exec(&handler, &["ZRANGE", "zset1", "zero", "1"]).is_error());
    }

    #[test]
    fn zrangebyscore_inclusive() {
        let handler = create_handler();
        exec(&handler, &["ZADD", "zset1", "1", "one", "2", "two", "3", "three"]);
        assert_eq!(
            exec(&handler, &["ZRANGEBYSCORE", "zset1", "1", "2"]),
            Reply::array(vec![Bytes::from("one"), Bytes::from("two")])
        );
        assert_eq!(
            exec(&handler, &["ZRANGEBYSCORE", "zset1", "1.5", "2.5"]),
            Reply::array(vec![Bytes::from("two")])
        );
        assert_eq!(
            exec(&handler, &["ZRANGEBYSCORE", "zset1", "3", "1"]),
            Reply::array(vec![])
        );
        assert!(exec(&handler, &["ZRANGEBYSCORE", "zset1", "low", "2"]).is_error());
    }

    #[test]
    fn zrangebyscore_withscores() {
        let handler = create_handler();
        exec(&handler, &["ZADD", "zset1", "1", "one", "2", "two", "3", "three"]);
        assert_eq!(
            exec(&handler, &["ZRANGEBYSCORE", "zset1", "1", "3", "WITHSCORES"]),
            Reply::array(vec![
                Bytes::from("one"),
                Bytes::from("1.000000"),
                Bytes::from("two"),
                Bytes::from("2.000000"),
                Bytes::from("three"),
                Bytes::from("3.000000"),
            ])
        );
    }

    #[test]
    fn wrong_variant_is_type_error() {
        let handler = create_handler();
        exec(&handler, &["SET", "s", "v"]);
        exec(&handler, &["ZADD", "z", "1", "m"]);

        assert_eq!(exec(&handler, &["GET", "z"]), Reply::wrong_type());
        assert_eq!(exec(&handler, &["ZADD", "s", "1", "m"]), Reply::wrong_type());
        assert_eq!(exec(&handler, &["ZSCORE", "s", "m"]), Reply::wrong_type());
        assert_eq!(exec(&handler, &["ZCARD", "s"]), Reply::wrong_type());
        assert_eq!(exec(&handler, &["ZRANK", "s", "m"]), Reply::wrong_type());
        assert_eq!(exec(&handler, &["ZRANGE", "s", "0", "-1"]), Reply::wrong_type());
        assert_eq!(
            exec(&handler, &["ZRANGEBYSCORE", "s", "0", "1"]),
            Reply::wrong_type()
        );
        assert_eq!(exec(&handler, &["ZREM", "s", "m"]), Reply::wrong_type());
    }

    #[test]
    fn unknown_and_empty_commands() {
        let handler = create_handler();
        assert_eq!(
            exec(&handler, &["BOGUS"]),
            Reply::error("ERR unknown command 'bogus'")
        );
        assert_eq!(
            handler.execute(&Request { tokens: vec![] }),
            Reply::error("ERR empty command")
        );
    }

    #[test]
    fn rank_matches_full_range_order() {
        let handler = create_handler();
        exec(
            &handler,
            &["ZADD", "z", "2", "b", "1", "a", "2", "aa", "3", "c"],
        );
        let all = match exec(&handler, &["ZRANGE", "z", "0", "-1"]) {
            Reply::Array(items) => items,
            other => panic!("unexpected reply: {:?}", other),
        };
        for (i, member) in all.iter().enumerate() {
            let member = std::str::from_utf8(member).unwrap();
            assert_eq!(
                exec(&handler, &["ZRANK", "z", member]),
                Reply::integer(i as i64)
            );
        }
    }
}
