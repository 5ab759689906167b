//! Waiting for specific replies, e.g. the 353/366 pair after a NAMES.
//!
//! Lines that arrive while waiting but are not among the expected tokens
//! are put back for the event loop once the wait is over. They are read
//! next, in arrival order, ahead of lines framed after them.

use crate::error::Result;
use crate::irc::dispatch::{protocol_error, reply_token, rest_after, strip_colon};
use crate::irc::engine::Engine;
use tracing::{debug, trace};

/// How [`Engine::expect`] treats the wire while it waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectOptions {
    /// Wait for the transport. When false, give up as soon as nothing is
    /// immediately available.
    pub blocking: bool,
    /// Drop the source prefix from the returned reply.
    pub strip_leading_token: bool,
    /// Remove one leading `:` from the last field.
    pub strip_colon: bool,
    /// Keep waiting past unexpected lines instead of returning the default.
    pub ignore_unexpected: bool,
}

impl Default for ExpectOptions {
    fn default() -> Self {
        Self {
            blocking: true,
            strip_leading_token: true,
            strip_colon: false,
            ignore_unexpected: true,
        }
    }
}

impl ExpectOptions {
    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn keep_source(mut self) -> Self {
        self.strip_leading_token = false;
        self
    }

    pub fn strip_colon(mut self) -> Self {
        self.strip_colon = true;
        self
    }

    pub fn fail_fast(mut self) -> Self {
        self.ignore_unexpected = false;
        self
    }
}

/// A matched line split into its leading fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// The `:source` prefix, unless it was stripped.
    pub source: Option<String>,
    pub token: String,
    pub target: Option<String>,
    /// Everything after the target, spacing preserved.
    pub rest: Option<String>,
}

impl Reply {
    pub fn parse(line: &str, options: ExpectOptions) -> Self {
        let prefixed = line.starts_with(':');
        let mut fields = line.split_whitespace();
        let source = if prefixed { fields.next() } else { None };
        let token = fields.next().unwrap_or_default();
        let target = fields.next();
        let rest = rest_after(line, usize::from(prefixed) + 2);

        let mut reply = Reply {
            source: source
                .filter(|_| !options.strip_leading_token)
                .map(str::to_string),
            token: token.to_string(),
            target: target.map(str::to_string),
            rest: (!rest.is_empty()).then(|| rest.to_string()),
        };
        if options.strip_colon {
            let last = reply.rest.as_mut().or(reply.target.as_mut());
            if let Some(last) = last {
                *last = strip_colon(last).to_string();
            }
        }
        reply
    }

    /// The fields in wire order.
    pub fn fields(&self) -> Vec<&str> {
        [
            self.source.as_deref(),
            Some(self.token.as_str()),
            self.target.as_deref(),
            self.rest.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl Engine {
    /// Consume lines until one classified by a token in `tokens` arrives.
    ///
    /// A numeric error reply ends the wait with a typed error. `Ok(None)`
    /// means the wait gave up: nothing was immediately readable in
    /// non-blocking mode, or an unexpected line arrived in fail-fast mode
    /// (that line stays unread).
    pub fn expect(&mut self, tokens: &[&str], options: ExpectOptions) -> Result<Option<Reply>> {
        let mut deferred = Vec::new();
        let outcome = self.wait_for(tokens, options, &mut deferred);
        if !deferred.is_empty() {
            debug!(count = deferred.len(), "Re-queuing lines received while waiting");
            self.requeue(deferred);
        }
        outcome
    }

    fn wait_for(
        &mut self,
        tokens: &[&str],
        options: ExpectOptions,
        deferred: &mut Vec<String>,
    ) -> Result<Option<Reply>> {
        loop {
            let line = if options.blocking {
                self.consume()?
            } else {
                match self.try_consume()? {
                    Some(line) => line,
                    None => return Ok(None),
                }
            };
            if let Some(err) = protocol_error(&line) {
                return Err(err.into());
            }
            let token = reply_token(&line).unwrap_or_default();
            if tokens.contains(&token) {
                trace!(token, "Expected reply arrived");
                return Ok(Some(Reply::parse(&line, options)));
            }
            if !options.ignore_unexpected {
                self.stepback();
                return Ok(None);
            }
            deferred.push(line);
        }
    }
}
