//! Queries.

use crate::base::prefix::Prefix;
use crate::base::token::Token;
use crate::object::ObjectType;
use core::fmt;

//------------ QueryOption ---------------------------------------------------

/// A preference a querier can express about how to answer.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum QueryOption {
    /// Minimise end-to-end latency.
    MinE2eLatency,

    /// Minimise the size of the last-hop answer.
    MinLastHopAnswerSize,

    /// Minimise information leakage towards other parties.
    MinInfoLeakage,

    /// Only answer from the cache, never recurse.
    CachedAnswersOnly,

    /// Expired assertions are acceptable in the answer.
    ExpiredAssertionsOk,

    /// Enable token tracing across the query path.
    TokenTracing,

    /// Do not verify the delegation chain on behalf of the querier.
    NoVerificationDelegation,

    /// Do not proactively cache beyond the answer.
    NoProactiveCaching,
}

impl QueryOption {
    /// Returns the numeric code of the option.
    pub fn code(self) -> u8 {
        match self {
            QueryOption::MinE2eLatency => 1,
            QueryOption::MinLastHopAnswerSize => 2,
            QueryOption::MinInfoLeakage => 3,
            QueryOption::CachedAnswersOnly => 4,
            QueryOption::ExpiredAssertionsOk => 5,
            QueryOption::TokenTracing => 6,
            QueryOption::NoVerificationDelegation => 7,
            QueryOption::NoProactiveCaching => 8,
        }
    }

    /// Returns the option for a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(QueryOption::MinE2eLatency),
            2 => Some(QueryOption::MinLastHopAnswerSize),
            3 => Some(QueryOption::MinInfoLeakage),
            4 => Some(QueryOption::CachedAnswersOnly),
            5 => Some(QueryOption::ExpiredAssertionsOk),
            6 => Some(QueryOption::TokenTracing),
            7 => Some(QueryOption::NoVerificationDelegation),
            8 => Some(QueryOption::NoProactiveCaching),
            _ => None,
        }
    }
}

impl fmt::Display for QueryOption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

//------------ Query ---------------------------------------------------------

/// A question about a name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Query {
    /// The context the question is asked in.
    pub context: String,

    /// The fully qualified name the question is about.
    pub name: String,

    /// The object type asked for.
    pub query_type: ObjectType,

    /// When the querier stops caring, in Unix seconds.
    pub expires: i64,

    /// The token answers must carry.
    pub token: Token,

    /// The querier's preferences.
    pub options: Vec<QueryOption>,
}

impl Query {
    /// Returns whether the query has expired at `now`.
    pub fn expired(&self, now: i64) -> bool {
        self.expires < now
    }

    /// Returns whether the given option was requested.
    pub fn has_option(&self, option: QueryOption) -> bool {
        self.options.contains(&option)
    }
}

//------------ AddressQuery --------------------------------------------------

/// A question about an address prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddressQuery {
    /// The prefix the question is about.
    pub subject_addr: Prefix,

    /// The context the question is asked in.
    pub context: String,

    /// The object type asked for.
    pub query_type: ObjectType,

    /// When the querier stops caring, in Unix seconds.
    pub expires: i64,

    /// The token answers must carry.
    pub token: Token,

    /// The querier's preferences.
    pub options: Vec<QueryOption>,
}

impl AddressQuery {
    /// Returns whether the query has expired at `now`.
    pub fn expired(&self, now: i64) -> bool {
        self.expires < now
    }
}
