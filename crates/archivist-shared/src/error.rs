use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventError {
    #[error("Event field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("Text channel {0} has no guild")]
    MissingGuild(String),

    #[error("Malformed revision id `{0}`: expected <messageId>_<timestamp>")]
    MalformedRevisionId(String),
}
