use crate::domain::Plan;

/// Core error type for the bot.
///
/// Adapter crates map their specific failures into this type so handlers can
/// turn any error into a user-facing reply.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not fetch URL (Status: {status})")]
    Http { status: u16 },

    #[error(
        "File too large ({:.1}MB). {} tier limit is {:.1}MB.",
        mib(*size),
        plan.label(),
        mib(*limit)
    )]
    FileTooLarge { size: u64, limit: u64, plan: Plan },

    #[error("Not enough content found to summarize")]
    NotEnoughContent,

    #[error("Summarization services temporarily unavailable. Please try again later.")]
    Summarization,

    #[error("{0}")]
    External(String),
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_too_large_reads_like_a_reply() {
        let err = Error::FileTooLarge {
            size: 75 * 1024 * 1024,
            limit: 50 * 1024 * 1024,
            plan: Plan::Free,
        };
        assert_eq!(
            err.to_string(),
            "File too large (75.0MB). Free tier limit is 50.0MB."
        );
    }

    #[test]
    fn http_status_is_reported() {
        assert_eq!(
            Error::Http { status: 404 }.to_string(),
            "Could not fetch URL (Status: 404)"
        );
    }
}
