// Error codes shared by every error raised while building, parsing or resolving
// collection configurations. The numbering follows the gRPC status codes so that
// callers mapping them onto a transport keep a stable meaning.
// https://grpc.github.io/grpc/core/md_doc_statuscodes.html
use std::error::Error;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum ErrorCodes {
    // UNKNOWN indicates an unknown error.
    Unknown = 2,
    // INVALID_ARGUMENT indicates the caller supplied an invalid argument or malformed wire data.
    InvalidArgument = 3,
    // NOT_FOUND means a requested entity (e.g. a collection) was not found.
    NotFound = 5,
    // FAILED_PRECONDITION indicates the operation was rejected because a dependency
    // (e.g. an embedding provider's credentials) is not in the required state.
    FailedPrecondition = 9,
    // INTERNAL errors are internal errors.
    Internal = 13,
    // UNAVAILABLE indicates the remote service could not be reached.
    Unavailable = 14,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::NotFound => "NotFoundError",
            ErrorCodes::FailedPrecondition => "FailedPreconditionError",
            ErrorCodes::Internal => "InternalError",
            ErrorCodes::Unavailable => "UnavailableError",
            ErrorCodes::Unknown => "ChromaError",
        }
    }
}

pub trait ChromaError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn ChromaError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl Error for Box<dyn ChromaError> {}

impl ChromaError for Box<dyn ChromaError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Rejected;

    impl fmt::Display for Rejected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "rejected")
        }
    }

    impl Error for Rejected {}

    impl ChromaError for Rejected {
        fn code(&self) -> ErrorCodes {
            ErrorCodes::InvalidArgument
        }
    }

    #[test]
    fn boxed_error_keeps_code() {
        let boxed = Rejected.boxed();
        assert_eq!(boxed.code(), ErrorCodes::InvalidArgument);
        assert_eq!(boxed.code().name(), "InvalidArgumentError");
        assert_eq!(boxed.to_string(), "rejected");
    }
}
