use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io;
use std::ops::Deref;
use std::panic::Location;

/// Broad class of a decode failure.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or truncated input.
    #[default]
    Invalid,
    /// The underlying read, seek or write reported a failure.
    Io,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Invalid => write!(f, "Invalid input"),
            ErrorKind::Io => write!(f, "I/O error"),
        }
    }
}

#[derive(Debug)]
pub struct GlzError {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub context: Option<String>,
    pub source: Option<Box<dyn Error + Send + Sync>>,
    pub location: &'static Location<'static>,
}

pub type Res<T> = Result<T, GlzError>;

impl GlzError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_invalid(&self) -> bool {
        self.kind == ErrorKind::Invalid
    }

    /// Malformed input, for [`ByteSource`](crate::ByteSource) implementations
    /// outside this crate.
    #[track_caller]
    pub fn invalid(message: impl Into<String>) -> Self {
        GlzError::from(ErrorBuilder {
            message: Some(message.into()),
            ..Default::default()
        })
    }

    /// A failed device read. `UnexpectedEof` means the blob is cut short and
    /// becomes [`ErrorKind::Invalid`]; anything else is kept as
    /// [`ErrorKind::Io`] and handed back by [`GlzError::into_io`].
    #[track_caller]
    pub fn io(err: io::Error) -> Self {
        GlzError::from(ErrorBuilder::io(err))
    }

    /// Recovers the `io::Error` reported by the injected reader or writer.
    ///
    /// Errors of kind [`ErrorKind::Io`] hand back the original error as it was
    /// returned by the collaborator. Anything else becomes `InvalidData`.
    pub fn into_io(mut self) -> io::Error {
        if self.kind == ErrorKind::Io {
            let mut source = self.source.take();
            while let Some(err) = source {
                source = match err.downcast::<io::Error>() {
                    Ok(err) => return *err,
                    Err(err) => match err.downcast::<GlzError>() {
                        Ok(mut inner) => inner.source.take(),
                        Err(_) => None,
                    },
                };
            }
        }
        io::Error::new(io::ErrorKind::InvalidData, self)
    }
}

impl Error for GlzError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.source {
            Some(ref err) => Some(err.deref()),
            None => None,
        }
    }
}

impl Display for GlzError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on line {}", self.kind, self.location)?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?
        }
        if let Some(cause) = &self.source {
            write!(f, "\ncaused by {}", cause)?
        }
        Ok(())
    }
}

impl From<GlzError> for io::Error {
    fn from(value: GlzError) -> Self {
        value.into_io()
    }
}

impl From<ErrorBuilder> for GlzError {
    #[track_caller]
    fn from(
        ErrorBuilder {
            kind,
            message,
            context,
            source,
        }: ErrorBuilder,
    ) -> Self {
        let location = Location::caller();
        log::warn!(
            "{}: {} {}",
            location,
            kind,
            message.as_deref().unwrap_or_default()
        );
        Self {
            kind,
            message,
            context,
            source,
            location,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ErrorBuilder {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub context: Option<String>,
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl ErrorBuilder {
    /// Classifies a failure of the injected reader, seeker or writer. Running
    /// off the end of a stream means the blob is truncated, everything else is
    /// the device's problem and is passed through.
    pub fn io(err: io::Error) -> Self {
        ErrorBuilder {
            kind: match err.kind() {
                io::ErrorKind::UnexpectedEof => ErrorKind::Invalid,
                _ => ErrorKind::Io,
            },
            source: Some(Box::new(err)),
            ..Default::default()
        }
    }

    /// Failure of the output sink. Always `Io`, whatever its kind.
    pub fn write(err: io::Error) -> Self {
        ErrorBuilder {
            kind: ErrorKind::Io,
            source: Some(Box::new(err)),
            ..Default::default()
        }
    }
}

pub(crate) trait ResultBuilder<T>: Sized {
    fn message<F: FnOnce(Option<&str>) -> String>(self, msg: F) -> Result<T, ErrorBuilder>;
    fn msg_of<M: Debug>(self, msg: &M) -> Result<T, ErrorBuilder> {
        self.message(|_| format!("{:?}", msg))
    }
}

impl<T> ResultBuilder<T> for Result<T, ErrorBuilder> {
    fn message<F: FnOnce(Option<&str>) -> String>(self, msg: F) -> Self {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(ErrorBuilder {
                message: Some(msg(e.message.as_deref())),
                ..e
            }),
        }
    }
}

impl<T> ResultBuilder<T> for Option<T> {
    fn message<F: FnOnce(Option<&str>) -> String>(self, msg: F) -> Result<T, ErrorBuilder> {
        match self {
            Some(v) => Ok(v),
            None => Err(ErrorBuilder {
                message: Some(msg(None)),
                ..Default::default()
            }),
        }
    }
}

pub(crate) trait WithContext<T, C: ErrorContext> {
    fn at(self, context: &C) -> Result<T, ErrorBuilder>;
}

impl<T, C: ErrorContext> WithContext<T, C> for Res<T> {
    fn at(self, context: &C) -> Result<T, ErrorBuilder> {
        self.map_err(|e| ErrorBuilder {
            kind: e.kind,
            context: context.describe(),
            source: Some(Box::new(e)),
            ..Default::default()
        })
    }
}

impl<T, C: ErrorContext> WithContext<T, C> for io::Result<T> {
    fn at(self, context: &C) -> Result<T, ErrorBuilder> {
        self.map_err(|e| ErrorBuilder {
            context: context.describe(),
            ..ErrorBuilder::io(e)
        })
    }
}

pub(crate) trait ErrorContext {
    fn describe(&self) -> Option<String> {
        None
    }

    fn raise<T>(&self, msg: String) -> Result<T, ErrorBuilder> {
        Err(ErrorBuilder {
            message: Some(msg),
            context: self.describe(),
            ..Default::default()
        })
    }

    fn assert(&self, v: bool, msg: &str) -> Result<(), ErrorBuilder> {
        if v {
            Ok(())
        } else {
            self.raise(msg.into())
        }
    }

    fn assert_le<T: PartialOrd + Display>(&self, l: T, r: T) -> Result<(), ErrorBuilder> {
        if l <= r {
            Ok(())
        } else {
            self.raise(format!("Expected {} <= {}", l, r))
        }
    }

    fn assert_lt<T: PartialOrd + Display>(&self, l: T, r: T) -> Result<(), ErrorBuilder> {
        if l < r {
            Ok(())
        } else {
            self.raise(format!("Expected {} < {}", l, r))
        }
    }
}
