use std::convert::From;
use std::error;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

#[derive(Debug)]
pub enum ErrorKind {
    Config,
    Timezone,
    Fetch,
    HttpStatus(u16),
    Payload,
    FeedParse,
    DateParse,
    ParseError,
    Font,
    Image,
    IOError(io::Error),
}

impl Error {
    pub fn new(kind: ErrorKind, msg: &str) -> Self {
        Error {
            kind,
            message: Some(msg.to_owned()),
        }
    }

    pub fn with_msg(mut self, message: &str) -> Self {
        self.message = Some(message.to_owned());
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            kind,
            message: None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(io_error: io::Error) -> Error {
        Error::from(ErrorKind::IOError(io_error))
    }
}

impl From<chrono::ParseError> for Error {
    fn from(parse_error: chrono::ParseError) -> Error {
        Error::new(
            ErrorKind::DateParse,
            &format!("Could not parse date: {}", parse_error),
        )
    }
}

impl<E: fmt::Debug> From<nom::Err<E>> for Error {
    fn from(error: nom::Err<E>) -> Self {
        Error::new(
            ErrorKind::ParseError,
            &format!("Error while parsing: {:?}", error),
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Error::new(ErrorKind::HttpStatus(status.as_u16()), &error.to_string()),
            None => Error::new(ErrorKind::Fetch, &error.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::new(ErrorKind::Payload, &error.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::new(ErrorKind::Config, &error.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(error: image::ImageError) -> Self {
        Error::new(ErrorKind::Image, &error.to_string())
    }
}

impl From<ical::parser::ParserError> for Error {
    fn from(error: ical::parser::ParserError) -> Self {
        Error::new(ErrorKind::FeedParse, &error.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        if let ErrorKind::IOError(err) = err.kind {
            err
        } else {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                err.message.unwrap_or_else(|| "invalid input".to_owned()),
            )
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.kind.as_str(), msg),
            None => write!(f, "{}", self.kind.as_str()),
        }
    }
}

impl error::Error for Error {}

impl ErrorKind {
    pub fn as_str(&self) -> String {
        match self {
            ErrorKind::Config => "invalid configuration".to_owned(),
            ErrorKind::Timezone => "unknown timezone".to_owned(),
            ErrorKind::Fetch => "request failed".to_owned(),
            ErrorKind::HttpStatus(code) => format!("server answered with status {}", code),
            ErrorKind::Payload => "malformed response payload".to_owned(),
            ErrorKind::FeedParse => "invalid calendar feed".to_owned(),
            ErrorKind::DateParse => "invalid date format".to_owned(),
            ErrorKind::ParseError => "invalid format".to_owned(),
            ErrorKind::Font => "unusable font".to_owned(),
            ErrorKind::Image => "image error".to_owned(),
            ErrorKind::IOError(err) => err.to_string(),
        }
    }
}
