use std::fmt::Display;

/// 百望接口返回的业务错误码与错误信息
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub code: String,
    pub message: String,
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{code: {}, msg: {}}}", self.code, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Transport(#[from] ureq::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("business rejection: {0}")]
    Business(Rejection),
    #[error("authentication failed: {0}")]
    Authentication(Box<Error>),
    #[error("encoding failed: {0}")]
    Encoding(String),
    #[error(transparent)]
    Base64(#[from] base64ct::Error),
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error("unsupported charset: {0}")]
    UnsupportedCharset(String),
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn business<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Error::Business(Rejection {
            code: code.into(),
            message: message.into(),
        })
    }

    /// 业务拒绝时返回百望给出的错误信息
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Error::Business(r) => Some(r),
            Error::Authentication(inner) => inner.rejection(),
            _ => None,
        }
    }
}

pub type BaiwangResult<T> = std::result::Result<T, Error>;
