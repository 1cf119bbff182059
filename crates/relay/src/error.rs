use std::fmt;

#[derive(Debug)]
pub enum RelayError {
    Com(com::ComError),
    Image(image::ImageError),
    Detect(String),
    Config(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Com(err) => write!(f, "com error: {err}"),
            RelayError::Image(err) => write!(f, "image error: {err}"),
            RelayError::Detect(msg) => write!(f, "detection error: {msg}"),
            RelayError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<com::ComError> for RelayError {
    fn from(err: com::ComError) -> Self {
        RelayError::Com(err)
    }
}

impl From<image::ImageError> for RelayError {
    fn from(err: image::ImageError) -> Self {
        RelayError::Image(err)
    }
}
