use crate::gatt::error::GattError;
use std::{error, fmt};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorType {
    Attribute,
    Advertising,
    Connection,
    Platform,
    ChannelError,
}

impl From<ErrorType> for &'static str {
    fn from(error_type: ErrorType) -> &'static str {
        match error_type {
            ErrorType::Attribute => "Attribute",
            ErrorType::Advertising => "Advertising",
            ErrorType::Connection => "Connection",
            ErrorType::Platform => "Platform",
            ErrorType::ChannelError => "ChannelError",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(self: &Self, f: &mut fmt::Formatter) -> fmt::Result {
        let error_type: &str = self.clone().into();
        write!(f, "<BlePeripheralEmulator {} Error>", error_type)
    }
}

impl error::Error for ErrorType {}

#[derive(Debug, Clone)]
pub struct Error {
    name: String,
    description: String,
    error_type: ErrorType,
}

impl Error {
    pub fn new<T: Into<String>>(name: T, description: T, error_type: ErrorType) -> Self {
        Error {
            name: name.into(),
            description: description.into(),
            error_type,
        }
    }

    pub fn from_type(error_type: ErrorType) -> Self {
        let name: String = error_type.to_string();
        Error {
            description: name.clone(),
            name,
            error_type,
        }
    }

    pub fn from_string(error: String, error_type: ErrorType) -> Self {
        Error {
            name: error_type.to_string(),
            description: error,
            error_type,
        }
    }

    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Error {
    fn fmt(self: &Self, f: &mut fmt::Formatter) -> fmt::Result {
        let error_type: &str = self.error_type.clone().into();
        write!(
            f,
            "**BlePeripheralEmulator {} Error**\n\n\t{}:\n\t\t{}",
            error_type, self.name, self.description,
        )
    }
}

impl error::Error for Error {
    fn source(self: &Self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.error_type)
    }
}

impl From<GattError> for Error {
    fn from(err: GattError) -> Self {
        let error_type = match err {
            GattError::AttributeNotFound
            | GattError::ReadNotPermitted
            | GattError::WriteNotPermitted
            | GattError::InvalidOffset { .. }
            | GattError::ValueTooLarge { .. }
            | GattError::MalformedDescriptorValue => ErrorType::Attribute,
            GattError::UnknownConnection(_) => ErrorType::Connection,
            GattError::AdvertisingAlreadyActive | GattError::AdvertisingFailure(_) => {
                ErrorType::Advertising
            }
        };
        Error::from_string(err.to_string(), error_type)
    }
}

impl<T> From<mpsc::error::SendError<T>> for Error {
    fn from(err: mpsc::error::SendError<T>) -> Self {
        Error::from_string(err.to_string(), ErrorType::ChannelError)
    }
}

impl From<oneshot::error::RecvError> for Error {
    fn from(err: oneshot::error::RecvError) -> Self {
        Error::from_string(err.to_string(), ErrorType::ChannelError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::peer::PeerId;

    #[test]
    fn gatt_errors_keep_their_category() {
        let err: Error = GattError::UnknownConnection(PeerId::from("AA:BB")).into();
        assert_eq!(err.error_type(), &ErrorType::Connection);
        assert!(err.description().contains("AA:BB"));

        let err: Error = GattError::AdvertisingAlreadyActive.into();
        assert_eq!(err.error_type(), &ErrorType::Advertising);
    }

    #[test]
    fn display_names_the_category() {
        let err = Error::from_type(ErrorType::ChannelError);
        assert!(err.to_string().contains("ChannelError"));
    }
}
