use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(FileStatus {
    Pending => "pending",
    Uploading => "uploading",
    Processing => "processing",
    Completed => "completed",
    Error => "error",
});

str_enum!(MarkerFlag {
    High => "High",
    Low => "Low",
    None => "None",
});

str_enum!(ErrorKind {
    ValidationFailed => "VALIDATION_FAILED",
    UploadFailed => "UPLOAD_FAILED",
    NetworkError => "NETWORK_ERROR",
    Offline => "OFFLINE",
    MarkerExtractionFailed => "MARKER_EXTRACTION_FAILED",
    InvalidDate => "INVALID_DATE",
    SessionExpired => "SESSION_EXPIRED",
});

str_enum!(SaveStatus {
    Saved => "saved",
    Failed => "failed",
    Skipped => "skipped",
});

impl FileStatus {
    /// Terminal states: no transmission is in flight.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl Default for MarkerFlag {
    fn default() -> Self {
        Self::None
    }
}

impl ErrorKind {
    /// Connectivity problems the caller can offer a reconnect for.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Offline)
    }
}
