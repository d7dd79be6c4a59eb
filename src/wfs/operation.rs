/// WFS request operations the proxy knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    GetCapabilities,
    DescribeFeatureType,
    GetFeature,
    GetPropertyValue,
    GetFeatureWithLock,
    LockFeature,
    Transaction,
    Other(String),
}

/// What the proxy does with an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Metadata only, forwarded untouched
    PassThrough,
    /// Forwarded with the identity filter injected
    Rewrite,
    Deny,
    Unsupported,
}

impl Operation {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "getcapabilities" => Operation::GetCapabilities,
            "describefeaturetype" => Operation::DescribeFeatureType,
            "getfeature" => Operation::GetFeature,
            "getpropertyvalue" => Operation::GetPropertyValue,
            "getfeaturewithlock" => Operation::GetFeatureWithLock,
            "lockfeature" => Operation::LockFeature,
            "transaction" => Operation::Transaction,
            _ => Operation::Other(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Operation::GetCapabilities => "GetCapabilities",
            Operation::DescribeFeatureType => "DescribeFeatureType",
            Operation::GetFeature => "GetFeature",
            Operation::GetPropertyValue => "GetPropertyValue",
            Operation::GetFeatureWithLock => "GetFeatureWithLock",
            Operation::LockFeature => "LockFeature",
            Operation::Transaction => "Transaction",
            Operation::Other(name) => name,
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Operation::GetCapabilities | Operation::DescribeFeatureType => Access::PassThrough,
            Operation::GetFeature => Access::Rewrite,
            // Locks and transactions could touch other users' observations
            Operation::GetPropertyValue
            | Operation::GetFeatureWithLock
            | Operation::LockFeature
            | Operation::Transaction => Access::Deny,
            Operation::Other(_) => Access::Unsupported,
        }
    }
}
