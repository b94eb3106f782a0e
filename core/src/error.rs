use std::fmt::Display;

use derive_builder::UninitializedFieldError;
use thiserror::Error;

use crate::ContentType;

fn maybe_space_name<T: Display>(opt: &Option<T>) -> String {
    match opt {
        Some(s) => format!(" `{s}`"),
        None => "".into(),
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0} name is empty.")]
    NameEmpty(&'static str),

    #[error("Name `{0}` includes invalid character `{1}`.")]
    NameInvalidChar(String, char),

    #[error("{0} with name `{1}` already exists.")]
    NameAlreadyExists(&'static str, String),

    #[error("Value `{1}` is not representable as `{0:?}`.")]
    ValueOutOfRange(ContentType, String),

    #[error("Array content of type `{0:?}` must hold at least one value.")]
    EmptyArray(ContentType),

    #[error("Min/max/dataset content of element{} does not match the element's type or array size.", maybe_space_name(.0))]
    ContentLayoutMismatch(Option<String>),

    #[error("Dataset `{1}` of list `{0}` holds {3} values, expected one per element ({2}).")]
    DatasetLengthMismatch(String, String, usize, usize),

    #[error("Scaling of element `{0}` is not a finite number.")]
    ScalingNotFinite(String),

    #[error("Value of element `{0}` lies outside its min/max bounds.")]
    ValueOutOfBounds(String),

    #[error("{0} index {1} does not exist.")]
    DanglingIndex(&'static str, u32),

    #[error("Signal in message `{0}` references list {1}, expected list {2} for its interface and direction.")]
    SignalListMismatch(String, u32, u32),

    #[error("Signal at bit {1} with length {2} does not fit into message `{0}` (DLC {3}).")]
    SignalWillNotFitInMessage(String, u16, u16, u8),

    #[error("Message `{0}` has DLC {1}; maximum is 8.")]
    DlcTooLarge(String, u8),

    #[error("Message `{0}` has ID 0x{1:x}, which does not fit its identifier format.")]
    CanIdOutOfRange(String, u32),

    #[error("Protocol `{0}` references data pool `{1}`, which is not a COM data pool.")]
    ProtocolDataPoolNotCom(String, String),

    #[error("More than one `{0}` protocol in node.")]
    ProtocolAlreadyExists(String),

    #[error("PDO message `{0}` on interface {1} references CANopen device {2}, which the manager does not know.")]
    UnknownCanOpenDevice(String, u8, u8),

    #[error("HALC struct `{0}` must define either a value or sub-elements, and every HALC value must be scalar.")]
    HalcStructDefinition(String),

    #[error("HALC channel `{0}` holds {1} parameter values, expected {2}.")]
    HalcParameterCount(String, usize, usize),

    #[error("Missing required field `{0}`")]
    UninitializedFieldError(String),
}

// For getting ModelError from builder .build() methods
impl From<UninitializedFieldError> for ModelError {
    fn from(uf: UninitializedFieldError) -> Self {
        Self::UninitializedFieldError(uf.field_name().into())
    }
}

/// Check validity of a model name - it should not be empty and should
/// contain a limited set of characters - `[a-zA-Z0-9_]`, since names end up
/// in C identifiers.
pub(crate) fn check_name_validity(kind: &'static str, name: &str) -> Result<(), ModelError> {
    if name.is_empty() {
        return Err(ModelError::NameEmpty(kind));
    }

    if let Some(c) = name
        .chars()
        .find(|c| (!c.is_ascii_alphanumeric()) && c != &'_')
    {
        return Err(ModelError::NameInvalidChar(name.into(), c));
    }

    Ok(())
}

/// Check that names of siblings in one table are unique.
pub(crate) fn check_unique_names<'a>(
    kind: &'static str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ModelError> {
    let mut seen = std::collections::BTreeSet::new();

    for name in names {
        check_name_validity(kind, name)?;
        if !seen.insert(name) {
            return Err(ModelError::NameAlreadyExists(kind, name.into()));
        }
    }

    Ok(())
}
