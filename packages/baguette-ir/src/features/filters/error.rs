use thiserror::Error;

use crate::shared::models::StoreError;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Unknown filter '{name}' (available: {available})")]
    Unknown { name: String, available: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FilterError {
    pub fn unknown<'a>(name: impl Into<String>, available: impl IntoIterator<Item = &'a str>) -> Self {
        Self::Unknown {
            name: name.into(),
            available: available.into_iter().collect::<Vec<_>>().join(", "),
        }
    }
}

pub type FilterResult<T> = Result<T, FilterError>;
