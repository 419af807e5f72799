use thiserror::Error;

pub type CrudResult<T> = Result<T, CrudError>;

#[derive(Error, Debug)]
pub enum CrudError {
    /// Workbook or table could not be reached. Never retried.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Shape mismatch: range is {expected_rows}x{expected_columns} but payload is {actual_rows}x{actual_columns}"
    )]
    ShapeMismatch {
        expected_rows: usize,
        expected_columns: usize,
        actual_rows: usize,
        actual_columns: usize,
    },

    /// A row handle was resolved before a row deletion on the same table.
    #[error(
        "Stale row handle for {range}: resolved at revision {handle_revision}, table is at revision {table_revision}"
    )]
    StaleRowHandle {
        range: String,
        handle_revision: u64,
        table_revision: u64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrudError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        CrudError::StoreUnavailable(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        CrudError::InvalidArgument(message.into())
    }

    /// True for failures of the backing store rather than of the caller's input.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, CrudError::StoreUnavailable(_) | CrudError::Io(_))
    }
}
