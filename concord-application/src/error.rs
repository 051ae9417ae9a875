use concord_core::error::CoordError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("coordination: {0}")]
    Coord(#[from] CoordError),

    #[error("transaction not found: {0}")]
    TransactionNotFound(u64),
}
