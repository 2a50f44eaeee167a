#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("buffer too small for geometry: need at least {needed} bytes, have {have}")]
    BadGeometry { needed: usize, have: usize },
    #[error("directory full")]
    DirectoryFull,
    #[error("no free blocks")]
    NoFreeBlocks,
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
