/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid character {byte:#04x} in sequence {name} at position {pos}")]
    InvalidCharacter { name: String, pos: usize, byte: u8 },
    #[error("invalid frequency {0}, expected a value in [0, 1]")]
    InvalidFrequency(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
