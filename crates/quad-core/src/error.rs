use crate::dispatch::DispatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("encoder {channel} failed to initialize")]
    EncoderInit { channel: u8 },
    #[error("step dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}
