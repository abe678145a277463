pub mod aspect;
pub mod mask;
pub mod preview;
pub mod replay;
pub mod submit;
