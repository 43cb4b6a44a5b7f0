pub mod common;
pub mod deobfuscate;
pub mod detect;
pub mod passes;
