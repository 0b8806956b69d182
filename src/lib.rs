pub mod host;
pub mod language;
pub mod runtime;
pub mod tools;

#[cfg(test)]
mod tests;
