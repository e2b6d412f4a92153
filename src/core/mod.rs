pub mod agent;
pub mod eligibility;
pub mod prompt;
pub mod runtime;

#[cfg(test)]
mod tests;
