//! Provider functions.

pub mod hextod65;

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::FunctionDefinition;

pub use hextod65::HexToD65;

/// A pure function callable from configuration.
pub trait Function: Send + Sync {
    /// Name the function is called by.
    fn name(&self) -> &'static str;

    /// Signature and documentation.
    fn definition(&self) -> FunctionDefinition;

    /// Evaluate the function. Arguments are already checked against
    /// [`definition`](Function::definition).
    fn call(&self, args: &[Value]) -> Result<Value, ProviderError>;
}

/// Every function the provider registers.
pub fn all() -> Vec<Box<dyn Function>> {
    vec![Box::new(HexToD65)]
}
