//! Transfer destinations for mid-call function invocations
//!
//! The voice agent names a function (e.g. `transfer_to_sales`); the
//! directory maps that name to the line the live call is redirected to.

use std::collections::BTreeMap;

/// A named transfer target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTarget {
    pub function_name: String,
    pub number: String,
}

/// Fixed table of function name -> transfer number
#[derive(Debug, Clone, Default)]
pub struct TransferDirectory {
    routes: BTreeMap<String, String>,
}

impl TransferDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, replacing any previous number for the same function
    #[cfg(test)]
    pub fn with_route(mut self, function_name: impl Into<String>, number: impl Into<String>) -> Self {
        self.routes.insert(function_name.into(), number.into());
        self
    }

    /// Parse `name=+15550001111,other=+15550002222`
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut directory = Self::new();

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, number) = entry
                .split_once('=')
                .ok_or_else(|| format!("transfer route '{}' is not name=number", entry))?;

            let (name, number) = (name.trim(), number.trim());
            if name.is_empty() || number.is_empty() {
                return Err(format!("transfer route '{}' has an empty side", entry));
            }

            directory.routes.insert(name.to_string(), number.to_string());
        }

        Ok(directory)
    }

    /// Resolve a function name to its transfer target
    pub fn resolve(&self, function_name: &str) -> Option<TransferTarget> {
        self.routes.get(function_name).map(|number| TransferTarget {
            function_name: function_name.to_string(),
            number: number.clone(),
        })
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
