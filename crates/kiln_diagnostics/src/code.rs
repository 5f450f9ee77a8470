//! Diagnostic codes with category prefixes for structured identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Configuration and option problems, prefixed with `C`.
    Config,
    /// Syntax errors found while scanning a module, prefixed with `S`.
    Syntax,
    /// Cross-module semantic errors, prefixed with `E`.
    Semantic,
    /// Non-fatal code quality findings, prefixed with `W`.
    Lint,
    /// Component template and resource problems, prefixed with `T`.
    Template,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Config => 'C',
            Category::Syntax => 'S',
            Category::Semantic => 'E',
            Category::Lint => 'W',
            Category::Template => 'T',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the prefix followed by a zero-padded 4-digit number, e.g. `E2307`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", self.category.prefix(), self.number)
    }
}
