//! Specialist model
//!
//! A specialist is a named handler bound to exactly one capability class.

use serde::{Deserialize, Serialize};

use super::capability::Capability;

/// A named handler for one capability class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialist {
    /// Stable name, e.g. `museum_expert`
    pub name: String,
    /// The single capability class this specialist serves
    pub capability: Capability,
    /// Prompt handed to the specialist when it is invoked
    #[serde(default)]
    pub instruction: String,
}

impl Specialist {
    /// Create a specialist with an empty instruction
    pub fn new(name: impl Into<String>, capability: Capability) -> Self {
        Self {
            name: name.into(),
            capability,
            instruction: String::new(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn museum_expert() -> Self {
        Self::new("museum_expert", Capability::cultural()).with_instruction(
            "You are a museum expert. Suggest ONE famous museum or cultural site \
             in the requested city. Keep it brief.",
        )
    }

    pub fn restaurant_expert() -> Self {
        Self::new("restaurant_expert", Capability::food()).with_instruction(
            "You are a foodie. Suggest ONE famous local restaurant or dish in the \
             requested city. Keep it brief.",
        )
    }

    pub fn outdoor_expert() -> Self {
        Self::new("outdoor_expert", Capability::outdoor()).with_instruction(
            "You are an adventure guide. Suggest ONE outdoor activity or park in \
             the requested city. Keep it brief.",
        )
    }
}
