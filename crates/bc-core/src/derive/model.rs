//! Model-identifier predicate.

use bc_config::ModelFamilies;

/// The device model together with the family table it is matched against.
#[derive(Debug, Clone)]
pub struct Model<'a> {
    name: String,
    families: &'a ModelFamilies,
}

impl<'a> Model<'a> {
    pub fn new(name: impl Into<String>, families: &'a ModelFamilies) -> Self {
        Self {
            name: name.into(),
            families,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is(&self, model: &str) -> bool {
        self.name == model
    }

    /// Membership in a named family. Unknown families match nothing.
    pub fn is_in(&self, family: &str) -> bool {
        self.families.contains(family, &self.name)
    }

    pub fn families(&self) -> &'a ModelFamilies {
        self.families
    }
}
