//! The class schema shared by dataset preparation and inference.
//!
//! The position of a class in the schema is its integer id in the label files
//! and in the detector output, so both drivers must be handed the same schema.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};

fn default_weight() -> f64 {
    1.0
}

fn default_color() -> [u8; 3] {
    [128, 128, 128]
}

/// One detectable class with its oversampling weight and drawing color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    /// Each label line of this class is written `weight as usize` times
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// RGB color used when drawing detections
    #[serde(default = "default_color")]
    pub color: [u8; 3],
}

impl ClassSpec {
    pub fn new(name: &str, weight: f64, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            weight,
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSchema {
    classes: Vec<ClassSpec>,
}

impl Default for ClassSchema {
    /// The journal layout classes, weighted by inverse frequency.
    fn default() -> Self {
        Self {
            classes: vec![
                ClassSpec::new("date", 5.0, [0, 0, 255]),
                ClassSpec::new("title", 4.0, [0, 255, 0]),
                ClassSpec::new("journal_entry", 2.0, [255, 0, 0]),
                ClassSpec::new("main_image", 2.0, [255, 165, 0]),
                ClassSpec::new("sub_image", 1.0, [128, 0, 128]),
            ],
        }
    }
}

impl ClassSchema {
    pub fn new(classes: Vec<ClassSpec>) -> Result<Self> {
        let schema = Self { classes };
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema from a YAML file of the form `classes: [{name, weight, color}]`.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let schema: ClassSchema = serde_yaml::from_reader(BufReader::new(file))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load the schema at `path`, or the built-in journal schema when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(Error::InvalidSchema("no classes defined".to_string()));
        }
        let mut seen = HashSet::new();
        for class in &self.classes {
            if class.name.is_empty() {
                return Err(Error::InvalidSchema("empty class name".to_string()));
            }
            if !seen.insert(class.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate class name '{}'",
                    class.name
                )));
            }
            if !class.weight.is_finite() || class.weight < 1.0 {
                return Err(Error::InvalidSchema(format!(
                    "weight of '{}' must be at least 1.0, got {}",
                    class.name, class.weight
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[ClassSpec] {
        &self.classes
    }

    pub fn names(&self) -> Vec<&str> {
        self.classes.iter().map(|class| class.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|class| class.name == name)
    }

    pub fn get(&self, class_id: usize) -> Option<&ClassSpec> {
        self.classes.get(class_id)
    }

    /// How many times a label line of `name` is written; 1 for unknown classes.
    pub fn repeat_count(&self, name: &str) -> usize {
        self.classes
            .iter()
            .find(|class| class.name == name)
            .map_or(1, |class| class.weight as usize)
    }
}
