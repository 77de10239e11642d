//! Object registry
//!
//! Maps registry keys (`"{type}_{instance}"`) to registered objects. Iteration
//! follows first-registration order; overwriting a key keeps its slot.

use std::collections::HashMap;

use tracing::info;

use crate::object::BacnetObject;

#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: Vec<BacnetObject>,
    index: HashMap<String, usize>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object, replacing any entry with the same key
    pub fn register(&mut self, object: BacnetObject) {
        let key = object.key();
        info!(object = %key, name = %object.name, "Registered BACnet object");

        match self.index.get(&key) {
            Some(&slot) => self.objects[slot] = object,
            None => {
                self.index.insert(key, self.objects.len());
                self.objects.push(object);
            }
        }
    }

    /// Register objects in order; later entries win on key collision
    pub fn register_many(&mut self, objects: impl IntoIterator<Item = BacnetObject>) {
        for object in objects {
            self.register(object);
        }
    }

    /// Look up by registry key, falling back to the object's human name
    pub fn lookup(&self, name: &str) -> Option<&BacnetObject> {
        match self.index.get(name) {
            Some(&slot) => self.objects.get(slot),
            None => self.objects.iter().find(|o| o.name == name),
        }
    }

    pub fn all(&self) -> &[BacnetObject] {
        &self.objects
    }

    /// Registry keys in iteration order
    pub fn keys(&self) -> Vec<String> {
        self.objects.iter().map(BacnetObject::key).collect()
    }

    /// First-registered object
    pub fn first(&self) -> Option<&BacnetObject> {
        self.objects.first()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectType;

    fn object(t: ObjectType, instance: u32, name: &str) -> BacnetObject {
        BacnetObject::new(t, instance, name, format!("{} description", name))
    }

    #[test]
    fn test_register_and_lookup_by_key() {
        let mut registry = ObjectRegistry::new();
        registry.register(object(ObjectType::AnalogInput, 1, "Zone Temp"));

        let found = registry.lookup("analogInput_1").unwrap();
        assert_eq!(found.name, "Zone Temp");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_falls_back_to_name() {
        let mut registry = ObjectRegistry::new();
        registry.register(object(ObjectType::BinaryOutput, 4, "Fan Command"));

        assert_eq!(registry.lookup("Fan Command").unwrap().key(), "binaryOutput_4");
        assert!(registry.lookup("nonexistent").is_none());
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut registry = ObjectRegistry::new();
        registry.register_many([
            object(ObjectType::AnalogInput, 1, "first"),
            object(ObjectType::AnalogValue, 2, "second"),
            object(ObjectType::AnalogInput, 1, "replaced"),
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.keys(), vec!["analogInput_1", "analogValue_2"]);
        assert_eq!(registry.first().unwrap().name, "replaced");
        // no merge: the replaced entry's old name is gone
        assert!(registry.lookup("first").is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = ObjectRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.first().is_none());
        assert!(registry.all().is_empty());
    }
}
