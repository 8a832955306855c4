//! The VM's class registry: canonical-name-keyed, load-on-demand, and
//! backed by a pluggable [`ClassSource`] so that directory layout and jar
//! scanning stay outside this crate's concerns.

use crate::class_file::{ClassFile, LoaderConfig};
use crate::error::{JvmError, Result};
use crate::read::ByteReader;
use hashbrown::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Supplies the raw bytes for a canonical class name. Implementations may
/// read a directory tree, a jar, a network socket, or an in-memory map;
/// the registry only needs "give me the bytes for this name or tell me
/// you can't."
pub trait ClassSource {
    fn load_bytes(&self, canonical_name: &str) -> Result<Vec<u8>>;
}

/// The convenience default: a list of directories, each searched for
/// `<canonical_name>.class`.
pub struct FileSystemClassSource {
    pub directories: Vec<PathBuf>,
}

impl FileSystemClassSource {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        FileSystemClassSource { directories }
    }
}

impl ClassSource for FileSystemClassSource {
    fn load_bytes(&self, canonical_name: &str) -> Result<Vec<u8>> {
        for dir in &self.directories {
            let candidate = dir.join(format!("{}.class", canonical_name));
            if let Ok(bytes) = std::fs::read(&candidate) {
                return Ok(bytes);
            }
        }
        Err(JvmError::ClassNotFound {
            name: canonical_name.to_string(),
        })
    }
}

pub struct VmRegistry {
    classes: HashMap<String, Rc<ClassFile>>,
    source: Box<dyn ClassSource>,
    config: LoaderConfig,
}

impl VmRegistry {
    pub fn new(source: Box<dyn ClassSource>, config: LoaderConfig) -> Self {
        VmRegistry {
            classes: HashMap::new(),
            source,
            config,
        }
    }

    /// `name` may use the dotted (`java.lang.Object`) or canonical
    /// (`java/lang/Object`) form; internally everything is stored and
    /// compared in canonical (slash) form.
    pub fn resolve(&mut self, name: &str) -> Result<Rc<ClassFile>> {
        let canonical = name.replace('.', "/");
        if let Some(class) = self.classes.get(&canonical) {
            return Ok(Rc::clone(class));
        }

        let bytes = self.source.load_bytes(&canonical)?;
        let mut reader = ByteReader::new(&bytes);
        let class = Rc::new(ClassFile::read(&mut reader, self.config)?);
        self.classes.insert(canonical, Rc::clone(&class));
        Ok(class)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.classes.contains_key(&name.replace('.', "/"))
    }

    pub fn get(&self, name: &str) -> Option<&Rc<ClassFile>> {
        self.classes.get(&name.replace('.', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct InMemorySource {
        classes: RefCell<HashMap<String, Vec<u8>>>,
    }

    impl ClassSource for InMemorySource {
        fn load_bytes(&self, canonical_name: &str) -> Result<Vec<u8>> {
            self.classes
                .borrow()
                .get(canonical_name)
                .cloned()
                .ok_or_else(|| JvmError::ClassNotFound {
                    name: canonical_name.to_string(),
                })
        }
    }

    fn minimal_class_named() -> Vec<u8> {
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE];
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x003Du16.to_be_bytes());
        bytes.extend_from_slice(&0x0003u16.to_be_bytes());
        bytes.extend_from_slice(&[1, 0, 1, b'A']);
        bytes.extend_from_slice(&[7, 0, 1]);
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0002u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes
    }

    #[test]
    fn resolve_loads_once_and_caches() {
        let mut classes = HashMap::new();
        classes.insert("A".to_string(), minimal_class_named());
        let source = InMemorySource {
            classes: RefCell::new(classes),
        };
        let mut registry = VmRegistry::new(Box::new(source), LoaderConfig::default());

        let first = registry.resolve("A").unwrap();
        assert_eq!(first.name(), "A");
        assert!(registry.is_loaded("A"));

        let second = registry.resolve("A").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn miss_surfaces_class_not_found() {
        let source = InMemorySource {
            classes: RefCell::new(HashMap::new()),
        };
        let mut registry = VmRegistry::new(Box::new(source), LoaderConfig::default());
        assert!(matches!(
            registry.resolve("Missing"),
            Err(JvmError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn dotted_name_is_canonicalized() {
        let mut classes = HashMap::new();
        classes.insert("java/lang/Object".to_string(), minimal_class_named());
        let source = InMemorySource {
            classes: RefCell::new(classes),
        };
        let mut registry = VmRegistry::new(Box::new(source), LoaderConfig::default());
        assert!(registry.resolve("java.lang.Object").is_ok());
        assert!(registry.is_loaded("java/lang/Object"));
    }
}
