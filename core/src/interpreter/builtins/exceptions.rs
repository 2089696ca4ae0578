//! Built-in exception hierarchy

use crate::error::ErrorKind;
use crate::interpreter::object::{Class, Namespace};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ExcType {
    BaseException,
    Exception,
    ArithmeticError,
    ZeroDivisionError,
    OverflowError,
    LookupError,
    IndexError,
    KeyError,
    NameError,
    UnboundLocalError,
    TypeError,
    ValueError,
    AttributeError,
    ImportError,
    ModuleNotFoundError,
    RuntimeError,
    RecursionError,
    NotImplementedError,
    AssertionError,
    StopIteration,
    SyntaxError,
}

impl ExcType {
    /// Every class, parents before children
    pub const ALL: [ExcType; 21] = [
        ExcType::BaseException,
        ExcType::Exception,
        ExcType::ArithmeticError,
        ExcType::ZeroDivisionError,
        ExcType::OverflowError,
        ExcType::LookupError,
        ExcType::IndexError,
        ExcType::KeyError,
        ExcType::NameError,
        ExcType::UnboundLocalError,
        ExcType::TypeError,
        ExcType::ValueError,
        ExcType::AttributeError,
        ExcType::ImportError,
        ExcType::ModuleNotFoundError,
        ExcType::RuntimeError,
        ExcType::RecursionError,
        ExcType::NotImplementedError,
        ExcType::AssertionError,
        ExcType::StopIteration,
        ExcType::SyntaxError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExcType::BaseException => "BaseException",
            ExcType::Exception => "Exception",
            ExcType::ArithmeticError => "ArithmeticError",
            ExcType::ZeroDivisionError => "ZeroDivisionError",
            ExcType::OverflowError => "OverflowError",
            ExcType::LookupError => "LookupError",
            ExcType::IndexError => "IndexError",
            ExcType::KeyError => "KeyError",
            ExcType::NameError => "NameError",
            ExcType::UnboundLocalError => "UnboundLocalError",
            ExcType::TypeError => "TypeError",
            ExcType::ValueError => "ValueError",
            ExcType::AttributeError => "AttributeError",
            ExcType::ImportError => "ImportError",
            ExcType::ModuleNotFoundError => "ModuleNotFoundError",
            ExcType::RuntimeError => "RuntimeError",
            ExcType::RecursionError => "RecursionError",
            ExcType::NotImplementedError => "NotImplementedError",
            ExcType::AssertionError => "AssertionError",
            ExcType::StopIteration => "StopIteration",
            ExcType::SyntaxError => "SyntaxError",
        }
    }

    pub fn from_name(name: &str) -> Option<ExcType> {
        ExcType::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn parent(self) -> Option<ExcType> {
        Some(match self {
            ExcType::BaseException => return None,
            ExcType::Exception => ExcType::BaseException,
            ExcType::ArithmeticError
            | ExcType::LookupError
            | ExcType::NameError
            | ExcType::TypeError
            | ExcType::ValueError
            | ExcType::AttributeError
            | ExcType::ImportError
            | ExcType::RuntimeError
            | ExcType::AssertionError
            | ExcType::StopIteration
            | ExcType::SyntaxError => ExcType::Exception,
            ExcType::ZeroDivisionError | ExcType::OverflowError => ExcType::ArithmeticError,
            ExcType::IndexError | ExcType::KeyError => ExcType::LookupError,
            ExcType::UnboundLocalError => ExcType::NameError,
            ExcType::ModuleNotFoundError => ExcType::ImportError,
            ExcType::RecursionError | ExcType::NotImplementedError => ExcType::RuntimeError,
        })
    }

    /// Host-facing classification
    pub fn kind(self) -> ErrorKind {
        match self {
            ExcType::ZeroDivisionError => ErrorKind::ZeroDivision,
            ExcType::NameError | ExcType::UnboundLocalError => ErrorKind::NameNotFound,
            ExcType::TypeError => ErrorKind::TypeMismatch,
            ExcType::IndexError => ErrorKind::IndexOutOfRange,
            ExcType::KeyError => ErrorKind::KeyNotFound,
            ExcType::ValueError => ErrorKind::ValueInvalid,
            ExcType::AttributeError => ErrorKind::AttributeMissing,
            _ => ErrorKind::Other,
        }
    }
}

/// Create the class objects for one machine
pub(crate) fn build_classes(object: &Arc<Class>) -> HashMap<ExcType, Arc<Class>> {
    let mut classes: HashMap<ExcType, Arc<Class>> = HashMap::new();
    for ty in ExcType::ALL {
        let base = match ty.parent() {
            Some(parent) => classes[&parent].clone(),
            None => object.clone(),
        };
        // Single inheritance along a fixed tree always linearises
        if let Ok(class) = Class::new(ty.name(), vec![base], Namespace::new(), Some(ty)) {
            classes.insert(ty, class);
        }
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_links() {
        let object = Class::new("object", vec![], Namespace::new(), None).unwrap();
        let classes = build_classes(&object);
        assert_eq!(classes.len(), ExcType::ALL.len());

        let key_error = &classes[&ExcType::KeyError];
        assert!(key_error.is_subclass(&classes[&ExcType::LookupError]));
        assert!(key_error.is_subclass(&classes[&ExcType::Exception]));
        assert!(!key_error.is_subclass(&classes[&ExcType::ArithmeticError]));
        assert!(classes[&ExcType::RecursionError].is_subclass(&classes[&ExcType::RuntimeError]));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ExcType::KeyError.kind(), ErrorKind::KeyNotFound);
        assert_eq!(ExcType::UnboundLocalError.kind(), ErrorKind::NameNotFound);
        assert_eq!(ExcType::LookupError.kind(), ErrorKind::Other);
        assert_eq!(ExcType::from_name("OverflowError"), Some(ExcType::OverflowError));
        assert_eq!(ExcType::from_name("Nope"), None);
    }
}
