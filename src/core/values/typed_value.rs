use std::any::{Any, TypeId};
use std::sync::Arc;

/// Type-erased host object carried as a payload (models, datasets, handles).
///
/// The engine never looks inside; it only moves the shared reference across
/// edges. Equality is identity of the shared allocation.
#[derive(Clone)]
pub struct OpaqueValue {
    data: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    type_id: TypeId,
}

impl OpaqueValue {
    /// Wrap a host value
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            data: Arc::new(value),
        }
    }

    /// Get a reference to the contained value
    pub fn get<T: 'static>(&self) -> Result<&T, String> {
        if TypeId::of::<T>() != self.type_id {
            return Err(format!(
                "Type mismatch: expected {}, found {}",
                std::any::type_name::<T>(),
                self.type_name
            ));
        }

        self.data
            .downcast_ref::<T>()
            .ok_or_else(|| format!("Failed to downcast to {}", std::any::type_name::<T>()))
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_type<T: 'static>(&self) -> bool {
        TypeId::of::<T>() == self.type_id
    }

    pub fn ptr_eq(&self, other: &OpaqueValue) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl std::fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_value_basic() {
        let value = OpaqueValue::new(vec![1u8, 2, 3]);
        assert_eq!(value.get::<Vec<u8>>().unwrap(), &vec![1, 2, 3]);
        assert!(value.is_type::<Vec<u8>>());
        assert!(!value.is_type::<String>());
    }

    #[test]
    fn test_opaque_value_type_mismatch() {
        let value = OpaqueValue::new(42i64);
        let result = value.get::<String>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Type mismatch"));
    }

    #[test]
    fn test_opaque_clone_shares_identity() {
        let value = OpaqueValue::new(String::from("model"));
        let copy = value.clone();
        assert!(value.ptr_eq(&copy));
        assert!(!value.ptr_eq(&OpaqueValue::new(String::from("model"))));
    }
}
