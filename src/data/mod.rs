//! Data container descriptors.
//!
//! Access nodes in a dataflow state name *data containers*; the containers
//! themselves are described once, in the owning graph's container registry,
//! by a [`DataDescriptor`]: element type, symbolic shape, storage class,
//! transience, and allocation lifetime. Argument inference and liveness
//! consult these descriptors to decide which containers cross a call
//! boundary and which symbols their shapes pull in.
//!
//! # Key Types
//!
//! - [`ElementType`] - Scalar element types of containers
//! - [`StorageClass`] - Where a container's storage lives
//! - [`AllocationLifetime`] - How long the storage outlives its scope
//! - [`ScheduleKind`] - Execution schedule of a parallel scope
//! - [`DataDescriptor`] - The full per-container description
//!
//! # Examples
//!
//! ```rust
//! use stategraph::data::{DataDescriptor, ElementType};
//!
//! let desc = DataDescriptor::array(ElementType::Float64, &["N".into(), "N".into()]);
//! assert!(!desc.is_scalar());
//! assert!(desc.used_symbols(true).contains("N"));
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::symbolic::{Subset, SymbolicExpr};

/// Scalar element types representable in data containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum ElementType {
    /// Boolean value
    Bool,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 8-bit integer
    UInt8,
    /// Unsigned 16-bit integer
    UInt16,
    /// Unsigned 32-bit integer
    UInt32,
    /// Unsigned 64-bit integer
    UInt64,
    /// IEEE-754 single precision
    Float32,
    /// IEEE-754 double precision
    Float64,
}

impl ElementType {
    /// Returns the size of one element in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        match self {
            ElementType::Bool | ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
        }
    }

    /// Returns the C-like type name used in generated call signatures.
    #[must_use]
    pub const fn c_name(&self) -> &'static str {
        match self {
            ElementType::Bool => "bool",
            ElementType::Int8 => "int8_t",
            ElementType::Int16 => "int16_t",
            ElementType::Int32 => "int32_t",
            ElementType::Int64 => "int64_t",
            ElementType::UInt8 => "uint8_t",
            ElementType::UInt16 => "uint16_t",
            ElementType::UInt32 => "uint32_t",
            ElementType::UInt64 => "uint64_t",
            ElementType::Float32 => "float",
            ElementType::Float64 => "double",
        }
    }
}

/// Storage class of a data container.
///
/// Determines which scopes can host the container's allocation; argument
/// inference walks enclosing scopes with [`can_allocate`] to decide whether
/// a scope-lifetime transient escapes its view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter)]
pub enum StorageClass {
    /// Storage decided by the surrounding context
    #[default]
    Default,
    /// Register-allocated storage inside the innermost scope
    Register,
    /// General heap storage
    Heap,
    /// Storage shared across the workers of one parallel scope
    Shared,
    /// Storage that persists across graph invocations
    Persistent,
}

/// Allocation lifetime of a data container.
///
/// Containers whose lifetime exceeds the queried view must be passed in as
/// arguments rather than allocated locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter)]
pub enum AllocationLifetime {
    /// Allocated and freed within the innermost scope using the container
    #[default]
    Scope,
    /// Allocated for the duration of one state
    State,
    /// Allocated for the duration of one control-flow region
    Region,
    /// Allocated for the lifetime of the whole graph invocation
    Global,
    /// Allocated once and reused across invocations
    Persistent,
}

/// Execution schedule of a parallel scope entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter)]
pub enum ScheduleKind {
    /// Iterations execute one after another
    Sequential,
    /// Iterations execute as parallel workers
    #[default]
    Parallel,
    /// Iterations execute as vector lanes
    Vectorized,
}

/// Returns whether a scope running under `schedule` can host an allocation
/// of the given storage class.
///
/// Sequential scopes host anything except shared storage; parallel scopes
/// host register and shared storage; vectorized scopes only registers.
#[must_use]
pub const fn can_allocate(storage: StorageClass, schedule: ScheduleKind) -> bool {
    match schedule {
        ScheduleKind::Sequential => !matches!(storage, StorageClass::Shared),
        ScheduleKind::Parallel => matches!(
            storage,
            StorageClass::Default | StorageClass::Register | StorageClass::Shared
        ),
        ScheduleKind::Vectorized => matches!(storage, StorageClass::Default | StorageClass::Register),
    }
}

/// A compile-time constant registered on a graph.
///
/// Constant names are never reported as free symbols; their values are
/// folded in by code generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    /// Integer constant
    Int(i64),
    /// Floating-point constant
    Float(f64),
    /// Boolean constant
    Bool(bool),
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstantValue::Int(v) => write!(f, "{v}"),
            ConstantValue::Float(v) => write!(f, "{v}"),
            ConstantValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Description of one data container.
///
/// Registered in the owning graph's container registry under the container
/// name; access nodes and memlets refer to containers by that name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDescriptor {
    /// Element type of the container
    pub dtype: ElementType,
    /// Symbolic extent per dimension; empty for scalars
    pub shape: Vec<SymbolicExpr>,
    /// Storage class of the allocation
    pub storage: StorageClass,
    /// `true` if the container is local to the graph (not an external input/output)
    pub transient: bool,
    /// Allocation lifetime of the storage
    pub lifetime: AllocationLifetime,
}

impl DataDescriptor {
    /// Creates a non-transient array descriptor with default storage.
    #[must_use]
    pub fn array(dtype: ElementType, shape: &[SymbolicExpr]) -> Self {
        DataDescriptor {
            dtype,
            shape: shape.to_vec(),
            storage: StorageClass::Default,
            transient: false,
            lifetime: AllocationLifetime::Scope,
        }
    }

    /// Creates a non-transient scalar descriptor.
    #[must_use]
    pub fn scalar(dtype: ElementType) -> Self {
        DataDescriptor {
            dtype,
            shape: Vec::new(),
            storage: StorageClass::Default,
            transient: false,
            lifetime: AllocationLifetime::Scope,
        }
    }

    /// Marks the descriptor as transient (graph-local) and returns it.
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Sets the storage class and returns the descriptor.
    #[must_use]
    pub fn with_storage(mut self, storage: StorageClass) -> Self {
        self.storage = storage;
        self
    }

    /// Sets the allocation lifetime and returns the descriptor.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: AllocationLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Returns `true` if this container holds a single element.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Returns the number of dimensions (0 for scalars).
    #[must_use]
    pub fn dims(&self) -> usize {
        self.shape.len()
    }

    /// Returns the subset covering the whole container.
    ///
    /// Scalars yield the single-element subset `0`.
    #[must_use]
    pub fn total_extent(&self) -> Subset {
        if self.is_scalar() {
            Subset::elements(&["0"])
        } else {
            Subset::from_extents(&self.shape)
        }
    }

    /// Extracts the free symbols referenced by the container shape.
    ///
    /// With `all_symbols == false` only symbols of dimensions beyond the
    /// first are reported; leading-dimension extents need not be
    /// materialized for address computation.
    #[must_use]
    pub fn used_symbols(&self, all_symbols: bool) -> BTreeSet<String> {
        let skip = usize::from(!all_symbols && !self.shape.is_empty());
        let mut result = BTreeSet::new();
        for extent in self.shape.iter().skip(skip) {
            result.extend(extent.free_symbols());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_sizes() {
        assert_eq!(ElementType::Bool.size_bytes(), 1);
        assert_eq!(ElementType::Int32.size_bytes(), 4);
        assert_eq!(ElementType::Float64.size_bytes(), 8);
    }

    #[test]
    fn test_scalar_descriptor() {
        let desc = DataDescriptor::scalar(ElementType::Int64);
        assert!(desc.is_scalar());
        assert_eq!(desc.dims(), 0);
        assert!(desc.used_symbols(true).is_empty());
        assert_eq!(desc.total_extent().to_string(), "0");
    }

    #[test]
    fn test_array_descriptor_symbols() {
        let desc = DataDescriptor::array(ElementType::Float32, &["M".into(), "N".into()]);
        let all = desc.used_symbols(true);
        assert!(all.contains("M"));
        assert!(all.contains("N"));

        // Leading dimension is skipped for argument materialization
        let args = desc.used_symbols(false);
        assert!(!args.contains("M"));
        assert!(args.contains("N"));
    }

    #[test]
    fn test_builder_chain() {
        let desc = DataDescriptor::array(ElementType::Float64, &["N".into()])
            .transient()
            .with_storage(StorageClass::Shared)
            .with_lifetime(AllocationLifetime::Global);
        assert!(desc.transient);
        assert_eq!(desc.storage, StorageClass::Shared);
        assert_eq!(desc.lifetime, AllocationLifetime::Global);
    }

    #[test]
    fn test_can_allocate() {
        assert!(can_allocate(StorageClass::Register, ScheduleKind::Parallel));
        assert!(can_allocate(StorageClass::Shared, ScheduleKind::Parallel));
        assert!(!can_allocate(StorageClass::Shared, ScheduleKind::Sequential));
        assert!(!can_allocate(StorageClass::Heap, ScheduleKind::Vectorized));
        assert!(can_allocate(StorageClass::Default, ScheduleKind::Sequential));
    }

    #[test]
    fn test_total_extent_literal_shape() {
        let desc = DataDescriptor::array(ElementType::Int32, &["10".into()]);
        assert_eq!(desc.total_extent().to_string(), "0:9");
    }
}
